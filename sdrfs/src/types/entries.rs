// SPDX-License-Identifier: MIT

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::attr::DirAttributes;

pub const DIR_ENTRY_SIZE: usize = 32;

/// First-byte markers of a directory slot.
pub const SLOT_END: u8 = 0x00;
pub const SLOT_DELETED: u8 = 0xE5;
pub const SLOT_DOT: u8 = 0x2E;
/// Stored in place of a leading 0xE5 in a live short name.
pub const SLOT_KANJI_E5: u8 = 0x05;

/// Long-name slot flag on the first physical slot of a run.
pub const LFN_LAST_FLAG: u8 = 0x40;
pub const LFN_SEQ_MASK: u8 = 0x3F;
pub const LFN_CHARS_PER_SLOT: usize = 13;
pub const LFN_MAX_SLOTS: u8 = 20;

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct DirEntry {
    pub name: [u8; 11],
    pub attr: u8,
    pub nt_reserved: u8,
    pub creation_time_tenth: u8,
    pub creation_time: u16,
    pub creation_date: u16,
    pub access_date: u16,
    pub first_cluster_high: u16,
    pub write_time: u16,
    pub write_date: u16,
    pub first_cluster_low: u16,
    pub file_size: u32,
}

impl DirEntry {
    pub fn new(name: [u8; 11], attr: u8, cluster: u32, size: u32) -> Self {
        Self {
            name,
            attr,
            nt_reserved: 0,
            creation_time_tenth: 0,
            creation_time: 0,
            creation_date: 0,
            access_date: 0,
            first_cluster_high: ((cluster >> 16) & 0xFFFF) as u16,
            write_time: 0,
            write_date: 0,
            first_cluster_low: (cluster & 0xFFFF) as u16,
            file_size: size,
        }
    }

    #[inline]
    pub fn attributes(&self) -> DirAttributes {
        DirAttributes::from_bits_retain(self.attr)
    }

    /// Start cluster as used by the walker: only the low 16 bits are honored.
    #[inline]
    pub fn first_cluster(&self) -> u32 {
        self.first_cluster_low as u32
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.file_size
    }
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct LfnEntry {
    pub order: u8,
    pub name1: [u16; 5],
    pub attr: u8,
    pub type_field: u8,
    pub checksum: u8,
    pub name2: [u16; 6],
    pub zero: u16,
    pub name3: [u16; 2],
}

impl LfnEntry {
    /// Builds a slot from up to 13 code units; a shorter chunk is terminated by
    /// 0x0000 and padded with 0xFFFF.
    pub fn new(order: u8, is_last: bool, chunk: &[u16], checksum: u8) -> Self {
        let mut units = [0xFFFFu16; LFN_CHARS_PER_SLOT];
        for (i, slot) in units.iter_mut().enumerate() {
            match i.cmp(&chunk.len()) {
                core::cmp::Ordering::Less => *slot = chunk[i],
                core::cmp::Ordering::Equal => *slot = 0x0000,
                core::cmp::Ordering::Greater => break,
            }
        }

        let mut name1 = [0u16; 5];
        let mut name2 = [0u16; 6];
        let mut name3 = [0u16; 2];
        name1.copy_from_slice(&units[0..5]);
        name2.copy_from_slice(&units[5..11]);
        name3.copy_from_slice(&units[11..13]);

        Self {
            order: if is_last { order | LFN_LAST_FLAG } else { order },
            name1,
            attr: DirAttributes::LFN.bits(),
            type_field: 0,
            checksum,
            name2,
            zero: 0,
            name3,
        }
    }

    #[inline]
    pub fn sequence(&self) -> u8 {
        self.order & LFN_SEQ_MASK
    }

    #[inline]
    pub fn is_last(&self) -> bool {
        self.order & LFN_LAST_FLAG != 0
    }

    /// The 13 code units in name order (offsets 1, 3, 5, 7, 9, 14, ..., 30).
    pub fn units(&self) -> [u16; LFN_CHARS_PER_SLOT] {
        let mut out = [0xFFFFu16; LFN_CHARS_PER_SLOT];
        let name1 = self.name1;
        let name2 = self.name2;
        let name3 = self.name3;
        out[0..5].copy_from_slice(&name1);
        out[5..11].copy_from_slice(&name2);
        out[11..13].copy_from_slice(&name3);
        out
    }
}

const _: () = assert!(core::mem::size_of::<DirEntry>() == DIR_ENTRY_SIZE);
const _: () = assert!(core::mem::size_of::<LfnEntry>() == DIR_ENTRY_SIZE);
