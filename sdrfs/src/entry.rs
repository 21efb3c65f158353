// SPDX-License-Identifier: MIT

//! Byte-fed directory slot parser.
//!
//! Bytes of a directory region arrive one per tick. Every 32nd byte closes a
//! slot, which is classified and, for a live short entry, turned into a
//! [`DirRecord`] carrying the long name of the run that preceded it.

use sdrio::SectorOffset;
use zerocopy::FromBytes;

use crate::attr::DirAttributes;
use crate::name::{MAX_NAME_LEN, NameBuf, decode_short, fold, lfn_checksum};
use crate::types::{
    DIR_ENTRY_SIZE, DirEntry, LFN_CHARS_PER_SLOT, LFN_MAX_SLOTS, LfnEntry, SLOT_DELETED, SLOT_DOT,
    SLOT_END,
};

const LFN_SCRATCH: usize = LFN_MAX_SLOTS as usize * LFN_CHARS_PER_SLOT;

/// A finalized live entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirRecord {
    pub name: NameBuf,
    /// True when `name` came from a long-name run.
    pub long_name: bool,
    pub attr: DirAttributes,
    pub first_cluster: u32,
    pub size: u32,
}

/// Result of pushing one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    /// Slot not complete yet, or the directory already ended.
    Pending,
    /// Deleted, dot, long-name or volume-label slot.
    Skipped,
    Entry(DirRecord),
    /// End-of-directory marker.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LfnRun {
    None,
    /// Expecting slot `next` of a run with `checksum`.
    Collecting { next: u8, checksum: u8 },
    /// Sequence 1 seen; the next slot must be the matching short entry.
    Complete { checksum: u8 },
}

#[derive(Debug, Clone)]
pub struct EntryParser {
    slot: [u8; DIR_ENTRY_SIZE],
    lfn: [u16; LFN_SCRATCH],
    lfn_len: usize,
    run: LfnRun,
    ended: bool,
}

impl Default for EntryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryParser {
    pub const fn new() -> Self {
        Self {
            slot: [0; DIR_ENTRY_SIZE],
            lfn: [0xFFFF; LFN_SCRATCH],
            lfn_len: 0,
            run: LfnRun::None,
            ended: false,
        }
    }

    /// Clears all state before a new directory is scanned.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// True once the end-of-directory marker was seen.
    #[inline]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn push(&mut self, offset: SectorOffset, byte: u8) -> SlotEvent {
        if self.ended {
            return SlotEvent::Pending;
        }
        let index = offset.slot_index();
        self.slot[index] = byte;
        if index + 1 < DIR_ENTRY_SIZE {
            return SlotEvent::Pending;
        }
        self.finish_slot()
    }

    fn finish_slot(&mut self) -> SlotEvent {
        match self.slot[0] {
            SLOT_END => {
                self.ended = true;
                self.run = LfnRun::None;
                SlotEvent::End
            }
            SLOT_DELETED | SLOT_DOT => {
                self.run = LfnRun::None;
                SlotEvent::Skipped
            }
            _ if DirAttributes::is_lfn(self.slot[11]) => {
                self.push_lfn();
                SlotEvent::Skipped
            }
            _ => self.short_entry(),
        }
    }

    fn push_lfn(&mut self) {
        let Ok(lfn) = LfnEntry::read_from_bytes(&self.slot[..]) else {
            self.run = LfnRun::None;
            return;
        };
        let seq = lfn.sequence();
        let checksum = lfn.checksum;

        if lfn.is_last() {
            if seq == 0 || seq > LFN_MAX_SLOTS {
                self.run = LfnRun::None;
                return;
            }
            let units = lfn.units();
            let used = units.iter().position(|u| *u == 0x0000).unwrap_or(LFN_CHARS_PER_SLOT);
            self.lfn_len = ((seq as usize - 1) * LFN_CHARS_PER_SLOT + used).min(MAX_NAME_LEN);
            self.store(seq, &units);
        } else {
            match self.run {
                LfnRun::Collecting { next, checksum: sum } if next == seq && sum == checksum => {
                    self.store(seq, &lfn.units());
                }
                _ => {
                    self.run = LfnRun::None;
                    return;
                }
            }
        }

        self.run = match seq {
            1 => LfnRun::Complete { checksum },
            _ => LfnRun::Collecting {
                next: seq - 1,
                checksum,
            },
        };
    }

    fn store(&mut self, seq: u8, units: &[u16; LFN_CHARS_PER_SLOT]) {
        let base = (seq as usize - 1) * LFN_CHARS_PER_SLOT;
        for (dst, &unit) in self.lfn[base..base + LFN_CHARS_PER_SLOT].iter_mut().zip(units) {
            *dst = fold(unit);
        }
    }

    fn short_entry(&mut self) -> SlotEvent {
        let run = core::mem::replace(&mut self.run, LfnRun::None);
        let Ok(entry) = DirEntry::read_from_bytes(&self.slot[..]) else {
            return SlotEvent::Skipped;
        };
        let attr = entry.attributes();
        if attr.is_volume_label() {
            return SlotEvent::Skipped;
        }

        let mut name = NameBuf::new();
        let long_name = match run {
            LfnRun::Complete { checksum } if checksum == lfn_checksum(&entry.name) => {
                let _ = name.extend_from_slice(&self.lfn[..self.lfn_len]);
                true
            }
            LfnRun::None => {
                decode_short(&entry.name, &mut name);
                false
            }
            _ => {
                log::trace!("dropping long-name run before {:02x?}", entry.name);
                decode_short(&entry.name, &mut name);
                false
            }
        };

        SlotEvent::Entry(DirRecord {
            name,
            long_name,
            attr,
            first_cluster: entry.first_cluster(),
            size: entry.size(),
        })
    }
}
