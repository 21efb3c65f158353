// SPDX-License-Identifier: MIT

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use sdrio::{SECTOR_SIZE, SectorBuffer};

pub const JUMP_SHORT: u8 = 0xEB;
pub const JUMP_NEAR: u8 = 0xE9;
pub const BOOT_SIGNATURE: u16 = 0xAA55;

/// Boot record as read from disk. The BIOS parameter block is common to FAT16 and
/// FAT32; the FAT32 extension fields are only meaningful when `fat_size_16` is 0.
#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct BootRecord {
    pub jump_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub media: u8,
    pub fat_size_16: u16,
    pub sectors_per_track: u16,
    pub num_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,

    // FAT32 Extended BPB
    pub fat_size_32: u32,
    pub ext_flags: u16,
    pub fs_version: u16,
    pub root_cluster: u32,

    pub tail: [u8; 462],
    pub signature: u16,
}

impl BootRecord {
    pub fn from_sector(buffer: &SectorBuffer) -> Self {
        let mut record = Self::new_zeroed();
        record.as_mut_bytes().copy_from_slice(buffer.as_bytes());
        record
    }

    #[inline]
    pub fn has_jump(&self) -> bool {
        matches!(self.jump_boot[0], JUMP_SHORT | JUMP_NEAR)
    }

    #[inline]
    pub fn has_signature(&self) -> bool {
        let sig = self.signature;
        u16::from_le(sig) == BOOT_SIGNATURE
    }

    #[inline]
    pub fn total_sectors(&self) -> u32 {
        match self.total_sectors_16 {
            0 => self.total_sectors_32,
            n => n as u32,
        }
    }
}

const _: () = assert!(core::mem::size_of::<BootRecord>() == SECTOR_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_record_offsets() {
        let mut buf = SectorBuffer::new();
        let raw = buf.as_bytes_mut();
        raw[0] = 0xEB;
        raw[11..13].copy_from_slice(&512u16.to_le_bytes());
        raw[13] = 4;
        raw[14..16].copy_from_slice(&6u16.to_le_bytes());
        raw[16] = 2;
        raw[17..19].copy_from_slice(&512u16.to_le_bytes());
        raw[22..24].copy_from_slice(&32u16.to_le_bytes());
        raw[32..36].copy_from_slice(&70_000u32.to_le_bytes());
        raw[44..48].copy_from_slice(&2u32.to_le_bytes());
        raw[510] = 0x55;
        raw[511] = 0xAA;

        let boot = BootRecord::from_sector(&buf);
        assert!(boot.has_jump());
        assert!(boot.has_signature());
        assert_eq!({ boot.bytes_per_sector }, 512);
        assert_eq!(boot.sectors_per_cluster, 4);
        assert_eq!({ boot.reserved_sectors }, 6);
        assert_eq!(boot.num_fats, 2);
        assert_eq!({ boot.root_entry_count }, 512);
        assert_eq!({ boot.fat_size_16 }, 32);
        assert_eq!(boot.total_sectors(), 70_000);
        assert_eq!({ boot.root_cluster }, 2);
    }
}
