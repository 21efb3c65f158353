// SPDX-License-Identifier: MIT

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use sdrio::SectorBuffer;

/// Offset of the partition table inside the master boot record.
pub const PARTITION_TABLE_OFFSET: usize = 446;
pub const PARTITION_ENTRIES: usize = 4;
pub const PARTITION_ENTRY_SIZE: usize = 16;

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct MbrEntry {
    pub boot_flag: u8,
    pub starting_chs: [u8; 3],
    pub part_type: u8,
    pub end_chs: [u8; 3],
    pub start_lba: u32,
    pub sectors: u32,
}

impl MbrEntry {
    #[inline]
    pub fn new(part_type: u8, start_lba: u32, sectors: u32) -> Self {
        Self {
            boot_flag: 0,
            starting_chs: [0; 3],
            part_type,
            end_chs: [0; 3],
            start_lba: start_lba.to_le(),
            sectors: sectors.to_le(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.part_type == 0
    }

    #[inline]
    pub fn start_lba(&self) -> u32 {
        u32::from_le(self.start_lba)
    }

    /// Entry `index` (0..4) of the table stored in `buffer`.
    pub fn from_sector(buffer: &SectorBuffer, index: usize) -> Option<Self> {
        if index >= PARTITION_ENTRIES {
            return None;
        }
        let at = PARTITION_TABLE_OFFSET + index * PARTITION_ENTRY_SIZE;
        Self::read_from_bytes(&buffer.as_bytes()[at..at + PARTITION_ENTRY_SIZE]).ok()
    }

    /// Start of the first non-empty partition.
    pub fn first_partition(buffer: &SectorBuffer) -> Option<u32> {
        (0..PARTITION_ENTRIES)
            .filter_map(|i| Self::from_sector(buffer, i))
            .find(|e| !e.is_empty())
            .map(|e| e.start_lba())
    }
}

const _: () = assert!(core::mem::size_of::<MbrEntry>() == PARTITION_ENTRY_SIZE);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_empty_partition() {
        let mut buf = SectorBuffer::new();
        let second = MbrEntry::new(0x0E, 2048, 65_536);
        let at = PARTITION_TABLE_OFFSET + PARTITION_ENTRY_SIZE;
        buf.as_bytes_mut()[at..at + PARTITION_ENTRY_SIZE].copy_from_slice(second.as_bytes());

        assert!(MbrEntry::from_sector(&buf, 0).unwrap().is_empty());
        assert_eq!(MbrEntry::first_partition(&buf), Some(2048));
        assert!(MbrEntry::from_sector(&buf, 4).is_none());
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(MbrEntry::first_partition(&SectorBuffer::new()), None);
    }
}
