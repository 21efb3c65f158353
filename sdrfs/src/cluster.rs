// SPDX-License-Identifier: MIT

//! FAT link decoding and the sector-granular cluster cursor.

use sdrio::SectorBuffer;

use crate::errors::ChainError;
use crate::layout::{FsLayout, FsType};

/// FAT16 links at or above this value end the chain.
pub const FAT16_EOC_MIN: u16 = 0xFFF0;
/// Raw FAT32 values that end the chain before masking.
pub const FAT32_EOC: [u32; 3] = [0x0FFF_FFFF, 0x0FFF_FFF8, 0xFFFF_FFFF];
pub const FAT32_ENTRY_MASK: u32 = 0x0FFF_FFFF;

/// Decoded FAT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Next(u32),
    End,
    /// Free, reserved or outside the data area.
    Invalid(u32),
}

impl Link {
    pub fn fat16(raw: u16, last_cluster: u32) -> Self {
        if raw >= FAT16_EOC_MIN {
            return Link::End;
        }
        Self::bounded(raw as u32, last_cluster)
    }

    pub fn fat32(raw: u32, last_cluster: u32) -> Self {
        if FAT32_EOC.contains(&raw) {
            return Link::End;
        }
        Self::bounded(raw & FAT32_ENTRY_MASK, last_cluster)
    }

    #[inline]
    fn bounded(cluster: u32, last_cluster: u32) -> Self {
        if (2..=last_cluster).contains(&cluster) {
            Link::Next(cluster)
        } else {
            Link::Invalid(cluster)
        }
    }

    /// Reads the entry for `cluster` out of the FAT sector held in `buffer`.
    /// The buffer must hold the sector given by [`FsLayout::fat_entry_location`].
    pub fn read(layout: &FsLayout, buffer: &SectorBuffer, cluster: u32) -> Self {
        let (_, offset) = layout.fat_entry_location(cluster);
        match layout.fs_type {
            FsType::Fat32 => Self::fat32(buffer.u32_at(offset.get()), layout.last_cluster()),
            _ => Self::fat16(buffer.u16_at(offset.get()), layout.last_cluster()),
        }
    }
}

/// Position inside a cluster chain, one sector at a time.
///
/// After the last sector of a cluster the cursor waits for the next link,
/// which the caller reads from the FAT and hands to [`ClusterCursor::follow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterCursor {
    cluster: u32,
    sector: u8,
    awaiting_link: bool,
    seen: u32,
}

impl ClusterCursor {
    pub fn start(layout: &FsLayout, cluster: u32) -> Result<Self, ChainError> {
        if !layout.is_data_cluster(cluster) {
            return Err(ChainError::InvalidCluster(cluster));
        }
        Ok(Self {
            cluster,
            sector: 0,
            awaiting_link: false,
            seen: 1,
        })
    }

    #[inline]
    pub fn cluster(&self) -> u32 {
        self.cluster
    }

    /// Index of the current sector inside its cluster.
    #[inline]
    pub fn sector_index(&self) -> u8 {
        self.sector
    }

    #[inline]
    pub fn is_awaiting_link(&self) -> bool {
        self.awaiting_link
    }

    /// Absolute sector the cursor points at.
    #[inline]
    pub fn sector(&self, layout: &FsLayout) -> u32 {
        layout.cluster_sector(self.cluster) + self.sector as u32
    }

    /// FAT sector to read before [`ClusterCursor::follow`] can be called.
    #[inline]
    pub fn link_sector(&self, layout: &FsLayout) -> u32 {
        layout.fat_entry_location(self.cluster).0
    }

    /// Moves past the current sector.
    pub fn advance(&mut self, layout: &FsLayout) {
        if self.awaiting_link {
            return;
        }
        if self.sector as u32 + 1 >= layout.sectors_per_cluster as u32 {
            self.awaiting_link = true;
        } else {
            self.sector += 1;
        }
    }

    /// Applies the link of the current cluster. `Ok(false)` at end of chain.
    pub fn follow(&mut self, layout: &FsLayout, link: Link) -> Result<bool, ChainError> {
        match link {
            Link::End => Ok(false),
            Link::Invalid(c) => Err(ChainError::InvalidCluster(c)),
            Link::Next(next) => {
                self.seen += 1;
                if self.seen > layout.cluster_count {
                    return Err(ChainError::LoopDetected);
                }
                self.cluster = next;
                self.sector = 0;
                self.awaiting_link = false;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(fs_type: FsType, spc: u8, clusters: u32) -> FsLayout {
        FsLayout {
            fs_type,
            partition_lba: 0,
            bytes_per_sector: 512,
            sectors_per_cluster: spc,
            reserved_sectors: 1,
            num_fats: 2,
            fat_size: 8,
            fat_start: 1,
            root_start: 17,
            root_sectors: 32,
            data_start: 49,
            root_cluster: 0,
            cluster_count: clusters,
        }
    }

    #[test]
    fn test_fat16_links() {
        assert_eq!(Link::fat16(0xFFFF, 100), Link::End);
        assert_eq!(Link::fat16(0xFFF0, 100), Link::End);
        assert_eq!(Link::fat16(0xFFF7, 100), Link::End);
        assert_eq!(Link::fat16(7, 100), Link::Next(7));
        assert_eq!(Link::fat16(101, 100), Link::Next(101));
        assert_eq!(Link::fat16(102, 100), Link::Invalid(102));
        assert_eq!(Link::fat16(0, 100), Link::Invalid(0));
        assert_eq!(Link::fat16(1, 100), Link::Invalid(1));
    }

    #[test]
    fn test_fat32_links() {
        assert_eq!(Link::fat32(0x0FFF_FFFF, 100), Link::End);
        assert_eq!(Link::fat32(0x0FFF_FFF8, 100), Link::End);
        assert_eq!(Link::fat32(0xFFFF_FFFF, 100), Link::End);
        assert_eq!(Link::fat32(0xF000_0009, 100), Link::Next(9));
        assert_eq!(Link::fat32(0x0FFF_FFF7, 100), Link::Invalid(0x0FFF_FFF7));
        assert_eq!(Link::fat32(0, 100), Link::Invalid(0));
    }

    #[test]
    fn test_read_link_from_buffer() {
        let l16 = layout(FsType::Fat16, 1, 5000);
        let mut buf = SectorBuffer::new();
        // cluster 300 -> byte 600 -> offset 88 in the second FAT sector
        buf.as_bytes_mut()[88..90].copy_from_slice(&301u16.to_le_bytes());
        assert_eq!(l16.fat_entry_location(300).0, 2);
        assert_eq!(Link::read(&l16, &buf, 300), Link::Next(301));

        let l32 = layout(FsType::Fat32, 1, 70_000);
        buf.as_bytes_mut()[8..12].copy_from_slice(&0x0FFF_FFF8u32.to_le_bytes());
        assert_eq!(Link::read(&l32, &buf, 130), Link::End);
    }

    #[test]
    fn test_cursor_walks_sectors_then_waits() {
        let l = layout(FsType::Fat16, 4, 5000);
        let mut c = ClusterCursor::start(&l, 5).unwrap();
        assert_eq!(c.sector(&l), 49 + 12);
        for i in 1..4 {
            c.advance(&l);
            assert_eq!(c.sector_index(), i);
            assert!(!c.is_awaiting_link());
        }
        c.advance(&l);
        assert!(c.is_awaiting_link());
        assert_eq!(c.link_sector(&l), 1);

        assert_eq!(c.follow(&l, Link::Next(9)), Ok(true));
        assert_eq!(c.cluster(), 9);
        assert_eq!(c.sector(&l), 49 + 28);
        assert_eq!(c.follow(&l, Link::End), Ok(false));
    }

    #[test]
    fn test_cursor_rejects_bad_start() {
        let l = layout(FsType::Fat16, 1, 5000);
        assert_eq!(ClusterCursor::start(&l, 1), Err(ChainError::InvalidCluster(1)));
        assert_eq!(ClusterCursor::start(&l, 5002), Err(ChainError::InvalidCluster(5002)));
        assert!(ClusterCursor::start(&l, 5001).is_ok());
    }

    #[test]
    fn test_cursor_detects_loop() {
        let l = layout(FsType::Fat16, 1, 4);
        let mut c = ClusterCursor::start(&l, 2).unwrap();
        let mut result = Ok(true);
        for step in 0..10 {
            result = c.follow(&l, Link::Next(if step % 2 == 0 { 3 } else { 2 }));
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result, Err(ChainError::LoopDetected));
    }

    #[test]
    fn test_cursor_invalid_link() {
        let l = layout(FsType::Fat16, 1, 4);
        let mut c = ClusterCursor::start(&l, 2).unwrap();
        assert_eq!(c.follow(&l, Link::Invalid(0)), Err(ChainError::InvalidCluster(0)));
    }
}
