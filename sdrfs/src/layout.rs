// SPDX-License-Identifier: MIT

//! Filesystem descriptor derived from a boot record.
//!
//! All sector numbers are absolute (partition start included).

use core::fmt;

use sdrio::{SECTOR_SIZE, SectorOffset};

use crate::errors::LayoutError;
use crate::types::{BootRecord, DIR_ENTRY_SIZE};

/// A FAT with fewer data clusters than this is FAT12.
pub const FAT12_CLUSTER_LIMIT: u32 = 4085;

/// One past the last sector addressable with a 32-bit sector number.
const SECTOR_RANGE: u64 = 1 << 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FsType {
    #[default]
    Unknown,
    Fat16,
    Fat32,
}

impl FsType {
    /// Size in bytes of one FAT entry.
    #[inline]
    pub fn entry_size(self) -> u32 {
        match self {
            FsType::Fat32 => 4,
            _ => 2,
        }
    }
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsType::Unknown => "unknown",
            FsType::Fat16 => "FAT16",
            FsType::Fat32 => "FAT32",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsLayout {
    pub fs_type: FsType,
    pub partition_lba: u32,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    /// Sectors per FAT copy.
    pub fat_size: u32,
    pub fat_start: u32,
    /// FAT16 fixed root directory. Empty on FAT32.
    pub root_start: u32,
    pub root_sectors: u32,
    pub data_start: u32,
    /// FAT32 root directory cluster. 0 on FAT16.
    pub root_cluster: u32,
    pub cluster_count: u32,
}

impl FsLayout {
    pub fn from_boot(partition_lba: u32, boot: &BootRecord) -> Result<Self, LayoutError> {
        if !boot.has_signature() {
            return Err(LayoutError::MissingSignature);
        }
        let bytes_per_sector = boot.bytes_per_sector;
        if bytes_per_sector as usize != SECTOR_SIZE {
            return Err(LayoutError::SectorSize(bytes_per_sector));
        }
        let sectors_per_cluster = boot.sectors_per_cluster;
        if sectors_per_cluster == 0 {
            return Err(LayoutError::Geometry("Zero sectors per cluster"));
        }
        if boot.num_fats == 0 {
            return Err(LayoutError::Geometry("Zero FAT copies"));
        }

        let (fs_type, fat_size) = match boot.fat_size_16 {
            0 => (FsType::Fat32, boot.fat_size_32),
            n => (FsType::Fat16, n as u32),
        };
        if fat_size == 0 {
            return Err(LayoutError::Geometry("Zero FAT size"));
        }

        let root_sectors = match fs_type {
            FsType::Fat16 => {
                (boot.root_entry_count as u64 * DIR_ENTRY_SIZE as u64).div_ceil(SECTOR_SIZE as u64)
            }
            _ => 0,
        };
        let reserved = boot.reserved_sectors as u64;
        let fats = boot.num_fats as u64 * fat_size as u64;
        let meta_sectors = reserved + fats + root_sectors;
        let total_sectors = boot.total_sectors() as u64;
        if partition_lba as u64 + total_sectors > SECTOR_RANGE {
            return Err(LayoutError::Geometry("Volume beyond 32-bit sector range"));
        }

        let fat_start = partition_lba as u64 + reserved;
        let root_start = fat_start + fats;
        let data_start = root_start + root_sectors;
        if data_start >= SECTOR_RANGE {
            return Err(LayoutError::Geometry("Data area beyond 32-bit sector range"));
        }

        let data_sectors = total_sectors.saturating_sub(meta_sectors);
        let cluster_count = data_sectors / sectors_per_cluster as u64;
        if fs_type == FsType::Fat16 && cluster_count < FAT12_CLUSTER_LIMIT as u64 {
            return Err(LayoutError::Fat12 {
                clusters: cluster_count as u32,
            });
        }
        // Clusters past the end of the FAT have no link and are never valid.
        let fat_entries = fat_size as u64 * SECTOR_SIZE as u64 / fs_type.entry_size() as u64;
        let cluster_count = cluster_count.min(fat_entries.saturating_sub(2));
        if data_start + cluster_count * sectors_per_cluster as u64 > SECTOR_RANGE {
            return Err(LayoutError::Geometry("Data area beyond 32-bit sector range"));
        }

        Ok(Self {
            fs_type,
            partition_lba,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors: boot.reserved_sectors,
            num_fats: boot.num_fats,
            fat_size,
            fat_start: fat_start as u32,
            root_start: root_start as u32,
            root_sectors: root_sectors as u32,
            data_start: data_start as u32,
            root_cluster: match fs_type {
                FsType::Fat32 => boot.root_cluster,
                _ => 0,
            },
            cluster_count: cluster_count as u32,
        })
    }

    /// Highest valid data cluster number.
    #[inline]
    pub fn last_cluster(&self) -> u32 {
        self.cluster_count + 1
    }

    #[inline]
    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        (2..=self.last_cluster()).contains(&cluster)
    }

    /// First sector of `cluster`, which must pass [`FsLayout::is_data_cluster`].
    /// [`FsLayout::from_boot`] guarantees the result fits in 32 bits.
    #[inline]
    pub fn cluster_sector(&self, cluster: u32) -> u32 {
        self.data_start + (cluster - 2) * self.sectors_per_cluster as u32
    }

    /// Sector of the first FAT holding the entry for `cluster`, and the entry's offset in it.
    pub fn fat_entry_location(&self, cluster: u32) -> (u32, SectorOffset) {
        let byte = cluster as u64 * self.fs_type.entry_size() as u64;
        let sector = self.fat_start + (byte / SECTOR_SIZE as u64) as u32;
        let offset = SectorOffset::new((byte % SECTOR_SIZE as u64) as usize).unwrap_or(SectorOffset::FIRST);
        (sector, offset)
    }
}

impl fmt::Display for FsLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @{}: fat {} x{} ({} sectors), data {}, {} clusters of {} sectors",
            self.fs_type,
            self.partition_lba,
            self.fat_start,
            self.num_fats,
            self.fat_size,
            self.data_start,
            self.cluster_count,
            self.sectors_per_cluster
        )
    }
}
