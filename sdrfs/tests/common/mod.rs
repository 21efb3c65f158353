// SPDX-License-Identifier: MIT
#![allow(dead_code)]

use sdrfs::name::lfn_checksum;
use sdrfs::types::*;
use sdrio::prelude::*;
use zerocopy::{FromZeros, IntoBytes};

pub const FAT16_CLUSTERS: u32 = 4200;
pub const FAT32_CLUSTERS: u32 = 5000;
pub const FAT16_EOC: u32 = 0xFFFF;
pub const FAT32_EOC: u32 = 0x0FFF_FFFF;

/// Hand-built FAT16/FAT32 volume with precise control over every entry.
pub struct TestImage {
    pub bytes: Vec<u8>,
    pub fat32: bool,
    pub partition_lba: u32,
    pub spc: u8,
    pub fat_start: u32,
    pub fat_size: u32,
    pub root_start: u32,
    pub root_sectors: u32,
    pub data_start: u32,
    next_slot: usize,
}

impl TestImage {
    pub fn fat16(partition_lba: u32, spc: u8) -> Self {
        let fat_size = ((FAT16_CLUSTERS + 2) * 2).div_ceil(SECTOR_SIZE as u32);
        Self::build(false, partition_lba, spc, 1, fat_size, 512)
    }

    pub fn fat32(partition_lba: u32, spc: u8) -> Self {
        let fat_size = ((FAT32_CLUSTERS + 2) * 4).div_ceil(SECTOR_SIZE as u32);
        let mut img = Self::build(true, partition_lba, spc, 32, fat_size, 0);
        img.set_fat(2, FAT32_EOC);
        img
    }

    fn build(fat32: bool, partition_lba: u32, spc: u8, reserved: u16, fat_size: u32, root_entries: u16) -> Self {
        let clusters = if fat32 { FAT32_CLUSTERS } else { FAT16_CLUSTERS };
        let root_sectors = root_entries as u32 * 32 / SECTOR_SIZE as u32;
        let meta = reserved as u32 + 2 * fat_size + root_sectors;
        let total = meta + clusters * spc as u32;

        let mut b = BootRecord::new_zeroed();
        b.jump_boot = [JUMP_SHORT, 0x58, 0x90];
        b.oem_name = *b"MSWIN4.1";
        b.bytes_per_sector = SECTOR_SIZE as u16;
        b.sectors_per_cluster = spc;
        b.reserved_sectors = reserved;
        b.num_fats = 2;
        b.root_entry_count = root_entries;
        b.media = 0xF8;
        b.total_sectors_32 = total;
        if fat32 {
            b.fat_size_32 = fat_size;
            b.root_cluster = 2;
        } else {
            b.fat_size_16 = fat_size as u16;
        }
        b.signature = BOOT_SIGNATURE;

        let mut bytes = vec![0u8; (partition_lba + total) as usize * SECTOR_SIZE];
        let at = partition_lba as usize * SECTOR_SIZE;
        bytes[at..at + SECTOR_SIZE].copy_from_slice(b.as_bytes());

        let fat_start = partition_lba + reserved as u32;
        let root_start = fat_start + 2 * fat_size;
        let mut img = Self {
            bytes,
            fat32,
            partition_lba,
            spc,
            fat_start,
            fat_size,
            root_start,
            root_sectors,
            data_start: root_start + root_sectors,
            next_slot: 0,
        };
        if partition_lba > 0 {
            img.write_mbr(MbrEntry::new(if fat32 { 0x0C } else { 0x0E }, partition_lba, total));
        }
        img
    }

    pub fn write_mbr(&mut self, entry: MbrEntry) {
        let at = PARTITION_TABLE_OFFSET;
        self.bytes[at..at + 16].copy_from_slice(entry.as_bytes());
        self.bytes[510] = 0x55;
        self.bytes[511] = 0xAA;
    }

    pub fn patch_boot(&mut self, offset: usize, data: &[u8]) {
        let at = self.partition_lba as usize * SECTOR_SIZE + offset;
        self.bytes[at..at + data.len()].copy_from_slice(data);
    }

    pub fn cluster_offset(&self, cluster: u32) -> usize {
        (self.data_start + (cluster - 2) * self.spc as u32) as usize * SECTOR_SIZE
    }

    pub fn cluster_bytes(&self) -> usize {
        self.spc as usize * SECTOR_SIZE
    }

    /// Writes `value` into the entry of `cluster` in both FAT copies.
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        let width = if self.fat32 { 4 } else { 2 };
        for copy in 0..2 {
            let at = (self.fat_start + copy * self.fat_size) as usize * SECTOR_SIZE + cluster as usize * width;
            if self.fat32 {
                self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
            } else {
                self.bytes[at..at + 2].copy_from_slice(&(value as u16).to_le_bytes());
            }
        }
    }

    pub fn eoc(&self) -> u32 {
        if self.fat32 { FAT32_EOC } else { FAT16_EOC }
    }

    /// Links `chain` in the FAT, terminated by end-of-chain.
    pub fn link(&mut self, chain: &[u32]) {
        for pair in chain.windows(2) {
            self.set_fat(pair[0], pair[1]);
        }
        if let Some(&last) = chain.last() {
            let eoc = self.eoc();
            self.set_fat(last, eoc);
        }
    }

    /// Spreads `data` over the clusters of `chain`.
    pub fn write_chain(&mut self, chain: &[u32], data: &[u8]) {
        let size = self.cluster_bytes();
        for (cluster, chunk) in chain.iter().zip(data.chunks(size)) {
            let at = self.cluster_offset(*cluster);
            self.bytes[at..at + chunk.len()].copy_from_slice(chunk);
        }
    }

    /// Byte offset of root directory slot `index`. FAT32 roots live in cluster 2
    /// and, past its end, in the clusters set with [`TestImage::extend_root`].
    fn slot_offset(&self, index: usize) -> usize {
        if self.fat32 {
            let per_cluster = self.cluster_bytes() / 32;
            let mut cluster = 2u32;
            for _ in 0..index / per_cluster {
                let at = self.fat_start as usize * SECTOR_SIZE + cluster as usize * 4;
                cluster = u32::from_le_bytes(self.bytes[at..at + 4].try_into().unwrap()) & 0x0FFF_FFFF;
            }
            self.cluster_offset(cluster) + (index % per_cluster) * 32
        } else {
            self.root_start as usize * SECTOR_SIZE + index * 32
        }
    }

    /// Chains extra clusters behind the FAT32 root cluster.
    pub fn extend_root(&mut self, clusters: &[u32]) {
        let mut chain = vec![2];
        chain.extend_from_slice(clusters);
        self.link(&chain);
    }

    pub fn push_slot(&mut self, slot: &[u8]) {
        let at = self.slot_offset(self.next_slot);
        self.bytes[at..at + 32].copy_from_slice(slot);
        self.next_slot += 1;
    }

    pub fn skip_slots(&mut self, count: usize) {
        for _ in 0..count {
            let mut deleted = [0u8; 32];
            deleted[0] = SLOT_DELETED;
            deleted[1..11].copy_from_slice(b"UNUSED TXT");
            deleted[11] = 0x20;
            self.push_slot(&deleted);
        }
    }

    pub fn push_entry(&mut self, name: &[u8; 11], attr: u8, cluster: u32, size: u32) {
        let e = DirEntry::new(*name, attr, cluster, size);
        self.push_slot(e.as_bytes());
    }

    /// Long-name slots (last first) followed by their short entry.
    pub fn push_long_entry(&mut self, long: &str, short: &[u8; 11], cluster: u32, size: u32) {
        let units: Vec<u16> = long.encode_utf16().collect();
        let chunks: Vec<&[u16]> = units.chunks(LFN_CHARS_PER_SLOT).collect();
        let sum = lfn_checksum(short);
        for i in (0..chunks.len()).rev() {
            let slot = LfnEntry::new(i as u8 + 1, i + 1 == chunks.len(), chunks[i], sum);
            self.push_slot(slot.as_bytes());
        }
        self.push_entry(short, 0x20, cluster, size);
    }

    /// Entry + data + FAT chain for a file.
    pub fn add_file(&mut self, name: &[u8; 11], chain: &[u32], data: &[u8]) {
        self.push_entry(name, 0x20, chain.first().copied().unwrap_or(0), data.len() as u32);
        self.link(chain);
        self.write_chain(chain, data);
    }
}

/// Reads `name` from `image` through a byte-per-tick source.
pub fn read_direct(image: &mut [u8], name: &str, max_ticks: u64) -> (sdrfs::errors::FsReadResult<u64>, Vec<u8>, sdrfs::ReaderStatus) {
    let source = BlockSectorSource::new(MemBlockIO::new(image));
    let mut reader = sdrfs::FileReader::new(source, sdrfs::ReaderConfig::new(name).unwrap());
    let mut out = Vec::new();
    let result = reader.run(|b| out.push(b), max_ticks);
    let status = reader.status();
    (result, out, status)
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed) ^ (i >> 8) as u8).collect()
}
