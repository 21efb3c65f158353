// SPDX-License-Identifier: MIT

//! Filesystem walker.
//!
//! Finds the boot record, scans the root directory for the target name and
//! follows the file's cluster chain. The walker never touches the medium
//! itself: it names the next sector it needs, consumes that sector's bytes as
//! they stream in, and moves on once the sector is complete.

use core::fmt;

use sdrio::{SectorBuffer, SectorByte, SectorOffset};

use crate::cluster::{ClusterCursor, Link};
use crate::entry::{EntryParser, SlotEvent};
use crate::errors::LayoutError;
use crate::layout::{FsLayout, FsType};
use crate::name::{NameDisplay, TargetName};
use crate::types::{BootRecord, JUMP_NEAR, JUMP_SHORT, MbrEntry};

/// Sectors probed for a boot record or partition table.
pub const DEFAULT_BOOT_SEARCH_LIMIT: u32 = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkerState {
    #[default]
    Reset,
    SearchBootRecord,
    SearchFilesystemRecord,
    ScanRoot,
    FatLookup,
    ReadFile,
    Done,
}

impl fmt::Display for WalkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WalkerState::Reset => "reset",
            WalkerState::SearchBootRecord => "search boot record",
            WalkerState::SearchFilesystemRecord => "search filesystem record",
            WalkerState::ScanRoot => "scan root",
            WalkerState::FatLookup => "FAT lookup",
            WalkerState::ReadFile => "read file",
            WalkerState::Done => "done",
        };
        f.write_str(s)
    }
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Pending,
    Complete,
    NotFound,
    Unsupported,
    Corrupted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Pending => "pending",
            Outcome::Complete => "complete",
            Outcome::NotFound => "not found",
            Outcome::Unsupported => "unsupported",
            Outcome::Corrupted => "corrupted",
        };
        f.write_str(s)
    }
}

/// Directory entry of the matched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundFile {
    pub first_cluster: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chain {
    Root,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Reset,
    SearchBootRecord { probe: u32 },
    SearchFilesystemRecord { lba: u32 },
    ScanRoot,
    FatLookup(Chain),
    ReadFile,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootCursor {
    /// FAT16 fixed region `[next, end)`.
    Fixed { next: u32, end: u32 },
    Chained(ClusterCursor),
}

#[derive(Debug, Clone)]
pub struct Walker {
    target: TargetName,
    boot_search_limit: u32,
    step: Step,
    outcome: Outcome,
    /// Partition to mount when a jump-prefixed sector 0 turns out to be boot code.
    fallback: Option<u32>,
    layout: Option<FsLayout>,
    parser: EntryParser,
    root: Option<RootCursor>,
    file: Option<ClusterCursor>,
    found: Option<FoundFile>,
}

impl Walker {
    pub fn new(target: TargetName, boot_search_limit: u32) -> Self {
        Self {
            target,
            boot_search_limit: boot_search_limit.max(1),
            step: Step::Reset,
            outcome: Outcome::Pending,
            fallback: None,
            layout: None,
            parser: EntryParser::new(),
            root: None,
            file: None,
            found: None,
        }
    }

    pub fn reset(&mut self) {
        self.step = Step::Reset;
        self.outcome = Outcome::Pending;
        self.fallback = None;
        self.layout = None;
        self.parser.reset();
        self.root = None;
        self.file = None;
        self.found = None;
    }

    /// Leaves `Reset` and starts probing at sector 0.
    pub fn begin(&mut self) {
        if self.step == Step::Reset {
            log::debug!("searching boot record for {}", self.target);
            self.step = Step::SearchBootRecord { probe: 0 };
        }
    }

    pub fn state(&self) -> WalkerState {
        match self.step {
            Step::Reset => WalkerState::Reset,
            Step::SearchBootRecord { .. } => WalkerState::SearchBootRecord,
            Step::SearchFilesystemRecord { .. } => WalkerState::SearchFilesystemRecord,
            Step::ScanRoot => WalkerState::ScanRoot,
            Step::FatLookup(_) => WalkerState::FatLookup,
            Step::ReadFile => WalkerState::ReadFile,
            Step::Done => WalkerState::Done,
        }
    }

    #[inline]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.step == Step::Done
    }

    #[inline]
    pub fn found(&self) -> Option<FoundFile> {
        self.found
    }

    #[inline]
    pub fn layout(&self) -> Option<&FsLayout> {
        self.layout.as_ref()
    }

    pub fn fs_type(&self) -> FsType {
        self.layout.map_or(FsType::Unknown, |l| l.fs_type)
    }

    #[inline]
    pub fn target(&self) -> &TargetName {
        &self.target
    }

    /// Sector the walker needs next, `None` before `begin` and once done.
    pub fn next_read(&self) -> Option<u32> {
        match self.step {
            Step::SearchBootRecord { probe } => Some(probe),
            Step::SearchFilesystemRecord { lba } => Some(lba),
            Step::ScanRoot => match self.root? {
                RootCursor::Fixed { next, .. } => Some(next),
                RootCursor::Chained(c) => Some(c.sector(&self.layout?)),
            },
            Step::FatLookup(chain) => {
                let layout = self.layout?;
                self.cursor(chain).map(|c| c.link_sector(&layout))
            }
            Step::ReadFile => {
                let layout = self.layout?;
                self.file.map(|c| c.sector(&layout))
            }
            Step::Reset | Step::Done => None,
        }
    }

    /// Consumes one byte of the sector in flight. Returns file data while
    /// reading the target file.
    pub fn on_byte(&mut self, byte: SectorByte) -> Option<u8> {
        match self.step {
            Step::ScanRoot => {
                self.scan(byte);
                None
            }
            Step::ReadFile => Some(byte.value),
            _ => None,
        }
    }

    /// Called once the sector requested through [`Walker::next_read`] is
    /// complete in `buffer`.
    pub fn on_sector(&mut self, buffer: &SectorBuffer) {
        match self.step {
            Step::SearchBootRecord { probe } => self.probe_boot(probe, buffer),
            Step::SearchFilesystemRecord { lba } => self.mount(lba, buffer),
            Step::ScanRoot => self.root_sector_done(),
            Step::FatLookup(chain) => self.follow(chain, buffer),
            Step::ReadFile => self.file_sector_done(),
            Step::Reset | Step::Done => {}
        }
    }

    fn cursor(&self, chain: Chain) -> Option<ClusterCursor> {
        match chain {
            Chain::Root => match self.root {
                Some(RootCursor::Chained(c)) => Some(c),
                _ => None,
            },
            Chain::File => self.file,
        }
    }

    fn cursor_mut(&mut self, chain: Chain) -> Option<&mut ClusterCursor> {
        match chain {
            Chain::Root => match self.root.as_mut() {
                Some(RootCursor::Chained(c)) => Some(c),
                _ => None,
            },
            Chain::File => self.file.as_mut(),
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        log::debug!("walk of {} finished: {outcome}", self.target);
        self.step = Step::Done;
        self.outcome = outcome;
    }

    fn probe_boot(&mut self, probe: u32, buffer: &SectorBuffer) {
        if buffer.has_signature() {
            if matches!(buffer.get(SectorOffset::FIRST), JUMP_SHORT | JUMP_NEAR) {
                log::debug!("boot record at sector {probe}");
                self.fallback = MbrEntry::first_partition(buffer).filter(|&lba| lba != probe);
                self.step = Step::SearchFilesystemRecord { lba: probe };
            } else {
                match MbrEntry::first_partition(buffer) {
                    Some(lba) => {
                        log::debug!("partition table at sector {probe}, boot record at {lba}");
                        self.step = Step::SearchFilesystemRecord { lba };
                    }
                    None => {
                        log::warn!("partition table at sector {probe} is empty");
                        self.finish(Outcome::Unsupported);
                    }
                }
            }
            return;
        }

        let next = probe + 1;
        if next >= self.boot_search_limit {
            log::warn!("no boot record in the first {} sectors", self.boot_search_limit);
            self.finish(Outcome::Unsupported);
        } else {
            self.step = Step::SearchBootRecord { probe: next };
        }
    }

    fn mount(&mut self, lba: u32, buffer: &SectorBuffer) {
        let boot = BootRecord::from_sector(buffer);
        let layout = match FsLayout::from_boot(lba, &boot) {
            Ok(layout) => layout,
            Err(e) => {
                if let Some(next) = self.fallback.take() {
                    log::debug!("sector {lba} is not a boot record ({e}), trying partition at {next}");
                    self.step = Step::SearchFilesystemRecord { lba: next };
                    return;
                }
                log::warn!("boot record at sector {lba}: {e}");
                self.finish(match e {
                    LayoutError::Geometry(_) => Outcome::Corrupted,
                    _ => Outcome::Unsupported,
                });
                return;
            }
        };
        self.fallback = None;
        log::debug!("{layout}");
        self.layout = Some(layout);
        self.parser.reset();

        let root = match layout.fs_type {
            FsType::Fat32 => match ClusterCursor::start(&layout, layout.root_cluster) {
                Ok(cursor) => RootCursor::Chained(cursor),
                Err(e) => {
                    log::warn!("root directory: {e}");
                    self.finish(Outcome::Corrupted);
                    return;
                }
            },
            _ => RootCursor::Fixed {
                next: layout.root_start,
                end: layout.root_start + layout.root_sectors,
            },
        };
        self.root = Some(root);
        match root {
            RootCursor::Fixed { next, end } if next >= end => self.finish(Outcome::NotFound),
            _ => self.step = Step::ScanRoot,
        }
    }

    fn scan(&mut self, byte: SectorByte) {
        if self.found.is_some() {
            return;
        }
        if let SlotEvent::Entry(record) = self.parser.push(byte.offset, byte.value) {
            log::trace!(
                "entry {} ({} bytes, cluster {})",
                NameDisplay(&record.name),
                record.size,
                record.first_cluster
            );
            if !record.attr.is_dir() && self.target.matches(&record.name, record.long_name) {
                log::debug!(
                    "found {} at cluster {}, {} bytes",
                    self.target,
                    record.first_cluster,
                    record.size
                );
                self.found = Some(FoundFile {
                    first_cluster: record.first_cluster,
                    size: record.size,
                });
            }
        }
    }

    fn root_sector_done(&mut self) {
        if let Some(found) = self.found {
            self.open_file(found);
            return;
        }
        if self.parser.is_ended() {
            self.finish(Outcome::NotFound);
            return;
        }
        let Some(layout) = self.layout else {
            self.finish(Outcome::Unsupported);
            return;
        };

        let exhausted = match self.root.as_mut() {
            Some(RootCursor::Fixed { next, end }) => {
                *next += 1;
                *next >= *end
            }
            Some(RootCursor::Chained(cursor)) => {
                cursor.advance(&layout);
                if cursor.is_awaiting_link() {
                    self.step = Step::FatLookup(Chain::Root);
                }
                false
            }
            None => true,
        };
        if exhausted {
            self.finish(Outcome::NotFound);
        }
    }

    fn open_file(&mut self, found: FoundFile) {
        if found.size == 0 {
            self.finish(Outcome::Complete);
            return;
        }
        let Some(layout) = self.layout else {
            self.finish(Outcome::Unsupported);
            return;
        };
        match ClusterCursor::start(&layout, found.first_cluster) {
            Ok(cursor) => {
                self.file = Some(cursor);
                self.step = Step::ReadFile;
            }
            Err(e) => {
                log::warn!("{}: {e}", self.target);
                self.finish(Outcome::Corrupted);
            }
        }
    }

    fn follow(&mut self, chain: Chain, buffer: &SectorBuffer) {
        let Some(layout) = self.layout else {
            self.finish(Outcome::Unsupported);
            return;
        };
        let Some(cursor) = self.cursor_mut(chain) else {
            self.finish(Outcome::Corrupted);
            return;
        };
        let link = Link::read(&layout, buffer, cursor.cluster());
        let result = cursor.follow(&layout, link);

        match (chain, result) {
            (Chain::Root, Ok(true)) => self.step = Step::ScanRoot,
            (Chain::File, Ok(true)) => self.step = Step::ReadFile,
            (Chain::Root, Ok(false)) => self.finish(Outcome::NotFound),
            (Chain::File, Ok(false)) => self.finish(Outcome::Complete),
            (_, Err(e)) => {
                log::warn!("{}: {e}", self.target);
                self.finish(Outcome::Corrupted);
            }
        }
    }

    fn file_sector_done(&mut self) {
        let Some(layout) = self.layout else {
            self.finish(Outcome::Unsupported);
            return;
        };
        if let Some(cursor) = self.file.as_mut() {
            cursor.advance(&layout);
            if cursor.is_awaiting_link() {
                self.step = Step::FatLookup(Chain::File);
            }
        }
    }
}
