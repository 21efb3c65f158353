// SPDX-License-Identifier: MIT

//! Top-level file reader: one [`SectorSource`], one [`Walker`], one [`FileStream`],
//! all advanced from a single `tick()`.

use sdrio::{BlockIOError, SectorSource};

use crate::errors::{FsReadError, FsReadResult};
use crate::layout::FsType;
use crate::name::TargetName;
use crate::stream::{FileStream, StreamByte};
use crate::walker::{DEFAULT_BOOT_SEARCH_LIMIT, Outcome, Walker, WalkerState};

/// Reader configuration, fixed for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    pub target: TargetName,
    /// Sectors probed, from 0 upward, for a boot record or partition table.
    pub boot_search_limit: u32,
}

impl ReaderConfig {
    pub fn new(target: &str) -> FsReadResult<Self> {
        Ok(Self::for_target(TargetName::new(target)?))
    }

    pub fn for_target(target: TargetName) -> Self {
        Self {
            target,
            boot_search_limit: DEFAULT_BOOT_SEARCH_LIMIT,
        }
    }

    pub fn with_boot_search_limit(mut self, sectors: u32) -> Self {
        self.boot_search_limit = sectors;
        self
    }
}

/// Snapshot of the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStatus {
    pub fs_type: FsType,
    pub state: WalkerState,
    pub outcome: Outcome,
    pub found: bool,
    pub file_size: u32,
    pub emitted: u64,
    /// Sectors completed by the source for this walk.
    pub sectors: u64,
}

#[derive(Debug)]
pub struct FileReader<S: SectorSource> {
    source: S,
    walker: Walker,
    stream: FileStream,
    io_error: Option<BlockIOError>,
    sectors: u64,
}

impl<S: SectorSource> FileReader<S> {
    pub fn new(source: S, config: ReaderConfig) -> Self {
        Self {
            source,
            walker: Walker::new(config.target, config.boot_search_limit),
            stream: FileStream::new(),
            io_error: None,
            sectors: 0,
        }
    }

    pub fn status(&self) -> ReaderStatus {
        let found = self.walker.found();
        ReaderStatus {
            fs_type: self.walker.fs_type(),
            state: self.walker.state(),
            outcome: self.walker.outcome(),
            found: found.is_some(),
            file_size: found.map_or(0, |f| f.size),
            emitted: self.stream.emitted(),
            sectors: self.sectors,
        }
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.walker.is_done()
    }

    #[inline]
    pub fn walker(&self) -> &Walker {
        &self.walker
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[inline]
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Hard reset of the source and every state machine.
    pub fn reset(&mut self) {
        self.source.reset();
        self.walker.reset();
        self.stream.reset();
        self.io_error = None;
        self.sectors = 0;
    }

    /// Advances everything by one tick and returns this tick's stream output.
    pub fn tick(&mut self) -> StreamByte {
        if self.walker.is_done() {
            return StreamByte::INVALID;
        }
        if !self.source.is_ready() {
            self.source.tick();
            return StreamByte::INVALID;
        }

        self.walker.begin();
        if !self.source.is_busy() {
            if let Some(sector) = self.walker.next_read() {
                if let Err(e) = self.source.start_read(sector) {
                    log::warn!("read of sector {sector} refused: {e}");
                    self.io_error = Some(e);
                    return StreamByte::INVALID;
                }
            }
        }

        let tick = self.source.tick();
        let mut out = StreamByte::INVALID;
        if let Some(byte) = tick.byte {
            if let Some(value) = self.walker.on_byte(byte) {
                out = self.stream.push(value);
            }
        }
        if tick.done {
            self.sectors += 1;
            self.walker.on_sector(self.source.buffer());
            if let Some(found) = self.walker.found() {
                if !self.stream.is_open() {
                    self.stream.open(found.size);
                }
            }
            if self.walker.is_done() {
                self.stream.close();
            }
        }
        out
    }

    /// Ticks until the walk finishes or `max_ticks` elapse, handing every valid
    /// byte to `sink`. Returns the number of bytes emitted.
    pub fn run<F: FnMut(u8)>(&mut self, mut sink: F, max_ticks: u64) -> FsReadResult<u64> {
        for _ in 0..max_ticks {
            let out = self.tick();
            if out.valid {
                sink(out.byte);
            }
            if let Some(e) = self.io_error.take() {
                return Err(FsReadError::IO(e));
            }
            if let Some(result) = self.result() {
                return result;
            }
        }
        Err(FsReadError::Stalled { ticks: max_ticks })
    }

    /// Terminal result, `None` while the walk is in progress.
    pub fn result(&self) -> Option<FsReadResult<u64>> {
        match self.walker.outcome() {
            Outcome::Pending => None,
            Outcome::Complete => Some(Ok(self.stream.emitted())),
            Outcome::NotFound => Some(Err(FsReadError::NotFound)),
            Outcome::Unsupported => Some(Err(FsReadError::Unsupported)),
            Outcome::Corrupted => Some(Err(FsReadError::Corrupted)),
        }
    }
}
