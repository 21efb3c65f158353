// SPDX-License-Identifier: MIT

//! Byte-per-tick [`SectorSource`] over any [`BlockIO`].
//!
//! Lets the filesystem layer run against a plain image without the bus model in
//! between. Timing mirrors a card host: the request is latched, the sector is
//! loaded on the following tick, then one byte is emitted per tick and `done`
//! pulses on the tick after the last byte.

use crate::{BlockIO, BlockIOExt, BlockIOError, BlockIOResult};
use crate::sector::{SectorBuffer, SectorByte, SectorOffset, SectorSource, SectorTick};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Load(u32),
    Stream(SectorOffset),
    Finish,
}

#[derive(Debug)]
pub struct BlockSectorSource<IO: BlockIO> {
    io: IO,
    buffer: SectorBuffer,
    latched: Option<u32>,
    phase: Phase,
    reads: u64,
}

impl<IO: BlockIO> BlockSectorSource<IO> {
    pub fn new(io: IO) -> Self {
        Self {
            io,
            buffer: SectorBuffer::new(),
            latched: None,
            phase: Phase::Idle,
            reads: 0,
        }
    }

    /// Number of sectors fully delivered since construction or reset.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn into_inner(self) -> IO {
        self.io
    }
}

impl<IO: BlockIO> SectorSource for BlockSectorSource<IO> {
    fn is_ready(&self) -> bool {
        true
    }

    fn is_busy(&self) -> bool {
        self.latched.is_some() || self.phase != Phase::Idle
    }

    fn start_read(&mut self, sector: u32) -> BlockIOResult {
        if self.is_busy() {
            return Err(BlockIOError::Busy);
        }
        self.latched = Some(sector);
        Ok(())
    }

    fn tick(&mut self) -> SectorTick {
        if let Some(sector) = self.latched.take() {
            self.phase = Phase::Load(sector);
        }

        match self.phase {
            Phase::Idle => SectorTick::IDLE,
            Phase::Load(sector) => {
                match self.io.read_sector(sector as u64, self.buffer.as_bytes_mut()) {
                    Ok(()) => self.phase = Phase::Stream(SectorOffset::FIRST),
                    Err(e) => log::warn!("sector {sector}: {e}, retrying"),
                }
                SectorTick::IDLE
            }
            Phase::Stream(offset) => {
                self.phase = match offset.next() {
                    Some(next) => Phase::Stream(next),
                    None => Phase::Finish,
                };
                SectorTick {
                    byte: Some(SectorByte {
                        offset,
                        value: self.buffer.get(offset),
                    }),
                    done: false,
                }
            }
            Phase::Finish => {
                self.phase = Phase::Idle;
                self.reads += 1;
                SectorTick {
                    byte: None,
                    done: true,
                }
            }
        }
    }

    fn buffer(&self) -> &SectorBuffer {
        &self.buffer
    }

    fn reset(&mut self) {
        self.latched = None;
        self.phase = Phase::Idle;
        self.reads = 0;
        self.buffer.clear();
    }
}
