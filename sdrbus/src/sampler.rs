// SPDX-License-Identifier: MIT

//! Block read bit sampler.
//!
//! Armed together with a read command. Waits for the data start bit on DAT0,
//! rebuilds 512 bytes from one or four lines, then swallows the CRC16 window
//! and the end bit.

use sdrio::{SectorBuffer, SectorByte, SectorOffset, SectorTick};

use crate::line::BusWidth;

/// Ticks allowed between arming and the data start bit.
pub const DEFAULT_DATA_TIMEOUT: u32 = 1_000_000;

/// CRC16 window plus end bit, identical for one and four lines.
const TRAILER_CYCLES: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    WaitStart { waited: u32 },
    Data { offset: SectorOffset, acc: u8, cycle: u8 },
    Trailer { remaining: u8 },
}

#[derive(Debug, Clone)]
pub struct Sampler {
    width: BusWidth,
    phase: Phase,
    data_timeout: u32,
}

impl Sampler {
    pub fn new(width: BusWidth, data_timeout: u32) -> Self {
        Self {
            width,
            phase: Phase::Idle,
            data_timeout: data_timeout.max(1),
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// True once the start bit was seen and until the block completes.
    #[inline]
    pub fn is_receiving(&self) -> bool {
        matches!(self.phase, Phase::Data { .. } | Phase::Trailer { .. })
    }

    #[inline]
    pub fn width(&self) -> BusWidth {
        self.width
    }

    /// Changes the line count. Ignored while a block is in progress.
    pub fn set_width(&mut self, width: BusWidth) {
        if self.is_idle() {
            self.width = width;
        }
    }

    pub fn arm(&mut self) {
        self.phase = Phase::WaitStart { waited: 0 };
    }

    pub fn abort(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Counts one tick of the start-bit budget. True on the tick it runs out.
    pub fn tick(&mut self) -> bool {
        if let Phase::WaitStart { waited } = self.phase {
            let waited = waited + 1;
            if waited >= self.data_timeout {
                self.phase = Phase::Idle;
                return true;
            }
            self.phase = Phase::WaitStart { waited };
        }
        false
    }

    /// Consumes the data lines of one bus cycle.
    pub fn sample(&mut self, dat: u8, buffer: &mut SectorBuffer) -> SectorTick {
        match self.phase {
            Phase::Idle => SectorTick::IDLE,
            Phase::WaitStart { .. } => {
                if dat & 1 == 0 {
                    self.phase = Phase::Data {
                        offset: SectorOffset::FIRST,
                        acc: 0,
                        cycle: 0,
                    };
                }
                SectorTick::IDLE
            }
            Phase::Data { offset, acc, cycle } => {
                let acc = match self.width {
                    BusWidth::Four => (acc << 4) | (dat & 0x0F),
                    BusWidth::One => (acc << 1) | (dat & 1),
                };
                let cycle = cycle + 1;
                if cycle < self.width.cycles_per_byte() {
                    self.phase = Phase::Data { offset, acc, cycle };
                    return SectorTick::IDLE;
                }

                buffer.set(offset, acc);
                self.phase = match offset.next() {
                    Some(offset) => Phase::Data {
                        offset,
                        acc: 0,
                        cycle: 0,
                    },
                    None => Phase::Trailer {
                        remaining: TRAILER_CYCLES,
                    },
                };
                SectorTick {
                    byte: Some(SectorByte { offset, value: acc }),
                    done: false,
                }
            }
            Phase::Trailer { remaining } if remaining > 1 => {
                self.phase = Phase::Trailer {
                    remaining: remaining - 1,
                };
                SectorTick::IDLE
            }
            Phase::Trailer { .. } => {
                self.phase = Phase::Idle;
                SectorTick {
                    byte: None,
                    done: true,
                }
            }
        }
    }
}
