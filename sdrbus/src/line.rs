// SPDX-License-Identifier: MIT

//! Physical line model: the half-duplex command pin, the per-cycle line sample,
//! the bus trait a card (or a model of one) implements, and the clock divider.

use core::fmt;

/// Host side of the bidirectional command line.
///
/// Either driving a level or released (input) with the last observed level latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdPin {
    driving: bool,
    out: bool,
    input: bool,
}

impl CmdPin {
    /// Released, pulled up.
    pub const RELEASED: CmdPin = CmdPin {
        driving: false,
        out: true,
        input: true,
    };

    #[inline]
    pub fn set_output(&mut self, bit: bool) {
        self.driving = true;
        self.out = bit;
    }

    #[inline]
    pub fn set_input(&mut self) {
        self.driving = false;
    }

    #[inline]
    pub fn read_input(&self) -> bool {
        self.input
    }

    /// Stores the level observed on the line for the current cycle.
    #[inline]
    pub fn latch(&mut self, level: bool) {
        self.input = level;
    }

    #[inline]
    pub fn is_driving(&self) -> bool {
        self.driving
    }

    /// Level the host puts on the line, `None` when released.
    #[inline]
    pub fn driven_level(&self) -> Option<bool> {
        self.driving.then_some(self.out)
    }
}

impl Default for CmdPin {
    fn default() -> Self {
        Self::RELEASED
    }
}

/// Line levels observed by the host during one bus cycle.
///
/// `dat` holds DAT3..DAT0 in bits 3..0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSample {
    pub cmd: bool,
    pub dat: u8,
}

impl LineSample {
    pub const IDLE: LineSample = LineSample { cmd: true, dat: 0x0F };

    #[inline]
    pub fn dat0(&self) -> bool {
        self.dat & 1 != 0
    }
}

/// Anything that sits on the other end of the bus.
///
/// Called once per bus cycle with a copy of the host's command pin; returns the
/// levels on the command and data lines for that cycle.
pub trait SdBus {
    fn clock(&mut self, cmd: CmdPin) -> LineSample;
}

impl<T: SdBus + ?Sized> SdBus for &mut T {
    #[inline]
    fn clock(&mut self, cmd: CmdPin) -> LineSample {
        (**self).clock(cmd)
    }
}

/// Number of data lines in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BusWidth {
    #[default]
    One,
    Four,
}

impl BusWidth {
    /// Bus cycles needed to move one byte.
    #[inline]
    pub const fn cycles_per_byte(self) -> u8 {
        match self {
            BusWidth::One => 8,
            BusWidth::Four => 2,
        }
    }

    /// `SET_BUS_WIDTH` argument for this width.
    #[inline]
    pub const fn acmd_arg(self) -> u32 {
        match self {
            BusWidth::One => 0,
            BusWidth::Four => 2,
        }
    }
}

impl fmt::Display for BusWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusWidth::One => write!(f, "1-bit"),
            BusWidth::Four => write!(f, "4-bit"),
        }
    }
}

/// Frequency of the tick source feeding the host.
///
/// Transfer divisor is `1 << n` and the initialization divisor `64 << n`, so the
/// bus runs at 25 MHz after selection and below 400 kHz before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ClockClass {
    #[default]
    Mhz25 = 0,
    Mhz50 = 1,
    Mhz100 = 2,
    Mhz200 = 3,
}

impl ClockClass {
    #[inline]
    pub const fn fast_divisor(self) -> u32 {
        1 << self as u32
    }

    #[inline]
    pub const fn slow_divisor(self) -> u32 {
        64 << self as u32
    }
}

/// Bit-rate mode of the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClockMode {
    #[default]
    Slow,
    Fast,
}

/// Derives bus cycles from ticks: one cycle every `divisor` ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDivider {
    divisor: u32,
    count: u32,
}

impl ClockDivider {
    pub const fn new(divisor: u32) -> Self {
        Self {
            divisor: if divisor == 0 { 1 } else { divisor },
            count: 0,
        }
    }

    /// Advances one tick, true when a bus cycle happens on this tick.
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.divisor {
            self.count = 0;
            true
        } else {
            false
        }
    }

    /// Changes the divisor. Callers only do this between transactions.
    pub fn set_divisor(&mut self, divisor: u32) {
        self.divisor = divisor.max(1);
        self.count = 0;
    }

    #[inline]
    pub fn divisor(&self) -> u32 {
        self.divisor
    }
}
