// SPDX-License-Identifier: MIT

//! Command frames and response decoding.
//!
//! A command frame is 48 bits: start `0`, direction `1`, 6-bit index, 32-bit
//! argument, CRC7 over the first 40 bits, end `1`. Responses are 48 or 136 bits
//! and start with `0` followed by direction `0`.

use core::fmt;

use crate::crc::crc7;

pub const GO_IDLE_STATE: u8 = 0;
pub const ALL_SEND_CID: u8 = 2;
pub const SEND_RELATIVE_ADDR: u8 = 3;
pub const SELECT_CARD: u8 = 7;
pub const SEND_IF_COND: u8 = 8;
pub const SET_BLOCKLEN: u8 = 16;
pub const READ_SINGLE_BLOCK: u8 = 17;
pub const APP_CMD: u8 = 55;

/// Application commands, valid right after `APP_CMD`.
pub const ACMD_SET_BUS_WIDTH: u8 = 6;
pub const ACMD_SD_SEND_OP_COND: u8 = 41;

/// Check pattern and 2.7-3.6 V range sent with `SEND_IF_COND`.
pub const IF_COND_ARG: u32 = 0x1AA;

pub const FRAME_BITS: u8 = 48;
pub const LONG_RESPONSE_BITS: u8 = 136;

/// Idle clocks ahead of the reset command (at least 74 are required after power-up).
pub const RESET_LEAD_CYCLES: u16 = 80;
pub const LEAD_CYCLES: u16 = 8;
/// Idle clocks driven after a command that has no response.
pub const NO_RESPONSE_TRAIL_CYCLES: u16 = 8;

/// Shape of the response a command expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    None,
    /// 48 bits, index echo and CRC7 checked (R1, R6, R7).
    Short,
    /// 48 bits, no echo and no CRC (R3, operating conditions).
    ShortNoCrc,
    /// 136 bits, CID/CSD carrying its own internal CRC (R2).
    Long,
}

impl ResponseKind {
    pub const fn for_index(index: u8) -> Self {
        match index {
            GO_IDLE_STATE => ResponseKind::None,
            ALL_SEND_CID => ResponseKind::Long,
            ACMD_SD_SEND_OP_COND => ResponseKind::ShortNoCrc,
            _ => ResponseKind::Short,
        }
    }

    pub const fn bits(self) -> u8 {
        match self {
            ResponseKind::None => 0,
            ResponseKind::Short | ResponseKind::ShortNoCrc => FRAME_BITS,
            ResponseKind::Long => LONG_RESPONSE_BITS,
        }
    }

    #[inline]
    pub const fn is_checked(self) -> bool {
        matches!(self, ResponseKind::Short)
    }
}

/// An immutable command (index + argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub index: u8,
    pub arg: u32,
}

impl Command {
    #[inline]
    pub const fn new(index: u8, arg: u32) -> Self {
        Self {
            index: index & 0x3F,
            arg,
        }
    }

    pub const fn go_idle() -> Self {
        Self::new(GO_IDLE_STATE, 0)
    }

    pub const fn read_single_block(address: u32) -> Self {
        Self::new(READ_SINGLE_BLOCK, address)
    }

    #[inline]
    pub const fn response(&self) -> ResponseKind {
        ResponseKind::for_index(self.index)
    }

    /// Idle (high) cycles driven before the frame.
    #[inline]
    pub const fn lead_cycles(&self) -> u16 {
        if self.index == GO_IDLE_STATE {
            RESET_LEAD_CYCLES
        } else {
            LEAD_CYCLES
        }
    }

    pub const fn crc(&self) -> u8 {
        let a = self.arg.to_be_bytes();
        crc7(&[0x40 | self.index, a[0], a[1], a[2], a[3]])
    }

    /// The full 48-bit frame, MSB first on the wire.
    pub const fn frame(&self) -> u64 {
        (0b01u64 << 46)
            | ((self.index as u64) << 40)
            | ((self.arg as u64) << 8)
            | ((self.crc() as u64) << 1)
            | 1
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CMD{}({:#010x})", self.index, self.arg)
    }
}

/// Decoded response. At most one of `timeout` / `syntax_error` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Echoed index for short responses, the issued index otherwise.
    pub index: u8,
    /// Bits 39:8 of a short response, bits 127:96 of a long one.
    pub arg: u32,
    /// Received bits, right-aligned. A long response keeps its last 128 bits
    /// (register bits 127:1 and the end bit).
    pub raw: u128,
    pub timeout: bool,
    pub syntax_error: bool,
}

impl Response {
    /// Completion of a command that has no response.
    pub const fn none(index: u8) -> Self {
        Self {
            index,
            arg: 0,
            raw: 0,
            timeout: false,
            syntax_error: false,
        }
    }

    pub const fn timed_out(index: u8) -> Self {
        Self {
            index,
            arg: 0,
            raw: 0,
            timeout: true,
            syntax_error: false,
        }
    }

    /// Checks a fully received response for `command`.
    ///
    /// `direction` is the second bit on the wire (must be `0` for card-to-host).
    pub fn decode(command: &Command, raw: u128, direction: bool) -> Self {
        let kind = command.response();
        let mut syntax_error = direction || raw & 1 == 0;

        let (index, arg) = match kind {
            ResponseKind::Long => (command.index, (raw >> 96) as u32),
            _ => {
                let index = ((raw >> 40) & 0x3F) as u8;
                let arg = (raw >> 8) as u32;
                if kind.is_checked() {
                    let a = arg.to_be_bytes();
                    let expected = crc7(&[index, a[0], a[1], a[2], a[3]]);
                    syntax_error |= index != command.index;
                    syntax_error |= ((raw >> 1) & 0x7F) as u8 != expected;
                }
                (index, arg)
            }
        };

        Self {
            index,
            arg,
            raw,
            timeout: false,
            syntax_error,
        }
    }

    /// Neither timed out nor malformed.
    #[inline]
    pub const fn is_ok(&self) -> bool {
        !self.timeout && !self.syntax_error
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timeout {
            write!(f, "R{}: timeout", self.index)
        } else if self.syntax_error {
            write!(f, "R{}: syntax error (raw {:#x})", self.index, self.raw)
        } else {
            write!(f, "R{}({:#010x})", self.index, self.arg)
        }
    }
}

/// Builds a 48-bit short response as a card would send it.
pub const fn short_response(index: u8, arg: u32) -> u64 {
    let a = arg.to_be_bytes();
    let crc = crc7(&[index & 0x3F, a[0], a[1], a[2], a[3]]);
    (((index & 0x3F) as u64) << 40) | ((arg as u64) << 8) | ((crc as u64) << 1) | 1
}

/// Builds a 48-bit operating-condition response (all-ones index and CRC fields).
pub const fn ocr_response(ocr: u32) -> u64 {
    (0x3Fu64 << 40) | ((ocr as u64) << 8) | 0xFF
}

/// Header byte of a long response: start `0`, direction `0`, six reserved ones.
pub const LONG_RESPONSE_HEADER: u8 = 0x3F;

/// Builds the 128 bits following [`LONG_RESPONSE_HEADER`] for a register:
/// bits 127:8 of the register, its CRC7, the end bit.
pub const fn long_response(register: u128) -> u128 {
    (register & !0xFF) | ((crc7(&trim_register(register)) as u128) << 1) | 1
}

const fn trim_register(register: u128) -> [u8; 15] {
    let bytes = register.to_be_bytes();
    let mut out = [0u8; 15];
    let mut i = 0;
    while i < 15 {
        out[i] = bytes[i];
        i += 1;
    }
    out
}
