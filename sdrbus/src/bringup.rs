// SPDX-License-Identifier: MIT

//! Card bring-up state machine.
//!
//! Pure transition logic: given the session and the response to the last
//! command, [`Bringup::advance`] updates the session and [`Bringup::command`]
//! names the next command to issue. The host owns the timing.

use core::fmt;

use crate::frame::{
    ACMD_SD_SEND_OP_COND, ACMD_SET_BUS_WIDTH, ALL_SEND_CID, APP_CMD, Command, IF_COND_ARG,
    Response, SELECT_CARD, SEND_IF_COND, SEND_RELATIVE_ADDR, SET_BLOCKLEN,
};
use crate::line::{BusWidth, ClockMode};
use crate::status::Ocr;

pub const BLOCK_LEN: u32 = 512;

/// Detected card class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CardClass {
    #[default]
    Unknown,
    /// Legacy card, no answer to `SEND_IF_COND`.
    V1,
    /// Version 2 standard capacity (byte addressed).
    V2,
    /// Version 2 high capacity (block addressed).
    V2HC,
}

impl CardClass {
    #[inline]
    pub fn is_block_addressed(self) -> bool {
        self == CardClass::V2HC
    }

    #[inline]
    fn is_v2(self) -> bool {
        matches!(self, CardClass::V2 | CardClass::V2HC)
    }
}

impl fmt::Display for CardClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CardClass::Unknown => "unknown",
            CardClass::V1 => "SD v1",
            CardClass::V2 => "SD v2 (SDSC)",
            CardClass::V2HC => "SD v2 (SDHC/SDXC)",
        };
        f.write_str(s)
    }
}

/// Position in the bring-up command sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BringupState {
    #[default]
    Reset,
    VoltageCheck,
    AppCmd,
    OpCond,
    Identify,
    RelativeAddr,
    Select,
    WideBusApp,
    WideBus,
    BlockLen,
    Ready,
    Failed,
}

impl BringupState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, BringupState::Ready | BringupState::Failed)
    }
}

/// Everything bring-up learns about the card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardSession {
    pub class: CardClass,
    pub rca: u16,
    pub clock: ClockMode,
    pub state: BringupState,
    /// `SD_SEND_OP_COND` attempts so far.
    pub op_cond_polls: u32,
}

#[derive(Debug, Clone)]
pub struct Bringup {
    session: CardSession,
    width: BusWidth,
}

impl Bringup {
    pub fn new(width: BusWidth) -> Self {
        Self {
            session: CardSession::default(),
            width,
        }
    }

    #[inline]
    pub fn session(&self) -> &CardSession {
        &self.session
    }

    #[inline]
    pub fn state(&self) -> BringupState {
        self.session.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.session.state == BringupState::Ready
    }

    pub fn reset(&mut self) {
        self.session = CardSession::default();
    }

    /// Command for the current state, `None` once terminal.
    pub fn command(&self) -> Option<Command> {
        let rca_arg = (self.session.rca as u32) << 16;
        let cmd = match self.session.state {
            BringupState::Reset => Command::go_idle(),
            BringupState::VoltageCheck => Command::new(SEND_IF_COND, IF_COND_ARG),
            BringupState::AppCmd => Command::new(APP_CMD, 0),
            BringupState::OpCond => {
                let mut ocr = Ocr::VDD_27_36;
                if self.session.class.is_v2() {
                    ocr |= Ocr::CCS;
                }
                Command::new(ACMD_SD_SEND_OP_COND, ocr.bits())
            }
            BringupState::Identify => Command::new(ALL_SEND_CID, 0),
            BringupState::RelativeAddr => Command::new(SEND_RELATIVE_ADDR, 0),
            BringupState::Select => Command::new(SELECT_CARD, rca_arg),
            BringupState::WideBusApp => Command::new(APP_CMD, rca_arg),
            BringupState::WideBus => Command::new(ACMD_SET_BUS_WIDTH, self.width.acmd_arg()),
            BringupState::BlockLen => Command::new(SET_BLOCKLEN, BLOCK_LEN),
            BringupState::Ready | BringupState::Failed => return None,
        };
        Some(cmd)
    }

    /// Applies the response to the command issued in the current state.
    pub fn advance(&mut self, resp: &Response) {
        let s = &mut self.session;
        let from = s.state;

        let next = match from {
            BringupState::Reset => BringupState::VoltageCheck,
            BringupState::VoltageCheck if !resp.is_ok() => {
                s.class = CardClass::V1;
                BringupState::AppCmd
            }
            BringupState::VoltageCheck if resp.arg & 0xFFF == IF_COND_ARG => {
                s.class = CardClass::V2;
                BringupState::AppCmd
            }
            BringupState::VoltageCheck => {
                log::warn!("voltage check echo mismatch: {:#05x}", resp.arg & 0xFFF);
                BringupState::Failed
            }
            BringupState::AppCmd if resp.is_ok() => BringupState::OpCond,
            BringupState::OpCond => {
                s.op_cond_polls += 1;
                let ocr = Ocr::from_bits_retain(resp.arg);
                if resp.is_ok() && ocr.contains(Ocr::READY) {
                    if s.class.is_v2() && ocr.contains(Ocr::CCS) {
                        s.class = CardClass::V2HC;
                    }
                    BringupState::Identify
                } else {
                    log::trace!("card busy after {} op-cond polls", s.op_cond_polls);
                    BringupState::AppCmd
                }
            }
            BringupState::Identify if resp.is_ok() => BringupState::RelativeAddr,
            BringupState::RelativeAddr if resp.is_ok() => {
                s.rca = (resp.arg >> 16) as u16;
                BringupState::Select
            }
            BringupState::Select if resp.is_ok() => {
                s.clock = ClockMode::Fast;
                match self.width {
                    BusWidth::Four => BringupState::WideBusApp,
                    BusWidth::One => BringupState::BlockLen,
                }
            }
            BringupState::WideBusApp if resp.is_ok() => BringupState::WideBus,
            BringupState::WideBus if resp.is_ok() => BringupState::BlockLen,
            // The application prefix has to be resent with the command.
            BringupState::WideBus => BringupState::WideBusApp,
            BringupState::BlockLen if resp.is_ok() => BringupState::Ready,
            _ => from,
        };

        if next == from && !from.is_terminal() {
            log::warn!("bring-up {from:?}: {resp}, retrying");
        } else if next != from {
            log::debug!("bring-up {from:?} -> {next:?} ({})", s.class);
        }
        s.state = next;
    }
}
