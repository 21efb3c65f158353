// SPDX-License-Identifier: MIT

//! Command/response engine.
//!
//! Serializes one command frame onto the command line, releases the line, then
//! collects the response bit by bit. Advanced once per bus cycle by the host:
//! [`CmdEngine::drive`] before the cycle, [`CmdEngine::sample`] after it.

use sdrio::{BlockIOError, BlockIOResult};

use crate::frame::{Command, FRAME_BITS, NO_RESPONSE_TRAIL_CYCLES, Response, ResponseKind};
use crate::line::CmdPin;

/// Bus cycles spent looking for a response start bit before giving up.
pub const DEFAULT_RESPONSE_TIMEOUT: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Lead { remaining: u16 },
    Send { bit: u8 },
    Trail { remaining: u16 },
    Wait { waited: u32 },
    Receive { count: u8, raw: u128, direction: bool },
}

#[derive(Debug, Clone)]
pub struct CmdEngine {
    pin: CmdPin,
    phase: Phase,
    command: Command,
    response_timeout: u32,
}

impl CmdEngine {
    pub fn new(response_timeout: u32) -> Self {
        Self {
            pin: CmdPin::RELEASED,
            phase: Phase::Idle,
            command: Command::go_idle(),
            response_timeout: response_timeout.max(1),
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// The command currently (or last) in flight.
    #[inline]
    pub fn command(&self) -> Command {
        self.command
    }

    /// Begins a transaction. Only accepted when idle.
    pub fn start(&mut self, command: Command) -> BlockIOResult {
        if !self.is_idle() {
            return Err(BlockIOError::Busy);
        }
        log::trace!("-> {command}");
        self.command = command;
        self.phase = match command.lead_cycles() {
            0 => Phase::Send { bit: FRAME_BITS - 1 },
            remaining => Phase::Lead { remaining },
        };
        Ok(())
    }

    /// Drops the current transaction without reporting completion.
    pub fn abort(&mut self) {
        self.phase = Phase::Idle;
        self.pin.set_input();
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.pin = CmdPin::RELEASED;
    }

    /// Sets the pin for the coming bus cycle and returns the copy the bus sees.
    pub fn drive(&mut self) -> CmdPin {
        match self.phase {
            Phase::Lead { .. } | Phase::Trail { .. } => self.pin.set_output(true),
            Phase::Send { bit } => self.pin.set_output((self.command.frame() >> bit) & 1 != 0),
            Phase::Idle | Phase::Wait { .. } | Phase::Receive { .. } => self.pin.set_input(),
        }
        self.pin
    }

    /// Consumes the command-line level of the finished bus cycle.
    ///
    /// Returns the response exactly once, on the cycle the transaction completes.
    pub fn sample(&mut self, level: bool) -> Option<Response> {
        self.pin.latch(level);
        let level = self.pin.read_input();

        match self.phase {
            Phase::Idle => None,
            Phase::Lead { remaining } => {
                self.phase = if remaining > 1 {
                    Phase::Lead {
                        remaining: remaining - 1,
                    }
                } else {
                    Phase::Send { bit: FRAME_BITS - 1 }
                };
                None
            }
            Phase::Send { bit } if bit > 0 => {
                self.phase = Phase::Send { bit: bit - 1 };
                None
            }
            Phase::Send { .. } => {
                self.phase = match self.command.response() {
                    ResponseKind::None => Phase::Trail {
                        remaining: NO_RESPONSE_TRAIL_CYCLES,
                    },
                    _ => Phase::Wait { waited: 0 },
                };
                None
            }
            Phase::Trail { remaining } if remaining > 1 => {
                self.phase = Phase::Trail {
                    remaining: remaining - 1,
                };
                None
            }
            Phase::Trail { .. } => self.finish(Response::none(self.command.index)),
            Phase::Wait { .. } if !level => {
                self.phase = Phase::Receive {
                    count: 1,
                    raw: 0,
                    direction: false,
                };
                None
            }
            Phase::Wait { waited } => {
                let waited = waited + 1;
                if waited >= self.response_timeout {
                    self.finish(Response::timed_out(self.command.index))
                } else {
                    self.phase = Phase::Wait { waited };
                    None
                }
            }
            Phase::Receive {
                count,
                raw,
                direction,
            } => {
                let raw = (raw << 1) | level as u128;
                let direction = if count == 1 { level } else { direction };
                let count = count + 1;
                if count >= self.command.response().bits() {
                    self.finish(Response::decode(&self.command, raw, direction))
                } else {
                    self.phase = Phase::Receive {
                        count,
                        raw,
                        direction,
                    };
                    None
                }
            }
        }
    }

    fn finish(&mut self, response: Response) -> Option<Response> {
        self.phase = Phase::Idle;
        if response.is_ok() {
            log::trace!("<- {response}");
        } else {
            log::debug!("<- {response} for {}", self.command);
        }
        Some(response)
    }
}

impl Default for CmdEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ACMD_SD_SEND_OP_COND, READ_SINGLE_BLOCK, ocr_response, short_response};

    /// Runs the engine against a scripted line: `reply(cycle_after_end)` gives the
    /// level the card puts on the released line.
    fn run(engine: &mut CmdEngine, reply: impl Fn(u32) -> bool) -> (Response, Vec<bool>, u32) {
        let mut sent = Vec::new();
        let mut released = 0u32;
        for _ in 0..10_000 {
            let pin = engine.drive();
            let level = match pin.driven_level() {
                Some(bit) => {
                    sent.push(bit);
                    bit
                }
                None => {
                    let level = reply(released);
                    released += 1;
                    level
                }
            };
            if let Some(resp) = engine.sample(level) {
                return (resp, sent, released);
            }
        }
        panic!("engine never completed");
    }

    fn bits_of(value: u64, len: u32, delay: u32) -> impl Fn(u32) -> bool {
        move |cycle| {
            if cycle < delay || cycle >= delay + len {
                true
            } else {
                (value >> (len - 1 - (cycle - delay))) & 1 != 0
            }
        }
    }

    #[test]
    fn test_reset_command_has_no_response() {
        let mut engine = CmdEngine::default();
        engine.start(Command::go_idle()).unwrap();
        let (resp, sent, released) = run(&mut engine, |_| true);
        assert!(resp.is_ok());
        assert_eq!(released, 0);
        // 80 lead cycles, 48 frame bits, 8 trailing idle cycles
        assert_eq!(sent.len(), 80 + 48 + 8);
        assert!(sent[..80].iter().all(|b| *b));
        assert!(!sent[80]);
        assert!(sent[81]);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_frame_bits_on_wire() {
        let mut engine = CmdEngine::default();
        let cmd = Command::read_single_block(0x1234);
        engine.start(cmd).unwrap();
        let reply = bits_of(short_response(READ_SINGLE_BLOCK, 0x900), 48, 2);
        let (resp, sent, _) = run(&mut engine, reply);
        assert!(resp.is_ok());
        assert_eq!(resp.arg, 0x900);

        let frame = sent[8..].iter().fold(0u64, |acc, b| (acc << 1) | *b as u64);
        assert_eq!(sent.len(), 8 + 48);
        assert_eq!(frame, cmd.frame());
    }

    #[test]
    fn test_timeout() {
        let mut engine = CmdEngine::new(16);
        engine.start(Command::read_single_block(0)).unwrap();
        let (resp, _, released) = run(&mut engine, |_| true);
        assert!(resp.timeout);
        assert!(!resp.syntax_error);
        assert_eq!(released, 16);
    }

    #[test]
    fn test_syntax_error_on_bad_crc() {
        let mut engine = CmdEngine::default();
        engine.start(Command::read_single_block(0)).unwrap();
        let reply = bits_of(short_response(READ_SINGLE_BLOCK, 0x900) ^ 0b100, 48, 3);
        let (resp, _, _) = run(&mut engine, reply);
        assert!(resp.syntax_error);
        assert!(!resp.timeout);
    }

    #[test]
    fn test_ocr_response_not_crc_checked() {
        let mut engine = CmdEngine::default();
        engine
            .start(Command::new(ACMD_SD_SEND_OP_COND, 0x40FF_8000))
            .unwrap();
        let reply = bits_of(ocr_response(0x80FF_8000), 48, 2);
        let (resp, _, _) = run(&mut engine, reply);
        assert!(resp.is_ok());
        assert_eq!(resp.arg, 0x80FF_8000);
    }

    #[test]
    fn test_busy_while_in_flight() {
        let mut engine = CmdEngine::default();
        engine.start(Command::go_idle()).unwrap();
        assert_eq!(engine.start(Command::go_idle()), Err(BlockIOError::Busy));
        engine.abort();
        assert!(engine.is_idle());
        assert!(engine.start(Command::go_idle()).is_ok());
    }
}
