// SPDX-License-Identifier: MIT

//! Bit-level model of an SD card on the native bus.
//!
//! Decodes command frames from the command line, answers with CRC-correct
//! responses after a configurable delay, and streams sectors from any
//! [`BlockIO`] on one or four data lines with real CRC16 trailers.

use sdrio::{BlockIO, BlockIOExt, SECTOR_SIZE};

use crate::crc::{crc7, crc16, crc16_push_bit};
use crate::frame::{
    ACMD_SD_SEND_OP_COND, ACMD_SET_BUS_WIDTH, ALL_SEND_CID, APP_CMD, FRAME_BITS, GO_IDLE_STATE,
    LONG_RESPONSE_BITS, LONG_RESPONSE_HEADER, READ_SINGLE_BLOCK, SELECT_CARD, SEND_IF_COND,
    SEND_RELATIVE_ADDR, SET_BLOCKLEN, long_response, ocr_response, short_response,
};
use crate::line::{CmdPin, LineSample, SdBus};
use crate::status::{CardState, CardStatus, Ocr};

/// Card identification register handed out on `ALL_SEND_CID`.
const SIM_CID: u128 = 0x0353_4453_4452_3031_8000_0001_0101_4401;

const IDLE_DAT: u8 = 0x0F;

/// Which generation of card to model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SimClass {
    /// Ignores `SEND_IF_COND`, byte addressed.
    Legacy,
    /// Version 2, byte addressed.
    Standard,
    /// Version 2, block addressed.
    #[default]
    HighCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimProfile {
    pub class: SimClass,
    /// `SD_SEND_OP_COND` polls answered busy before power-up completes.
    pub busy_polls: u32,
    pub rca: u16,
    /// Released cycles between the command end bit and the response start bit.
    pub response_delay: u32,
    /// Idle data cycles between the end of a read response and the data start bit.
    pub access_delay: u32,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            class: SimClass::default(),
            busy_polls: 2,
            rca: 0xB368,
            response_delay: 2,
            access_delay: 8,
        }
    }
}

impl SimProfile {
    pub fn new(class: SimClass) -> Self {
        Self {
            class,
            ..Self::default()
        }
    }

    pub fn with_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    pub fn with_rca(mut self, rca: u16) -> Self {
        self.rca = rca;
        self
    }

    /// At least two cycles, as on real cards.
    pub fn with_response_delay(mut self, cycles: u32) -> Self {
        self.response_delay = cycles.max(2);
        self
    }

    pub fn with_access_delay(mut self, cycles: u32) -> Self {
        self.access_delay = cycles;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Tx {
    header: u8,
    body: u128,
    len: u8,
    sent: u8,
    delay: u32,
}

#[derive(Debug, Clone, Copy)]
struct DataOut {
    delay: u32,
    cycle: u32,
}

#[derive(Debug)]
pub struct SimCard<IO: BlockIO> {
    io: IO,
    profile: SimProfile,
    state: CardState,
    app: bool,
    wide: bool,
    polls: u32,
    rx: u64,
    rx_len: u8,
    tx: Option<Tx>,
    data: Option<DataOut>,
    sector: [u8; SECTOR_SIZE],
    crc: [u16; 4],
    drop_reads: u32,
    garble_reads: u32,
    commands: u64,
    reads_served: u64,
}

impl<IO: BlockIO> SimCard<IO> {
    pub fn new(io: IO, profile: SimProfile) -> Self {
        Self {
            io,
            profile: SimProfile {
                response_delay: profile.response_delay.max(2),
                ..profile
            },
            state: CardState::Idle,
            app: false,
            wide: false,
            polls: 0,
            rx: 0,
            rx_len: 0,
            tx: None,
            data: None,
            sector: [0u8; SECTOR_SIZE],
            crc: [0u16; 4],
            drop_reads: 0,
            garble_reads: 0,
            commands: 0,
            reads_served: 0,
        }
    }

    /// Silently ignores the next `count` read commands.
    pub fn drop_reads(&mut self, count: u32) {
        self.drop_reads = count;
    }

    /// Answers the next `count` read commands with a corrupted CRC and no data.
    pub fn garble_reads(&mut self, count: u32) {
        self.garble_reads = count;
    }

    #[inline]
    pub fn state(&self) -> CardState {
        self.state
    }

    #[inline]
    pub fn is_wide(&self) -> bool {
        self.wide
    }

    #[inline]
    pub fn profile(&self) -> &SimProfile {
        &self.profile
    }

    /// Well-formed command frames received.
    #[inline]
    pub fn commands(&self) -> u64 {
        self.commands
    }

    #[inline]
    pub fn reads_served(&self) -> u64 {
        self.reads_served
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    fn receive(&mut self, level: bool) {
        if self.rx_len == 0 {
            if !level {
                self.rx = 0;
                self.rx_len = 1;
            }
            return;
        }
        self.rx = (self.rx << 1) | level as u64;
        self.rx_len += 1;
        if self.rx_len == FRAME_BITS {
            self.rx_len = 0;
            self.on_frame(self.rx);
        }
    }

    fn on_frame(&mut self, frame: u64) {
        let head = (frame >> 40) as u8;
        let arg = (frame >> 8) as u32;
        let a = arg.to_be_bytes();
        let crc_ok = crc7(&[head, a[0], a[1], a[2], a[3]]) == ((frame >> 1) & 0x7F) as u8;
        if head & 0x40 == 0 || frame & 1 == 0 || !crc_ok {
            log::trace!("sim: dropped malformed frame {frame:#014x}");
            return;
        }

        self.commands += 1;
        let app = core::mem::take(&mut self.app);
        self.on_command(head & 0x3F, arg, app);
    }

    fn on_command(&mut self, index: u8, arg: u32, app: bool) {
        log::trace!(
            "sim: {}{index}({arg:#010x}) in {:?}",
            if app { "ACMD" } else { "CMD" },
            self.state
        );
        let state = self.state;
        let rca_matches = (arg >> 16) as u16 == self.profile.rca;

        match (app, index) {
            (_, GO_IDLE_STATE) => {
                self.state = CardState::Idle;
                self.wide = false;
                self.polls = 0;
                self.tx = None;
                self.data = None;
            }
            (false, SEND_IF_COND) if state == CardState::Idle => {
                if self.profile.class != SimClass::Legacy {
                    self.respond_short(SEND_IF_COND, arg & 0xFFF);
                }
            }
            (_, APP_CMD) => {
                let addressed = matches!(state, CardState::Stby | CardState::Tran);
                if !addressed || rca_matches {
                    self.app = true;
                    self.respond_r1(APP_CMD, CardStatus::APP_CMD, state);
                }
            }
            (true, ACMD_SD_SEND_OP_COND) if state == CardState::Idle => {
                self.polls += 1;
                let mut ocr = Ocr::VDD_27_36;
                if self.polls > self.profile.busy_polls {
                    ocr |= Ocr::READY;
                    if self.profile.class == SimClass::HighCapacity
                        && Ocr::from_bits_retain(arg).contains(Ocr::CCS)
                    {
                        ocr |= Ocr::CCS;
                    }
                    self.state = CardState::Ready;
                }
                self.respond(0, ocr_response(ocr.bits()) as u128, FRAME_BITS);
            }
            (_, ALL_SEND_CID) if state == CardState::Ready => {
                self.state = CardState::Ident;
                self.respond(LONG_RESPONSE_HEADER, long_response(SIM_CID), LONG_RESPONSE_BITS);
            }
            (_, SEND_RELATIVE_ADDR) if matches!(state, CardState::Ident | CardState::Stby) => {
                self.state = CardState::Stby;
                let r6 = ((self.profile.rca as u32) << 16) | ((state as u32) << 9);
                self.respond_short(SEND_RELATIVE_ADDR, r6);
            }
            (_, SELECT_CARD) if matches!(state, CardState::Stby | CardState::Tran) => {
                if rca_matches {
                    self.state = CardState::Tran;
                    self.respond_r1(SELECT_CARD, CardStatus::empty(), state);
                } else {
                    self.state = CardState::Stby;
                }
            }
            (true, ACMD_SET_BUS_WIDTH) if state == CardState::Tran => match arg & 0x3 {
                0 => {
                    self.wide = false;
                    self.respond_r1(ACMD_SET_BUS_WIDTH, CardStatus::APP_CMD, state);
                }
                2 => {
                    self.wide = true;
                    self.respond_r1(ACMD_SET_BUS_WIDTH, CardStatus::APP_CMD, state);
                }
                _ => self.respond_r1(
                    ACMD_SET_BUS_WIDTH,
                    CardStatus::APP_CMD | CardStatus::ERROR,
                    state,
                ),
            },
            (_, SET_BLOCKLEN) if state == CardState::Tran => {
                let status = if arg == SECTOR_SIZE as u32 {
                    CardStatus::empty()
                } else {
                    CardStatus::BLOCK_LEN_ERROR
                };
                self.respond_r1(SET_BLOCKLEN, status, state);
            }
            (_, READ_SINGLE_BLOCK) if state == CardState::Tran => self.read_block(arg),
            _ => log::trace!("sim: CMD{index} illegal in {state:?}, ignored"),
        }
    }

    fn read_block(&mut self, arg: u32) {
        if self.drop_reads > 0 {
            self.drop_reads -= 1;
            log::debug!("sim: dropping read {arg:#x}");
            return;
        }
        if self.garble_reads > 0 {
            self.garble_reads -= 1;
            log::debug!("sim: garbling read {arg:#x}");
            let status = CardStatus::READY_FOR_DATA.with_state(self.state);
            let frame = short_response(READ_SINGLE_BLOCK, status) ^ 0b10;
            self.respond(0, frame as u128, FRAME_BITS);
            return;
        }

        let sector = match self.profile.class {
            SimClass::HighCapacity => arg,
            _ if arg % SECTOR_SIZE as u32 != 0 => {
                self.respond_r1(READ_SINGLE_BLOCK, CardStatus::ADDRESS_ERROR, self.state);
                return;
            }
            _ => arg / SECTOR_SIZE as u32,
        };

        match self.io.read_sector(sector as u64, &mut self.sector) {
            Ok(()) => {
                self.crc = if self.wide {
                    lane_crcs(&self.sector)
                } else {
                    [crc16(&self.sector), 0, 0, 0]
                };
                self.respond_r1(READ_SINGLE_BLOCK, CardStatus::READY_FOR_DATA, self.state);
                self.data = Some(DataOut {
                    delay: self.profile.access_delay,
                    cycle: 0,
                });
                self.reads_served += 1;
            }
            Err(e) => {
                log::debug!("sim: sector {sector}: {e}");
                self.respond_r1(READ_SINGLE_BLOCK, CardStatus::OUT_OF_RANGE, self.state);
            }
        }
    }

    fn respond_r1(&mut self, index: u8, status: CardStatus, state: CardState) {
        self.respond_short(index, status.with_state(state));
    }

    fn respond_short(&mut self, index: u8, arg: u32) {
        self.respond(0, short_response(index, arg) as u128, FRAME_BITS);
    }

    fn respond(&mut self, header: u8, body: u128, len: u8) {
        self.tx = Some(Tx {
            header,
            body,
            len,
            sent: 0,
            delay: self.profile.response_delay,
        });
    }

    /// Card's level on the released command line for this cycle.
    fn transmit(&mut self) -> bool {
        let Some(tx) = self.tx.as_mut() else {
            return true;
        };
        if tx.delay > 0 {
            tx.delay -= 1;
            return true;
        }
        let pos = tx.len - 1 - tx.sent;
        let bit = if pos >= 128 {
            (tx.header >> (pos - 128)) & 1 != 0
        } else {
            (tx.body >> pos) & 1 != 0
        };
        tx.sent += 1;
        if tx.sent == tx.len {
            self.tx = None;
        }
        bit
    }

    /// Card's levels on DAT3..DAT0 for this cycle.
    fn data_lines(&mut self) -> u8 {
        if self.tx.is_some() {
            return IDLE_DAT;
        }
        let Some(data) = self.data.as_mut() else {
            return IDLE_DAT;
        };
        if data.delay > 0 {
            data.delay -= 1;
            return IDLE_DAT;
        }

        let cycle = data.cycle as usize;
        data.cycle += 1;

        let payload = if self.wide { SECTOR_SIZE * 2 } else { SECTOR_SIZE * 8 };
        if cycle == 0 {
            return if self.wide { 0x00 } else { 0x0E };
        }
        if cycle <= payload {
            let i = cycle - 1;
            return if self.wide {
                let byte = self.sector[i / 2];
                if i % 2 == 0 { byte >> 4 } else { byte & 0x0F }
            } else {
                0x0E | ((self.sector[i / 8] >> (7 - i % 8)) & 1)
            };
        }
        if cycle <= payload + 16 {
            let k = 15 - (cycle - payload - 1);
            return if self.wide {
                (0..4).fold(0u8, |acc, lane| acc | ((((self.crc[lane] >> k) & 1) as u8) << lane))
            } else {
                0x0E | ((self.crc[0] >> k) & 1) as u8
            };
        }

        self.data = None;
        IDLE_DAT
    }
}

/// CRC16 of each data line when a sector is sent four bits per cycle.
fn lane_crcs(sector: &[u8; SECTOR_SIZE]) -> [u16; 4] {
    let mut crc = [0u16; 4];
    for byte in sector {
        for nibble in [byte >> 4, byte & 0x0F] {
            for (lane, c) in crc.iter_mut().enumerate() {
                *c = crc16_push_bit(*c, (nibble >> lane) & 1 != 0);
            }
        }
    }
    crc
}

impl<IO: BlockIO> SdBus for SimCard<IO> {
    fn clock(&mut self, cmd: CmdPin) -> LineSample {
        let cmd = match cmd.driven_level() {
            Some(level) => {
                self.receive(level);
                level
            }
            None => self.transmit(),
        };
        LineSample {
            cmd,
            dat: self.data_lines(),
        }
    }
}
