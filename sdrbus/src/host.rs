// SPDX-License-Identifier: MIT

//! Card host: engine, bring-up and sampler sharing one clock divider.
//!
//! Every [`SdHost::tick`] first acts on what the previous tick produced
//! (a finished response, a latched read request), then runs at most one bus
//! cycle. Requests therefore take effect one tick after they are made.

use sdrio::{BlockIOError, BlockIOResult, SectorBuffer, SectorSource, SectorTick, SECTOR_SIZE};

use crate::bringup::{Bringup, BringupState, CardClass};
use crate::engine::{CmdEngine, DEFAULT_RESPONSE_TIMEOUT};
use crate::frame::{Command, Response};
use crate::line::{BusWidth, ClockClass, ClockDivider, ClockMode, SdBus};
use crate::sampler::{DEFAULT_DATA_TIMEOUT, Sampler};

/// Host configuration, fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostConfig {
    pub clock: ClockClass,
    pub width: BusWidth,
    /// Bus cycles to wait for a response start bit.
    pub response_timeout: u32,
    /// Ticks to wait for a data start bit.
    pub data_timeout: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            clock: ClockClass::default(),
            width: BusWidth::default(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            data_timeout: DEFAULT_DATA_TIMEOUT,
        }
    }
}

impl HostConfig {
    pub fn with_clock(mut self, clock: ClockClass) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_width(mut self, width: BusWidth) -> Self {
        self.width = width;
        self
    }

    pub fn with_response_timeout(mut self, cycles: u32) -> Self {
        self.response_timeout = cycles;
        self
    }

    pub fn with_data_timeout(mut self, ticks: u32) -> Self {
        self.data_timeout = ticks;
        self
    }
}

/// Observable host state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStatus {
    pub class: CardClass,
    pub state: BringupState,
    pub clock: ClockMode,
    pub rca: u16,
    pub ticks: u64,
    /// Sectors delivered.
    pub reads: u64,
    /// Read commands re-issued after a timeout or a malformed response.
    pub read_retries: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadPhase {
    Idle,
    Issue(u32),
    InFlight(u32),
}

#[derive(Debug)]
pub struct SdHost<B: SdBus> {
    bus: B,
    config: HostConfig,
    engine: CmdEngine,
    bringup: Bringup,
    sampler: Sampler,
    divider: ClockDivider,
    buffer: SectorBuffer,
    bringup_pending: bool,
    read: ReadPhase,
    latched: Option<u32>,
    completed: Option<Response>,
    ticks: u64,
    reads: u64,
    read_retries: u64,
}

impl<B: SdBus> SdHost<B> {
    pub fn new(bus: B, config: HostConfig) -> Self {
        Self {
            bus,
            config,
            engine: CmdEngine::new(config.response_timeout),
            bringup: Bringup::new(config.width),
            sampler: Sampler::new(BusWidth::One, config.data_timeout),
            divider: ClockDivider::new(config.clock.slow_divisor()),
            buffer: SectorBuffer::new(),
            bringup_pending: false,
            read: ReadPhase::Idle,
            latched: None,
            completed: None,
            ticks: 0,
            reads: 0,
            read_retries: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn status(&self) -> HostStatus {
        let session = self.bringup.session();
        HostStatus {
            class: session.class,
            state: session.state,
            clock: session.clock,
            rca: session.rca,
            ticks: self.ticks,
            reads: self.reads,
            read_retries: self.read_retries,
        }
    }

    #[inline]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[inline]
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Ticks until bring-up reaches a terminal state or `max_ticks` elapse.
    pub fn bring_up(&mut self, max_ticks: u64) -> BringupState {
        for _ in 0..max_ticks {
            if self.bringup.state().is_terminal() {
                break;
            }
            self.tick_once();
        }
        self.bringup.state()
    }

    fn tick_once(&mut self) -> SectorTick {
        self.ticks += 1;

        if let Some(resp) = self.completed.take() {
            self.on_response(resp);
        }
        if let Some(sector) = self.latched.take() {
            self.read = ReadPhase::Issue(sector);
        }
        if self.sampler.tick() {
            log::warn!("read: no data start bit within {} ticks", self.config.data_timeout);
            self.retry_read();
        }
        self.issue();

        if !self.divider.tick() {
            return SectorTick::IDLE;
        }

        let pin = self.engine.drive();
        let line = self.bus.clock(pin);
        self.completed = self.engine.sample(line.cmd);

        if self.sampler.is_idle() {
            return SectorTick::IDLE;
        }
        let out = self.sampler.sample(line.dat, &mut self.buffer);
        if out.done {
            self.read = ReadPhase::Idle;
            self.reads += 1;
        }
        out
    }

    fn on_response(&mut self, resp: Response) {
        if self.bringup_pending {
            self.bringup_pending = false;
            self.bringup.advance(&resp);

            if self.bringup.session().clock == ClockMode::Fast
                && self.divider.divisor() != self.config.clock.fast_divisor()
            {
                self.divider.set_divisor(self.config.clock.fast_divisor());
                log::debug!("bus clock divisor -> {}", self.divider.divisor());
            }
            if self.bringup.is_ready() {
                self.sampler.set_width(self.config.width);
                log::debug!(
                    "card ready: {}, rca {:#06x}, {}",
                    self.bringup.session().class,
                    self.bringup.session().rca,
                    self.config.width
                );
            }
            return;
        }

        if let ReadPhase::InFlight(sector) = self.read {
            if !resp.is_ok() {
                if self.sampler.is_receiving() {
                    log::warn!("read sector {sector}: {resp} after data started, finishing block");
                    return;
                }
                log::warn!("read sector {sector}: {resp}, retrying");
                self.retry_read();
            }
        }
    }

    /// Re-issues the read in flight. Never once data bytes went out.
    fn retry_read(&mut self) {
        if self.sampler.is_receiving() {
            return;
        }
        if let ReadPhase::InFlight(sector) = self.read {
            self.engine.abort();
            self.sampler.abort();
            self.completed = None;
            self.read = ReadPhase::Issue(sector);
            self.read_retries += 1;
        }
    }

    fn issue(&mut self) {
        if !self.engine.is_idle() || self.bringup_pending {
            return;
        }

        if !self.bringup.state().is_terminal() {
            if let Some(cmd) = self.bringup.command() {
                self.bringup_pending = self.engine.start(cmd).is_ok();
            }
            return;
        }

        if let ReadPhase::Issue(sector) = self.read {
            if !self.bringup.is_ready() {
                return;
            }
            let address = if self.bringup.session().class.is_block_addressed() {
                sector
            } else {
                sector.wrapping_mul(SECTOR_SIZE as u32)
            };
            if self.engine.start(Command::read_single_block(address)).is_ok() {
                self.sampler.arm();
                self.read = ReadPhase::InFlight(sector);
            }
        }
    }
}

impl<B: SdBus> SectorSource for SdHost<B> {
    fn is_ready(&self) -> bool {
        self.bringup.is_ready()
    }

    fn is_busy(&self) -> bool {
        self.latched.is_some() || self.read != ReadPhase::Idle
    }

    fn start_read(&mut self, sector: u32) -> BlockIOResult {
        if !self.is_ready() {
            return Err(BlockIOError::NotReady);
        }
        if self.is_busy() {
            return Err(BlockIOError::Busy);
        }
        self.latched = Some(sector);
        Ok(())
    }

    fn tick(&mut self) -> SectorTick {
        self.tick_once()
    }

    fn buffer(&self) -> &SectorBuffer {
        &self.buffer
    }

    fn reset(&mut self) {
        self.engine.reset();
        self.bringup.reset();
        self.sampler = Sampler::new(BusWidth::One, self.config.data_timeout);
        self.divider = ClockDivider::new(self.config.clock.slow_divisor());
        self.buffer.clear();
        self.bringup_pending = false;
        self.read = ReadPhase::Idle;
        self.latched = None;
        self.completed = None;
        self.ticks = 0;
        self.reads = 0;
        self.read_retries = 0;
    }
}
