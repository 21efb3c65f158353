// SPDX-License-Identifier: MIT

use sdrbus::prelude::*;
use sdrio::prelude::*;

const SECTORS: usize = 16;
const BRINGUP_TICKS: u64 = 1_000_000;
const READ_TICKS: u64 = 200_000;

fn image() -> Vec<u8> {
    (0..SECTORS * SECTOR_SIZE)
        .map(|i| ((i / SECTOR_SIZE) as u8).wrapping_mul(31) ^ (i as u8))
        .collect()
}

fn read<B: SdBus>(host: &mut SdHost<B>, sector: u32, budget: u64) -> Option<Vec<u8>> {
    host.start_read(sector).expect("start_read failed");
    let mut out = Vec::with_capacity(SECTOR_SIZE);
    for _ in 0..budget {
        let t = host.tick();
        if let Some(b) = t.byte {
            assert_eq!(b.offset.get(), out.len(), "bytes out of order");
            out.push(b.value);
        }
        if t.done {
            return Some(out);
        }
    }
    None
}

/// Card whose command-line replies stop reaching the host once `mute` is set.
struct MutedCmd<'a> {
    card: SimCard<MemBlockIO<'a>>,
    mute: bool,
}

impl SdBus for MutedCmd<'_> {
    fn clock(&mut self, cmd: CmdPin) -> LineSample {
        let mut line = self.card.clock(cmd);
        if self.mute {
            line.cmd = true;
        }
        line
    }
}

fn bring_up_and_read(class: SimClass, width: BusWidth, clock: ClockClass) -> CardClass {
    let mut img = image();
    let expected = img.clone();
    let card = SimCard::new(MemBlockIO::new(&mut img), SimProfile::new(class));
    let config = HostConfig::default().with_width(width).with_clock(clock);
    let mut host = SdHost::new(card, config);

    assert_eq!(host.bring_up(BRINGUP_TICKS), BringupState::Ready);
    assert_eq!(host.status().clock, ClockMode::Fast);
    assert_eq!(host.bus().is_wide(), width == BusWidth::Four);

    for sector in [0u32, 3, 15] {
        let data = read(&mut host, sector, READ_TICKS).expect("read did not complete");
        let at = sector as usize * SECTOR_SIZE;
        assert_eq!(&data[..], &expected[at..at + SECTOR_SIZE], "sector {sector} mismatch");
        assert_eq!(&host.buffer().as_bytes()[..], &data[..]);
    }
    assert_eq!(host.status().reads, 3);
    assert_eq!(host.status().read_retries, 0);
    host.status().class
}

#[test]
fn test_legacy_card_one_line() {
    let class = bring_up_and_read(SimClass::Legacy, BusWidth::One, ClockClass::Mhz25);
    assert_eq!(class, CardClass::V1);
}

#[test]
fn test_standard_card_four_lines() {
    let class = bring_up_and_read(SimClass::Standard, BusWidth::Four, ClockClass::Mhz25);
    assert_eq!(class, CardClass::V2);
}

#[test]
fn test_high_capacity_card_one_line() {
    let class = bring_up_and_read(SimClass::HighCapacity, BusWidth::One, ClockClass::Mhz25);
    assert_eq!(class, CardClass::V2HC);
}

#[test]
fn test_high_capacity_card_four_lines_slow_tick_source() {
    let class = bring_up_and_read(SimClass::HighCapacity, BusWidth::Four, ClockClass::Mhz50);
    assert_eq!(class, CardClass::V2HC);
}

#[test]
fn test_not_ready_before_bring_up() {
    let mut img = image();
    let card = SimCard::new(MemBlockIO::new(&mut img), SimProfile::default());
    let mut host = SdHost::new(card, HostConfig::default());
    assert!(!host.is_ready());
    assert_eq!(host.start_read(0), Err(BlockIOError::NotReady));
    assert_eq!(host.status().state, BringupState::Reset);
}

#[test]
fn test_busy_while_reading() {
    let mut img = image();
    let card = SimCard::new(MemBlockIO::new(&mut img), SimProfile::default());
    let mut host = SdHost::new(card, HostConfig::default());
    host.bring_up(BRINGUP_TICKS);
    host.start_read(1).expect("start_read failed");
    assert!(host.is_busy());
    assert_eq!(host.start_read(2), Err(BlockIOError::Busy));
}

#[test]
fn test_dropped_reads_are_retried() {
    let mut img = image();
    let expected = img.clone();
    let card = SimCard::new(MemBlockIO::new(&mut img), SimProfile::default());
    let mut host = SdHost::new(card, HostConfig::default().with_data_timeout(20_000));
    host.bring_up(BRINGUP_TICKS);

    host.bus_mut().drop_reads(3);
    let data = read(&mut host, 7, READ_TICKS).expect("read did not complete");
    assert_eq!(&data[..], &expected[7 * SECTOR_SIZE..8 * SECTOR_SIZE]);
    assert_eq!(host.status().read_retries, 3);
    assert_eq!(host.bus().reads_served(), 1);
}

#[test]
fn test_garbled_response_is_retried() {
    let mut img = image();
    let card = SimCard::new(MemBlockIO::new(&mut img), SimProfile::default());
    let mut host = SdHost::new(card, HostConfig::default().with_width(BusWidth::Four));
    host.bring_up(BRINGUP_TICKS);

    host.bus_mut().garble_reads(2);
    assert!(read(&mut host, 2, READ_TICKS).is_some());
    assert_eq!(host.status().read_retries, 2);
}

#[test]
fn test_lost_response_after_data_started_finishes_block() {
    let mut img = image();
    let expected = img.clone();
    let card = SimCard::new(MemBlockIO::new(&mut img), SimProfile::default());
    let config = HostConfig::default()
        .with_width(BusWidth::One)
        .with_response_timeout(256);
    let mut host = SdHost::new(MutedCmd { card, mute: false }, config);
    assert_eq!(host.bring_up(BRINGUP_TICKS), BringupState::Ready);

    // the response times out while the block is already streaming
    host.bus_mut().mute = true;
    let data = read(&mut host, 5, READ_TICKS).expect("read did not complete");
    assert_eq!(&data[..], &expected[5 * SECTOR_SIZE..6 * SECTOR_SIZE]);
    assert_eq!(host.status().reads, 1);
    assert_eq!(host.status().read_retries, 0);
    assert_eq!(host.bus().card.reads_served(), 1);
}

#[test]
fn test_missing_data_retries_forever() {
    let mut img = image();
    let card = SimCard::new(MemBlockIO::new(&mut img), SimProfile::default());
    let mut host = SdHost::new(card, HostConfig::default().with_data_timeout(5_000));
    host.bring_up(BRINGUP_TICKS);

    // past the end of the image: the card answers with an error and sends nothing
    assert!(read(&mut host, SECTORS as u32 + 4, 60_000).is_none());
    assert!(host.is_busy());
    assert!(host.status().read_retries >= 5);
}

#[test]
fn test_reset_runs_bring_up_again() {
    let mut img = image();
    let card = SimCard::new(MemBlockIO::new(&mut img), SimProfile::default());
    let mut host = SdHost::new(card, HostConfig::default().with_width(BusWidth::Four));
    assert_eq!(host.bring_up(BRINGUP_TICKS), BringupState::Ready);
    assert!(host.bus().is_wide());

    host.reset();
    assert!(!host.is_ready());
    assert_eq!(host.status().class, CardClass::Unknown);
    assert_eq!(host.bring_up(BRINGUP_TICKS), BringupState::Ready);
    assert!(read(&mut host, 0, READ_TICKS).is_some());
}

#[test]
fn test_slow_busy_card() {
    let mut img = image();
    let profile = SimProfile::new(SimClass::Standard)
        .with_busy_polls(20)
        .with_response_delay(40)
        .with_access_delay(300);
    let card = SimCard::new(MemBlockIO::new(&mut img), profile);
    let mut host = SdHost::new(card, HostConfig::default());
    assert_eq!(host.bring_up(4 * BRINGUP_TICKS), BringupState::Ready);
    assert!(read(&mut host, 9, READ_TICKS).is_some());
}
