// SPDX-License-Identifier: MIT

mod common;

use common::*;
use sdrbus::prelude::*;
use sdrfs::prelude::*;
use sdrio::prelude::*;

const BUDGET: u64 = 20_000_000;

type SimHost<'a> = SdHost<SimCard<MemBlockIO<'a>>>;

fn reader<'a>(image: &'a mut [u8], class: SimClass, config: HostConfig, name: &str) -> FileReader<SimHost<'a>> {
    let card = SimCard::new(MemBlockIO::new(image), SimProfile::new(class));
    FileReader::new(SdHost::new(card, config), ReaderConfig::new(name).unwrap())
}

fn hello_image() -> TestImage {
    let mut img = TestImage::fat16(0, 4);
    img.skip_slots(3);
    img.add_file(b"HELLO   TXT", &[5], b"Hello World");
    img
}

fn read_hello(class: SimClass, config: HostConfig) -> HostStatus {
    let mut img = hello_image();
    let mut r = reader(&mut img.bytes, class, config, "hello.txt");
    let mut out = Vec::new();
    assert_eq!(r.run(|b| out.push(b), BUDGET), Ok(11));
    assert_eq!(out, b"Hello World");
    assert_eq!(r.status().fs_type, FsType::Fat16);
    r.source().status()
}

#[test]
fn test_legacy_card_one_line() {
    let status = read_hello(SimClass::Legacy, HostConfig::default().with_width(BusWidth::One));
    assert_eq!(status.class, CardClass::V1);
    assert_eq!(status.state, BringupState::Ready);
}

#[test]
fn test_standard_card_four_lines() {
    let status = read_hello(SimClass::Standard, HostConfig::default().with_width(BusWidth::Four));
    assert_eq!(status.class, CardClass::V2);
}

#[test]
fn test_high_capacity_card_four_lines() {
    let status = read_hello(
        SimClass::HighCapacity,
        HostConfig::default().with_width(BusWidth::Four).with_clock(ClockClass::Mhz50),
    );
    assert_eq!(status.class, CardClass::V2HC);
    // probe, boot record, root, four data sectors, one FAT sector
    assert_eq!(status.reads, 8);
}

#[test]
fn test_fat32_multi_cluster_through_card() {
    let mut img = TestImage::fat32(8192, 2);
    let data = pattern(5000, 17);
    img.push_long_entry("sensor-log.bin", b"SENSOR~1BIN", 20, data.len() as u32);
    img.link(&[20, 21, 30, 22, 23]);
    img.write_chain(&[20, 21, 30, 22, 23], &data);

    let mut r = reader(&mut img.bytes, SimClass::HighCapacity, HostConfig::default(), "SENSOR-LOG.BIN");
    let mut out = Vec::new();
    assert_eq!(r.run(|b| out.push(b), BUDGET), Ok(5000));
    assert_eq!(out, data);
    assert_eq!(r.status().fs_type, FsType::Fat32);
}

#[test]
fn test_dropped_and_garbled_reads_are_retried() {
    let mut img = hello_image();
    let config = HostConfig::default().with_width(BusWidth::Four).with_data_timeout(20_000);
    let mut r = reader(&mut img.bytes, SimClass::HighCapacity, config, "hello.txt");
    r.source_mut().bus_mut().drop_reads(2);
    r.source_mut().bus_mut().garble_reads(1);

    let mut out = Vec::new();
    assert_eq!(r.run(|b| out.push(b), BUDGET), Ok(11));
    assert_eq!(out, b"Hello World");
    assert_eq!(r.source().status().read_retries, 3);
}

#[test]
fn test_not_found_through_card() {
    let mut img = hello_image();
    let mut r = reader(&mut img.bytes, SimClass::Standard, HostConfig::default(), "world.txt");
    assert_eq!(r.run(|_| {}, BUDGET), Err(FsReadError::NotFound));
    let status = r.status();
    assert!(!status.found);
    assert_eq!(status.emitted, 0);
}

#[test]
fn test_reset_mid_walk() {
    let mut img = hello_image();
    let mut r = reader(&mut img.bytes, SimClass::HighCapacity, HostConfig::default(), "hello.txt");
    // well into bring-up or the first reads
    for _ in 0..150_000 {
        assert!(!r.tick().valid);
    }
    r.reset();
    assert!(!r.source().is_ready());
    assert_eq!(r.status().state, WalkerState::Reset);

    let mut out = Vec::new();
    assert_eq!(r.run(|b| out.push(b), BUDGET), Ok(11));
    assert_eq!(out, b"Hello World");
}
