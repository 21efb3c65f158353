// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use sdrbus::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "sdrcat",
    version,
    about = "Stream a file from a FAT16/FAT32 disk image through a simulated SD card",
    long_about = None
)]
pub struct Cli {
    /// Disk image (raw sectors, with or without an MBR)
    pub image: PathBuf,

    /// File in the root directory, matched case-insensitively
    pub file: String,

    /// Write the file here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Data lines used once the card is ready
    #[arg(long, value_enum, default_value_t = WidthArg::Four)]
    pub bus_width: WidthArg,

    /// Host clock class in MHz
    #[arg(long, value_enum, default_value_t = ClockArg::Mhz25)]
    pub clock: ClockArg,

    /// Simulated card generation
    #[arg(long, value_enum, default_value_t = CardArg::Hc)]
    pub card: CardArg,

    /// Give up after this many ticks
    #[arg(long, default_value_t = 2_000_000_000)]
    pub max_ticks: u64,

    /// Sectors probed for a boot record or partition table
    #[arg(long, default_value_t = 64)]
    pub boot_search: u32,

    /// Read sectors straight from the image, bypassing the bus model
    #[arg(long)]
    pub direct: bool,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn host_config(&self) -> HostConfig {
        HostConfig::default()
            .with_width(self.bus_width.into())
            .with_clock(self.clock.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum WidthArg {
    #[value(name = "1")]
    One,
    #[value(name = "4")]
    Four,
}

impl From<WidthArg> for BusWidth {
    fn from(w: WidthArg) -> Self {
        match w {
            WidthArg::One => BusWidth::One,
            WidthArg::Four => BusWidth::Four,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ClockArg {
    #[value(name = "25")]
    Mhz25,
    #[value(name = "50")]
    Mhz50,
    #[value(name = "100")]
    Mhz100,
    #[value(name = "200")]
    Mhz200,
}

impl From<ClockArg> for ClockClass {
    fn from(c: ClockArg) -> Self {
        match c {
            ClockArg::Mhz25 => ClockClass::Mhz25,
            ClockArg::Mhz50 => ClockClass::Mhz50,
            ClockArg::Mhz100 => ClockClass::Mhz100,
            ClockArg::Mhz200 => ClockClass::Mhz200,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CardArg {
    /// Version 1, byte addressed
    Legacy,
    /// Version 2 standard capacity
    Sc,
    /// Version 2 high capacity
    Hc,
}

impl From<CardArg> for SimClass {
    fn from(c: CardArg) -> Self {
        match c {
            CardArg::Legacy => SimClass::Legacy,
            CardArg::Sc => SimClass::Standard,
            CardArg::Hc => SimClass::HighCapacity,
        }
    }
}
