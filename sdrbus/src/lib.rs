// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

pub mod bringup;
pub mod crc;
pub mod engine;
pub mod frame;
pub mod host;
pub mod line;
pub mod sampler;
pub mod status;

#[cfg(feature = "sim")]
pub mod sim;

pub mod prelude {
    pub use crate::bringup::{Bringup, BringupState, CardClass, CardSession};
    pub use crate::engine::CmdEngine;
    pub use crate::frame::{Command, Response, ResponseKind};
    pub use crate::host::{HostConfig, HostStatus, SdHost};
    pub use crate::line::{BusWidth, ClockClass, ClockMode, CmdPin, LineSample, SdBus};
    pub use crate::sampler::Sampler;

    #[cfg(feature = "sim")]
    pub use crate::sim::{SimCard, SimClass, SimProfile};
}

pub use host::{HostConfig, HostStatus, SdHost};
