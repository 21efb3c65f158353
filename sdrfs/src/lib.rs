// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

// On-disk structures
pub mod attr;
pub mod types;

// Decoding
pub mod cluster;
pub mod entry;
pub mod errors;
pub mod layout;
pub mod name;

// Streaming read path
pub mod reader;
pub mod stream;
pub mod walker;

pub mod prelude {
    pub use crate::attr::DirAttributes;
    pub use crate::cluster::{ClusterCursor, Link};
    pub use crate::entry::{DirRecord, EntryParser, SlotEvent};
    pub use crate::errors::*;
    pub use crate::layout::{FsLayout, FsType};
    pub use crate::name::{NameBuf, NameDisplay, TargetName};
    pub use crate::reader::{FileReader, ReaderConfig, ReaderStatus};
    pub use crate::stream::{FileStream, StreamByte};
    pub use crate::walker::{FoundFile, Outcome, Walker, WalkerState};
}

pub use reader::{FileReader, ReaderConfig, ReaderStatus};
