// SPDX-License-Identifier: MIT

pub mod boot;
pub mod entries;
pub mod mbr;

pub use boot::*;
pub use entries::*;
pub use mbr::*;
