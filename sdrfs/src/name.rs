// SPDX-License-Identifier: MIT

//! Directory entry names: short-name decoding, long-name checksum, target matching.

use core::fmt;

use crate::errors::{FsReadError, FsReadResult};
use crate::types::SLOT_KANJI_E5;

pub const MAX_NAME_LEN: usize = 255;

/// Reconstructed entry name, one UTF-16 code unit per element.
pub type NameBuf = heapless::Vec<u16, MAX_NAME_LEN>;

/// ASCII a-z folded to upper case; everything else untouched.
#[inline(always)]
pub fn fold(unit: u16) -> u16 {
    if (b'a' as u16..=b'z' as u16).contains(&unit) {
        unit - 0x20
    } else {
        unit
    }
}

/// Decodes an 11-byte short name: base and extension with trailing spaces
/// stripped, joined with `.` only when the extension is not empty.
pub fn decode_short(raw: &[u8; 11], out: &mut NameBuf) {
    out.clear();
    let base = trim_spaces(&raw[..8]);
    let ext = trim_spaces(&raw[8..]);

    for (i, &b) in base.iter().enumerate() {
        let b = if i == 0 && b == SLOT_KANJI_E5 { 0xE5 } else { b };
        let _ = out.push(b as u16);
    }
    if !ext.is_empty() {
        let _ = out.push(b'.' as u16);
        for &b in ext {
            let _ = out.push(b as u16);
        }
    }
}

fn trim_spaces(part: &[u8]) -> &[u8] {
    let end = part.iter().rposition(|b| *b != b' ').map_or(0, |p| p + 1);
    &part[..end]
}

/// Rolling checksum of a short name, stored in every slot of its long-name run.
pub fn lfn_checksum(short: &[u8; 11]) -> u8 {
    short
        .iter()
        .fold(0u8, |sum, &b| sum.rotate_right(1).wrapping_add(b))
}

/// The configured file to look for.
///
/// Kept twice: as UTF-8 bytes for short names, which are stored byte per
/// character, and as UTF-16 units for long names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetName {
    bytes: heapless::Vec<u8, MAX_NAME_LEN>,
    units: NameBuf,
}

impl TargetName {
    pub fn new(name: &str) -> FsReadResult<Self> {
        if name.is_empty() {
            return Err(FsReadError::InvalidName);
        }
        let bytes = heapless::Vec::from_slice(name.as_bytes()).map_err(|_| FsReadError::InvalidName)?;
        let mut units = NameBuf::new();
        for unit in name.encode_utf16() {
            units.push(unit).map_err(|_| FsReadError::InvalidName)?;
        }
        Ok(Self { bytes, units })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn as_units(&self) -> &[u16] {
        &self.units
    }

    /// Compares with a name decoded from a long-name run.
    pub fn matches_long(&self, name: &[u16]) -> bool {
        same_folded(name, self.units.iter().copied())
    }

    /// Compares with a name decoded from a short entry.
    pub fn matches_short(&self, name: &[u16]) -> bool {
        same_folded(name, self.bytes.iter().map(|&b| b as u16))
    }

    /// Matches `name` as a long or a short name, per `long`.
    #[inline]
    pub fn matches(&self, name: &[u16], long: bool) -> bool {
        if long {
            self.matches_long(name)
        } else {
            self.matches_short(name)
        }
    }
}

/// Case-insensitive (ASCII) and length-exact.
fn same_folded(name: &[u16], target: impl ExactSizeIterator<Item = u16>) -> bool {
    name.len() == target.len() && name.iter().zip(target).all(|(&u, t)| fold(u) == fold(t))
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(&self.bytes) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:02x?}", &self.bytes[..]),
        }
    }
}

/// Display adapter for a decoded name.
pub struct NameDisplay<'a>(pub &'a [u16]);

impl fmt::Display for NameDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in char::decode_utf16(self.0.iter().copied()) {
            f.write_fmt(format_args!("{}", c.unwrap_or(char::REPLACEMENT_CHARACTER)))?;
        }
        Ok(())
    }
}
