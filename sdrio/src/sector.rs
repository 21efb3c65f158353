// SPDX-License-Identifier: MIT

use core::fmt;

/// Fixed sector size handled by the card and the filesystem layer.
pub const SECTOR_SIZE: usize = 512;

/// Boot/partition signature stored in the last two bytes of a signed sector.
pub const SECTOR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Checked byte index inside a sector (0..=511).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SectorOffset(u16);

impl SectorOffset {
    pub const FIRST: SectorOffset = SectorOffset(0);
    pub const LAST: SectorOffset = SectorOffset(SECTOR_SIZE as u16 - 1);

    #[inline]
    pub const fn new(index: usize) -> Option<Self> {
        if index < SECTOR_SIZE {
            Some(Self(index as u16))
        } else {
            None
        }
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_last(self) -> bool {
        self.0 as usize == SECTOR_SIZE - 1
    }

    /// Position inside the 32-byte directory slot containing this offset.
    #[inline]
    pub const fn slot_index(self) -> usize {
        (self.0 as usize) & 0x1F
    }

    /// Next offset in the sector, `None` after the last byte.
    #[inline]
    pub const fn next(self) -> Option<Self> {
        Self::new(self.0 as usize + 1)
    }
}

impl fmt::Display for SectorOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#05x}", self.0)
    }
}

/// The single sector buffer shared between the sampler (writer) and the
/// filesystem layer (readers).
#[derive(Clone)]
pub struct SectorBuffer {
    bytes: [u8; SECTOR_SIZE],
}

impl SectorBuffer {
    #[inline]
    pub const fn new() -> Self {
        Self {
            bytes: [0u8; SECTOR_SIZE],
        }
    }

    #[inline]
    pub fn set(&mut self, offset: SectorOffset, value: u8) {
        self.bytes[offset.get()] = value;
    }

    #[inline]
    pub fn get(&self, offset: SectorOffset) -> u8 {
        self.bytes[offset.get()]
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; SECTOR_SIZE] {
        &self.bytes
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8; SECTOR_SIZE] {
        &mut self.bytes
    }

    /// True when the sector ends with `0x55 0xAA`.
    #[inline]
    pub fn has_signature(&self) -> bool {
        self.bytes[SECTOR_SIZE - 2..] == SECTOR_SIGNATURE
    }

    pub fn clear(&mut self) {
        self.bytes = [0u8; SECTOR_SIZE];
    }

    sector_impl_le_fields!(u16, u32);
}

impl Default for SectorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SectorBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectorBuffer")
            .field("head", &&self.bytes[..16])
            .field("signature", &self.has_signature())
            .finish()
    }
}

/// One delivered sector byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SectorByte {
    pub offset: SectorOffset,
    pub value: u8,
}

/// Per-tick output of a [`SectorSource`].
///
/// `byte` carries at most one `(offset, value)` tuple; `done` pulses for exactly
/// one tick once all 512 bytes of the current read were delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectorTick {
    pub byte: Option<SectorByte>,
    pub done: bool,
}

impl SectorTick {
    pub const IDLE: SectorTick = SectorTick {
        byte: None,
        done: false,
    };
}

/// Tick-driven sector read interface.
///
/// A read is requested with [`SectorSource::start_read`]; the request is latched and
/// acted upon from the next [`SectorSource::tick`]. Implementations retry internally
/// until the sector arrives, so a read never fails, it only takes longer.
pub trait SectorSource {
    /// True once the source accepts reads.
    fn is_ready(&self) -> bool;

    /// True while a read is latched or in flight.
    fn is_busy(&self) -> bool;

    /// Latches a read of `sector` (a sector index, never a byte address).
    fn start_read(&mut self, sector: u32) -> crate::BlockIOResult;

    /// Advances the source by one tick.
    fn tick(&mut self) -> SectorTick;

    /// The shared sector buffer. Stable between a `done` pulse and the next read.
    fn buffer(&self) -> &SectorBuffer;

    /// Hard reset: every internal state machine returns to its initial state.
    fn reset(&mut self);
}
