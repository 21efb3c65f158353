// SPDX-License-Identifier: MIT
#![cfg_attr(not(feature = "std"), no_std)]

// Core modules
pub mod errors;
#[macro_use]
mod macros;
pub mod sector;
pub mod source;

// Backend modules
#[cfg(feature = "mem")]
mod mem;

#[cfg(feature = "std")]
mod std;

// Prelude re-exports (central entrypoint)
pub mod prelude {
    pub use super::BlockIO;
    pub use super::BlockIOExt;
    pub use super::errors::*;
    pub use super::sector::*;
    pub use super::source::BlockSectorSource;

    #[cfg(feature = "mem")]
    pub use super::mem::MemBlockIO;

    #[cfg(feature = "std")]
    pub use super::std::StdBlockIO;
}

pub use errors::*;
pub use sector::*;

// Traits

/// Block IO abstraction trait.
///
/// Allows read/write/flush at arbitrary byte offsets.
/// Implementations may target RAM, image files or a card behind a bus model.
pub trait BlockIO {
    /// Writes `data` at `offset` (absolute).
    fn write_at(&mut self, offset: u64, data: &[u8]) -> BlockIOResult;

    /// Reads `buf.len()` bytes into `buf` from `offset` (absolute).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> BlockIOResult;

    /// Flushes any buffered data (may be a no-op).
    fn flush(&mut self) -> BlockIOResult;

    fn set_offset(&mut self, partition_offset: u64) -> u64;
    fn partition_offset(&self) -> u64;
}

/// Extension helpers for BlockIO.
///
/// Provides sector-granular reads and little-endian primitive reads.
pub trait BlockIOExt: BlockIO {
    /// Reads the 512-byte sector at index `lba`.
    #[inline(always)]
    fn read_sector(&mut self, lba: u64, buf: &mut [u8; SECTOR_SIZE]) -> BlockIOResult {
        let offset = lba
            .checked_mul(SECTOR_SIZE as u64)
            .ok_or(BlockIOError::OutOfBounds)?;
        self.read_at(offset, buf)
    }

    /// Writes the 512-byte sector at index `lba`.
    #[inline(always)]
    fn write_sector(&mut self, lba: u64, buf: &[u8; SECTOR_SIZE]) -> BlockIOResult {
        let offset = lba
            .checked_mul(SECTOR_SIZE as u64)
            .ok_or(BlockIOError::OutOfBounds)?;
        self.write_at(offset, buf)
    }

    // Implements read helpers for primitive types (u16, u32, u64)
    blockio_impl_primitive_read!(u16, u32, u64);
}

impl<T: BlockIO + ?Sized> BlockIOExt for T {}

impl<T: BlockIO + ?Sized> BlockIO for &mut T {
    #[inline]
    fn write_at(&mut self, offset: u64, data: &[u8]) -> BlockIOResult {
        (**self).write_at(offset, data)
    }

    #[inline]
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> BlockIOResult {
        (**self).read_at(offset, buf)
    }

    #[inline]
    fn flush(&mut self) -> BlockIOResult {
        (**self).flush()
    }

    #[inline]
    fn set_offset(&mut self, partition_offset: u64) -> u64 {
        (**self).set_offset(partition_offset)
    }

    #[inline]
    fn partition_offset(&self) -> u64 {
        (**self).partition_offset()
    }
}
