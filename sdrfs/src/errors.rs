// SPDX-License-Identifier: MIT

use core::fmt;

pub use sdrio::errors::*;

/// Result type for file reads.
pub type FsReadResult<T = ()> = core::result::Result<T, FsReadError>;

/// Terminal failure of a file read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsReadError {
    /// No FAT16/FAT32 volume with 512-byte sectors was found.
    Unsupported,
    NotFound,
    /// Inconsistent volume geometry, or a cluster chain that left the data
    /// area or looped.
    Corrupted,
    /// The tick budget ran out before the walk finished.
    Stalled { ticks: u64 },
    /// Target name empty or longer than 255 bytes.
    InvalidName,
    IO(BlockIOError),
}

impl FsReadError {
    pub fn msg(&self) -> &'static str {
        match self {
            FsReadError::Unsupported => "Unsupported or missing filesystem",
            FsReadError::NotFound => "File not found",
            FsReadError::Corrupted => "Corrupted filesystem",
            FsReadError::Stalled { .. } => "Read stalled",
            FsReadError::InvalidName => "Invalid file name",
            FsReadError::IO(_) => "IO error",
        }
    }
}

impl From<BlockIOError> for FsReadError {
    fn from(e: BlockIOError) -> Self {
        FsReadError::IO(e)
    }
}

impl fmt::Display for FsReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsReadError::Stalled { ticks } => write!(f, "{} after {ticks} ticks", self.msg()),
            FsReadError::IO(e) => write!(f, "{}: {e}", self.msg()),
            _ => write!(f, "{}", self.msg()),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FsReadError {}

/// Why a cluster chain could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainError {
    InvalidCluster(u32),
    LoopDetected,
}

impl ChainError {
    pub fn msg(&self) -> &'static str {
        match self {
            ChainError::InvalidCluster(_) => "Invalid cluster in FAT chain",
            ChainError::LoopDetected => "Loop detected in FAT chain",
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidCluster(c) => write!(f, "{} ({c:#x})", self.msg()),
            ChainError::LoopDetected => write!(f, "{}", self.msg()),
        }
    }
}

/// Why a boot record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    MissingSignature,
    SectorSize(u16),
    /// Fewer than 4085 clusters: FAT12, not handled.
    Fat12 { clusters: u32 },
    Geometry(&'static str),
}

impl LayoutError {
    pub fn msg(&self) -> &'static str {
        match self {
            LayoutError::MissingSignature => "Boot record signature missing",
            LayoutError::SectorSize(_) => "Unsupported bytes per sector",
            LayoutError::Fat12 { .. } => "FAT12 is not supported",
            LayoutError::Geometry(msg) => msg,
        }
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::SectorSize(bps) => write!(f, "{} ({bps})", self.msg()),
            LayoutError::Fat12 { clusters } => write!(f, "{} ({clusters} clusters)", self.msg()),
            _ => write!(f, "{}", self.msg()),
        }
    }
}
