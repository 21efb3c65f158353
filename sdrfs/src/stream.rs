// SPDX-License-Identifier: MIT

/// One tick of file output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamByte {
    pub valid: bool,
    pub byte: u8,
}

impl StreamByte {
    pub const INVALID: StreamByte = StreamByte {
        valid: false,
        byte: 0,
    };
}

/// Gates file data bytes against the file size.
///
/// Whole sectors are delivered, so the tail of the last cluster arrives too;
/// only the first `size` bytes are marked valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStream {
    size: u32,
    counter: u64,
    emitted: u64,
    open: bool,
    closed: bool,
}

impl FileStream {
    pub const fn new() -> Self {
        Self {
            size: 0,
            counter: 0,
            emitted: 0,
            open: false,
            closed: false,
        }
    }

    pub fn open(&mut self, size: u32) {
        *self = Self {
            size,
            open: true,
            ..Self::new()
        };
    }

    /// After close the stream stays invalid until [`FileStream::reset`].
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Valid bytes emitted so far.
    #[inline]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn push(&mut self, byte: u8) -> StreamByte {
        if !self.open || self.closed {
            return StreamByte::INVALID;
        }
        let valid = self.counter < self.size as u64;
        self.counter += 1;
        if valid {
            self.emitted += 1;
        }
        StreamByte { valid, byte }
    }
}
