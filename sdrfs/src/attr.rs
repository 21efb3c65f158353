// SPDX-License-Identifier: MIT

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirAttributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN    = 0x02;
        const SYSTEM    = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE   = 0x20;
        const LFN       = 0x0F;
    }
}

impl DirAttributes {
    /// Long-name slots carry exactly the four low bits.
    #[inline]
    pub fn is_lfn(raw: u8) -> bool {
        raw & 0x3F == Self::LFN.bits()
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    #[inline]
    pub fn is_volume_label(&self) -> bool {
        self.contains(Self::VOLUME_ID) && !self.contains(Self::LFN)
    }
}
