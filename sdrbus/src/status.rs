// SPDX-License-Identifier: MIT

use bitflags::bitflags;

bitflags! {
    /// Card status word carried by R1 responses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CardStatus: u32 {
        const OUT_OF_RANGE    = 1 << 31;
        const ADDRESS_ERROR   = 1 << 30;
        const BLOCK_LEN_ERROR = 1 << 29;
        const COM_CRC_ERROR   = 1 << 23;
        const ILLEGAL_COMMAND = 1 << 22;
        const ERROR           = 1 << 19;
        const READY_FOR_DATA  = 1 << 8;
        const APP_CMD         = 1 << 5;

        const ANY_ERROR = Self::OUT_OF_RANGE.bits()
            | Self::ADDRESS_ERROR.bits()
            | Self::BLOCK_LEN_ERROR.bits()
            | Self::COM_CRC_ERROR.bits()
            | Self::ILLEGAL_COMMAND.bits()
            | Self::ERROR.bits();
    }
}

/// Card-side state encoded in status bits 12:9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CardState {
    Idle = 0,
    Ready = 1,
    Ident = 2,
    Stby = 3,
    Tran = 4,
    Data = 5,
}

impl CardStatus {
    #[inline]
    pub fn with_state(self, state: CardState) -> u32 {
        self.bits() | ((state as u32) << 9)
    }

    #[inline]
    pub fn state_bits(raw: u32) -> u8 {
        ((raw >> 9) & 0xF) as u8
    }
}

bitflags! {
    /// Operating-condition register bits (R3 payload, ACMD41 argument).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ocr: u32 {
        /// Power-up complete. Clear while the card is still busy.
        const READY = 1 << 31;
        /// Card capacity status (response) / host capacity support (argument).
        const CCS   = 1 << 30;
        /// 2.7-3.6 V window.
        const VDD_27_36 = 0x00FF_8000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_state_bits() {
        let raw = CardStatus::READY_FOR_DATA.with_state(CardState::Tran);
        assert_eq!(raw, 0x0000_0900);
        assert_eq!(CardStatus::state_bits(raw), CardState::Tran as u8);
        assert!(CardStatus::from_bits_truncate(raw).intersection(CardStatus::ANY_ERROR).is_empty());
    }

    #[test]
    fn test_ocr_arguments() {
        assert_eq!((Ocr::CCS | Ocr::VDD_27_36).bits(), 0x40FF_8000);
        assert_eq!(Ocr::VDD_27_36.bits(), 0x00FF_8000);
    }
}
