// SPDX-License-Identifier: MIT

//! CRC7 (command line) and CRC16-CCITT (data lines).
//!
//! Both come in a byte-wise form and a single-bit form; the bit-serial form is
//! what the data lines carry in four-line mode, one CRC per line.

/// CRC7 with polynomial x^7 + x^3 + 1, initial value 0.
///
/// Returns the raw 7-bit remainder (frames place it in bits 7:1 followed by the end bit).
pub const fn crc7(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    let mut i = 0;
    while i < data.len() {
        let mut d = data[i];
        let mut bit = 0;
        while bit < 8 {
            crc = crc7_push_bit(crc, d & 0x80 != 0);
            d <<= 1;
            bit += 1;
        }
        i += 1;
    }
    crc
}

/// Shifts one bit into a running CRC7.
#[inline(always)]
pub const fn crc7_push_bit(crc: u8, bit: bool) -> u8 {
    let feedback = ((crc >> 6) & 1 != 0) ^ bit;
    let crc = (crc << 1) & 0x7F;
    if feedback { crc ^ 0x09 } else { crc }
}

/// CRC16-CCITT (polynomial 0x1021, initial value 0) over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc = ((crc >> 8) & 0xFF) | (crc << 8);
        crc ^= u16::from(byte);
        crc ^= (crc & 0xFF) >> 4;
        crc ^= crc << 12;
        crc ^= (crc & 0xFF) << 5;
    }
    crc
}

/// Shifts one bit into a running CRC16-CCITT.
#[inline(always)]
pub const fn crc16_push_bit(crc: u16, bit: bool) -> u16 {
    let feedback = (crc & 0x8000 != 0) ^ bit;
    let crc = crc << 1;
    if feedback { crc ^ 0x1021 } else { crc }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd_crc(index: u8, arg: u32) -> u8 {
        let a = arg.to_be_bytes();
        crc7(&[0x40 | index, a[0], a[1], a[2], a[3]])
    }

    #[test]
    fn test_crc7_command_vectors() {
        assert_eq!(cmd_crc(0, 0), 0x4A);
        assert_eq!(cmd_crc(8, 0x1AA), 0x43);
        assert_eq!(cmd_crc(17, 0), 0x2A);
        assert_eq!(cmd_crc(55, 0), 0x32);
        assert_eq!(cmd_crc(41, 0x4000_0000), 0x3B);
    }

    #[test]
    fn test_crc7_response_vector() {
        // R1 echo of CMD17 with status 0x00000900 (tran state, ready for data)
        assert_eq!(crc7(&[0x11, 0x00, 0x00, 0x09, 0x00]), 0x33);
    }

    #[test]
    fn test_crc7_bitwise_matches_bytewise() {
        let data = [0x48, 0x00, 0x00, 0x01, 0xAA];
        let mut crc = 0u8;
        for byte in data {
            for i in (0..8).rev() {
                crc = crc7_push_bit(crc, (byte >> i) & 1 != 0);
            }
        }
        assert_eq!(crc, crc7(&data));
    }

    #[test]
    fn test_crc16_block_of_ones() {
        assert_eq!(crc16(&[0xFF; 512]), 0x7FA1);
        assert_eq!(crc16(&[]), 0);
    }

    #[test]
    fn test_crc16_bitwise_matches_bytewise() {
        let data: [u8; 64] = core::array::from_fn(|i| (i * 37 + 11) as u8);
        let mut crc = 0u16;
        for byte in data {
            for i in (0..8).rev() {
                crc = crc16_push_bit(crc, (byte >> i) & 1 != 0);
            }
        }
        assert_eq!(crc, crc16(&data));
    }
}
