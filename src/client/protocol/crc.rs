/// CRC-8 lookup table shared with the client firmware (MSB first, polynomial 0xA6).
pub const CRC8_TABLE: [u8; 256] = [
    0x00, 0xA6, 0xEA, 0x4C, 0x72, 0xD4, 0x98, 0x3E, 0xE4, 0x42, 0x0E, 0xA8, 0x96, 0x30, 0x7C, 0xDA,
    0x6E, 0xC8, 0x84, 0x22, 0x1C, 0xBA, 0xF6, 0x50, 0x8A, 0x2C, 0x60, 0xC6, 0xF8, 0x5E, 0x12, 0xB4,
    0xDC, 0x7A, 0x36, 0x90, 0xAE, 0x08, 0x44, 0xE2, 0x38, 0x9E, 0xD2, 0x74, 0x4A, 0xEC, 0xA0, 0x06,
    0xB2, 0x14, 0x58, 0xFE, 0xC0, 0x66, 0x2A, 0x8C, 0x56, 0xF0, 0xBC, 0x1A, 0x24, 0x82, 0xCE, 0x68,
    0x1E, 0xB8, 0xF4, 0x52, 0x6C, 0xCA, 0x86, 0x20, 0xFA, 0x5C, 0x10, 0xB6, 0x88, 0x2E, 0x62, 0xC4,
    0x70, 0xD6, 0x9A, 0x3C, 0x02, 0xA4, 0xE8, 0x4E, 0x94, 0x32, 0x7E, 0xD8, 0xE6, 0x40, 0x0C, 0xAA,
    0xC2, 0x64, 0x28, 0x8E, 0xB0, 0x16, 0x5A, 0xFC, 0x26, 0x80, 0xCC, 0x6A, 0x54, 0xF2, 0xBE, 0x18,
    0xAC, 0x0A, 0x46, 0xE0, 0xDE, 0x78, 0x34, 0x92, 0x48, 0xEE, 0xA2, 0x04, 0x3A, 0x9C, 0xD0, 0x76,
    0x3C, 0x9A, 0xD6, 0x70, 0x4E, 0xE8, 0xA4, 0x02, 0xD8, 0x7E, 0x32, 0x94, 0xAA, 0x0C, 0x40, 0xE6,
    0x52, 0xF4, 0xB8, 0x1E, 0x20, 0x86, 0xCA, 0x6C, 0xB6, 0x10, 0x5C, 0xFA, 0xC4, 0x62, 0x2E, 0x88,
    0xE0, 0x46, 0x0A, 0xAC, 0x92, 0x34, 0x78, 0xDE, 0x04, 0xA2, 0xEE, 0x48, 0x76, 0xD0, 0x9C, 0x3A,
    0x8E, 0x28, 0x64, 0xC2, 0xFC, 0x5A, 0x16, 0xB0, 0x6A, 0xCC, 0x80, 0x26, 0x18, 0xBE, 0xF2, 0x54,
    0x22, 0x84, 0xC8, 0x6E, 0x50, 0xF6, 0xBA, 0x1C, 0xC6, 0x60, 0x2C, 0x8A, 0xB4, 0x12, 0x5E, 0xF8,
    0x4C, 0xEA, 0xA6, 0x00, 0x3E, 0x98, 0xD4, 0x72, 0xA8, 0x0E, 0x42, 0xE4, 0xDA, 0x7C, 0x30, 0x96,
    0xFE, 0x58, 0x14, 0xB2, 0x8C, 0x2A, 0x66, 0xC0, 0x1A, 0xBC, 0xF0, 0x56, 0x68, 0xCE, 0x82, 0x24,
    0x90, 0x36, 0x7A, 0xDC, 0xE2, 0x44, 0x08, 0xAE, 0x74, 0xD2, 0x9E, 0x38, 0x06, 0xA0, 0xEC, 0x4A,
];

pub fn crc8(buffer: &[u8]) -> u8 {
    buffer
        .iter()
        .fold(0u8, |crc, byte| CRC8_TABLE[(crc ^ byte) as usize])
}

/// CRC over `length` bytes starting at `offset`, clamped to the buffer.
pub fn crc8_range(buffer: &[u8], offset: usize, length: usize) -> u8 {
    let start = offset.min(buffer.len());
    let end = offset.saturating_add(length).min(buffer.len());
    crc8(&buffer[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_entry(index: u8) -> u8 {
        let mut crc = index;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0xA6 } else { crc << 1 };
        }
        crc
    }

    #[test]
    fn table_matches_reference_entries() {
        assert_eq!(CRC8_TABLE[0x00], 0x00);
        assert_eq!(CRC8_TABLE[0x01], 0xA6);
        assert_eq!(CRC8_TABLE[0x0F], 0xDA);
        assert_eq!(CRC8_TABLE[0x80], 0x3C);
        assert_eq!(CRC8_TABLE[0xD3], 0x00);
        assert_eq!(CRC8_TABLE[0xFF], 0x4A);
        for index in 0..=255u8 {
            assert_eq!(CRC8_TABLE[index as usize], table_entry(index), "entry {index:#04x}");
        }
    }

    #[test]
    fn known_frame_checksums() {
        assert_eq!(crc8(&[0x03, 0x00, 0x00, 0x01]), 0x0E);
        assert_eq!(crc8(&[0x02, 0x00, 0x10]), 0xFE);
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn range_matches_slice_and_clamps() {
        let frame = [0x23, 0x03, 0x00, 0x00, 0x01, 0x0E];
        assert_eq!(crc8_range(&frame, 1, 4), 0x0E);
        assert_eq!(crc8_range(&frame, 1, 100), crc8(&frame[1..]));
        assert_eq!(crc8_range(&frame, 10, 4), 0x00);
    }

    #[test]
    fn detects_every_single_bit_error() {
        for len in 1..=32usize {
            let buffer: Vec<u8> = (0..len)
                .map(|i| (i as u8).wrapping_mul(37).wrapping_add(11))
                .collect();
            let reference = crc8(&buffer);
            assert_eq!(reference, crc8(&buffer));
            for byte in 0..len {
                for bit in 0..8 {
                    let mut corrupted = buffer.clone();
                    corrupted[byte] ^= 1 << bit;
                    assert_ne!(crc8(&corrupted), reference, "len {len} byte {byte} bit {bit}");
                }
            }
        }
    }
}
