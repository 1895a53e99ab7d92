//! CRC-8, polynomial 0x93 (MSB-first, init 0, no reflect, no xorout).
//!
//! Covers host-frame framing (§4.2 of the protocol spec). Test vectors
//! below are a conformance fixture, not a property test: they pin the
//! exact bit convention so a future refactor can't silently swap in a
//! reflected variant.

const POLY: u8 = 0x93;

pub fn crc8_byte(crc: u8, byte: u8) -> u8 {
    let mut crc = crc ^ byte;
    let mut i = 0;
    while i < 8 {
        crc = if crc & 0x80 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
        i += 1;
    }
    crc
}

pub fn crc8(byte: u8) -> u8 {
    crc8_byte(0, byte)
}

pub fn crc8_2(a: u8, b: u8) -> u8 {
    crc8_byte(crc8_byte(0, a), b)
}

pub fn crc8_3(a: u8, b: u8, c: u8) -> u8 {
    crc8_byte(crc8_byte(crc8_byte(0, a), b), c)
}

pub fn crc8_span(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &b| crc8_byte(crc, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_vectors() {
        assert_eq!(crc8(0x00), 0x00);
        assert_eq!(crc8(0x55), 0x86);
        assert_eq!(crc8(0xAA), 0x9F);
        assert_eq!(crc8(0xFF), 0x19);
    }

    #[test]
    fn two_byte_vectors() {
        assert_eq!(crc8_2(0x80, 0x00), 0x74);
        assert_eq!(crc8_2(0xE0, 0x78), 0xC9);
        assert_eq!(crc8_2(0x03, 0x01), 0xC8);
    }

    #[test]
    fn span_vectors() {
        assert_eq!(crc8_span(&[0x04, 0x08, 0x30]), 0xF9);
        assert_eq!(crc8_span(&[0x04, 0x02, 0x01]), 0xF6);
        assert_eq!(crc8_span(&[0x05, 0x17, 0x08, 0xE1]), 0xC8);
    }

    #[test]
    fn span_agrees_with_byte_and_triple_helpers() {
        assert_eq!(crc8_3(0x04, 0x08, 0x30), crc8_span(&[0x04, 0x08, 0x30]));
        assert_eq!(crc8_2(0x80, 0x00), crc8_span(&[0x80, 0x00]));
    }
}
