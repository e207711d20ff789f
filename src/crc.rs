//! Mode S CRC-24 and bit-error recovery.
//!
//! Two interchangeable implementations of the checksum exist: a table of
//! precomputed per-bit contributions (the production path) and a schoolbook
//! polynomial division. Both return the 24-bit residue of the full message
//! including its trailing parity field; a residue of 0 means the message is
//! intact. For DF 0/4/5/16/20/21 the transmitter overlays its ICAO address
//! on the parity bits, so the residue of an intact message equals that
//! address instead.

/// Generator polynomial, 25 bits:
/// x^24+x^23+x^22+x^21+x^20+x^19+x^18+x^17+x^16+x^15+x^14+x^13+x^12+x^10+x^3+1
const GENERATOR: u32 = 0b1_1111_1111_1111_0100_0000_1001;

/// Per-bit CRC contributions for a 112-bit message; 56-bit messages use the
/// last 56 entries. The final 24 entries are zero since the parity field
/// does not contribute to its own checksum.
pub const MODES_CHECKSUM_TABLE: [u32; 112] = [
    0x3935ea, 0x1c9af5, 0xf1b77e, 0x78dbbf, 0xc397db, 0x9e31e9, 0xb0e2f0, 0x587178,
    0x2c38bc, 0x161c5e, 0x0b0e2f, 0xfa7d13, 0x82c48d, 0xbe9842, 0x5f4c21, 0xd05c14,
    0x682e0a, 0x341705, 0xe5f186, 0x72f8c3, 0xc68665, 0x9cb936, 0x4e5c9b, 0xd8d449,
    0x939020, 0x49c810, 0x24e408, 0x127204, 0x093902, 0x049c81, 0xfdb444, 0x7eda22,
    0x3f6d11, 0xe04c8c, 0x702646, 0x381323, 0xe3f395, 0x8e03ce, 0x4701e7, 0xdc7af7,
    0x91c77f, 0xb719bb, 0xa476d9, 0xadc168, 0x56e0b4, 0x2b705a, 0x15b82d, 0xf52612,
    0x7a9309, 0xc2b380, 0x6159c0, 0x30ace0, 0x185670, 0x0c2b38, 0x06159c, 0x030ace,
    0x018567, 0xff38b7, 0x80665f, 0xbfc92b, 0xa01e91, 0xaff54c, 0x57faa6, 0x2bfd53,
    0xea04ad, 0x8af852, 0x457c29, 0xdd4410, 0x6ea208, 0x375104, 0x1ba882, 0x0dd441,
    0xf91024, 0x7c8812, 0x3e4409, 0xe0d800, 0x706c00, 0x383600, 0x1c1b00, 0x0e0d80,
    0x0706c0, 0x038360, 0x01c1b0, 0x00e0d8, 0x00706c, 0x003836, 0x001c1b, 0xfff409,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
    0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000, 0x000000,
];

#[inline]
fn msg_bit(msg: &[u8], i: usize) -> u8 {
    (msg[i / 8] >> (7 - i % 8)) & 1
}

/// The transmitted 24-bit parity field (last three bytes).
pub fn parity_field(msg: &[u8], bits: usize) -> u32 {
    let len = bits / 8;
    ((msg[len - 3] as u32) << 16) | ((msg[len - 2] as u32) << 8) | msg[len - 1] as u32
}

/// Table-driven residue over a 56- or 112-bit message.
pub fn checksum(msg: &[u8], bits: usize) -> u32 {
    debug_assert!(bits == 56 || bits == 112);
    debug_assert!(msg.len() >= bits / 8);

    let offset = if bits == 112 { 0 } else { 56 };
    let mut crc: u32 = 0;
    for i in 0..bits - 24 {
        if msg_bit(msg, i) != 0 {
            crc ^= MODES_CHECKSUM_TABLE[i + offset];
        }
    }
    crc ^ parity_field(msg, bits)
}

/// Shift-and-XOR residue; must agree bit-exactly with [`checksum`].
#[allow(dead_code)]
pub fn checksum_schoolbook(msg: &[u8], bits: usize) -> u32 {
    debug_assert!(bits == 56 || bits == 112);

    let mut buf: Vec<u8> = (0..bits).map(|i| msg_bit(msg, i)).collect();
    for i in 0..bits - 24 {
        if buf[i] == 1 {
            for j in 0..25 {
                buf[i + j] ^= ((GENERATOR >> (24 - j)) & 1) as u8;
            }
        }
    }
    buf[bits - 24..]
        .iter()
        .fold(0u32, |acc, &b| (acc << 1) | b as u32)
}

/// Flip one bit at a time (from bit 5, keeping the DF intact) and accept the
/// first flip that zeroes the residue. The message is fixed in place.
pub fn fix_single_bit(msg: &mut [u8], bits: usize) -> Option<usize> {
    let len = bits / 8;
    let mut aux = [0u8; 14];
    aux[..len].copy_from_slice(&msg[..len]);

    for j in 5..bits {
        let mask = 0x80u8 >> (j % 8);
        aux[j / 8] ^= mask;
        if checksum(&aux[..len], bits) == 0 {
            msg[..len].copy_from_slice(&aux[..len]);
            return Some(j);
        }
        aux[j / 8] ^= mask;
    }
    None
}

/// Two-bit variant for offline use; quadratic and kept out of the live path.
#[allow(dead_code)]
pub fn fix_two_bits(msg: &mut [u8], bits: usize) -> Option<(usize, usize)> {
    let len = bits / 8;
    let mut aux = [0u8; 14];

    for j in 5..bits {
        for i in j + 1..bits {
            aux[..len].copy_from_slice(&msg[..len]);
            aux[j / 8] ^= 0x80u8 >> (j % 8);
            aux[i / 8] ^= 0x80u8 >> (i % 8);
            if checksum(&aux[..len], bits) == 0 {
                msg[..len].copy_from_slice(&aux[..len]);
                return Some((j, i));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_DF17: [u8; 14] = [
        0x8D, 0x48, 0x40, 0xD6, 0x20, 0x2C, 0xC3, 0x71, 0xC3, 0x2C, 0xE0, 0x57, 0x60, 0x98,
    ];

    #[test]
    fn valid_message_has_zero_residue() {
        assert_eq!(checksum(&VALID_DF17, 112), 0);
    }

    #[test]
    fn implementations_agree() {
        let mut corrupted = VALID_DF17;
        corrupted[5] ^= 0x04;
        for msg in [&VALID_DF17, &corrupted] {
            assert_eq!(checksum(msg, 112), checksum_schoolbook(msg, 112));
        }
        // short frame taken from a long one just to exercise the offset path
        let short = &VALID_DF17[..7];
        assert_eq!(checksum(short, 56), checksum_schoolbook(short, 56));
    }

    #[test]
    fn table_tail_is_zero() {
        assert!(MODES_CHECKSUM_TABLE[88..].iter().all(|&v| v == 0));
    }

    #[test]
    fn single_bit_error_is_recovered() {
        let mut msg = VALID_DF17;
        msg[6] ^= 0x10;
        assert_ne!(checksum(&msg, 112), 0);

        let fixed = fix_single_bit(&mut msg, 112);
        assert_eq!(fixed, Some(6 * 8 + 3));
        assert_eq!(msg, VALID_DF17);
        assert_eq!(checksum(&msg, 112), 0);
    }

    #[test]
    fn unfixable_garbage_is_reported() {
        let mut msg = VALID_DF17;
        // three flipped bits are beyond single-bit recovery
        msg[6] ^= 0x10;
        msg[9] ^= 0x01;
        msg[12] ^= 0x80;
        assert_eq!(fix_single_bit(&mut msg, 112), None);
    }

    #[test]
    fn two_bit_errors_recovered_offline() {
        let mut msg = VALID_DF17;
        msg[6] ^= 0x10;
        msg[9] ^= 0x01;
        let fixed = fix_two_bits(&mut msg, 112);
        assert_eq!(fixed, Some((6 * 8 + 3, 9 * 8 + 7)));
        assert_eq!(msg, VALID_DF17);
    }
}
