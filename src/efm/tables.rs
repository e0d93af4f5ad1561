//! EFM symbol tables per ECMA-130 annex D.

use lazy_static::lazy_static;

pub const EFM_SYMBOL_BITS: usize = 14;
pub const MERGING_FIELD_BITS: usize = 3;
pub const SYNC_HEADER_BITS: usize = 24;

/// 24-bit channel frame sync header. Two maximal-length runs back to back,
/// a pattern no symbol/merging combination is allowed to reproduce.
pub const SYNC_HEADER: u32 = 0b1000_0000_0001_0000_0000_0010;

/// Symbol index of the SYNC0 section marker.
pub const SYNC0_SYMBOL: u16 = 256;
/// Symbol index of the SYNC1 section marker.
pub const SYNC1_SYMBOL: u16 = 257;

/// Returned by the reverse table for 14-bit words outside the code.
pub const INVALID_SYMBOL: u16 = u16::MAX;

/// 8-to-14 lookup. Indices 0..=255 encode data bytes, 256 and 257 the
/// SYNC0/SYNC1 markers. Every entry keeps at least two and at most ten
/// zeros between ones internally.
pub const EFM_LUT: [u16; 258] = [
    0b01001000100000, 0b10000100000000, 0b10010000100000, 0b10001000100000,
    0b01000100000000, 0b00000100010000, 0b00010000100000, 0b00100100000000,
    0b01001001000000, 0b10000001000000, 0b10010001000000, 0b10001001000000,
    0b01000001000000, 0b00000001000000, 0b00010001000000, 0b00100001000000,
    0b10000000100000, 0b10000010000000, 0b10010010000000, 0b00100000100000,
    0b01000010000000, 0b00000010000000, 0b00010010000000, 0b00100010000000,
    0b01001000010000, 0b10000000010000, 0b10010000010000, 0b10001000010000,
    0b01000000010000, 0b00001000010000, 0b00010000010000, 0b00100000010000,
    0b00000000100000, 0b10000100001000, 0b00001000100000, 0b00100100100000,
    0b01000100001000, 0b00000100001000, 0b01000000100000, 0b00100100001000,
    0b01001001001000, 0b10000001001000, 0b10010001001000, 0b10001001001000,
    0b01000001001000, 0b00000001001000, 0b00010001001000, 0b00100001001000,
    0b00000100000000, 0b10000010001000, 0b10010010001000, 0b10000100010000,
    0b01000010001000, 0b00000010001000, 0b00010010001000, 0b00100010001000,
    0b01001000001000, 0b10000000001000, 0b10010000001000, 0b10001000001000,
    0b01000000001000, 0b00001000001000, 0b00010000001000, 0b00100000001000,
    0b01001000100100, 0b10000100100100, 0b10010000100100, 0b10001000100100,
    0b01000100100100, 0b00000000100100, 0b00010000100100, 0b00100100100100,
    0b01001001000100, 0b10000001000100, 0b10010001000100, 0b10001001000100,
    0b01000001000100, 0b00000001000100, 0b00010001000100, 0b00100001000100,
    0b10000000100100, 0b10000010000100, 0b10010010000100, 0b00100000100100,
    0b01000010000100, 0b00000010000100, 0b00010010000100, 0b00100010000100,
    0b01001000000100, 0b10000000000100, 0b10010000000100, 0b10001000000100,
    0b01000000000100, 0b00001000000100, 0b00010000000100, 0b00100000000100,
    0b01001000100010, 0b10000100100010, 0b10010000100010, 0b10001000100010,
    0b01000100100010, 0b00000000100010, 0b01000000100100, 0b00100100100010,
    0b01001001000010, 0b10000001000010, 0b10010001000010, 0b10001001000010,
    0b01000001000010, 0b00000001000010, 0b00010001000010, 0b00100001000010,
    0b10000000100010, 0b10000010000010, 0b10010010000010, 0b00100000100010,
    0b01000010000010, 0b00000010000010, 0b00010010000010, 0b00100010000010,
    0b01001000000010, 0b00001001001000, 0b10010000000010, 0b10001000000010,
    0b01000000000010, 0b00001000000010, 0b00010000000010, 0b00100000000010,
    0b01001000100001, 0b10000100100001, 0b10010000100001, 0b10001000100001,
    0b01000100100001, 0b00000000100001, 0b00010000100001, 0b00100100100001,
    0b01001001000001, 0b10000001000001, 0b10010001000001, 0b10001001000001,
    0b01000001000001, 0b00000001000001, 0b00010001000001, 0b00100001000001,
    0b10000000100001, 0b10000010000001, 0b10010010000001, 0b00100000100001,
    0b01000010000001, 0b00000010000001, 0b00010010000001, 0b00100010000001,
    0b01001000000001, 0b10000010010000, 0b10010000000001, 0b10001000000001,
    0b01000010010000, 0b00001000000001, 0b00010000000001, 0b00100010010000,
    0b00001000100001, 0b10000100001001, 0b01000100010000, 0b00000100100001,
    0b01000100001001, 0b00000100001001, 0b01000000100001, 0b00100100001001,
    0b01001001001001, 0b10000001001001, 0b10010001001001, 0b10001001001001,
    0b01000001001001, 0b00000001001001, 0b00010001001001, 0b00100001001001,
    0b00000100100000, 0b10000010001001, 0b10010010001001, 0b00100100010000,
    0b01000010001001, 0b00000010001001, 0b00010010001001, 0b00100010001001,
    0b01001000001001, 0b10000000001001, 0b10010000001001, 0b10001000001001,
    0b01000000001001, 0b00001000001001, 0b00010000001001, 0b00100000001001,
    0b01000100100000, 0b10000100010001, 0b10010010010000, 0b00001000100100,
    0b01000100010001, 0b00000100010001, 0b00010010010000, 0b00100100010001,
    0b00001001000001, 0b10000100000001, 0b00001001000100, 0b00001001000000,
    0b01000100000001, 0b00000100000001, 0b00000010010000, 0b00100100000001,
    0b00000100100100, 0b10000010010001, 0b10010010010001, 0b10000100100000,
    0b01000010010001, 0b00000010010001, 0b00010010010001, 0b00100010010001,
    0b01001000010001, 0b10000000010001, 0b10010000010001, 0b10001000010001,
    0b01000000010001, 0b00001000010001, 0b00010000010001, 0b00100000010001,
    0b01000100000010, 0b00000100000010, 0b10000100010010, 0b00100100000010,
    0b01000100010010, 0b00000100010010, 0b01000000100010, 0b00100100010010,
    0b10000100000010, 0b10000100000100, 0b00001001001001, 0b00001001000010,
    0b01000100000100, 0b00000100000100, 0b00010000100010, 0b00100100000100,
    0b00000100100010, 0b10000010010010, 0b10010010010010, 0b00001000100010,
    0b01000010010010, 0b00000010010010, 0b00010010010010, 0b00100010010010,
    0b01001000010010, 0b10000000010010, 0b10010000010010, 0b10001000010010,
    0b01000000010010, 0b00001000010010, 0b00010000010010, 0b00100000010010,
    0b00100000000001, 0b00000000010010,
];

lazy_static! {
    /// Inverse of `EFM_LUT` over all 2^14 words.
    pub static ref EFM_REVERSE_LUT: Vec<u16> = {
        let mut table = vec![INVALID_SYMBOL; 1 << EFM_SYMBOL_BITS];
        for (index, &word) in EFM_LUT.iter().enumerate() {
            table[word as usize] = index as u16;
        }
        table
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_symbols_match_the_published_table() {
        assert_eq!(EFM_LUT[0], 0b01001000100000);
        assert_eq!(EFM_LUT[255], 0b00100000010010);
        assert_eq!(EFM_LUT[SYNC0_SYMBOL as usize], 0b00100000000001);
        assert_eq!(EFM_LUT[SYNC1_SYMBOL as usize], 0b00000000010010);
    }

    #[test]
    fn every_symbol_is_14_bits_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for &word in EFM_LUT.iter() {
            assert!(word < 1 << EFM_SYMBOL_BITS);
            assert!(seen.insert(word), "duplicate symbol {word:#016b}");
        }
    }

    #[test]
    fn every_symbol_obeys_the_internal_run_constraint() {
        for &word in EFM_LUT.iter() {
            let bits = word as u32;
            assert_eq!(bits & bits >> 1, 0, "adjacent ones in {bits:#016b}");
            assert_eq!(bits & bits >> 2, 0, "single-zero gap in {bits:#016b}");
            assert_ne!(bits, 0);
        }
    }

    #[test]
    fn reverse_table_inverts_the_forward_table() {
        for (index, &word) in EFM_LUT.iter().enumerate() {
            assert_eq!(EFM_REVERSE_LUT[word as usize], index as u16);
        }
    }

    #[test]
    fn reverse_table_flags_invalid_words() {
        // 0x3FFF has adjacent ones everywhere and is not in the code
        assert_eq!(EFM_REVERSE_LUT[0x3FFF], INVALID_SYMBOL);
        let coded = EFM_LUT.iter().map(|&w| w as usize).collect::<std::collections::HashSet<_>>();
        let invalid = (0..1usize << EFM_SYMBOL_BITS)
            .filter(|word| !coded.contains(word))
            .take(64);
        for word in invalid {
            assert_eq!(EFM_REVERSE_LUT[word], INVALID_SYMBOL);
        }
    }

    #[test]
    fn sync_header_is_two_maximal_runs() {
        assert_eq!(SYNC_HEADER, 0x80_1002);
        assert!(SYNC_HEADER < 1 << SYNC_HEADER_BITS);
        // T11 + T11 + the leading "10" of the merging area
        assert_eq!(SYNC_HEADER >> 12, 1 << 11 | 1);
        assert_eq!(SYNC_HEADER & 0xFFF, 0b10);
    }
}
