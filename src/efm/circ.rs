//! CIRC building blocks: the byte interleave, the parity inverter and the
//! C1/C2 Reed-Solomon codes.
//!
//! Both codes live in GF(256) with the polynomial x^8+x^4+x^3+x^2+1 (0x11D).
//! C2 is the shortened (28,24) code whose four Q-parity bytes the encoder
//! appends before the M delay lines; C1 is the shortened (32,28) code whose
//! four P-parity bytes complete the F2 frame.

use gf256::{gf, rs::rs};

use crate::efm::frames::F2_FRAME_SIZE;

#[gf(polynomial = 0x11d, generator = 0x2)]
type gf256cd;

#[rs(gf = gf256cd, u = u8, block = 32, data = 28)]
mod c1_code {}

#[rs(gf = gf256cd, u = u8, block = 28, data = 24)]
mod c2_code {}

pub const C1_CODEWORD_SIZE: usize = 32;
pub const C1_DATA_SIZE: usize = 28;
pub const C2_CODEWORD_SIZE: usize = 28;
pub const C2_DATA_SIZE: usize = 24;

/// Byte order applied between delay line 2 and the C2 encoder: the
/// twelve byte pairs rotate so pairs 0/3/6/9 land first, 1/4/7/10 second,
/// 2/5/8/11 last (ECMA-130 clause 18 figure layout).
const INTERLEAVE_OFFSET: [usize; 24] = [
    0, 1, 6, 7, 12, 13, 18, 19, 2, 3, 8, 9, 14, 15, 20, 21, 4, 5, 10, 11, 16, 17, 22, 23,
];

pub fn interleave(input: [u8; C2_DATA_SIZE]) -> [u8; C2_DATA_SIZE] {
    std::array::from_fn(|i| input[INTERLEAVE_OFFSET[i]])
}

pub fn deinterleave(input: [u8; C2_DATA_SIZE]) -> [u8; C2_DATA_SIZE] {
    let mut output = [0u8; C2_DATA_SIZE];
    for (i, &source) in INTERLEAVE_OFFSET.iter().enumerate() {
        output[source] = input[i];
    }
    output
}

/// Inverts the two parity regions of an F2 frame so that an all-zero frame
/// is never a valid codeword and silence cannot mimic sync. Self-inverse.
pub fn invert_parity(mut frame: [u8; F2_FRAME_SIZE]) -> [u8; F2_FRAME_SIZE] {
    let (head, tail) = frame.split_at_mut(28);
    for byte in head[12..16].iter_mut().chain(tail[..4].iter_mut()) {
        *byte = !*byte;
    }
    frame
}

pub fn c2_encode(data: [u8; C2_DATA_SIZE]) -> [u8; C2_CODEWORD_SIZE] {
    let mut codeword = [0u8; C2_CODEWORD_SIZE];
    codeword[..C2_DATA_SIZE].copy_from_slice(&data);
    c2_code::encode(&mut codeword);
    codeword
}

pub fn c1_encode(data: [u8; C1_DATA_SIZE]) -> [u8; C1_CODEWORD_SIZE] {
    let mut codeword = [0u8; C1_CODEWORD_SIZE];
    codeword[..C1_DATA_SIZE].copy_from_slice(&data);
    c1_code::encode(&mut codeword);
    codeword
}

/// Outcome of one codeword decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircStatus {
    /// Syndromes were clean.
    Valid,
    /// At least one symbol was corrected and the codeword is now consistent.
    Fixed,
    /// More errors than the four parity symbols can resolve; the payload
    /// passes through unmodified.
    Error,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CircCounters {
    pub valid: u64,
    pub fixed: u64,
    pub error: u64,
}

impl CircCounters {
    fn record(&mut self, status: CircStatus) {
        match status {
            CircStatus::Valid => self.valid += 1,
            CircStatus::Fixed => self.fixed += 1,
            CircStatus::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.valid + self.fixed + self.error
    }
}

/// C1/C2 decoder with monotone per-code statistics.
#[derive(Debug, Default)]
pub struct CircDecoder {
    c1: CircCounters,
    c2: CircCounters,
}

impl CircDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn c1_decode(&mut self, codeword: [u8; C1_CODEWORD_SIZE]) -> ([u8; C1_DATA_SIZE], CircStatus) {
        let (corrected, status) = decode(codeword, c1_code::is_correct, c1_code::correct_errors);
        self.c1.record(status);
        let mut data = [0u8; C1_DATA_SIZE];
        data.copy_from_slice(&corrected[..C1_DATA_SIZE]);
        (data, status)
    }

    pub fn c2_decode(&mut self, codeword: [u8; C2_CODEWORD_SIZE]) -> ([u8; C2_DATA_SIZE], CircStatus) {
        let (corrected, status) = decode(codeword, c2_code::is_correct, c2_code::correct_errors);
        self.c2.record(status);
        let mut data = [0u8; C2_DATA_SIZE];
        data.copy_from_slice(&corrected[..C2_DATA_SIZE]);
        (data, status)
    }

    pub fn c1_counters(&self) -> CircCounters {
        self.c1
    }

    pub fn c2_counters(&self) -> CircCounters {
        self.c2
    }
}

fn decode<const N: usize, T, E>(
    codeword: [u8; N],
    is_correct: impl Fn(&[u8]) -> bool,
    correct_errors: impl Fn(&mut [u8]) -> Result<T, E>,
) -> ([u8; N], CircStatus) {
    if is_correct(&codeword) {
        return (codeword, CircStatus::Valid);
    }
    let mut corrected = codeword;
    match correct_errors(&mut corrected) {
        Ok(_) => (corrected, CircStatus::Fixed),
        Err(_) => (codeword, CircStatus::Error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample24() -> [u8; 24] {
        std::array::from_fn(|i| (i as u8).wrapping_mul(7).wrapping_add(3))
    }

    #[test]
    fn interleave_and_deinterleave_are_inverse() {
        let data: [u8; 24] = std::array::from_fn(|i| i as u8);
        assert_eq!(deinterleave(interleave(data)), data);
        assert_eq!(interleave(deinterleave(data)), data);
    }

    #[test]
    fn interleave_rotates_byte_pairs() {
        let data: [u8; 24] = std::array::from_fn(|i| i as u8);
        let out = interleave(data);
        assert_eq!(&out[0..8], &[0, 1, 6, 7, 12, 13, 18, 19]);
        assert_eq!(&out[8..16], &[2, 3, 8, 9, 14, 15, 20, 21]);
        assert_eq!(&out[16..24], &[4, 5, 10, 11, 16, 17, 22, 23]);
    }

    #[test]
    fn parity_inversion_is_self_inverse() {
        let frame: [u8; 32] = std::array::from_fn(|i| i as u8);
        assert_eq!(invert_parity(invert_parity(frame)), frame);
        let flipped = invert_parity(frame);
        assert_eq!(flipped[11], 11);
        assert_eq!(flipped[12], !12u8);
        assert_eq!(flipped[15], !15u8);
        assert_eq!(flipped[16], 16);
        assert_eq!(flipped[27], 27);
        assert_eq!(flipped[28], !28u8);
        assert_eq!(flipped[31], !31u8);
    }

    #[test]
    fn silence_is_not_a_codeword_after_inversion() {
        let silent = invert_parity(c1_encode([0u8; 28]));
        let mut decoder = CircDecoder::new();
        let (_, status) = decoder.c1_decode(silent);
        assert_ne!(status, CircStatus::Valid);
        // without the inversion the zero frame is trivially consistent
        let (_, status) = decoder.c1_decode([0u8; 32]);
        assert_eq!(status, CircStatus::Valid);
    }

    #[test]
    fn c2_round_trip_is_clean() {
        let codeword = c2_encode(sample24());
        let mut decoder = CircDecoder::new();
        let (data, status) = decoder.c2_decode(codeword);
        assert_eq!(status, CircStatus::Valid);
        assert_eq!(data, sample24());
        assert_eq!(decoder.c2_counters().valid, 1);
    }

    #[test]
    fn c1_corrects_a_single_byte_error() {
        let codeword = c1_encode(std::array::from_fn(|i| i as u8));
        let mut corrupted = codeword;
        corrupted[5] ^= 0x55;

        let mut decoder = CircDecoder::new();
        let (data, status) = decoder.c1_decode(corrupted);
        assert_eq!(status, CircStatus::Fixed);
        assert_eq!(data[5], 5);
        assert_eq!(decoder.c1_counters().fixed, 1);
        assert_eq!(decoder.c1_counters().error, 0);
    }

    #[test]
    fn c1_corrects_two_errors() {
        let codeword = c1_encode(std::array::from_fn(|i| (i as u8) ^ 0xA5));
        let mut corrupted = codeword;
        corrupted[0] ^= 0xFF;
        corrupted[30] ^= 0x10;

        let mut decoder = CircDecoder::new();
        let (data, status) = decoder.c1_decode(corrupted);
        assert_eq!(status, CircStatus::Fixed);
        assert_eq!(data[0], 0xA5);
    }

    #[test]
    fn heavy_corruption_is_never_reported_valid() {
        let codeword = c2_encode(sample24());
        let mut corrupted = codeword;
        for byte in corrupted.iter_mut().take(5) {
            *byte ^= 0x77;
        }
        let mut decoder = CircDecoder::new();
        let (_, status) = decoder.c2_decode(corrupted);
        assert_ne!(status, CircStatus::Valid);
        assert_eq!(decoder.c2_counters().total(), 1);
    }
}
