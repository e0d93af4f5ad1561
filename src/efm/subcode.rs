//! P/Q subcode generation (ECMA-130 clause 22).
//!
//! Each 98-frame section carries 96 subcode bytes. Bit 7 of every byte is
//! the P channel, bit 6 the Q channel; the reserved R-W channels stay zero.
//! The Q channel spells out a 12-byte frame of position data protected by a
//! complemented CRC-16.

use crc::{Crc, CRC_16_XMODEM};
use thiserror::Error;

use crate::efm::frames::SECTION_FRAMES;

const Q_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Sections per minute of playback: 75 per second.
const SECTIONS_PER_SECOND: u32 = 75;
const SECTIONS_PER_MINUTE: u32 = 60 * SECTIONS_PER_SECOND;

#[derive(Debug, Error)]
pub enum SubcodeError {
    #[error("track number {0} is outside the range 1-99")]
    TrackOutOfRange(u8),

    #[error("Q mode {0} is not supported (only modes 1 and 4 are)")]
    UnsupportedQMode(u8),

    #[error("value {0} cannot be packed as two BCD digits")]
    BcdOutOfRange(u32),
}

pub type SubcodeResult<T> = Result<T, SubcodeError>;

/// Supported Q channel modes. Modes 0, 2 and 3 are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QMode {
    /// Mode 1: Compact Disc audio.
    Audio,
    /// Mode 4: LaserDisc.
    LaserDisc,
}

impl QMode {
    /// The ADR nibble written alongside the (zero) CONTROL nibble.
    fn adr(self) -> u8 {
        match self {
            QMode::Audio => 0x01,
            QMode::LaserDisc => 0x04,
        }
    }
}

impl TryFrom<u8> for QMode {
    type Error = SubcodeError;

    fn try_from(value: u8) -> SubcodeResult<Self> {
        match value {
            1 => Ok(QMode::Audio),
            4 => Ok(QMode::LaserDisc),
            other => Err(SubcodeError::UnsupportedQMode(other)),
        }
    }
}

/// Produces the subcode byte for each symbol of the current section.
#[derive(Debug)]
pub struct SubcodeGenerator {
    q_mode: QMode,
    track_number: u8,
    frame_number: u32,
    q_channel: [u8; 12],
}

impl SubcodeGenerator {
    pub fn new(track_number: u8, q_mode: QMode) -> SubcodeResult<Self> {
        if !(1..=99).contains(&track_number) {
            return Err(SubcodeError::TrackOutOfRange(track_number));
        }
        let mut generator = Self {
            q_mode,
            track_number,
            frame_number: 0,
            q_channel: [0; 12],
        };
        generator.generate_q_channel()?;
        Ok(generator)
    }

    /// Advances the running frame counter and rebuilds the Q channel for
    /// the next 98-frame section.
    pub fn next_section(&mut self) -> SubcodeResult<()> {
        self.frame_number += 1;
        self.generate_q_channel()
    }

    /// Subcode byte for section symbol `symbol_number` (2..=97).
    pub fn subcode_byte(&self, symbol_number: usize) -> u8 {
        debug_assert!((2..SECTION_FRAMES).contains(&symbol_number));
        let bit = symbol_number - 2;
        // The P channel is flagged for the whole track.
        let mut byte = 0x80;
        if self.q_bit(bit) {
            byte |= 0x40;
        }
        byte
    }

    fn q_bit(&self, bit: usize) -> bool {
        self.q_channel[bit / 8] & (0x80 >> (bit % 8)) != 0
    }

    /// Q channel layout: CONTROL+ADR, TNO, X, MIN/SEC/FRAME, ZERO,
    /// AMIN/ASEC/AFRAME, CRC-16. All positions in 2-digit BCD.
    fn generate_q_channel(&mut self) -> SubcodeResult<()> {
        let n = self.frame_number;
        let mut q = [0u8; 12];
        q[0] = self.q_mode.adr();
        q[1] = int_to_bcd2(u32::from(self.track_number))?;
        q[2] = 0x01; // X: encoder running
        q[3] = int_to_bcd2(n / SECTIONS_PER_MINUTE)?;
        q[4] = int_to_bcd2(n % SECTIONS_PER_MINUTE / SECTIONS_PER_SECOND)?;
        q[5] = int_to_bcd2(n % SECTIONS_PER_MINUTE % SECTIONS_PER_SECOND)?;
        // q[6] is the ZERO field; the absolute time repeats the section time
        // as there is no outer disc reference here.
        q[7] = q[3];
        q[8] = q[4];
        q[9] = q[5];

        let crc = !Q_CRC.checksum(&q[..10]);
        q[10] = (crc >> 8) as u8;
        q[11] = crc as u8;

        self.q_channel = q;
        Ok(())
    }

    #[cfg(test)]
    fn q_channel(&self) -> &[u8; 12] {
        &self.q_channel
    }
}

/// Checks a reassembled 12-byte Q channel: the complemented CRC-16 of the
/// first ten bytes must match the stored big-endian trailer.
pub fn q_channel_is_valid(q: &[u8; 12]) -> bool {
    let crc = !Q_CRC.checksum(&q[..10]);
    q[10] == (crc >> 8) as u8 && q[11] == crc as u8
}

/// Packs a value 0..=99 as two BCD digits.
pub fn int_to_bcd2(value: u32) -> SubcodeResult<u8> {
    if value > 99 {
        return Err(SubcodeError::BcdOutOfRange(value));
    }
    Ok((value / 10 << 4 | value % 10) as u8)
}

pub fn bcd2_to_int(bcd: u8) -> u32 {
    u32::from(bcd >> 4) * 10 + u32::from(bcd & 0x0F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_round_trips_across_its_range() {
        for value in 0..=99 {
            let packed = int_to_bcd2(value).unwrap();
            assert_eq!(bcd2_to_int(packed), value);
        }
        assert_eq!(int_to_bcd2(59).unwrap(), 0x59);
        assert!(int_to_bcd2(100).is_err());
    }

    #[test]
    fn q_mode_conversions() {
        assert_eq!(QMode::try_from(1).unwrap(), QMode::Audio);
        assert_eq!(QMode::try_from(4).unwrap(), QMode::LaserDisc);
        for rejected in [0u8, 2, 3, 5] {
            assert!(QMode::try_from(rejected).is_err());
        }
    }

    #[test]
    fn track_number_is_validated() {
        assert!(SubcodeGenerator::new(0, QMode::Audio).is_err());
        assert!(SubcodeGenerator::new(100, QMode::Audio).is_err());
        assert!(SubcodeGenerator::new(1, QMode::Audio).is_ok());
        assert!(SubcodeGenerator::new(99, QMode::LaserDisc).is_ok());
    }

    #[test]
    fn q_channel_layout_for_the_first_section() {
        let generator = SubcodeGenerator::new(1, QMode::Audio).unwrap();
        let q = generator.q_channel();
        assert_eq!(q[0], 0x01); // CONTROL 0, ADR 1
        assert_eq!(q[1], 0x01); // TNO 01
        assert_eq!(q[2], 0x01); // X running
        assert_eq!(&q[3..7], &[0, 0, 0, 0]);
        assert_eq!(&q[7..10], &q[3..6]);
    }

    #[test]
    fn laserdisc_mode_writes_adr_4() {
        let generator = SubcodeGenerator::new(1, QMode::LaserDisc).unwrap();
        assert_eq!(generator.q_channel()[0], 0x04);
    }

    #[test]
    fn section_counter_advances_min_sec_frame() {
        let mut generator = SubcodeGenerator::new(5, QMode::Audio).unwrap();
        for _ in 0..SECTIONS_PER_MINUTE + SECTIONS_PER_SECOND + 2 {
            generator.next_section().unwrap();
        }
        let q = generator.q_channel();
        assert_eq!(bcd2_to_int(q[3]), 1); // MIN
        assert_eq!(bcd2_to_int(q[4]), 1); // SEC
        assert_eq!(bcd2_to_int(q[5]), 2); // FRAME
        assert_eq!(bcd2_to_int(q[1]), 5); // TNO
    }

    #[test]
    fn crc_is_the_complemented_xmodem_over_the_first_ten_bytes() {
        let generator = SubcodeGenerator::new(1, QMode::Audio).unwrap();
        let q = generator.q_channel();
        let recomputed = !Q_CRC.checksum(&q[..10]);
        assert_eq!(q[10], (recomputed >> 8) as u8);
        assert_eq!(q[11], recomputed as u8);
    }

    #[test]
    fn q_channel_validation_round_trips() {
        let generator = SubcodeGenerator::new(7, QMode::Audio).unwrap();
        let mut q = *generator.q_channel();
        assert!(q_channel_is_valid(&q));
        q[3] ^= 0x10;
        assert!(!q_channel_is_valid(&q));
    }

    #[test]
    fn crc_matches_the_pinned_vector() {
        // CONTROL 4 / ADR 1, TNO 01, X 01, remaining time fields zero.
        let bytes = [0x41, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let crc = !Q_CRC.checksum(&bytes);
        assert_eq!(crc.to_be_bytes(), [0x4E, 0x50]);
    }

    #[test]
    fn p_bit_is_always_set() {
        let generator = SubcodeGenerator::new(1, QMode::Audio).unwrap();
        for symbol in 2..SECTION_FRAMES {
            assert_eq!(generator.subcode_byte(symbol) & 0x80, 0x80);
            assert_eq!(generator.subcode_byte(symbol) & 0x3F, 0);
        }
    }

    #[test]
    fn q_bits_walk_the_channel_msb_first() {
        let generator = SubcodeGenerator::new(1, QMode::Audio).unwrap();
        // byte 0 is 0x01: only its least significant bit is set, which is
        // channel bit 7 and therefore section symbol 9.
        for symbol in 2..10 {
            let expected = symbol == 9;
            assert_eq!(generator.subcode_byte(symbol) & 0x40 != 0, expected);
        }
    }
}
