use binrw::prelude::*;

pub const WAV_HEADER_SIZE: usize = 44;
pub const SAMPLE_RATE: u32 = 44_100;
pub const CHANNELS: u16 = 2;
pub const BITS_PER_SAMPLE: u16 = 16;
pub const BYTES_PER_STEREO_SAMPLE: usize = 4;

/// Canonical 44-byte PCM WAV header. The encoder only accepts the exact
/// 16-bit stereo 44.1 kHz layout a disc image carries.
#[derive(Debug, BinRead)]
#[br(little, magic = b"RIFF")]
pub struct WavHeader {
    pub riff_size: u32,

    #[br(magic = b"WAVEfmt ")]
    pub fmt_size: u32,

    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,

    #[br(magic = b"data")]
    pub data_size: u32,
}

impl WavHeader {
    pub fn is_supported(&self) -> bool {
        self.fmt_size == 16
            && self.audio_format == 1
            && self.channels == CHANNELS
            && self.sample_rate == SAMPLE_RATE
            && self.bits_per_sample == BITS_PER_SAMPLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn canonical_header(data_size: u32) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(WAV_HEADER_SIZE);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&44_100u32.to_le_bytes());
        bytes.extend_from_slice(&176_400u32.to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_size.to_le_bytes());
        bytes
    }

    #[test]
    fn canonical_header_parses_and_is_supported() {
        let bytes = canonical_header(4800);
        assert_eq!(bytes.len(), WAV_HEADER_SIZE);
        let header = WavHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert!(header.is_supported());
        assert_eq!(header.data_size, 4800);
        assert_eq!(header.byte_rate, 176_400);
    }

    #[test]
    fn wrong_magic_fails_to_parse() {
        let mut bytes = canonical_header(0);
        bytes[0] = b'X';
        assert!(WavHeader::read(&mut Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn mono_or_low_rate_headers_are_rejected() {
        let mut mono = canonical_header(0);
        mono[22] = 1; // channel count
        let header = WavHeader::read(&mut Cursor::new(&mono)).unwrap();
        assert!(!header.is_supported());

        let mut slow = canonical_header(0);
        slow[24..28].copy_from_slice(&22_050u32.to_le_bytes());
        let header = WavHeader::read(&mut Cursor::new(&slow)).unwrap();
        assert!(!header.is_supported());
    }
}
