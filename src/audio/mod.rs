pub mod error;
pub mod wav;

use std::io::Cursor;
use std::path::Path;

use binrw::BinRead;
use byteorder::{ByteOrder, LittleEndian};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::audio::error::{AudioError, AudioResult};
use crate::audio::wav::{WavHeader, BYTES_PER_STEREO_SAMPLE, WAV_HEADER_SIZE};
use crate::efm::frames::DATA24_FRAME_SIZE;

const SAMPLES_PER_FRAME: usize = DATA24_FRAME_SIZE / BYTES_PER_STEREO_SAMPLE;
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Supplies the encoder with 24-byte frames from one of the supported
/// input shapes.
#[derive(Debug)]
pub enum AudioSource {
    /// Opaque bytes consumed 24 at a time.
    Raw { reader: BufReader<File> },
    /// PCM sample data behind a validated WAV header.
    Wav { reader: BufReader<File> },
    /// Synthesised `(n, -n)` stereo counter pattern.
    Test {
        next_sample: u32,
        total_samples: u32,
    },
}

impl AudioSource {
    pub async fn open_raw(path: impl AsRef<Path>) -> AudioResult<Self> {
        let file = File::open(path).await?;
        Ok(Self::Raw {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
        })
    }

    /// Opens a WAV file, consuming and validating its 44-byte header.
    pub async fn open_wav(path: impl AsRef<Path>) -> AudioResult<Self> {
        let file = File::open(path).await?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        let mut header_bytes = [0u8; WAV_HEADER_SIZE];
        reader.read_exact(&mut header_bytes).await?;
        let header = WavHeader::read(&mut Cursor::new(&header_bytes))?;
        if !header.is_supported() {
            return Err(AudioError::UnsupportedWavFormat);
        }
        Ok(Self::Wav { reader })
    }

    pub fn test_pattern(samples: u32) -> Self {
        Self::Test {
            next_sample: 0,
            total_samples: samples,
        }
    }

    /// Reads the next 24-byte frame. Returns `None` on clean end of input;
    /// a trailing partial frame also ends the stream.
    pub async fn read_frame(&mut self) -> AudioResult<Option<[u8; DATA24_FRAME_SIZE]>> {
        match self {
            Self::Raw { reader } | Self::Wav { reader } => read_frame_or_eof(reader).await,
            Self::Test {
                next_sample,
                total_samples,
            } => {
                if *next_sample + SAMPLES_PER_FRAME as u32 > *total_samples {
                    return Ok(None);
                }
                let mut frame = [0u8; DATA24_FRAME_SIZE];
                for slot in 0..SAMPLES_PER_FRAME {
                    let sample = *next_sample as i16;
                    let offset = slot * BYTES_PER_STEREO_SAMPLE;
                    LittleEndian::write_i16(&mut frame[offset..offset + 2], sample);
                    LittleEndian::write_i16(
                        &mut frame[offset + 2..offset + 4],
                        sample.wrapping_neg(),
                    );
                    *next_sample += 1;
                }
                Ok(Some(frame))
            }
        }
    }
}

async fn read_frame_or_eof(
    reader: &mut BufReader<File>,
) -> AudioResult<Option<[u8; DATA24_FRAME_SIZE]>> {
    let mut frame = [0u8; DATA24_FRAME_SIZE];
    let mut filled = 0;
    while filled < frame.len() {
        let read = reader.read(&mut frame[filled..]).await?;
        if read == 0 {
            return Ok(None);
        }
        filled += read;
    }
    Ok(Some(frame))
}
