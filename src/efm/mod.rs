//! The EFM codec pipelines and their file drivers.

pub mod bits;
pub mod circ;
pub mod decode;
pub mod delay;
pub mod encode;
pub mod error;
pub mod frames;
pub mod subcode;
pub mod tables;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

use crate::audio::AudioSource;
use crate::commands::{DecodeCommand, EncodeCommand, InputFormat};
use crate::efm::decode::{
    ChannelToF3, F1ToData24, F2ToF1, F3ToF2, TvaluesToChannel,
};
use crate::efm::encode::EfmEncoder;
use crate::efm::error::EfmResult;
use crate::efm::frames::{hex_line, DATA24_FRAME_SIZE};
use crate::efm::subcode::QMode;

const DECODE_CHUNK_SIZE: usize = 1024;
const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})";

fn byte_progress(total: u64) -> EfmResult<ProgressBar> {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)?
            .progress_chars("#>-"),
    );
    Ok(bar)
}

/// Encodes the configured input into a T-value stream on disk.
pub async fn encode_file(cmd: &EncodeCommand) -> EfmResult<()> {
    let (input, output) = cmd.resolve_paths()?;
    let q_mode = QMode::try_from(cmd.q_mode)?;

    let (mut source, total_bytes) = if let Some(samples) = cmd.audio_testdata {
        debug!("Synthesising {} stereo test samples", samples);
        (AudioSource::test_pattern(samples), u64::from(samples) * 4)
    } else {
        let path = input.ok_or(crate::commands::CommandError::FilePositionals)?;
        debug!("Opening input file: {:?}", path);
        let total = fs::metadata(path).await?.len();
        let source = match cmd.format {
            InputFormat::Raw => AudioSource::open_raw(path).await?,
            InputFormat::Wav => AudioSource::open_wav(path).await?,
        };
        (source, total)
    };

    debug!("Creating output file: {:?}", output);
    let mut writer = BufWriter::new(fs::File::create(output).await?);
    let progress = byte_progress(total_bytes)?;

    let mut encoder = EfmEncoder::new(cmd.track, q_mode)?;
    let mut t_values = Vec::new();
    let mut audio_bytes = 0u64;

    while let Some(frame) = source.read_frame().await? {
        audio_bytes += DATA24_FRAME_SIZE as u64;
        encoder.push(frame, &mut t_values)?;
        if !t_values.is_empty() {
            writer.write_all(&t_values).await?;
            t_values.clear();
        }
        progress.inc(DATA24_FRAME_SIZE as u64);
    }

    debug!("Input drained, flushing the delay lines");
    encoder.finish(&mut t_values)?;
    writer.write_all(&t_values).await?;
    writer.flush().await?;
    progress.finish_and_clear();

    info!(
        "Processed {} bytes audio, {} F1 frames, {} F2 frames, {} F3 frames, {} channel bytes",
        audio_bytes,
        encoder.f1_frames(),
        encoder.f2_frames(),
        encoder.f3_frames(),
        encoder.channel_bytes()
    );
    info!(
        "Completed {} sections, final DSV {}",
        encoder.sections(),
        encoder.dsv()
    );
    info!("Encoding complete");
    Ok(())
}

/// Per-stage logging switches for the decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayOptions {
    pub show_output: bool,
    pub show_f1: bool,
    pub show_f2: bool,
    pub show_f3: bool,
}

/// The full decoder cascade, from T-values to 24-byte frames.
pub struct EfmDecoder {
    t_values_to_channel: TvaluesToChannel,
    channel_to_f3: ChannelToF3,
    f3_to_f2: F3ToF2,
    f2_to_f1: F2ToF1,
    f1_to_data24: F1ToData24,
    display: DisplayOptions,
}

impl EfmDecoder {
    pub fn new(display: DisplayOptions) -> Self {
        Self {
            t_values_to_channel: TvaluesToChannel::new(),
            channel_to_f3: ChannelToF3::new(),
            f3_to_f2: F3ToF2::new(),
            f2_to_f1: F2ToF1::new(),
            f1_to_data24: F1ToData24::new(),
            display,
        }
    }

    /// Pushes a chunk of T-values and drains every stage, appending decoded
    /// frames to `sink`.
    pub fn push(&mut self, t_values: &[u8], sink: &mut Vec<u8>) {
        self.t_values_to_channel.push(t_values);
        while self.t_values_to_channel.is_ready() {
            let Some(bits) = self.t_values_to_channel.pop() else { break };
            self.channel_to_f3.push(&bits);
        }
        while self.channel_to_f3.is_ready() {
            let Some(f3) = self.channel_to_f3.pop() else { break };
            if self.display.show_f3 {
                info!("F3 {:?}: {}", f3.frame_type, hex_line(&f3.data));
            }
            self.f3_to_f2.push(f3);
        }
        while self.f3_to_f2.is_ready() {
            let Some(f2) = self.f3_to_f2.pop() else { break };
            if self.display.show_f2 {
                info!("F2: {}", hex_line(&f2.data));
            }
            self.f2_to_f1.push(f2);
        }
        while self.f2_to_f1.is_ready() {
            let Some(f1) = self.f2_to_f1.pop() else { break };
            if self.display.show_f1 {
                info!("F1: {}", hex_line(&f1.data));
            }
            self.f1_to_data24.push(f1);
        }
        while self.f1_to_data24.is_ready() {
            let Some(data) = self.f1_to_data24.pop() else { break };
            if self.display.show_output {
                info!("Output data: {}", hex_line(&data));
            }
            sink.extend_from_slice(&data);
        }
    }

    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            valid_t_values: self.t_values_to_channel.valid_t_values(),
            invalid_t_values: self.t_values_to_channel.invalid_t_values(),
            valid_channel_frames: self.channel_to_f3.valid_channel_frames(),
            invalid_channel_frames: self.channel_to_f3.invalid_channel_frames(),
            valid_f3_frames: self.f3_to_f2.valid_f3_frames(),
            valid_q_sections: self.f3_to_f2.valid_q_sections(),
            invalid_q_sections: self.f3_to_f2.invalid_q_sections(),
            valid_f2_frames: self.f2_to_f1.valid_f2_frames(),
            invalid_f2_frames: self.f2_to_f1.invalid_f2_frames(),
            valid_f1_frames: self.f1_to_data24.valid_f1_frames(),
            c1: self.f2_to_f1.c1_counters(),
            c2: self.f2_to_f1.c2_counters(),
        }
    }
}

/// End-of-run statistics snapshot.
#[derive(Debug, Clone, Copy)]
pub struct DecoderStats {
    pub valid_t_values: u64,
    pub invalid_t_values: u64,
    pub valid_channel_frames: u64,
    pub invalid_channel_frames: u64,
    pub valid_f3_frames: u64,
    pub valid_q_sections: u64,
    pub invalid_q_sections: u64,
    pub valid_f2_frames: u64,
    pub invalid_f2_frames: u64,
    pub valid_f1_frames: u64,
    pub c1: circ::CircCounters,
    pub c2: circ::CircCounters,
}

/// Decodes a T-value stream back into DATA24 bytes on disk.
pub async fn decode_file(cmd: &DecodeCommand) -> EfmResult<()> {
    debug!("Decoding EFM from {:?} to {:?}", cmd.input, cmd.output);
    let total_bytes = fs::metadata(&cmd.input).await?.len();
    let mut reader = fs::File::open(&cmd.input).await?;
    let mut writer = BufWriter::new(fs::File::create(&cmd.output).await?);
    let progress = byte_progress(total_bytes)?;

    let mut decoder = EfmDecoder::new(DisplayOptions {
        show_output: cmd.show_output,
        show_f1: cmd.show_f1,
        show_f2: cmd.show_f2,
        show_f3: cmd.show_f3,
    });

    let mut chunk = vec![0u8; DECODE_CHUNK_SIZE];
    let mut data = Vec::new();
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        decoder.push(&chunk[..read], &mut data);
        if !data.is_empty() {
            writer.write_all(&data).await?;
            data.clear();
        }
        progress.inc(read as u64);
    }
    writer.flush().await?;
    progress.finish_and_clear();

    let stats = decoder.stats();
    info!("Decoding complete");
    info!(
        "Processed {} valid T-values and {} invalid T-values",
        stats.valid_t_values, stats.invalid_t_values
    );
    info!(
        "Processed {} valid channel frames and {} invalid channel frames",
        stats.valid_channel_frames, stats.invalid_channel_frames
    );
    info!("Processed {} valid F3 frames", stats.valid_f3_frames);
    info!(
        "Reassembled {} Q sections with a valid CRC and {} without",
        stats.valid_q_sections, stats.invalid_q_sections
    );
    info!(
        "Processed {} valid F2 frames and {} warm-up F2 frames",
        stats.valid_f2_frames, stats.invalid_f2_frames
    );
    info!("Processed {} valid F1 frames", stats.valid_f1_frames);
    info!(
        "C1 decoder: valid {} - fixed {} - error {} - total {} - total errors {}",
        stats.c1.valid,
        stats.c1.fixed,
        stats.c1.error,
        stats.c1.total(),
        stats.c1.fixed + stats.c1.error
    );
    info!(
        "C2 decoder: valid {} - fixed {} - error {} - total {} - total errors {}",
        stats.c2.valid,
        stats.c2.fixed,
        stats.c2.error,
        stats.c2.total(),
        stats.c2.fixed + stats.c2.error
    );
    Ok(())
}
