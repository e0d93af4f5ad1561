use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// CLI for encoding and decoding ECMA-130 EFM channel data.
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Encode(EncodeCommand),
    Decode(DecodeCommand),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("testdata mode takes exactly one path, the output EFM file")]
    TestdataPositionals,

    #[error("expected an input file and an output file")]
    FilePositionals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Opaque bytes, consumed 24 at a time
    Raw,
    /// 16-bit stereo 44.1 kHz PCM in a canonical WAV container
    Wav,
}

/// Encodes audio data into an EFM T-value stream.
#[derive(Parser, Debug, Clone)]
pub struct EncodeCommand {
    /// Input and output paths: INPUT OUTPUT, or just OUTPUT with --audio-testdata
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Generate this many stereo test samples (n, -n) instead of reading input
    #[arg(long, short = 't', value_name = "FRAMES")]
    pub audio_testdata: Option<u32>,

    /// Input container format
    #[arg(long, value_enum, default_value_t = InputFormat::Raw)]
    pub format: InputFormat,

    /// Q subchannel mode: 1 for CD audio, 4 for LaserDisc
    #[arg(long, default_value_t = 1)]
    pub q_mode: u8,

    /// Track number written to the Q subchannel (1-99)
    #[arg(long, default_value_t = 1)]
    pub track: u8,
}

impl EncodeCommand {
    /// Splits the positional paths into (input, output) according to the
    /// selected mode.
    pub fn resolve_paths(&self) -> Result<(Option<&Path>, &Path), CommandError> {
        if self.audio_testdata.is_some() {
            match self.files.as_slice() {
                [output] => Ok((None, output)),
                _ => Err(CommandError::TestdataPositionals),
            }
        } else {
            match self.files.as_slice() {
                [input, output] => Ok((Some(input), output)),
                _ => Err(CommandError::FilePositionals),
            }
        }
    }
}

/// Decodes an EFM T-value stream back into DATA24 bytes.
#[derive(Parser, Debug, Clone)]
pub struct DecodeCommand {
    /// Input EFM file
    pub input: PathBuf,

    /// Output data file
    pub output: PathBuf,

    /// Log each decoded 24-byte frame
    #[arg(long)]
    pub show_output: bool,

    /// Log each F1 frame
    #[arg(long)]
    pub show_f1: bool,

    /// Log each F2 frame
    #[arg(long)]
    pub show_f2: bool,

    /// Log each F3 frame
    #[arg(long)]
    pub show_f3: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_command(files: &[&str], testdata: Option<u32>) -> EncodeCommand {
        EncodeCommand {
            files: files.iter().map(PathBuf::from).collect(),
            audio_testdata: testdata,
            format: InputFormat::Raw,
            q_mode: 1,
            track: 1,
        }
    }

    #[test]
    fn file_mode_takes_input_and_output() {
        let cmd = encode_command(&["in.wav", "out.efm"], None);
        let (input, output) = cmd.resolve_paths().unwrap();
        assert_eq!(input, Some(Path::new("in.wav")));
        assert_eq!(output, Path::new("out.efm"));

        assert!(encode_command(&["only.efm"], None).resolve_paths().is_err());
    }

    #[test]
    fn testdata_mode_takes_only_the_output() {
        let cmd = encode_command(&["out.efm"], Some(100));
        let (input, output) = cmd.resolve_paths().unwrap();
        assert_eq!(input, None);
        assert_eq!(output, Path::new("out.efm"));

        assert!(encode_command(&["a", "b"], Some(100))
            .resolve_paths()
            .is_err());
    }
}
