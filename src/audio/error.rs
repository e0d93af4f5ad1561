use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    BinRwError(#[from] binrw::Error),

    #[error("not a canonical 16-bit stereo 44.1 kHz WAV header")]
    UnsupportedWavFormat,
}

pub type AudioResult<T> = Result<T, AudioError>;
