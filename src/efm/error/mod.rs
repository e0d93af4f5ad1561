use crate::audio::error::AudioError;
use crate::commands::CommandError;
use crate::efm::subcode::SubcodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EfmError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    AudioError(#[from] AudioError),

    #[error(transparent)]
    SubcodeError(#[from] SubcodeError),

    #[error(transparent)]
    CommandError(#[from] CommandError),

    #[error(transparent)]
    TemplateError(#[from] indicatif::style::TemplateError),

    #[error("no legal merging bit pattern exists for the current symbol pair")]
    NoLegalMergingBits,

    #[error("run of {zeros} zeros violates the d=2/k=10 channel constraint")]
    RunLengthViolation { zeros: usize },

    #[error("channel bitstream lost run alignment")]
    ChannelDesync,
}

pub type EfmResult<T> = Result<T, EfmError>;
