use std::sync::Arc;

use imgseq_utils::{DecoderError, DimensionTooLargerError};

use crate::cache::Status;

#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Decoder error: {0}")]
    DecoderError(#[from] DecoderError),
    #[error("IO error: {err} {info}")]
    StdIoError {
        err: Arc<std::io::Error>,
        info: String,
    },
    #[error("Unknown image format: {0}")]
    UnknownImageFormat(String),
    #[error("Conversion too large")]
    ConversionTooLargerError,
    #[error("Can't {operation} while the image is in state {status:?}")]
    InvalidTransition {
        status: Status,
        operation: &'static str,
    },
    #[error("Image does not contain any frames")]
    NoFrames,
    #[error("Loading was canceled")]
    Canceled,
    #[error("ICC profile: {0}")]
    IccProfile(#[from] lcms2::Error),
    #[error("Config: {0}")]
    Config(String),
}

impl Error {
    pub fn unsupported_format(&self) -> Option<String> {
        match self {
            Self::UnknownImageFormat(format) => Some(format.clone()),
            Self::DecoderError(DecoderError::UnsupportedImageFormat(msg)) => Some(msg.clone()),
            _ => None,
        }
    }

    pub(crate) fn io(err: std::io::Error, info: impl ToString) -> Self {
        Self::StdIoError {
            err: Arc::new(err),
            info: info.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::StdIoError {
            err: Arc::new(err),
            info: String::new(),
        }
    }
}

impl From<DimensionTooLargerError> for Error {
    fn from(_err: DimensionTooLargerError) -> Self {
        Self::ConversionTooLargerError
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
