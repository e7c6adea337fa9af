#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    #[error("{0}")]
    LoadingError(String),
    #[error("Internal error while interpreting image")]
    InternalDecoderError,
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),
    #[error("Dimension too large for system")]
    ConversionTooLargerError,
    #[error("Sub-frame {index} could not be decoded: {reason}")]
    SubFrameFailed { index: u32, reason: String },
}

impl DecoderError {
    pub fn loading(err: &impl std::fmt::Display) -> Self {
        Self::LoadingError(err.to_string())
    }

    pub fn subframe(index: u32, err: &impl std::fmt::Display) -> Self {
        Self::SubFrameFailed {
            index,
            reason: err.to_string(),
        }
    }
}

impl From<DimensionTooLargerError> for DecoderError {
    fn from(_err: DimensionTooLargerError) -> Self {
        Self::ConversionTooLargerError
    }
}

pub trait GenericContexts<T> {
    fn context_failed(self) -> Result<T, DecoderError>;
    fn context_internal(self) -> Result<T, DecoderError>;
    fn context_unsupported(self, msg: String) -> Result<T, DecoderError>;
}

impl<T, E> GenericContexts<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context_failed(self) -> Result<T, DecoderError> {
        self.map_err(|err| DecoderError::LoadingError(err.to_string()))
    }

    fn context_internal(self) -> Result<T, DecoderError> {
        self.map_err(|_| DecoderError::InternalDecoderError)
    }

    fn context_unsupported(self, msg: String) -> Result<T, DecoderError> {
        self.map_err(|_| DecoderError::UnsupportedImageFormat(msg))
    }
}

impl<T> GenericContexts<T> for Option<T> {
    fn context_failed(self) -> Result<T, DecoderError> {
        self.ok_or(DecoderError::LoadingError(String::new()))
    }

    fn context_internal(self) -> Result<T, DecoderError> {
        self.ok_or(DecoderError::InternalDecoderError)
    }

    fn context_unsupported(self, msg: String) -> Result<T, DecoderError> {
        self.ok_or(DecoderError::UnsupportedImageFormat(msg))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionTooLargerError;

impl std::fmt::Display for DimensionTooLargerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.write_str("Dimension too large for system")
    }
}

impl std::error::Error for DimensionTooLargerError {}
