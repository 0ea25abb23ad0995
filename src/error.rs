use std::io;

/// Errors raised by the engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad selector, unknown parameter or out-of-range knob.
    ///
    /// Always raised before any work begins.
    #[error("{0}")]
    Config(String),

    /// Truncated or corrupt model data
    #[error("model format error: {0}")]
    Format(String),

    /// Shapes that must agree do not
    #[error("dimension mismatch: {0}")]
    Dimension(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Failure of an external scorer invoked at a training checkpoint
    #[error("evaluator failed: {0}")]
    Evaluator(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub(crate) fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    pub(crate) fn dimension<S: Into<String>>(msg: S) -> Self {
        Error::Dimension(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
