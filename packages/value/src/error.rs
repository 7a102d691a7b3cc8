//! Error types for the value layer.

use crate::path::PathError;

/// Errors raised while navigating or converting values.
#[derive(Debug)]
pub enum Error {
    /// Path validation error.
    Path(PathError),

    /// A path could not be applied to a value (e.g. indexing into a string).
    InvalidPath { message: String },

    /// A value could not be decoded into a Rust type.
    Decode { message: String },

    /// A Rust type could not be encoded into a value.
    Encode { message: String },
}

impl Error {
    pub fn decode(message: impl Into<String>) -> Self {
        Error::Decode {
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Error::Encode {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Path(e) => write!(f, "path error: {}", e),
            Error::InvalidPath { message } => write!(f, "invalid path: {}", message),
            Error::Decode { message } => write!(f, "decode error: {}", message),
            Error::Encode { message } => write!(f, "encode error: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Path(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PathError> for Error {
    fn from(e: PathError) -> Self {
        Error::Path(e)
    }
}
