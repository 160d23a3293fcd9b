use std::io;
use thiserror::Error;

/// Why a buffer could not be decoded (or a value could not be encoded).
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unexpected end of data at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        offset: u64,
        needed: u64,
        remaining: u64,
    },

    #[error("{what} count {count} exceeds the limit of {limit}")]
    CountExceedsLimit {
        what: &'static str,
        count: u64,
        limit: u32,
    },

    #[error("{what} count {count} needs {needed} bytes but only {remaining} remain")]
    CountExceedsRemaining {
        what: &'static str,
        count: u64,
        needed: u64,
        remaining: u64,
    },

    #[error("{what}: {left} does not match {right}")]
    CountMismatch {
        what: &'static str,
        left: u64,
        right: u64,
    },

    #[error("unsupported version 0x{0:X}")]
    UnsupportedVersion(u32),

    #[error("{0}")]
    InvalidValue(String),

    #[error("{what} of {value} does not fit in the on-disk field")]
    Overflow { what: &'static str, value: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FormatError {
    pub fn invalid(message: impl Into<String>) -> Self {
        FormatError::InvalidValue(message.into())
    }
}

/// Coarse classification of a [`ResourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input data.
    Format,
    /// A field or operation the format does not declare.
    Unsupported,
    /// The registry was not bootstrapped; not recoverable.
    Configuration,
    Cancelled,
    Archive,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("malformed {format} data")]
    Format {
        format: &'static str,
        #[source]
        cause: FormatError,
    },

    #[error("{format} does not support field `{field}`")]
    UnsupportedField { format: &'static str, field: String },

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("no catch-all factory is registered")]
    MissingFallback,

    #[error("operation cancelled")]
    Cancelled,

    #[error("archive error: {0}")]
    Archive(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ResourceError {
    pub fn format(format: &'static str, cause: FormatError) -> Self {
        ResourceError::Format { format, cause }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::Format { .. } => ErrorKind::Format,
            ResourceError::UnsupportedField { .. } | ResourceError::UnsupportedOperation(_) => {
                ErrorKind::Unsupported
            }
            ResourceError::MissingFallback => ErrorKind::Configuration,
            ResourceError::Cancelled => ErrorKind::Cancelled,
            ResourceError::Archive(_) | ResourceError::Io(_) => ErrorKind::Archive,
        }
    }

    /// The decode failure behind a [`ResourceError::Format`], if any.
    pub fn format_cause(&self) -> Option<&FormatError> {
        match self {
            ResourceError::Format { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

pub type Result<T, E = ResourceError> = std::result::Result<T, E>;
