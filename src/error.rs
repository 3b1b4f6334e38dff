//! Crate-wide error taxonomy shared by the scheduler, pool, timers,
//! signal bridge and net service.

use std::fmt;

/// Closed set of failure kinds reported by the runtime.
///
/// Numeric tags are stable across versions and safe to compare or
/// persist.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Ok = 0,
    InvalidArgument = 1,
    NotReady = 2,
    Timeout = 3,
    Canceled = 4,
    Closed = 5,
    Overflow = 6,
    Stopped = 7,
    QueueFull = 8,
    Rejected = 9,
    NotSupported = 10,
}

impl ErrorKind {
    /// Stable numeric tag.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn message(self) -> &'static str {
        match self {
            ErrorKind::Ok => "ok",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::NotReady => "not ready",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Canceled => "canceled",
            ErrorKind::Closed => "closed",
            ErrorKind::Overflow => "overflow",
            ErrorKind::Stopped => "stopped",
            ErrorKind::QueueFull => "queue full",
            ErrorKind::Rejected => "rejected",
            ErrorKind::NotSupported => "not supported",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Failure value carried by every fallible runtime operation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A bare failure kind.
    #[error("{0}")]
    Kind(ErrorKind),
    /// A failure kind with contextual detail.
    #[error("{message}")]
    Context { kind: ErrorKind, message: String },
    /// Platform I/O error passed through unchanged.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Context {
            kind,
            message: message.into(),
        }
    }

    /// Failure kind, if this error carries one. Raw I/O errors keep their
    /// platform code instead of a kind.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Kind(kind) => Some(*kind),
            Error::Context { kind, .. } => Some(*kind),
            Error::Io(_) => None,
        }
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn is_canceled(&self) -> bool {
        self.is_kind(ErrorKind::Canceled)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::Kind(kind)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
