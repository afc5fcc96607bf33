use super::*;
use thiserror::Error;

/// The primary error type for the `bpa` crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A blocking operation reached its timeout without completing.
    #[error("Operation timed out")]
    Timeout,

    /// The active table wrapped onto an occupied slot under the `Block`
    /// wrap response.
    #[error("Active table is full")]
    ActiveTableFull,

    /// A received bundle's lifetime had already elapsed.
    #[error("Bundle lifetime expired")]
    Expired,

    /// An attribute value that cannot be honoured.
    #[error("Invalid attribute: {0}")]
    InvalidAttribute(&'static str),

    /// The channel lock was poisoned by a panicking thread.
    #[error("Channel state lock poisoned")]
    LockPoisoned,

    /// A stored bundle record could not be decoded.
    #[error("Stored bundle record is corrupt")]
    CorruptStore,

    /// The storage service reported a failure.
    #[error("Storage service failure: {0}")]
    Storage(storage::Error),

    /// An error in bundle encoding or decoding.
    #[error(transparent)]
    Bundle(#[from] kestrel_bpv6::Error),
}

impl From<storage::Error> for Error {
    fn from(error: storage::Error) -> Self {
        Error::Storage(error)
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::LockPoisoned
    }
}
