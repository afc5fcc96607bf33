use super::*;
use thiserror::Error;

/// The primary error type for the `bpv6` crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The bundle protocol version byte is not 6.
    #[error("Unsupported bundle protocol version {0}")]
    InvalidVersion(u8),

    /// A block's length field points past the end of the buffer.
    #[error("Block length {0} exceeds remaining {1} bytes")]
    InvalidBlockLength(u64, usize),

    /// The buffer ended before a complete block header could be read.
    #[error("Truncated block")]
    Truncated,

    /// The bundle carries no payload block.
    #[error("Bundle has no payload block")]
    MissingPayload,

    /// A bundle contains more than one block of a type that must be unique.
    #[error("Bundle has multiple blocks of type {0:#04x}")]
    DuplicateBlock(u8),

    /// The integrity block's security result does not match the payload.
    #[error("Integrity check failed: expected {expected:#010x}, computed {computed:#010x}")]
    IntegrityCheckFailed { expected: u64, computed: u64 },

    /// A primary block carrying a non-empty dictionary (non-CBHE bundle).
    #[error("Unsupported dictionary of {0} bytes")]
    UnsupportedDictionary(u64),

    /// A custodian EID that is not valid UTF-8.
    #[error("Custodian EID is not valid UTF-8")]
    InvalidEidEncoding,

    /// An unknown BIB cipher suite identifier.
    #[error("Invalid cipher suite {0}")]
    InvalidCipherSuite(u64),

    /// The integrity block's security result has the wrong length for its suite.
    #[error("Security result length {0} does not match cipher suite")]
    InvalidSecurityResultLength(u64),

    /// An administrative record has an unknown record type byte.
    #[error("Unknown administrative record type {0:#04x}")]
    InvalidRecordType(u8),

    /// An administrative record too short to carry its fixed header.
    #[error("Administrative record too short")]
    RecordTooShort,

    /// The built bundle exceeds the configured maximum length.
    #[error("Bundle of {0} bytes exceeds maximum length {1}")]
    BundleTooLarge(usize, usize),

    /// An error related to Endpoint ID processing.
    #[error(transparent)]
    InvalidEid(#[from] eid::EidError),

    /// An error related to SDNV decoding.
    #[error(transparent)]
    InvalidSdnv(#[from] sdnv::decode::Error),
}
