//! NDR error types

use thiserror::Error;

/// Upper bound on the element count of any single array read from the wire.
pub const MAX_NDR_ARRAY_ELEMENTS: usize = 16 * 1024 * 1024;

/// Upper bound on the bytes a single decoded array may occupy.
pub const MAX_NDR_ALLOCATION_SIZE: usize = 64 * 1024 * 1024;

/// Upper bound on how deeply referents may nest inside referents.
pub const MAX_NDR_NESTING_DEPTH: usize = 256;

/// NDR encoding/decoding errors
#[derive(Debug, Error)]
pub enum NdrError {
    /// Buffer underflow - not enough data
    #[error("buffer underflow: needed {needed} bytes, have {have}")]
    BufferUnderflow { needed: usize, have: usize },

    /// A count on the wire implies an allocation beyond the decoder's limits
    #[error("allocation limit exceeded: requested {requested}, limit {limit}")]
    AllocationLimitExceeded { requested: usize, limit: usize },

    /// Referents nested deeper than the codec follows
    #[error("pointer nesting exceeds depth limit {limit}")]
    DepthExceeded { limit: usize },

    /// Integer overflow while computing a size
    #[error("integer overflow computing wire size")]
    IntegerOverflow,

    /// Invalid string - not null terminated or invalid encoding
    #[error("invalid string: {0}")]
    InvalidString(String),

    /// A ref pointer was null
    #[error("null ref pointer")]
    NullRefPointer,

    /// A full pointer referent id was seen twice in one message
    #[error("aliased full pointer: referent ID 0x{0:08x}")]
    AliasedPointer(u32),

    /// Invalid union discriminant
    #[error("invalid union discriminant: {0}")]
    InvalidDiscriminant(u32),

    /// Invalid enum value
    #[error("invalid enum value: {0}")]
    InvalidEnumValue(u32),

    /// Conformance mismatch
    #[error("conformance mismatch: max_count={max_count}, actual_count={actual_count}")]
    ConformanceMismatch { max_count: u32, actual_count: u32 },

    /// UTF-8 decoding error
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// UTF-16 decoding error
    #[error("UTF-16 error: {0}")]
    Utf16Error(#[from] std::char::DecodeUtf16Error),

    /// A construct this codec does not model
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;
