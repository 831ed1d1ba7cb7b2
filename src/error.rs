use thiserror::Error;

/// Alias for the result type of codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors surfaced by the codec factory and the block transform calls.
///
/// A lookup miss in the name-to-kind direction on a value that must by
/// construction exist in the canonical table is a programming invariant
/// violation and panics instead of appearing here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodecError {
    /// The identifier is not present in the canonical codec table.
    /// Carries the offending raw identifier bytes for diagnostics.
    #[error("unknown codec: {}", String::from_utf8_lossy(.0))]
    UnknownCodec(Vec<u8>),

    /// One-time codec setup failed.
    #[error("codec initialization failed: {0}")]
    InitializationFailure(String),

    /// A block transform call failed, e.g. corrupt input or a
    /// caller-declared output size that was wrong.
    #[error("block transform failed: {0}")]
    ProcessingFailure(String),
}
