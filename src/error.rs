use thiserror::Error;

/// Errors raised by the RCOL codecs and by registered block constructors.
///
/// Structural corruption of a container is not an error: it is reported
/// through [`RcolContainer::is_valid`](crate::RcolContainer::is_valid).
#[derive(Error, Debug)]
pub enum RcolError {
    #[error("Buffer too short: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
    #[error("Invalid block tag: expected {expected}, found {found}")]
    InvalidTag { expected: String, found: String },
    #[error("{tag} block too short: {len} bytes")]
    BlockTooShort { tag: String, len: usize },
    #[error("Binary layout error: {0}")]
    Layout(#[from] binrw::Error),
}
