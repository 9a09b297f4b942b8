//! Error types for transaction, script and address decoding

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A read ran past the end of the input buffer
    #[error("Read out of bounds: {0}")]
    OutOfBounds(String),

    /// The bytes were readable but do not form a valid structure
    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Input text is neither hex nor base64
    #[error("Invalid input encoding: {0}")]
    InvalidEncoding(String),

    /// Well-formed input that does not match what the caller asked about
    #[error("No match: {0}")]
    NoMatch(String),

    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl CodecError {
    /// True for "no match" outcomes, as opposed to corrupt or truncated input
    pub fn is_no_match(&self) -> bool {
        matches!(self, CodecError::NoMatch(_))
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
