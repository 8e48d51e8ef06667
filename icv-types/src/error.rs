//! Error types for icv-types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid digest length: expected {expected}, got {actual}")]
    InvalidDigestLength { expected: usize, actual: usize },

    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("Malformed hash tree: {0}")]
    MalformedHashTree(String),

    #[error("Malformed certificate: {0}")]
    MalformedCertificate(String),

    #[error("CBOR error: {0}")]
    Cbor(#[from] serde_cbor::Error),

    #[error("Hex encoding error: {0}")]
    HexEncoding(#[from] hex::FromHexError),
}
