//! Command-line verification of certified canister responses
//!
//! Library half of the `icv` binary: configuration, input parsing, the
//! command implementations and their reports.

pub mod commands;
pub mod config;
pub mod input;
pub mod report;

pub use commands::{inspect_certificate, lookup, verify, witness_root_hash, ResponseCheck, VerifyRequest};
pub use config::{CliConfig, ConfigError, SignatureScheme};
pub use report::{CertificateSummary, PathEntry, VerifyReport};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Decode error: {0}")]
    Decode(#[from] icv_types::Error),

    #[error("Verification failed: {0}")]
    Verification(#[from] icv_core::VerificationError),

    #[error("Response check failed: {0}")]
    Response(#[from] icv_core::ResponseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No canister id given (use --canister-id or set verification.canister_id)")]
    MissingCanisterId,

    #[error("No root key given (use --root-key, set trust.root_key or ICV_ROOT_KEY)")]
    MissingRootKey,
}

pub type Result<T> = std::result::Result<T, CliError>;
