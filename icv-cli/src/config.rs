//! Verifier configuration

use icv_core::{Ed25519Verifier, NoSignatureCheck, SignatureVerifier};
use icv_types::Principal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable that supplies the root key when the file has none
pub const ROOT_KEY_ENV: &str = "ICV_ROOT_KEY";

/// Default allowed distance between certificate time and local time
pub const DEFAULT_MAX_CERTIFICATE_TIME_OFFSET_MS: u64 = 50_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Root key is not valid hex: {0}")]
    InvalidRootKey(#[from] hex::FromHexError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Which key certificates must chain to
    #[serde(default)]
    pub trust: TrustConfig,

    /// Verification defaults
    #[serde(default)]
    pub verification: VerificationConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Root public key in hex (can also come from `ICV_ROOT_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_key: Option<String>,

    #[serde(default)]
    pub signature_scheme: SignatureScheme,
}

/// How certificate signatures are checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureScheme {
    #[default]
    Ed25519,
    /// Skip signature checks entirely
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Canister to verify against when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canister_id: Option<Principal>,

    #[serde(default = "default_max_offset")]
    pub max_certificate_time_offset_ms: u64,
}

fn default_max_offset() -> u64 {
    DEFAULT_MAX_CERTIFICATE_TIME_OFFSET_MS
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            canister_id: None,
            max_certificate_time_offset_ms: DEFAULT_MAX_CERTIFICATE_TIME_OFFSET_MS,
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: CliConfig = toml::from_str(&contents)?;

        // Load root key from environment variable if not set
        if config.trust.root_key.is_none() {
            config.trust.root_key = std::env::var(ROOT_KEY_ENV).ok();
        }

        Ok(config)
    }

    /// Load `path` if given, otherwise the defaults with the environment applied
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let mut config = Self::default();
                config.trust.root_key = std::env::var(ROOT_KEY_ENV).ok();
                Ok(config)
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The decoded root key, if one is configured
    pub fn root_key_bytes(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        match &self.trust.root_key {
            Some(key) => Ok(Some(hex::decode(key.trim())?)),
            None => Ok(None),
        }
    }

    pub fn verifier(&self) -> Box<dyn SignatureVerifier> {
        match self.trust.signature_scheme {
            SignatureScheme::Ed25519 => Box::new(Ed25519Verifier),
            SignatureScheme::None => Box::new(NoSignatureCheck),
        }
    }
}
