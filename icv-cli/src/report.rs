//! Verification reports

use icv_types::{Certificate, HashTree, Timestamp};
use serde::Serialize;
use std::fmt;

use crate::input::format_path;

/// One leaf revealed by a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathEntry {
    pub path: String,
    pub value: String,
}

impl PathEntry {
    pub fn list(tree: &HashTree) -> Vec<PathEntry> {
        tree.list_paths()
            .into_iter()
            .map(|(path, value)| PathEntry {
                path: format_path(&path),
                value: hex::encode(value),
            })
            .collect()
    }
}

/// Outcome of a successful verification
#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub canister_id: String,
    pub certificate_time_ns: u64,
    pub certificate_time: String,
    /// Root hash of the witness, equal to the canister's certified data
    pub certified_data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    pub signature_checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_key: Option<String>,
    pub witness_paths: Vec<PathEntry>,
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Certificate verified successfully")?;
        writeln!(f, "Canister:       {}", self.canister_id)?;
        writeln!(f, "Time:           {}", self.certificate_time)?;
        writeln!(f, "Certified data: {}", self.certified_data)?;
        if let Some(subnet) = &self.subnet_id {
            writeln!(f, "Delegated to:   subnet {}", subnet)?;
        }
        if !self.signature_checked {
            writeln!(f, "Signature:      NOT CHECKED")?;
        }
        if let Some(key) = &self.response_key {
            writeln!(f, "Response:       payload matches key {}", key)?;
        }
        write!(f, "Witness leaves: {}", self.witness_paths.len())?;
        for entry in &self.witness_paths {
            write!(f, "\n  {} = {}", entry.path, entry.value)?;
        }
        Ok(())
    }
}

/// Decoded contents of a certificate, without any checks
#[derive(Debug, Clone, Serialize)]
pub struct CertificateSummary {
    pub root_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_subnet_id: Option<String>,
    pub paths: Vec<PathEntry>,
}

impl CertificateSummary {
    pub fn new(certificate: &Certificate) -> Self {
        let time_ns = certificate.time_nanos().ok();
        Self {
            root_hash: certificate.root_hash().to_hex(),
            time_ns,
            time: time_ns.map(|ns| Timestamp::from_unix_nanos(ns).to_string()),
            signature: hex::encode(&certificate.signature),
            delegation_subnet_id: certificate
                .delegation
                .as_ref()
                .map(|d| hex::encode(&d.subnet_id)),
            paths: PathEntry::list(&certificate.tree),
        }
    }
}

impl fmt::Display for CertificateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Certificate")?;
        writeln!(f, "===========")?;
        writeln!(f, "Root hash:  {}", self.root_hash)?;
        match &self.time {
            Some(time) => writeln!(f, "Time:       {}", time)?,
            None => writeln!(f, "Time:       missing")?,
        }
        writeln!(f, "Signature:  {}", self.signature)?;
        if let Some(subnet) = &self.delegation_subnet_id {
            writeln!(f, "Delegation: subnet {}", subnet)?;
        }
        write!(f, "Leaves:     {}", self.paths.len())?;
        for entry in &self.paths {
            write!(f, "\n  {} = {}", entry.path, entry.value)?;
        }
        Ok(())
    }
}
