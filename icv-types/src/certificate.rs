//! State certificates

use crate::cbor;
use crate::error::{Error, Result};
use crate::hash_tree::{HashTree, LookupResult};
use crate::primitives::{Digest, Principal, Timestamp};

/// A certificate over a subnet's state tree.
///
/// Certificates are produced and signed by the platform; this crate only
/// decodes and inspects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The (partially pruned) certified state tree
    pub tree: HashTree,
    /// Signature over the root hash of `tree`
    pub signature: Vec<u8>,
    /// Present when the certificate was signed by a subnet key rather than the root key
    pub delegation: Option<Delegation>,
}

/// Authorization of a subnet key by the root key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub subnet_id: Vec<u8>,
    /// An encoded certificate, signed by the root key, that lists the subnet's public key
    pub certificate: Vec<u8>,
}

impl Certificate {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        cbor::decode_certificate(bytes)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        cbor::encode_certificate(self)
    }

    pub fn lookup<P: AsRef<[u8]>>(&self, path: &[P]) -> LookupResult<'_> {
        self.tree.lookup(path)
    }

    /// The root hash the signature covers
    pub fn root_hash(&self) -> Digest {
        self.tree.reconstruct()
    }

    /// Certificate time in nanoseconds since the UNIX epoch, stored as an
    /// unsigned LEB128 leaf at `["time"]`
    pub fn time_nanos(&self) -> Result<u64> {
        let mut value = match self.lookup(&["time"]) {
            LookupResult::Found(value) => value,
            other => {
                return Err(Error::MalformedCertificate(format!(
                    "time lookup returned {:?}",
                    other
                )))
            }
        };
        // Bytes after the LEB128 terminator are ignored
        leb128::read::unsigned(&mut value)
            .map_err(|e| Error::MalformedCertificate(format!("time is not valid LEB128: {}", e)))
    }

    pub fn timestamp(&self) -> Result<Timestamp> {
        self.time_nanos().map(Timestamp::from_unix_nanos)
    }

    /// Look up the data certified by `canister_id`
    pub fn certified_data(&self, canister_id: &Principal) -> LookupResult<'_> {
        let path: [&[u8]; 3] = [b"canister", canister_id.as_slice(), b"certified_data"];
        self.lookup(&path)
    }
}
