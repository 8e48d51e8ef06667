//! Reading blobs and tree paths from the command line

use std::io::Read;
use std::path::Path;

use icv_types::Principal;

use crate::{CliError, Result};

/// Read a certificate or witness.
///
/// Files may hold the raw CBOR bytes or their hex encoding. `-` reads stdin.
pub fn read_blob(path: &Path) -> Result<Vec<u8>> {
    let bytes = if path == Path::new("-") {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        data
    } else {
        std::fs::read(path)?
    };
    Ok(decode_blob(bytes))
}

/// Hex text is decoded; anything else is taken as raw bytes
pub fn decode_blob(bytes: Vec<u8>) -> Vec<u8> {
    match std::str::from_utf8(&bytes) {
        Ok(text) => {
            let text = text.trim();
            let text = text.strip_prefix("0x").unwrap_or(text);
            match hex::decode(text) {
                Ok(decoded) if !text.is_empty() => decoded,
                _ => bytes,
            }
        }
        Err(_) => bytes,
    }
}

/// Parse one path segment.
///
/// `hex:<hex>` gives raw bytes, `principal:<text>` the bytes of a principal,
/// anything else its UTF-8 bytes.
pub fn parse_label(segment: &str) -> Result<Vec<u8>> {
    if let Some(encoded) = segment.strip_prefix("hex:") {
        return hex::decode(encoded)
            .map_err(|e| CliError::Input(format!("bad hex segment {:?}: {}", segment, e)));
    }
    if let Some(text) = segment.strip_prefix("principal:") {
        return Ok(Principal::from_text(text)?.as_slice().to_vec());
    }
    Ok(segment.as_bytes().to_vec())
}

/// Parse a `/`-separated path such as `canister/principal:aaaaa-aa/certified_data`
pub fn parse_path(path: &str) -> Result<Vec<Vec<u8>>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('/').map(parse_label).collect()
}

/// Render a label so that [`parse_label`] reads it back
pub fn format_label(label: &[u8]) -> String {
    match std::str::from_utf8(label) {
        Ok(text)
            if !text.is_empty()
                && !text.contains('/')
                && !text.starts_with("hex:")
                && !text.starts_with("principal:")
                && text.chars().all(|c| c.is_ascii_graphic()) =>
        {
            text.to_string()
        }
        _ => format!("hex:{}", hex::encode(label)),
    }
}

pub fn format_path(path: &[Vec<u8>]) -> String {
    path.iter()
        .map(|label| format_label(label))
        .collect::<Vec<_>>()
        .join("/")
}
