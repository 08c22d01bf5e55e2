use crate::error::{CoreError, CoreResult};
use sha2::{Digest, Sha256};
use ulid::Ulid;

pub fn run_id_ulid() -> String {
    format!("r_{}", Ulid::new())
}

/// Deterministic run id for replayed runs: `r_` + first 32 hex chars of a fingerprint.
pub fn run_id_from_fingerprint_hex32(fingerprint_hex: &str) -> CoreResult<String> {
    let hex = fingerprint_hex.trim();
    if hex.len() < 32 || !hex.chars().take(32).all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidInput(
            "run fingerprint must be hex with length >= 32".to_string(),
        ));
    }
    Ok(format!("r_{}", hex[..32].to_ascii_lowercase()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}
