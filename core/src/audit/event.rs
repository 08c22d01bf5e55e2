use crate::determinism::json_canonical;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEvent {
    pub ts_utc: String, // RFC3339 UTC string
    pub event_type: String,
    pub run_id: String,
    pub details: serde_json::Value,
    pub prev_event_hash: String, // hex 64
    pub event_hash: String,      // hex 64
}

impl JournalEvent {
    pub fn new(event_type: &str, run_id: &str, details: serde_json::Value) -> Self {
        Self {
            ts_utc: now_rfc3339_utc(),
            event_type: event_type.to_string(),
            run_id: run_id.to_string(),
            details,
            prev_event_hash: String::new(),
            event_hash: String::new(),
        }
    }
}

pub const ZERO_HASH_64: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// event_hash = SHA-256 over the canonical bytes of the full envelope with
// `event_hash` itself forced to ZERO_HASH_64.
pub fn compute_event_hash(event: &JournalEvent) -> CoreResult<String> {
    let mut e = event.clone();
    e.event_hash = ZERO_HASH_64.to_string();
    let bytes = json_canonical::to_canonical_bytes(&e)?;
    let mut h = Sha256::new();
    h.update(bytes);
    Ok(hex::encode(h.finalize()))
}

pub fn finalize_event(mut event: JournalEvent) -> CoreResult<JournalEvent> {
    if event.prev_event_hash.len() != 64
        || !event.prev_event_hash.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(CoreError::InvalidInput(
            "prev_event_hash must be 64 hex chars".to_string(),
        ));
    }
    validate_event_taxonomy(&event)?;
    event.event_hash = compute_event_hash(&event)?;
    Ok(event)
}

fn validate_event_taxonomy(event: &JournalEvent) -> CoreResult<()> {
    let allowed = [
        "RUN_STARTED",
        "STAGE_STARTED",
        "STAGE_COMPLETED",
        "STAGE_SKIPPED",
        "STAGE_FAILED",
        "ORACLE_CALL_COMPLETED",
        "ORACLE_CALL_FAILED",
        "DOCUMENT_SKIPPED",
        "CITATION_UNVERIFIED",
        "RUN_FINALIZED",
    ];
    if !allowed.contains(&event.event_type.as_str()) {
        return Err(CoreError::InvalidInput(format!(
            "unknown event_type {}",
            event.event_type
        )));
    }
    for k in required_detail_keys(&event.event_type) {
        if event.details.get(k).is_none() {
            return Err(CoreError::InvalidInput(format!(
                "event {} missing details.{}",
                event.event_type, k
            )));
        }
    }
    Ok(())
}

fn required_detail_keys(event_type: &str) -> &'static [&'static str] {
    match event_type {
        "RUN_STARTED" => &["threat_sha256", "policy_count", "log_glob"],
        "STAGE_STARTED" => &["stage"],
        "STAGE_COMPLETED" => &["stage", "fields_written"],
        "STAGE_SKIPPED" => &["stage", "reason"],
        "STAGE_FAILED" => &["stage", "error"],
        "ORACLE_CALL_COMPLETED" => &[
            "stage",
            "prompt_sha256",
            "response_sha256",
            "duration_ms",
        ],
        "ORACLE_CALL_FAILED" => &["stage", "prompt_sha256", "error_category"],
        "DOCUMENT_SKIPPED" => &["source", "reason"],
        "CITATION_UNVERIFIED" => &["gap", "side", "error"],
        "RUN_FINALIZED" => &["gap_count", "verified_gap_count"],
        _ => &[],
    }
}

pub fn now_rfc3339_utc() -> String {
    // Rfc3339 formatting of a UTC OffsetDateTime cannot fail for years 0..=9999.
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
