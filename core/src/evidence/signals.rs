use crate::error::{CoreError, CoreResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

/// Windows security event ids worth surfacing to the comparison stage.
pub const SECURITY_EVENT_IDS: &[&str] = &[
    "4624", "4625", "4634", "4648", "4672", "4720", "4740", "4771", "4776",
];

pub const AUTH_FAILURE_KEYWORDS: &[&str] = &[
    "failed password",
    "authentication failure",
    "invalid user",
    "denied",
    "failed logon",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceSignal {
    pub event_ids: BTreeMap<String, usize>,
    pub ip_addresses: BTreeSet<String>,
    pub keyword_counts: BTreeMap<String, usize>,
}

impl EvidenceSignal {
    pub fn is_empty(&self) -> bool {
        self.event_ids.is_empty() && self.ip_addresses.is_empty() && self.keyword_counts.is_empty()
    }

    pub fn total_failures(&self) -> usize {
        self.keyword_counts.values().sum()
    }

    pub fn render(&self) -> String {
        if self.is_empty() {
            return "No indicators derived.".to_string();
        }
        let mut out = Vec::new();
        if !self.event_ids.is_empty() {
            let ids = self
                .event_ids
                .iter()
                .map(|(id, n)| format!("{id} x{n}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push(format!("Event IDs: {ids}"));
        }
        if !self.ip_addresses.is_empty() {
            let ips = self.ip_addresses.iter().cloned().collect::<Vec<_>>().join(", ");
            out.push(format!("Source IPs: {ips}"));
        }
        if !self.keyword_counts.is_empty() {
            let kws = self
                .keyword_counts
                .iter()
                .map(|(k, n)| format!("{k} x{n}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push(format!("Auth failure keywords: {kws}"));
        }
        out.join("\n")
    }
}

pub fn derive_signals(text: &str) -> CoreResult<EvidenceSignal> {
    let event_id_re = Regex::new(&format!(r"\b({})\b", SECURITY_EVENT_IDS.join("|")))
        .map_err(|_e| CoreError::InvalidInput("Regex compilation failed".to_string()))?;
    let ipv4_re = Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b")
        .map_err(|_e| CoreError::InvalidInput("Regex compilation failed".to_string()))?;

    let mut signal = EvidenceSignal::default();
    for cap in event_id_re.captures_iter(text) {
        if let Some(m) = cap.get(1) {
            *signal.event_ids.entry(m.as_str().to_string()).or_insert(0) += 1;
        }
    }

    for m in ipv4_re.find_iter(text) {
        if m.as_str().parse::<Ipv4Addr>().is_ok() {
            signal.ip_addresses.insert(m.as_str().to_string());
        }
    }

    let lower = text.to_lowercase();
    for kw in AUTH_FAILURE_KEYWORDS {
        let n = lower.matches(kw).count();
        if n > 0 {
            signal.keyword_counts.insert((*kw).to_string(), n);
        }
    }
    Ok(signal)
}
