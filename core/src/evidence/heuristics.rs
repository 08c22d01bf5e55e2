use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::signals::EvidenceSignal;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequiredControl {
    pub control: String,
    pub rationale: String,
}

struct ControlRule {
    triggers: &'static [&'static str],
    controls: &'static [(&'static str, &'static str)],
}

const RULES: &[ControlRule] = &[
    ControlRule {
        triggers: &[
            "4625",
            "failed logon",
            "failed login",
            "logon failure",
            "failed password",
            "authentication failure",
        ],
        controls: &[
            (
                "Account lockout threshold",
                "Repeated failed logons (Event ID 4625) require an enforced lockout threshold.",
            ),
            (
                "Failed logon alerting",
                "Bursts of failed logons must raise an alert for investigation.",
            ),
        ],
    },
    ControlRule {
        triggers: &["brute force", "brute-force", "password spray"],
        controls: &[
            (
                "Account lockout threshold",
                "Guessing attacks are throttled by locking accounts after repeated failures.",
            ),
            (
                "Multi-factor authentication",
                "A guessed password alone must not grant access.",
            ),
            (
                "Source IP rate limiting",
                "Offending source addresses are rate limited or blocked.",
            ),
        ],
    },
    ControlRule {
        triggers: &["ssh", "rdp", "remote desktop"],
        controls: &[(
            "Remote access hardening",
            "Remote login services are restricted to approved hosts and key-based or MFA logins.",
        )],
    },
    ControlRule {
        triggers: &["4740", "locked out"],
        controls: &[(
            "Lockout review procedure",
            "Account lockouts are reviewed and unlocked through a documented procedure.",
        )],
    },
    ControlRule {
        triggers: &["4672", "administrator", "privileged"],
        controls: &[(
            "Privileged account restrictions",
            "Administrative accounts are limited, monitored and not used for routine logins.",
        )],
    },
    ControlRule {
        triggers: &["4720", "account created", "new account"],
        controls: &[(
            "Account provisioning review",
            "New accounts are approved and reviewed against a provisioning record.",
        )],
    },
];

/// Required controls implied by an evidence summary and the signal derived
/// from the logs. A rule fires when a trigger appears in the summary text or
/// names an event id or keyword counted in the signal.
///
/// Keyed by control name: a control appears once no matter how many triggers
/// fire, keeps the position of its first insertion, and takes the rationale
/// of the last rule that added it.
pub fn extract_required_controls(
    evidence_summary: &str,
    signal: &EvidenceSignal,
) -> Vec<RequiredControl> {
    let lower = evidence_summary.to_lowercase();
    let mut out: Vec<RequiredControl> = Vec::new();
    let mut index: HashMap<&'static str, usize> = HashMap::new();

    for rule in RULES {
        if !rule
            .triggers
            .iter()
            .any(|t| lower.contains(t) || signal_mentions(signal, t))
        {
            continue;
        }
        for (control, rationale) in rule.controls {
            match index.get(control) {
                Some(&pos) => out[pos].rationale = (*rationale).to_string(),
                None => {
                    index.insert(*control, out.len());
                    out.push(RequiredControl {
                        control: (*control).to_string(),
                        rationale: (*rationale).to_string(),
                    });
                }
            }
        }
    }
    out
}

fn signal_mentions(signal: &EvidenceSignal, trigger: &str) -> bool {
    signal.event_ids.contains_key(trigger) || signal.keyword_counts.contains_key(trigger)
}

pub fn render_required_controls(controls: &[RequiredControl]) -> String {
    if controls.is_empty() {
        return "- (none derived from evidence)".to_string();
    }
    controls
        .iter()
        .map(|c| format!("- {}: {}", c.control, c.rationale))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_triggers_no_controls() {
        assert!(extract_required_controls("quiet week, nothing notable", &EvidenceSignal::default()).is_empty());
    }

    #[test]
    fn later_rule_overwrites_rationale_in_place() {
        let out = extract_required_controls("4625 then brute force", &EvidenceSignal::default());
        assert_eq!(out[0].control, "Account lockout threshold");
        assert!(out[0].rationale.starts_with("Guessing attacks"));
    }

    #[test]
    fn signal_alone_triggers_rules() {
        let mut signal = EvidenceSignal::default();
        signal.event_ids.insert("4625".to_string(), 3);
        signal.keyword_counts.insert("invalid user".to_string(), 1);
        let out = extract_required_controls("Several events from one host.", &signal);
        let names: Vec<&str> = out.iter().map(|c| c.control.as_str()).collect();
        assert_eq!(names, vec!["Account lockout threshold", "Failed logon alerting"]);
    }
}
