use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which rule decided the baseline/target pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionBasis {
    Preselected,
    NameMatched,
    FirstTwo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyPair {
    pub baseline: String,
    pub target: String,
    pub basis: SelectionBasis,
}

pub const BASELINE_NAME_MARKERS: &[&str] = &["CIS_Controls", "CIS"];
pub const TARGET_NAME_MARKERS: &[&str] = &["Pan User Account Policy", "Pan"];

/// Resolve baseline vs target from the available policy keys, trying in order:
/// the caller's preselection, recognizable names, then the first two keys.
pub fn resolve_policy_pair(
    preselected: Option<&[String]>,
    available: &[String],
) -> CoreResult<PolicyPair> {
    if let Some(pair) = preselected.and_then(|p| preselected_pair(p, available)) {
        return Ok(pair);
    }
    if let Some(pair) = name_matched_pair(available) {
        return Ok(pair);
    }
    match available {
        [baseline, target, ..] => {
            debug!(baseline = %baseline, target = %target, "policy pair from first two keys");
            Ok(PolicyPair {
                baseline: baseline.clone(),
                target: target.clone(),
                basis: SelectionBasis::FirstTwo,
            })
        }
        _ => Err(CoreError::InsufficientPolicies {
            available: available.len(),
        }),
    }
}

fn preselected_pair(preselected: &[String], available: &[String]) -> Option<PolicyPair> {
    let [baseline, target, ..] = preselected else {
        return None;
    };
    if baseline == target {
        return None;
    }
    if !available.contains(baseline) || !available.contains(target) {
        warn!(
            baseline = %baseline,
            target = %target,
            "preselected policies are not both available; falling back"
        );
        return None;
    }
    Some(PolicyPair {
        baseline: baseline.clone(),
        target: target.clone(),
        basis: SelectionBasis::Preselected,
    })
}

fn name_matched_pair(available: &[String]) -> Option<PolicyPair> {
    let find = |markers: &[&str], exclude: Option<&String>| {
        markers.iter().find_map(|m| {
            available
                .iter()
                .find(|k| k.contains(m) && Some(*k) != exclude)
        })
    };
    let baseline = find(BASELINE_NAME_MARKERS, None)?;
    let target = find(TARGET_NAME_MARKERS, Some(baseline))?;
    Some(PolicyPair {
        baseline: baseline.clone(),
        target: target.clone(),
        basis: SelectionBasis::NameMatched,
    })
}
