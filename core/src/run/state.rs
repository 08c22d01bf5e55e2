use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::citations::model::CitationRef;
use crate::documents::model::Snippet;
use crate::error::{CoreError, CoreResult};
use crate::evidence::heuristics::RequiredControl;
use crate::evidence::logs::LogTable;
use crate::evidence::signals::EvidenceSignal;
use crate::policy::index::PolicyIndex;
use crate::run::config::RunConfig;
use crate::run::selection::SelectionBasis;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidencePlan {
    pub need_windows_logs: bool,
    pub log_glob: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GapRefs {
    pub baseline: Vec<CitationRef>,
    pub target: Vec<CitationRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gap {
    pub title: String,
    pub rationale: String,
    pub remediation: String,
    pub refs: GapRefs,
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Oracle saw retrieved snippets; refs were verified against them.
    Snippets,
    /// Oracle saw summaries only; refs were located by the citation resolver.
    Summaries,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
    Unknown,
}

impl Confidence {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Confidence::Low,
            "medium" => Confidence::Medium,
            "high" => Confidence::High,
            _ => Confidence::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
            Confidence::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GapEvidenceLink {
    pub gap: String,
    pub evidence_linkage: String,
    pub likely_impact: String,
    pub confidence: Confidence,
}

/// Run state threaded through the stages. Inputs come from `RunConfig`;
/// every `Option` field is written by exactly one stage (or pre-seeded by the
/// caller) and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineState {
    // inputs
    pub threat: String,
    pub log_glob: String,
    pub policy_paths: Vec<String>,
    pub preselected_policy_paths: Option<Vec<String>>,
    pub max_policy_choices: usize,

    // plan_evidence
    pub evidence_plan: Option<EvidencePlan>,
    // load_logs
    pub logs: Option<LogTable>,
    pub logs_text: Option<String>,
    // analyze_evidence
    pub evidence_summary: Option<String>,
    pub evidence_signal: Option<EvidenceSignal>,
    pub required_controls: Option<Vec<RequiredControl>>,
    // index_policies
    pub policy_index: Option<PolicyIndex>,
    pub policy_texts: Option<BTreeMap<String, String>>,
    // select_policies
    pub selected_policy_paths: Option<Vec<String>>,
    // read_policies
    pub policy_control_summaries: Option<BTreeMap<String, String>>,
    pub policy_snippets: Option<BTreeMap<String, Vec<Snippet>>>,
    // compare_policies
    pub baseline_policy: Option<String>,
    pub target_policy: Option<String>,
    pub selection_basis: Option<SelectionBasis>,
    pub comparison_mode: Option<ComparisonMode>,
    pub policy_gaps_structured: Option<Vec<Gap>>,
    pub policy_gaps: Option<String>,
    // validate_against_evidence
    pub gaps_evidence_link_structured: Option<Vec<GapEvidenceLink>>,
    pub gaps_evidence_link: Option<String>,
    // finalize_report
    pub citations_block: Option<String>,
    pub final_report: Option<String>,
}

impl PipelineState {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            threat: cfg.threat.clone(),
            log_glob: cfg.log_glob.clone(),
            policy_paths: cfg.policy_paths.clone(),
            preselected_policy_paths: cfg.selected_policy_paths.clone(),
            selected_policy_paths: cfg.selected_policy_paths.clone(),
            max_policy_choices: cfg.max_policy_choices,
            ..Self::default()
        }
    }

    /// Inject an index and full texts built outside the run; the indexing
    /// stage then skips.
    pub fn with_prebuilt_policies(
        mut self,
        index: PolicyIndex,
        texts: BTreeMap<String, String>,
    ) -> Self {
        self.policy_index = Some(index);
        self.policy_texts = Some(texts);
        self
    }

    pub fn verified_gap_count(&self) -> usize {
        self.policy_gaps_structured
            .as_ref()
            .map(|gaps| gaps.iter().filter(|g| g.verified).count())
            .unwrap_or(0)
    }
}

pub fn require<'a, T>(slot: &'a Option<T>, stage: &str, field: &str) -> CoreResult<&'a T> {
    slot.as_ref()
        .ok_or_else(|| CoreError::missing_state(stage, field))
}

pub fn write_once<T>(slot: &mut Option<T>, value: T, stage: &str, field: &str) -> CoreResult<()> {
    if slot.is_some() {
        return Err(CoreError::PolicyBlocked(format!(
            "stage {stage} attempted to overwrite `{field}`"
        )));
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_once_refuses_to_clobber() {
        let mut slot = None;
        write_once(&mut slot, 1, "load_logs", "logs_text").unwrap();
        assert!(write_once(&mut slot, 2, "load_logs", "logs_text").is_err());
        assert_eq!(slot, Some(1));
    }

    #[test]
    fn require_names_the_missing_field() {
        let slot: Option<String> = None;
        let err = require(&slot, "compare_policies", "policy_snippets").unwrap_err();
        assert!(err.to_string().contains("policy_snippets"));
    }

    #[test]
    fn unknown_confidence_is_tolerated() {
        assert_eq!(Confidence::parse(" High "), Confidence::High);
        assert_eq!(Confidence::parse("certain"), Confidence::Unknown);
    }
}
