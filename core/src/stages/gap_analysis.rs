use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{prompts, StageContext, StageOutput};
use crate::citations::model::{claimed_refs_from_value, CitationRef};
use crate::citations::resolver::attach_lines;
use crate::citations::verifier::verify_refs;
use crate::documents::model::Snippet;
use crate::documents::numbered::NumberedCache;
use crate::error::CoreResult;
use crate::evidence::heuristics::render_required_controls;
use crate::oracle::normalize::extract_json_array;
use crate::report::render::{render_citations_block, render_gap_bullets, render_linkage_bullets};
use crate::run::selection::resolve_policy_pair;
use crate::run::state::{
    require, write_once, ComparisonMode, Confidence, Gap, GapEvidenceLink, GapRefs, PipelineState,
};

pub const COMPARE_POLICIES: &str = "compare_policies";
pub const VALIDATE_AGAINST_EVIDENCE: &str = "validate_against_evidence";
pub const FINALIZE_REPORT: &str = "finalize_report";

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Pick baseline and target, then have the oracle list the target's gaps.
///
/// With snippets on both sides the oracle sees only those snippets and every
/// claimed ref is verified against them. Otherwise the oracle compares the
/// summaries and line hints are located in the full text.
pub fn compare_policies(state: &PipelineState, ctx: &mut StageContext<'_>) -> CoreResult<StageOutput> {
    let snippets = require(&state.policy_snippets, COMPARE_POLICIES, "policy_snippets")?;
    let summaries = require(
        &state.policy_control_summaries,
        COMPARE_POLICIES,
        "policy_control_summaries",
    )?;
    let selected = require(
        &state.selected_policy_paths,
        COMPARE_POLICIES,
        "selected_policy_paths",
    )?;

    let available: Vec<String> = selected
        .iter()
        .filter(|p| snippets.contains_key(*p) || summaries.contains_key(*p))
        .cloned()
        .collect();
    let pair = resolve_policy_pair(state.preselected_policy_paths.as_deref(), &available)?;
    let baseline_snips = snippets.get(&pair.baseline).map(Vec::as_slice).unwrap_or(&[]);
    let target_snips = snippets.get(&pair.target).map(Vec::as_slice).unwrap_or(&[]);
    debug!(
        baseline = %pair.baseline,
        target = %pair.target,
        basis = ?pair.basis,
        baseline_snippets = baseline_snips.len(),
        target_snippets = target_snips.len(),
        "comparison pair"
    );

    let required = render_required_controls(state.required_controls.as_deref().unwrap_or(&[]));
    let (mode, gaps) = if !baseline_snips.is_empty() && !target_snips.is_empty() {
        let signals = state
            .evidence_signal
            .as_ref()
            .map(|s| s.render())
            .unwrap_or_default();
        let prompt = prompts::compare_snippets(
            baseline_snips,
            target_snips,
            &required,
            &signals,
            ctx.settings.snippet_prompt_chars,
        )?;
        let raw = ctx.ask(&prompt)?;
        let items = extract_json_array(&raw)?;
        (
            ComparisonMode::Snippets,
            gaps_from_snippets(&items, baseline_snips, target_snips),
        )
    } else {
        let texts = require(&state.policy_texts, COMPARE_POLICIES, "policy_texts")?;
        let prompt = prompts::compare_summaries(
            &pair.baseline,
            summaries.get(&pair.baseline).map(String::as_str).unwrap_or("N/A"),
            &pair.target,
            summaries.get(&pair.target).map(String::as_str).unwrap_or("N/A"),
            &required,
        );
        let raw = ctx.ask(&prompt)?;
        let items = extract_json_array(&raw)?;
        let numbered = NumberedCache::build(
            texts
                .iter()
                .filter(|(k, _)| **k == pair.baseline || **k == pair.target),
        );
        let gaps = items
            .iter()
            .map(|item| {
                let refs = item.get("refs");
                let baseline = attach_lines(
                    numbered.lines(&pair.baseline),
                    &line_hints(refs.and_then(|r| r.get("policy_a"))),
                    &ctx.settings.resolve,
                );
                let target = attach_lines(
                    numbered.lines(&pair.target),
                    &line_hints(refs.and_then(|r| r.get("policy_b"))),
                    &ctx.settings.resolve,
                );
                // No snippet backs a summary citation, so any quoted hint
                // leaves the gap unverified.
                let verified = baseline
                    .iter()
                    .chain(target.iter())
                    .all(|r| r.line_hint.is_empty());
                Gap {
                    title: str_field(item, "gap"),
                    rationale: str_field(item, "why"),
                    remediation: str_field(item, "remediation"),
                    refs: GapRefs { baseline, target },
                    verified,
                }
            })
            .collect();
        (ComparisonMode::Summaries, gaps)
    };

    for gap in &gaps {
        record_unverified(ctx, gap, "baseline", &gap.refs.baseline)?;
        record_unverified(ctx, gap, "target", &gap.refs.target)?;
    }
    let bullets = render_gap_bullets(&gaps, &pair.baseline, &pair.target);
    info!(
        mode = ?mode,
        gaps = gaps.len(),
        verified = gaps.iter().filter(|g| g.verified).count(),
        "policies compared"
    );

    let mut next = state.clone();
    write_once(&mut next.baseline_policy, pair.baseline, COMPARE_POLICIES, "baseline_policy")?;
    write_once(&mut next.target_policy, pair.target, COMPARE_POLICIES, "target_policy")?;
    write_once(&mut next.selection_basis, pair.basis, COMPARE_POLICIES, "selection_basis")?;
    write_once(&mut next.comparison_mode, mode, COMPARE_POLICIES, "comparison_mode")?;
    write_once(
        &mut next.policy_gaps_structured,
        gaps,
        COMPARE_POLICIES,
        "policy_gaps_structured",
    )?;
    write_once(&mut next.policy_gaps, bullets, COMPARE_POLICIES, "policy_gaps")?;
    Ok(StageOutput::wrote(
        next,
        &[
            "baseline_policy",
            "target_policy",
            "selection_basis",
            "comparison_mode",
            "policy_gaps_structured",
            "policy_gaps",
        ],
    ))
}

fn gaps_from_snippets(items: &[Value], baseline: &[Snippet], target: &[Snippet]) -> Vec<Gap> {
    items
        .iter()
        .map(|item| {
            let a = verify_refs(&claimed_refs_from_value(item.get("cis_refs")), baseline);
            let b = verify_refs(&claimed_refs_from_value(item.get("pan_refs")), target);
            Gap {
                title: str_field(item, "gap"),
                rationale: str_field(item, "why"),
                remediation: str_field(item, "remediation"),
                refs: GapRefs {
                    baseline: a.refs,
                    target: b.refs,
                },
                verified: a.all_verified && b.all_verified,
            }
        })
        .collect()
}

// Hints arrive as `{"line_hint": ".."}` objects or bare strings.
fn line_hints(refs: Option<&Value>) -> Vec<String> {
    refs.and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|r| match r {
                    Value::String(s) => s.trim().to_string(),
                    other => str_field(other, "line_hint"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn record_unverified(
    ctx: &mut StageContext<'_>,
    gap: &Gap,
    side: &str,
    refs: &[CitationRef],
) -> CoreResult<()> {
    for r in refs {
        if let Some(err) = r.verify_error {
            warn!(gap = %gap.title, side, error = err.as_str(), "citation unverified");
            ctx.journal.record(
                "CITATION_UNVERIFIED",
                json!({ "gap": gap.title, "side": side, "error": err.as_str() }),
            )?;
        }
    }
    Ok(())
}

/// Link every gap to the evidence summary through the oracle.
pub fn validate_against_evidence(
    state: &PipelineState,
    ctx: &mut StageContext<'_>,
) -> CoreResult<StageOutput> {
    let gaps = require(
        &state.policy_gaps_structured,
        VALIDATE_AGAINST_EVIDENCE,
        "policy_gaps_structured",
    )?;
    let evidence = require(
        &state.evidence_summary,
        VALIDATE_AGAINST_EVIDENCE,
        "evidence_summary",
    )?;

    let links: Vec<GapEvidenceLink> = if gaps.is_empty() {
        debug!("no gaps to link; skipping oracle call");
        Vec::new()
    } else {
        let prompt = prompts::validate_against_evidence(gaps, evidence)?;
        let raw = ctx.ask(&prompt)?;
        extract_json_array(&raw)?
            .iter()
            .map(|item| GapEvidenceLink {
                gap: str_field(item, "gap"),
                evidence_linkage: str_field(item, "evidence_linkage"),
                likely_impact: str_field(item, "likely_impact"),
                confidence: Confidence::parse(&str_field(item, "confidence")),
            })
            .collect()
    };
    let bullets = render_linkage_bullets(&links);
    info!(links = links.len(), "gaps linked to evidence");

    let mut next = state.clone();
    write_once(
        &mut next.gaps_evidence_link_structured,
        links,
        VALIDATE_AGAINST_EVIDENCE,
        "gaps_evidence_link_structured",
    )?;
    write_once(
        &mut next.gaps_evidence_link,
        bullets,
        VALIDATE_AGAINST_EVIDENCE,
        "gaps_evidence_link",
    )?;
    Ok(StageOutput::wrote(
        next,
        &["gaps_evidence_link_structured", "gaps_evidence_link"],
    ))
}

/// Render the citation block and have the oracle write the narrative report.
pub fn finalize_report(state: &PipelineState, ctx: &mut StageContext<'_>) -> CoreResult<StageOutput> {
    let gaps = require(
        &state.policy_gaps_structured,
        FINALIZE_REPORT,
        "policy_gaps_structured",
    )?;
    let baseline = require(&state.baseline_policy, FINALIZE_REPORT, "baseline_policy")?;
    let target = require(&state.target_policy, FINALIZE_REPORT, "target_policy")?;
    let gaps_text = require(&state.policy_gaps, FINALIZE_REPORT, "policy_gaps")?;
    let linkage = require(&state.gaps_evidence_link, FINALIZE_REPORT, "gaps_evidence_link")?;
    let evidence = require(&state.evidence_summary, FINALIZE_REPORT, "evidence_summary")?;
    let selected = require(
        &state.selected_policy_paths,
        FINALIZE_REPORT,
        "selected_policy_paths",
    )?;

    let citations = render_citations_block(gaps, baseline, target);
    let prompt = prompts::finalize_report(&prompts::ReportInputs {
        threat: &state.threat,
        evidence_summary: evidence,
        policies: selected,
        gaps: gaps_text,
        linkage,
        citations: &citations,
    });
    let report = ctx.ask(&prompt)?;
    info!(report_chars = report.len(), "report finalized");

    let mut next = state.clone();
    write_once(&mut next.citations_block, citations, FINALIZE_REPORT, "citations_block")?;
    write_once(&mut next.final_report, report, FINALIZE_REPORT, "final_report")?;
    Ok(StageOutput::wrote(next, &["citations_block", "final_report"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_accept_objects_and_strings() {
        let v = json!([{"line_hint": " lock after 5 "}, "missing", {"other": 1}]);
        assert_eq!(
            line_hints(Some(&v)),
            vec!["lock after 5".to_string(), "missing".to_string(), String::new()]
        );
        assert!(line_hints(None).is_empty());
    }

    #[test]
    fn snippet_gaps_keep_unmatched_refs_flagged() {
        let pool = vec![Snippet {
            source: "cis.txt".to_string(),
            page: Some(1),
            line_start: 1,
            line_end: 2,
            text: "Lock accounts after 5 failed attempts.".to_string(),
        }];
        let items = vec![json!({
            "gap": "No lockout",
            "why": "w",
            "remediation": "r",
            "cis_refs": [{"source": "cis.txt", "page": 1, "line_start": 1, "line_end": 3, "quote": "Lock"}],
            "pan_refs": []
        })];
        let gaps = gaps_from_snippets(&items, &pool, &[]);
        assert!(!gaps[0].verified);
        assert!(gaps[0].refs.baseline[0].line_numbers.is_empty());
    }
}
