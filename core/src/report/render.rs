use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::citations::model::CitationRef;
use crate::determinism::json_canonical;
use crate::documents::model::Snippet;
use crate::error::CoreResult;
use crate::run::state::{Gap, GapEvidenceLink, PipelineState};

pub const MISSING_LABEL: &str = "missing";
pub const NOT_APPLICABLE_LABEL: &str = "n/a";

/// Sorted, de-duplicated line numbers cited by one side of a gap.
pub fn cited_lines(refs: &[CitationRef]) -> Vec<usize> {
    refs.iter()
        .flat_map(|r| r.line_numbers.iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Compress line numbers into ranges: `[12, 13, 14, 20]` -> `12–14; 20`.
pub fn format_line_ranges(lines: &[usize], empty_label: &str) -> String {
    let mut sorted = lines.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let Some((&first, rest)) = sorted.split_first() else {
        return empty_label.to_string();
    };

    let mut ranges: Vec<(usize, usize)> = vec![(first, first)];
    for &n in rest {
        match ranges.last_mut() {
            Some(last) if n == last.1 + 1 => last.1 = n,
            _ => ranges.push((n, n)),
        }
    }
    ranges
        .iter()
        .map(|(a, b)| {
            if a == b {
                a.to_string()
            } else {
                format!("{a}–{b}")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn verification_label(gap: &Gap) -> &'static str {
    if gap.verified {
        "verified"
    } else {
        "unverified"
    }
}

fn error_tags(gap: &Gap) -> String {
    let tags: BTreeSet<&str> = gap
        .refs
        .baseline
        .iter()
        .chain(gap.refs.target.iter())
        .filter_map(|r| r.verify_error.map(|e| e.as_str()))
        .collect();
    if tags.is_empty() {
        "-".to_string()
    } else {
        tags.into_iter().collect::<Vec<_>>().join(", ")
    }
}

fn title_or_placeholder(title: &str) -> &str {
    if title.trim().is_empty() {
        "(gap)"
    } else {
        title
    }
}

pub fn render_gap_bullets(gaps: &[Gap], baseline: &str, target: &str) -> String {
    let mut out = Vec::new();
    for gap in gaps {
        out.push(format!(
            "- **{}** ({}): {}",
            title_or_placeholder(&gap.title),
            verification_label(gap),
            gap.rationale
        ));
        out.push(format!("  - Remediation: {}", gap.remediation));
        out.push(format!(
            "  - Policy A ({}) lines: {}",
            baseline,
            format_line_ranges(&cited_lines(&gap.refs.baseline), NOT_APPLICABLE_LABEL)
        ));
        out.push(format!(
            "  - Policy B ({}) lines: {}",
            target,
            format_line_ranges(&cited_lines(&gap.refs.target), MISSING_LABEL)
        ));
    }
    out.join("\n")
}

pub fn render_linkage_bullets(links: &[GapEvidenceLink]) -> String {
    links
        .iter()
        .map(|l| {
            format!(
                "- **{}** -> {} | Impact: {} | Confidence: {}",
                title_or_placeholder(&l.gap),
                l.evidence_linkage,
                l.likely_impact,
                l.confidence.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// Hints are merged per line number so a line cited twice is listed once.
fn render_side_citations(refs: &[CitationRef]) -> Vec<String> {
    let mut merged: BTreeMap<usize, BTreeSet<&str>> = BTreeMap::new();
    for r in refs {
        for ln in &r.line_numbers {
            let hints = merged.entry(*ln).or_default();
            if !r.line_hint.is_empty() {
                hints.insert(r.line_hint.as_str());
            }
        }
    }
    if merged.is_empty() {
        return vec!["_none_".to_string()];
    }
    merged
        .into_iter()
        .map(|(ln, hints)| {
            let hints = if hints.is_empty() {
                "(no hint)".to_string()
            } else {
                hints.into_iter().collect::<Vec<_>>().join("; ")
            };
            format!("Line {ln}: {hints}")
        })
        .collect()
}

/// Per-gap citation listing handed to the report-writing prompt.
pub fn render_citations_block(gaps: &[Gap], baseline: &str, target: &str) -> String {
    if gaps.is_empty() {
        return "_No line citations were generated._".to_string();
    }
    let mut out = Vec::new();
    for gap in gaps {
        out.push(format!(
            "- **{}** [{}]",
            title_or_placeholder(&gap.title),
            verification_label(gap)
        ));
        out.push(format!("  - {baseline} refs:"));
        for line in render_side_citations(&gap.refs.baseline) {
            out.push(format!("    {line}"));
        }
        out.push(format!("  - {target} refs:"));
        for line in render_side_citations(&gap.refs.target) {
            out.push(format!("    {line}"));
        }
    }
    out.join("\n")
}

pub fn render_gap_table_markdown(gaps: &[Gap]) -> String {
    let mut out = Vec::new();
    out.push("| Gap | Baseline lines | Target lines | Status | Errors |".to_string());
    out.push("|---|---|---|---|---|".to_string());
    for gap in gaps {
        out.push(format!(
            "| {} | {} | {} | {} | {} |",
            title_or_placeholder(&gap.title).replace('|', "\\|"),
            format_line_ranges(&cited_lines(&gap.refs.baseline), NOT_APPLICABLE_LABEL),
            format_line_ranges(&cited_lines(&gap.refs.target), MISSING_LABEL),
            verification_label(gap),
            error_tags(gap)
        ));
    }
    out.join("\n")
}

pub fn render_report_markdown(state: &PipelineState) -> String {
    let baseline = state.baseline_policy.as_deref().unwrap_or("Policy A");
    let target = state.target_policy.as_deref().unwrap_or("Policy B");
    let gaps = state.policy_gaps_structured.as_deref().unwrap_or(&[]);

    let mut out = Vec::new();
    out.push("# Policy Gap Report".to_string());
    out.push("".to_string());
    out.push(format!("- Baseline: `{baseline}`"));
    out.push(format!("- Target: `{target}`"));
    out.push(format!(
        "- Gaps: {} ({} verified)",
        gaps.len(),
        state.verified_gap_count()
    ));
    out.push("".to_string());

    out.push("## Gap to Evidence Linkage".to_string());
    out.push("".to_string());
    match state.gaps_evidence_link.as_deref() {
        Some(links) if !links.trim().is_empty() => out.push(links.to_string()),
        _ => out.push("_No linkage recorded._".to_string()),
    }
    out.push("".to_string());

    out.push("## Citations".to_string());
    out.push("".to_string());
    if gaps.is_empty() {
        out.push("_No gaps identified._".to_string());
    } else {
        out.push(render_gap_table_markdown(gaps));
    }
    out.push("".to_string());

    if let Some(snippets) = &state.policy_snippets {
        out.push("## Retrieved Snippets".to_string());
        out.push("".to_string());
        for (source, list) in snippets {
            out.push(format!("- `{source}`: {}", list.len()));
        }
        out.push("".to_string());
    }

    out.push("## Report".to_string());
    out.push("".to_string());
    out.push(
        state
            .final_report
            .clone()
            .unwrap_or_else(|| "_Report not finalized._".to_string()),
    );
    out.push("".to_string());
    out.join("\n")
}

#[derive(Serialize)]
struct ReportView<'a> {
    final_report: Option<&'a str>,
    policy_gaps_structured: &'a [Gap],
    gaps_evidence_link: Option<&'a str>,
    baseline_policy: Option<&'a str>,
    target_policy: Option<&'a str>,
    policy_snippets: Option<&'a BTreeMap<String, Vec<Snippet>>>,
}

/// Canonical JSON of the renderer-facing fields.
pub fn render_report_json(state: &PipelineState) -> CoreResult<String> {
    let view = ReportView {
        final_report: state.final_report.as_deref(),
        policy_gaps_structured: state.policy_gaps_structured.as_deref().unwrap_or(&[]),
        gaps_evidence_link: state.gaps_evidence_link.as_deref(),
        baseline_policy: state.baseline_policy.as_deref(),
        target_policy: state.target_policy.as_deref(),
        policy_snippets: state.policy_snippets.as_ref(),
    };
    json_canonical::to_canonical_string(&view)
}
