//! Prompt text for each oracle-backed stage. Every prompt that expects
//! structured output asks for JSON only; responses still go through
//! `oracle::normalize`.

use serde_json::json;

use crate::documents::model::Snippet;
use crate::error::CoreResult;
use crate::run::state::Gap;

pub fn analyze_evidence(logs_text: &str, row_cap: usize) -> String {
    format!(
        "You are a cyber analyst. Summarize indicators from the Windows/OpenSSH logs.\n\
Focus on:\n\
- Event IDs (e.g., 4625), timestamps, source IPs, target accounts\n\
- Count of failures per IP/account, any lockouts, and brute-force indicators\n\
- Support the summary with specific rows/fields you see\n\
\n\
Logs (truncated to {row_cap} rows):\n\
{logs_text}\n"
    )
}

pub fn select_policies(
    threat: &str,
    evidence_summary: &str,
    candidates: &[String],
    max_choices: usize,
) -> String {
    let listed = candidates
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Given this threat and evidence, pick up to {max_choices} most relevant policy documents \
(by file path) to review first.\n\
Return a JSON array of strings (file paths), no commentary.\n\
\n\
Threat:\n{threat}\n\
\n\
Evidence summary:\n{evidence_summary}\n\
\n\
Candidate policy files:\n{listed}\n"
    )
}

pub fn summarize_policy(source: &str, snippets: &[Snippet], max_chars: usize) -> String {
    let body = snippets
        .iter()
        .map(|s| {
            format!(
                "[{} p.{} lines {}-{}]\n{}",
                s.source,
                s.page.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                s.line_start,
                s.line_end,
                truncate_chars(&s.text, max_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "As an IT auditor, list controls in {source} relevant to user accounts, authentication, \
password policy, lockout thresholds, monitoring/alerting, SSH/RDP hardening, and brute-force \
mitigation. Use only the excerpts below.\n\
\n\
Excerpts:\n{body}\n"
    )
}

fn snippet_context(snippets: &[Snippet], max_chars: usize) -> Vec<serde_json::Value> {
    snippets
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| {
            json!({
                "source": s.source,
                "page": s.page,
                "line_start": s.line_start,
                "line_end": s.line_end,
                "text": truncate_chars(&s.text, max_chars),
            })
        })
        .collect()
}

pub fn compare_snippets(
    baseline: &[Snippet],
    target: &[Snippet],
    required_controls: &str,
    signals: &str,
    max_chars: usize,
) -> CoreResult<String> {
    let context = json!({
        "baseline_snippets": snippet_context(baseline, max_chars),
        "target_snippets": snippet_context(target, max_chars),
    });
    Ok(format!(
        "You are an auditor. Compare Baseline (Policy A) vs Target (Policy B). \
Use ONLY the provided snippets; do not invent citations. \
Return a JSON list of gaps; each gap has: \
{{\"gap\", \"why\", \"remediation\", \
\"cis_refs\": [{{source, page, line_start, line_end, quote}}], \
\"pan_refs\": [{{source, page, line_start, line_end, quote}}]}}. \
Copy 'quote' verbatim from the snippet text you used. \
Leave pan_refs empty when the target lacks the control.\n\
\n\
Controls the evidence suggests are required:\n{required_controls}\n\
\n\
Evidence indicators:\n{signals}\n\
\n\
SNIPPETS JSON:\n{}\n\
\n\
Return JSON only.",
        serde_json::to_string(&context)?
    ))
}

pub fn compare_summaries(
    baseline_key: &str,
    baseline_summary: &str,
    target_key: &str,
    target_summary: &str,
    required_controls: &str,
) -> String {
    format!(
        "You are an auditor. Compare the two policy summaries below and produce a list of concrete gaps \
(\"Gaps in Policy B\" vs the Policy A baseline). For each gap, include:\n\
- gap: short title\n\
- why: 1-2 sentence risk rationale\n\
- remediation: specific, actionable fix\n\
- refs: object with both policy_a and policy_b arrays of citations, \
each {{\"line_hint\": <short quote or clause you relied on>}}\n\
Return ONLY valid JSON as an array of gap objects (no prose).\n\
\n\
Use short verbatim quotes for line_hint so they can be found in the full text. \
If Policy B is missing a control, leave policy_b empty.\n\
\n\
Controls the evidence suggests are required:\n{required_controls}\n\
\n\
=== BASELINE POLICY (baseline: {baseline_key}) SUMMARY ===\n{baseline_summary}\n\
\n\
=== CURRENT POLICY (target: {target_key}) SUMMARY ===\n{target_summary}\n"
    )
}

pub fn validate_against_evidence(gaps: &[Gap], evidence_summary: &str) -> CoreResult<String> {
    Ok(format!(
        "You are a cyber incident investigator.\n\
Given the structured gaps (JSON) and the evidence summary, return a JSON array.\n\
For each gap, include:\n\
- gap\n\
- evidence_linkage: 1-2 sentences citing concrete indicators (event IDs, timestamps, IPs, accounts)\n\
- likely_impact: short phrase\n\
- confidence: low/medium/high\n\
\n\
Return ONLY valid JSON (no prose).\n\
\n\
Structured Gaps JSON:\n{}\n\
\n\
Evidence Summary:\n{evidence_summary}\n",
        serde_json::to_string(gaps)?
    ))
}

pub struct ReportInputs<'a> {
    pub threat: &'a str,
    pub evidence_summary: &'a str,
    pub policies: &'a [String],
    pub gaps: &'a str,
    pub linkage: &'a str,
    pub citations: &'a str,
}

pub fn finalize_report(inputs: &ReportInputs<'_>) -> String {
    let policies = inputs
        .policies
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Create a post-incident review report (markdown):\n\
\n\
1) Threat (one short paragraph)\n\
2) Evidence Highlights (bullet list with concrete indicators)\n\
3) Policies Consulted (list)\n\
4) Gaps Identified (clear bullets; keep it short; mark unverified gaps)\n\
5) Gap to Evidence Linkage (compact bullets)\n\
6) Actionable Recommendations (prioritized: quick wins then longer-term)\n\
7) Policy Line Citations (per gap, the line numbers relied on)\n\
\n\
Use the provided content faithfully. Do not invent citations.\n\
\n\
Threat:\n{}\n\
\n\
Evidence Summary:\n{}\n\
\n\
Policies Consulted:\n{policies}\n\
\n\
Gaps:\n{}\n\
\n\
Gap to Evidence Linkage:\n{}\n\
\n\
Policy Line Citations (pre-rendered):\n{}\n",
        inputs.threat, inputs.evidence_summary, inputs.gaps, inputs.linkage, inputs.citations
    )
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
