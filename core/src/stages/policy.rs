use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{prompts, StageContext, StageOutput};
use crate::documents::model::ExtractedDocument;
use crate::error::{CoreError, CoreResult};
use crate::oracle::normalize::extract_json;
use crate::policy::index::PolicyIndex;
use crate::run::state::{require, write_once, PipelineState};

pub const INDEX_POLICIES: &str = "index_policies";
pub const SELECT_POLICIES: &str = "select_policies";
pub const READ_POLICIES: &str = "read_policies";

/// Extract and window every policy path. Documents that fail extraction are
/// skipped; a run with no usable document stops here.
///
/// Caller-supplied texts are windowed in place of extraction. A supplied
/// index without its texts cannot be completed and is rejected.
pub fn index_policies(state: &PipelineState, ctx: &mut StageContext<'_>) -> CoreResult<StageOutput> {
    match (&state.policy_index, &state.policy_texts) {
        (Some(_), Some(_)) => return Ok(StageOutput::skipped("policy index supplied by caller")),
        (Some(_), None) => return Err(CoreError::missing_state(INDEX_POLICIES, "policy_texts")),
        (None, Some(texts)) => {
            if texts.is_empty() {
                return Err(CoreError::InsufficientPolicies { available: 0 });
            }
            let docs: Vec<ExtractedDocument> = texts
                .iter()
                .map(|(source, text)| ExtractedDocument::from_text(source.as_str(), text.as_str()))
                .collect();
            let index = PolicyIndex::build(&docs, &ctx.settings.window);
            info!(documents = index.len(), "supplied policy texts indexed");
            let mut next = state.clone();
            write_once(&mut next.policy_index, index, INDEX_POLICIES, "policy_index")?;
            return Ok(StageOutput::wrote(next, &["policy_index"]));
        }
        (None, None) => {}
    }

    let mut docs: Vec<ExtractedDocument> = Vec::new();
    for path in &state.policy_paths {
        match ctx.extractor.extract(Path::new(path)) {
            Ok(doc) => docs.push(doc),
            Err(e) => ctx.note_document_skipped(path, &e.to_string())?,
        }
    }
    if docs.is_empty() {
        return Err(CoreError::InsufficientPolicies { available: 0 });
    }

    let index = PolicyIndex::build(&docs, &ctx.settings.window);
    for key in index.keys() {
        debug!(source = %key, snippets = index.snippets(&key).len(), "policy windowed");
    }
    let texts: BTreeMap<String, String> = docs
        .into_iter()
        .map(|doc| (doc.source, doc.text))
        .collect();
    info!(documents = index.len(), "policies indexed");

    let mut next = state.clone();
    write_once(&mut next.policy_index, index, INDEX_POLICIES, "policy_index")?;
    write_once(&mut next.policy_texts, texts, INDEX_POLICIES, "policy_texts")?;
    Ok(StageOutput::wrote(next, &["policy_index", "policy_texts"]))
}

/// Ask the oracle which policies to review, unless the caller already chose.
pub fn select_policies(state: &PipelineState, ctx: &mut StageContext<'_>) -> CoreResult<StageOutput> {
    if state
        .selected_policy_paths
        .as_ref()
        .map(|s| s.len() >= 2)
        .unwrap_or(false)
    {
        return Ok(StageOutput::skipped("policies preselected by caller"));
    }

    let texts = require(&state.policy_texts, SELECT_POLICIES, "policy_texts")?;
    let candidates: Vec<String> = texts.keys().cloned().collect();
    let max_k = state.max_policy_choices.max(1);
    let evidence_summary = state.evidence_summary.as_deref().unwrap_or("");
    let prompt = prompts::select_policies(&state.threat, evidence_summary, &candidates, max_k);
    let raw = ctx.ask(&prompt)?;

    let chosen = match parse_selection(&raw, &candidates, max_k) {
        Some(chosen) => chosen,
        None => {
            warn!("policy selection unusable; taking the first candidates");
            candidates.iter().take(max_k).cloned().collect()
        }
    };
    info!(selected = ?chosen, "policies selected");

    let mut next = state.clone();
    // A partial (single-entry) preselection is refined here rather than kept.
    next.selected_policy_paths = Some(chosen);
    Ok(StageOutput::wrote(next, &["selected_policy_paths"]))
}

// Non-arrays, unparseable text and arrays with no known path all yield None.
fn parse_selection(raw: &str, candidates: &[String], max_k: usize) -> Option<Vec<String>> {
    let Ok(Value::Array(items)) = extract_json(raw) else {
        return None;
    };
    let mut chosen: Vec<String> = Vec::new();
    for item in items {
        let Some(path) = item.as_str() else {
            continue;
        };
        let path = path.trim();
        if candidates.iter().any(|c| c == path) && !chosen.iter().any(|c| c == path) {
            chosen.push(path.to_string());
        }
    }
    chosen.truncate(max_k);
    if chosen.is_empty() {
        None
    } else {
        Some(chosen)
    }
}

/// Retrieve focus snippets per selected policy and have the oracle summarize
/// its controls. Selected paths missing from the index are skipped.
pub fn read_policies(state: &PipelineState, ctx: &mut StageContext<'_>) -> CoreResult<StageOutput> {
    let selected = require(&state.selected_policy_paths, READ_POLICIES, "selected_policy_paths")?;
    let index = require(&state.policy_index, READ_POLICIES, "policy_index")?;

    let mut summaries: BTreeMap<String, String> = BTreeMap::new();
    let mut snippets = BTreeMap::new();
    for path in selected {
        if !index.contains(path) {
            ctx.note_document_skipped(path, "selected policy is not indexed")?;
            continue;
        }
        let found = index.retrieve_with_fallback(path, ctx.settings.retrieval_top_k);
        debug!(source = %path, snippets = found.len(), "policy snippets retrieved");

        // With no keyword hits the summary is drawn from the opening windows.
        let context: Vec<_> = if found.is_empty() {
            index
                .snippets(path)
                .iter()
                .take(ctx.settings.retrieval_top_k)
                .cloned()
                .collect()
        } else {
            found.clone()
        };
        let prompt = prompts::summarize_policy(path, &context, ctx.settings.snippet_prompt_chars);
        summaries.insert(path.clone(), ctx.ask(&prompt)?);
        snippets.insert(path.clone(), found);
    }
    info!(policies = snippets.len(), "policies read");

    let mut next = state.clone();
    write_once(
        &mut next.policy_control_summaries,
        summaries,
        READ_POLICIES,
        "policy_control_summaries",
    )?;
    write_once(&mut next.policy_snippets, snippets, READ_POLICIES, "policy_snippets")?;
    Ok(StageOutput::wrote(
        next,
        &["policy_control_summaries", "policy_snippets"],
    ))
}
