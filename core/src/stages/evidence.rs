use tracing::{debug, info};

use super::{prompts, StageContext, StageOutput};
use crate::error::CoreResult;
use crate::evidence::heuristics::extract_required_controls;
use crate::evidence::logs::NO_LOGS_FOUND;
use crate::evidence::signals::derive_signals;
use crate::run::state::{require, write_once, EvidencePlan, PipelineState};

pub const PLAN_EVIDENCE: &str = "plan_evidence";
pub const LOAD_LOGS: &str = "load_logs";
pub const ANALYZE_EVIDENCE: &str = "analyze_evidence";

pub fn plan_evidence(state: &PipelineState, _ctx: &mut StageContext<'_>) -> CoreResult<StageOutput> {
    let plan = EvidencePlan {
        need_windows_logs: state.threat.to_lowercase().contains("windows")
            || state.threat.contains("4625"),
        log_glob: state.log_glob.clone(),
    };
    debug!(need_windows_logs = plan.need_windows_logs, log_glob = %plan.log_glob, "evidence plan");

    let mut next = state.clone();
    write_once(&mut next.evidence_plan, plan, PLAN_EVIDENCE, "evidence_plan")?;
    Ok(StageOutput::wrote(next, &["evidence_plan"]))
}

pub fn load_logs(state: &PipelineState, ctx: &mut StageContext<'_>) -> CoreResult<StageOutput> {
    let plan = require(&state.evidence_plan, LOAD_LOGS, "evidence_plan")?;
    let table = ctx.log_loader.load(&plan.log_glob)?;
    for skipped in &table.skipped {
        ctx.note_document_skipped(&skipped.path, &skipped.reason)?;
    }
    let logs_text = table.render_for_prompt(ctx.settings.log_row_cap);
    if table.is_empty() {
        info!(log_glob = %plan.log_glob, sentinel = NO_LOGS_FOUND, "no log rows loaded");
    } else {
        info!(rows = table.rows.len(), columns = table.columns.len(), "logs loaded");
    }

    let mut next = state.clone();
    write_once(&mut next.logs, table, LOAD_LOGS, "logs")?;
    write_once(&mut next.logs_text, logs_text, LOAD_LOGS, "logs_text")?;
    Ok(StageOutput::wrote(next, &["logs", "logs_text"]))
}

/// Oracle summary of the logs, plus the deterministic signals and required
/// controls derived from them.
pub fn analyze_evidence(state: &PipelineState, ctx: &mut StageContext<'_>) -> CoreResult<StageOutput> {
    let logs_text = require(&state.logs_text, ANALYZE_EVIDENCE, "logs_text")?;
    let prompt = prompts::analyze_evidence(logs_text, ctx.settings.log_row_cap);
    let summary = ctx.ask(&prompt)?;

    // Signals come from the raw rows when there are any; the summary is the
    // only evidence text otherwise.
    let signal_source = if logs_text == NO_LOGS_FOUND {
        summary.as_str()
    } else {
        logs_text.as_str()
    };
    let signal = derive_signals(signal_source)?;
    let controls = extract_required_controls(&summary, &signal);
    info!(
        event_ids = signal.event_ids.len(),
        ips = signal.ip_addresses.len(),
        auth_failures = signal.total_failures(),
        required_controls = controls.len(),
        "evidence analyzed"
    );

    let mut next = state.clone();
    write_once(&mut next.evidence_summary, summary, ANALYZE_EVIDENCE, "evidence_summary")?;
    write_once(&mut next.evidence_signal, signal, ANALYZE_EVIDENCE, "evidence_signal")?;
    write_once(&mut next.required_controls, controls, ANALYZE_EVIDENCE, "required_controls")?;
    Ok(StageOutput::wrote(
        next,
        &["evidence_summary", "evidence_signal", "required_controls"],
    ))
}
