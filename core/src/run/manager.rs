use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::audit::log::RunJournal;
use crate::determinism::run_id::{run_id_ulid, sha256_hex};
use crate::documents::extract::DocumentExtractor;
use crate::error::{CoreError, CoreResult};
use crate::evidence::logs::LogLoader;
use crate::oracle::interface::Oracle;
use crate::run::config::RunConfig;
use crate::run::state::PipelineState;
use crate::stages::{evidence, gap_analysis, policy, StageContext, StageFn, StageOutput, StageSettings};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    NotStarted,
    PlanEvidence,
    LoadLogs,
    AnalyzeEvidence,
    IndexPolicies,
    SelectPolicies,
    ReadPolicies,
    ComparePolicies,
    ValidateAgainstEvidence,
    FinalizeReport,
    Finalized,
    Failed,
}

pub const STAGE_ORDER: [RunStage; 9] = [
    RunStage::PlanEvidence,
    RunStage::LoadLogs,
    RunStage::AnalyzeEvidence,
    RunStage::IndexPolicies,
    RunStage::SelectPolicies,
    RunStage::ReadPolicies,
    RunStage::ComparePolicies,
    RunStage::ValidateAgainstEvidence,
    RunStage::FinalizeReport,
];

impl RunStage {
    pub fn name(&self) -> &'static str {
        match self {
            RunStage::NotStarted => "not_started",
            RunStage::PlanEvidence => evidence::PLAN_EVIDENCE,
            RunStage::LoadLogs => evidence::LOAD_LOGS,
            RunStage::AnalyzeEvidence => evidence::ANALYZE_EVIDENCE,
            RunStage::IndexPolicies => policy::INDEX_POLICIES,
            RunStage::SelectPolicies => policy::SELECT_POLICIES,
            RunStage::ReadPolicies => policy::READ_POLICIES,
            RunStage::ComparePolicies => gap_analysis::COMPARE_POLICIES,
            RunStage::ValidateAgainstEvidence => gap_analysis::VALIDATE_AGAINST_EVIDENCE,
            RunStage::FinalizeReport => gap_analysis::FINALIZE_REPORT,
            RunStage::Finalized => "finalized",
            RunStage::Failed => "failed",
        }
    }

    /// Successor in the fixed order; terminal states have none.
    pub fn next(&self) -> Option<RunStage> {
        match self {
            RunStage::NotStarted => Some(STAGE_ORDER[0]),
            RunStage::FinalizeReport => Some(RunStage::Finalized),
            RunStage::Finalized | RunStage::Failed => None,
            stage => STAGE_ORDER
                .iter()
                .position(|s| s == stage)
                .and_then(|idx| STAGE_ORDER.get(idx + 1))
                .copied(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Finalized | RunStage::Failed)
    }

    fn stage_fn(&self) -> Option<StageFn> {
        let f: StageFn = match self {
            RunStage::PlanEvidence => evidence::plan_evidence,
            RunStage::LoadLogs => evidence::load_logs,
            RunStage::AnalyzeEvidence => evidence::analyze_evidence,
            RunStage::IndexPolicies => policy::index_policies,
            RunStage::SelectPolicies => policy::select_policies,
            RunStage::ReadPolicies => policy::read_policies,
            RunStage::ComparePolicies => gap_analysis::compare_policies,
            RunStage::ValidateAgainstEvidence => gap_analysis::validate_against_evidence,
            RunStage::FinalizeReport => gap_analysis::finalize_report,
            RunStage::NotStarted | RunStage::Finalized | RunStage::Failed => return None,
        };
        Some(f)
    }
}

pub fn valid_transition(from: RunStage, to: RunStage) -> bool {
    if to == RunStage::Failed {
        return !from.is_terminal();
    }
    from.next() == Some(to)
}

#[derive(Debug)]
pub struct RunOutcome {
    pub state: PipelineState,
    pub journal: RunJournal,
}

/// A halted run: the error, the stage it came from, and everything written
/// up to that point.
#[derive(Debug, Error)]
#[error("stage {} failed: {error}", .stage.name())]
pub struct RunFailure {
    #[source]
    pub error: CoreError,
    pub stage: RunStage,
    pub state: Box<PipelineState>,
    pub journal: RunJournal,
}

/// Drives the nine stages in order over one `PipelineState`. Fail-fast: the
/// first stage error ends the run.
pub struct PipelineRunner<'a> {
    oracle: &'a dyn Oracle,
    extractor: &'a dyn DocumentExtractor,
    log_loader: &'a dyn LogLoader,
    settings: StageSettings,
    run_id: Option<String>,
}

impl<'a> PipelineRunner<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        extractor: &'a dyn DocumentExtractor,
        log_loader: &'a dyn LogLoader,
        cfg: &RunConfig,
    ) -> Self {
        Self {
            oracle,
            extractor,
            log_loader,
            settings: StageSettings::from_config(cfg),
            run_id: None,
        }
    }

    /// Journal under a fixed run id instead of a fresh ULID.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Validate `cfg` and run it from a fresh state. Schema errors surface
    /// before any stage starts.
    pub fn run_config(&self, cfg: &RunConfig) -> CoreResult<Result<RunOutcome, RunFailure>> {
        cfg.validate()?;
        Ok(self.run(PipelineState::from_config(cfg)))
    }

    pub fn run(&self, initial: PipelineState) -> Result<RunOutcome, RunFailure> {
        let run_id = self.run_id.clone().unwrap_or_else(run_id_ulid);
        let journal = RunJournal::new(run_id);
        let mut ctx = StageContext::new(
            self.oracle,
            self.extractor,
            self.log_loader,
            self.settings.clone(),
            journal,
        );
        let mut state = initial;
        let mut stage = RunStage::NotStarted;

        match drive(&mut ctx, &mut state, &mut stage) {
            Ok(()) => Ok(RunOutcome {
                state,
                journal: ctx.journal,
            }),
            Err(e) => {
                error!(stage = stage.name(), error = %e, "run failed");
                let failed_at = stage;
                if let Err(journal_err) = ctx.journal.record(
                    "STAGE_FAILED",
                    json!({ "stage": failed_at.name(), "error": e.to_string() }),
                ) {
                    error!(error = %journal_err, "could not journal stage failure");
                }
                if valid_transition(stage, RunStage::Failed) {
                    stage = RunStage::Failed;
                }
                info!(final_stage = stage.name(), "run halted");
                Err(RunFailure {
                    error: e,
                    stage: failed_at,
                    state: Box::new(state),
                    journal: ctx.journal,
                })
            }
        }
    }
}

fn transition(current: &mut RunStage, to: RunStage) -> CoreResult<()> {
    if !valid_transition(*current, to) {
        return Err(CoreError::PolicyBlocked(format!(
            "invalid run stage transition {:?} -> {:?}",
            current, to
        )));
    }
    *current = to;
    Ok(())
}

fn drive(ctx: &mut StageContext<'_>, state: &mut PipelineState, stage: &mut RunStage) -> CoreResult<()> {
    ctx.journal.record(
        "RUN_STARTED",
        json!({
            "threat_sha256": sha256_hex(state.threat.as_bytes()),
            "policy_count": state.policy_paths.len(),
            "log_glob": state.log_glob,
        }),
    )?;
    info!(run_id = %ctx.journal.run_id(), policies = state.policy_paths.len(), "run started");

    for next in STAGE_ORDER {
        transition(stage, next)?;
        let Some(run_stage) = next.stage_fn() else {
            continue;
        };
        ctx.enter(next.name());
        info!(stage = next.name(), "stage started");
        ctx.journal
            .record("STAGE_STARTED", json!({ "stage": next.name() }))?;

        match run_stage(state, ctx)? {
            StageOutput::Wrote { state: written, fields } => {
                *state = *written;
                info!(stage = next.name(), fields = ?fields, "stage completed");
                ctx.journal.record(
                    "STAGE_COMPLETED",
                    json!({ "stage": next.name(), "fields_written": fields }),
                )?;
            }
            StageOutput::Skipped { reason } => {
                info!(stage = next.name(), reason = %reason, "stage skipped");
                ctx.journal.record(
                    "STAGE_SKIPPED",
                    json!({ "stage": next.name(), "reason": reason }),
                )?;
            }
        }
    }

    transition(stage, RunStage::Finalized)?;
    let gap_count = state
        .policy_gaps_structured
        .as_ref()
        .map(Vec::len)
        .unwrap_or(0);
    let verified = state.verified_gap_count();
    ctx.journal.record(
        "RUN_FINALIZED",
        json!({ "gap_count": gap_count, "verified_gap_count": verified }),
    )?;
    info!(gaps = gap_count, verified, "run finalized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{valid_transition, RunStage, STAGE_ORDER};

    #[test]
    fn state_machine_blocks_invalid_edges() {
        assert!(valid_transition(RunStage::NotStarted, RunStage::PlanEvidence));
        assert!(valid_transition(RunStage::FinalizeReport, RunStage::Finalized));
        assert!(valid_transition(RunStage::ReadPolicies, RunStage::Failed));
        assert!(!valid_transition(RunStage::NotStarted, RunStage::ComparePolicies));
        assert!(!valid_transition(RunStage::LoadLogs, RunStage::PlanEvidence));
        assert!(!valid_transition(RunStage::Finalized, RunStage::Failed));
        assert!(!valid_transition(RunStage::Failed, RunStage::PlanEvidence));
    }

    #[test]
    fn order_is_a_single_chain() {
        let mut stage = RunStage::NotStarted;
        let mut seen = Vec::new();
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(stage, RunStage::Finalized);
        assert_eq!(&seen[..9], &STAGE_ORDER[..]);
    }
}
