pub mod evidence;
pub mod gap_analysis;
pub mod policy;
pub mod prompts;

use serde_json::json;
use std::time::Instant;
use tracing::{debug, warn};

use crate::audit::log::RunJournal;
use crate::citations::resolver::ResolveParams;
use crate::determinism::run_id::sha256_hex;
use crate::documents::extract::DocumentExtractor;
use crate::documents::windower::WindowParams;
use crate::error::CoreResult;
use crate::evidence::logs::LogLoader;
use crate::oracle::interface::{classify_oracle_error, Oracle};
use crate::run::config::RunConfig;
use crate::run::state::PipelineState;

/// Tunables the stages read; derived once from `RunConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    pub window: WindowParams,
    pub retrieval_top_k: usize,
    pub resolve: ResolveParams,
    pub snippet_prompt_chars: usize,
    pub log_row_cap: usize,
}

impl StageSettings {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            window: cfg.window,
            retrieval_top_k: cfg.retrieval_top_k,
            resolve: cfg.resolve_params(),
            snippet_prompt_chars: cfg.snippet_prompt_chars,
            log_row_cap: cfg.log_row_cap,
        }
    }
}

/// Collaborators and the run journal, lent to one stage at a time.
pub struct StageContext<'a> {
    pub oracle: &'a dyn Oracle,
    pub extractor: &'a dyn DocumentExtractor,
    pub log_loader: &'a dyn LogLoader,
    pub settings: StageSettings,
    pub journal: RunJournal,
    stage: &'static str,
}

impl<'a> StageContext<'a> {
    pub fn new(
        oracle: &'a dyn Oracle,
        extractor: &'a dyn DocumentExtractor,
        log_loader: &'a dyn LogLoader,
        settings: StageSettings,
        journal: RunJournal,
    ) -> Self {
        Self {
            oracle,
            extractor,
            log_loader,
            settings,
            journal,
            stage: "not_started",
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn enter(&mut self, stage: &'static str) {
        self.stage = stage;
    }

    /// One blocking oracle round trip, journaled by prompt/response hash.
    /// No retry: a failed call fails the stage.
    pub fn ask(&mut self, prompt: &str) -> CoreResult<String> {
        let prompt_sha256 = sha256_hex(prompt.as_bytes());
        let started = Instant::now();
        match self.oracle.complete(prompt) {
            Ok(response) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                debug!(
                    stage = self.stage,
                    oracle = %self.oracle.describe(),
                    prompt_chars = prompt.len(),
                    response_chars = response.len(),
                    duration_ms,
                    "oracle call completed"
                );
                self.journal.record(
                    "ORACLE_CALL_COMPLETED",
                    json!({
                        "stage": self.stage,
                        "prompt_sha256": prompt_sha256,
                        "response_sha256": sha256_hex(response.as_bytes()),
                        "duration_ms": duration_ms,
                    }),
                )?;
                Ok(response)
            }
            Err(e) => {
                let class = classify_oracle_error(&e.to_string());
                warn!(stage = self.stage, category = %class.category, error = %e, "oracle call failed");
                self.journal.record(
                    "ORACLE_CALL_FAILED",
                    json!({
                        "stage": self.stage,
                        "prompt_sha256": prompt_sha256,
                        "error_category": class.category,
                    }),
                )?;
                Err(e)
            }
        }
    }

    pub fn note_document_skipped(&mut self, source: &str, reason: &str) -> CoreResult<()> {
        warn!(stage = self.stage, source, reason, "document skipped");
        self.journal.record(
            "DOCUMENT_SKIPPED",
            json!({ "source": source, "reason": reason }),
        )
    }
}

/// What a stage hands back to the orchestrator.
#[derive(Debug)]
pub enum StageOutput {
    /// New state plus the names of the fields this stage populated.
    Wrote {
        state: Box<PipelineState>,
        fields: &'static [&'static str],
    },
    /// Required state was already present; nothing recomputed.
    Skipped { reason: String },
}

impl StageOutput {
    pub fn wrote(state: PipelineState, fields: &'static [&'static str]) -> Self {
        StageOutput::Wrote {
            state: Box::new(state),
            fields,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        StageOutput::Skipped {
            reason: reason.into(),
        }
    }
}

pub type StageFn = fn(&PipelineState, &mut StageContext<'_>) -> CoreResult<StageOutput>;
