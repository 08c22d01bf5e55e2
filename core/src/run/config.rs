use crate::citations::resolver::ResolveParams;
use crate::determinism::json_canonical::to_canonical_bytes;
use crate::determinism::run_id::{run_id_from_fingerprint_hex32, sha256_hex};
use crate::documents::windower::WindowParams;
use crate::error::{CoreError, CoreResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

/// Caller-supplied description of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub threat: String,
    #[serde(default = "default_log_glob")]
    pub log_glob: String,
    pub policy_paths: Vec<String>,
    #[serde(default)]
    pub selected_policy_paths: Option<Vec<String>>,
    #[serde(default = "default_max_policy_choices")]
    pub max_policy_choices: usize,
    #[serde(default)]
    pub window: WindowParams,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "default_fuzzy_cutoff")]
    pub fuzzy_cutoff: f64,
    #[serde(default = "default_max_fuzzy_candidates")]
    pub max_fuzzy_candidates: usize,
    #[serde(default = "default_snippet_prompt_chars")]
    pub snippet_prompt_chars: usize,
    #[serde(default = "default_log_row_cap")]
    pub log_row_cap: usize,
}

fn default_log_glob() -> String {
    "logs/*.csv".to_string()
}
fn default_max_policy_choices() -> usize {
    2
}
fn default_retrieval_top_k() -> usize {
    10
}
fn default_fuzzy_cutoff() -> f64 {
    0.80
}
fn default_max_fuzzy_candidates() -> usize {
    3
}
fn default_snippet_prompt_chars() -> usize {
    1200
}
fn default_log_row_cap() -> usize {
    500
}

impl RunConfig {
    pub fn new(threat: impl Into<String>, policy_paths: Vec<String>) -> Self {
        Self {
            threat: threat.into(),
            log_glob: default_log_glob(),
            policy_paths,
            selected_policy_paths: None,
            max_policy_choices: default_max_policy_choices(),
            window: WindowParams::default(),
            retrieval_top_k: default_retrieval_top_k(),
            fuzzy_cutoff: default_fuzzy_cutoff(),
            max_fuzzy_candidates: default_max_fuzzy_candidates(),
            snippet_prompt_chars: default_snippet_prompt_chars(),
            log_row_cap: default_log_row_cap(),
        }
    }

    pub fn from_json_str(s: &str) -> CoreResult<Self> {
        let cfg: RunConfig = serde_json::from_str(s).map_err(schema_error_from_serde)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> CoreResult<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.threat.trim().is_empty() {
            return Err(CoreError::schema("threat", "cannot be empty"));
        }
        if self.log_glob.trim().is_empty() {
            return Err(CoreError::schema("log_glob", "cannot be empty"));
        }
        if self.policy_paths.is_empty() {
            return Err(CoreError::schema("policy_paths", "at least one policy path is required"));
        }
        if let Some(idx) = self.policy_paths.iter().position(|p| p.trim().is_empty()) {
            return Err(CoreError::schema(
                format!("policy_paths[{idx}]"),
                "cannot be empty",
            ));
        }
        if let Some(sel) = &self.selected_policy_paths {
            if sel.len() < 2 {
                return Err(CoreError::schema(
                    "selected_policy_paths",
                    "a preselection must name at least two policies",
                ));
            }
            if sel[0] == sel[1] {
                return Err(CoreError::schema(
                    "selected_policy_paths",
                    "baseline and target must differ",
                ));
            }
        }
        if self.max_policy_choices == 0 {
            return Err(CoreError::schema("max_policy_choices", "must be at least 1"));
        }
        if self.window.window_chars == 0 {
            return Err(CoreError::schema("window.window_chars", "must be positive"));
        }
        if self.retrieval_top_k == 0 {
            return Err(CoreError::schema("retrieval_top_k", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_cutoff) {
            return Err(CoreError::schema("fuzzy_cutoff", "must be within [0, 1]"));
        }
        Ok(())
    }

    /// SHA-256 over the canonical JSON of the inputs that identify a run.
    /// Tunables are left out; two runs over the same threat, logs and
    /// policies share a fingerprint.
    pub fn fingerprint_hex(&self) -> CoreResult<String> {
        let identity = json!({
            "threat": self.threat,
            "log_glob": self.log_glob,
            "policy_paths": self.policy_paths,
            "selected_policy_paths": self.selected_policy_paths,
            "max_policy_choices": self.max_policy_choices,
        });
        Ok(sha256_hex(&to_canonical_bytes(&identity)?))
    }

    /// Run id derived from `fingerprint_hex`, for replayed runs whose
    /// journals must line up across invocations.
    pub fn deterministic_run_id(&self) -> CoreResult<String> {
        run_id_from_fingerprint_hex32(&self.fingerprint_hex()?)
    }

    pub fn resolve_params(&self) -> ResolveParams {
        ResolveParams {
            max_candidates: self.max_fuzzy_candidates,
            cutoff: self.fuzzy_cutoff,
        }
    }
}

// serde reports `missing field `x`` / `unknown field `x``; anything else is
// attributed to the document root.
fn schema_error_from_serde(e: serde_json::Error) -> CoreError {
    let msg = e.to_string();
    let field = Regex::new(r"(?:missing|unknown) field `([^`]+)`")
        .ok()
        .and_then(|re| re.captures(&msg))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "<root>".to_string());
    CoreError::schema(field, msg)
}
