use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed oracle output: {reason}")]
    MalformedOracleOutput { reason: String, raw: String },

    #[error("insufficient policies to compare: {available} available, 2 required")]
    InsufficientPolicies { available: usize },

    #[error("document extraction failed for {source_key}: {reason}")]
    DocumentExtractionFailed { source_key: String, reason: String },

    #[error("schema validation failed for field `{field}`: {reason}")]
    SchemaValidationFailed { field: String, reason: String },

    #[error("stage {stage} requires `{field}` from an earlier stage")]
    MissingState { stage: String, field: String },

    #[error("oracle call failed: {0}")]
    OracleFailed(String),

    #[error("policy blocked: {0}")]
    PolicyBlocked(String),

    #[error("determinism violation: {0}")]
    DeterminismViolation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl CoreError {
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        CoreError::MalformedOracleOutput {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::SchemaValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_state(stage: impl Into<String>, field: impl Into<String>) -> Self {
        CoreError::MissingState {
            stage: stage.into(),
            field: field.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
