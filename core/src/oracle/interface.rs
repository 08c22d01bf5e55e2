use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Text-completion dependency. Output is untrusted: structured claims must go
/// through `normalize::extract_json` and, for citations, the verifier.
pub trait Oracle {
    fn complete(&self, prompt: &str) -> CoreResult<String>;

    fn describe(&self) -> String {
        "oracle".to_string()
    }
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn complete(&self, prompt: &str) -> CoreResult<String> {
        (**self).complete(prompt)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn complete(&self, prompt: &str) -> CoreResult<String> {
        (**self).complete(prompt)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleErrorClass {
    pub category: String, // TIMEOUT|MODEL_NOT_FOUND|NOT_SUPPORTED|RUNTIME_ERROR
    pub code: String,
    pub retryable: bool,
}

/// Only IP-literal loopback hosts are accepted; `localhost` is rejected as a
/// name rather than resolved.
pub fn enforce_loopback_endpoint(endpoint: &str) -> CoreResult<()> {
    let url = url::Url::parse(endpoint)
        .map_err(|_| CoreError::InvalidInput("invalid oracle endpoint URL".to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| CoreError::InvalidInput("oracle endpoint missing host".to_string()))?;
    let ip: IpAddr = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|_| {
            CoreError::InvalidInput("oracle endpoint host must be an IP address".to_string())
        })?;
    if !ip.is_loopback() {
        return Err(CoreError::PolicyBlocked(
            "oracle endpoint rejected: not loopback (127.0.0.1/::1)".to_string(),
        ));
    }
    Ok(())
}

pub fn classify_oracle_error(err: &str) -> OracleErrorClass {
    let lower = err.to_lowercase();
    let (category, code, retryable) = if lower.contains("timeout") || lower.contains("timed out")
    {
        ("TIMEOUT", "ORACLE_TIMEOUT", true)
    } else if lower.contains("not found") {
        ("MODEL_NOT_FOUND", "MODEL_NOT_FOUND", false)
    } else if lower.contains("unsupported") {
        ("NOT_SUPPORTED", "NOT_SUPPORTED", false)
    } else {
        ("RUNTIME_ERROR", "RUNTIME_ERROR", false)
    };
    OracleErrorClass {
        category: category.to_string(),
        code: code.to_string(),
        retryable,
    }
}
