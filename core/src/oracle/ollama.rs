use crate::error::{CoreError, CoreResult};
use crate::oracle::interface::{enforce_loopback_endpoint, Oracle};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://127.0.0.1:11434";

/// Blocking client for a local Ollama `/api/chat` endpoint. One round trip
/// per call, temperature 0, no retry.
pub struct OllamaOracle {
    endpoint: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaOracle {
    pub fn new(endpoint: &str, model: &str, timeout: Option<Duration>) -> CoreResult<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        enforce_loopback_endpoint(&endpoint)?;
        if model.trim().is_empty() {
            return Err(CoreError::InvalidInput("oracle model cannot be empty".to_string()));
        }
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CoreError::OracleFailed(format!("failed to build http client: {e}")))?;
        Ok(Self {
            endpoint,
            model: model.to_string(),
            client,
        })
    }
}

impl Oracle for OllamaOracle {
    fn complete(&self, prompt: &str) -> CoreResult<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = json!({
            "model": self.model,
            "stream": false,
            "messages": [{ "role": "user", "content": prompt }],
            "options": { "temperature": 0 }
        });
        debug!(url = %url, model = %self.model, prompt_chars = prompt.len(), "oracle request");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| CoreError::OracleFailed(format!("failed to reach {url}: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| CoreError::OracleFailed(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(CoreError::OracleFailed(format!(
                "oracle returned {status}: {text}"
            )));
        }
        let v: serde_json::Value = serde_json::from_str(&text)?;
        v.get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| CoreError::OracleFailed("response missing message.content".to_string()))
    }

    fn describe(&self) -> String {
        format!("ollama({}, {})", self.endpoint, self.model)
    }
}
