use crate::error::{CoreError, CoreResult};
use crate::oracle::interface::Oracle;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Deterministic oracle that replays canned responses in order and records
/// the prompts it was given.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: impl Into<String>) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(response.into());
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, prompt: &str) -> CoreResult<String> {
        let mut prompts = self
            .prompts
            .lock()
            .map_err(|_| CoreError::OracleFailed("scripted oracle poisoned".to_string()))?;
        prompts.push(prompt.to_string());
        let mut q = self
            .responses
            .lock()
            .map_err(|_| CoreError::OracleFailed("scripted oracle poisoned".to_string()))?;
        q.pop_front()
            .ok_or_else(|| CoreError::OracleFailed("scripted oracle exhausted".to_string()))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
