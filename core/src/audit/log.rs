use crate::audit::event::{compute_event_hash, finalize_event, JournalEvent, ZERO_HASH_64};
use crate::error::{CoreError, CoreResult};

/// In-memory, hash-chained record of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunJournal {
    run_id: String,
    events: Vec<JournalEvent>,
    last_hash: String,
}

impl RunJournal {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            events: Vec::new(),
            last_hash: ZERO_HASH_64.to_string(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn events(&self) -> &[JournalEvent] {
        &self.events
    }

    pub fn record(&mut self, event_type: &str, details: serde_json::Value) -> CoreResult<()> {
        let event = JournalEvent::new(event_type, &self.run_id, details);
        self.append(event).map(|_| ())
    }

    pub fn append(&mut self, mut event: JournalEvent) -> CoreResult<JournalEvent> {
        event.prev_event_hash = self.last_hash.clone();
        let event = finalize_event(event)?;
        self.last_hash = event.event_hash.clone();
        self.events.push(event.clone());
        Ok(event)
    }

    pub fn verify_chain(&self) -> CoreResult<()> {
        let mut prev = ZERO_HASH_64.to_string();
        for (idx, e) in self.events.iter().enumerate() {
            if e.prev_event_hash != prev {
                return Err(CoreError::DeterminismViolation(format!(
                    "journal event {idx} breaks the hash chain"
                )));
            }
            if compute_event_hash(e)? != e.event_hash {
                return Err(CoreError::DeterminismViolation(format!(
                    "journal event {idx} hash mismatch"
                )));
            }
            prev = e.event_hash.clone();
        }
        Ok(())
    }

    pub fn to_jsonl(&self) -> CoreResult<String> {
        let mut out = String::new();
        for e in &self.events {
            out.push_str(&serde_json::to_string(e)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn count_of(&self, event_type: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}
