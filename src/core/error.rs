//! Errors that end a workflow execution.
//!
//! Every variant here is fatal: the decider turns it into a single
//! fail-workflow decision and there is no local recovery.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Malformed task result in event {event_id}: {source}")]
    MalformedResult {
        event_id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event {event_id} ({event_type}) has no attributes")]
    MissingAttributes { event_id: i64, event_type: String },

    #[error("Timer '{timer_id}' fired but its start event {started_event_id} is not in history")]
    MissingTimerStart {
        timer_id: String,
        started_event_id: i64,
    },

    #[error("Unknown business-logic input: {0}")]
    UnknownStep(String),

    #[error("Task '{step}' reported an error: {error}")]
    TaskFailed {
        step: String,
        error: String,
        output: String,
    },
}

impl DecisionError {
    /// Long-form description for the fail decision's details field
    pub fn details(&self) -> String {
        match self {
            Self::TaskFailed { output, .. } if !output.is_empty() => {
                format!("{} (output: {})", self, output)
            }
            _ => self.to_string(),
        }
    }
}
