//! Turns an execution history into the next action.
//!
//! Nothing here performs I/O. State is rebuilt from the history page on
//! every call, so the same history always yields the same outcome.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{Action, HistoryEvent, StepResult};

use super::control::resolve_timer;
use super::error::DecisionError;
use super::pipeline::Transitions;
use super::scanner::{scan, Trigger};

/// What a history scan produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exactly one action to submit
    Decided(Action),

    /// No actionable event in the page; nothing is submitted
    Unhandled,
}

impl Outcome {
    pub fn action(&self) -> Option<&Action> {
        match self {
            Self::Decided(action) => Some(action),
            Self::Unhandled => None,
        }
    }
}

/// Pure decision engine over a transition table
#[derive(Clone)]
pub struct Decider {
    transitions: Arc<dyn Transitions>,
}

impl Decider {
    pub fn new(transitions: impl Transitions + 'static) -> Self {
        Self {
            transitions: Arc::new(transitions),
        }
    }

    /// Decide the next action for a newest-first history page
    pub fn decide(&self, history: &[HistoryEvent]) -> Outcome {
        let Some(trigger) = scan(history) else {
            return Outcome::Unhandled;
        };

        debug!(
            event_id = trigger.event().event_id,
            event_type = %trigger.event().event_type,
            "Handling event"
        );

        let action = step_result(trigger, history)
            .and_then(|result| self.advance(&result))
            .unwrap_or_else(|e| fail_action(&e));

        Outcome::Decided(action)
    }

    /// Apply one step result; failed steps never reach the table
    pub fn advance(&self, result: &StepResult) -> Result<Action, DecisionError> {
        if result.is_failure() {
            return Err(DecisionError::TaskFailed {
                step: result.result_type.clone(),
                error: result.result_err.clone(),
                output: result.result_output.clone(),
            });
        }

        debug!(result_type = %result.result_type, "Consulting transition table");
        self.transitions.next(result)
    }
}

/// Rebuild the step result an actionable event stands for
fn step_result(trigger: Trigger<'_>, history: &[HistoryEvent]) -> Result<StepResult, DecisionError> {
    match trigger {
        Trigger::ExecutionStarted(_) => Ok(StepResult::workflow_started()),
        Trigger::TaskCompleted(event) => decode_completion(event),
        Trigger::TimerFired(event) => resolve_timer(event, history),
    }
}

/// Decode the step result reported in a completion event.
///
/// The executor's stdout arrives wrapped in a JSON string literal; it is
/// unwrapped once before parsing. Unwrapped payloads are accepted as-is.
pub fn decode_completion(event: &HistoryEvent) -> Result<StepResult, DecisionError> {
    let attrs = event
        .completion_attributes()
        .ok_or_else(|| DecisionError::MissingAttributes {
            event_id: event.event_id,
            event_type: event.event_type.to_string(),
        })?;

    let raw = attrs.result.as_deref().unwrap_or_default();
    let unquoted = serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string());

    serde_json::from_str(&unquoted).map_err(|source| DecisionError::MalformedResult {
        event_id: event.event_id,
        source,
    })
}

/// The fail-workflow action for a fatal error
pub fn fail_action(error: &DecisionError) -> Action {
    Action::FailWorkflow {
        reason: error.to_string(),
        details: error.details(),
    }
}
