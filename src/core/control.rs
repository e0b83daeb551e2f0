//! Recovers the payload a timer carried across its delay.

use crate::domain::{HistoryEvent, StepResult};

use super::error::DecisionError;

/// Resolve a `TimerFired` event into the step result it stands for.
///
/// The result type is the timer id and the output is the control string
/// attached when the timer was started.
pub fn resolve_timer(
    fired: &HistoryEvent,
    history: &[HistoryEvent],
) -> Result<StepResult, DecisionError> {
    let attrs = fired
        .timer_fired_event_attributes
        .as_ref()
        .ok_or_else(|| DecisionError::MissingAttributes {
            event_id: fired.event_id,
            event_type: fired.event_type.to_string(),
        })?;

    let started = history
        .iter()
        .filter(|e| e.event_id == attrs.started_event_id)
        .find_map(|e| e.timer_started_event_attributes.as_ref())
        .ok_or_else(|| DecisionError::MissingTimerStart {
            timer_id: attrs.timer_id.clone(),
            started_event_id: attrs.started_event_id,
        })?;

    Ok(StepResult::new(
        attrs.timer_id.clone(),
        started.control.clone().unwrap_or_default(),
    ))
}
