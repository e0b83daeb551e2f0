//! Picks the event that drives the next decision.
//!
//! History arrives newest first. The first recognized event wins and
//! nothing older is looked at.

use crate::domain::{EventType, HistoryEvent};

/// The most recent actionable event in a history
#[derive(Debug, Clone, Copy)]
pub enum Trigger<'a> {
    /// The execution has just started
    ExecutionStarted(&'a HistoryEvent),

    /// A step finished and reported a result
    TaskCompleted(&'a HistoryEvent),

    /// A delay between steps elapsed
    TimerFired(&'a HistoryEvent),
}

impl<'a> Trigger<'a> {
    pub fn event(&self) -> &'a HistoryEvent {
        match self {
            Self::ExecutionStarted(e) | Self::TaskCompleted(e) | Self::TimerFired(e) => e,
        }
    }

    /// Classify one event, if it is actionable
    pub fn classify(event: &'a HistoryEvent) -> Option<Self> {
        match event.event_type {
            EventType::WorkflowExecutionStarted => Some(Self::ExecutionStarted(event)),
            EventType::LambdaFunctionCompleted | EventType::ActivityTaskCompleted => {
                Some(Self::TaskCompleted(event))
            }
            EventType::TimerFired => Some(Self::TimerFired(event)),
            _ => None,
        }
    }
}

/// Return the first actionable event, or `None` if the page has none
pub fn scan(events: &[HistoryEvent]) -> Option<Trigger<'_>> {
    events.iter().find_map(Trigger::classify)
}
