//! History events as delivered by the orchestration service.
//!
//! Events are immutable records of what happened in one workflow execution.
//! The decider never writes them; it only replays the page it was handed.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single event in an execution's history.
///
/// Only the attribute block matching `event_type` is populated. The wire
/// format is the service's camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// Monotonic id within the execution
    pub event_id: i64,

    /// Type of event
    pub event_type: EventType,

    /// Seconds since the epoch, fractional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_timestamp: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_execution_started_event_attributes: Option<ExecutionStartedAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda_function_completed_event_attributes: Option<TaskCompletedAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_task_completed_event_attributes: Option<TaskCompletedAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_started_event_attributes: Option<TimerStartedAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_fired_event_attributes: Option<TimerFiredAttributes>,
}

impl HistoryEvent {
    /// Create a bare event with no attribute block
    pub fn new(event_id: i64, event_type: EventType) -> Self {
        Self {
            event_id,
            event_type,
            event_timestamp: None,
            workflow_execution_started_event_attributes: None,
            lambda_function_completed_event_attributes: None,
            activity_task_completed_event_attributes: None,
            timer_started_event_attributes: None,
            timer_fired_event_attributes: None,
        }
    }

    /// `WorkflowExecutionStarted` with optional workflow input
    pub fn execution_started(event_id: i64, input: Option<String>) -> Self {
        let mut event = Self::new(event_id, EventType::WorkflowExecutionStarted);
        event.workflow_execution_started_event_attributes =
            Some(ExecutionStartedAttributes { input });
        event
    }

    /// `LambdaFunctionCompleted` carrying a raw result payload
    pub fn task_completed(event_id: i64, result: impl Into<String>) -> Self {
        let mut event = Self::new(event_id, EventType::LambdaFunctionCompleted);
        event.lambda_function_completed_event_attributes = Some(TaskCompletedAttributes {
            result: Some(result.into()),
            scheduled_event_id: None,
            started_event_id: None,
        });
        event
    }

    /// `TimerStarted` carrying a control payload
    pub fn timer_started(
        event_id: i64,
        timer_id: impl Into<String>,
        control: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(event_id, EventType::TimerStarted);
        event.timer_started_event_attributes = Some(TimerStartedAttributes {
            timer_id: timer_id.into(),
            control: Some(control.into()),
            start_to_fire_timeout: None,
        });
        event
    }

    /// `TimerFired` referencing the event that started the timer
    pub fn timer_fired(event_id: i64, timer_id: impl Into<String>, started_event_id: i64) -> Self {
        let mut event = Self::new(event_id, EventType::TimerFired);
        event.timer_fired_event_attributes = Some(TimerFiredAttributes {
            timer_id: timer_id.into(),
            started_event_id,
        });
        event
    }

    /// Attach a timestamp (builder style)
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event_timestamp = Some(timestamp.timestamp_millis() as f64 / 1000.0);
        self
    }

    /// Event time as a UTC datetime, if the service supplied one
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let seconds = self.event_timestamp?;
        Utc.timestamp_millis_opt((seconds * 1000.0) as i64).single()
    }

    /// Completion attributes for either lambda or activity completions
    pub fn completion_attributes(&self) -> Option<&TaskCompletedAttributes> {
        match self.event_type {
            EventType::LambdaFunctionCompleted => {
                self.lambda_function_completed_event_attributes.as_ref()
            }
            EventType::ActivityTaskCompleted => {
                self.activity_task_completed_event_attributes.as_ref()
            }
            _ => None,
        }
    }
}

/// Event types emitted by the orchestration service.
///
/// Anything the decider has no use for lands in `Other`, which keeps the
/// service's name for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    DecisionTaskTimedOut,
    LambdaFunctionScheduled,
    LambdaFunctionStarted,
    LambdaFunctionCompleted,
    LambdaFunctionFailed,
    LambdaFunctionTimedOut,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    TimerStarted,
    TimerFired,
    TimerCanceled,
    Other(String),
}

impl EventType {
    /// The service's name for this event type
    pub fn as_str(&self) -> &str {
        match self {
            Self::WorkflowExecutionStarted => "WorkflowExecutionStarted",
            Self::WorkflowExecutionCompleted => "WorkflowExecutionCompleted",
            Self::WorkflowExecutionFailed => "WorkflowExecutionFailed",
            Self::DecisionTaskScheduled => "DecisionTaskScheduled",
            Self::DecisionTaskStarted => "DecisionTaskStarted",
            Self::DecisionTaskCompleted => "DecisionTaskCompleted",
            Self::DecisionTaskTimedOut => "DecisionTaskTimedOut",
            Self::LambdaFunctionScheduled => "LambdaFunctionScheduled",
            Self::LambdaFunctionStarted => "LambdaFunctionStarted",
            Self::LambdaFunctionCompleted => "LambdaFunctionCompleted",
            Self::LambdaFunctionFailed => "LambdaFunctionFailed",
            Self::LambdaFunctionTimedOut => "LambdaFunctionTimedOut",
            Self::ActivityTaskScheduled => "ActivityTaskScheduled",
            Self::ActivityTaskStarted => "ActivityTaskStarted",
            Self::ActivityTaskCompleted => "ActivityTaskCompleted",
            Self::ActivityTaskFailed => "ActivityTaskFailed",
            Self::TimerStarted => "TimerStarted",
            Self::TimerFired => "TimerFired",
            Self::TimerCanceled => "TimerCanceled",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "WorkflowExecutionStarted" => Self::WorkflowExecutionStarted,
            "WorkflowExecutionCompleted" => Self::WorkflowExecutionCompleted,
            "WorkflowExecutionFailed" => Self::WorkflowExecutionFailed,
            "DecisionTaskScheduled" => Self::DecisionTaskScheduled,
            "DecisionTaskStarted" => Self::DecisionTaskStarted,
            "DecisionTaskCompleted" => Self::DecisionTaskCompleted,
            "DecisionTaskTimedOut" => Self::DecisionTaskTimedOut,
            "LambdaFunctionScheduled" => Self::LambdaFunctionScheduled,
            "LambdaFunctionStarted" => Self::LambdaFunctionStarted,
            "LambdaFunctionCompleted" => Self::LambdaFunctionCompleted,
            "LambdaFunctionFailed" => Self::LambdaFunctionFailed,
            "LambdaFunctionTimedOut" => Self::LambdaFunctionTimedOut,
            "ActivityTaskScheduled" => Self::ActivityTaskScheduled,
            "ActivityTaskStarted" => Self::ActivityTaskStarted,
            "ActivityTaskCompleted" => Self::ActivityTaskCompleted,
            "ActivityTaskFailed" => Self::ActivityTaskFailed,
            "TimerStarted" => Self::TimerStarted,
            "TimerFired" => Self::TimerFired,
            "TimerCanceled" => Self::TimerCanceled,
            _ => Self::Other(name),
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStartedAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Attributes of a completed lambda function or activity task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletedAttributes {
    /// Raw result payload; usually a JSON string literal wrapping a step result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_event_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_event_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStartedAttributes {
    pub timer_id: String,

    /// Opaque payload carried across the delay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_to_fire_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerFiredAttributes {
    pub timer_id: String,

    /// Id of the `TimerStarted` event for this timer
    pub started_event_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserialization_from_service_json() {
        let json = r#"{
            "eventId": 7,
            "eventType": "TimerFired",
            "eventTimestamp": 1458745623.482,
            "timerFiredEventAttributes": {"timerId": "amicreate-timer", "startedEventId": 5}
        }"#;

        let event: HistoryEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.event_id, 7);
        assert_eq!(event.event_type, EventType::TimerFired);
        let attrs = event.timer_fired_event_attributes.unwrap();
        assert_eq!(attrs.timer_id, "amicreate-timer");
        assert_eq!(attrs.started_event_id, 5);
    }

    #[test]
    fn test_unknown_event_type_is_other() {
        let json = r#"{"eventId": 2, "eventType": "MarkerRecorded"}"#;
        let event: HistoryEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event.event_type,
            EventType::Other("MarkerRecorded".to_string())
        );
        assert_eq!(event.event_type.to_string(), "MarkerRecorded");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "MarkerRecorded");
    }

    #[test]
    fn test_completion_attributes_follow_event_type() {
        let event = HistoryEvent::task_completed(3, "\"{}\"");
        assert!(event.completion_attributes().is_some());

        let mut activity = HistoryEvent::new(4, EventType::ActivityTaskCompleted);
        activity.activity_task_completed_event_attributes = Some(TaskCompletedAttributes {
            result: Some("{}".to_string()),
            ..Default::default()
        });
        assert_eq!(
            activity.completion_attributes().unwrap().result.as_deref(),
            Some("{}")
        );

        let fired = HistoryEvent::timer_fired(5, "t", 1);
        assert!(fired.completion_attributes().is_none());
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let when = Utc.with_ymd_and_hms(2016, 3, 23, 14, 7, 3).unwrap();
        let event = HistoryEvent::execution_started(1, None).at(when);
        assert_eq!(event.timestamp(), Some(when));
    }
}
