//! Adapter interfaces for the orchestration service.
//!
//! The decider only ever talks to the service through
//! [`OrchestrationService`]: one long-poll call to receive work and one
//! call to answer it. Request and response types mirror the service's
//! JSON protocol.

pub mod memory;
pub mod swf;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::HistoryEvent;

// Re-export the adapters
pub use memory::InMemoryService;
pub use swf::SwfClient;

/// Long-poll request for decision work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub domain: String,
    pub task_list: TaskList,
    pub identity: String,
    pub maximum_page_size: u32,
    /// Must be true: the scanner relies on newest-first order
    pub reverse_order: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    pub name: String,
}

/// Identifies one workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

/// A decision task handed out by the service.
///
/// A long poll that times out comes back without a task token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_token: Option<String>,

    #[serde(default)]
    pub events: Vec<HistoryEvent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_execution: Option<WorkflowExecution>,
}

impl DecisionTask {
    /// A task with a token and a history page
    pub fn new(task_token: impl Into<String>, events: Vec<HistoryEvent>) -> Self {
        Self {
            task_token: Some(task_token.into()),
            events,
            next_page_token: None,
            workflow_execution: None,
        }
    }

    /// The token, if this response actually carries work
    pub fn token(&self) -> Option<&str> {
        self.task_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.token().is_none()
    }

    /// Workflow id for log correlation
    pub fn workflow_id(&self) -> &str {
        self.workflow_execution
            .as_ref()
            .map(|w| w.workflow_id.as_str())
            .unwrap_or("unknown")
    }
}

/// Protocol-level decision types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionType {
    ScheduleLambdaFunction,
    StartTimer,
    CompleteWorkflowExecution,
    FailWorkflowExecution,
}

/// One protocol decision. Only the block matching `decision_type` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub decision_type: DecisionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_lambda_function_decision_attributes: Option<ScheduleLambdaFunctionAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timer_decision_attributes: Option<StartTimerAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_workflow_execution_decision_attributes: Option<CompleteWorkflowAttributes>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_workflow_execution_decision_attributes: Option<FailWorkflowAttributes>,
}

impl Decision {
    /// A decision of the given type with no attributes yet
    pub fn of(decision_type: DecisionType) -> Self {
        Self {
            decision_type,
            schedule_lambda_function_decision_attributes: None,
            start_timer_decision_attributes: None,
            complete_workflow_execution_decision_attributes: None,
            fail_workflow_execution_decision_attributes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleLambdaFunctionAttributes {
    pub id: String,
    pub name: String,
    pub input: String,
    pub start_to_close_timeout: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTimerAttributes {
    pub timer_id: String,
    pub start_to_fire_timeout: String,
    pub control: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteWorkflowAttributes {
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailWorkflowAttributes {
    pub reason: String,
    pub details: String,
}

/// Answer to one decision task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub task_token: String,
    pub decisions: Vec<Decision>,
    pub execution_context: String,
}

/// Trait for orchestration service clients
#[async_trait]
pub trait OrchestrationService: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Long-poll for the next decision task
    async fn poll_for_decision_task(&self, request: &PollRequest) -> Result<DecisionTask>;

    /// Submit the decisions for a task
    async fn respond_decision_task_completed(&self, response: &DecisionResponse) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_poll_response() {
        let task: DecisionTask = serde_json::from_str(r#"{"events": []}"#).unwrap();
        assert!(task.is_empty());

        let task: DecisionTask = serde_json::from_str(r#"{"taskToken": ""}"#).unwrap();
        assert!(task.is_empty());
    }

    #[test]
    fn test_poll_request_wire_names() {
        let request = PollRequest {
            domain: "d".to_string(),
            task_list: TaskList {
                name: "tl".to_string(),
            },
            identity: "me".to_string(),
            maximum_page_size: 100,
            reverse_order: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskList"]["name"], "tl");
        assert_eq!(json["maximumPageSize"], 100);
        assert_eq!(json["reverseOrder"], true);
    }

    #[test]
    fn test_decision_serializes_only_its_block() {
        let mut decision = Decision::of(DecisionType::CompleteWorkflowExecution);
        decision.complete_workflow_execution_decision_attributes = Some(CompleteWorkflowAttributes {
            result: "All done".to_string(),
        });

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decisionType"], "CompleteWorkflowExecution");
        assert_eq!(
            json["completeWorkflowExecutionDecisionAttributes"]["result"],
            "All done"
        );
        assert!(json.get("startTimerDecisionAttributes").is_none());
    }
}
