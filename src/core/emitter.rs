//! Translates actions into protocol decisions and submits them.
//!
//! This is the only part of the decision path that touches the network.
//! Each call submits exactly one decision and is never retried: if it
//! fails, the service times the decision task out and hands it out again.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::adapters::{
    CompleteWorkflowAttributes, Decision, DecisionResponse, DecisionType,
    FailWorkflowAttributes, OrchestrationService, ScheduleLambdaFunctionAttributes,
    StartTimerAttributes,
};
use crate::domain::Action;

/// Service limit on the fail-workflow reason
pub const MAX_REASON_CHARS: usize = 256;

/// Service limit on the fail-workflow details
pub const MAX_DETAILS_CHARS: usize = 32_768;

pub struct DecisionEmitter {
    service: Arc<dyn OrchestrationService>,
    /// Execution context for decisions that do not carry their own
    default_context: String,
}

impl DecisionEmitter {
    pub fn new(service: Arc<dyn OrchestrationService>, default_context: impl Into<String>) -> Self {
        Self {
            service,
            default_context: default_context.into(),
        }
    }

    /// Build the response for one task without sending it
    pub fn response(&self, task_token: &str, action: &Action) -> DecisionResponse {
        let execution_context = match action {
            Action::ScheduleTask { context, .. } => context.clone(),
            _ => self.default_context.clone(),
        };

        DecisionResponse {
            task_token: task_token.to_string(),
            decisions: vec![to_decision(action)],
            execution_context,
        }
    }

    /// Submit one decision for the task
    #[instrument(skip_all, fields(action = action.kind()))]
    pub async fn emit(&self, task_token: &str, action: &Action) -> Result<()> {
        let response = self.response(task_token, action);

        self.service
            .respond_decision_task_completed(&response)
            .await
            .with_context(|| format!("Failed to submit {} decision", action.kind()))?;

        info!("Decision submitted");
        Ok(())
    }
}

/// Protocol decision for an action
pub fn to_decision(action: &Action) -> Decision {
    match action {
        Action::ScheduleTask {
            id,
            executor_name,
            input_payload,
            timeout,
            ..
        } => {
            let mut decision = Decision::of(DecisionType::ScheduleLambdaFunction);
            decision.schedule_lambda_function_decision_attributes =
                Some(ScheduleLambdaFunctionAttributes {
                    id: id.clone(),
                    name: executor_name.clone(),
                    input: input_payload.clone(),
                    start_to_close_timeout: timeout.clone(),
                });
            decision
        }
        Action::StartTimer {
            timer_id,
            duration_seconds,
            carried_payload,
        } => {
            let mut decision = Decision::of(DecisionType::StartTimer);
            decision.start_timer_decision_attributes = Some(StartTimerAttributes {
                timer_id: timer_id.clone(),
                start_to_fire_timeout: duration_seconds.to_string(),
                control: carried_payload.clone(),
            });
            decision
        }
        Action::CompleteWorkflow { result } => {
            let mut decision = Decision::of(DecisionType::CompleteWorkflowExecution);
            decision.complete_workflow_execution_decision_attributes =
                Some(CompleteWorkflowAttributes {
                    result: result.clone(),
                });
            decision
        }
        Action::FailWorkflow { reason, details } => {
            let mut decision = Decision::of(DecisionType::FailWorkflowExecution);
            decision.fail_workflow_execution_decision_attributes = Some(FailWorkflowAttributes {
                reason: truncate_chars(reason, MAX_REASON_CHARS),
                details: truncate_chars(details, MAX_DETAILS_CHARS),
            });
            decision
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
