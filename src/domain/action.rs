//! The next thing an execution should do.

use serde::{Deserialize, Serialize};

/// One decided action. Built, submitted, then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum Action {
    /// Run a step on the remote executor
    ScheduleTask {
        id: String,
        executor_name: String,
        input_payload: String,
        /// Start-to-close timeout in seconds, as the service expects it
        timeout: String,
        context: String,
    },

    /// Wait, carrying a payload across the delay
    StartTimer {
        timer_id: String,
        duration_seconds: u64,
        carried_payload: String,
    },

    CompleteWorkflow {
        result: String,
    },

    FailWorkflow {
        reason: String,
        details: String,
    },
}

impl Action {
    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ScheduleTask { .. } => "schedule_task",
            Self::StartTimer { .. } => "start_timer",
            Self::CompleteWorkflow { .. } => "complete_workflow",
            Self::FailWorkflow { .. } => "fail_workflow",
        }
    }

    /// Whether this action closes the execution
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteWorkflow { .. } | Self::FailWorkflow { .. }
        )
    }
}
