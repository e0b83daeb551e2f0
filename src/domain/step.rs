//! Payloads threaded between pipeline steps.
//!
//! Field names are PascalCase on the wire because the executor and the
//! decider have always exchanged them that way.

use serde::{Deserialize, Serialize};

/// Result type synthesized when a new execution starts
pub const WORKFLOW_STARTED: &str = "newworkflow";

/// Output reported by a step, as the decider sees it.
///
/// `result_output` is opaque and forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StepResult {
    /// Which step (or timer) just finished
    pub result_type: String,

    /// Payload handed to the next step
    pub result_output: String,

    /// Non-empty when the step failed
    pub result_err: String,
}

impl StepResult {
    /// A successful result
    pub fn new(result_type: impl Into<String>, result_output: impl Into<String>) -> Self {
        Self {
            result_type: result_type.into(),
            result_output: result_output.into(),
            result_err: String::new(),
        }
    }

    /// The synthetic result that kicks off a fresh execution
    pub fn workflow_started() -> Self {
        Self::new(WORKFLOW_STARTED, r#"{"startnewworkflow":"no inputs"}"#)
    }

    /// Attach an error (builder style)
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.result_err = error.into();
        self
    }

    pub fn is_failure(&self) -> bool {
        !self.result_err.is_empty()
    }
}

/// Request sent to the task executor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskInput {
    pub req_type: String,
    pub req_input: String,
}

impl TaskInput {
    pub fn new(req_type: impl Into<String>, req_input: impl Into<String>) -> Self {
        Self {
            req_type: req_type.into(),
            req_input: req_input.into(),
        }
    }

    /// Serialize to the executor's wire JSON
    pub fn encode(&self) -> String {
        // Two string fields cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Encode an executor request
pub fn encode_task_input(req_type: &str, req_input: &str) -> String {
    TaskInput::new(req_type, req_input).encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_result_wire_names() {
        let result = StepResult::new("amicreate", "ami-1,ami-2");
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(
            json,
            r#"{"ResultType":"amicreate","ResultOutput":"ami-1,ami-2","ResultErr":""}"#
        );
    }

    #[test]
    fn test_step_result_missing_fields_default() {
        let result: StepResult = serde_json::from_str(r#"{"ResultType":"tagami"}"#).unwrap();
        assert_eq!(result.result_type, "tagami");
        assert!(result.result_output.is_empty());
        assert!(!result.is_failure());
    }

    #[test]
    fn test_encode_task_input() {
        assert_eq!(
            encode_task_input("tagami", "ami-1,ami-2"),
            r#"{"ReqType":"tagami","ReqInput":"ami-1,ami-2"}"#
        );
    }

    #[test]
    fn test_with_error_marks_failure() {
        let result = StepResult::new("tagami", "").with_error("boom");
        assert!(result.is_failure());
    }
}
