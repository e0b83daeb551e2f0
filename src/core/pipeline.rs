//! Pipeline definitions and the transition table built on them.
//!
//! A pipeline is an ordered list of steps run on the remote executor. A
//! step may ask for a delay before its successor starts; the delay is a
//! service-side timer named `<step>-timer` that carries the step's output.
//! Pipelines can be loaded from YAML; the built-in default is the AMI
//! snapshot rotation.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{encode_task_input, Action, StepResult, WORKFLOW_STARTED};

use super::error::DecisionError;

/// Maps the previous step's result to the next action.
///
/// Implementations must be pure: no I/O, no interior state.
pub trait Transitions: Send + Sync {
    fn next(&self, result: &StepResult) -> Result<Action, DecisionError>;
}

/// A complete pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name (used in logs)
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Function name the service invokes for every step
    #[serde(default = "default_executor")]
    pub executor: String,

    /// Start-to-close timeout for each step
    #[serde(default = "default_task_timeout")]
    pub task_timeout_seconds: u64,

    /// Execution context attached to schedule decisions
    #[serde(default = "default_context")]
    pub context: String,

    /// Input handed to the first step
    #[serde(default)]
    pub seed_input: String,

    /// Result recorded when the last step finishes
    #[serde(default = "default_completion_result")]
    pub completion_result: String,

    /// Ordered list of steps to execute
    pub steps: Vec<Step>,
}

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step name; doubles as the executor request type and the task id
    pub name: String,

    /// Pause before the next step starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u64>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delay_seconds: None,
        }
    }

    pub fn delayed(name: impl Into<String>, delay_seconds: u64) -> Self {
        Self {
            name: name.into(),
            delay_seconds: Some(delay_seconds),
        }
    }

    /// Id of the timer started after this step, if it has a delay
    pub fn timer_id(&self) -> Option<String> {
        self.delay_seconds.map(|_| format!("{}-timer", self.name))
    }
}

fn default_name() -> String {
    "ami-snapshot".to_string()
}
fn default_executor() -> String {
    "snapflow-worker".to_string()
}
fn default_task_timeout() -> u64 {
    10
}
fn default_context() -> String {
    "snapflow-context".to_string()
}
fn default_completion_result() -> String {
    "All done".to_string()
}

impl Default for Pipeline {
    /// The AMI snapshot rotation
    fn default() -> Self {
        Self {
            name: default_name(),
            description: "Create, tag and rotate AMIs, then drop stale snapshots".to_string(),
            executor: default_executor(),
            task_timeout_seconds: default_task_timeout(),
            context: default_context(),
            seed_input: String::new(),
            completion_result: default_completion_result(),
            steps: vec![
                Step::delayed("amicreate", 17),
                Step::new("tagami"),
                Step::delayed("removeold", 12),
                Step::new("deletesnapshots"),
            ],
        }
    }
}

impl Pipeline {
    /// Load a pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a pipeline from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline YAML")
    }

    /// Validate the pipeline definition
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            anyhow::bail!("Pipeline '{}' must have at least one step", self.name);
        }

        let mut seen: HashSet<String> = HashSet::new();

        for (i, step) in self.steps.iter().enumerate() {
            if step.name.is_empty() {
                anyhow::bail!("Step {} has an empty name", i);
            }

            if step.name == WORKFLOW_STARTED {
                anyhow::bail!("Step name '{}' is reserved", WORKFLOW_STARTED);
            }

            if step.delay_seconds == Some(0) {
                anyhow::bail!("Step '{}' has a zero delay; omit delay_seconds instead", step.name);
            }

            if !seen.insert(step.name.clone()) {
                anyhow::bail!("Step name '{}' is used more than once", step.name);
            }

            if let Some(timer_id) = step.timer_id() {
                if !seen.insert(timer_id.clone()) {
                    anyhow::bail!("Timer id '{}' collides with another name", timer_id);
                }
            }
        }

        Ok(())
    }

    /// Get the index of a step by name
    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// Get the index of the step whose timer has this id
    pub fn timer_index(&self, timer_id: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.timer_id().as_deref() == Some(timer_id))
    }

    /// Action that follows the step at `index`, or the first step for `None`
    fn step_after(&self, index: Option<usize>, payload: &str) -> Action {
        let next = index.map_or(0, |i| i + 1);

        match self.steps.get(next) {
            Some(step) => Action::ScheduleTask {
                id: step.name.clone(),
                executor_name: self.executor.clone(),
                input_payload: encode_task_input(&step.name, payload),
                timeout: self.task_timeout_seconds.to_string(),
                context: self.context.clone(),
            },
            None => Action::CompleteWorkflow {
                result: self.completion_result.clone(),
            },
        }
    }
}

impl Transitions for Pipeline {
    fn next(&self, result: &StepResult) -> Result<Action, DecisionError> {
        let key = result.result_type.as_str();

        if key == WORKFLOW_STARTED {
            return Ok(self.step_after(None, &self.seed_input));
        }

        if let Some(index) = self.step_index(key) {
            let step = &self.steps[index];
            return Ok(match (step.timer_id(), step.delay_seconds) {
                (Some(timer_id), Some(duration_seconds)) => Action::StartTimer {
                    timer_id,
                    duration_seconds,
                    carried_payload: result.result_output.clone(),
                },
                _ => self.step_after(Some(index), &result.result_output),
            });
        }

        if let Some(index) = self.timer_index(key) {
            return Ok(self.step_after(Some(index), &result.result_output));
        }

        Err(DecisionError::UnknownStep(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PIPELINE_YAML: &str = r#"
name: test
description: Test pipeline
executor: worker-fn
steps:
  - name: first
    delay_seconds: 5
  - name: second
"#;

    fn schedule_id(action: &Action) -> &str {
        match action {
            Action::ScheduleTask { id, .. } => id,
            other => panic!("expected schedule, got {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_parsing() {
        let pipeline = Pipeline::from_yaml(TEST_PIPELINE_YAML).unwrap();

        assert_eq!(pipeline.name, "test");
        assert_eq!(pipeline.executor, "worker-fn");
        assert_eq!(pipeline.steps.len(), 2);
        assert_eq!(pipeline.steps[0].delay_seconds, Some(5));
        assert_eq!(pipeline.task_timeout_seconds, 10);
        assert_eq!(pipeline.completion_result, "All done");
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_default_pipeline_is_valid() {
        assert!(Pipeline::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_and_reserved_names() {
        let mut pipeline = Pipeline::default();
        pipeline.steps.push(Step::new("tagami"));
        assert!(pipeline.validate().is_err());

        let mut pipeline = Pipeline::default();
        pipeline.steps[1] = Step::new(WORKFLOW_STARTED);
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_rejects_timer_collision() {
        let mut pipeline = Pipeline::default();
        pipeline.steps.push(Step::new("amicreate-timer"));
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_delay_and_empty() {
        let mut pipeline = Pipeline::default();
        pipeline.steps[1].delay_seconds = Some(0);
        assert!(pipeline.validate().is_err());

        let mut pipeline = Pipeline::default();
        pipeline.steps.clear();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_reference_transitions() {
        let pipeline = Pipeline::default();

        let start = pipeline.next(&StepResult::workflow_started()).unwrap();
        assert_eq!(
            start,
            Action::ScheduleTask {
                id: "amicreate".to_string(),
                executor_name: "snapflow-worker".to_string(),
                input_payload: encode_task_input("amicreate", ""),
                timeout: "10".to_string(),
                context: "snapflow-context".to_string(),
            }
        );

        let timer = pipeline.next(&StepResult::new("amicreate", "X")).unwrap();
        assert_eq!(
            timer,
            Action::StartTimer {
                timer_id: "amicreate-timer".to_string(),
                duration_seconds: 17,
                carried_payload: "X".to_string(),
            }
        );

        let tag = pipeline.next(&StepResult::new("amicreate-timer", "X")).unwrap();
        assert_eq!(schedule_id(&tag), "tagami");

        let remove = pipeline.next(&StepResult::new("tagami", "")).unwrap();
        assert_eq!(schedule_id(&remove), "removeold");

        let wait = pipeline.next(&StepResult::new("removeold", "snap-1")).unwrap();
        assert!(matches!(
            wait,
            Action::StartTimer { duration_seconds: 12, .. }
        ));

        let delete = pipeline.next(&StepResult::new("removeold-timer", "snap-1")).unwrap();
        match delete {
            Action::ScheduleTask { id, input_payload, .. } => {
                assert_eq!(id, "deletesnapshots");
                assert_eq!(input_payload, encode_task_input("deletesnapshots", "snap-1"));
            }
            other => panic!("expected schedule, got {:?}", other),
        }

        let done = pipeline.next(&StepResult::new("deletesnapshots", "")).unwrap();
        assert_eq!(
            done,
            Action::CompleteWorkflow {
                result: "All done".to_string()
            }
        );
    }

    #[test]
    fn test_output_forwarded_verbatim() {
        let pipeline = Pipeline::default();
        let raw = r#"{"not":"parsed"} \" trailing"#;

        let action = pipeline.next(&StepResult::new("tagami", raw)).unwrap();
        match action {
            Action::ScheduleTask { input_payload, .. } => {
                let decoded: crate::domain::TaskInput =
                    serde_json::from_str(&input_payload).unwrap();
                assert_eq!(decoded.req_input, raw);
            }
            other => panic!("expected schedule, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_step() {
        let pipeline = Pipeline::default();
        let err = pipeline.next(&StepResult::new("bogus", "")).unwrap_err();
        assert!(matches!(err, DecisionError::UnknownStep(ref s) if s == "bogus"));
    }

    #[test]
    fn test_delayed_last_step_completes_after_timer() {
        let pipeline = Pipeline {
            steps: vec![Step::delayed("only", 3)],
            ..Pipeline::default()
        };

        assert!(matches!(
            pipeline.next(&StepResult::new("only", "")).unwrap(),
            Action::StartTimer { .. }
        ));
        assert!(matches!(
            pipeline.next(&StepResult::new("only-timer", "")).unwrap(),
            Action::CompleteWorkflow { .. }
        ));
    }
}
