//! Domain types for the decider.
//!
//! This module contains the core data structures:
//! - Events: Immutable history records from the orchestration service
//! - Step: Results and requests exchanged with the task executor
//! - Action: The single next move for an execution

pub mod action;
pub mod events;
pub mod step;

// Re-export commonly used types
pub use action::Action;
pub use events::{EventType, HistoryEvent};
pub use step::{encode_task_input, StepResult, TaskInput, WORKFLOW_STARTED};
