//! Core decision logic.
//!
//! This module contains:
//! - Scanner: Picks the most recent actionable history event
//! - Control: Recovers payloads carried across timers
//! - Pipeline: Pipeline definitions and the transition table
//! - Decider: Pure history-to-action computation
//! - Emitter: Action-to-protocol translation and submission
//! - Poller: The long-poll loop and its supervised workers

pub mod control;
pub mod decider;
pub mod emitter;
pub mod error;
pub mod pipeline;
pub mod poller;
pub mod scanner;

// Re-export commonly used types
pub use control::resolve_timer;
pub use decider::{decode_completion, fail_action, Decider, Outcome};
pub use emitter::{to_decision, DecisionEmitter};
pub use error::DecisionError;
pub use pipeline::{Pipeline, Step, Transitions};
pub use poller::{summarize_history, PollStats, Poller, RetryPolicy};
pub use scanner::{scan, Trigger};
