//! snapflow - Event-sourced workflow decider
//!
//! Drives a linear pipeline of remote tasks on a hosted workflow service.
//! The service keeps each execution's history; the decider holds no state
//! of its own and rebuilds everything it needs from that history on every
//! decision task.
//!
//! # Architecture
//!
//! - The newest actionable event in a history page decides what happens
//! - A transition table maps the previous step's result to the next action
//! - Delays are service-side timers that carry the previous output along
//! - Any error fails the workflow with a single decision
//!
//! # Modules
//!
//! - `adapters`: Orchestration service client (SWF JSON protocol, in-memory)
//! - `core`: Decision logic (Scanner, Pipeline, Decider, Emitter, Poller)
//! - `decoder`: Case-insensitive flattening of task payloads
//! - `domain`: Data structures (HistoryEvent, StepResult, Action)
//! - `executor`: The remote task executor and its failure injection
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Answer decision tasks until Ctrl-C
//! snapflow decide
//!
//! # Show what would be decided for a saved history
//! snapflow replay --history history.json
//!
//! # Run one task as the executor
//! snapflow execute handler '{"ReqType":"amicreate","ReqInput":""}'
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod decoder;
pub mod domain;
pub mod executor;

// Re-export main types at crate root for convenience
pub use adapters::{InMemoryService, OrchestrationService, SwfClient};
pub use core::{Decider, DecisionError, Outcome, Pipeline, Poller, Transitions};
pub use decoder::{AttributeStore, DecodeError, DecodeLimits};
pub use domain::{Action, EventType, HistoryEvent, StepResult};
pub use executor::TaskExecutor;
