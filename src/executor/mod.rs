//! Remote task executor.
//!
//! Receives one payload per invocation, reads `reqtype` and `reqinput`
//! through the attribute decoder, runs the matching action and reports a
//! step result. The AMI actions are simulated: they log their input and
//! return canned output.

pub mod failure;

use tracing::info;

use crate::decoder::{AttributeStore, DecodeError, DecodeLimits};
use crate::domain::StepResult;

pub use failure::{FailOn, FailureInjector, NeverFail, RandomFailure};

/// Actions the executor knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    CreateAmi,
    TagAmi,
    RemoveOld,
    DeleteSnapshots,
}

impl TaskAction {
    pub fn parse(req_type: &str) -> Option<Self> {
        match req_type {
            "amicreate" => Some(Self::CreateAmi),
            "tagami" => Some(Self::TagAmi),
            "removeold" => Some(Self::RemoveOld),
            "deletesnapshots" => Some(Self::DeleteSnapshots),
            _ => None,
        }
    }

    /// Request type, echoed back as the result type
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateAmi => "amicreate",
            Self::TagAmi => "tagami",
            Self::RemoveOld => "removeold",
            Self::DeleteSnapshots => "deletesnapshots",
        }
    }

    fn simulated_output(&self) -> &'static str {
        match self {
            Self::CreateAmi => "ami-abcd1234,ami-1234abcd",
            Self::TagAmi => "",
            Self::RemoveOld => "snap-efgh5678,snap-5678efgh",
            Self::DeleteSnapshots => "",
        }
    }

    /// Snapshot deletion is the final cleanup and is never failed on purpose
    fn failable(&self) -> bool {
        !matches!(self, Self::DeleteSnapshots)
    }
}

pub struct TaskExecutor {
    injector: Box<dyn FailureInjector>,
    limits: DecodeLimits,
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new(NeverFail)
    }
}

impl TaskExecutor {
    pub fn new(injector: impl FailureInjector + 'static) -> Self {
        Self::from_boxed(Box::new(injector))
    }

    /// For strategies picked at runtime
    pub fn from_boxed(injector: Box<dyn FailureInjector>) -> Self {
        Self {
            injector,
            limits: DecodeLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Decode a raw payload and run the requested action
    pub fn run(&self, payload: &str) -> Result<StepResult, DecodeError> {
        let attributes = AttributeStore::decode_with(payload, self.limits)?;

        let req_type = attributes.get_or_default("reqtype");
        let req_input = attributes.get_or_default("reqinput");

        Ok(self.dispatch(&req_type, &req_input))
    }

    /// Run one action. Unknown request types report an error result.
    pub fn dispatch(&self, req_type: &str, req_input: &str) -> StepResult {
        let Some(action) = TaskAction::parse(req_type) else {
            return StepResult::default().with_error(format!(
                "unknown request type: {} input: {}",
                req_type, req_input
            ));
        };

        info!(action = action.name(), input = %req_input, "Running simulated action");

        let result = StepResult::new(action.name(), action.simulated_output());

        match action.failable().then(|| self.injector.inject(action.name())).flatten() {
            Some(error) => result.with_error(error),
            None => result,
        }
    }
}
