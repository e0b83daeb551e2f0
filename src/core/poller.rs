//! Long-poll loop that feeds decision tasks to the decider.
//!
//! Polling is sequential. Each task that comes back is decided and
//! answered on its own tokio task inside a `JoinSet`, bounded by a
//! semaphore. Tasks share nothing but the read-only service handle, so
//! nothing is locked. On shutdown the loop stops polling and waits for
//! every in-flight decision to finish.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::adapters::{DecisionTask, OrchestrationService, PollRequest};
use crate::domain::{Action, HistoryEvent};

use super::decider::{Decider, Outcome};
use super::emitter::DecisionEmitter;

/// Backoff between failed polls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay after the first failure in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Calculate delay for a specific attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms);
        }

        let delay = self.initial_delay_ms as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }
}

/// Counters for one run of the poll loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub polls: u64,
    pub empty_polls: u64,
    pub poll_failures: u64,
    /// Decisions submitted successfully
    pub decided: u64,
    /// Of those, how many failed the workflow
    pub failed_workflows: u64,
    pub unhandled: u64,
    pub submit_failures: u64,
    /// Decision tasks that panicked
    pub crashed: u64,
}

impl PollStats {
    fn record(&mut self, joined: Result<TaskReport, JoinError>) {
        match joined {
            Ok(TaskReport::Submitted { failed_workflow }) => {
                self.decided += 1;
                if failed_workflow {
                    self.failed_workflows += 1;
                }
            }
            Ok(TaskReport::Unhandled) => self.unhandled += 1,
            Ok(TaskReport::SubmitFailed) => self.submit_failures += 1,
            Err(e) => {
                error!(error = %e, "Decision task crashed");
                self.crashed += 1;
            }
        }
    }
}

/// How one decision task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskReport {
    Submitted { failed_workflow: bool },
    Unhandled,
    SubmitFailed,
}

pub struct Poller {
    service: Arc<dyn OrchestrationService>,
    decider: Decider,
    emitter: Arc<DecisionEmitter>,
    request: PollRequest,
    max_in_flight: usize,
    max_poll_failures: u32,
    retry: RetryPolicy,
}

impl Poller {
    pub fn new(
        service: Arc<dyn OrchestrationService>,
        decider: Decider,
        request: PollRequest,
        default_context: impl Into<String>,
    ) -> Self {
        let emitter = Arc::new(DecisionEmitter::new(service.clone(), default_context));

        Self {
            service,
            decider,
            emitter,
            request,
            max_in_flight: 8,
            max_poll_failures: 5,
            retry: RetryPolicy::default(),
        }
    }

    /// Cap on decisions computed at the same time
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Backoff between failed polls, and how many in a row end the loop
    pub fn with_retry(mut self, retry: RetryPolicy, max_poll_failures: u32) -> Self {
        self.retry = retry;
        self.max_poll_failures = max_poll_failures.max(1);
        self
    }

    /// Poll until `shutdown` resolves, then drain in-flight decisions.
    ///
    /// Returns an error only when polling fails `max_poll_failures` times
    /// in a row; in-flight decisions are still drained first.
    #[instrument(skip_all, fields(service = self.service.name(), domain = %self.request.domain, task_list = %self.request.task_list.name))]
    pub async fn run<F>(&self, shutdown: F) -> Result<PollStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<TaskReport> = JoinSet::new();
        let mut stats = PollStats::default();
        let mut consecutive_failures = 0u32;

        info!(max_in_flight = self.max_in_flight, "Polling for decision tasks");

        loop {
            while let Some(joined) = tasks.try_join_next() {
                stats.record(joined);
            }

            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = permits.clone().acquire_owned() => {
                    permit.context("Decision semaphore closed")?
                }
            };

            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.service.poll_for_decision_task(&self.request) => polled,
            };
            stats.polls += 1;

            match polled {
                Ok(task) if task.is_empty() => {
                    consecutive_failures = 0;
                    stats.empty_polls += 1;
                    debug!("No decisions required");
                }
                Ok(task) => {
                    consecutive_failures = 0;
                    let decider = self.decider.clone();
                    let emitter = self.emitter.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        handle_task(decider, emitter, task).await
                    });
                }
                Err(e) => {
                    consecutive_failures += 1;
                    stats.poll_failures += 1;

                    if consecutive_failures >= self.max_poll_failures {
                        error!(error = %e, consecutive_failures, "Giving up on polling");
                        drain(&mut tasks, &mut stats).await;
                        return Err(e.context(format!(
                            "Polling failed {} times in a row",
                            consecutive_failures
                        )));
                    }

                    let delay = self.retry.delay_for_attempt(consecutive_failures);
                    warn!(
                        error = %e,
                        attempt = consecutive_failures,
                        delay_ms = delay.as_millis() as u64,
                        "Poll failed, retrying"
                    );

                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "Shutting down, draining decisions");
        drain(&mut tasks, &mut stats).await;
        info!(?stats, "Poller stopped");

        Ok(stats)
    }
}

async fn drain(tasks: &mut JoinSet<TaskReport>, stats: &mut PollStats) {
    while let Some(joined) = tasks.join_next().await {
        stats.record(joined);
    }
}

/// Decide and answer one task
async fn handle_task(
    decider: Decider,
    emitter: Arc<DecisionEmitter>,
    task: DecisionTask,
) -> TaskReport {
    let span = info_span!(
        "decision",
        decision_id = %Uuid::new_v4(),
        workflow_id = %task.workflow_id()
    );

    async move {
        let Some(token) = task.token() else {
            return TaskReport::Unhandled;
        };

        info!(events = task.events.len(), "Handling decision task");

        let action = match decider.decide(&task.events) {
            Outcome::Decided(action) => action,
            Outcome::Unhandled => {
                warn!(
                    history = ?summarize_history(&task.events),
                    "No actionable event in history, nothing submitted"
                );
                return TaskReport::Unhandled;
            }
        };

        let failed_workflow = match &action {
            Action::FailWorkflow { reason, .. } => {
                error!(%reason, "Failing workflow");
                true
            }
            other => {
                info!(action = other.kind(), "Decided");
                false
            }
        };

        match emitter.emit(token, &action).await {
            Ok(()) => TaskReport::Submitted { failed_workflow },
            Err(e) => {
                error!(error = %e, "Decision not submitted; the service will redeliver the task");
                TaskReport::SubmitFailed
            }
        }
    }
    .instrument(span)
    .await
}

/// One line per event for diagnostics: `id:Type@time`
pub fn summarize_history(events: &[HistoryEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| match e.timestamp() {
            Some(ts) => format!("{}:{}@{}", e.event_id, e.event_type, ts.to_rfc3339()),
            None => format!("{}:{}", e.event_id, e.event_type),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryService, TaskList};
    use crate::core::pipeline::Pipeline;
    use crate::domain::EventType;

    fn request() -> PollRequest {
        PollRequest {
            domain: "test".to_string(),
            task_list: TaskList {
                name: "decisions".to_string(),
            },
            identity: "tester".to_string(),
            maximum_page_size: 100,
            reverse_order: true,
        }
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy {
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10000,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(8000));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(10000)); // Capped
    }

    #[test]
    fn test_summarize_history() {
        let events = vec![
            HistoryEvent::new(3, EventType::DecisionTaskStarted),
            HistoryEvent::new(2, EventType::Other("MarkerRecorded".to_string())),
        ];
        assert_eq!(
            summarize_history(&events),
            vec!["3:DecisionTaskStarted".to_string(), "2:MarkerRecorded".to_string()]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_consecutive_failures() {
        let service = Arc::new(InMemoryService::new());
        service.push_poll_error("boom").await;
        service.push_poll_error("boom").await;

        let retry = RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 1,
            backoff_multiplier: 1.0,
        };
        let poller = Poller::new(
            service.clone(),
            Decider::new(Pipeline::default()),
            request(),
            "Data",
        )
        .with_retry(retry, 2);

        let err = poller.run(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("2 times in a row"));
    }
}
