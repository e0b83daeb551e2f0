//! In-memory orchestration service.
//!
//! Hands out a scripted sequence of decision tasks and records every
//! response it receives. Once the script runs dry, polls behave like a
//! long poll that timed out and [`InMemoryService::exhausted`] resolves.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{DecisionResponse, DecisionTask, OrchestrationService, PollRequest};

pub struct InMemoryService {
    script: Mutex<VecDeque<Result<DecisionTask, String>>>,
    responses: Mutex<Vec<DecisionResponse>>,
    reject_tokens: Mutex<Vec<String>>,
    drained: Notify,
    idle_poll: Duration,
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryService {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            responses: Mutex::new(Vec::new()),
            reject_tokens: Mutex::new(Vec::new()),
            drained: Notify::new(),
            idle_poll: Duration::from_millis(10),
        }
    }

    /// Create a service that will hand out these tasks in order
    pub fn with_tasks(tasks: impl IntoIterator<Item = DecisionTask>) -> Self {
        Self {
            script: Mutex::new(tasks.into_iter().map(Ok).collect()),
            ..Self::new()
        }
    }

    /// Queue another task
    pub async fn push_task(&self, task: DecisionTask) {
        self.script.lock().await.push_back(Ok(task));
    }

    /// Queue a poll failure
    pub async fn push_poll_error(&self, message: impl Into<String>) {
        self.script.lock().await.push_back(Err(message.into()));
    }

    /// Make submissions for this task token fail
    pub async fn reject_token(&self, token: impl Into<String>) {
        self.reject_tokens.lock().await.push(token.into());
    }

    /// Responses received so far, in submission order
    pub async fn responses(&self) -> Vec<DecisionResponse> {
        self.responses.lock().await.clone()
    }

    /// Resolves once a poll finds the script empty
    pub async fn exhausted(&self) {
        self.drained.notified().await;
    }
}

#[async_trait]
impl OrchestrationService for InMemoryService {
    fn name(&self) -> &str {
        "memory"
    }

    async fn poll_for_decision_task(&self, _request: &PollRequest) -> Result<DecisionTask> {
        let next = self.script.lock().await.pop_front();

        match next {
            Some(Ok(task)) => Ok(task),
            Some(Err(message)) => anyhow::bail!("{}", message),
            None => {
                self.drained.notify_one();
                tokio::time::sleep(self.idle_poll).await;
                Ok(DecisionTask::default())
            }
        }
    }

    async fn respond_decision_task_completed(&self, response: &DecisionResponse) -> Result<()> {
        if self.reject_tokens.lock().await.contains(&response.task_token) {
            anyhow::bail!("Unknown task token: {}", response.task_token);
        }

        self.responses.lock().await.push(response.clone());
        Ok(())
    }
}
