//! HTTP client for the Simple Workflow JSON protocol.
//!
//! Every operation is a POST of a JSON body to the service endpoint, with
//! the operation named in the `X-Amz-Target` header. Request signing is
//! not done here; point `endpoint` at a signing proxy or a local stand-in.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DecisionResponse, DecisionTask, OrchestrationService, PollRequest};

const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const TARGET_PREFIX: &str = "SimpleWorkflowService";

/// Simple Workflow client over reqwest
pub struct SwfClient {
    endpoint: String,
    client: reqwest::Client,
}

/// Error body returned by the service
#[derive(Debug, Deserialize)]
struct ServiceFault {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: String,
}

impl SwfClient {
    /// Create a client. `request_timeout` must exceed the service's
    /// 60 second long poll or idle polls will be reported as failures.
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke one protocol operation
    async fn call<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        debug!(operation, endpoint = %self.endpoint, "Calling orchestration service");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", target_header(operation))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", operation))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read {} response", operation))?;

        if !status.is_success() {
            anyhow::bail!("{} failed ({}): {}", operation, status, describe_fault(&text));
        }

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text)
            .with_context(|| format!("Failed to parse {} response", operation))
    }
}

fn target_header(operation: &str) -> String {
    format!("{}.{}", TARGET_PREFIX, operation)
}

/// Render a fault body for an error message, falling back to the raw text
fn describe_fault(body: &str) -> String {
    match serde_json::from_str::<ServiceFault>(body) {
        Ok(fault) if !fault.kind.is_empty() || !fault.message.is_empty() => {
            let kind = fault.kind.rsplit('#').next().unwrap_or_default();
            format!("{}: {}", kind, fault.message)
        }
        _ => body.trim().to_string(),
    }
}

#[async_trait]
impl OrchestrationService for SwfClient {
    fn name(&self) -> &str {
        "swf"
    }

    async fn poll_for_decision_task(&self, request: &PollRequest) -> Result<DecisionTask> {
        self.call("PollForDecisionTask", request).await
    }

    async fn respond_decision_task_completed(&self, response: &DecisionResponse) -> Result<()> {
        let _: serde_json::Value = self.call("RespondDecisionTaskCompleted", response).await?;
        Ok(())
    }
}
