//! Poller Integration Tests
//!
//! Runs the poll loop against the in-memory service and checks what was
//! submitted.

use std::sync::Arc;

use snapflow::adapters::{DecisionTask, DecisionType, InMemoryService, PollRequest, TaskList};
use snapflow::core::{Decider, Pipeline, Poller, RetryPolicy};
use snapflow::domain::{EventType, HistoryEvent, StepResult};

fn request() -> PollRequest {
    PollRequest {
        domain: "test".to_string(),
        task_list: TaskList {
            name: "decisions".to_string(),
        },
        identity: "poller-test".to_string(),
        maximum_page_size: 100,
        reverse_order: true,
    }
}

fn poller(service: Arc<InMemoryService>) -> Poller {
    Poller::new(service, Decider::new(Pipeline::default()), request(), "Data")
}

fn started(token: &str) -> DecisionTask {
    DecisionTask::new(
        token,
        vec![
            HistoryEvent::new(3, EventType::DecisionTaskStarted),
            HistoryEvent::new(2, EventType::DecisionTaskScheduled),
            HistoryEvent::execution_started(1, None),
        ],
    )
}

fn completed(token: &str, result: &StepResult) -> DecisionTask {
    DecisionTask::new(
        token,
        vec![HistoryEvent::task_completed(
            7,
            serde_json::to_string(result).unwrap(),
        )],
    )
}

#[tokio::test]
async fn test_one_response_per_task() {
    let service = Arc::new(InMemoryService::with_tasks(vec![
        started("tt-1"),
        completed("tt-2", &StepResult::new("tagami", "")),
        completed("tt-3", &StepResult::new("deletesnapshots", "")),
    ]));

    let stats = poller(service.clone())
        .with_max_in_flight(2)
        .run(service.exhausted())
        .await
        .unwrap();

    assert_eq!(stats.decided, 3);
    assert_eq!(stats.failed_workflows, 0);
    assert!(stats.empty_polls >= 1);

    let mut responses = service.responses().await;
    responses.sort_by(|a, b| a.task_token.cmp(&b.task_token));
    assert_eq!(responses.len(), 3);

    for response in &responses {
        assert_eq!(response.decisions.len(), 1);
    }

    let first = &responses[0];
    assert_eq!(first.decisions[0].decision_type, DecisionType::ScheduleLambdaFunction);
    assert_eq!(first.execution_context, "snapflow-context");

    let last = &responses[2];
    assert_eq!(last.decisions[0].decision_type, DecisionType::CompleteWorkflowExecution);
    assert_eq!(last.execution_context, "Data");
}

#[tokio::test]
async fn test_failures_and_unhandled_histories() {
    let service = Arc::new(InMemoryService::with_tasks(vec![
        completed("tt-fail", &StepResult::new("tagami", "").with_error("throttled")),
        DecisionTask::new(
            "tt-idle",
            vec![HistoryEvent::new(4, EventType::DecisionTaskStarted)],
        ),
        started("tt-rejected"),
    ]));
    service.reject_token("tt-rejected").await;

    let stats = poller(service.clone())
        .run(service.exhausted())
        .await
        .unwrap();

    assert_eq!(stats.decided, 1);
    assert_eq!(stats.failed_workflows, 1);
    assert_eq!(stats.unhandled, 1);
    assert_eq!(stats.submit_failures, 1);

    let responses = service.responses().await;
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].task_token, "tt-fail");

    let decision = &responses[0].decisions[0];
    assert_eq!(decision.decision_type, DecisionType::FailWorkflowExecution);
    let attrs = decision
        .fail_workflow_execution_decision_attributes
        .as_ref()
        .unwrap();
    assert!(attrs.reason.contains("throttled"));
}

#[tokio::test]
async fn test_recovers_from_transient_poll_errors() {
    let service = Arc::new(InMemoryService::new());
    service.push_poll_error("throttled").await;
    service.push_task(started("tt-1")).await;

    let retry = RetryPolicy {
        initial_delay_ms: 1,
        max_delay_ms: 5,
        backoff_multiplier: 2.0,
    };

    let stats = poller(service.clone())
        .with_retry(retry, 3)
        .run(service.exhausted())
        .await
        .unwrap();

    assert_eq!(stats.poll_failures, 1);
    assert_eq!(stats.decided, 1);
    assert_eq!(service.responses().await.len(), 1);
}
