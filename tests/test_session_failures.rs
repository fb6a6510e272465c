//! Session failure policy tests
//!
//! Tests how a session reacts when delegation does not go to plan:
//! - Worker failures, timeouts and the single retry
//! - Unverified output and strict verification
//! - Cancellation of the in-flight dispatch
//! - Depth budget exhaustion and worker handoffs


use ddp_router::protocol::{ErrorCode, Request, WorkerOutput};
use ddp_router::registry::{Lexicon, Profile, ProfileRegistry, Stance};
use ddp_router::session::{
    AbortReason, Orchestrator, OrchestratorSettings, SessionStatus, TerminalReason,
};
use ddp_router::testing::{MockEvaluator, MockReply, MockWorker, StaticExtractor};
use ddp_router::verifier::Verifier;
use ddp_router::worker::{Worker, WorkerFailure, WorkerPool};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::*;
use tokio_util::sync::CancellationToken;

fn code_request() -> Request {
    Request::new("Write a script that parses CSV and sorts by revenue")
}

fn developer_only(worker: Arc<MockWorker>, settings: OrchestratorSettings) -> Orchestrator {
    let registry = builtin_registry();
    let pool = pool_with(&registry, &[("developer", worker as Arc<dyn Worker>)]);
    Orchestrator::new(
        registry,
        Arc::new(StaticExtractor::new(&[("code_write", 0.9)])),
        pool,
        settings,
    )
}

#[tokio::test]
async fn test_recoverable_failure_is_retried_once() {
    let worker = Arc::new(MockWorker::scripted(vec![
        MockReply::Fail(WorkerFailure::recoverable("connection reset")),
        MockReply::Compliant,
    ]));
    let orchestrator = developer_only(worker.clone(), test_settings());

    let report = orchestrator.run(code_request()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(worker.call_count().await, 2);
    assert_eq!(report.results[0].attempts, 2);
    // Retries do not consume depth
    assert_eq!(report.depth, 1);
}

#[tokio::test]
async fn test_second_failure_aborts_session() {
    let worker = Arc::new(MockWorker::failing(WorkerFailure::recoverable("flaky backend")));
    let orchestrator = developer_only(worker.clone(), test_settings());

    let report = orchestrator.run(code_request()).await.unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::WorkerFailure));
    assert_eq!(report.reason, TerminalReason::WorkerFailure);
    assert_eq!(worker.call_count().await, 2);
    assert_eq!(report.error.unwrap().code, ErrorCode::WorkerFailure);
    assert!(report.results.is_empty());
    assert!(report.explanation.contains("worker_failure"));
}

#[tokio::test]
async fn test_unrecoverable_failure_is_not_retried() {
    let worker = Arc::new(MockWorker::failing(WorkerFailure::unrecoverable(
        "unsupported language",
    )));
    let orchestrator = developer_only(worker.clone(), test_settings());

    let report = orchestrator.run(code_request()).await.unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::WorkerFailure));
    assert_eq!(worker.call_count().await, 1);
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let worker = Arc::new(MockWorker::hanging());
    let settings = OrchestratorSettings {
        step_timeout: Duration::from_millis(30),
        ..OrchestratorSettings::default()
    };
    let orchestrator = developer_only(worker.clone(), settings);

    let report = orchestrator.run(code_request()).await.unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::WorkerFailure));
    assert_eq!(report.error.unwrap().code, ErrorCode::WorkerTimeout);
    assert_eq!(worker.call_count().await, 2);
}

#[tokio::test]
async fn test_slow_worker_within_timeout_succeeds() {
    let worker = Arc::new(MockWorker::compliant().with_delay(Duration::from_millis(10)));
    let orchestrator = developer_only(worker.clone(), test_settings());

    let report = orchestrator.run(code_request()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.results[0].attempts, 1);
}

#[tokio::test]
async fn test_missing_worker_aborts() {
    let orchestrator = Orchestrator::new(
        builtin_registry(),
        Arc::new(StaticExtractor::new(&[("code_write", 0.9)])),
        WorkerPool::new(),
        test_settings(),
    );

    let report = orchestrator.run(code_request()).await.unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::WorkerFailure));
    assert_eq!(report.visited_profiles, vec!["developer"]);
}

#[tokio::test]
async fn test_unverified_output_is_retried_then_accepted() {
    let worker = Arc::new(MockWorker::replying("Sure, all done."));
    let orchestrator = developer_only(worker.clone(), test_settings());

    let report = orchestrator.run(code_request()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(worker.call_count().await, 2);
    let result = &report.results[0];
    assert!(!result.verified);
    assert!(!result.verifier_notes.is_empty());
    assert!(report.explanation.contains("could not be verified"));
    assert!(report.answer.unwrap().contains("_Unverified:"));
}

#[tokio::test]
async fn test_strict_verification_aborts_on_unverified_output() {
    let worker = Arc::new(MockWorker::replying("Sure, all done."));
    let settings = OrchestratorSettings {
        strict_verification: true,
        ..test_settings()
    };
    let orchestrator = developer_only(worker.clone(), settings);

    let report = orchestrator.run(code_request()).await.unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::WorkerFailure));
    assert_eq!(worker.call_count().await, 2);
}

#[tokio::test]
async fn test_verified_on_retry_after_empty_output() {
    let worker = Arc::new(MockWorker::scripted(vec![
        MockReply::Output(WorkerOutput::text("   ")),
        MockReply::Compliant,
    ]));
    let orchestrator = developer_only(worker.clone(), test_settings());

    let report = orchestrator.run(code_request()).await.unwrap();

    assert!(report.is_completed());
    assert!(report.results[0].verified);
    assert_eq!(report.results[0].attempts, 2);
}

#[tokio::test]
async fn test_semantic_evaluator_rejection_marks_unverified() {
    let evaluator = Arc::new(MockEvaluator::rejecting("does not sort by revenue"));
    let orchestrator = developer_only(Arc::new(MockWorker::compliant()), test_settings())
        .with_verifier(Verifier::with_evaluator(evaluator.clone()));

    let report = orchestrator.run(code_request()).await.unwrap();

    assert!(report.is_completed());
    assert!(!report.results[0].verified);
    assert_eq!(
        report.results[0].verifier_notes,
        vec!["does not sort by revenue".to_string()]
    );
    assert_eq!(evaluator.call_count().await, 2);
}

#[tokio::test]
async fn test_cancellation_before_start() {
    let worker = Arc::new(MockWorker::compliant());
    let orchestrator = developer_only(worker.clone(), test_settings());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = orchestrator
        .run_with_cancellation(code_request(), cancel)
        .await
        .unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::Cancelled));
    assert_eq!(worker.call_count().await, 0);
}

#[tokio::test]
async fn test_cancellation_interrupts_in_flight_dispatch() {
    let worker = Arc::new(MockWorker::hanging());
    let settings = OrchestratorSettings {
        step_timeout: Duration::from_secs(30),
        ..OrchestratorSettings::default()
    };
    let orchestrator = developer_only(worker.clone(), settings);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let report = orchestrator
        .run_with_cancellation(code_request(), cancel)
        .await
        .unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::Cancelled));
    assert_eq!(report.reason, TerminalReason::Cancelled);
    assert_eq!(report.error.unwrap().code, ErrorCode::Cancelled);
    assert_eq!(worker.call_count().await, 1);
}

#[tokio::test]
async fn test_cancellation_keeps_completed_results() {
    let registry = builtin_registry();
    let architect = Arc::new(MockWorker::compliant());
    let developer = Arc::new(MockWorker::hanging());
    let pool = pool_with(
        &registry,
        &[
            ("data-architect", architect.clone() as Arc<dyn Worker>),
            ("developer", developer.clone() as Arc<dyn Worker>),
        ],
    );
    let settings = OrchestratorSettings {
        step_timeout: Duration::from_secs(30),
        ..OrchestratorSettings::default()
    };
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(StaticExtractor::new(&[("plan", 0.7), ("implement", 0.7)])),
        pool,
        settings,
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = orchestrator
        .run_with_cancellation(
            Request::new("Design an import plan, then implement the migration scripts"),
            cancel,
        )
        .await
        .unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::Cancelled));
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].profile_id, "data-architect");
    assert!(report.answer.unwrap().contains("## Data Architect"));
}

#[tokio::test]
async fn test_handoff_queues_next_profile() {
    let registry = builtin_registry();
    let developer = Arc::new(MockWorker::handing_off(
        "critique-reviewer",
        "Review the parser for edge cases",
    ));
    let reviewer = Arc::new(MockWorker::compliant());
    let pool = pool_with(
        &registry,
        &[
            ("developer", developer.clone() as Arc<dyn Worker>),
            ("critique-reviewer", reviewer.clone() as Arc<dyn Worker>),
        ],
    );
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(StaticExtractor::new(&[("code_write", 0.9)])),
        pool,
        test_settings(),
    );

    let report = orchestrator.run(code_request()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.visited_profiles, vec!["developer", "critique-reviewer"]);
    let handed = &reviewer.received_requests().await[0];
    assert!(handed.reset);
    assert!(handed.subtask.contains("Review the parser for edge cases"));
}

#[tokio::test]
async fn test_handoff_to_visited_profile_is_refused() {
    let registry = builtin_registry();
    let developer = Arc::new(MockWorker::handing_off("researcher", "Find prior art"));
    let researcher = Arc::new(MockWorker::handing_off("developer", "Write more code"));
    let pool = pool_with(
        &registry,
        &[
            ("developer", developer.clone() as Arc<dyn Worker>),
            ("researcher", researcher.clone() as Arc<dyn Worker>),
        ],
    );
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(StaticExtractor::new(&[("code_write", 0.9)])),
        pool,
        test_settings(),
    );

    let report = orchestrator.run(code_request()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.visited_profiles, vec!["developer", "researcher"]);
    assert_eq!(developer.call_count().await, 1);
    assert!(report.results[1]
        .verifier_notes
        .iter()
        .any(|n| n.contains("already visited")));
}

#[tokio::test]
async fn test_handoff_to_unknown_profile_is_refused() {
    let developer = Arc::new(MockWorker::handing_off("astrologer", "Read the stars"));
    let orchestrator = developer_only(developer, test_settings());

    let report = orchestrator.run(code_request()).await.unwrap();

    assert!(report.is_completed());
    assert_eq!(report.visited_profiles, vec!["developer"]);
    assert!(report.results[0]
        .verifier_notes
        .iter()
        .any(|n| n.contains("unknown profile")));
}

#[tokio::test]
async fn test_depth_budget_aborts_with_partial_synthesis() {
    let registry = builtin_registry();
    let pool = pool_with(
        &registry,
        &[
            (
                "developer",
                Arc::new(MockWorker::handing_off("researcher", "Gather sources")) as Arc<dyn Worker>,
            ),
            (
                "researcher",
                Arc::new(MockWorker::handing_off("security-analyst", "Assess the findings"))
                    as Arc<dyn Worker>,
            ),
            (
                "security-analyst",
                Arc::new(MockWorker::handing_off("critique-reviewer", "Grade the report"))
                    as Arc<dyn Worker>,
            ),
        ],
    );
    let settings = OrchestratorSettings {
        max_depth: 2,
        ..test_settings()
    };
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(StaticExtractor::new(&[("code_write", 0.9)])),
        pool,
        settings,
    );

    let report = orchestrator.run(code_request()).await.unwrap();

    assert_eq!(report.status, SessionStatus::Aborted(AbortReason::DepthExceeded));
    assert_eq!(report.reason, TerminalReason::DepthExceeded);
    assert_eq!(report.depth, 2);
    assert_eq!(report.dispatch_count(), 2);
    assert_eq!(report.error.unwrap().code, ErrorCode::DepthExceeded);

    let partial = report.answer.unwrap();
    assert!(partial.contains("## Developer"));
    assert!(partial.contains("## Researcher"));
}

#[tokio::test]
async fn test_orchestrator_only_candidate_asks_for_clarification() {
    let registry = Arc::new(
        ProfileRegistry::new(
            vec![
                Profile::new("orchestrator", "Orchestrator")
                    .with_tags(&["code_write"])
                    .with_stances(&[Stance::Execute])
                    .with_evidence(&["done"]),
                Profile::new("researcher", "Researcher")
                    .with_tags(&["research"])
                    .with_stances(&[Stance::Assess])
                    .with_evidence(&["source"]),
            ],
            Lexicon::builtin(),
        )
        .unwrap(),
    );
    let worker = Arc::new(MockWorker::compliant());
    let pool = WorkerPool::new()
        .with_worker("orchestrator", worker.clone() as Arc<dyn Worker>)
        .with_worker("researcher", worker.clone() as Arc<dyn Worker>);
    let orchestrator = Orchestrator::new(
        registry,
        Arc::new(StaticExtractor::new(&[("code_write", 0.9)])),
        pool,
        test_settings(),
    );

    let report = orchestrator.run(code_request()).await.unwrap();

    assert_eq!(report.status, SessionStatus::AwaitingClarification);
    assert_eq!(worker.call_count().await, 0);
}
