//! Concurrent session tests
//!
//! Independent sessions share one orchestrator and registry; each owns its
//! own session state.


use ddp_router::protocol::Request;
use ddp_router::session::SessionStatus;
use ddp_router::testing::MockWorker;
use ddp_router::worker::Worker;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_sessions_run_concurrently() {
    let registry = builtin_registry();
    let developer = Arc::new(MockWorker::compliant().with_delay(Duration::from_millis(20)));
    let pool = pool_with(&registry, &[("developer", developer.clone() as Arc<dyn Worker>)]);
    let orchestrator = Arc::new(orchestrator(
        Arc::new(ddp_router::testing::StaticExtractor::new(&[("code_write", 0.9)])),
        pool,
        test_settings(),
    ));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .run(Request::new(format!("Write script number {}", i)))
                    .await
            })
        })
        .collect();

    let reports: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert!(reports.iter().all(|r| r.status == SessionStatus::Completed));
    assert!(reports.iter().all(|r| r.depth == 1));

    let session_ids: HashSet<_> = reports.iter().map(|r| r.session_id).collect();
    assert_eq!(session_ids.len(), 16);
    assert_eq!(developer.call_count().await, 16);

    // Each worker request carries its own session id and text
    let received = developer.received_requests().await;
    let received_ids: HashSet<_> = received.iter().map(|r| r.session_id).collect();
    assert_eq!(received_ids, session_ids);
}

#[tokio::test]
async fn test_failed_session_does_not_affect_others() {
    let registry = builtin_registry();
    let pool = pool_with(
        &registry,
        &[(
            "researcher",
            Arc::new(MockWorker::failing(
                ddp_router::worker::WorkerFailure::unrecoverable("index offline"),
            )) as Arc<dyn Worker>,
        )],
    );
    let orchestrator = orchestrator(
        Arc::new(ddp_router::intent::KeywordExtractor::new(
            registry.lexicon().clone(),
        )),
        pool,
        test_settings(),
    );

    let (failed, completed) = tokio::join!(
        orchestrator.run(Request::new("Research the literature on whales")),
        orchestrator.run(Request::new("Write a script that parses CSV")),
    );

    assert!(matches!(
        failed.unwrap().status,
        SessionStatus::Aborted(_)
    ));
    assert!(completed.unwrap().is_completed());
}
