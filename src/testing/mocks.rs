//! Mock implementations for testing
//!
//! Provides mock intent extractors, workers and semantic evaluators so the
//! full delegation pipeline can be exercised without a real classifier or
//! real specialist agents.

use crate::intent::{ExtractionError, IntentExtractor, IntentSignal};
use crate::protocol::{DelegationStep, WorkerOutput, WorkerRequest};
use crate::verifier::{EvaluationError, SemanticEvaluator, Verification};
use crate::worker::{Worker, WorkerFailure};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Extractor returning a fixed set of signals
#[derive(Debug, Default)]
pub struct StaticExtractor {
    pub signals: Vec<IntentSignal>,
    pub failure: Option<ExtractionError>,
    pub calls: Arc<Mutex<usize>>,
}

impl StaticExtractor {
    pub fn new(signals: &[(&str, f64)]) -> Self {
        Self {
            signals: signals
                .iter()
                .map(|(tag, confidence)| IntentSignal::new(*tag, *confidence))
                .collect(),
            ..Default::default()
        }
    }

    /// Extractor that finds no intent at all
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing(error: ExtractionError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    pub async fn call_count(&self) -> usize {
        *self.calls.lock().await
    }
}

#[async_trait]
impl IntentExtractor for StaticExtractor {
    async fn extract(&self, _text: &str) -> Result<Vec<IntentSignal>, ExtractionError> {
        *self.calls.lock().await += 1;
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.signals.clone()),
        }
    }
}

/// One scripted worker reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Output satisfying the step's success criteria
    Compliant,
    /// Compliant output that also requests a handoff
    CompliantWithHandoff { profile_id: String, subtask: String },
    /// Exactly this output
    Output(WorkerOutput),
    Fail(WorkerFailure),
    /// Never answers; only a timeout or cancellation ends the dispatch
    Hang,
}

/// Scriptable worker
///
/// Replies are consumed in order; once the script is exhausted the last
/// reply repeats. Every request received is recorded.
#[derive(Debug)]
pub struct MockWorker {
    pub replies: Vec<MockReply>,
    pub received: Arc<Mutex<Vec<WorkerRequest>>>,
    pub delay: Option<Duration>,
}

impl MockWorker {
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            received: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub fn compliant() -> Self {
        Self::scripted(vec![MockReply::Compliant])
    }

    pub fn replying(output: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::Output(WorkerOutput::text(output))])
    }

    pub fn failing(failure: WorkerFailure) -> Self {
        Self::scripted(vec![MockReply::Fail(failure)])
    }

    pub fn hanging() -> Self {
        Self::scripted(vec![MockReply::Hang])
    }

    pub fn handing_off(profile_id: impl Into<String>, subtask: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::CompliantWithHandoff {
            profile_id: profile_id.into(),
            subtask: subtask.into(),
        }])
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn into_arc(self) -> Arc<dyn Worker> {
        Arc::new(self)
    }

    pub async fn call_count(&self) -> usize {
        self.received.lock().await.len()
    }

    pub async fn received_requests(&self) -> Vec<WorkerRequest> {
        self.received.lock().await.clone()
    }
}

/// Output mentioning every required term and the first expected term
pub fn compliant_output(request: &WorkerRequest) -> String {
    let criteria = &request.success_criteria;
    let mut evidence: Vec<&str> = criteria.required_terms.iter().map(String::as_str).collect();
    if let Some(first) = criteria.any_of_terms.first() {
        evidence.push(first);
    }
    format!(
        "Done: {}\nEvidence: {}",
        request.subtask.lines().next().unwrap_or_default(),
        evidence.join(", ")
    )
}

#[async_trait]
impl Worker for MockWorker {
    async fn execute(
        &self,
        request: &WorkerRequest,
        _timeout: Duration,
    ) -> Result<WorkerOutput, WorkerFailure> {
        let index = {
            let mut received = self.received.lock().await;
            received.push(request.clone());
            received.len() - 1
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .get(index)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or(MockReply::Compliant);

        match reply {
            MockReply::Compliant => Ok(WorkerOutput::text(compliant_output(request))),
            MockReply::CompliantWithHandoff {
                profile_id,
                subtask,
            } => Ok(WorkerOutput::text(compliant_output(request)).with_handoff(profile_id, subtask)),
            MockReply::Output(output) => Ok(output),
            MockReply::Fail(failure) => Err(failure),
            MockReply::Hang => std::future::pending().await,
        }
    }
}

/// Semantic evaluator with a fixed verdict
#[derive(Debug, Clone)]
pub struct MockEvaluator {
    pub verdict: Result<Verification, EvaluationError>,
    pub calls: Arc<Mutex<usize>>,
}

impl MockEvaluator {
    pub fn approving() -> Self {
        Self::with_verdict(Ok(Verification::passed()))
    }

    pub fn rejecting(note: impl Into<String>) -> Self {
        Self::with_verdict(Ok(Verification::failed(vec![note.into()])))
    }

    pub fn erroring(message: impl Into<String>) -> Self {
        Self::with_verdict(Err(EvaluationError(message.into())))
    }

    fn with_verdict(verdict: Result<Verification, EvaluationError>) -> Self {
        Self {
            verdict,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub async fn call_count(&self) -> usize {
        *self.calls.lock().await
    }
}

#[async_trait]
impl SemanticEvaluator for MockEvaluator {
    async fn evaluate(
        &self,
        _step: &DelegationStep,
        _output: &str,
    ) -> Result<Verification, EvaluationError> {
        *self.calls.lock().await += 1;
        self.verdict.clone()
    }
}
