//! Session orchestration
//!
//! Drives one request through classification, planning, sequential dispatch,
//! verification and synthesis. The orchestrator itself is shared (`&self`
//! API, `Arc` registry); each call owns its `DelegationSession` exclusively,
//! so independent sessions run concurrently without locks.

use super::report::{PendingClarification, SessionReport, TerminalReason};
use super::state::{AbortReason, DelegationSession, SessionStatus};
use super::synthesis::synthesize;
use crate::error::{sanitize_error_message, RoutingError, RoutingResult};
use crate::intent::{IntentExtractor, IntentSignal};
use crate::observability::metrics;
use crate::planning::{DelegationPlanner, PlanOutcome};
use crate::protocol::{
    DelegationResult, DelegationStep, ErrorDetails, Handoff, Request, WorkerOutput, WorkerRequest,
};
use crate::registry::ProfileRegistry;
use crate::routing::{AmbiguousOutcome, DirectReason, PrecedenceResolver, Resolution};
use crate::verifier::Verifier;
use crate::worker::{WorkerFailure, WorkerPool};
use crate::{dispatch_span, session_span};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

/// Engine tunables consumed by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub orchestrator_id: String,
    pub max_depth: u32,
    pub confidence_threshold: f64,
    pub noise_floor: f64,
    pub step_timeout: Duration,
    /// Retries after the first attempt of a step
    pub retry_attempts: u32,
    pub strict_verification: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            orchestrator_id: "orchestrator".to_string(),
            max_depth: 5,
            confidence_threshold: crate::routing::DEFAULT_CONFIDENCE_THRESHOLD,
            noise_floor: crate::routing::DEFAULT_NOISE_FLOOR,
            step_timeout: Duration::from_secs(120),
            retry_attempts: 1,
            strict_verification: false,
        }
    }
}

/// Dry-run output: classification and plan without dispatch
#[derive(Debug, Clone, Serialize)]
pub struct RoutePreview {
    pub signals: Vec<IntentSignal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

enum Dispatch {
    Finished(Result<WorkerOutput, WorkerFailure>),
    Cancelled,
}

enum StepOutcome {
    Done {
        result: DelegationResult,
        handoff: Option<Handoff>,
    },
    Failed(RoutingError),
    Cancelled,
}

pub struct Orchestrator {
    registry: Arc<ProfileRegistry>,
    extractor: Arc<dyn IntentExtractor>,
    workers: WorkerPool,
    resolver: PrecedenceResolver,
    planner: DelegationPlanner,
    verifier: Verifier,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProfileRegistry>,
        extractor: Arc<dyn IntentExtractor>,
        workers: WorkerPool,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            resolver: PrecedenceResolver::new(settings.confidence_threshold, settings.noise_floor),
            planner: DelegationPlanner::new(
                settings.orchestrator_id.clone(),
                settings.confidence_threshold,
            ),
            verifier: Verifier::new(),
            registry,
            extractor,
            workers,
            settings,
        }
    }

    pub fn with_verifier(mut self, verifier: Verifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Run a request to a terminal report
    ///
    /// # Errors
    ///
    /// Only internal invariant breaches surface as `Err`; every routing,
    /// planning or worker outcome is carried by the report.
    pub async fn run(&self, request: Request) -> RoutingResult<SessionReport> {
        self.run_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Run a request that can be cancelled through `cancel`
    pub async fn run_with_cancellation(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> RoutingResult<SessionReport> {
        let session = DelegationSession::new(request, self.settings.max_depth);
        let span = session_span!(
            session_id = %session.session_id(),
            max_depth = session.max_depth()
        );
        self.drive(session, cancel).instrument(span).await
    }

    /// Resume a session suspended on a clarifying question
    ///
    /// The reply is appended to the original request text. When it names
    /// exactly one offered candidate, that profile is pinned and the other
    /// offered candidates are left out of the plan.
    pub async fn resume(
        &self,
        pending: &PendingClarification,
        reply: &str,
    ) -> RoutingResult<SessionReport> {
        let mut request = pending.request.clone();
        request.text = format!("{}\n\nClarification: {}", request.text.trim_end(), reply.trim());
        request.pinned_profile = pending.match_reply(reply).map(|c| c.profile_id.clone());
        if let Some(pinned) = request.pinned_profile.as_deref() {
            request.declined_profiles = pending
                .candidates
                .iter()
                .filter(|c| c.profile_id != pinned)
                .map(|c| c.profile_id.clone())
                .collect();
        }

        info!(pinned = ?request.pinned_profile, "Resuming after clarification");
        self.run(request).await
    }

    /// Classify and plan without dispatching anything
    pub async fn preview(&self, request: &Request) -> RoutePreview {
        let mut preview = RoutePreview {
            signals: Vec::new(),
            resolution: None,
            plan: None,
            error: None,
        };

        let signals = match self.extractor.extract(&request.text).await {
            Ok(signals) => signals,
            Err(e) => {
                preview.error = Some(RoutingError::from(e).to_error_details());
                return preview;
            }
        };
        preview.signals = signals;

        let resolution = match self.resolver.resolve(&preview.signals, &self.registry, request) {
            Ok(resolution) => resolution,
            Err(e) => {
                preview.error = Some(RoutingError::from(e).to_error_details());
                return preview;
            }
        };

        if let Resolution::Selected(selection) = &resolution {
            match self.planner.plan(request, selection, &self.registry) {
                Ok(plan) => preview.plan = Some(plan),
                Err(e) => preview.error = Some(e.to_error_details()),
            }
        }
        preview.resolution = Some(resolution);
        preview
    }

    async fn drive(
        &self,
        mut session: DelegationSession,
        cancel: CancellationToken,
    ) -> RoutingResult<SessionReport> {
        let started = Instant::now();
        metrics().session_started();
        info!(text_len = session.request().text.len(), "Session started");

        let text = session.request().text.clone();
        let extracted = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            extracted = self.extractor.extract(&text) => Some(extracted),
        };
        let Some(extracted) = extracted else {
            return self.abort(session, RoutingError::Cancelled, started);
        };

        let signals = match extracted {
            Ok(signals) => signals,
            Err(e) => return self.ask_to_rephrase(session, e.into()),
        };

        let resolution = match self
            .resolver
            .resolve(&signals, &self.registry, session.request())
        {
            Ok(resolution) => resolution,
            Err(e) => return self.ask_to_rephrase(session, e.into()),
        };

        let selection = match resolution {
            Resolution::Direct(reason) => return self.answer_directly(session, reason),
            Resolution::Ambiguous(outcome) => return self.ask(session, &outcome),
            Resolution::Selected(selection) => selection,
        };

        let steps = match self
            .planner
            .plan(session.request(), &selection, &self.registry)
        {
            Ok(PlanOutcome::Steps(steps)) => steps,
            Ok(PlanOutcome::Ambiguous(outcome)) => return self.ask(session, &outcome),
            Err(e) => return self.abort(session, e, started),
        };

        info!(
            primary = %selection.primary.id(),
            steps = steps.len(),
            "Delegation planned"
        );
        session.enqueue(steps);
        session.transition(SessionStatus::Delegating)?;

        while let Some(step) = session.next_step() {
            if cancel.is_cancelled() {
                return self.abort(session, RoutingError::Cancelled, started);
            }
            if let Err(e) = session.begin_delegation(&step.profile_id) {
                warn!(profile = %step.profile_id, depth = session.depth(), "Depth budget exhausted");
                return self.abort(session, e, started);
            }
            if session.status() == SessionStatus::NextStep {
                session.transition(SessionStatus::Delegating)?;
            }
            metrics().delegation_started(&step.profile_id, session.depth());
            info!(profile = %step.profile_id, depth = session.depth(), reset = step.reset, "Delegating step");

            match self.execute_step(&mut session, &step, &cancel).await? {
                StepOutcome::Cancelled => {
                    return self.abort(session, RoutingError::Cancelled, started);
                }
                StepOutcome::Failed(e) => return self.abort(session, e, started),
                StepOutcome::Done {
                    mut result,
                    handoff,
                } => {
                    if let Some(handoff) = handoff {
                        if let Some(note) = self.accept_handoff(&mut session, &step, &handoff) {
                            result.verifier_notes.push(note);
                        }
                    }
                    session.record(result);
                }
            }

            if session.pending_steps() > 0 {
                session.transition(SessionStatus::NextStep)?;
            }
        }

        session.transition(SessionStatus::Synthesizing)?;
        let answer = synthesize(session.completed_results(), &self.registry);
        session.transition(SessionStatus::Completed)?;
        metrics().session_completed(started.elapsed());

        let unverified = session
            .completed_results()
            .iter()
            .filter(|r| !r.verified)
            .count();
        let mut explanation = format!(
            "Completed {} delegation(s): {}",
            session.completed_results().len(),
            session.visited_profiles().join(" -> ")
        );
        if unverified > 0 {
            explanation.push_str(&format!(
                "; {} result(s) could not be verified",
                unverified
            ));
        }
        info!(depth = session.depth(), unverified, "Session completed");

        Ok(build_report(
            &session,
            TerminalReason::Completed,
            explanation,
            answer,
            None,
            None,
        ))
    }

    /// Dispatch one step, retrying per the failure policy
    async fn execute_step(
        &self,
        session: &mut DelegationSession,
        step: &DelegationStep,
        cancel: &CancellationToken,
    ) -> RoutingResult<StepOutcome> {
        let profile_id = step.profile_id.as_str();
        let Some(worker) = self.workers.get(profile_id) else {
            let failure = WorkerFailure::Unavailable(format!("no worker registered for '{}'", profile_id));
            return Ok(StepOutcome::Failed(RoutingError::from_worker_failure(
                profile_id, &failure,
            )));
        };
        let display_name = self
            .registry
            .get(profile_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| profile_id.to_string());

        let max_attempts = self.settings.retry_attempts.saturating_add(1);
        let timeout = self.settings.step_timeout;
        let worker_request = WorkerRequest::from_step(session.session_id(), step);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let span = dispatch_span!(profile = %profile_id, attempt = attempts, depth = session.depth());
            let dispatch_started = Instant::now();

            let dispatched = async {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Dispatch::Cancelled,
                    outcome = tokio::time::timeout(timeout, worker.execute(&worker_request, timeout)) => {
                        match outcome {
                            Ok(result) => Dispatch::Finished(result),
                            Err(_) => Dispatch::Finished(Err(WorkerFailure::Timeout(timeout))),
                        }
                    }
                }
            }
            .instrument(span)
            .await;
            metrics().dispatch_finished(profile_id, dispatch_started.elapsed());

            let output = match dispatched {
                Dispatch::Cancelled => {
                    warn!(profile = %profile_id, "Dispatch cancelled");
                    return Ok(StepOutcome::Cancelled);
                }
                Dispatch::Finished(Err(failure)) => {
                    metrics().dispatch_failed(profile_id, matches!(failure, WorkerFailure::Timeout(_)));
                    if failure.is_recoverable() && attempts < max_attempts {
                        warn!(profile = %profile_id, attempt = attempts, error = %failure, "Worker failed, retrying");
                        metrics().retry();
                        continue;
                    }
                    warn!(profile = %profile_id, attempt = attempts, error = %failure, "Worker failed");
                    return Ok(StepOutcome::Failed(RoutingError::from_worker_failure(
                        profile_id, &failure,
                    )));
                }
                Dispatch::Finished(Ok(output)) => output,
            };

            session.transition(SessionStatus::Verifying)?;
            let verdict = self.verifier.verify(step, &display_name, &output).await;

            if verdict.verified {
                return Ok(StepOutcome::Done {
                    result: new_result(profile_id, output.output, true, Vec::new(), attempts),
                    handoff: output.handoff,
                });
            }

            metrics().verification_failed(profile_id);
            if attempts < max_attempts {
                warn!(profile = %profile_id, notes = ?verdict.notes, "Verification failed, retrying");
                metrics().retry();
                session.transition(SessionStatus::Delegating)?;
                continue;
            }

            if self.settings.strict_verification {
                return Ok(StepOutcome::Failed(RoutingError::WorkerFailure {
                    profile: profile_id.to_string(),
                    message: format!("output failed verification: {}", verdict.notes.join("; ")),
                }));
            }

            warn!(profile = %profile_id, notes = ?verdict.notes, "Accepting unverified result");
            return Ok(StepOutcome::Done {
                result: new_result(profile_id, output.output, false, verdict.notes, attempts),
                handoff: None,
            });
        }
    }

    /// Queue a handoff step, or return the reason it was refused
    fn accept_handoff(
        &self,
        session: &mut DelegationSession,
        step: &DelegationStep,
        handoff: &Handoff,
    ) -> Option<String> {
        let target = handoff.profile_id.as_str();
        let refusal = if session.has_visited(target) {
            Some(format!("Handoff to '{}' refused: profile already visited", target))
        } else {
            match self
                .planner
                .plan_handoff(session.request(), handoff, &step.profile_id, &self.registry)
            {
                Ok(next) => {
                    info!(from = %step.profile_id, to = %target, "Handoff queued");
                    session.push_front(next);
                    None
                }
                Err(e) => Some(format!("Handoff to '{}' refused: {}", target, e)),
            }
        };

        if let Some(note) = &refusal {
            warn!(from = %step.profile_id, to = %target, "{}", note);
            metrics().handoff_refused();
        }
        refusal
    }

    fn answer_directly(
        &self,
        mut session: DelegationSession,
        reason: DirectReason,
    ) -> RoutingResult<SessionReport> {
        session.transition(SessionStatus::DirectAnswer)?;
        metrics().direct_answer();

        let (terminal, explanation) = match reason {
            DirectReason::DelegationForbidden => (
                TerminalReason::DelegationForbidden,
                "Delegation was explicitly forbidden; answer directly",
            ),
            DirectReason::NoActionableIntent => (
                TerminalReason::TrivialRequest,
                "No specialist intent detected; answer directly",
            ),
        };
        info!(?reason, "Direct answer");
        Ok(build_report(
            &session,
            terminal,
            explanation.to_string(),
            None,
            None,
            None,
        ))
    }

    fn ask(
        &self,
        mut session: DelegationSession,
        outcome: &AmbiguousOutcome,
    ) -> RoutingResult<SessionReport> {
        session.transition(SessionStatus::AwaitingClarification)?;
        metrics().clarification_requested();

        let pending = PendingClarification::from_ambiguity(outcome, session.request());
        let error = RoutingError::AmbiguousRouting {
            candidates: outcome.candidate_ids().iter().map(|s| s.to_string()).collect(),
        };
        info!(reason = ?outcome.reason, candidates = ?outcome.candidate_ids(), "Awaiting clarification");

        Ok(build_report(
            &session,
            TerminalReason::AmbiguousRouting,
            outcome.question.clone(),
            None,
            Some(pending),
            Some(error.to_error_details()),
        ))
    }

    fn ask_to_rephrase(
        &self,
        mut session: DelegationSession,
        error: RoutingError,
    ) -> RoutingResult<SessionReport> {
        session.transition(SessionStatus::AwaitingClarification)?;
        metrics().clarification_requested();
        warn!(error = %error, "Extraction failed, asking to rephrase");

        let pending = PendingClarification::rephrase(session.request());
        Ok(build_report(
            &session,
            TerminalReason::ExtractionError,
            pending.question.clone(),
            None,
            Some(pending),
            Some(error.to_error_details()),
        ))
    }

    fn abort(
        &self,
        mut session: DelegationSession,
        error: RoutingError,
        started: Instant,
    ) -> RoutingResult<SessionReport> {
        let reason = abort_reason(&error);
        session.transition(SessionStatus::Aborted(reason))?;
        metrics().session_aborted(started.elapsed());

        let details = error.to_error_details();
        let completed = session.completed_results().len();
        let explanation = format!(
            "Stopped ({}): {}. {} step(s) completed before stopping.",
            reason, details.message, completed
        );
        warn!(%reason, depth = session.depth(), completed, "Session aborted");

        let partial = synthesize(session.completed_results(), &self.registry);
        Ok(build_report(
            &session,
            terminal_reason(reason),
            explanation,
            partial,
            None,
            Some(details),
        ))
    }
}

fn abort_reason(error: &RoutingError) -> AbortReason {
    match error {
        RoutingError::DepthExceeded { .. } => AbortReason::DepthExceeded,
        RoutingError::PlanningConstraintViolation { .. } => {
            AbortReason::PlanningConstraintViolation
        }
        RoutingError::Cancelled => AbortReason::Cancelled,
        _ => AbortReason::WorkerFailure,
    }
}

fn terminal_reason(reason: AbortReason) -> TerminalReason {
    match reason {
        AbortReason::DepthExceeded => TerminalReason::DepthExceeded,
        AbortReason::WorkerFailure => TerminalReason::WorkerFailure,
        AbortReason::PlanningConstraintViolation => TerminalReason::PlanningConstraintViolation,
        AbortReason::Cancelled => TerminalReason::Cancelled,
    }
}

fn new_result(
    profile_id: &str,
    output: String,
    verified: bool,
    notes: Vec<String>,
    attempts: u32,
) -> DelegationResult {
    DelegationResult {
        profile_id: profile_id.to_string(),
        output,
        verified,
        verifier_notes: notes,
        attempts,
        completed_at: Utc::now(),
    }
}

fn build_report(
    session: &DelegationSession,
    reason: TerminalReason,
    explanation: String,
    answer: Option<String>,
    clarification: Option<PendingClarification>,
    error: Option<ErrorDetails>,
) -> SessionReport {
    SessionReport {
        session_id: session.session_id(),
        status: session.status(),
        reason,
        explanation: sanitize_error_message(&explanation),
        answer,
        clarification,
        error,
        results: session.completed_results().to_vec(),
        depth: session.depth(),
        visited_profiles: session.visited_profiles().to_vec(),
    }
}
