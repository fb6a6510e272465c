//! Delegation session state
//!
//! A session is exclusively owned by the task orchestrating it. Depth and the
//! visited-profile log bound delegation without scanning unbounded history.

use crate::error::{RoutingError, RoutingResult};
use crate::protocol::{DelegationResult, DelegationStep, Request};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Why a session stopped before completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    DepthExceeded,
    WorkerFailure,
    /// Construction error: the plan itself was invalid
    PlanningConstraintViolation,
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbortReason::DepthExceeded => "depth_exceeded",
            AbortReason::WorkerFailure => "worker_failure",
            AbortReason::PlanningConstraintViolation => "planning_constraint_violation",
            AbortReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionStatus {
    Classifying,
    DirectAnswer,
    AwaitingClarification,
    Delegating,
    Verifying,
    NextStep,
    Synthesizing,
    Completed,
    Aborted(AbortReason),
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::DirectAnswer
                | SessionStatus::AwaitingClarification
                | SessionStatus::Completed
                | SessionStatus::Aborted(_)
        )
    }

    /// Whether the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Classifying, DirectAnswer | AwaitingClarification | Delegating) => true,
            (Delegating, Verifying) => true,
            (Verifying, NextStep | Synthesizing | Delegating) => true,
            (NextStep, Delegating) => true,
            (Synthesizing, Completed) => true,
            (state, Aborted(_)) => !state.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Classifying => write!(f, "classifying"),
            SessionStatus::DirectAnswer => write!(f, "direct_answer"),
            SessionStatus::AwaitingClarification => write!(f, "awaiting_clarification"),
            SessionStatus::Delegating => write!(f, "delegating"),
            SessionStatus::Verifying => write!(f, "verifying"),
            SessionStatus::NextStep => write!(f, "next_step"),
            SessionStatus::Synthesizing => write!(f, "synthesizing"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Aborted(reason) => write!(f, "aborted({})", reason),
        }
    }
}

/// State of one end-to-end task
#[derive(Debug, Clone)]
pub struct DelegationSession {
    session_id: Uuid,
    request: Request,
    depth: u32,
    max_depth: u32,
    visited_profiles: Vec<String>,
    steps: VecDeque<DelegationStep>,
    completed_results: Vec<DelegationResult>,
    status: SessionStatus,
}

impl DelegationSession {
    pub fn new(request: Request, max_depth: u32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            request,
            depth: 0,
            max_depth,
            visited_profiles: Vec::new(),
            steps: VecDeque::new(),
            completed_results: Vec::new(),
            status: SessionStatus::Classifying,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn visited_profiles(&self) -> &[String] {
        &self.visited_profiles
    }

    pub fn completed_results(&self) -> &[DelegationResult] {
        &self.completed_results
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn pending_steps(&self) -> usize {
        self.steps.len()
    }

    /// Move to the next state
    ///
    /// # Errors
    ///
    /// `InternalError` when the state machine does not allow the move.
    pub fn transition(&mut self, next: SessionStatus) -> RoutingResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(RoutingError::internal_error(format!(
                "illegal session transition {} -> {}",
                self.status, next
            )));
        }
        debug!(
            session_id = %self.session_id,
            from = %self.status,
            to = %next,
            "Session transition"
        );
        self.status = next;
        Ok(())
    }

    /// Queue steps at the back
    pub fn enqueue(&mut self, steps: impl IntoIterator<Item = DelegationStep>) {
        self.steps.extend(steps);
    }

    /// Queue a step to run next
    pub fn push_front(&mut self, step: DelegationStep) {
        self.steps.push_front(step);
    }

    pub fn next_step(&mut self) -> Option<DelegationStep> {
        self.steps.pop_front()
    }

    /// Account for one delegation to `profile_id`
    ///
    /// # Errors
    ///
    /// `DepthExceeded` when the depth budget is already spent; the depth and
    /// visited log are left untouched in that case.
    pub fn begin_delegation(&mut self, profile_id: &str) -> RoutingResult<()> {
        if self.depth >= self.max_depth {
            return Err(RoutingError::depth_exceeded(self.depth + 1, self.max_depth));
        }
        self.depth += 1;
        self.visited_profiles.push(profile_id.to_string());
        Ok(())
    }

    pub fn has_visited(&self, profile_id: &str) -> bool {
        self.visited_profiles.iter().any(|p| p == profile_id)
    }

    /// Append to the results log
    pub fn record(&mut self, result: DelegationResult) {
        self.completed_results.push(result);
    }
}
