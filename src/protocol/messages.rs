//! Data model for the Delegation Decision Protocol
//!
//! This module defines the structures that flow through a delegation session:
//! the immutable top-level request, planned delegation steps, the payloads
//! exchanged with workers, and the append-only results log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable top-level request handed to the orchestrator
///
/// Created once at session start and never mutated afterwards. A resumed
/// clarification produces a new `Request` rather than editing this one.
///
/// # Examples
/// ```
/// use ddp_router::protocol::Request;
///
/// let request = Request::new("Write a script that parses CSV and sorts by revenue")
///     .with_constraint("Python 3.11 only");
///
/// assert!(!request.forbid_delegation);
/// assert_eq!(request.constraints.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// Raw request text as written by the user
    pub text: String,
    /// Caller-supplied constraints forwarded to every delegation step
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Explicit no-delegation override
    #[serde(default)]
    pub forbid_delegation: bool,
    /// Profile chosen by the user while answering a clarification question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_profile: Option<String>,
    /// Offered candidates the user passed over in favour of the pinned one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declined_profiles: Vec<String>,
}

impl Request {
    /// Create a request with no constraints
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            constraints: Vec::new(),
            forbid_delegation: false,
            pinned_profile: None,
            declined_profiles: Vec::new(),
        }
    }

    /// Add a constraint forwarded to every step
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    /// Forbid any delegation for this request
    pub fn forbidding_delegation(mut self) -> Self {
        self.forbid_delegation = true;
        self
    }

    /// Pin the request to a specific profile
    pub fn with_pinned_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.pinned_profile = Some(profile_id.into());
        self
    }

    /// Exclude a profile from planning when a pinned profile is selected
    pub fn declining_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.declined_profiles.push(profile_id.into());
        self
    }
}

/// Declared success criteria for one delegation step
///
/// `required_terms` must all appear in the worker output; when `any_of_terms`
/// is non-empty at least one of them must appear. Matching is case-insensitive
/// substring matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SuccessCriteria {
    /// Human-readable statement of what a successful result looks like
    pub summary: String,
    #[serde(default)]
    pub required_terms: Vec<String>,
    #[serde(default)]
    pub any_of_terms: Vec<String>,
}

impl SuccessCriteria {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            required_terms: Vec::new(),
            any_of_terms: Vec::new(),
        }
    }

    pub fn with_required_terms(mut self, terms: Vec<String>) -> Self {
        self.required_terms = terms;
        self
    }

    pub fn with_any_of_terms(mut self, terms: Vec<String>) -> Self {
        self.any_of_terms = terms;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.summary.trim().is_empty()
    }
}

/// One planned delegation: a scoped subtask for exactly one profile
///
/// Steps are immutable once planned and consumed one at a time by the session.
/// Construct them through `planning::DelegationStepBuilder`, which rejects
/// missing mandatory fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegationStep {
    /// Target profile identifier
    pub profile_id: String,
    /// Role statement for the worker
    pub role: String,
    /// Scoped restatement of the work, never the raw request alone
    pub subtask: String,
    pub success_criteria: SuccessCriteria,
    pub constraints: Vec<String>,
    pub return_format: String,
    /// `true` when a fresh worker instance must be spawned
    pub reset: bool,
}

/// Handoff requested by a worker at the end of its step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Handoff {
    /// Profile the worker wants to hand the remaining work to
    pub profile_id: String,
    /// What the next profile should do
    pub subtask: String,
}

/// Payload dispatched to a worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerRequest {
    pub session_id: Uuid,
    pub profile_id: String,
    pub role: String,
    pub subtask: String,
    pub success_criteria: SuccessCriteria,
    pub constraints: Vec<String>,
    pub return_format: String,
    pub reset: bool,
}

impl WorkerRequest {
    /// Build the worker payload for a planned step
    pub fn from_step(session_id: Uuid, step: &DelegationStep) -> Self {
        Self {
            session_id,
            profile_id: step.profile_id.clone(),
            role: step.role.clone(),
            subtask: step.subtask.clone(),
            success_criteria: step.success_criteria.clone(),
            constraints: step.constraints.clone(),
            return_format: step.return_format.clone(),
            reset: step.reset,
        }
    }
}

/// Raw output returned by a worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerOutput {
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<Handoff>,
}

impl WorkerOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            handoff: None,
        }
    }

    pub fn with_handoff(mut self, profile_id: impl Into<String>, subtask: impl Into<String>) -> Self {
        self.handoff = Some(Handoff {
            profile_id: profile_id.into(),
            subtask: subtask.into(),
        });
        self
    }
}

/// Entry of the append-only results log
///
/// Never mutated after being appended to the session; insertion order is the
/// order used for synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegationResult {
    pub profile_id: String,
    pub output: String,
    pub verified: bool,
    #[serde(default)]
    pub verifier_notes: Vec<String>,
    /// Number of dispatch attempts spent on the step (1 or 2)
    pub attempts: u32,
    pub completed_at: DateTime<Utc>,
}

/// Machine-readable error codes carried by failed or suspended sessions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ExtractionError,
    AmbiguousRouting,
    PlanningConstraintViolation,
    WorkerTimeout,
    WorkerFailure,
    DepthExceeded,
    Cancelled,
    InvalidConfig,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ExtractionError => "extraction_error",
            ErrorCode::AmbiguousRouting => "ambiguous_routing",
            ErrorCode::PlanningConstraintViolation => "planning_constraint_violation",
            ErrorCode::WorkerTimeout => "worker_timeout",
            ErrorCode::WorkerFailure => "worker_failure",
            ErrorCode::DepthExceeded => "depth_exceeded",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::InvalidConfig => "invalid_config",
            ErrorCode::InternalError => "internal_error",
        }
    }
}

/// Error details attached to a session report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    /// Human-readable description (no sensitive data)
    pub message: String,
}
