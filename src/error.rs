//! Error taxonomy for the delegation engine
//!
//! Every failure that can end or suspend a session maps onto a machine-readable
//! `ErrorCode` plus a sanitized human-readable message.

use crate::intent::ExtractionError;
use crate::protocol::messages::{ErrorCode, ErrorDetails};
use crate::worker::WorkerFailure;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const MAX_ERROR_MESSAGE_LEN: usize = 500;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern is valid")
});

/// Main error type for routing and delegation operations
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Intent extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Ambiguous routing between candidates: {}", candidates.join(", "))]
    AmbiguousRouting { candidates: Vec<String> },

    #[error("Planning constraint violated: {message}")]
    PlanningConstraintViolation { message: String },

    #[error("Worker '{profile}' timed out after {timeout_ms} ms")]
    WorkerTimeout { profile: String, timeout_ms: u64 },

    #[error("Worker '{profile}' failed: {message}")]
    WorkerFailure { profile: String, message: String },

    #[error("Delegation depth exceeded: attempted depth {attempted}, max depth {max}")]
    DepthExceeded { attempted: u32, max: u32 },

    #[error("Session cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl RoutingError {
    /// Machine-readable code for this error
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            RoutingError::Extraction(_) => ErrorCode::ExtractionError,
            RoutingError::AmbiguousRouting { .. } => ErrorCode::AmbiguousRouting,
            RoutingError::PlanningConstraintViolation { .. } => {
                ErrorCode::PlanningConstraintViolation
            }
            RoutingError::WorkerTimeout { .. } => ErrorCode::WorkerTimeout,
            RoutingError::WorkerFailure { .. } => ErrorCode::WorkerFailure,
            RoutingError::DepthExceeded { .. } => ErrorCode::DepthExceeded,
            RoutingError::Cancelled => ErrorCode::Cancelled,
            RoutingError::ConfigError(_) => ErrorCode::InvalidConfig,
            RoutingError::InternalError { .. } => ErrorCode::InternalError,
        }
    }

    /// Convert into report-ready error details with a sanitized message
    pub fn to_error_details(&self) -> ErrorDetails {
        ErrorDetails {
            code: self.to_error_code(),
            message: sanitize_error_message(&self.to_string()),
        }
    }

    /// Create planning constraint violation error
    pub fn planning_violation<S: Into<String>>(message: S) -> Self {
        Self::PlanningConstraintViolation {
            message: message.into(),
        }
    }

    /// Create depth exceeded error
    pub fn depth_exceeded(attempted: u32, max: u32) -> Self {
        Self::DepthExceeded { attempted, max }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Map a worker failure for the given profile onto the routing taxonomy
    pub fn from_worker_failure(profile: &str, failure: &WorkerFailure) -> Self {
        match failure {
            WorkerFailure::Timeout(elapsed) => Self::WorkerTimeout {
                profile: profile.to_string(),
                timeout_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            },
            other => Self::WorkerFailure {
                profile: profile.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Strip secrets and sensitive paths from a message and cap its length
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let mut sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(truncate_suffix);
    }

    sanitized
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
