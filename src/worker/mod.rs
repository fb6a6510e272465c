//! Specialist worker interface
//!
//! Workers are opaque executors: the engine hands them a scoped
//! `WorkerRequest` and receives raw output or a failure. How a worker produces
//! its output is outside this crate.

use crate::protocol::{WorkerOutput, WorkerRequest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by (or on behalf of) a worker
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkerFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{message}")]
    Failed { message: String, recoverable: bool },

    #[error("worker unavailable: {0}")]
    Unavailable(String),
}

impl WorkerFailure {
    /// Failure worth one retry with the same step
    pub fn recoverable<S: Into<String>>(message: S) -> Self {
        Self::Failed {
            message: message.into(),
            recoverable: true,
        }
    }

    /// Failure that aborts the session immediately
    pub fn unrecoverable<S: Into<String>>(message: S) -> Self {
        Self::Failed {
            message: message.into(),
            recoverable: false,
        }
    }

    /// Timeouts count as recoverable; an unavailable worker does not
    pub fn is_recoverable(&self) -> bool {
        match self {
            WorkerFailure::Timeout(_) => true,
            WorkerFailure::Failed { recoverable, .. } => *recoverable,
            WorkerFailure::Unavailable(_) => false,
        }
    }
}

/// Executor for one specialist profile
#[async_trait::async_trait]
pub trait Worker: Send + Sync {
    /// Execute a scoped subtask
    ///
    /// `timeout` is advisory; the session enforces it independently.
    async fn execute(
        &self,
        request: &WorkerRequest,
        timeout: Duration,
    ) -> Result<WorkerOutput, WorkerFailure>;
}

/// Workers keyed by profile id
#[derive(Clone, Default)]
pub struct WorkerPool {
    workers: HashMap<String, Arc<dyn Worker>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the worker for a profile
    pub fn register(&mut self, profile_id: impl Into<String>, worker: Arc<dyn Worker>) {
        self.workers.insert(profile_id.into(), worker);
    }

    pub fn with_worker(mut self, profile_id: impl Into<String>, worker: Arc<dyn Worker>) -> Self {
        self.register(profile_id, worker);
        self
    }

    pub fn get(&self, profile_id: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(profile_id).cloned()
    }

    pub fn contains(&self, profile_id: &str) -> bool {
        self.workers.contains_key(profile_id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.workers.keys().collect();
        ids.sort();
        f.debug_struct("WorkerPool").field("profiles", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait::async_trait]
    impl Worker for Echo {
        async fn execute(
            &self,
            request: &WorkerRequest,
            _timeout: Duration,
        ) -> Result<WorkerOutput, WorkerFailure> {
            Ok(WorkerOutput::text(request.subtask.clone()))
        }
    }

    #[test]
    fn test_recoverability() {
        assert!(WorkerFailure::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(WorkerFailure::recoverable("rate limited").is_recoverable());
        assert!(!WorkerFailure::unrecoverable("refused").is_recoverable());
        assert!(!WorkerFailure::Unavailable("down".to_string()).is_recoverable());
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(WorkerFailure::recoverable("rate limited").to_string(), "rate limited");
        assert_eq!(
            WorkerFailure::Unavailable("down".to_string()).to_string(),
            "worker unavailable: down"
        );
    }

    #[test]
    fn test_pool_lookup() {
        let pool = WorkerPool::new().with_worker("developer", Arc::new(Echo));

        assert!(pool.contains("developer"));
        assert!(pool.get("researcher").is_none());
        assert_eq!(pool.len(), 1);
        assert!(format!("{:?}", pool).contains("developer"));
    }
}
