//! Delegation sessions
//!
//! One session per top-level request: the state machine, the orchestrator
//! that drives it, synthesis of the results log and the terminal report.
//!
//! ```text
//! Classifying ─┬─> DirectAnswer
//!              ├─> AwaitingClarification
//!              └─> Delegating ─> Verifying ─┬─> NextStep ─> Delegating ...
//!                                           └─> Synthesizing ─> Completed
//! (any non-terminal state) ─> Aborted(reason)
//! ```

pub mod orchestrator;
pub mod report;
pub mod state;
pub mod synthesis;

pub use orchestrator::{Orchestrator, OrchestratorSettings, RoutePreview};
pub use report::{OfferedCandidate, PendingClarification, SessionReport, TerminalReason};
pub use state::{AbortReason, DelegationSession, SessionStatus};
pub use synthesis::synthesize;
