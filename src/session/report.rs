//! Terminal session reports
//!
//! Every session ends (or suspends) with a report carrying a machine-readable
//! reason plus a human-readable explanation.

use super::state::SessionStatus;
use crate::protocol::{DelegationResult, ErrorDetails, Request};
use crate::routing::AmbiguousOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    DelegationForbidden,
    TrivialRequest,
    AmbiguousRouting,
    ExtractionError,
    Completed,
    DepthExceeded,
    WorkerFailure,
    PlanningConstraintViolation,
    Cancelled,
}

/// Candidate offered in a clarifying question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferedCandidate {
    pub profile_id: String,
    pub display_name: String,
}

/// Suspended session state handed back to `Orchestrator::resume`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingClarification {
    pub question: String,
    pub candidates: Vec<OfferedCandidate>,
    /// Request as it stood when the question was asked
    pub request: Request,
}

impl PendingClarification {
    pub fn from_ambiguity(outcome: &AmbiguousOutcome, request: &Request) -> Self {
        Self {
            question: outcome.question.clone(),
            candidates: outcome
                .candidates
                .iter()
                .map(|c| OfferedCandidate {
                    profile_id: c.profile.id.clone(),
                    display_name: c.profile.display_name.clone(),
                })
                .collect(),
            request: request.clone(),
        }
    }

    /// Question asked when extraction failed and no candidates exist
    pub fn rephrase(request: &Request) -> Self {
        Self {
            question: "I couldn't work out what kind of help you need. Could you rephrase the request?"
                .to_string(),
            candidates: Vec::new(),
            request: request.clone(),
        }
    }

    /// The single offered candidate named in a reply, if exactly one is
    ///
    /// Matches on profile id or display name, case-insensitively.
    pub fn match_reply(&self, reply: &str) -> Option<&OfferedCandidate> {
        let lowered = reply.to_lowercase();
        let mut named = self.candidates.iter().filter(|c| {
            lowered.contains(&c.profile_id.to_lowercase())
                || lowered.contains(&c.display_name.to_lowercase())
        });
        let first = named.next()?;
        match named.next() {
            Some(_) => None,
            None => Some(first),
        }
    }
}

/// Final (or suspended) outcome of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub reason: TerminalReason,
    /// Sanitized, human-readable explanation of the outcome
    pub explanation: String,
    /// Synthesized answer (partial when aborted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification: Option<PendingClarification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    pub results: Vec<DelegationResult>,
    pub depth: u32,
    pub visited_profiles: Vec<String>,
}

impl SessionReport {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn dispatch_count(&self) -> usize {
        self.visited_profiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> PendingClarification {
        PendingClarification {
            question: "Should this go to the Researcher or the Narrative Writer?".to_string(),
            candidates: vec![
                OfferedCandidate {
                    profile_id: "researcher".to_string(),
                    display_name: "Researcher".to_string(),
                },
                OfferedCandidate {
                    profile_id: "narrative-writer".to_string(),
                    display_name: "Narrative Writer".to_string(),
                },
            ],
            request: Request::new("Tell me about whales"),
        }
    }

    #[test]
    fn test_reply_naming_one_candidate() {
        let pending = pending();
        let picked = pending.match_reply("The narrative writer, please");
        assert_eq!(picked.map(|c| c.profile_id.as_str()), Some("narrative-writer"));
    }

    #[test]
    fn test_reply_naming_both_or_none() {
        let pending = pending();
        assert!(pending.match_reply("researcher and narrative writer").is_none());
        assert!(pending.match_reply("something about blue whales").is_none());
    }

    #[test]
    fn test_terminal_reason_serde() {
        let json = serde_json::to_string(&TerminalReason::DepthExceeded).unwrap();
        assert_eq!(json, "\"depth_exceeded\"");
    }
}
