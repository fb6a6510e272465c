//! Routing decisions
//!
//! This module decides who handles a request. Candidates are scored from
//! intent signals, ties go through the precedence ladder, and the outcome is
//! one of three things:
//!
//! - `Selected`: exactly one primary profile (plus the ranked candidates the
//!   planner may use for secondary steps or substitution)
//! - `Ambiguous`: two or three candidates and a single clarifying question
//! - `Direct`: no delegation at all
//!
//! ```text
//! signals → usable signals → ranked candidates → tie-break ladder → threshold → Resolution
//! ```

pub mod candidate;
pub mod resolver;
pub mod tie_break;

pub use candidate::{Candidate, MatchedIntent};
pub use resolver::{
    resolve, PrecedenceResolver, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NOISE_FLOOR,
    MAX_CLARIFICATION_CANDIDATES,
};
pub use tie_break::TieBreakRule;

use serde::{Deserialize, Serialize};

/// Outcome of precedence resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Resolution {
    Selected(Selection),
    Ambiguous(AmbiguousOutcome),
    Direct(DirectReason),
}

/// Why a request is answered without delegation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectReason {
    DelegationForbidden,
    NoActionableIntent,
}

/// Single selected profile plus every ranked candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub primary: Candidate,
    /// Ranked candidates, primary first
    pub candidates: Vec<Candidate>,
}

impl Selection {
    /// Build a selection; the primary is moved to the front of `ranked`
    pub fn new(primary: Candidate, ranked: Vec<Candidate>) -> Self {
        let mut candidates = Vec::with_capacity(ranked.len() + 1);
        candidates.push(primary.clone());
        candidates.extend(ranked.into_iter().filter(|c| c.id() != primary.id()));
        Self {
            primary,
            candidates,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityReason {
    /// Candidates stayed tied after every tie-break rule
    Tie,
    /// The strongest signal is below the confidence threshold
    LowConfidence,
    /// The only viable candidate is the orchestrator itself
    SelfDelegation,
}

/// Candidates the user must choose between, with the question to ask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbiguousOutcome {
    pub candidates: Vec<Candidate>,
    pub question: String,
    pub reason: AmbiguityReason,
}

impl AmbiguousOutcome {
    pub fn new(candidates: Vec<Candidate>, reason: AmbiguityReason) -> Self {
        let question = clarifying_question(&candidates);
        Self {
            candidates,
            question,
            reason,
        }
    }

    pub fn candidate_ids(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.id()).collect()
    }
}

/// One natural-language question naming the candidates
pub fn clarifying_question(candidates: &[Candidate]) -> String {
    let names: Vec<&str> = candidates
        .iter()
        .map(|c| c.profile.display_name.as_str())
        .collect();

    match names.as_slice() {
        [] => "Could you say a bit more about what you need?".to_string(),
        [only] => format!(
            "Should this go to the {}, or can it be answered directly?",
            only
        ),
        [first, second] => format!("Should this go to the {} or the {}?", first, second),
        [init @ .., last] => {
            let listed: Vec<String> = init.iter().map(|n| format!("the {}", n)).collect();
            format!("Should this go to {}, or the {}?", listed.join(", "), last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Profile;

    fn candidate(id: &str, name: &str, score: f64) -> Candidate {
        Candidate {
            profile: Profile::new(id, name),
            matched: Vec::new(),
            score,
        }
    }

    #[test]
    fn test_selection_puts_primary_first() {
        let ranked = vec![
            candidate("researcher", "Researcher", 0.9),
            candidate("developer", "Developer", 0.9),
            candidate("narrative-writer", "Narrative Writer", 0.3),
        ];
        let selection = Selection::new(ranked[1].clone(), ranked);
        let ids: Vec<_> = selection.candidates.iter().map(|c| c.id()).collect();

        assert_eq!(ids, vec!["developer", "researcher", "narrative-writer"]);
    }

    #[test]
    fn test_question_wording() {
        let a = candidate("researcher", "Researcher", 0.5);
        let b = candidate("narrative-writer", "Narrative Writer", 0.5);
        let c = candidate("critique-reviewer", "Critique Reviewer", 0.4);

        assert_eq!(
            clarifying_question(&[a.clone()]),
            "Should this go to the Researcher, or can it be answered directly?"
        );
        assert_eq!(
            clarifying_question(&[a.clone(), b.clone()]),
            "Should this go to the Researcher or the Narrative Writer?"
        );
        assert_eq!(
            clarifying_question(&[a, b, c]),
            "Should this go to the Researcher, the Narrative Writer, or the Critique Reviewer?"
        );
    }

    #[test]
    fn test_resolution_serializes_with_outcome_tag() {
        let json = serde_json::to_value(Resolution::Direct(DirectReason::NoActionableIntent)).unwrap();
        assert_eq!(json["outcome"], "direct");
    }
}
