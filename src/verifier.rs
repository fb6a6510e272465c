//! Result verification
//!
//! Reconciles a worker's output with the step's declared success criteria.
//! The checks are keyword-level; an optional `SemanticEvaluator` can add a
//! stronger judgement once they pass. The verifier only reports: retrying an
//! unverified result is the session's decision.

use crate::protocol::{DelegationStep, WorkerOutput};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Verdict on one worker output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    pub notes: Vec<String>,
}

impl Verification {
    pub fn passed() -> Self {
        Self {
            verified: true,
            notes: Vec::new(),
        }
    }

    pub fn failed(notes: Vec<String>) -> Self {
        Self {
            verified: false,
            notes,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Semantic evaluation failed: {0}")]
pub struct EvaluationError(pub String);

/// External judge consulted after the keyword checks pass
#[async_trait::async_trait]
pub trait SemanticEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        step: &DelegationStep,
        output: &str,
    ) -> Result<Verification, EvaluationError>;
}

#[derive(Clone, Default)]
pub struct Verifier {
    evaluator: Option<Arc<dyn SemanticEvaluator>>,
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("has_evaluator", &self.evaluator.is_some())
            .finish()
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evaluator(evaluator: Arc<dyn SemanticEvaluator>) -> Self {
        Self {
            evaluator: Some(evaluator),
        }
    }

    /// Keyword-level checks only
    ///
    /// `display_name` lets the cycle guard recognise the profile by its
    /// human name as well as its id.
    pub fn check(&self, step: &DelegationStep, display_name: &str, output: &WorkerOutput) -> Verification {
        let mut notes = Vec::new();
        let text = output.output.trim();

        if text.is_empty() {
            notes.push("Output is empty".to_string());
            return Verification::failed(notes);
        }

        let lowered = text.to_lowercase();
        for term in &step.success_criteria.required_terms {
            if !lowered.contains(&term.to_lowercase()) {
                notes.push(format!("Missing required term '{}'", term));
            }
        }

        let any_of = &step.success_criteria.any_of_terms;
        if !any_of.is_empty() && !any_of.iter().any(|t| lowered.contains(&t.to_lowercase())) {
            notes.push(format!(
                "None of the expected terms present: {}",
                any_of.join(", ")
            ));
        }

        if let Some(handoff) = &output.handoff {
            if handoff.profile_id == step.profile_id {
                notes.push(format!("Output hands work back to '{}'", step.profile_id));
            }
        }

        if requests_delegation_to(text, &step.profile_id, display_name) {
            notes.push(format!("Output asks to delegate back to '{}'", step.profile_id));
        }

        if notes.is_empty() {
            Verification::passed()
        } else {
            debug!(profile = %step.profile_id, ?notes, "Keyword verification failed");
            Verification::failed(notes)
        }
    }

    /// Keyword checks, then the semantic evaluator when one is configured
    pub async fn verify(
        &self,
        step: &DelegationStep,
        display_name: &str,
        output: &WorkerOutput,
    ) -> Verification {
        let verdict = self.check(step, display_name, output);
        let Some(evaluator) = &self.evaluator else {
            return verdict;
        };
        if !verdict.verified {
            return verdict;
        }

        match evaluator.evaluate(step, &output.output).await {
            Ok(semantic) => semantic,
            Err(e) => {
                warn!(profile = %step.profile_id, error = %e, "Semantic evaluator failed");
                Verification::failed(vec![e.to_string()])
            }
        }
    }
}

/// Whether the text asks to delegate, hand off, route or forward to a profile
fn requests_delegation_to(text: &str, profile_id: &str, display_name: &str) -> bool {
    let names = if display_name.trim().is_empty() {
        regex::escape(profile_id)
    } else {
        format!("{}|{}", regex::escape(profile_id), regex::escape(display_name))
    };
    let pattern = format!(
        r"(?i)\b(?:delegat\w*|hand(?:\s+\w+)?\s+(?:off|over)|rout\w*|forward\w*)\b[^.\n]{{0,60}}?\bto\s+(?:the\s+)?(?:{})\b",
        names
    );

    match Regex::new(&pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            warn!(error = %e, "Cycle guard pattern rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SuccessCriteria;

    fn step() -> DelegationStep {
        DelegationStep {
            profile_id: "developer".to_string(),
            role: "Developer".to_string(),
            subtask: "Write the parser".to_string(),
            success_criteria: SuccessCriteria::new("Parser delivered")
                .with_required_terms(vec!["csv".to_string()])
                .with_any_of_terms(vec!["code".to_string(), "script".to_string()]),
            constraints: vec!["Stay in scope".to_string()],
            return_format: "Code block".to_string(),
            reset: true,
        }
    }

    #[test]
    fn test_compliant_output_passes() {
        let verdict = Verifier::new().check(
            &step(),
            "Developer",
            &WorkerOutput::text("Here is the SCRIPT that reads the CSV file"),
        );
        assert!(verdict.verified);
        assert!(verdict.notes.is_empty());
    }

    #[test]
    fn test_empty_output_fails() {
        let verdict = Verifier::new().check(&step(), "Developer", &WorkerOutput::text("   "));
        assert!(!verdict.verified);
        assert_eq!(verdict.notes, vec!["Output is empty".to_string()]);
    }

    #[test]
    fn test_missing_terms_reported() {
        let verdict = Verifier::new().check(&step(), "Developer", &WorkerOutput::text("All done"));
        assert!(!verdict.verified);
        assert_eq!(verdict.notes.len(), 2);
        assert!(verdict.notes[0].contains("csv"));
        assert!(verdict.notes[1].contains("code, script"));
    }

    #[test]
    fn test_structured_handoff_to_self_fails() {
        let output = WorkerOutput::text("csv code ready").with_handoff("developer", "finish it");
        let verdict = Verifier::new().check(&step(), "Developer", &output);
        assert!(!verdict.verified);
        assert!(verdict.notes[0].contains("hands work back"));
    }

    #[test]
    fn test_textual_delegation_to_self_fails() {
        for text in [
            "csv code drafted; please delegate the rest to the developer",
            "csv code drafted, hand this off to Developer",
            "csv code drafted. Forward remaining work to developer.",
        ] {
            let verdict = Verifier::new().check(&step(), "Developer", &WorkerOutput::text(text));
            assert!(!verdict.verified, "cycle not caught in: {}", text);
        }
    }

    #[test]
    fn test_delegation_to_other_profile_is_fine() {
        let output = WorkerOutput::text("csv code drafted; delegate the review to the critique-reviewer");
        assert!(Verifier::new().check(&step(), "Developer", &output).verified);
    }

    struct Rejecting;

    #[async_trait::async_trait]
    impl SemanticEvaluator for Rejecting {
        async fn evaluate(
            &self,
            _step: &DelegationStep,
            _output: &str,
        ) -> Result<Verification, EvaluationError> {
            Ok(Verification::failed(vec!["Does not sort by revenue".to_string()]))
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl SemanticEvaluator for Broken {
        async fn evaluate(
            &self,
            _step: &DelegationStep,
            _output: &str,
        ) -> Result<Verification, EvaluationError> {
            Err(EvaluationError("judge offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_semantic_evaluator_consulted_after_keywords() {
        let verifier = Verifier::with_evaluator(Arc::new(Rejecting));
        let verdict = verifier
            .verify(&step(), "Developer", &WorkerOutput::text("csv script"))
            .await;
        assert!(!verdict.verified);
        assert_eq!(verdict.notes, vec!["Does not sort by revenue".to_string()]);
    }

    #[tokio::test]
    async fn test_evaluator_error_becomes_note() {
        let verifier = Verifier::with_evaluator(Arc::new(Broken));
        let verdict = verifier
            .verify(&step(), "Developer", &WorkerOutput::text("csv script"))
            .await;
        assert!(!verdict.verified);
        assert!(verdict.notes[0].contains("judge offline"));
    }
}
