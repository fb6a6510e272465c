//! Precedence resolver
//!
//! Turns intent signals into exactly one selected profile, an ambiguity that
//! needs a clarifying question, or a direct answer. The resolver is a pure
//! function of its inputs: no hidden state, identical output on replay.

use super::candidate::{rank_candidates, usable_signals, Candidate};
use super::tie_break::break_tie;
use super::{AmbiguityReason, AmbiguousOutcome, DirectReason, Resolution, Selection};
use crate::intent::{ExtractionError, IntentSignal};
use crate::protocol::Request;
use crate::registry::{ProfileRegistry, ScannedText};
use tracing::{debug, info};

/// Minimum top-signal confidence for an unambiguous selection
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Signals below this confidence are treated as noise
pub const DEFAULT_NOISE_FLOOR: f64 = 0.25;

/// Most candidates surfaced in a clarifying question
pub const MAX_CLARIFICATION_CANDIDATES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecedenceResolver {
    threshold: f64,
    noise_floor: f64,
}

impl Default for PrecedenceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NOISE_FLOOR)
    }
}

impl PrecedenceResolver {
    pub fn new(threshold: f64, noise_floor: f64) -> Self {
        Self {
            threshold,
            noise_floor,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Resolve a request to a profile
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::MalformedSignal` when any signal has an empty
    /// tag or a confidence outside [0, 1].
    pub fn resolve(
        &self,
        signals: &[IntentSignal],
        registry: &ProfileRegistry,
        request: &Request,
    ) -> Result<Resolution, ExtractionError> {
        if request.forbid_delegation {
            debug!("Delegation forbidden by request");
            return Ok(Resolution::Direct(DirectReason::DelegationForbidden));
        }

        for signal in signals {
            signal.validate()?;
        }

        let scan = ScannedText::new(&request.text);
        let usable = usable_signals(signals, &scan, registry.lexicon(), self.noise_floor);
        let ranked = rank_candidates(&usable, registry, &scan);

        if let Some(pinned) = request.pinned_profile.as_deref() {
            if let Some(selection) =
                Self::select_pinned(pinned, &request.declined_profiles, &ranked, registry)
            {
                info!(profile = %pinned, "Pinned profile selected");
                return Ok(Resolution::Selected(selection));
            }
            debug!(profile = %pinned, "Pinned profile not in registry, ignoring");
        }

        let Some(top) = ranked.first() else {
            debug!(signal_count = signals.len(), "No actionable intent");
            return Ok(Resolution::Direct(DirectReason::NoActionableIntent));
        };

        let mut tied: Vec<Candidate> = ranked
            .iter()
            .take_while(|c| c.ties_with(top))
            .cloned()
            .collect();

        if tied.len() > 1 {
            let (remaining, rule) = break_tie(tied, registry, &scan);
            if remaining.len() != 1 {
                let surfaced: Vec<Candidate> = remaining
                    .into_iter()
                    .take(MAX_CLARIFICATION_CANDIDATES)
                    .collect();
                info!(
                    candidates = ?surfaced.iter().map(|c| c.id()).collect::<Vec<_>>(),
                    "Tie remains after precedence ladder"
                );
                return Ok(Resolution::Ambiguous(AmbiguousOutcome::new(
                    surfaced,
                    AmbiguityReason::Tie,
                )));
            }
            debug!(?rule, winner = %remaining[0].id(), "Tie broken");
            tied = remaining;
        }

        let Some(primary) = tied.into_iter().next() else {
            return Ok(Resolution::Direct(DirectReason::NoActionableIntent));
        };

        let top_confidence = ranked
            .iter()
            .map(Candidate::top_confidence)
            .fold(0.0, f64::max);
        if top_confidence < self.threshold {
            let surfaced: Vec<Candidate> = ranked
                .iter()
                .take(MAX_CLARIFICATION_CANDIDATES)
                .cloned()
                .collect();
            info!(
                top_confidence,
                threshold = self.threshold,
                "Top confidence below threshold"
            );
            return Ok(Resolution::Ambiguous(AmbiguousOutcome::new(
                surfaced,
                AmbiguityReason::LowConfidence,
            )));
        }

        info!(profile = %primary.id(), score = primary.score, "Profile selected");
        Ok(Resolution::Selected(Selection::new(primary, ranked)))
    }

    fn select_pinned(
        pinned: &str,
        declined: &[String],
        ranked: &[Candidate],
        registry: &ProfileRegistry,
    ) -> Option<Selection> {
        let profile = registry.get(pinned)?;
        let primary = ranked
            .iter()
            .find(|c| c.id() == pinned)
            .cloned()
            .unwrap_or_else(|| Candidate {
                profile: profile.clone(),
                matched: Vec::new(),
                score: 0.0,
            });
        let kept: Vec<Candidate> = ranked
            .iter()
            .filter(|c| !declined.iter().any(|d| d == c.id()))
            .cloned()
            .collect();
        Some(Selection::new(primary, kept))
    }
}

/// Shorthand used by tests and the dry-run CLI
pub fn resolve(
    signals: &[IntentSignal],
    registry: &ProfileRegistry,
    request: &Request,
) -> Result<Resolution, ExtractionError> {
    PrecedenceResolver::default().resolve(signals, registry, request)
}
