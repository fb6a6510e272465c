//! Candidate scoring
//!
//! A candidate is a profile paired with the usable intent signals it claims.
//! Candidates are derived and transient: recomputed for every request.

use crate::intent::IntentSignal;
use crate::registry::{Lexicon, Profile, ProfileRegistry, ScannedText};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scores closer than this are treated as tied
pub const SCORE_EPSILON: f64 = 1e-9;

/// Intent signal claimed by a candidate, with its first affirmed mention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedIntent {
    pub tag: String,
    pub confidence: f64,
    /// Byte offset of the earliest non-negated keyword for this tag
    pub first_mention: Option<usize>,
}

/// Profile matched against a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub profile: Profile,
    pub matched: Vec<MatchedIntent>,
    /// Sum of the confidences of the matched signals
    pub score: f64,
}

impl Candidate {
    pub fn id(&self) -> &str {
        &self.profile.id
    }

    pub fn matched_tags(&self) -> impl Iterator<Item = &str> {
        self.matched.iter().map(|m| m.tag.as_str())
    }

    /// Earliest mention across all matched tags
    pub fn first_mention(&self) -> Option<usize> {
        self.matched.iter().filter_map(|m| m.first_mention).min()
    }

    /// Highest confidence among the matched signals
    pub fn top_confidence(&self) -> f64 {
        self.matched
            .iter()
            .map(|m| m.confidence)
            .fold(0.0, f64::max)
    }

    pub fn ties_with(&self, other: &Candidate) -> bool {
        (self.score - other.score).abs() < SCORE_EPSILON
    }
}

/// Usable signals for a request, keyed by tag
///
/// Duplicate tags keep their highest confidence. Signals below the noise floor
/// and tags whose every keyword mention is negated are dropped.
pub fn usable_signals(
    signals: &[IntentSignal],
    scan: &ScannedText,
    lexicon: &Lexicon,
    noise_floor: f64,
) -> BTreeMap<String, f64> {
    let mut usable: BTreeMap<String, f64> = BTreeMap::new();
    for signal in signals {
        if signal.confidence < noise_floor {
            continue;
        }
        if scan.all_negated(lexicon.keywords(&signal.tag), &lexicon.negations) {
            continue;
        }
        let entry = usable.entry(signal.tag.clone()).or_insert(0.0);
        *entry = entry.max(signal.confidence);
    }
    usable
}

/// Build a candidate for one profile; `None` when it claims no usable signal
pub fn score_profile(
    profile: &Profile,
    usable: &BTreeMap<String, f64>,
    scan: &ScannedText,
    lexicon: &Lexicon,
) -> Option<Candidate> {
    let matched: Vec<MatchedIntent> = usable
        .iter()
        .filter(|(tag, _)| profile.claims(tag))
        .map(|(tag, &confidence)| MatchedIntent {
            tag: tag.clone(),
            confidence,
            first_mention: scan.first_affirmed(lexicon.keywords(tag), &lexicon.negations),
        })
        .collect();

    if matched.is_empty() {
        return None;
    }

    let score = matched.iter().map(|m| m.confidence).sum();
    Some(Candidate {
        profile: profile.clone(),
        matched,
        score,
    })
}

/// Score every profile and rank by descending score
///
/// Equal scores keep registry declaration order; the sort is stable.
pub fn rank_candidates(
    usable: &BTreeMap<String, f64>,
    registry: &ProfileRegistry,
    scan: &ScannedText,
) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = registry
        .profiles()
        .iter()
        .filter_map(|p| score_profile(p, usable, scan, registry.lexicon()))
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
