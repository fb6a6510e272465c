//! Tie-break ladder
//!
//! Applied to candidates that share the maximal score. Exclusion groups
//! collapse first, then the stance rules run in fixed priority order, each
//! one only narrowing the set when it can actually discriminate.

use super::candidate::Candidate;
use crate::registry::{ProfileRegistry, ScannedText, Stance};
use std::collections::HashSet;
use tracing::debug;

/// Which rung of the ladder settled (or failed to settle) a tie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreakRule {
    ExclusionGroup,
    ExecutionVsAssessment,
    PlanVsImplementation,
    CritiqueVsCreation,
    FirstMentioned,
}

/// Keep only the first-declared member of each exclusion group
pub fn collapse_exclusion_groups(tied: Vec<Candidate>, registry: &ProfileRegistry) -> Vec<Candidate> {
    let mut ordered = tied;
    ordered.sort_by_key(|c| registry.position(c.id()).unwrap_or(usize::MAX));

    let mut seen_groups = HashSet::new();
    ordered
        .into_iter()
        .filter(|c| match &c.profile.exclusion_group {
            Some(group) => seen_groups.insert(group.clone()),
            None => true,
        })
        .collect()
}

/// Run the full ladder; the result holds one candidate unless the tie survives
pub fn break_tie(
    tied: Vec<Candidate>,
    registry: &ProfileRegistry,
    scan: &ScannedText,
) -> (Vec<Candidate>, Option<TieBreakRule>) {
    let mut remaining = collapse_exclusion_groups(tied, registry);
    if remaining.len() == 1 {
        return (remaining, Some(TieBreakRule::ExclusionGroup));
    }

    let lexicon = registry.lexicon();
    let negations = &lexicon.negations;

    // a. execution vs assessment: the verb class that appears first wins
    let creation = scan.first_affirmed(&lexicon.creation_verbs, negations);
    let assessment = scan.first_affirmed(&lexicon.assessment_verbs, negations);
    if let Some((favored, disfavored)) = earlier_class(
        creation,
        assessment,
        (Stance::Execute, Stance::Assess),
    ) {
        remaining = prefer_stance(remaining, favored, disfavored);
        if remaining.len() == 1 {
            return (remaining, Some(TieBreakRule::ExecutionVsAssessment));
        }
    }

    // b. plan vs implementation: planning vocabulary must come first
    let planning = scan.first_affirmed(&lexicon.planning_terms, negations);
    let implementation = scan.first_affirmed(&lexicon.implementation_terms, negations);
    let plan_first = match (planning, implementation) {
        (Some(p), Some(i)) => p < i,
        (Some(_), None) => true,
        _ => false,
    };
    let (favored, disfavored) = if plan_first {
        (Stance::Plan, Stance::Implement)
    } else {
        (Stance::Implement, Stance::Plan)
    };
    remaining = prefer_stance(remaining, favored, disfavored);
    if remaining.len() == 1 {
        return (remaining, Some(TieBreakRule::PlanVsImplementation));
    }

    // c. critique vs creation
    let evaluative = scan
        .first_affirmed(&lexicon.evaluative_terms, negations)
        .is_some();
    let (favored, disfavored) = if evaluative {
        (Stance::Critique, Stance::Create)
    } else {
        (Stance::Create, Stance::Critique)
    };
    remaining = prefer_stance(remaining, favored, disfavored);
    if remaining.len() == 1 {
        return (remaining, Some(TieBreakRule::CritiqueVsCreation));
    }

    // d. first mentioned wins
    remaining = earliest_mentioned(remaining);
    if remaining.len() == 1 {
        return (remaining, Some(TieBreakRule::FirstMentioned));
    }

    debug!(
        candidates = ?remaining.iter().map(|c| c.id()).collect::<Vec<_>>(),
        "Tie survived every rule"
    );
    (remaining, None)
}

/// Order two verb classes by first appearance; `None` when neither occurs
fn earlier_class(
    first: Option<usize>,
    second: Option<usize>,
    stances: (Stance, Stance),
) -> Option<(Stance, Stance)> {
    let (a, b) = stances;
    match (first, second) {
        (Some(x), Some(y)) if x <= y => Some((a, b)),
        (Some(_), Some(_)) => Some((b, a)),
        (Some(_), None) => Some((a, b)),
        (None, Some(_)) => Some((b, a)),
        (None, None) => None,
    }
}

/// Drop candidates that hold only the disfavored stance
///
/// Applies only when some candidate holds the favored stance without the
/// disfavored one; otherwise the set is returned unchanged.
fn prefer_stance(candidates: Vec<Candidate>, favored: Stance, disfavored: Stance) -> Vec<Candidate> {
    let favored_only = |c: &Candidate| c.profile.has_stance(favored) && !c.profile.has_stance(disfavored);
    let disfavored_only =
        |c: &Candidate| c.profile.has_stance(disfavored) && !c.profile.has_stance(favored);

    if !candidates.iter().any(favored_only) || !candidates.iter().any(disfavored_only) {
        return candidates;
    }
    candidates.into_iter().filter(|c| !disfavored_only(c)).collect()
}

fn earliest_mentioned(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let Some(earliest) = candidates.iter().filter_map(|c| c.first_mention()).min() else {
        return candidates;
    };
    candidates
        .into_iter()
        .filter(|c| c.first_mention() == Some(earliest))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentSignal;
    use crate::registry::{Lexicon, Profile};
    use crate::routing::candidate::{rank_candidates, usable_signals};

    fn tied_for(
        registry: &ProfileRegistry,
        text: &str,
        signals: &[(&str, f64)],
    ) -> (Vec<Candidate>, ScannedText) {
        let scan = ScannedText::new(text);
        let signals: Vec<_> = signals.iter().map(|(t, c)| IntentSignal::new(*t, *c)).collect();
        let usable = usable_signals(&signals, &scan, registry.lexicon(), 0.25);
        (rank_candidates(&usable, registry, &scan), scan)
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.id()).collect()
    }

    #[test]
    fn test_assessment_verb_first_favors_assessor() {
        let registry = ProfileRegistry::builtin();
        let (tied, scan) = tied_for(
            &registry,
            "Find vulnerabilities and write code to patch them",
            &[("security_assess", 0.8), ("code_write", 0.8)],
        );

        let (winner, rule) = break_tie(tied, &registry, &scan);
        assert_eq!(ids(&winner), vec!["security-analyst"]);
        assert_eq!(rule, Some(TieBreakRule::ExecutionVsAssessment));
    }

    #[test]
    fn test_creation_verb_first_favors_executor() {
        let registry = ProfileRegistry::builtin();
        let (tied, scan) = tied_for(
            &registry,
            "Write code that can detect vulnerabilities",
            &[("security_assess", 0.8), ("code_write", 0.8)],
        );

        let (winner, _) = break_tie(tied, &registry, &scan);
        assert_eq!(ids(&winner), vec!["developer"]);
    }

    #[test]
    fn test_planning_vocabulary_first_favors_planner() {
        let registry = ProfileRegistry::builtin();
        let (tied, scan) = tied_for(
            &registry,
            "Design an import plan, then implement the migration scripts",
            &[("plan", 0.7), ("implement", 0.7)],
        );

        let (winner, rule) = break_tie(tied, &registry, &scan);
        assert_eq!(ids(&winner), vec!["data-architect"]);
        assert_eq!(rule, Some(TieBreakRule::PlanVsImplementation));
    }

    #[test]
    fn test_implementation_first_favors_implementer() {
        let registry = ProfileRegistry::builtin();
        let (tied, scan) = tied_for(
            &registry,
            "Build the loader; the schema can follow",
            &[("plan", 0.7), ("implement", 0.7)],
        );

        let (winner, _) = break_tie(tied, &registry, &scan);
        assert_eq!(ids(&winner), vec!["developer"]);
    }

    #[test]
    fn test_evaluative_vocabulary_favors_critique() {
        let registry = ProfileRegistry::builtin();
        let (tied, scan) = tied_for(
            &registry,
            "My story needs a review",
            &[("narrative_write", 0.7), ("review", 0.7)],
        );

        let (winner, rule) = break_tie(tied, &registry, &scan);
        assert_eq!(ids(&winner), vec!["critique-reviewer"]);
        assert_eq!(rule, Some(TieBreakRule::CritiqueVsCreation));
    }

    #[test]
    fn test_first_mentioned_wins() {
        let registry = ProfileRegistry::builtin();
        let (tied, scan) = tied_for(
            &registry,
            "Our forecast depends on the sources",
            &[("research", 0.7), ("forecast", 0.7)],
        );

        let (winner, rule) = break_tie(tied, &registry, &scan);
        assert_eq!(ids(&winner), vec!["financial-modeler"]);
        assert_eq!(rule, Some(TieBreakRule::FirstMentioned));
    }

    #[test]
    fn test_tie_survives_without_text_evidence() {
        let registry = ProfileRegistry::builtin();
        let (tied, scan) = tied_for(
            &registry,
            "Tell me about whales",
            &[("research", 0.5), ("narrative_write", 0.5)],
        );

        let (remaining, rule) = break_tie(tied, &registry, &scan);
        assert_eq!(ids(&remaining), vec!["researcher", "narrative-writer"]);
        assert_eq!(rule, None);
    }

    #[test]
    fn test_same_group_collapses_to_first_declared() {
        let profiles = vec![
            Profile::new("backend-dev", "Backend Developer")
                .with_tags(&["code_write"])
                .with_group("engineering")
                .with_stances(&[Stance::Execute]),
            Profile::new("frontend-dev", "Frontend Developer")
                .with_tags(&["code_write"])
                .with_group("engineering")
                .with_stances(&[Stance::Execute]),
        ];
        let registry = ProfileRegistry::new(profiles, Lexicon::builtin()).unwrap();
        let (tied, scan) = tied_for(&registry, "Write code", &[("code_write", 0.9)]);

        let (winner, rule) = break_tie(tied, &registry, &scan);
        assert_eq!(ids(&winner), vec!["backend-dev"]);
        assert_eq!(rule, Some(TieBreakRule::ExclusionGroup));
    }
}
