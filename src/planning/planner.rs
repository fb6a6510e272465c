//! Delegation planner
//!
//! Decomposes a resolved request into ordered steps. The primary profile goes
//! first; every other candidate holding a confident intent that no earlier
//! step already claims becomes a secondary step, ordered by where its intent
//! is first mentioned in the text.

use super::segment::{clauses_covering, split_clauses};
use super::step::DelegationStepBuilder;
use crate::error::{RoutingError, RoutingResult};
use crate::protocol::{DelegationStep, Handoff, Request, SuccessCriteria};
use crate::registry::{Profile, ProfileRegistry};
use crate::routing::{
    AmbiguityReason, AmbiguousOutcome, Candidate, Selection, DEFAULT_CONFIDENCE_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

const SCOPE_CONSTRAINT: &str = "Stay within the scope of this subtask";
const BLOCKER_CONSTRAINT: &str = "Report blockers explicitly instead of guessing";
const CHAIN_CONSTRAINT: &str = "Build on the verified output of the previous step";

/// Result of planning a selected request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum PlanOutcome {
    Steps(Vec<DelegationStep>),
    Ambiguous(AmbiguousOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelegationPlanner {
    orchestrator_id: String,
    threshold: f64,
}

impl DelegationPlanner {
    pub fn new(orchestrator_id: impl Into<String>, threshold: f64) -> Self {
        Self {
            orchestrator_id: orchestrator_id.into(),
            threshold,
        }
    }

    pub fn orchestrator_id(&self) -> &str {
        &self.orchestrator_id
    }

    /// Plan the steps for a selected request
    ///
    /// # Errors
    ///
    /// `PlanningConstraintViolation` when a step cannot be given every
    /// mandatory field.
    pub fn plan(
        &self,
        request: &Request,
        selection: &Selection,
        registry: &ProfileRegistry,
    ) -> RoutingResult<PlanOutcome> {
        let eligible: Vec<&Candidate> = selection
            .candidates
            .iter()
            .filter(|c| !self.is_self(c.id()))
            .collect();

        let Some(&primary) = eligible.first() else {
            warn!(
                orchestrator = %self.orchestrator_id,
                "Only candidate is the orchestrator itself"
            );
            return Ok(PlanOutcome::Ambiguous(AmbiguousOutcome::new(
                Vec::new(),
                AmbiguityReason::SelfDelegation,
            )));
        };

        if primary.id() != selection.primary.id() {
            info!(
                original = %selection.primary.id(),
                substitute = %primary.id(),
                "Substituted self-delegating primary"
            );
        }

        let ordered = self.order_profiles(primary, &eligible[1..], registry);
        let multi_domain = ordered.len() > 1;
        let clauses = split_clauses(&request.text);

        let mut steps: Vec<DelegationStep> = Vec::with_capacity(ordered.len());
        for (index, (candidate, mentions)) in ordered.iter().enumerate() {
            let subtask = if multi_domain {
                let part = clauses_covering(&clauses, mentions)
                    .unwrap_or_else(|| request.text.trim().to_string());
                format!(
                    "As the {}, handle only this part: {}. Full request for context: {}",
                    candidate.profile.display_name,
                    part,
                    request.text.trim()
                )
            } else {
                format!(
                    "As the {}, handle the request: {}",
                    candidate.profile.display_name,
                    request.text.trim()
                )
            };

            let reset = steps
                .last()
                .map_or(true, |prev| prev.profile_id != candidate.id());
            let step = self.build_step(&candidate.profile, subtask, request, index > 0, reset)?;
            steps.push(step);
        }

        debug!(
            steps = ?steps.iter().map(|s| s.profile_id.as_str()).collect::<Vec<_>>(),
            "Plan built"
        );
        Ok(PlanOutcome::Steps(steps))
    }

    /// Plan the step for a worker-requested handoff
    ///
    /// # Errors
    ///
    /// `PlanningConstraintViolation` for unknown profiles, self-delegation or
    /// a handoff back to the profile that requested it.
    pub fn plan_handoff(
        &self,
        request: &Request,
        handoff: &Handoff,
        from_profile: &str,
        registry: &ProfileRegistry,
    ) -> RoutingResult<DelegationStep> {
        if self.is_self(&handoff.profile_id) {
            return Err(RoutingError::planning_violation(format!(
                "handoff to orchestrator '{}' is self-delegation",
                handoff.profile_id
            )));
        }
        if handoff.profile_id == from_profile {
            return Err(RoutingError::planning_violation(format!(
                "profile '{}' cannot hand off to itself",
                from_profile
            )));
        }
        let profile = registry.get(&handoff.profile_id).ok_or_else(|| {
            RoutingError::planning_violation(format!(
                "handoff names unknown profile '{}'",
                handoff.profile_id
            ))
        })?;

        let subtask = format!(
            "As the {}, continue from the previous step: {}. Full request for context: {}",
            profile.display_name,
            handoff.subtask.trim(),
            request.text.trim()
        );
        self.build_step(profile, subtask, request, true, true)
    }

    fn is_self(&self, profile_id: &str) -> bool {
        profile_id == self.orchestrator_id
    }

    /// Primary first, then secondaries in text order of their intents
    ///
    /// Each entry carries the mention offsets used to scope its subtask.
    fn order_profiles<'a>(
        &self,
        primary: &'a Candidate,
        others: &[&'a Candidate],
        registry: &ProfileRegistry,
    ) -> Vec<(&'a Candidate, Vec<usize>)> {
        let mut covered: BTreeSet<&str> = primary
            .profile
            .intent_tags
            .iter()
            .map(String::as_str)
            .collect();
        let primary_mentions: Vec<usize> = primary
            .matched
            .iter()
            .filter_map(|m| m.first_mention)
            .collect();

        let mut secondaries: Vec<(usize, &'a Candidate, Vec<usize>)> = Vec::new();
        for &candidate in others {
            if candidate.id() == primary.id() || registry.get(candidate.id()).is_none() {
                continue;
            }
            let fresh: Vec<_> = candidate
                .matched
                .iter()
                .filter(|m| m.confidence >= self.threshold && !covered.contains(m.tag.as_str()))
                .collect();
            if fresh.is_empty() {
                continue;
            }

            let mentions: Vec<usize> = fresh.iter().filter_map(|m| m.first_mention).collect();
            let key = mentions.iter().copied().min().unwrap_or(usize::MAX);
            covered.extend(candidate.profile.intent_tags.iter().map(String::as_str));
            secondaries.push((key, candidate, mentions));
        }
        secondaries.sort_by_key(|(key, _, _)| *key);

        let mut ordered = vec![(primary, primary_mentions)];
        ordered.extend(secondaries.into_iter().map(|(_, c, m)| (c, m)));
        ordered
    }

    fn build_step(
        &self,
        profile: &Profile,
        subtask: String,
        request: &Request,
        chained: bool,
        reset: bool,
    ) -> RoutingResult<DelegationStep> {
        if self.is_self(&profile.id) {
            return Err(RoutingError::planning_violation(format!(
                "step targets orchestrator '{}'",
                profile.id
            )));
        }

        let mut constraints = vec![SCOPE_CONSTRAINT.to_string(), BLOCKER_CONSTRAINT.to_string()];
        if chained {
            constraints.push(CHAIN_CONSTRAINT.to_string());
        }
        constraints.extend(request.constraints.iter().cloned());

        let criteria = SuccessCriteria::new(format!(
            "The {} delivers the assigned part in the requested format",
            profile.display_name
        ))
        .with_any_of_terms(profile.evidence_terms.clone());

        DelegationStepBuilder::new(profile.id.clone())
            .role(profile.role_statement())
            .subtask(subtask)
            .success_criteria(criteria)
            .constraints(constraints)
            .return_format(profile.return_format.clone())
            .reset(reset)
            .build()
    }
}

impl Default for DelegationPlanner {
    fn default() -> Self {
        Self::new("orchestrator", DEFAULT_CONFIDENCE_THRESHOLD)
    }
}
