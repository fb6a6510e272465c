//! Specialist profiles
//!
//! A profile is a worker identity with a declared domain of competence: the
//! intent tags it claims, its exclusion group and the stances the precedence
//! ladder compares.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stance a profile takes towards a task, compared by the tie-break ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Execute,
    Assess,
    Plan,
    Implement,
    Critique,
    Create,
}

const DEFAULT_RETURN_FORMAT: &str = "Markdown summary followed by the deliverable";

/// Specialist worker identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub intent_tags: BTreeSet<String>,
    /// Mutual-exclusion group; profiles sharing a group are interchangeable
    #[serde(default)]
    pub exclusion_group: Option<String>,
    #[serde(default)]
    pub stances: BTreeSet<Stance>,
    /// Terms a successful output is expected to contain (any of)
    #[serde(default)]
    pub evidence_terms: Vec<String>,
    #[serde(default = "default_return_format")]
    pub return_format: String,
}

pub(crate) fn default_return_format() -> String {
    DEFAULT_RETURN_FORMAT.to_string()
}

impl Profile {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: String::new(),
            intent_tags: BTreeSet::new(),
            exclusion_group: None,
            stances: BTreeSet::new(),
            evidence_terms: Vec::new(),
            return_format: default_return_format(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.intent_tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.exclusion_group = Some(group.into());
        self
    }

    pub fn with_stances(mut self, stances: &[Stance]) -> Self {
        self.stances.extend(stances.iter().copied());
        self
    }

    pub fn with_evidence(mut self, terms: &[&str]) -> Self {
        self.evidence_terms = terms.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_return_format(mut self, format: impl Into<String>) -> Self {
        self.return_format = format.into();
        self
    }

    /// Whether this profile claims an intent tag
    pub fn claims(&self, tag: &str) -> bool {
        self.intent_tags.contains(tag)
    }

    pub fn has_stance(&self, stance: Stance) -> bool {
        self.stances.contains(&stance)
    }

    /// Role statement used in delegation steps
    pub fn role_statement(&self) -> String {
        if self.description.trim().is_empty() {
            self.display_name.clone()
        } else {
            format!("{}: {}", self.display_name, self.description)
        }
    }
}

/// The seven built-in specialists
pub fn builtin_profiles() -> Vec<Profile> {
    vec![
        Profile::new("developer", "Developer")
            .with_description("Writes, debugs and implements code")
            .with_tags(&["code_write", "code_debug", "implement"])
            .with_group("engineering")
            .with_stances(&[Stance::Execute, Stance::Implement])
            .with_evidence(&["```", "code", "script", "function", "patch", "implemented"])
            .with_return_format("Code block(s) followed by usage notes"),
        Profile::new("researcher", "Researcher")
            .with_description("Gathers sources, checks facts and summarizes findings")
            .with_tags(&["research", "fact_check"])
            .with_group("research")
            .with_stances(&[Stance::Assess])
            .with_evidence(&["source", "finding", "summary", "evidence"])
            .with_return_format("Findings with cited sources"),
        Profile::new("security-analyst", "Security Analyst")
            .with_description("Assesses vulnerabilities and models threats")
            .with_tags(&["security_assess", "threat_model"])
            .with_group("security")
            .with_stances(&[Stance::Assess])
            .with_evidence(&["vulnerab", "risk", "severity", "finding", "mitigation"])
            .with_return_format("Findings table with severity and mitigation"),
        Profile::new("data-architect", "Data Architect")
            .with_description("Plans schemas, mappings and data migrations")
            .with_tags(&["schema_plan", "plan"])
            .with_group("data")
            .with_stances(&[Stance::Plan])
            .with_evidence(&["schema", "table", "mapping", "plan", "entity"])
            .with_return_format("Schema or plan outline with rationale"),
        Profile::new("financial-modeler", "Financial Modeler")
            .with_description("Builds financial models and forecasts")
            .with_tags(&["financial_model", "forecast"])
            .with_group("finance")
            .with_stances(&[Stance::Execute])
            .with_evidence(&["assumption", "projection", "forecast", "model", "scenario"])
            .with_return_format("Model assumptions, outputs and sensitivity notes"),
        Profile::new("narrative-writer", "Narrative Writer")
            .with_description("Drafts stories, essays and long-form prose")
            .with_tags(&["narrative_write"])
            .with_group("writing")
            .with_stances(&[Stance::Create])
            .with_evidence(&["draft", "story", "narrative", "paragraph"])
            .with_return_format("Polished prose draft"),
        Profile::new("critique-reviewer", "Critique Reviewer")
            .with_description("Reviews, critiques and grades work products")
            .with_tags(&["critique", "review"])
            .with_group("review")
            .with_stances(&[Stance::Critique, Stance::Assess])
            .with_evidence(&["strength", "weakness", "issue", "recommend", "grade", "score"])
            .with_return_format("Graded critique with prioritized recommendations"),
    ]
}
