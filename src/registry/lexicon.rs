//! Keyword vocabulary and request text scanning
//!
//! The lexicon maps intent tags to trigger keywords and holds the verb classes
//! used by the precedence ladder. `ScannedText` finds keyword occurrences with
//! word-boundary semantics and detects negated mentions such as
//! "don't write code".
//!
//! A keyword ending in `*` matches as a prefix (`vulnerab*` matches
//! "vulnerability" and "vulnerable"). Offsets are byte offsets into the
//! original text; lowering is ASCII-only so offsets stay aligned.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of words before a keyword inspected for negation
const NEGATION_WINDOW_WORDS: usize = 3;

/// Keyword vocabulary shared by the extractor, resolver and planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    tags: BTreeMap<String, Vec<String>>,
    pub creation_verbs: Vec<String>,
    pub assessment_verbs: Vec<String>,
    pub planning_terms: Vec<String>,
    pub implementation_terms: Vec<String>,
    pub evaluative_terms: Vec<String>,
    pub negations: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Lexicon {
    /// Empty lexicon with the built-in verb classes
    pub fn empty() -> Self {
        Self {
            tags: BTreeMap::new(),
            creation_verbs: words(&[
                "write", "build", "create", "implement*", "generate", "produce", "make", "draft",
                "fix", "patch",
            ]),
            assessment_verbs: words(&[
                "find", "identify", "analy*", "assess*", "audit", "detect", "investigate",
                "inspect",
            ]),
            planning_terms: words(&["design", "schema", "mapping", "plan", "architect*"]),
            implementation_terms: words(&["implement*", "build", "code", "write", "script*", "migrate"]),
            evaluative_terms: words(&["review", "critique", "grade", "evaluate"]),
            negations: words(&["no", "not", "never", "without", "avoid", "don't", "dont", "skip"]),
        }
    }

    /// Vocabulary for the built-in specialist profiles
    pub fn builtin() -> Self {
        Self::empty()
            .with_keywords("code_write", &["code", "script*", "function", "program", "refactor*"])
            .with_keywords("code_debug", &["debug*", "bug", "bugs", "stack trace", "crash*"])
            .with_keywords("implement", &["implement*", "build", "migration script*"])
            .with_keywords("research", &["research*", "look up", "find out", "sources", "literature"])
            .with_keywords("fact_check", &["fact-check*", "fact check*", "citation*"])
            .with_keywords(
                "security_assess",
                &[
                    "vulnerab*", "security", "exploit*", "pentest*", "penetration test*",
                    "auth flow", "injection", "xss", "csrf",
                ],
            )
            .with_keywords("threat_model", &["threat model*", "attack surface", "stride"])
            .with_keywords("schema_plan", &["schema*", "data model*", "erd", "mapping", "normaliz*"])
            .with_keywords("plan", &["plan", "design", "architecture", "roadmap"])
            .with_keywords(
                "financial_model",
                &["financial model*", "valuation", "dcf", "cash flow", "npv", "irr"],
            )
            .with_keywords("forecast", &["forecast*", "projection*", "budget*"])
            .with_keywords(
                "narrative_write",
                &["story", "narrative", "blog post", "essay", "article", "draft"],
            )
            .with_keywords("critique", &["critique*", "grade", "feedback on"])
            .with_keywords("review", &["review*", "proofread*", "evaluate"])
    }

    /// Set (or replace) the keywords for a tag
    pub fn with_keywords(mut self, tag: &str, keywords: &[&str]) -> Self {
        self.set_keywords(tag, words(keywords));
        self
    }

    /// Set (or replace) the keywords for a tag
    pub fn set_keywords(&mut self, tag: &str, keywords: Vec<String>) {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_ascii_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        self.tags.insert(tag.to_string(), keywords);
    }

    /// Keywords for a tag; empty when the tag has no vocabulary
    pub fn keywords(&self, tag: &str) -> &[String] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All tags with vocabulary, in tag order
    pub fn tags(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.tags.iter().map(|(tag, kw)| (tag.as_str(), kw.as_slice()))
    }
}

/// Request text prepared for keyword lookups
#[derive(Debug, Clone)]
pub struct ScannedText {
    lowered: String,
}

impl ScannedText {
    pub fn new(text: &str) -> Self {
        Self {
            lowered: text.to_ascii_lowercase(),
        }
    }

    pub fn lowered(&self) -> &str {
        &self.lowered
    }

    /// All word-boundary occurrences of a term
    pub fn occurrences(&self, term: &str) -> Vec<usize> {
        let (needle, prefix) = match term.strip_suffix('*') {
            Some(stem) => (stem, true),
            None => (term, false),
        };
        let needle = needle.to_ascii_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let bytes = self.lowered.as_bytes();
        self.lowered
            .match_indices(needle.as_str())
            .map(|(idx, _)| idx)
            .filter(|&idx| {
                let starts_clean = idx == 0 || !is_word_byte(bytes[idx - 1]);
                let end = idx + needle.len();
                let ends_clean = prefix || end >= bytes.len() || !is_word_byte(bytes[end]);
                starts_clean && ends_clean
            })
            .collect()
    }

    /// Earliest occurrence of any of the terms
    pub fn first_of(&self, terms: &[String]) -> Option<usize> {
        terms
            .iter()
            .filter_map(|t| self.occurrences(t).into_iter().next())
            .min()
    }

    /// Earliest occurrence of any of the terms that is not negated
    pub fn first_affirmed(&self, terms: &[String], negations: &[String]) -> Option<usize> {
        terms
            .iter()
            .flat_map(|t| self.occurrences(t))
            .filter(|&idx| !self.is_negated_at(idx, negations))
            .min()
    }

    /// Whether every mention of the terms is negated
    ///
    /// Returns `false` when the terms do not occur at all: an absent keyword
    /// says nothing about negation.
    pub fn all_negated(&self, terms: &[String], negations: &[String]) -> bool {
        let mut seen = false;
        for idx in terms.iter().flat_map(|t| self.occurrences(t)) {
            seen = true;
            if !self.is_negated_at(idx, negations) {
                return false;
            }
        }
        seen
    }

    /// Number of affirmed (non-negated) keyword hits
    pub fn affirmed_hits(&self, terms: &[String], negations: &[String]) -> usize {
        terms
            .iter()
            .flat_map(|t| self.occurrences(t))
            .filter(|&idx| !self.is_negated_at(idx, negations))
            .count()
    }

    /// Whether the word window before `offset` contains a negation
    ///
    /// The window stops at the nearest clause punctuation.
    pub fn is_negated_at(&self, offset: usize, negations: &[String]) -> bool {
        let head = &self.lowered[..offset.min(self.lowered.len())];
        let clause_start = head
            .rfind(|c: char| matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '\n'))
            .map(|i| i + 1)
            .unwrap_or(0);
        head[clause_start..]
            .split_whitespace()
            .rev()
            .take(NEGATION_WINDOW_WORDS)
            .map(|w| w.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '\''))
            .any(|w| negations.iter().any(|n| n == w))
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
