//! Clause segmentation
//!
//! Splits request text on sentence ends and sequencing connectors so each
//! step of a multi-domain plan can be handed only the part it owns.

use once_cell::sync::Lazy;
use regex::Regex;

static CLAUSE_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[.;!?\n]+|,?\s*\b(?:and\s+then|after\s+that|afterwards|then)\b")
        .expect("clause boundary pattern is valid")
});

/// A clause of the request with its byte span in the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Clause {
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// Split text into trimmed, non-empty clauses in text order
pub fn split_clauses(text: &str) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let mut cursor = 0;

    for boundary in CLAUSE_BOUNDARY.find_iter(text) {
        push_clause(text, cursor, boundary.start(), &mut clauses);
        cursor = boundary.end();
    }
    push_clause(text, cursor, text.len(), &mut clauses);
    clauses
}

fn push_clause(text: &str, start: usize, end: usize, clauses: &mut Vec<Clause>) {
    let raw = &text[start..end];
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == ',');
    if trimmed.is_empty() {
        return;
    }
    let offset = start + (raw.len() - raw.trim_start_matches(|c: char| c.is_whitespace() || c == ',').len());
    clauses.push(Clause {
        text: trimmed.to_string(),
        start: offset,
        end: offset + trimmed.len(),
    });
}

/// Clauses containing any of the given offsets, joined in text order
pub fn clauses_covering(clauses: &[Clause], offsets: &[usize]) -> Option<String> {
    let picked: Vec<&str> = clauses
        .iter()
        .filter(|c| offsets.iter().any(|&o| c.contains(o)))
        .map(|c| c.text.as_str())
        .collect();

    if picked.is_empty() {
        None
    } else {
        Some(picked.join("; "))
    }
}
