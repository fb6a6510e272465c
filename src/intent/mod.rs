//! Intent extraction
//!
//! The extractor is a pluggable capability: any implementation (keyword rules,
//! an embedding classifier, an external model call) that maps request text to
//! weighted intent tags satisfies the contract. `KeywordExtractor` is the
//! deterministic implementation shipped with the crate.

pub mod keyword;

pub use keyword::KeywordExtractor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Weighted intent tag produced by an extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSignal {
    pub tag: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl IntentSignal {
    pub fn new(tag: impl Into<String>, confidence: f64) -> Self {
        Self {
            tag: tag.into(),
            confidence,
        }
    }

    /// Reject empty tags and confidences outside [0, 1]
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.tag.trim().is_empty() {
            return Err(ExtractionError::MalformedSignal {
                tag: self.tag.clone(),
                reason: "empty intent tag".to_string(),
            });
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ExtractionError::MalformedSignal {
                tag: self.tag.clone(),
                reason: format!("confidence {} outside [0, 1]", self.confidence),
            });
        }
        Ok(())
    }
}

/// Errors raised while extracting or validating intent signals
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    #[error("Malformed intent signal '{tag}': {reason}")]
    MalformedSignal { tag: String, reason: String },

    #[error("Extractor unavailable: {0}")]
    Unavailable(String),
}

/// Maps raw request text to weighted intent tags
#[async_trait::async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Extract intent signals from request text
    ///
    /// An empty vector means the text carries no actionable intent.
    async fn extract(&self, text: &str) -> Result<Vec<IntentSignal>, ExtractionError>;
}
