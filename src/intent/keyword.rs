//! Keyword-rule intent extractor
//!
//! Counts affirmed (non-negated) keyword hits per lexicon tag and maps the
//! count to a confidence. Negated-only tags produce no signal.

use super::{ExtractionError, IntentExtractor, IntentSignal};
use crate::registry::{Lexicon, ScannedText};
use tracing::debug;

const ONE_HIT_CONFIDENCE: f64 = 0.7;
const TWO_HIT_CONFIDENCE: f64 = 0.8;
const MANY_HIT_CONFIDENCE: f64 = 0.9;

/// Deterministic extractor driven by a lexicon
#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    lexicon: Lexicon,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(Lexicon::builtin())
    }
}

impl KeywordExtractor {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    /// Synchronous extraction, used directly by dry runs and tests
    pub fn extract_signals(&self, text: &str) -> Vec<IntentSignal> {
        let scan = ScannedText::new(text);
        let signals: Vec<IntentSignal> = self
            .lexicon
            .tags()
            .filter_map(|(tag, keywords)| {
                let hits = scan.affirmed_hits(keywords, &self.lexicon.negations);
                let confidence = match hits {
                    0 => return None,
                    1 => ONE_HIT_CONFIDENCE,
                    2 => TWO_HIT_CONFIDENCE,
                    _ => MANY_HIT_CONFIDENCE,
                };
                Some(IntentSignal::new(tag, confidence))
            })
            .collect();

        debug!(signal_count = signals.len(), "Keyword extraction complete");
        signals
    }
}

#[async_trait::async_trait]
impl IntentExtractor for KeywordExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<IntentSignal>, ExtractionError> {
        Ok(self.extract_signals(text))
    }
}
