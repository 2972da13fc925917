//! Pattern synthesis from human corrections.

use std::sync::Arc;

use tracing::{debug, info};

use crate::extraction::rules::shape_pattern;
use crate::models::receipt::FieldId;
use crate::patterns::{ExtractionPattern, LEARNED_PATTERN_WEIGHT, NewPattern, PatternStore};
use crate::store::Result;

/// Tokens before the corrected value considered for a keyword.
const CONTEXT_TOKENS: usize = 3;

/// What a correction taught the pattern store.
#[derive(Debug, Clone, PartialEq)]
pub enum LearnOutcome {
    /// A new pattern was stored and loaded.
    Created(ExtractionPattern),
    /// The synthesized pattern already existed and got a success recorded.
    Reinforced(ExtractionPattern),
    /// The corrected value does not occur in the text.
    ValueNotFound,
    /// No usable keyword precedes the corrected value.
    NoKeyword,
}

/// Turns corrections into keyword-anchored patterns.
pub struct CorrectionLearner {
    patterns: Arc<PatternStore>,
}

impl CorrectionLearner {
    pub fn new(patterns: Arc<PatternStore>) -> Self {
        Self { patterns }
    }

    /// Learn from one corrected value found in `raw_text`.
    ///
    /// Store failures propagate; a value that cannot be located is a no-op.
    /// The pattern cache is reloaded on every path, so statistics recorded
    /// before this call are visible to later extractions too.
    pub fn learn(
        &self,
        field: FieldId,
        raw_text: &str,
        corrected_value: &str,
    ) -> Result<LearnOutcome> {
        let outcome = self.learn_pattern(field, raw_text, corrected_value);
        self.patterns.reload();
        outcome
    }

    fn learn_pattern(
        &self,
        field: FieldId,
        raw_text: &str,
        corrected_value: &str,
    ) -> Result<LearnOutcome> {
        let Some(matcher) = synthesize_matcher(field, raw_text, corrected_value) else {
            let outcome = if locate(raw_text, corrected_value).is_none() {
                LearnOutcome::ValueNotFound
            } else {
                LearnOutcome::NoKeyword
            };
            debug!(%field, ?outcome, "Correction not learned");
            return Ok(outcome);
        };

        if let Some(existing) = self.patterns.find(field, &matcher)? {
            let updated = self.patterns.record_outcome(existing.id, true)?;
            info!(%field, pattern_id = updated.id, "Reinforced learned pattern");
            return Ok(LearnOutcome::Reinforced(updated));
        }

        let created = self.patterns.create(
            NewPattern::new(field, matcher, LEARNED_PATTERN_WEIGHT).with_success_count(1),
        )?;
        info!(
            %field,
            pattern_id = created.id,
            matcher = %created.matcher,
            "Learned pattern from correction"
        );
        Ok(LearnOutcome::Created(created))
    }
}

/// Build `keyword[:\s]*<shape>` from the tokens right before the corrected value.
pub fn synthesize_matcher(field: FieldId, raw_text: &str, corrected_value: &str) -> Option<String> {
    let position = locate(raw_text, corrected_value)?;

    let tokens: Vec<&str> = raw_text[..position].split_whitespace().collect();
    let context = &tokens[tokens.len().saturating_sub(CONTEXT_TOKENS)..];

    let keyword = context.iter().rev().find_map(|token| {
        let word = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        (!word.is_empty()).then_some(word)
    })?;

    Some(format!(r"{}[:\s]*{}", regex::escape(&keyword), shape_pattern(field)))
}

fn locate(raw_text: &str, corrected_value: &str) -> Option<usize> {
    let needle = corrected_value.trim();
    if needle.is_empty() {
        return None;
    }
    raw_text.find(needle)
}
