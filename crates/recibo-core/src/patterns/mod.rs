//! Per-field extraction patterns and their compiled cache.

mod defaults;
mod store;

pub use defaults::{DEFAULT_PATTERNS, DefaultPattern};
pub use store::PatternStore;

use std::cmp::Ordering;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::receipt::FieldId;

/// Confidence assumed for patterns without recorded outcomes.
pub const DEFAULT_ACCURACY: f32 = 80.0;

/// Weight given to patterns synthesized from corrections.
pub const LEARNED_PATTERN_WEIGHT: f32 = 1.2;

/// Kind of matcher stored in a pattern. Only regular expressions exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Regex,
}

/// A persisted extraction rule for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPattern {
    pub id: u64,
    pub field: FieldId,
    #[serde(default)]
    pub kind: PatternKind,
    /// Regular expression source; the first capture group is the value.
    pub matcher: String,
    pub weight: f32,
    pub success_count: u32,
    pub failure_count: u32,
    /// Historical accuracy as a percentage, unset until an outcome is recorded.
    #[serde(default)]
    pub accuracy: Option<f32>,
}

impl ExtractionPattern {
    /// Record one outcome and recompute accuracy.
    pub fn record_outcome(&mut self, success: bool) {
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        let total = self.success_count + self.failure_count;
        self.accuracy = Some(self.success_count as f32 / total as f32 * 100.0);
    }

    /// Confidence of a candidate produced by this pattern, before clamping.
    pub fn base_confidence(&self) -> f32 {
        self.accuracy.unwrap_or(DEFAULT_ACCURACY) * self.weight
    }
}

/// Pattern to be created; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPattern {
    pub field: FieldId,
    pub matcher: String,
    pub weight: f32,
    pub success_count: u32,
}

impl NewPattern {
    pub fn new(field: FieldId, matcher: impl Into<String>, weight: f32) -> Self {
        Self {
            field,
            matcher: matcher.into(),
            weight,
            success_count: 0,
        }
    }

    pub fn with_success_count(mut self, count: u32) -> Self {
        self.success_count = count;
        self
    }

    /// Materialize with an id, as stores do on insert.
    pub fn into_pattern(self, id: u64) -> ExtractionPattern {
        ExtractionPattern {
            id,
            field: self.field,
            kind: PatternKind::Regex,
            matcher: self.matcher,
            weight: self.weight,
            success_count: self.success_count,
            failure_count: 0,
            accuracy: None,
        }
    }
}

/// Result of compiling a pattern's matcher.
#[derive(Debug, Clone)]
pub enum PatternMatcher {
    Compiled(Regex),
    Invalid(String),
}

/// A pattern together with its compiled matcher.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub pattern: ExtractionPattern,
    pub matcher: PatternMatcher,
}

impl CompiledPattern {
    /// Compile the pattern case-insensitively. Failures are kept, not raised.
    pub fn compile(pattern: ExtractionPattern) -> Self {
        let matcher = match Regex::new(&format!("(?i){}", pattern.matcher)) {
            Ok(regex) => PatternMatcher::Compiled(regex),
            Err(e) => PatternMatcher::Invalid(e.to_string()),
        };
        Self { pattern, matcher }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.matcher, PatternMatcher::Compiled(_))
    }

    /// First match in `text`: capture group 1 if present, otherwise the whole match.
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        let PatternMatcher::Compiled(regex) = &self.matcher else {
            return None;
        };
        let caps = regex.captures(text)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }
}

/// Order patterns by accuracy (unset last), then by weight, both descending.
pub fn sort_by_priority(patterns: &mut [ExtractionPattern]) {
    patterns.sort_by(|a, b| {
        let by_accuracy = match (a.accuracy, b.accuracy) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_accuracy.then_with(|| b.weight.total_cmp(&a.weight))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pattern(id: u64, weight: f32, accuracy: Option<f32>) -> ExtractionPattern {
        let mut p = NewPattern::new(FieldId::Total, "total[:\\s]*(\\d+)", weight).into_pattern(id);
        p.accuracy = accuracy;
        p
    }

    #[test]
    fn test_priority_order() {
        let mut patterns = vec![
            pattern(1, 2.0, None),
            pattern(2, 1.0, Some(50.0)),
            pattern(3, 1.5, Some(90.0)),
            pattern(4, 1.5, None),
            pattern(5, 1.2, Some(90.0)),
        ];
        sort_by_priority(&mut patterns);

        let ids: Vec<u64> = patterns.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 5, 2, 1, 4]);
    }

    #[test]
    fn test_record_outcome_recomputes_accuracy() {
        let mut p = pattern(1, 1.0, None);
        p.record_outcome(true);
        assert_eq!(p.accuracy, Some(100.0));
        p.record_outcome(false);
        p.record_outcome(false);
        p.record_outcome(true);
        assert_eq!(p.success_count, 2);
        assert_eq!(p.failure_count, 2);
        assert_eq!(p.accuracy, Some(50.0));
    }

    #[test]
    fn test_invalid_matcher_is_isolated() {
        let mut p = pattern(1, 1.0, None);
        p.matcher = "total[(".to_string();
        let compiled = CompiledPattern::compile(p);

        assert!(!compiled.is_valid());
        assert_eq!(compiled.find("TOTAL 116.00"), None);
    }

    #[test]
    fn test_find_uses_first_group_case_insensitively() {
        let compiled = CompiledPattern::compile(pattern(1, 1.0, None));
        assert_eq!(compiled.find("GRAN TOTAL: 116"), Some("116"));

        let mut whole = pattern(2, 1.0, None);
        whole.matcher = "\\d+\\.\\d{2}".to_string();
        assert_eq!(CompiledPattern::compile(whole).find("pago 38.50"), Some("38.50"));
    }

    #[test]
    fn test_base_confidence_defaults() {
        assert_eq!(pattern(1, 1.5, None).base_confidence(), 120.0);
        assert_eq!(pattern(1, 1.0, Some(40.0)).base_confidence(), 40.0);
    }
}
