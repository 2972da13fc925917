//! Extraction engine: cheap strategies, consistency, aggregation and escalation.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::aggregate::ConfidenceAggregator;
use super::consistency::validate_consistency;
use super::escalation::{EscalationPolicy, EscalationState};
use super::field::{FieldExtraction, FieldExtractor, values_similar};
use super::rules::{
    TextQuality, assess_text_quality, format_date, guess_issuer, normalize_tax_id, parse_amount,
    validate_tax_id,
};
use super::strategies::{ContextStrategy, PatternStrategy, PositionStrategy, ReceiptText};
use crate::error::{ReciboError, Result};
use crate::learner::{CorrectionLearner, LearnOutcome};
use crate::models::config::ReciboConfig;
use crate::models::document::DocumentInput;
use crate::models::receipt::{
    Correction, ExtractionAttempt, ExtractionSource, FieldCandidate, FieldId, FieldValue,
};
use crate::patterns::PatternStore;
use crate::store::{ExtractionRepository, LocalStore, PatternRepository};
use recibo_escalation::{
    EscalationError, ReceiptRecord, TEXT_ESCALATION_CONFIDENCE, TextEscalation,
    VISION_ESCALATION_CONFIDENCE, VisionEscalation,
};

/// Caller-facing result of one extraction.
///
/// Rejected outcomes carry no field values and no record.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    pub fields: BTreeMap<FieldId, FieldValue>,
    pub overall_confidence: u32,
    pub accepted: bool,
    pub method: ExtractionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ReceiptRecord>,
    /// States visited, ending in `Accepted` or `Rejected`.
    pub path: Vec<EscalationState>,
}

/// Outcome of [`ReceiptEngine::process`].
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    /// Stored attempt id, absent when the attempt could not be persisted.
    pub extraction_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub outcome: ExtractionOutcome,
    pub quality: TextQuality,
    pub processing_time_ms: u64,
}

/// Outcome of [`ReceiptEngine::record_correction`].
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub correction: Correction,
    /// Pattern candidates whose statistics were updated.
    pub scored_patterns: usize,
    /// Learning result, absent for fields without patterns (e.g. issuer).
    pub learned: Option<LearnOutcome>,
}

/// Everything the cheap path produced for one text.
struct CheapRun {
    candidates: BTreeMap<FieldId, Vec<FieldCandidate>>,
    chosen: BTreeMap<FieldId, FieldCandidate>,
    overall: u32,
    accepted: bool,
    /// Record assembled from the chosen values, used for escalation checks.
    draft: ReceiptRecord,
}

/// Receipt extraction engine.
pub struct ReceiptEngine {
    config: ReciboConfig,
    patterns: Arc<PatternStore>,
    extractions: Arc<dyn ExtractionRepository>,
    extractor: FieldExtractor,
    aggregator: ConfidenceAggregator,
    policy: EscalationPolicy,
    learner: CorrectionLearner,
    text_escalation: Option<Arc<dyn TextEscalation>>,
    vision_escalation: Option<Arc<dyn VisionEscalation>>,
}

impl ReceiptEngine {
    /// Create an engine over the given repositories, without escalation.
    pub fn new(
        config: ReciboConfig,
        patterns: Arc<dyn PatternRepository>,
        extractions: Arc<dyn ExtractionRepository>,
    ) -> Self {
        let patterns = Arc::new(PatternStore::new(patterns));
        let extractor = FieldExtractor::new(vec![
            Box::new(PatternStrategy::new(Arc::clone(&patterns))),
            Box::new(ContextStrategy::new(config.extraction.context_window)),
            Box::new(PositionStrategy),
        ]);
        let aggregator = ConfidenceAggregator::new(
            config.extraction.weights.clone(),
            config.extraction.acceptance_threshold,
        );
        let policy = EscalationPolicy::from_config(&config.escalation);
        let learner = CorrectionLearner::new(Arc::clone(&patterns));

        Self {
            config,
            patterns,
            extractions,
            extractor,
            aggregator,
            policy,
            learner,
            text_escalation: None,
            vision_escalation: None,
        }
    }

    /// Create an engine using one local store for patterns and attempts.
    pub fn with_local_store(config: ReciboConfig, store: Arc<LocalStore>) -> Self {
        Self::new(config, Arc::clone(&store) as Arc<dyn PatternRepository>, store)
    }

    /// Set the escalated text extractor.
    pub fn with_text_escalation(mut self, backend: Arc<dyn TextEscalation>) -> Self {
        self.text_escalation = Some(backend);
        self
    }

    /// Set the escalated vision extractor.
    pub fn with_vision_escalation(mut self, backend: Arc<dyn VisionEscalation>) -> Self {
        self.vision_escalation = Some(backend);
        self
    }

    pub fn config(&self) -> &ReciboConfig {
        &self.config
    }

    pub fn patterns(&self) -> &Arc<PatternStore> {
        &self.patterns
    }

    pub fn extractions(&self) -> &Arc<dyn ExtractionRepository> {
        &self.extractions
    }

    /// Seed default patterns when the store holds too few. Idempotent.
    ///
    /// Store failures are returned; this is meant to run at startup.
    pub fn reseed_if_needed(&self) -> Result<usize> {
        Ok(self
            .patterns
            .seed_defaults(self.config.extraction.min_pattern_count)?)
    }

    /// Run the cheap path only, without escalation or persistence.
    pub fn extract(&self, raw_text: &str) -> ExtractionOutcome {
        let run = self.run_cheap(&ReceiptText::new(raw_text));
        let path = vec![
            EscalationState::Start,
            EscalationState::RanCheapExtraction,
            terminal_state(run.accepted),
        ];
        cheap_outcome(&run, path)
    }

    /// Process one document end to end and store the attempt.
    ///
    /// Escalation failures and timeouts fall back to the cheap result.
    pub async fn process(&self, input: &DocumentInput) -> ProcessedDocument {
        let started = Instant::now();
        let text = ReceiptText::new(&input.text);

        let mut path = vec![EscalationState::Start];
        let run = self.run_cheap(&text);
        path.push(EscalationState::RanCheapExtraction);

        let quality = assess_text_quality(&input.text, &self.config.escalation);
        debug!(
            garbage_tokens = quality.garbage_tokens,
            normal_char_ratio = quality.normal_char_ratio,
            is_garbage = quality.is_garbage,
            "Assessed text quality"
        );

        let mut escalated: Option<(ReceiptRecord, ExtractionSource)> = None;

        if let (Some(backend), Some(image)) = (&self.vision_escalation, &input.image) {
            if self.policy.should_use_vision(&quality, true, true) {
                path.push(EscalationState::EscalatedVision);
                escalated = self
                    .escalate(
                        backend.name(),
                        VISION_ESCALATION_CONFIDENCE,
                        backend.extract_image(image),
                    )
                    .await
                    .map(|record| (record, ExtractionSource::EscalatedVision));
            }
        }

        if escalated.is_none() && !input.text.trim().is_empty() {
            if let Some(backend) = &self.text_escalation {
                if self.policy.should_use_text(run.overall, &run.draft) {
                    debug!(
                        overall = run.overall,
                        missing = ?self.policy.missing_critical_fields(&run.draft),
                        "Escalating to text extractor"
                    );
                    path.push(EscalationState::EscalatedText);
                    escalated = self
                        .escalate(
                            backend.name(),
                            TEXT_ESCALATION_CONFIDENCE,
                            backend.extract_text(&input.text),
                        )
                        .await
                        .map(|record| (record, ExtractionSource::EscalatedText));
                }
            }
        }

        let outcome = match escalated {
            Some((record, method)) => {
                path.push(EscalationState::Accepted);
                ExtractionOutcome {
                    fields: record_fields(&record),
                    overall_confidence: record.confidence,
                    accepted: true,
                    method,
                    record: Some(record),
                    path,
                }
            }
            None => {
                path.push(terminal_state(run.accepted));
                cheap_outcome(&run, path)
            }
        };

        let processing_time_ms = started.elapsed().as_millis() as u64;
        let attempt = ExtractionAttempt {
            id: 0,
            source_document_id: input.source_id.clone(),
            raw_text: input.text.clone(),
            candidates: run.candidates,
            chosen: run.chosen,
            overall_confidence: outcome.overall_confidence,
            accepted: outcome.accepted,
            method_used: outcome.method,
            record: outcome.record.clone(),
            processing_time_ms,
            created_at: Utc::now(),
        };

        let extraction_id = match self.extractions.create(attempt) {
            Ok(stored) => Some(stored.id),
            Err(e) => {
                warn!(error = %e, "Failed to store extraction attempt");
                None
            }
        };

        info!(
            source = input.source_id.as_deref().unwrap_or("-"),
            extraction_id = ?extraction_id,
            overall = outcome.overall_confidence,
            accepted = outcome.accepted,
            method = ?outcome.method,
            elapsed_ms = processing_time_ms,
            "Processed document"
        );

        ProcessedDocument {
            extraction_id,
            source_id: input.source_id.clone(),
            outcome,
            quality,
            processing_time_ms,
        }
    }

    /// Store a correction, score the patterns that competed for the field
    /// and learn a pattern from the corrected value.
    pub fn record_correction(
        &self,
        extraction_id: u64,
        field_name: &str,
        extracted_value: &str,
        corrected_value: &str,
        source: &str,
    ) -> Result<CorrectionOutcome> {
        let attempt = self
            .extractions
            .get(extraction_id)?
            .ok_or(ReciboError::ExtractionNotFound(extraction_id))?;

        let correction = self.extractions.add_correction(Correction {
            id: 0,
            extraction_id,
            field_name: field_name.to_string(),
            extracted_value: extracted_value.to_string(),
            corrected_value: corrected_value.to_string(),
            source: source.to_string(),
            created_at: Utc::now(),
        })?;

        let Ok(field) = field_name.parse::<FieldId>() else {
            info!(field_name, extraction_id, "Stored correction for a field without patterns");
            return Ok(CorrectionOutcome {
                correction,
                scored_patterns: 0,
                learned: None,
            });
        };

        let scored_patterns = self.score_patterns(&attempt, field, corrected_value);
        // Reloads the pattern cache, scores above included.
        let learned = self.learner.learn(field, &attempt.raw_text, corrected_value)?;

        info!(%field, extraction_id, scored_patterns, learned = ?learned, "Recorded correction");
        Ok(CorrectionOutcome {
            correction,
            scored_patterns,
            learned: Some(learned),
        })
    }

    fn score_patterns(
        &self,
        attempt: &ExtractionAttempt,
        field: FieldId,
        corrected_value: &str,
    ) -> usize {
        let Some(candidates) = attempt.candidates.get(&field) else {
            return 0;
        };

        let mut seen = HashSet::new();
        let mut scored = 0;
        for candidate in candidates {
            let Some(pattern_id) = candidate.pattern_id else {
                continue;
            };
            if !seen.insert(pattern_id) {
                continue;
            }

            let success = values_similar(field, &candidate.value, corrected_value);
            match self.patterns.record_outcome(pattern_id, success) {
                Ok(_) => scored += 1,
                Err(e) => warn!(pattern_id, error = %e, "Failed to record pattern outcome"),
            }
        }
        scored
    }

    fn run_cheap(&self, text: &ReceiptText) -> CheapRun {
        let mut candidates = BTreeMap::new();
        let mut chosen = BTreeMap::new();

        for field in FieldId::ALL {
            let FieldExtraction {
                candidates: found,
                chosen: best,
            } = self.extractor.extract(field, text);
            candidates.insert(field, found);
            chosen.insert(field, best);
        }

        validate_consistency(&mut chosen, self.config.extraction.tax_rate);

        let overall = self.aggregator.overall(&chosen);
        let accepted = self.aggregator.is_accepted(overall);
        let draft = draft_record(&chosen, text, overall);

        debug!(overall, accepted, "Cheap extraction finished");
        CheapRun {
            candidates,
            chosen,
            overall,
            accepted,
            draft,
        }
    }

    /// Run one escalated call under the configured timeout, stamping the
    /// record with the backend's contract confidence.
    async fn escalate<F>(&self, backend: &str, confidence: u32, call: F) -> Option<ReceiptRecord>
    where
        F: Future<Output = recibo_escalation::Result<Option<ReceiptRecord>>>,
    {
        match with_deadline(self.config.escalation.timeout_ms, call).await {
            Ok(Some(mut record)) => {
                record.confidence = confidence;
                if !record.tax_id.is_empty() && !validate_tax_id(&record.tax_id) {
                    warn!(
                        backend,
                        tax_id = %record.tax_id,
                        "Escalated record carries an invalid tax id"
                    );
                }
                info!(backend, confidence, "Escalation produced a record");
                Some(record)
            }
            Ok(None) => {
                info!(backend, "Escalation returned no record");
                None
            }
            Err(e) => {
                warn!(backend, error = %e, "Escalation failed, keeping cheap result");
                None
            }
        }
    }
}

/// Await `call`, turning an expired deadline into [`EscalationError::Timeout`].
async fn with_deadline<F>(
    timeout_ms: u64,
    call: F,
) -> recibo_escalation::Result<Option<ReceiptRecord>>
where
    F: Future<Output = recibo_escalation::Result<Option<ReceiptRecord>>>,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), call)
        .await
        .unwrap_or(Err(EscalationError::Timeout(timeout_ms)))
}

fn terminal_state(accepted: bool) -> EscalationState {
    if accepted {
        EscalationState::Accepted
    } else {
        EscalationState::Rejected
    }
}

fn cheap_outcome(run: &CheapRun, path: Vec<EscalationState>) -> ExtractionOutcome {
    if !run.accepted {
        return ExtractionOutcome {
            fields: BTreeMap::new(),
            overall_confidence: run.overall,
            accepted: false,
            method: ExtractionSource::Patterns,
            record: None,
            path,
        };
    }

    let fields = run
        .chosen
        .iter()
        .filter(|(_, candidate)| !candidate.is_empty())
        .map(|(field, candidate)| {
            (
                *field,
                FieldValue {
                    value: candidate.value.clone(),
                    confidence: candidate.confidence,
                },
            )
        })
        .collect();

    ExtractionOutcome {
        fields,
        overall_confidence: run.overall,
        accepted: true,
        method: ExtractionSource::Patterns,
        record: Some(run.draft.clone()),
        path,
    }
}

fn draft_record(
    chosen: &BTreeMap<FieldId, FieldCandidate>,
    text: &ReceiptText,
    overall: u32,
) -> ReceiptRecord {
    let value = |field: FieldId| {
        chosen
            .get(&field)
            .filter(|c| !c.is_empty())
            .map(|c| c.value.as_str())
    };
    let amount = |field: FieldId| value(field).and_then(parse_amount).unwrap_or(Decimal::ZERO);

    ReceiptRecord {
        tax_id: value(FieldId::TaxId).map(normalize_tax_id).unwrap_or_default(),
        issuer: guess_issuer(text.lines.iter().map(String::as_str)),
        date: value(FieldId::Date).and_then(format_date),
        total: amount(FieldId::Total),
        tax: amount(FieldId::Tax),
        subtotal: amount(FieldId::Subtotal),
        confidence: overall,
    }
}

fn record_fields(record: &ReceiptRecord) -> BTreeMap<FieldId, FieldValue> {
    let confidence = record.confidence as f32;
    let mut fields = BTreeMap::new();
    let mut put = |field: FieldId, value: String| {
        if !value.is_empty() {
            fields.insert(field, FieldValue { value, confidence });
        }
    };

    put(FieldId::TaxId, record.tax_id.clone());
    put(FieldId::Date, record.date.clone().unwrap_or_default());
    for (field, amount) in [
        (FieldId::Total, record.total),
        (FieldId::Tax, record.tax),
        (FieldId::Subtotal, record.subtotal),
    ] {
        if !amount.is_zero() {
            put(field, amount.to_string());
        }
    }
    fields
}
