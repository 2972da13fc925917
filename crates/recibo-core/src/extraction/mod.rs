//! Field extraction: strategies, arbitration, consistency checks and escalation.

pub mod aggregate;
pub mod consistency;
pub mod escalation;
pub mod field;
pub mod pipeline;
pub mod rules;
pub mod strategies;

pub use aggregate::ConfidenceAggregator;
pub use consistency::{ConsistencyReport, validate_consistency};
pub use escalation::{EscalationPolicy, EscalationState};
pub use field::{FieldExtraction, FieldExtractor, select_best};
pub use pipeline::{CorrectionOutcome, ExtractionOutcome, ProcessedDocument, ReceiptEngine};
pub use strategies::{
    ContextStrategy, ExtractionStrategy, PatternStrategy, PositionStrategy, ReceiptText,
};
