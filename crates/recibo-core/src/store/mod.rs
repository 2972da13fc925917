//! Persistence interfaces for patterns, extraction attempts and corrections.

mod local;

pub use local::LocalStore;

use crate::error::StoreError;
use crate::models::receipt::{Correction, ExtractionAttempt, FieldId};
use crate::patterns::{ExtractionPattern, NewPattern};

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage of extraction patterns.
///
/// Implementations serialize writes so concurrent outcome updates on the
/// same pattern are never lost.
pub trait PatternRepository: Send + Sync {
    /// Patterns for a field, ordered by accuracy (unset last) then weight.
    fn load(&self, field: FieldId) -> Result<Vec<ExtractionPattern>>;

    /// Number of patterns across all fields.
    fn count(&self) -> Result<usize>;

    /// Insert a pattern and return it with its assigned id.
    fn create(&self, pattern: NewPattern) -> Result<ExtractionPattern>;

    /// Record one success or failure and return the updated pattern.
    fn update_stats(&self, id: u64, success: bool) -> Result<ExtractionPattern>;
}

/// Storage of extraction attempts and the corrections made against them.
pub trait ExtractionRepository: Send + Sync {
    /// Insert an attempt. The `id` field is ignored and assigned by the store.
    fn create(&self, attempt: ExtractionAttempt) -> Result<ExtractionAttempt>;

    fn get(&self, id: u64) -> Result<Option<ExtractionAttempt>>;

    /// Insert a correction. The `id` field is ignored and assigned by the store.
    fn add_correction(&self, correction: Correction) -> Result<Correction>;

    fn corrections_for(&self, extraction_id: u64) -> Result<Vec<Correction>>;

    /// Most recent attempts, newest first.
    fn recent(&self, limit: usize) -> Result<Vec<ExtractionAttempt>>;
}
