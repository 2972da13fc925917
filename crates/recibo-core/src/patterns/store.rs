//! Reader-many cache of compiled patterns over a [`PatternRepository`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use super::{CompiledPattern, DEFAULT_PATTERNS, ExtractionPattern, NewPattern, PatternMatcher};
use crate::models::receipt::FieldId;
use crate::store::{PatternRepository, Result};

type Cache = HashMap<FieldId, Arc<[CompiledPattern]>>;

/// Compiled patterns per field.
///
/// The cache only changes through [`PatternStore::reload`]; outcome updates
/// are written to the repository and picked up on the next reload.
pub struct PatternStore {
    repository: Arc<dyn PatternRepository>,
    cache: RwLock<Cache>,
}

impl PatternStore {
    /// Create the store and load every field once.
    pub fn new(repository: Arc<dyn PatternRepository>) -> Self {
        let store = Self {
            repository,
            cache: RwLock::new(HashMap::new()),
        };
        store.reload();
        store
    }

    /// Re-read every field from the repository.
    ///
    /// A field that fails to load is cached as empty.
    pub fn reload(&self) {
        let mut fresh = Cache::new();

        for field in FieldId::ALL {
            let patterns = match self.repository.load(field) {
                Ok(patterns) => patterns,
                Err(e) => {
                    warn!(
                        %field,
                        error = %e,
                        "Pattern store unavailable, continuing without patterns"
                    );
                    Vec::new()
                }
            };

            let compiled: Vec<CompiledPattern> = patterns
                .into_iter()
                .map(CompiledPattern::compile)
                .inspect(|p| {
                    if let PatternMatcher::Invalid(reason) = &p.matcher {
                        warn!(
                            pattern_id = p.pattern.id,
                            %field,
                            %reason,
                            "Skipping malformed pattern"
                        );
                    }
                })
                .filter(CompiledPattern::is_valid)
                .collect();

            debug!(%field, count = compiled.len(), "Loaded patterns");
            fresh.insert(field, compiled.into());
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *cache = fresh;
    }

    /// Valid patterns for a field in priority order.
    pub fn patterns_for(&self, field: FieldId) -> Arc<[CompiledPattern]> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(&field).cloned().unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Seed the default patterns when fewer than `min_count` exist.
    ///
    /// Defaults already present (same field and matcher) are not inserted
    /// again, so repeated calls never duplicate. Returns the number created.
    pub fn seed_defaults(&self, min_count: usize) -> Result<usize> {
        let existing_count = self.repository.count()?;
        if existing_count >= min_count {
            debug!(existing_count, min_count, "Pattern store already seeded");
            return Ok(0);
        }

        let mut existing: HashSet<(FieldId, String)> = HashSet::new();
        for field in FieldId::ALL {
            for pattern in self.repository.load(field)? {
                existing.insert((pattern.field, pattern.matcher));
            }
        }

        let mut created = 0;
        for seed in DEFAULT_PATTERNS {
            if existing.contains(&(seed.field, seed.matcher.to_string())) {
                continue;
            }
            self.repository
                .create(NewPattern::new(seed.field, seed.matcher, seed.weight))?;
            created += 1;
        }

        info!(created, "Seeded default patterns");
        self.reload();
        Ok(created)
    }

    /// Stored pattern for a field with exactly this matcher, if any.
    pub fn find(&self, field: FieldId, matcher: &str) -> Result<Option<ExtractionPattern>> {
        Ok(self
            .repository
            .load(field)?
            .into_iter()
            .find(|p| p.matcher == matcher))
    }

    /// Persist a new pattern. Call [`PatternStore::reload`] to make it visible.
    pub fn create(&self, pattern: NewPattern) -> Result<ExtractionPattern> {
        self.repository.create(pattern)
    }

    /// Record whether a pattern's candidate turned out right.
    pub fn record_outcome(&self, pattern_id: u64, success: bool) -> Result<ExtractionPattern> {
        let updated = self.repository.update_stats(pattern_id, success)?;
        debug!(pattern_id, success, accuracy = ?updated.accuracy, "Recorded pattern outcome");
        Ok(updated)
    }

    /// Number of stored patterns.
    pub fn count(&self) -> Result<usize> {
        self.repository.count()
    }

    /// Every stored pattern for a field, including malformed ones.
    pub fn list(&self, field: FieldId) -> Result<Vec<ExtractionPattern>> {
        self.repository.load(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::LocalStore;
    use pretty_assertions::assert_eq;

    struct Unavailable;

    impl PatternRepository for Unavailable {
        fn load(&self, _field: FieldId) -> Result<Vec<ExtractionPattern>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        fn count(&self) -> Result<usize> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        fn create(&self, _pattern: NewPattern) -> Result<ExtractionPattern> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
        fn update_stats(&self, id: u64, _success: bool) -> Result<ExtractionPattern> {
            Err(StoreError::PatternNotFound(id))
        }
    }

    #[test]
    fn test_seed_defaults_is_idempotent() {
        let store = PatternStore::new(Arc::new(LocalStore::in_memory()));

        assert_eq!(store.seed_defaults(13).unwrap(), DEFAULT_PATTERNS.len());
        assert_eq!(store.seed_defaults(13).unwrap(), 0);
        assert_eq!(store.count().unwrap(), DEFAULT_PATTERNS.len());

        // Even when the threshold is raised, defaults are not inserted twice.
        assert_eq!(store.seed_defaults(100).unwrap(), 0);
        assert_eq!(store.count().unwrap(), DEFAULT_PATTERNS.len());
        assert_eq!(store.patterns_for(FieldId::Total).len(), 4);
    }

    #[test]
    fn test_malformed_pattern_is_skipped() {
        let repository = Arc::new(LocalStore::in_memory());
        for matcher in ["iva[(", "iva\\s*(\\d+)"] {
            PatternRepository::create(&*repository, NewPattern::new(FieldId::Tax, matcher, 1.0))
                .unwrap();
        }

        let store = PatternStore::new(repository);
        let patterns = store.patterns_for(FieldId::Tax);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pattern.matcher, "iva\\s*(\\d+)");
        assert_eq!(store.list(FieldId::Tax).unwrap().len(), 2);
    }

    #[test]
    fn test_unavailable_repository_degrades_to_empty() {
        let store = PatternStore::new(Arc::new(Unavailable));
        assert!(store.patterns_for(FieldId::TaxId).is_empty());
        assert!(store.seed_defaults(13).is_err());
    }

    #[test]
    fn test_new_pattern_visible_after_reload() {
        let store = PatternStore::new(Arc::new(LocalStore::in_memory()));
        store
            .create(NewPattern::new(FieldId::Date, "emitida[:\\s]*(\\d{2}/\\d{2}/\\d{4})", 1.2))
            .unwrap();

        assert!(store.patterns_for(FieldId::Date).is_empty());
        store.reload();
        assert_eq!(store.patterns_for(FieldId::Date).len(), 1);
    }
}
