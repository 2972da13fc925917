//! Single-process store backed by optional files.
//!
//! Patterns live in a small JSON file rewritten on every change. Extraction
//! attempts and corrections are appended to a JSON Lines journal next to it.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ExtractionRepository, PatternRepository, Result};
use crate::error::StoreError;
use crate::models::receipt::{Correction, ExtractionAttempt, FieldId};
use crate::patterns::{ExtractionPattern, NewPattern, sort_by_priority};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PatternTable {
    next_pattern_id: u64,
    patterns: Vec<ExtractionPattern>,
}

/// One journal line.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
enum JournalEntry {
    Extraction(ExtractionAttempt),
    Correction(Correction),
}

#[derive(Debug, Default)]
struct Journal {
    next_extraction_id: u64,
    next_correction_id: u64,
    extractions: BTreeMap<u64, ExtractionAttempt>,
    corrections: Vec<Correction>,
}

impl Journal {
    fn apply(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Extraction(attempt) => {
                self.next_extraction_id = self.next_extraction_id.max(attempt.id);
                self.extractions.insert(attempt.id, attempt);
            }
            JournalEntry::Correction(correction) => {
                self.next_correction_id = self.next_correction_id.max(correction.id);
                self.corrections.push(correction);
            }
        }
    }
}

/// Store holding patterns and attempts behind separate locks.
///
/// A write only reaches memory after it reached the files, so a failed write
/// leaves no trace for later writes to persist.
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    patterns: Mutex<PatternTable>,
    journal: Mutex<Journal>,
}

impl LocalStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            patterns: Mutex::new(PatternTable::default()),
            journal: Mutex::new(Journal::default()),
        }
    }

    /// Open a file-backed store, creating the files on first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let patterns = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            debug!(path = %path.display(), "Pattern file does not exist yet");
            PatternTable::default()
        };

        let journal_path = journal_path(&path);
        let mut journal = Journal::default();
        if journal_path.exists() {
            let content = fs::read_to_string(&journal_path)?;
            for (index, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JournalEntry>(line) {
                    Ok(entry) => journal.apply(entry),
                    Err(e) => warn!(
                        path = %journal_path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping unreadable journal line"
                    ),
                }
            }
        }

        info!(
            path = %path.display(),
            patterns = patterns.patterns.len(),
            extractions = journal.extractions.len(),
            "Opened store"
        );

        Ok(Self {
            path: Some(path),
            patterns: Mutex::new(patterns),
            journal: Mutex::new(journal),
        })
    }

    /// Pattern file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock_patterns(&self) -> Result<MutexGuard<'_, PatternTable>> {
        self.patterns.lock().map_err(|_| StoreError::Poisoned)
    }

    fn lock_journal(&self) -> Result<MutexGuard<'_, Journal>> {
        self.journal.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Apply `f` to a copy of the table and keep it once it is on disk.
    fn write_patterns<T>(&self, f: impl FnOnce(&mut PatternTable) -> Result<T>) -> Result<T> {
        let mut table = self.lock_patterns()?;
        let mut next = table.clone();
        let value = f(&mut next)?;
        self.flush_patterns(&next)?;
        *table = next;
        Ok(value)
    }

    fn flush_patterns(&self, table: &PatternTable) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(table)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn append(&self, entry: &JournalEntry) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let journal_path = journal_path(path);

        if let Some(parent) = journal_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)?
            .write_all(&line)?;
        Ok(())
    }
}

/// Journal kept next to the pattern file: `store.json` -> `store.journal.jsonl`.
fn journal_path(path: &Path) -> PathBuf {
    path.with_extension("journal.jsonl")
}

impl PatternRepository for LocalStore {
    fn load(&self, field: FieldId) -> Result<Vec<ExtractionPattern>> {
        let mut patterns: Vec<_> = self
            .lock_patterns()?
            .patterns
            .iter()
            .filter(|p| p.field == field)
            .cloned()
            .collect();
        sort_by_priority(&mut patterns);
        Ok(patterns)
    }

    fn count(&self) -> Result<usize> {
        Ok(self.lock_patterns()?.patterns.len())
    }

    fn create(&self, pattern: NewPattern) -> Result<ExtractionPattern> {
        self.write_patterns(|table| {
            table.next_pattern_id += 1;
            let pattern = pattern.into_pattern(table.next_pattern_id);
            table.patterns.push(pattern.clone());
            Ok(pattern)
        })
    }

    fn update_stats(&self, id: u64, success: bool) -> Result<ExtractionPattern> {
        self.write_patterns(|table| {
            let pattern = table
                .patterns
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or(StoreError::PatternNotFound(id))?;
            pattern.record_outcome(success);
            Ok(pattern.clone())
        })
    }
}

impl ExtractionRepository for LocalStore {
    fn create(&self, mut attempt: ExtractionAttempt) -> Result<ExtractionAttempt> {
        let mut journal = self.lock_journal()?;
        attempt.id = journal.next_extraction_id + 1;

        self.append(&JournalEntry::Extraction(attempt.clone()))?;
        journal.apply(JournalEntry::Extraction(attempt.clone()));
        Ok(attempt)
    }

    fn get(&self, id: u64) -> Result<Option<ExtractionAttempt>> {
        Ok(self.lock_journal()?.extractions.get(&id).cloned())
    }

    fn add_correction(&self, mut correction: Correction) -> Result<Correction> {
        let mut journal = self.lock_journal()?;
        correction.id = journal.next_correction_id + 1;

        self.append(&JournalEntry::Correction(correction.clone()))?;
        journal.apply(JournalEntry::Correction(correction.clone()));
        Ok(correction)
    }

    fn corrections_for(&self, extraction_id: u64) -> Result<Vec<Correction>> {
        Ok(self
            .lock_journal()?
            .corrections
            .iter()
            .filter(|c| c.extraction_id == extraction_id)
            .cloned()
            .collect())
    }

    fn recent(&self, limit: usize) -> Result<Vec<ExtractionAttempt>> {
        Ok(self
            .lock_journal()?
            .extractions
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::ExtractionSource;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn attempt(raw_text: &str) -> ExtractionAttempt {
        ExtractionAttempt {
            id: 0,
            source_document_id: Some("ticket.txt".to_string()),
            raw_text: raw_text.to_string(),
            candidates: BTreeMap::new(),
            chosen: BTreeMap::new(),
            overall_confidence: 0,
            accepted: false,
            method_used: ExtractionSource::Patterns,
            record: None,
            processing_time_ms: 3,
            created_at: Utc::now(),
        }
    }

    fn new_pattern(
        store: &LocalStore,
        field: FieldId,
        matcher: &str,
        weight: f32,
    ) -> ExtractionPattern {
        PatternRepository::create(store, NewPattern::new(field, matcher, weight)).unwrap()
    }

    fn correction(extraction_id: u64, value: &str) -> Correction {
        Correction {
            id: 0,
            extraction_id,
            field_name: "total".to_string(),
            extracted_value: String::new(),
            corrected_value: value.to_string(),
            source: "manual".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_pattern_ids_and_ordering() {
        let store = LocalStore::in_memory();
        let low = new_pattern(&store, FieldId::Total, "a(\\d+)", 1.0);
        let high = new_pattern(&store, FieldId::Total, "b(\\d+)", 2.0);
        new_pattern(&store, FieldId::Tax, "c(\\d+)", 1.0);

        assert_eq!((low.id, high.id), (1, 2));
        assert_eq!(store.count().unwrap(), 3);

        let loaded: Vec<u64> = store.load(FieldId::Total).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(loaded, vec![2, 1]);

        // A recorded outcome ranks ahead of unset accuracy.
        store.update_stats(low.id, true).unwrap();
        let loaded: Vec<u64> = store.load(FieldId::Total).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(loaded, vec![1, 2]);
    }

    #[test]
    fn test_update_stats_unknown_pattern() {
        let store = LocalStore::in_memory();
        assert!(matches!(store.update_stats(42, true), Err(StoreError::PatternNotFound(42))));
    }

    #[test]
    fn test_concurrent_stat_updates_are_not_lost() {
        let store = Arc::new(LocalStore::in_memory());
        let pattern = new_pattern(&store, FieldId::Date, "(\\d+)", 1.0);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.update_stats(pattern.id, i % 2 == 0).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let updated = store.load(FieldId::Date).unwrap().remove(0);
        assert_eq!(updated.success_count, 100);
        assert_eq!(updated.failure_count, 100);
        assert_eq!(updated.accuracy, Some(50.0));
    }

    #[test]
    fn test_extractions_and_corrections() {
        let store = LocalStore::in_memory();
        let first = ExtractionRepository::create(&store, attempt("TOTAL 10.00")).unwrap();
        let second = ExtractionRepository::create(&store, attempt("TOTAL 20.00")).unwrap();

        assert_eq!(store.get(first.id).unwrap().unwrap().raw_text, "TOTAL 10.00");
        assert!(store.get(99).unwrap().is_none());

        let recent: Vec<u64> = store.recent(5).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(recent, vec![second.id, first.id]);

        let saved = store.add_correction(correction(second.id, "20.00")).unwrap();
        assert_eq!(saved.id, 1);
        assert_eq!(store.corrections_for(second.id).unwrap(), vec![saved]);
        assert!(store.corrections_for(first.id).unwrap().is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let store = LocalStore::open(&path).unwrap();
            new_pattern(&store, FieldId::TaxId, "rfc(\\w+)", 1.2);
            ExtractionRepository::create(&store, attempt("RFC ABC010101ABC")).unwrap();
        }

        let reopened = LocalStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
        assert!(reopened.get(1).unwrap().is_some());

        // Ids keep counting after reopen.
        let next = new_pattern(&reopened, FieldId::Date, "(\\d+)", 1.0);
        assert_eq!(next.id, 2);
        let attempt = ExtractionRepository::create(&reopened, attempt("TOTAL 1.00")).unwrap();
        assert_eq!(attempt.id, 2);
    }

    #[test]
    fn test_journal_skips_torn_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = LocalStore::open(&path).unwrap();
            let first = ExtractionRepository::create(&store, attempt("TOTAL 10.00")).unwrap();
            store.add_correction(correction(first.id, "10.00")).unwrap();
        }
        let mut journal = OpenOptions::new().append(true).open(journal_path(&path)).unwrap();
        journal.write_all(b"{\"kind\":\"extraction\",\"rec").unwrap();

        let reopened = LocalStore::open(&path).unwrap();
        assert_eq!(reopened.recent(10).unwrap().len(), 1);
        assert_eq!(reopened.corrections_for(1).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_pattern_write_is_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = LocalStore::open(&path).unwrap();
        let pattern = new_pattern(&store, FieldId::Tax, "iva(\\d+)", 1.0);

        // The temp file cannot be written while a directory sits in its place.
        let tmp = path.with_extension("json.tmp");
        fs::create_dir(&tmp).unwrap();
        assert!(matches!(
            PatternRepository::create(&store, NewPattern::new(FieldId::Tax, "x(\\d+)", 1.0)),
            Err(StoreError::Io(_))
        ));
        assert!(store.update_stats(pattern.id, true).is_err());
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.load(FieldId::Tax).unwrap()[0].success_count, 0);

        fs::remove_dir(&tmp).unwrap();
        let next = new_pattern(&store, FieldId::Tax, "y(\\d+)", 1.0);
        assert_eq!(next.id, 2);

        let reopened = LocalStore::open(&path).unwrap();
        let matchers: Vec<String> = reopened
            .load(FieldId::Tax)
            .unwrap()
            .into_iter()
            .map(|p| p.matcher)
            .collect();
        assert_eq!(matchers.len(), 2);
        assert!(!matchers.iter().any(|m| m.starts_with('x')));
    }

    #[test]
    fn test_failed_journal_append_is_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = LocalStore::open(&path).unwrap();

        fs::create_dir(journal_path(&path)).unwrap();
        assert!(ExtractionRepository::create(&store, attempt("TOTAL 10.00")).is_err());
        assert!(store.get(1).unwrap().is_none());

        fs::remove_dir(journal_path(&path)).unwrap();
        let stored = ExtractionRepository::create(&store, attempt("TOTAL 20.00")).unwrap();
        assert_eq!(stored.id, 1);
        assert_eq!(store.get(1).unwrap().unwrap().raw_text, "TOTAL 20.00");
    }
}
