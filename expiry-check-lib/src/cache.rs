//! Freshness cache of resolved expiry dates.
//!
//! Entries are keyed by [`cache_key`] so the pipeline and the store agree on
//! identity. The store tracks whether anything changed during a pass so that
//! a no-op pass does not rewrite the backing file.

use crate::error::ExpiryCheckError;
use crate::extract::format_date;
use crate::persistence::ExpiryRepository;
use crate::types::DomainRecord;
use crate::utils::cache_key;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// In-memory view of the expiry cache for one pass.
#[derive(Debug, Clone, Default)]
pub struct ExpiryCacheStore {
    entries: BTreeMap<String, DomainRecord>,
    dirty: bool,
}

impl ExpiryCacheStore {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from stored rows.
    ///
    /// Rows with an empty domain, source or expiry are dropped. Later rows
    /// win over earlier rows with the same key.
    pub fn from_entries<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = DomainRecord>,
    {
        let mut entries = BTreeMap::new();
        for row in rows {
            let domain = row.domain.trim();
            let source = row.source.trim();
            let Some(expiry) = row.explicit_expiry() else {
                continue;
            };
            if domain.is_empty() || source.is_empty() {
                continue;
            }
            let record = DomainRecord::new(domain, source).with_expiry(expiry);
            entries.insert(cache_key(domain, source), record);
        }

        Self {
            entries,
            dirty: false,
        }
    }

    /// Load the cache through the repository.
    pub async fn load(repository: &dyn ExpiryRepository) -> Result<Self, ExpiryCheckError> {
        let rows = repository.load_expiry_cache().await?;
        let store = Self::from_entries(rows);
        debug!(entries = store.len(), "expiry cache loaded");
        Ok(store)
    }

    /// Persist the full cache through the repository.
    pub async fn save(&self, repository: &dyn ExpiryRepository) -> Result<(), ExpiryCheckError> {
        repository.save_expiry_cache(&self.entries()).await?;
        debug!(entries = self.len(), "expiry cache saved");
        Ok(())
    }

    /// Cached expiry string for a key, exactly as stored.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|entry| entry.expiry.as_deref())
    }

    /// Write or refresh the entry for (domain, source).
    ///
    /// Only a changed value marks the cache dirty.
    pub fn refresh(&mut self, domain: &str, source: &str, expiry: NaiveDate) {
        let key = cache_key(domain, source);
        let expiry = format_date(expiry);

        if self.get(&key) == Some(expiry.as_str()) {
            return;
        }

        self.entries.insert(
            key,
            DomainRecord::new(domain.trim(), source.trim()).with_expiry(expiry),
        );
        self.dirty = true;
    }

    /// Remove an entry. Returns whether anything was removed.
    pub fn evict(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Whether the cache changed since it was loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All entries in key order.
    pub fn entries(&self) -> Vec<DomainRecord> {
        self.entries.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_entries_drops_incomplete_rows() {
        let store = ExpiryCacheStore::from_entries(vec![
            DomainRecord::new("a.com", "cf").with_expiry("2030-01-01"),
            DomainRecord::new("b.com", "cf"),
            DomainRecord::new(" ", "cf").with_expiry("2030-01-01"),
            DomainRecord::new("c.com", "").with_expiry("2030-01-01"),
        ]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&cache_key("A.com.", "CF")), Some("2030-01-01"));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_unparsable_dates_are_kept_until_checked() {
        let store = ExpiryCacheStore::from_entries(vec![
            DomainRecord::new("a.com", "cf").with_expiry("garbage"),
        ]);
        assert_eq!(store.get("a.com|cf"), Some("garbage"));
    }

    #[test]
    fn test_refresh_marks_dirty_only_on_change() {
        let mut store = ExpiryCacheStore::from_entries(vec![
            DomainRecord::new("a.com", "cf").with_expiry("2030-01-01"),
        ]);

        store.refresh("a.com", "cf", date(2030, 1, 1));
        assert!(!store.is_dirty());

        store.refresh("A.COM", "cf", date(2031, 1, 1));
        assert!(store.is_dirty());
        assert_eq!(store.get("a.com|cf"), Some("2031-01-01"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evict() {
        let mut store = ExpiryCacheStore::from_entries(vec![
            DomainRecord::new("a.com", "cf").with_expiry("2030-01-01"),
        ]);
        assert!(!store.evict("missing|cf"));
        assert!(!store.is_dirty());

        assert!(store.evict("a.com|cf"));
        assert!(store.is_dirty());
        assert!(store.is_empty());
    }
}
