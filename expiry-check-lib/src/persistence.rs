//! Persistence collaborator for pass outputs and the expiry cache.
//!
//! All four capabilities are mandatory parts of one trait. The file-backed
//! implementation stores newline-terminated `a|b|c` records and replaces each
//! file as a whole (temporary sibling + rename), so readers never see a
//! half-written file.

use crate::error::ExpiryCheckError;
use crate::types::{DomainRecord, FailureRecord};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage for cache rows and pass outputs.
#[async_trait]
pub trait ExpiryRepository: Send + Sync {
    /// Load cached `(domain, source, expiry)` rows. A missing store is empty.
    async fn load_expiry_cache(&self) -> Result<Vec<DomainRecord>, ExpiryCheckError>;

    /// Replace the cache with `entries`. Rows with an empty field are skipped.
    async fn save_expiry_cache(&self, entries: &[DomainRecord]) -> Result<(), ExpiryCheckError>;

    /// Replace the expiring-domains output.
    async fn save_expiring(&self, entries: &[DomainRecord]) -> Result<(), ExpiryCheckError>;

    /// Replace the failures output.
    async fn save_failures(&self, entries: &[FailureRecord]) -> Result<(), ExpiryCheckError>;
}

/// Render one pipe-delimited record line, each field trimmed.
pub fn format_record_line(first: &str, second: &str, third: &str) -> String {
    format!("{}|{}|{}\n", first.trim(), second.trim(), third.trim())
}

/// Parse a `domain|source|expiry` line.
///
/// Blank lines and `#` comments yield `None`. A missing or empty source falls
/// back to `default_source`; a missing expiry is `None`.
pub fn parse_record_line(line: &str, default_source: &str) -> Option<DomainRecord> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut parts = line.split('|').map(str::trim);
    let domain = parts.next().filter(|d| !d.is_empty())?;
    let source = parts
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(default_source.trim());
    let expiry = parts.next().filter(|e| !e.is_empty());

    Some(DomainRecord {
        domain: domain.to_string(),
        source: source.to_string(),
        expiry: expiry.map(String::from),
    })
}

/// File-backed repository.
#[derive(Debug, Clone)]
pub struct FileRepository {
    expiring_path: PathBuf,
    failures_path: PathBuf,
    cache_path: PathBuf,
}

impl FileRepository {
    /// Create a repository writing to the three given files.
    pub fn new<E, F, C>(expiring_path: E, failures_path: F, cache_path: C) -> Self
    where
        E: Into<PathBuf>,
        F: Into<PathBuf>,
        C: Into<PathBuf>,
    {
        Self {
            expiring_path: expiring_path.into(),
            failures_path: failures_path.into(),
            cache_path: cache_path.into(),
        }
    }

    pub fn expiring_path(&self) -> &Path {
        &self.expiring_path
    }

    pub fn failures_path(&self) -> &Path {
        &self.failures_path
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Replace `path` with `content` via a temporary sibling and a rename.
    async fn replace_file(path: &Path, content: String) -> Result<(), ExpiryCheckError> {
        let display = path.to_string_lossy().to_string();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ExpiryCheckError::persistence(
                    &display,
                    format!("Failed to create parent directory: {}", e),
                )
            })?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        tokio::fs::write(&tmp_path, content).await.map_err(|e| {
            ExpiryCheckError::persistence(&display, format!("Failed to write temporary file: {}", e))
        })?;

        tokio::fs::rename(&tmp_path, path).await.map_err(|e| {
            ExpiryCheckError::persistence(&display, format!("Failed to replace file: {}", e))
        })?;

        let replaced_path = &display;
        debug!(path = %replaced_path, "file replaced");
        Ok(())
    }
}

#[async_trait]
impl ExpiryRepository for FileRepository {
    async fn load_expiry_cache(&self) -> Result<Vec<DomainRecord>, ExpiryCheckError> {
        let content = match tokio::fs::read_to_string(&self.cache_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ExpiryCheckError::persistence(
                    self.cache_path.to_string_lossy(),
                    format!("Failed to read expiry cache: {}", e),
                ))
            }
        };

        let entries = content
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.trim().split('|').map(str::trim).collect();
                if parts.len() < 3 {
                    return None;
                }
                Some(DomainRecord::new(parts[0], parts[1]).with_expiry(parts[2]))
            })
            .collect();

        Ok(entries)
    }

    async fn save_expiry_cache(&self, entries: &[DomainRecord]) -> Result<(), ExpiryCheckError> {
        let content: String = entries
            .iter()
            .filter_map(|entry| {
                let expiry = entry.explicit_expiry()?;
                if entry.domain.trim().is_empty() || entry.source.trim().is_empty() {
                    return None;
                }
                Some(format_record_line(&entry.domain, &entry.source, expiry))
            })
            .collect();

        Self::replace_file(&self.cache_path, content).await
    }

    async fn save_expiring(&self, entries: &[DomainRecord]) -> Result<(), ExpiryCheckError> {
        let content: String = entries
            .iter()
            .map(|entry| {
                format_record_line(
                    &entry.domain,
                    &entry.source,
                    entry.expiry.as_deref().unwrap_or_default(),
                )
            })
            .collect();

        Self::replace_file(&self.expiring_path, content).await
    }

    async fn save_failures(&self, entries: &[FailureRecord]) -> Result<(), ExpiryCheckError> {
        // The reason column is kept for format compatibility and left empty.
        let content: String = entries
            .iter()
            .map(|entry| format_record_line(&entry.domain, &entry.source, ""))
            .collect();

        Self::replace_file(&self.failures_path, content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo_in(dir: &TempDir) -> FileRepository {
        FileRepository::new(
            dir.path().join("expiring.txt"),
            dir.path().join("failures.txt"),
            dir.path().join("cache.txt"),
        )
    }

    #[test]
    fn test_parse_record_line() {
        let record = parse_record_line("gamestores.us.com|yuang6496|2026-01-03", "file").unwrap();
        assert_eq!(record.domain, "gamestores.us.com");
        assert_eq!(record.source, "yuang6496");
        assert_eq!(record.expiry.as_deref(), Some("2026-01-03"));

        let record = parse_record_line("example.com", "domains.txt").unwrap();
        assert_eq!(record.source, "domains.txt");
        assert_eq!(record.expiry, None);

        let record = parse_record_line("example.com||", "domains.txt").unwrap();
        assert_eq!(record.source, "domains.txt");
        assert_eq!(record.expiry, None);

        assert!(parse_record_line("   ", "x").is_none());
        assert!(parse_record_line("# comment", "x").is_none());
        assert!(parse_record_line("|src|2026-01-01", "x").is_none());
    }

    #[tokio::test]
    async fn test_missing_cache_loads_empty() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);
        let entries = repo.load_expiry_cache().await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_cache_save_skips_incomplete_rows() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);

        let entries = vec![
            DomainRecord::new(" a.com ", " cf ").with_expiry("2030-01-01"),
            DomainRecord::new("b.com", "cf"),
            DomainRecord::new("", "cf").with_expiry("2030-01-01"),
            DomainRecord::new("c.com", " ").with_expiry("2030-01-01"),
        ];
        repo.save_expiry_cache(&entries).await.unwrap();

        let content = std::fs::read_to_string(repo.cache_path()).unwrap();
        assert_eq!(content, "a.com|cf|2030-01-01\n");

        let loaded = repo.load_expiry_cache().await.unwrap();
        assert_eq!(
            loaded,
            vec![DomainRecord::new("a.com", "cf").with_expiry("2030-01-01")]
        );
    }

    #[tokio::test]
    async fn test_load_skips_short_lines() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);
        std::fs::write(
            repo.cache_path(),
            "a.com|cf|2030-01-01\nbroken-line\n\nb.com|cf\n",
        )
        .unwrap();

        let loaded = repo.load_expiry_cache().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].domain, "a.com");
    }

    #[tokio::test]
    async fn test_outputs_overwrite_previous_content() {
        let dir = TempDir::new().unwrap();
        let repo = repo_in(&dir);

        repo.save_failures(&[FailureRecord::new("old.com", "cf")])
            .await
            .unwrap();
        repo.save_failures(&[]).await.unwrap();
        assert_eq!(std::fs::read_to_string(repo.failures_path()).unwrap(), "");

        repo.save_failures(&[FailureRecord::new("x.com", "cf")])
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(repo.failures_path()).unwrap(),
            "x.com|cf|\n"
        );

        repo.save_expiring(&[DomainRecord::new("y.com", "file").with_expiry("2026-01-03")])
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(repo.expiring_path()).unwrap(),
            "y.com|file|2026-01-03\n"
        );
    }
}
