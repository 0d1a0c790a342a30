//! Metadata Store
//!
//! One JSON document per (account, region) under the connections
//! directory. Reads migrate legacy documents and persist the upgraded form
//! immediately; writes go to a temp file in the same directory and are
//! renamed over the target so a crash never leaves a torn record.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::migration::{parse_document, upgrade};
use super::types::ConnectionMetadata;

/// Errors while persisting metadata
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create metadata directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write metadata {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to delete metadata {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result of reading a record, keeping "corrupt" apart from "missing"
#[derive(Debug, Clone)]
pub enum LoadResult {
    Found(ConnectionMetadata),
    Missing,
    Corrupt { path: PathBuf, reason: String },
}

/// File-backed store of connection metadata
#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    /// Store rooted at `dir` (created lazily on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing an (account, region) record
    pub fn path_for(&self, account_id: &str, region: &str) -> PathBuf {
        self.dir.join(format!("{}-{}.json", account_id, region))
    }

    /// Read a record, distinguishing missing from corrupt.
    ///
    /// Legacy or unversioned documents are upgraded and rewritten before
    /// returning. A failed rewrite is logged; the upgraded value is still
    /// returned.
    pub fn inspect(&self, account_id: &str, region: &str) -> LoadResult {
        self.read_path(&self.path_for(account_id, region))
    }

    /// Read a record; corrupt documents are logged and reported as absent
    pub fn load(&self, account_id: &str, region: &str) -> Option<ConnectionMetadata> {
        match self.inspect(account_id, region) {
            LoadResult::Found(metadata) => Some(metadata),
            LoadResult::Missing => None,
            LoadResult::Corrupt { path, reason } => {
                warn!(path = %path.display(), reason = %reason, "Ignoring unreadable connection metadata");
                None
            }
        }
    }

    /// Persist a record atomically
    pub fn save(&self, metadata: &ConnectionMetadata) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path_for(&metadata.account_id, &metadata.region);
        let body = serde_json::to_string_pretty(metadata)?;

        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(body.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), "Saved connection metadata");
        Ok(())
    }

    /// Remove a record; succeeds when it does not exist
    pub fn delete(&self, account_id: &str, region: &str) -> Result<(), StoreError> {
        let path = self.path_for(account_id, region);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted connection metadata");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Delete { path, source }),
        }
    }

    pub fn exists(&self, account_id: &str, region: &str) -> bool {
        self.path_for(account_id, region).is_file()
    }

    /// Every readable record; unreadable ones are logged and skipped
    pub fn list(&self) -> Vec<ConnectionMetadata> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list connection metadata");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_path(&path) {
                LoadResult::Found(metadata) => records.push(metadata),
                LoadResult::Missing => {}
                LoadResult::Corrupt { path, reason } => {
                    warn!(path = %path.display(), reason = %reason, "Skipping unreadable connection metadata");
                }
            }
        }

        records.sort_by(|a, b| (&a.account_id, &a.region).cmp(&(&b.account_id, &b.region)));
        records
    }

    fn read_path(&self, path: &Path) -> LoadResult {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadResult::Missing,
            Err(e) => {
                return LoadResult::Corrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        };

        let doc = match parse_document(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                return LoadResult::Corrupt {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        };

        let upgraded = upgrade(doc);
        if upgraded.changed {
            info!(
                account_id = %upgraded.metadata.account_id,
                region = %upgraded.metadata.region,
                version = %upgraded.metadata.version,
                "Upgraded connection metadata format"
            );
            if let Err(e) = self.save(&upgraded.metadata) {
                warn!(error = %e, "Failed to persist upgraded connection metadata");
            }
        }

        LoadResult::Found(upgraded.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::EmailPreset;
    use crate::metadata::migration::is_legacy_shape;
    use crate::metadata::types::{Email, HostingProvider, METADATA_VERSION};
    use tempfile::tempdir;

    const LEGACY: &str = r#"{
        "accountId": "123456789012",
        "region": "us-east-1",
        "provider": "vercel",
        "timestamp": "2024-05-01T12:00:00Z",
        "preset": "starter",
        "emailConfig": {"tlsRequired": true},
        "pulumiStackName": "mailplane-123456789012-us-east-1"
    }"#;

    fn sample() -> ConnectionMetadata {
        let mut meta = ConnectionMetadata::new("123456789012", "us-east-1", HostingProvider::Aws);
        meta.add_service::<Email>(
            EmailPreset::Production.config().with_domain("acme.dev"),
            Some(EmailPreset::Production),
            Some("mailplane-123456789012-us-east-1".to_string()),
        );
        meta
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("connections"));
        let meta = sample();

        store.save(&meta).unwrap();
        let loaded = store.load("123456789012", "us-east-1").unwrap();
        assert_eq!(loaded, meta);

        let first = fs::read_to_string(store.path_for("123456789012", "us-east-1")).unwrap();
        store.save(&loaded).unwrap();
        let second = fs::read_to_string(store.path_for("123456789012", "us-east-1")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_legacy_migrates_on_read_and_persists() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let path = store.path_for("123456789012", "us-east-1");
        fs::write(&path, LEGACY).unwrap();

        let first = store.load("123456789012", "us-east-1").unwrap();
        assert_eq!(first.version, METADATA_VERSION);

        let on_disk: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(!is_legacy_shape(&on_disk));

        let second = store.load("123456789012", "us-east-1").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            second.service::<Email>().unwrap().pulumi_stack_name.as_deref(),
            Some("mailplane-123456789012-us-east-1")
        );
    }

    #[test]
    fn test_corrupt_record_is_distinct_but_loads_as_absent() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        fs::write(store.path_for("1", "us-east-1"), "{ truncated").unwrap();

        assert!(matches!(
            store.inspect("1", "us-east-1"),
            LoadResult::Corrupt { .. }
        ));
        assert!(store.load("1", "us-east-1").is_none());
        assert!(matches!(store.inspect("2", "us-east-1"), LoadResult::Missing));
    }

    #[test]
    fn test_newer_version_is_corrupt_and_left_untouched() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let path = store.path_for("123456789012", "us-east-1");
        let raw = r#"{
            "version": "3.0.0",
            "accountId": "123456789012",
            "region": "us-east-1",
            "provider": "aws",
            "timestamp": "2024-05-01T12:00:00Z",
            "services": {"push": {"config": {"platform": "apns"}}}
        }"#;
        fs::write(&path, raw).unwrap();

        match store.inspect("123456789012", "us-east-1") {
            LoadResult::Corrupt { reason, .. } => assert!(reason.contains("3.0.0")),
            other => panic!("expected Corrupt, got {:?}", other),
        }
        assert!(store.load("123456789012", "us-east-1").is_none());
        assert!(store.list().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), raw);
    }

    #[test]
    fn test_list_skips_unreadable_records() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save(&sample()).unwrap();
        fs::write(store.path_for("999", "eu-west-1"), "garbage").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let records = store.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].account_id, "123456789012");
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("never-created"));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save(&sample()).unwrap();
        assert!(store.exists("123456789012", "us-east-1"));

        store.delete("123456789012", "us-east-1").unwrap();
        assert!(!store.exists("123456789012", "us-east-1"));
        store.delete("123456789012", "us-east-1").unwrap();
    }
}
