//! Local filesystem storage implementation.
//!
//! Every write goes to a sibling `.tmp` file first and is renamed into
//! place, so readers only ever see a complete previous or new version.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::TrackerData;
use crate::storage::{ResultsSnapshot, TRACKER_VERSION, TrackerStorage};

const TRACKER_FILE: &str = "tracker.json";
const RESULTS_FILE: &str = "results.json";
const LIMITER_FILE: &str = "ratelimits.sqlite3";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Location of the rate-limit database.
    pub fn limiter_path(&self) -> PathBuf {
        self.path(LIMITER_FILE)
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Move an unreadable file aside so the next save starts clean.
    async fn quarantine(&self, key: &str) -> Result<PathBuf> {
        let target = self.path(&format!(
            "{key}.corrupt-{}",
            Utc::now().format("%Y%m%dT%H%M%S")
        ));
        tokio::fs::rename(self.path(key), &target).await?;
        Ok(target)
    }
}

#[async_trait]
impl TrackerStorage for LocalStorage {
    async fn load_tracker(&self) -> Result<TrackerData> {
        match self.read_json::<TrackerData>(TRACKER_FILE).await {
            Ok(Some(mut data)) => {
                if data.version == 0 {
                    data.version = TRACKER_VERSION;
                }
                Ok(data)
            }
            Ok(None) => {
                log::info!("No {TRACKER_FILE} found, starting with an empty tracker");
                Ok(TrackerData {
                    version: TRACKER_VERSION,
                    ..TrackerData::default()
                })
            }
            Err(AppError::Json(e)) => {
                let moved = self.quarantine(TRACKER_FILE).await?;
                log::warn!(
                    "{TRACKER_FILE} is corrupt ({e}); moved to {} and starting fresh",
                    moved.display()
                );
                Ok(TrackerData {
                    version: TRACKER_VERSION,
                    ..TrackerData::default()
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn save_tracker(&self, data: &TrackerData) -> Result<()> {
        self.write_json(TRACKER_FILE, data).await?;
        log::debug!("Saved {} tracked keys to {TRACKER_FILE}", data.jobs.len());
        Ok(())
    }

    async fn save_results(&self, snapshot: &ResultsSnapshot) -> Result<()> {
        self.write_json(RESULTS_FILE, snapshot).await?;
        log::info!("Wrote {} results to {RESULTS_FILE}", snapshot.count);
        Ok(())
    }

    async fn load_results(&self) -> Result<Option<ResultsSnapshot>> {
        self.read_json(RESULTS_FILE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, TrackerRecord};
    use tempfile::TempDir;

    fn record(key: &str) -> TrackerRecord {
        let now = Utc::now();
        TrackerRecord {
            key: key.into(),
            aliases: Vec::new(),
            title: "Rust Engineer".into(),
            company: "Acme".into(),
            url: "https://x.test/1".into(),
            first_seen_run: "r1".into(),
            first_seen_at: now,
            last_seen_run: "r1".into(),
            last_seen_at: now,
            times_seen: 1,
            status: ApplicationStatus::Unreviewed,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("nested/test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("nested/test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!storage.path("nested/test.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_tracker_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.load_tracker().await.unwrap();
        assert!(data.jobs.is_empty());
        assert_eq!(data.version, TRACKER_VERSION);
    }

    #[tokio::test]
    async fn test_tracker_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut data = TrackerData {
            version: TRACKER_VERSION,
            ..TrackerData::default()
        };
        data.jobs.insert("abc".into(), record("abc"));
        storage.save_tracker(&data).await.unwrap();

        assert_eq!(storage.load_tracker().await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_corrupt_tracker_is_quarantined() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        tokio::fs::write(storage.path(TRACKER_FILE), b"{ not json").await.unwrap();

        let data = storage.load_tracker().await.unwrap();
        assert!(data.jobs.is_empty());
        assert!(!storage.path(TRACKER_FILE).exists());

        let quarantined = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with("tracker.json.corrupt-"));
        assert!(quarantined);
    }
}
