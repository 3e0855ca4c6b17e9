// src/limiter/mod.rs

//! Persistent, non-blocking per-backend rate limiting.
//!
//! Sources are routed to a backend id through the `backends` table of the
//! configuration; sources missing from it use their own id. Each backend id
//! owns exactly one shared [`RateBucket`], created on first use, which may
//! enforce several windows at once (e.g. 25/minute and 250/day).
//!
//! A check never waits: a denial is returned immediately and the caller
//! skips the source for this run.

mod store;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, RateWindow};

pub use store::{Decision, RateLimitStore, WindowUsage};

/// Snapshot of a backend's quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitState {
    pub backend_id: String,
    pub windows: Vec<WindowUsage>,
    /// Smallest remaining count across windows; `None` when unlimited
    pub remaining: Option<u32>,
    /// Next instant any exhausted window frees a slot
    pub next_reset: Option<DateTime<Utc>>,
}

/// The single quota bucket of one backend id.
pub struct RateBucket {
    backend_id: String,
    windows: Vec<RateWindow>,
    store: Arc<RateLimitStore>,
}

impl RateBucket {
    pub fn backend_id(&self) -> &str {
        &self.backend_id
    }

    pub fn windows(&self) -> &[RateWindow] {
        &self.windows
    }

    /// Try to take one event from every window.
    pub fn try_acquire(&self, now: DateTime<Utc>) -> Result<Decision> {
        self.store.try_acquire(&self.backend_id, &self.windows, now)
    }

    /// Compute remaining quota and next reset without consuming anything.
    pub fn state(&self, now: DateTime<Utc>) -> Result<RateLimitState> {
        let windows = self.store.usage(&self.backend_id, &self.windows, now)?;
        let remaining = windows.iter().map(|w| w.remaining).min();
        let next_reset = windows
            .iter()
            .filter(|w| w.remaining == 0)
            .filter_map(|w| w.resets_at)
            .max();
        Ok(RateLimitState {
            backend_id: self.backend_id.clone(),
            windows,
            remaining,
            next_reset,
        })
    }
}

/// Routes sources to shared buckets and answers quota checks.
pub struct RateLimiter {
    store: Arc<RateLimitStore>,
    backend_map: HashMap<String, String>,
    windows: HashMap<String, Vec<RateWindow>>,
    buckets: RwLock<HashMap<String, Arc<RateBucket>>>,
}

impl RateLimiter {
    /// Create a limiter over an opened store.
    pub fn new(
        store: Arc<RateLimitStore>,
        backend_map: HashMap<String, String>,
        windows: HashMap<String, Vec<RateWindow>>,
    ) -> Self {
        Self {
            store,
            backend_map,
            windows,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Open the store at `path` and take mapping and windows from `config`.
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let store = Arc::new(RateLimitStore::open(path)?);
        Ok(Self::new(
            store,
            config.backends.clone().into_iter().collect(),
            config.rate_limits.clone().into_iter().collect(),
        ))
    }

    /// Backend id a source is measured against.
    pub fn backend_for<'a>(&'a self, source_id: &'a str) -> &'a str {
        self.backend_map
            .get(source_id)
            .map(String::as_str)
            .unwrap_or(source_id)
    }

    /// Shared bucket for `backend_id`, created on first use.
    pub fn bucket(&self, backend_id: &str) -> Result<Arc<RateBucket>> {
        if let Some(bucket) = self.read_buckets()?.get(backend_id) {
            return Ok(Arc::clone(bucket));
        }

        let mut buckets = self
            .buckets
            .write()
            .map_err(|_| AppError::Store("bucket table lock poisoned".into()))?;
        let bucket = buckets.entry(backend_id.to_string()).or_insert_with(|| {
            log::debug!("Creating rate bucket for backend '{backend_id}'");
            Arc::new(RateBucket {
                backend_id: backend_id.to_string(),
                windows: self.windows.get(backend_id).cloned().unwrap_or_default(),
                store: Arc::clone(&self.store),
            })
        });
        Ok(Arc::clone(bucket))
    }

    fn read_buckets(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<RateBucket>>>> {
        self.buckets
            .read()
            .map_err(|_| AppError::Store("bucket table lock poisoned".into()))
    }

    /// Non-blocking quota check for a source at the current time.
    pub fn check(&self, source_id: &str) -> bool {
        self.check_at(source_id, Utc::now())
    }

    /// Quota check at an explicit instant.
    ///
    /// Store failures deny the request so a broken store can never cause a
    /// quota overrun.
    pub fn check_at(&self, source_id: &str, now: DateTime<Utc>) -> bool {
        match self.decide(source_id, now) {
            Ok(decision) => decision.is_allowed(),
            Err(e) => {
                log::warn!("Rate-limit check for {source_id} failed, denying: {e}");
                false
            }
        }
    }

    /// Quota check returning the full decision, including time-to-reset.
    pub fn decide(&self, source_id: &str, now: DateTime<Utc>) -> Result<Decision> {
        let backend = self.backend_for(source_id);
        self.bucket(backend)?.try_acquire(now)
    }

    /// Remaining quota and next reset of a backend.
    pub fn status(&self, backend_id: &str, now: DateTime<Utc>) -> Result<RateLimitState> {
        self.bucket(backend_id)?.state(now)
    }

    /// Backend ids that have configured windows, sorted.
    pub fn configured_backends(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.windows.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Release the storage handle so the next run can open it cleanly.
    pub fn close(&self) -> Result<()> {
        if let Ok(mut buckets) = self.buckets.write() {
            buckets.clear();
        }
        self.store.close()
    }
}
