// src/limiter/store.rs

//! SQLite-backed persistence for rate-limit events.
//!
//! Every check runs inside an `IMMEDIATE` transaction, so concurrent
//! workers hitting the same backend are serialized by SQLite itself and the
//! window counts survive process restarts.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::error::{AppError, Result};
use crate::models::RateWindow;

/// Outcome of one quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied {
        /// The window that is exhausted
        window: RateWindow,
        /// Earliest instant the window admits another event
        retry_at: DateTime<Utc>,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Usage of one window at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowUsage {
    pub window: RateWindow,
    pub used: u32,
    pub remaining: u32,
    /// When the oldest counted event leaves the window
    pub resets_at: Option<DateTime<Utc>>,
}

/// Handle to the rate-limit database.
pub struct RateLimitStore {
    conn: Mutex<Option<Connection>>,
    path: PathBuf,
}

impl RateLimitStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(&conn)?;
        log::debug!("Opened rate-limit store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS rate_buckets (
                backend TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS rate_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                backend TEXT NOT NULL REFERENCES rate_buckets(backend),
                at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_rate_events_backend ON rate_events(backend, at_ms);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Store("connection lock poisoned".into()))
    }

    /// Record the bucket row for `backend` if it does not exist yet.
    pub fn ensure_bucket(&self, backend: &str, now: DateTime<Utc>) -> Result<()> {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| AppError::Store("store is closed".into()))?;
        conn.execute(
            "INSERT OR IGNORE INTO rate_buckets (backend, created_at) VALUES (?1, ?2)",
            params![backend, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Count the event against every window and record it if all allow it.
    pub fn try_acquire(
        &self,
        backend: &str,
        windows: &[RateWindow],
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let mut guard = self.lock()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| AppError::Store("store is closed".into()))?;
        let now_ms = now.timestamp_millis();

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT OR IGNORE INTO rate_buckets (backend, created_at) VALUES (?1, ?2)",
            params![backend, now.to_rfc3339()],
        )?;

        if let Some(longest) = windows.iter().map(|w| w.per.as_secs()).max() {
            tx.execute(
                "DELETE FROM rate_events WHERE backend = ?1 AND at_ms <= ?2",
                params![backend, now_ms - longest * 1000],
            )?;
        }

        for window in windows {
            let usage = window_usage(&tx, backend, *window, now_ms)?;
            if usage.remaining == 0 {
                let retry_at = usage.resets_at.unwrap_or(now);
                tx.commit()?;
                return Ok(Decision::Denied {
                    window: *window,
                    retry_at,
                });
            }
        }

        if !windows.is_empty() {
            tx.execute(
                "INSERT INTO rate_events (backend, at_ms) VALUES (?1, ?2)",
                params![backend, now_ms],
            )?;
        }
        tx.commit()?;
        Ok(Decision::Allowed)
    }

    /// Current usage of every window, without recording an event.
    pub fn usage(
        &self,
        backend: &str,
        windows: &[RateWindow],
        now: DateTime<Utc>,
    ) -> Result<Vec<WindowUsage>> {
        let guard = self.lock()?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| AppError::Store("store is closed".into()))?;
        let now_ms = now.timestamp_millis();
        windows
            .iter()
            .map(|w| window_usage(conn, backend, *w, now_ms))
            .collect()
    }

    /// Release the database handle. Later calls fail with `AppError::Store`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| AppError::from(e))?;
            log::debug!("Closed rate-limit store at {}", self.path.display());
        }
        Ok(())
    }
}

fn window_usage(
    conn: &Connection,
    backend: &str,
    window: RateWindow,
    now_ms: i64,
) -> Result<WindowUsage> {
    let period_ms = window.per.as_secs() * 1000;
    let since = now_ms - period_ms;

    let used: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rate_events WHERE backend = ?1 AND at_ms > ?2",
        params![backend, since],
        |row| row.get(0),
    )?;
    let used = u32::try_from(used).unwrap_or(u32::MAX);
    let remaining = window.limit.saturating_sub(used);

    // The window frees a slot once the event at position (used - limit)
    // in age order drops out of it.
    let offset = i64::from(used.saturating_sub(window.limit));
    let pivot: Option<i64> = if used == 0 {
        None
    } else {
        conn.query_row(
            "SELECT at_ms FROM rate_events WHERE backend = ?1 AND at_ms > ?2
             ORDER BY at_ms ASC LIMIT 1 OFFSET ?3",
            params![backend, since, offset],
            |row| row.get(0),
        )
        .optional()?
    };
    let resets_at = pivot.and_then(|ms| Utc.timestamp_millis_opt(ms + period_ms).single());

    Ok(WindowUsage {
        window,
        used,
        remaining,
        resets_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Period;
    use tempfile::TempDir;

    #[test]
    fn test_denies_after_limit_and_reports_reset() {
        let tmp = TempDir::new().unwrap();
        let store = RateLimitStore::open(tmp.path().join("rl.sqlite3")).unwrap();
        let windows = [RateWindow::new(2, Period::Second)];
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        assert!(store.try_acquire("b", &windows, t0).unwrap().is_allowed());
        assert!(store.try_acquire("b", &windows, t0).unwrap().is_allowed());
        match store.try_acquire("b", &windows, t0).unwrap() {
            Decision::Denied { retry_at, .. } => {
                assert_eq!(retry_at, t0 + chrono::Duration::seconds(1))
            }
            Decision::Allowed => panic!("third event should be denied"),
        }
    }

    #[test]
    fn test_empty_windows_always_allow() {
        let tmp = TempDir::new().unwrap();
        let store = RateLimitStore::open(tmp.path().join("rl.sqlite3")).unwrap();
        let now = Utc::now();
        for _ in 0..10 {
            assert!(store.try_acquire("free", &[], now).unwrap().is_allowed());
        }
    }

    #[test]
    fn test_closed_store_errors() {
        let tmp = TempDir::new().unwrap();
        let store = RateLimitStore::open(tmp.path().join("rl.sqlite3")).unwrap();
        store.close().unwrap();
        let err = store
            .try_acquire("b", &[RateWindow::new(1, Period::Minute)], Utc::now())
            .unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        // Closing twice is harmless.
        store.close().unwrap();
    }

    #[test]
    fn test_usage_counts_without_recording() {
        let tmp = TempDir::new().unwrap();
        let store = RateLimitStore::open(tmp.path().join("rl.sqlite3")).unwrap();
        let windows = [RateWindow::new(5, Period::Minute)];
        let now = Utc::now();
        store.try_acquire("b", &windows, now).unwrap();

        let usage = store.usage("b", &windows, now).unwrap();
        assert_eq!(usage[0].used, 1);
        assert_eq!(usage[0].remaining, 4);
        let again = store.usage("b", &windows, now).unwrap();
        assert_eq!(again[0].used, 1);
    }
}
