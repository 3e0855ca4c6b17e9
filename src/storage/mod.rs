//! Storage abstractions for run state.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Aggregator configuration
//! ├── profile.toml          # Candidate profile
//! ├── credentials.toml      # API credentials (optional)
//! ├── tracker.json          # Cross-run tracking state
//! ├── results.json          # Latest ranked results
//! └── ratelimits.sqlite3    # Persistent rate-limit buckets
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ManualSearchUrl, RankedListing, TrackerData};
use crate::pipeline::{RunOutput, RunStats};

pub use local::LocalStorage;

/// Current `tracker.json` schema version.
pub const TRACKER_VERSION: u32 = 1;

/// Contents of `results.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub run_id: String,
    pub count: usize,
    pub stats: RunStats,
    pub fetch_summary: String,
    pub results: Vec<RankedListing>,
    #[serde(default)]
    pub manual_urls: Vec<ManualSearchUrl>,
}

impl ResultsSnapshot {
    pub fn new(output: &RunOutput) -> Self {
        Self {
            generated_at: Utc::now(),
            run_id: output.stats.run_id.clone(),
            count: output.results.len(),
            stats: output.stats.clone(),
            fetch_summary: output.fetch_summary.clone(),
            results: output.results.clone(),
            manual_urls: output.manual_urls.clone(),
        }
    }
}

/// Persistence for tracker state and run results.
#[async_trait]
pub trait TrackerStorage: Send + Sync {
    /// Load the tracker, or an empty one when none exists yet.
    async fn load_tracker(&self) -> Result<TrackerData>;

    /// Replace the tracker atomically.
    async fn save_tracker(&self, data: &TrackerData) -> Result<()>;

    /// Replace the latest results atomically.
    async fn save_results(&self, snapshot: &ResultsSnapshot) -> Result<()>;

    async fn load_results(&self) -> Result<Option<ResultsSnapshot>>;
}
