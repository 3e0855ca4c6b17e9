//! Pipeline stages of an aggregation run.
//!
//! - `fetch`: Run the query plan against every source under quota
//! - `dedup`: Merge the same posting reported by several sources
//! - `track`: Tag listings new or seen across runs
//! - `run`: Tie the stages together and persist the results

pub mod dedup;
pub mod fetch;
pub mod run;
pub mod track;

pub use dedup::{DedupOutcome, Deduplicator};
pub use fetch::{CancelFlag, FetchOrchestrator, FetchReport, FetchUnit, SkipReason, SourceOutcome};
pub use run::{RunOptions, RunOutput, RunStats, SearchContext, run_search};
pub use track::{RunTracker, tracking_key};
