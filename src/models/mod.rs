// src/models/mod.rs

//! Domain models for jobsweep.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod listing;
mod profile;
mod query;
mod score;
mod source;
mod tracker;

// Re-export all public types
pub use config::{
    Config, DedupConfig, FetchConfig, LoggingConfig, Period, RateWindow, ScoringConfig,
    TrackerConfig,
};
pub use listing::{EmploymentType, JobListing, ParseConfidence, PayPeriod, Salary};
pub use profile::{
    Arrangement, CandidateProfile, ExperienceLevel, LocationPreference, ScoringWeights,
    StaffingPreference, WeightOverrides,
};
pub use query::{QueryPlan, SearchQuery};
pub use score::{
    Adjustments, ComponentScores, MAX_SCORE, RankedListing, ScoreBreakdown, ScoreResult,
};
pub use source::{
    ApiConfig, ApiFlavor, ManualConfig, ScrapeConfig, ScrapeSelectors, SourceConfig, SourceKind,
};
pub use tracker::{
    ApplicationStatus, Freshness, RunHistoryEntry, TrackTag, TrackerData, TrackerRecord,
    TrackerStats,
};

/// A search URL for a source that cannot be automated.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ManualSearchUrl {
    pub source_id: String,
    pub source_name: String,
    pub query: String,
    pub url: String,
}
