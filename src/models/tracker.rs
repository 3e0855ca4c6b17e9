// src/models/tracker.rs

//! Persisted cross-run tracking state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Where the candidate is with a posting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Unreviewed,
    Interested,
    Applied,
    Interviewing,
    Offer,
    Rejected,
    Ignored,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreviewed => "unreviewed",
            Self::Interested => "interested",
            Self::Applied => "applied",
            Self::Interviewing => "interviewing",
            Self::Offer => "offer",
            Self::Rejected => "rejected",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unreviewed" => Ok(Self::Unreviewed),
            "interested" => Ok(Self::Interested),
            "applied" => Ok(Self::Applied),
            "interviewing" => Ok(Self::Interviewing),
            "offer" => Ok(Self::Offer),
            "rejected" => Ok(Self::Rejected),
            "ignored" => Ok(Self::Ignored),
            other => Err(AppError::validation(format!(
                "unknown application status '{other}'"
            ))),
        }
    }
}

/// History of one canonical key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerRecord {
    pub key: String,
    /// Other keys that resolve to this record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub title: String,
    pub company: String,
    pub url: String,
    pub first_seen_run: String,
    pub first_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub last_seen_run: String,
    pub last_seen_at: DateTime<Utc>,
    /// Number of distinct runs that reproduced this key
    pub times_seen: u32,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One run's contribution to the history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunHistoryEntry {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub total_results: usize,
    pub new_results: usize,
}

/// Whole tracker store as persisted to `tracker.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TrackerData {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub jobs: BTreeMap<String, TrackerRecord>,
    #[serde(default)]
    pub runs: Vec<RunHistoryEntry>,
}

/// Whether a listing was seen for the first time in this run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    New,
    Seen,
}

/// Tag attached to every surviving listing by the run tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackTag {
    pub key: String,
    pub freshness: Freshness,
    pub status: ApplicationStatus,
}

impl TrackTag {
    pub fn is_new(&self) -> bool {
        self.freshness == Freshness::New
    }
}

/// Aggregate statistics over the retained history window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrackerStats {
    pub retained_runs: usize,
    pub average_new_per_run: f64,
    /// Keys ever recorded
    pub lifetime_unique: usize,
    /// Keys seen within the retention window
    pub active_keys: usize,
}
