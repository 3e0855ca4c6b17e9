// src/models/score.rs

//! Scoring results.

use serde::{Deserialize, Serialize};

use crate::models::{JobListing, TrackTag};

/// Upper bound of every score and sub-score.
pub const MAX_SCORE: f64 = 5.0;

/// Sub-scores of the independent scoring components, each in 0.0..=5.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ComponentScores {
    pub skills: f64,
    pub title: f64,
    pub seniority: f64,
    pub location: f64,
    pub domain: f64,
    pub response: f64,
}

/// Post-scoring adjustments that were applied, in application order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Adjustments {
    /// Multiplier from the staffing-firm preference (1.0 = untouched)
    pub staffing_multiplier: f64,
    /// Points subtracted for pay below the compensation floor
    pub comp_penalty: f64,
    /// Points subtracted for a low-confidence scrape
    pub confidence_penalty: f64,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            staffing_multiplier: 1.0,
            comp_penalty: 0.0,
            confidence_penalty: 0.0,
        }
    }
}

/// Per-component breakdown of a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ScoreBreakdown {
    pub components: ComponentScores,
    /// Weighted sum before adjustments
    pub weighted: f64,
    pub adjustments: Adjustments,
}

/// Outcome of scoring one listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreResult {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub disqualified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disqualification_reason: Option<String>,
}

impl ScoreResult {
    pub fn disqualified(reason: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            breakdown: ScoreBreakdown::default(),
            disqualified: true,
            disqualification_reason: Some(reason.into()),
        }
    }
}

/// A surviving listing with its score and new/seen tag, as handed to the
/// report collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedListing {
    pub listing: JobListing,
    pub score: ScoreResult,
    pub tag: TrackTag,
}
