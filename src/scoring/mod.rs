//! Listing scoring against a candidate profile.
//!
//! A score is the weighted sum of six component scores (see
//! [`components`]), followed by the adjustments in [`adjustments`] and a
//! final clamp to `0.0..=5.0`. Scoring is pure: the same listing, profile,
//! weights and reference date always produce the same result.

pub mod adjustments;
pub mod components;
pub mod skills;

use chrono::{NaiveDate, Utc};

use crate::error::Result;
use crate::models::{
    Adjustments, CandidateProfile, ComponentScores, JobListing, MAX_SCORE, ScoreBreakdown,
    ScoreResult, ScoringConfig, ScoringWeights,
};
use crate::scoring::skills::{PreparedText, SkillMatcher};

pub use skills::compact;

/// Scores listings for one profile.
pub struct Scorer {
    profile: CandidateProfile,
    weights: ScoringWeights,
    matcher: SkillMatcher,
    staffing_adjust_pct: f64,
    low_confidence_penalty: f64,
    staffing_firms: Vec<String>,
    today: NaiveDate,
}

impl Scorer {
    /// Resolve the profile's weights over the configured base weights.
    pub fn new(profile: CandidateProfile, config: &ScoringConfig) -> Result<Self> {
        let weights = profile.resolve_weights(&config.weights, config.auto_normalize_weights)?;
        Self::with_weights(profile, weights, config)
    }

    /// Use `weights` as given; they must already sum to 1.0.
    pub fn with_weights(
        profile: CandidateProfile,
        weights: ScoringWeights,
        config: &ScoringConfig,
    ) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            matcher: SkillMatcher::new(&config.synonyms),
            profile,
            weights,
            staffing_adjust_pct: config.staffing_adjust_pct,
            low_confidence_penalty: config.low_confidence_penalty,
            staffing_firms: config.staffing_firms.clone(),
            today: Utc::now().date_naive(),
        })
    }

    /// Reference date for recency signals.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn profile(&self) -> &CandidateProfile {
        &self.profile
    }

    /// Component scores before weighting.
    pub fn components(&self, listing: &JobListing) -> ComponentScores {
        let text = PreparedText::new(&listing.searchable_text());
        let is_staffing = adjustments::is_staffing_firm(&listing.company, &self.staffing_firms);
        ComponentScores {
            skills: components::skills(&self.profile, &text, &self.matcher),
            title: components::title(&listing.title, &self.profile.target_titles),
            seniority: components::seniority(listing, &self.profile),
            location: components::location(listing, &self.profile.location),
            domain: components::domain(&self.profile, &text, &self.matcher),
            response: components::response(listing, is_staffing, self.today),
        }
    }

    /// Score one listing.
    pub fn score(&self, listing: &JobListing) -> ScoreResult {
        if let Some(keyword) = adjustments::find_dealbreaker(listing, &self.profile.dealbreakers) {
            return ScoreResult::disqualified(format!("dealbreaker: {keyword}"));
        }

        let components = self.components(listing);
        let w = &self.weights;
        let weighted = components.skills * w.skills
            + components.title * w.title
            + components.seniority * w.seniority
            + components.location * w.location
            + components.domain * w.domain
            + components.response * w.response;

        let is_staffing = adjustments::is_staffing_firm(&listing.company, &self.staffing_firms);
        let applied = Adjustments {
            staffing_multiplier: adjustments::staffing_multiplier(
                self.profile.staffing_preference,
                is_staffing,
                self.staffing_adjust_pct,
            ),
            comp_penalty: adjustments::comp_penalty(listing.salary.as_ref(), self.profile.comp_floor),
            confidence_penalty: adjustments::confidence_penalty(
                listing.confidence,
                self.low_confidence_penalty,
            ),
        };

        let score = (weighted * applied.staffing_multiplier
            - applied.comp_penalty
            - applied.confidence_penalty)
            .clamp(0.0, MAX_SCORE);

        ScoreResult {
            score,
            breakdown: ScoreBreakdown {
                components,
                weighted,
                adjustments: applied,
            },
            disqualified: false,
            disqualification_reason: None,
        }
    }

    /// Score every listing, drop the disqualified ones, and sort by score
    /// descending. Ties keep their input order.
    ///
    /// Returns the ranked pairs and the number of disqualified listings.
    pub fn rank(&self, listings: Vec<JobListing>) -> (Vec<(JobListing, ScoreResult)>, usize) {
        let total = listings.len();
        let mut ranked: Vec<(JobListing, ScoreResult)> = listings
            .into_iter()
            .filter_map(|listing| {
                let result = self.score(&listing);
                if result.disqualified {
                    log::debug!(
                        "Excluded '{}' at {}: {}",
                        listing.title,
                        listing.company,
                        result.disqualification_reason.as_deref().unwrap_or("disqualified")
                    );
                    None
                } else {
                    Some((listing, result))
                }
            })
            .collect();
        let disqualified = total - ranked.len();

        ranked.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));
        (ranked, disqualified)
    }
}
