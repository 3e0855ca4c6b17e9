// src/models/profile.rs

//! Candidate profile and scoring weights.
//!
//! The profile is owned by the profile-management tooling; jobsweep only
//! reads it. An unreadable or invalid profile is the one fatal error of a
//! run, since no query plan can be built without it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Seniority ladder, ordered from least to most senior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Intern,
    Junior,
    #[default]
    Mid,
    Senior,
    Staff,
    Executive,
}

impl ExperienceLevel {
    pub fn rank(self) -> i32 {
        self as i32
    }
}

/// Preferred work arrangement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arrangement {
    Remote,
    Hybrid,
    Onsite,
    #[default]
    Any,
}

/// Where the candidate wants to work.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationPreference {
    #[serde(default)]
    pub arrangement: Arrangement,

    /// Acceptable cities/regions, matched case-insensitively
    #[serde(default)]
    pub locations: Vec<String>,
}

/// How postings from staffing agencies should be treated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StaffingPreference {
    Boost,
    #[default]
    Neutral,
    Penalize,
}

/// Relative weight of each scoring component.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    pub skills: f64,
    pub title: f64,
    pub seniority: f64,
    pub location: f64,
    pub domain: f64,
    pub response: f64,
}

const WEIGHT_TOLERANCE: f64 = 1e-6;

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            skills: 0.35,
            title: 0.25,
            seniority: 0.10,
            location: 0.10,
            domain: 0.10,
            response: 0.10,
        }
    }
}

impl ScoringWeights {
    fn as_array(&self) -> [f64; 6] {
        [
            self.skills,
            self.title,
            self.seniority,
            self.location,
            self.domain,
            self.response,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Check that weights are non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<()> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AppError::profile("scoring weights must be finite and >= 0"));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AppError::profile(format!(
                "scoring weights sum to {sum:.4}, expected 1.0"
            )));
        }
        Ok(())
    }

    /// Rescale all weights proportionally so they sum to 1.0.
    pub fn normalized(&self) -> Result<Self> {
        let sum = self.sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Err(AppError::profile("cannot normalize weights that sum to zero"));
        }
        Ok(Self {
            skills: self.skills / sum,
            title: self.title / sum,
            seniority: self.seniority / sum,
            location: self.location / sum,
            domain: self.domain / sum,
            response: self.response / sum,
        })
    }

    /// Apply partial overrides on top of these weights.
    pub fn with_overrides(&self, overrides: &WeightOverrides) -> Self {
        Self {
            skills: overrides.skills.unwrap_or(self.skills),
            title: overrides.title.unwrap_or(self.title),
            seniority: overrides.seniority.unwrap_or(self.seniority),
            location: overrides.location.unwrap_or(self.location),
            domain: overrides.domain.unwrap_or(self.domain),
            response: overrides.response.unwrap_or(self.response),
        }
    }
}

/// Per-profile weight overrides; unspecified components keep the default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct WeightOverrides {
    pub skills: Option<f64>,
    pub title: Option<f64>,
    pub seniority: Option<f64>,
    pub location: Option<f64>,
    pub domain: Option<f64>,
    pub response: Option<f64>,
}

/// The structured candidate profile jobs are scored against.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CandidateProfile {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Skills counted at full weight
    #[serde(default)]
    pub core_skills: Vec<String>,

    /// Skills counted at half weight
    #[serde(default)]
    pub secondary_skills: Vec<String>,

    /// Target titles, most wanted first
    #[serde(default)]
    pub target_titles: Vec<String>,

    #[serde(default)]
    pub level: ExperienceLevel,

    #[serde(default)]
    pub years_experience: Option<u32>,

    #[serde(default)]
    pub location: LocationPreference,

    /// Industries/domains the candidate has worked in
    #[serde(default)]
    pub domains: Vec<String>,

    /// Minimum acceptable annual compensation
    #[serde(default)]
    pub comp_floor: Option<u64>,

    /// Keywords that disqualify a listing outright
    #[serde(default)]
    pub dealbreakers: Vec<String>,

    #[serde(default)]
    pub weights: WeightOverrides,

    #[serde(default)]
    pub staffing_preference: StaffingPreference,
}

impl CandidateProfile {
    /// Load a profile from a TOML file. Any failure is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::profile(format!("cannot read {}: {e}", path.display())))?;
        let profile: Self = toml::from_str(&content)
            .map_err(|e| AppError::profile(format!("invalid profile {}: {e}", path.display())))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Validate the fields a query plan and scoring depend on.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::profile("name is empty"));
        }
        if self.target_titles.iter().all(|t| t.trim().is_empty()) {
            return Err(AppError::profile("at least one target title is required"));
        }
        if self.dealbreakers.iter().any(|d| d.trim().is_empty()) {
            return Err(AppError::profile("dealbreaker keywords must not be blank"));
        }
        Ok(())
    }

    /// Resolve the active weights: defaults, then profile overrides.
    ///
    /// When the merged set does not sum to 1.0 it is rescaled if
    /// `auto_normalize` is set and rejected otherwise.
    pub fn resolve_weights(&self, base: &ScoringWeights, auto_normalize: bool) -> Result<ScoringWeights> {
        let merged = base.with_overrides(&self.weights);
        match merged.validate() {
            Ok(()) => Ok(merged),
            Err(_) if auto_normalize => {
                let normalized = merged.normalized()?;
                log::warn!(
                    "Profile weights summed to {:.3}; rescaled proportionally to 1.0",
                    merged.sum()
                );
                normalized.validate()?;
                Ok(normalized)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> CandidateProfile {
        CandidateProfile {
            name: "Ada".into(),
            target_titles: vec!["Backend Engineer".into()],
            ..CandidateProfile::default()
        }
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!(ScoringWeights::default().validate().is_ok());
    }

    #[test]
    fn test_normalize_rescales_proportionally() {
        let weights = ScoringWeights {
            skills: 2.0,
            title: 2.0,
            seniority: 1.0,
            location: 1.0,
            domain: 2.0,
            response: 2.0,
        };
        let normalized = weights.normalized().unwrap();
        assert!((normalized.sum() - 1.0).abs() < 1e-9);
        assert!((normalized.skills - 0.2).abs() < 1e-9);
        assert!((normalized.seniority - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_rejects_all_zero() {
        let zero = ScoringWeights {
            skills: 0.0,
            title: 0.0,
            seniority: 0.0,
            location: 0.0,
            domain: 0.0,
            response: 0.0,
        };
        assert!(zero.normalized().is_err());
    }

    #[test]
    fn test_resolve_weights_normalizes_overrides() {
        let mut profile = sample_profile();
        profile.weights.skills = Some(0.85);
        let weights = profile
            .resolve_weights(&ScoringWeights::default(), true)
            .unwrap();
        assert!((weights.sum() - 1.0).abs() < 1e-9);

        assert!(profile.resolve_weights(&ScoringWeights::default(), false).is_err());
    }

    #[test]
    fn test_validate_requires_titles() {
        let mut profile = sample_profile();
        profile.target_titles.clear();
        assert!(matches!(profile.validate(), Err(AppError::Profile(_))));
    }

    #[test]
    fn test_parse_from_toml() {
        let toml_src = r#"
            name = "Ada"
            core_skills = ["Rust", "PostgreSQL"]
            secondary_skills = ["Docker"]
            target_titles = ["Backend Engineer", "Platform Engineer"]
            level = "senior"
            comp_floor = 150000
            dealbreakers = ["clearance required"]
            staffing_preference = "penalize"

            [location]
            arrangement = "remote"
            locations = ["Berlin"]

            [weights]
            skills = 0.4
            title = 0.2
        "#;
        let profile: CandidateProfile = toml::from_str(toml_src).unwrap();
        assert_eq!(profile.level, ExperienceLevel::Senior);
        assert_eq!(profile.location.arrangement, Arrangement::Remote);
        assert_eq!(profile.staffing_preference, StaffingPreference::Penalize);
        assert_eq!(profile.weights.skills, Some(0.4));
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_is_profile_error() {
        let err = CandidateProfile::load("/nonexistent/profile.toml").unwrap_err();
        assert!(err.is_fatal());
    }
}
