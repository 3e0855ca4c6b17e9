// src/models/query.rs

//! Query plan derived from the candidate profile.

use serde::{Deserialize, Serialize};

use crate::models::{Arrangement, CandidateProfile};

/// One search issued against a source.
///
/// Scrape sources only use `keywords` and `location` literally; API sources
/// receive the full structured parameter set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    /// Target title used as search keywords
    pub keywords: String,
    /// Rank of the target title this query came from (0 = top)
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub remote_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<u64>,
    pub page_size: usize,
}

impl SearchQuery {
    /// Literal keyword query for sources without structured parameters.
    pub fn literal(&self) -> String {
        if self.remote_only && !self.keywords.to_lowercase().contains("remote") {
            format!("{} remote", self.keywords)
        } else {
            self.keywords.clone()
        }
    }
}

/// Ordered queries to run against every automatable source.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct QueryPlan {
    pub queries: Vec<SearchQuery>,
}

impl QueryPlan {
    /// Build the plan from the profile's ranked target titles.
    pub fn from_profile(profile: &CandidateProfile, max_queries: usize, page_size: usize) -> Self {
        let location = profile
            .location
            .locations
            .first()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        let remote_only = profile.location.arrangement == Arrangement::Remote;

        let mut seen = Vec::<String>::new();
        let queries = profile
            .target_titles
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .filter(|t| {
                let key = t.to_lowercase();
                if seen.contains(&key) {
                    false
                } else {
                    seen.push(key);
                    true
                }
            })
            .take(max_queries.max(1))
            .enumerate()
            .map(|(rank, title)| SearchQuery {
                keywords: title.to_string(),
                rank,
                location: location.clone(),
                remote_only,
                salary_min: profile.comp_floor,
                page_size,
            })
            .collect();

        Self { queries }
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocationPreference;

    fn profile() -> CandidateProfile {
        CandidateProfile {
            name: "Ada".into(),
            target_titles: vec![
                "Backend Engineer".into(),
                "backend engineer".into(),
                "Platform Engineer".into(),
                "SRE".into(),
            ],
            location: LocationPreference {
                arrangement: Arrangement::Remote,
                locations: vec!["Berlin".into()],
            },
            comp_floor: Some(120_000),
            ..CandidateProfile::default()
        }
    }

    #[test]
    fn test_plan_dedups_titles_and_keeps_rank_order() {
        let plan = QueryPlan::from_profile(&profile(), 5, 20);
        let keywords: Vec<_> = plan.queries.iter().map(|q| q.keywords.as_str()).collect();
        assert_eq!(keywords, vec!["Backend Engineer", "Platform Engineer", "SRE"]);
        assert_eq!(plan.queries[1].rank, 1);
        assert_eq!(plan.queries[0].salary_min, Some(120_000));
        assert_eq!(plan.queries[0].location.as_deref(), Some("Berlin"));
    }

    #[test]
    fn test_plan_respects_max_queries() {
        let plan = QueryPlan::from_profile(&profile(), 1, 20);
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_literal_appends_remote() {
        let plan = QueryPlan::from_profile(&profile(), 1, 20);
        assert_eq!(plan.queries[0].literal(), "Backend Engineer remote");
    }
}
