// src/services/manual.rs

//! Sources that block automation. They are never fetched; the run output
//! lists a ready-made search URL per query instead.

use crate::models::{ManualSearchUrl, QueryPlan};
use crate::utils::url::build_search_url;

#[derive(Debug, Clone)]
pub struct ManualSource {
    id: String,
    name: String,
    search_url: String,
}

impl ManualSource {
    pub fn new(id: &str, name: &str, search_url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            search_url: search_url.to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// One search URL per planned query.
    pub fn search_urls(&self, plan: &QueryPlan) -> Vec<ManualSearchUrl> {
        plan.queries
            .iter()
            .map(|query| ManualSearchUrl {
                source_id: self.id.clone(),
                source_name: self.name.clone(),
                query: query.keywords.clone(),
                url: build_search_url(&self.search_url, &query.literal(), query.location.as_deref()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchQuery;

    #[test]
    fn test_search_urls_per_query() {
        let source = ManualSource::new(
            "indeed",
            "Indeed",
            "https://www.indeed.com/jobs?q={query}&l={location}",
        );
        let plan = QueryPlan {
            queries: vec![
                SearchQuery {
                    keywords: "Data Engineer".into(),
                    rank: 0,
                    location: Some("Austin, TX".into()),
                    remote_only: false,
                    salary_min: None,
                    page_size: 20,
                },
                SearchQuery {
                    keywords: "ML Engineer".into(),
                    rank: 1,
                    location: None,
                    remote_only: true,
                    salary_min: None,
                    page_size: 20,
                },
            ],
        };

        let urls = source.search_urls(&plan);
        assert_eq!(urls.len(), 2);
        assert_eq!(
            urls[0].url,
            "https://www.indeed.com/jobs?q=Data+Engineer&l=Austin%2C+TX"
        );
        assert_eq!(urls[1].url, "https://www.indeed.com/jobs?q=ML+Engineer+remote&l=");
        assert_eq!(urls[1].source_name, "Indeed");
    }
}
