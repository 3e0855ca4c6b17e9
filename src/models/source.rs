// src/models/source.rs

//! Source definitions as configured in `config.toml`.

use serde::{Deserialize, Serialize};

/// One external job-listing provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique source id, also the default rate-limit backend id
    pub id: String,

    /// Human-readable name used in logs and reports
    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default = "enabled_default")]
    pub enabled: bool,

    #[serde(flatten)]
    pub kind: SourceKind,
}

fn enabled_default() -> bool {
    true
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    pub fn is_manual(&self) -> bool {
        matches!(self.kind, SourceKind::Manual(_))
    }
}

/// How a source is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    /// HTML search page parsed with CSS selectors and heuristics
    Scrape(ScrapeConfig),
    /// Structured JSON API requiring a credential pair
    Api(ApiConfig),
    /// Cannot be automated; only a manual search URL is generated
    Manual(ManualConfig),
}

/// Scrape source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Search URL template with `{query}` and optional `{location}`
    pub search_url: String,

    pub selectors: ScrapeSelectors,
}

/// CSS selectors for the fields of one listing row.
///
/// Only `row` and `title` are required; missing field selectors fall back
/// to class-name heuristics at a lower parse confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSelectors {
    pub row: String,
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default = "link_attr_default")]
    pub link_attr: String,
}

fn link_attr_default() -> String {
    "href".into()
}

/// Supported API response schemas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiFlavor {
    /// Adzuna search API (`app_id` / `app_key`)
    Adzuna,
    /// USAJOBS search API (`User-Agent` email / `Authorization-Key`)
    UsaJobs,
}

/// API source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub flavor: ApiFlavor,

    /// Country segment for APIs partitioned by market
    #[serde(default)]
    pub country: Option<String>,

    /// Override of the flavor's default base URL
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Manual-only source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualConfig {
    /// Search URL template with `{query}` and optional `{location}`
    pub search_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        sources: Vec<SourceConfig>,
    }

    #[test]
    fn test_parse_tagged_sources() {
        let toml_src = r#"
            [[sources]]
            id = "adzuna_us"
            kind = "api"
            flavor = "adzuna"
            country = "us"

            [[sources]]
            id = "linkedin"
            kind = "manual"
            search_url = "https://www.linkedin.com/jobs/search/?keywords={query}"

            [[sources]]
            id = "board"
            kind = "scrape"
            search_url = "https://jobs.example.com/search?q={query}"
            enabled = false

            [sources.selectors]
            row = "li.job"
            title = "h2"
        "#;
        let parsed: Wrapper = toml::from_str(toml_src).unwrap();
        assert_eq!(parsed.sources.len(), 3);
        assert!(matches!(
            &parsed.sources[0].kind,
            SourceKind::Api(ApiConfig { flavor: ApiFlavor::Adzuna, .. })
        ));
        assert!(parsed.sources[1].is_manual());
        assert!(!parsed.sources[2].enabled);
        match &parsed.sources[2].kind {
            SourceKind::Scrape(cfg) => assert_eq!(cfg.selectors.link_attr, "href"),
            other => panic!("unexpected kind: {other:?}"),
        }
    }
}
