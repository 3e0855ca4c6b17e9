//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ScoringWeights, SourceConfig};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and worker-pool settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Configured job sources
    #[serde(default = "defaults::sources")]
    pub sources: Vec<SourceConfig>,

    /// Source id to rate-limit backend id
    #[serde(default = "defaults::backends")]
    pub backends: BTreeMap<String, String>,

    /// Rate windows per backend id
    #[serde(default = "defaults::rate_limits")]
    pub rate_limits: BTreeMap<String, Vec<RateWindow>>,

    #[serde(default)]
    pub dedup: DedupConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_workers == 0 {
            return Err(AppError::validation("fetch.max_workers must be > 0"));
        }
        if !(self.dedup.fuzzy_threshold > 0.0 && self.dedup.fuzzy_threshold <= 1.0) {
            return Err(AppError::validation("dedup.fuzzy_threshold must be in (0, 1]"));
        }
        if self.tracker.retention_days == 0 {
            return Err(AppError::validation("tracker.retention_days must be > 0"));
        }
        if !(0.0..100.0).contains(&self.scoring.staffing_adjust_pct) {
            return Err(AppError::validation(
                "scoring.staffing_adjust_pct must be in [0, 100)",
            ));
        }
        self.scoring.weights.validate().map_err(|e| {
            AppError::validation(format!("scoring.weights: {e}"))
        })?;

        let mut ids = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(AppError::validation("source with empty id"));
            }
            if !ids.insert(source.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
        }
        for (source, backend) in &self.backends {
            if backend.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "backend id for source '{source}' is empty"
                )));
            }
        }
        for (backend, windows) in &self.rate_limits {
            if windows.iter().any(|w| w.limit == 0) {
                return Err(AppError::validation(format!(
                    "rate_limits.{backend}: limit must be > 0"
                )));
            }
        }
        Ok(())
    }

    /// Enabled sources in configuration order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            sources: defaults::sources(),
            backends: defaults::backends(),
            rate_limits: defaults::rate_limits(),
            dedup: DedupConfig::default(),
            tracker: TrackerConfig::default(),
            scoring: ScoringConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP client and worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Size of the fetch worker pool
    #[serde(default = "defaults::max_workers")]
    pub max_workers: usize,

    /// Delay before each fetch within a worker, in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Retries for transient HTTP failures within one fetch
    #[serde(default = "defaults::http_retries")]
    pub http_retries: u32,

    /// Base backoff between HTTP retries in milliseconds
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// How many target titles become queries per source
    #[serde(default = "defaults::max_queries_per_source")]
    pub max_queries_per_source: usize,

    /// Page size requested from API sources
    #[serde(default = "defaults::results_per_query")]
    pub results_per_query: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_workers: defaults::max_workers(),
            request_delay_ms: 0,
            http_retries: defaults::http_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
            max_queries_per_source: defaults::max_queries_per_source(),
            results_per_query: defaults::results_per_query(),
        }
    }
}

/// Length of a rate window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Second,
    Minute,
    Hour,
    Day,
}

impl Period {
    pub fn as_secs(self) -> i64 {
        match self {
            Period::Second => 1,
            Period::Minute => 60,
            Period::Hour => 3_600,
            Period::Day => 86_400,
        }
    }
}

/// At most `limit` events per `per`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateWindow {
    pub limit: u32,
    pub per: Period,
}

impl RateWindow {
    pub fn new(limit: u32, per: Period) -> Self {
        Self { limit, per }
    }
}

/// Deduplication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Run the fuzzy-similarity pass after exact matching
    #[serde(default = "defaults::yes")]
    pub fuzzy_enabled: bool,

    /// Minimum normalized similarity (0-1) for a fuzzy merge
    #[serde(default = "defaults::fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            fuzzy_enabled: true,
            fuzzy_threshold: defaults::fuzzy_threshold(),
        }
    }
}

/// Cross-run tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// History entries older than this are left out of statistics
    #[serde(default = "defaults::retention_days")]
    pub retention_days: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            retention_days: defaults::retention_days(),
        }
    }
}

/// Scoring settings shared by all profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Base weights before profile overrides
    #[serde(default)]
    pub weights: ScoringWeights,

    /// Rescale profile weights that do not sum to 1.0 instead of failing
    #[serde(default = "defaults::yes")]
    pub auto_normalize_weights: bool,

    /// Percentage boost/penalty for staffing-firm postings
    #[serde(default = "defaults::staffing_adjust_pct")]
    pub staffing_adjust_pct: f64,

    /// Points subtracted from low-confidence scrapes
    #[serde(default = "defaults::low_confidence_penalty")]
    pub low_confidence_penalty: f64,

    /// Extra synonym groups, e.g. `[["postgresql", "postgres", "psql"]]`
    #[serde(default)]
    pub synonyms: Vec<Vec<String>>,

    /// Extra staffing-firm names
    #[serde(default)]
    pub staffing_firms: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            auto_normalize_weights: true,
            staffing_adjust_pct: defaults::staffing_adjust_pct(),
            low_confidence_penalty: defaults::low_confidence_penalty(),
            synonyms: Vec::new(),
            staffing_firms: Vec::new(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Emit a line per completed fetch unit
    #[serde(default = "defaults::yes")]
    pub show_progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_progress: true,
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    use super::{Period, RateWindow};
    use crate::models::{
        ApiConfig, ApiFlavor, ManualConfig, ScrapeConfig, ScrapeSelectors, SourceConfig,
        SourceKind,
    };

    pub fn yes() -> bool {
        true
    }

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; jobsweep/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_workers() -> usize {
        6
    }
    pub fn http_retries() -> u32 {
        2
    }
    pub fn retry_backoff() -> u64 {
        500
    }
    pub fn max_queries_per_source() -> usize {
        3
    }
    pub fn results_per_query() -> usize {
        50
    }

    // Dedup / tracker / scoring defaults
    pub fn fuzzy_threshold() -> f64 {
        0.85
    }
    pub fn retention_days() -> i64 {
        90
    }
    pub fn staffing_adjust_pct() -> f64 {
        10.0
    }
    pub fn low_confidence_penalty() -> f64 {
        0.3
    }
    pub fn log_level() -> String {
        "info".into()
    }

    fn api(id: &str, name: &str, flavor: ApiFlavor, country: Option<&str>) -> SourceConfig {
        SourceConfig {
            id: id.into(),
            display_name: Some(name.into()),
            enabled: true,
            kind: SourceKind::Api(ApiConfig {
                flavor,
                country: country.map(str::to_string),
                endpoint: None,
            }),
        }
    }

    fn manual(id: &str, name: &str, url: &str) -> SourceConfig {
        SourceConfig {
            id: id.into(),
            display_name: Some(name.into()),
            enabled: true,
            kind: SourceKind::Manual(ManualConfig {
                search_url: url.into(),
            }),
        }
    }

    pub fn sources() -> Vec<SourceConfig> {
        vec![
            api("adzuna_us", "Adzuna (US)", ApiFlavor::Adzuna, Some("us")),
            api("adzuna_gb", "Adzuna (UK)", ApiFlavor::Adzuna, Some("gb")),
            api("usajobs", "USAJOBS", ApiFlavor::UsaJobs, None),
            SourceConfig {
                id: "weworkremotely".into(),
                display_name: Some("We Work Remotely".into()),
                enabled: true,
                kind: SourceKind::Scrape(ScrapeConfig {
                    search_url: "https://weworkremotely.com/remote-jobs/search?term={query}"
                        .into(),
                    selectors: ScrapeSelectors {
                        row: "section.jobs li:has(a[href*='/remote-jobs/'])".into(),
                        title: "span.title".into(),
                        company: Some("span.company".into()),
                        location: Some("span.region".into()),
                        link: Some("a[href*='/remote-jobs/']".into()),
                        salary: None,
                        description: None,
                        date: Some("time".into()),
                        link_attr: "href".into(),
                    },
                }),
            },
            manual(
                "linkedin",
                "LinkedIn",
                "https://www.linkedin.com/jobs/search/?keywords={query}&location={location}",
            ),
            manual(
                "indeed",
                "Indeed",
                "https://www.indeed.com/jobs?q={query}&l={location}",
            ),
        ]
    }

    pub fn backends() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("adzuna_us".to_string(), "adzuna".to_string()),
            ("adzuna_gb".to_string(), "adzuna".to_string()),
        ])
    }

    pub fn rate_limits() -> BTreeMap<String, Vec<RateWindow>> {
        BTreeMap::from([
            (
                "adzuna".to_string(),
                vec![
                    RateWindow::new(25, Period::Minute),
                    RateWindow::new(250, Period::Day),
                ],
            ),
            (
                "usajobs".to_string(),
                vec![RateWindow::new(60, Period::Minute)],
            ),
            (
                "weworkremotely".to_string(),
                vec![RateWindow::new(30, Period::Minute)],
            ),
        ])
    }
}
