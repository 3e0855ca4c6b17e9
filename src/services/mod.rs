//! Service layer: job sources.
//!
//! Every automatable source implements [`JobSource`]:
//! - HTML search pages (`ScrapeSource`)
//! - Structured JSON APIs (`ApiSource`)
//!
//! Sources that cannot be automated are kept apart as [`ManualSource`]s,
//! which only produce search URLs for the user to open by hand.

mod api;
mod manual;
mod scrape;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::credentials::CredentialPair;
use crate::error::Result;
use crate::models::{Config, JobListing, ManualSearchUrl, QueryPlan, SearchQuery, SourceKind};
use crate::utils::http::RetryPolicy;

pub use api::{ApiSource, parse_adzuna, parse_usajobs};
pub use manual::ManualSource;
pub use scrape::{ScrapeParser, ScrapeSource};

/// One automatable listing provider.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Unique source id (also the default rate-limit backend id).
    fn id(&self) -> &str;

    /// Display name for logs and progress.
    fn name(&self) -> &str;

    /// Whether `fetch` requires a credential pair.
    fn needs_credentials(&self) -> bool {
        false
    }

    /// Fetch listings for one query.
    async fn fetch(
        &self,
        query: &SearchQuery,
        credentials: Option<&CredentialPair>,
    ) -> Result<Vec<JobListing>>;
}

/// Enabled sources in configuration order, looked up by id.
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn JobSource>>,
    manual: Vec<ManualSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every enabled source of `config` over a shared HTTP client.
    pub fn from_config(config: &Config, client: Client) -> Result<Self> {
        let policy = RetryPolicy::from_config(&config.fetch);
        let mut registry = Self::new();

        for source in config.enabled_sources() {
            match &source.kind {
                SourceKind::Scrape(scrape) => {
                    let fetcher = ScrapeSource::new(
                        &source.id,
                        source.name(),
                        scrape,
                        client.clone(),
                        policy,
                    )?;
                    registry.register(Arc::new(fetcher));
                }
                SourceKind::Api(api) => {
                    let fetcher =
                        ApiSource::new(&source.id, source.name(), api, client.clone(), policy);
                    registry.register(Arc::new(fetcher));
                }
                SourceKind::Manual(manual) => {
                    registry.register_manual(ManualSource::new(
                        &source.id,
                        source.name(),
                        &manual.search_url,
                    ));
                }
            }
        }

        log::debug!(
            "Registered {} automatable and {} manual sources",
            registry.sources.len(),
            registry.manual.len()
        );
        Ok(registry)
    }

    /// Add a source, replacing any source with the same id.
    pub fn register(&mut self, source: Arc<dyn JobSource>) {
        match self.sources.iter().position(|s| s.id() == source.id()) {
            Some(idx) => self.sources[idx] = source,
            None => self.sources.push(source),
        }
    }

    pub fn register_manual(&mut self, source: ManualSource) {
        self.manual.retain(|m| m.id() != source.id());
        self.manual.push(source);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn JobSource>> {
        self.sources.iter().find(|s| s.id() == id)
    }

    pub fn sources(&self) -> &[Arc<dyn JobSource>] {
        &self.sources
    }

    pub fn manual_sources(&self) -> &[ManualSource] {
        &self.manual
    }

    /// Manual search URLs for every (manual source, query) pair.
    pub fn manual_urls(&self, plan: &QueryPlan) -> Vec<ManualSearchUrl> {
        self.manual
            .iter()
            .flat_map(|m| m.search_urls(plan))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchConfig;
    use crate::utils::http::create_async_client;

    #[test]
    fn test_registry_from_default_config() {
        let config = Config::default();
        let client = create_async_client(&FetchConfig::default()).unwrap();
        let registry = SourceRegistry::from_config(&config, client).unwrap();

        assert!(registry.get("adzuna_us").is_some());
        assert!(registry.get("adzuna_us").unwrap().needs_credentials());
        assert!(!registry.get("weworkremotely").unwrap().needs_credentials());
        assert!(registry.get("linkedin").is_none());
        assert!(registry.manual_sources().iter().any(|m| m.id() == "linkedin"));
    }

    #[test]
    fn test_disabled_sources_are_skipped() {
        let mut config = Config::default();
        for source in &mut config.sources {
            source.enabled = source.id == "usajobs";
        }
        let client = create_async_client(&FetchConfig::default()).unwrap();
        let registry = SourceRegistry::from_config(&config, client).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.manual_sources().is_empty());
    }
}
