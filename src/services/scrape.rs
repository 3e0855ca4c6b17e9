// src/services/scrape.rs

//! HTML search-page source.
//!
//! Rows are located with the configured `row` selector. Each field is read
//! with its configured selector first and with a class-name heuristic
//! second; the share of fields that needed a heuristic decides the
//! listing's parse confidence.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::credentials::CredentialPair;
use crate::error::{AppError, Result};
use crate::models::{
    EmploymentType, JobListing, ParseConfidence, ScrapeConfig, ScrapeSelectors, SearchQuery,
};
use crate::services::JobSource;
use crate::utils::http::{RetryPolicy, fetch_text};
use crate::utils::url::{build_search_url, resolve};
use crate::utils::{normalize_whitespace, parse_posted_date, parse_salary};

const COMPANY_FALLBACK: &str = "[class*='company'], [class*='employer'], [data-company]";
const LOCATION_FALLBACK: &str = "[class*='location'], [class*='region'], [class*='city']";
const SALARY_FALLBACK: &str = "[class*='salary'], [class*='pay'], [class*='compensation']";
const DATE_FALLBACK: &str = "time[datetime], [class*='date'], [class*='posted']";
const DESCRIPTION_FALLBACK: &str = "[class*='description'], [class*='summary'], [class*='snippet']";
const LINK_FALLBACK: &str = "a[href]";

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// A configured selector with its heuristic fallback.
struct Field {
    configured: Option<Selector>,
    fallback: Selector,
}

impl Field {
    fn new(configured: Option<&String>, fallback: &str) -> Result<Self> {
        Ok(Self {
            configured: configured.map(|s| parse_selector(s)).transpose()?,
            fallback: parse_selector(fallback)?,
        })
    }

    /// First matching element and whether the configured selector found it.
    fn find<'a>(&self, row: &ElementRef<'a>) -> Option<(ElementRef<'a>, bool)> {
        if let Some(sel) = &self.configured {
            if let Some(el) = row.select(sel).next() {
                return Some((el, true));
            }
        }
        row.select(&self.fallback).next().map(|el| (el, false))
    }

    fn text(&self, row: &ElementRef<'_>) -> Option<(String, bool)> {
        self.find(row)
            .map(|(el, configured)| (element_text(&el), configured))
            .filter(|(text, _)| !text.is_empty())
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

/// Pre-compiled selectors of one scrape source.
pub struct ScrapeParser {
    row: Selector,
    title: Selector,
    company: Field,
    location: Field,
    salary: Field,
    date: Field,
    description: Field,
    link: Field,
    link_attr: String,
}

impl ScrapeParser {
    /// Compile every configured and fallback selector.
    pub fn new(selectors: &ScrapeSelectors) -> Result<Self> {
        Ok(Self {
            row: parse_selector(&selectors.row)?,
            title: parse_selector(&selectors.title)?,
            company: Field::new(selectors.company.as_ref(), COMPANY_FALLBACK)?,
            location: Field::new(selectors.location.as_ref(), LOCATION_FALLBACK)?,
            salary: Field::new(selectors.salary.as_ref(), SALARY_FALLBACK)?,
            date: Field::new(selectors.date.as_ref(), DATE_FALLBACK)?,
            description: Field::new(selectors.description.as_ref(), DESCRIPTION_FALLBACK)?,
            link: Field::new(selectors.link.as_ref(), LINK_FALLBACK)?,
            link_attr: selectors.link_attr.clone(),
        })
    }

    /// Extract listings from a search page.
    pub fn parse(&self, html: &str, base_url: &Url, source_id: &str, today: NaiveDate) -> Vec<JobListing> {
        let document = Html::parse_document(html);
        document
            .select(&self.row)
            .filter_map(|row| self.parse_row(&row, base_url, source_id, today))
            .collect()
    }

    fn parse_row(
        &self,
        row: &ElementRef<'_>,
        base_url: &Url,
        source_id: &str,
        today: NaiveDate,
    ) -> Option<JobListing> {
        let title_el = row.select(&self.title).next()?;
        let title = element_text(&title_el);
        if title.is_empty() {
            return None;
        }

        // Title anchors double as links when no link selector matched.
        let (href, link_configured) = match self.link.configured.as_ref() {
            Some(sel) => match row.select(sel).next().and_then(|el| el.value().attr(&self.link_attr)) {
                Some(href) => (Some(href), true),
                None => (self.fallback_href(row, &title_el), false),
            },
            None => (self.fallback_href(row, &title_el), false),
        };
        let url = resolve(base_url, href?.trim());

        let (company, company_configured) = self.company.text(row).unwrap_or_default();
        let (location, location_configured) = self.location.text(row).unwrap_or_default();

        let configured_hits = 1 + [company_configured, location_configured, link_configured]
            .iter()
            .filter(|hit| **hit)
            .count();
        let confidence = match configured_hits {
            4 => ParseConfidence::High,
            2 | 3 => ParseConfidence::Medium,
            _ => ParseConfidence::Low,
        };

        let mut listing = JobListing::new(source_id, title, company, url);
        listing.location = location;
        listing.confidence = confidence;
        listing.description = self
            .description
            .text(row)
            .map(|(text, _)| text)
            .unwrap_or_default();
        listing.salary = self
            .salary
            .text(row)
            .and_then(|(text, _)| parse_salary(&text));
        listing.posted = self.date.find(row).and_then(|(el, _)| {
            el.value()
                .attr("datetime")
                .and_then(|dt| parse_posted_date(dt, today))
                .or_else(|| parse_posted_date(&element_text(&el), today))
        });
        listing.employment_type = EmploymentType::detect(&element_text(row));
        Some(listing)
    }

    fn fallback_href<'a>(&self, row: &ElementRef<'a>, title_el: &ElementRef<'a>) -> Option<&'a str> {
        title_el
            .value()
            .attr(&self.link_attr)
            .or_else(|| {
                title_el
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .take_while(|el| el.id() != row.id())
                    .find_map(|el| el.value().attr(&self.link_attr))
            })
            .or_else(|| {
                row.select(&self.link.fallback)
                    .next()
                    .and_then(|el| el.value().attr("href"))
            })
    }
}

/// A source backed by an HTML search page.
pub struct ScrapeSource {
    id: String,
    name: String,
    search_url: String,
    parser: ScrapeParser,
    client: Client,
    policy: RetryPolicy,
}

impl ScrapeSource {
    pub fn new(
        id: &str,
        name: &str,
        config: &ScrapeConfig,
        client: Client,
        policy: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            search_url: config.search_url.clone(),
            parser: ScrapeParser::new(&config.selectors)?,
            client,
            policy,
        })
    }
}

#[async_trait]
impl JobSource for ScrapeSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        query: &SearchQuery,
        _credentials: Option<&CredentialPair>,
    ) -> Result<Vec<JobListing>> {
        let url = build_search_url(&self.search_url, &query.literal(), query.location.as_deref());
        let base_url = Url::parse(&url)?;
        log::debug!("[{}] GET {}", self.id, url);

        let html = fetch_text(&self.client, &url, self.policy)
            .await
            .map_err(|e| AppError::fetch(&self.id, e))?;
        let listings = self
            .parser
            .parse(&html, &base_url, &self.id, Utc::now().date_naive());
        log::debug!("[{}] {} rows parsed for '{}'", self.id, listings.len(), query.keywords);
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <ul class="results">
          <li class="job">
            <a class="job-link" href="/jobs/1001"><h2>Senior Rust Engineer</h2></a>
            <span class="co">Acme Corp</span>
            <span class="where">Remote</span>
            <span class="salary">$150k - $180k</span>
            <time datetime="2026-03-01">2 days ago</time>
            <p class="summary">Full-time role building services</p>
          </li>
          <li class="job">
            <h2><a href="https://other.example/jobs/2002">Platform Engineer</a></h2>
            <div class="employer-name">Globex</div>
          </li>
          <li class="job">
            <h2>   </h2>
          </li>
          <li class="job">
            <h2>No Link Anywhere</h2>
          </li>
        </ul>
        </body></html>
    "#;

    fn selectors() -> ScrapeSelectors {
        ScrapeSelectors {
            row: "li.job".into(),
            title: "h2".into(),
            company: Some("span.co".into()),
            location: Some("span.where".into()),
            link: Some("a.job-link".into()),
            salary: None,
            description: None,
            date: None,
            link_attr: "href".into(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    #[test]
    fn test_parse_selector_invalid() {
        let mut bad = selectors();
        bad.company = Some("[[invalid".into());
        assert!(matches!(ScrapeParser::new(&bad), Err(AppError::Selector { .. })));
    }

    #[test]
    fn test_parse_configured_row_is_high_confidence() {
        let parser = ScrapeParser::new(&selectors()).unwrap();
        let base = Url::parse("https://board.example/search?q=rust").unwrap();
        let listings = parser.parse(PAGE, &base, "board", today());

        assert_eq!(listings.len(), 2);
        let first = &listings[0];
        assert_eq!(first.title, "Senior Rust Engineer");
        assert_eq!(first.company, "Acme Corp");
        assert_eq!(first.location, "Remote");
        assert_eq!(first.url, "https://board.example/jobs/1001");
        assert_eq!(first.confidence, ParseConfidence::High);
        assert_eq!(first.salary.as_ref().and_then(|s| s.min), Some(150_000.0));
        assert_eq!(first.posted, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(first.description, "Full-time role building services");
        assert_eq!(first.employment_type, EmploymentType::FullTime);
        assert_eq!(first.sources, vec!["board".to_string()]);
    }

    #[test]
    fn test_parse_heuristic_row_is_low_confidence() {
        let parser = ScrapeParser::new(&selectors()).unwrap();
        let base = Url::parse("https://board.example/search").unwrap();
        let listings = parser.parse(PAGE, &base, "board", today());

        let second = &listings[1];
        assert_eq!(second.title, "Platform Engineer");
        assert_eq!(second.company, "Globex");
        assert_eq!(second.url, "https://other.example/jobs/2002");
        assert!(second.location.is_empty());
        assert_eq!(second.confidence, ParseConfidence::Low);
    }

    #[test]
    fn test_parse_row_with_multibyte_date() {
        let mut config = selectors();
        config.date = Some("span.d".into());
        let parser = ScrapeParser::new(&config).unwrap();
        let base = Url::parse("https://board.example/").unwrap();
        let html = r#"
            <ul><li class="job">
              <h2><a class="job-link" href="/jobs/3003">Data Engineer</a></h2>
              <span class="co">Initech</span>
              <span class="d">Reposted ⚡ today</span>
            </li></ul>
        "#;

        let listings = parser.parse(html, &base, "board", today());
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].posted, Some(today()));
    }

    #[test]
    fn test_parse_empty_page() {
        let parser = ScrapeParser::new(&selectors()).unwrap();
        let base = Url::parse("https://board.example/").unwrap();
        assert!(parser.parse("<html></html>", &base, "board", today()).is_empty());
    }
}
