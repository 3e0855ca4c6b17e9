// src/services/api.rs

//! Structured JSON API sources.
//!
//! Response items are mapped field by field; an item missing its title or
//! posting URL is dropped rather than guessed.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;

use crate::credentials::CredentialPair;
use crate::error::{AppError, Result};
use crate::models::{
    ApiConfig, ApiFlavor, EmploymentType, JobListing, PayPeriod, Salary, SearchQuery,
};
use crate::services::JobSource;
use crate::utils::http::{RetryPolicy, send_with_retry};
use crate::utils::{normalize_whitespace, parse_posted_date};

const ADZUNA_BASE: &str = "https://api.adzuna.com";
const USAJOBS_BASE: &str = "https://data.usajobs.gov";

/// A source answering structured queries with JSON.
pub struct ApiSource {
    id: String,
    name: String,
    flavor: ApiFlavor,
    country: String,
    endpoint: Option<String>,
    client: Client,
    policy: RetryPolicy,
}

impl ApiSource {
    pub fn new(id: &str, name: &str, config: &ApiConfig, client: Client, policy: RetryPolicy) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            flavor: config.flavor,
            country: config.country.clone().unwrap_or_else(|| "us".into()),
            endpoint: config.endpoint.clone(),
            client,
            policy,
        }
    }

    fn base(&self, default: &str) -> String {
        self.endpoint
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    async fn fetch_adzuna(&self, query: &SearchQuery, creds: &CredentialPair) -> Result<String> {
        let url = format!("{}/v1/api/jobs/{}/search/1", self.base(ADZUNA_BASE), self.country);
        let mut params: Vec<(&str, String)> = vec![
            ("app_id", creds.id.clone()),
            ("app_key", creds.key.clone()),
            ("what", query.literal()),
            ("results_per_page", query.page_size.to_string()),
            ("content-type", "application/json".into()),
        ];
        if let Some(location) = &query.location {
            params.push(("where", location.clone()));
        }
        if let Some(floor) = query.salary_min {
            params.push(("salary_min", floor.to_string()));
        }

        let request = self.client.get(&url).query(&params);
        Ok(send_with_retry(request, self.policy).await?.text().await?)
    }

    async fn fetch_usajobs(&self, query: &SearchQuery, creds: &CredentialPair) -> Result<String> {
        let url = format!("{}/api/search", self.base(USAJOBS_BASE));
        let mut params: Vec<(&str, String)> = vec![
            ("Keyword", query.keywords.clone()),
            ("ResultsPerPage", query.page_size.to_string()),
        ];
        if let Some(location) = &query.location {
            params.push(("LocationName", location.clone()));
        }
        if query.remote_only {
            params.push(("RemoteIndicator", "True".into()));
        }
        if let Some(floor) = query.salary_min {
            params.push(("RemunerationMinimumAmount", floor.to_string()));
        }

        let request = self
            .client
            .get(&url)
            .query(&params)
            .header(USER_AGENT, &creds.id)
            .header("Authorization-Key", &creds.key);
        Ok(send_with_retry(request, self.policy).await?.text().await?)
    }
}

#[async_trait]
impl JobSource for ApiSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn needs_credentials(&self) -> bool {
        true
    }

    async fn fetch(
        &self,
        query: &SearchQuery,
        credentials: Option<&CredentialPair>,
    ) -> Result<Vec<JobListing>> {
        let creds = credentials.ok_or_else(|| AppError::fetch(&self.id, "missing credentials"))?;
        let today = Utc::now().date_naive();

        let body = match self.flavor {
            ApiFlavor::Adzuna => self.fetch_adzuna(query, creds).await,
            ApiFlavor::UsaJobs => self.fetch_usajobs(query, creds).await,
        }
        .map_err(|e| AppError::fetch(&self.id, e))?;

        let listings = match self.flavor {
            ApiFlavor::Adzuna => parse_adzuna(&body, &self.id, today),
            ApiFlavor::UsaJobs => parse_usajobs(&body, &self.id, today),
        }
        .map_err(|e| AppError::fetch(&self.id, e))?;
        log::debug!("[{}] {} results for '{}'", self.id, listings.len(), query.keywords);
        Ok(listings)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| normalize_whitespace(&v))
        .filter(|v| !v.is_empty())
}

fn salary_from_range(min: Option<f64>, max: Option<f64>, period: PayPeriod) -> Option<Salary> {
    let factor = period.annual_factor();
    let (min, max) = (min.filter(|v| *v > 0.0), max.filter(|v| *v > 0.0));
    if min.is_none() && max.is_none() {
        return None;
    }
    let raw = match (min, max) {
        (Some(lo), Some(hi)) => format!("{lo:.0} - {hi:.0}"),
        (Some(v), None) | (None, Some(v)) => format!("{v:.0}"),
        (None, None) => String::new(),
    };
    Some(Salary {
        raw,
        min: min.map(|v| v * factor),
        max: max.map(|v| v * factor),
        period,
    })
}

// Adzuna

#[derive(Debug, Deserialize)]
struct AdzunaResponse {
    #[serde(default)]
    results: Vec<AdzunaJob>,
}

#[derive(Debug, Deserialize)]
struct AdzunaJob {
    title: Option<String>,
    company: Option<AdzunaName>,
    location: Option<AdzunaName>,
    description: Option<String>,
    redirect_url: Option<String>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    created: Option<String>,
    contract_time: Option<String>,
    contract_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdzunaName {
    display_name: Option<String>,
}

/// Map an Adzuna search response to listings.
pub fn parse_adzuna(body: &str, source_id: &str, today: NaiveDate) -> Result<Vec<JobListing>> {
    let response: AdzunaResponse = serde_json::from_str(body)?;
    let listings = response
        .results
        .into_iter()
        .filter_map(|job| {
            let title = non_empty(job.title)?;
            let url = non_empty(job.redirect_url)?;
            let company = non_empty(job.company.and_then(|c| c.display_name)).unwrap_or_default();

            let mut listing = JobListing::new(source_id, title, company, url);
            listing.location = non_empty(job.location.and_then(|l| l.display_name)).unwrap_or_default();
            listing.description = non_empty(job.description).unwrap_or_default();
            listing.salary = salary_from_range(job.salary_min, job.salary_max, PayPeriod::Year);
            listing.posted = job.created.and_then(|c| parse_posted_date(&c, today));
            listing.employment_type = EmploymentType::detect(&format!(
                "{} {}",
                job.contract_time.unwrap_or_default().replace('_', "-"),
                job.contract_type.unwrap_or_default()
            ));
            Some(listing)
        })
        .collect();
    Ok(listings)
}

// USAJOBS

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsaJobsResponse {
    search_result: UsaSearchResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsaSearchResult {
    #[serde(default)]
    search_result_items: Vec<UsaItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsaItem {
    matched_object_descriptor: UsaDescriptor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsaDescriptor {
    position_title: Option<String>,
    organization_name: Option<String>,
    position_location_display: Option<String>,
    #[serde(rename = "PositionURI")]
    position_uri: Option<String>,
    user_area: Option<UsaUserArea>,
    #[serde(default)]
    position_remuneration: Vec<UsaRemuneration>,
    publication_start_date: Option<String>,
    #[serde(default)]
    position_schedule: Vec<UsaSchedule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsaUserArea {
    details: Option<UsaDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsaDetails {
    job_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsaRemuneration {
    minimum_range: Option<String>,
    maximum_range: Option<String>,
    rate_interval_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UsaSchedule {
    name: Option<String>,
}

fn usa_period(code: Option<&str>) -> PayPeriod {
    match code.map(str::to_uppercase).as_deref() {
        Some("PH") => PayPeriod::Hour,
        Some("PM") => PayPeriod::Month,
        _ => PayPeriod::Year,
    }
}

/// Map a USAJOBS search response to listings.
pub fn parse_usajobs(body: &str, source_id: &str, today: NaiveDate) -> Result<Vec<JobListing>> {
    let response: UsaJobsResponse = serde_json::from_str(body)?;
    let listings = response
        .search_result
        .search_result_items
        .into_iter()
        .filter_map(|item| {
            let d = item.matched_object_descriptor;
            let title = non_empty(d.position_title)?;
            let url = non_empty(d.position_uri)?;
            let company = non_empty(d.organization_name).unwrap_or_default();

            let mut listing = JobListing::new(source_id, title, company, url);
            listing.location = non_empty(d.position_location_display).unwrap_or_default();
            listing.description = non_empty(
                d.user_area
                    .and_then(|u| u.details)
                    .and_then(|details| details.job_summary),
            )
            .unwrap_or_default();
            listing.salary = d.position_remuneration.first().and_then(|r| {
                let parse = |v: &Option<String>| v.as_deref().and_then(|s| s.trim().parse::<f64>().ok());
                salary_from_range(
                    parse(&r.minimum_range),
                    parse(&r.maximum_range),
                    usa_period(r.rate_interval_code.as_deref()),
                )
            });
            listing.posted = d
                .publication_start_date
                .and_then(|s| parse_posted_date(&s, today));
            listing.employment_type = d
                .position_schedule
                .first()
                .and_then(|s| s.name.as_deref())
                .map(EmploymentType::detect)
                .unwrap_or_default();
            Some(listing)
        })
        .collect();
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    #[test]
    fn test_parse_adzuna_maps_fields_and_drops_incomplete() {
        let body = r#"{
            "count": 3,
            "results": [
                {
                    "title": "Python Developer",
                    "company": {"display_name": "Initech"},
                    "location": {"display_name": "Austin, Texas"},
                    "description": "Python and Docker services",
                    "redirect_url": "https://www.adzuna.com/details/4242",
                    "salary_min": 120000,
                    "salary_max": 140000,
                    "created": "2026-02-27T10:00:00Z",
                    "contract_time": "full_time"
                },
                { "title": "No URL", "company": {"display_name": "Nobody"} },
                { "redirect_url": "https://www.adzuna.com/details/1" }
            ]
        }"#;
        let listings = parse_adzuna(body, "adzuna_us", today()).unwrap();

        assert_eq!(listings.len(), 1);
        let job = &listings[0];
        assert_eq!(job.title, "Python Developer");
        assert_eq!(job.company, "Initech");
        assert_eq!(job.location, "Austin, Texas");
        assert_eq!(job.salary.as_ref().and_then(|s| s.top()), Some(140_000.0));
        assert_eq!(job.posted, NaiveDate::from_ymd_opt(2026, 2, 27));
        assert_eq!(job.employment_type, EmploymentType::FullTime);
        assert_eq!(job.source_id, "adzuna_us");
    }

    #[test]
    fn test_parse_adzuna_rejects_malformed_body() {
        assert!(parse_adzuna("<html>rate limited</html>", "adzuna_us", today()).is_err());
    }

    #[test]
    fn test_parse_usajobs() {
        let body = r#"{
            "SearchResult": {
                "SearchResultCount": 1,
                "SearchResultItems": [
                    {
                        "MatchedObjectId": "1",
                        "MatchedObjectDescriptor": {
                            "PositionTitle": "IT Specialist (SYSADMIN)",
                            "OrganizationName": "Department of Examples",
                            "PositionLocationDisplay": "Washington, District of Columbia",
                            "PositionURI": "https://www.usajobs.gov/job/812345600",
                            "UserArea": {"Details": {"JobSummary": "Maintain Linux servers."}},
                            "PositionRemuneration": [
                                {"MinimumRange": "45.50", "MaximumRange": "60.00", "RateIntervalCode": "PH"}
                            ],
                            "PublicationStartDate": "2026-03-02T00:00:00.0000",
                            "PositionSchedule": [{"Name": "Full-time", "Code": "1"}]
                        }
                    },
                    {
                        "MatchedObjectDescriptor": {"PositionTitle": "Missing URI"}
                    }
                ]
            }
        }"#;
        let listings = parse_usajobs(body, "usajobs", today()).unwrap();

        assert_eq!(listings.len(), 1);
        let job = &listings[0];
        assert_eq!(job.company, "Department of Examples");
        assert_eq!(job.description, "Maintain Linux servers.");
        let salary = job.salary.as_ref().unwrap();
        assert_eq!(salary.period, PayPeriod::Hour);
        assert_eq!(salary.min, Some(45.5 * 2080.0));
        assert_eq!(job.posted, NaiveDate::from_ymd_opt(2026, 3, 2));
        assert_eq!(job.employment_type, EmploymentType::FullTime);
    }

    #[tokio::test]
    async fn test_fetch_without_credentials_fails() {
        let source = ApiSource::new(
            "adzuna_us",
            "Adzuna (US)",
            &ApiConfig {
                flavor: ApiFlavor::Adzuna,
                country: Some("us".into()),
                endpoint: None,
            },
            Client::new(),
            RetryPolicy::none(),
        );
        let query = SearchQuery {
            keywords: "rust".into(),
            rank: 0,
            location: None,
            remote_only: false,
            salary_min: None,
            page_size: 10,
        };
        let err = source.fetch(&query, None).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
    }
}
