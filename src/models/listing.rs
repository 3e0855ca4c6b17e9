// src/models/listing.rs

//! Job listing data structure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How reliably a scraped listing's fields were extracted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParseConfidence {
    Low,
    Medium,
    #[default]
    High,
}

/// Employment type as advertised by the source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
    Temporary,
    #[default]
    Unknown,
}

impl EmploymentType {
    /// Guess the employment type from free text.
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("intern") {
            Self::Internship
        } else if lower.contains("contract") || lower.contains("freelance") {
            Self::Contract
        } else if lower.contains("part-time") || lower.contains("part time") {
            Self::PartTime
        } else if lower.contains("temporary") || lower.contains("seasonal") {
            Self::Temporary
        } else if lower.contains("full-time") || lower.contains("full time") || lower.contains("permanent") {
            Self::FullTime
        } else {
            Self::Unknown
        }
    }
}

/// Pay period the raw salary text was quoted in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayPeriod {
    Hour,
    Month,
    #[default]
    Year,
}

impl PayPeriod {
    /// Multiplier that converts an amount in this period to a yearly amount.
    pub fn annual_factor(self) -> f64 {
        match self {
            PayPeriod::Hour => 2080.0,
            PayPeriod::Month => 12.0,
            PayPeriod::Year => 1.0,
        }
    }
}

/// Advertised compensation.
///
/// `min` and `max` are annualised; `raw` keeps the original text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Salary {
    pub raw: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub period: PayPeriod,
}

impl Salary {
    /// Highest advertised annual amount, falling back to the minimum.
    pub fn top(&self) -> Option<f64> {
        self.max.or(self.min)
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// A job posting fetched from a source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobListing {
    /// Job title
    pub title: String,

    /// Hiring company (may be a staffing agency)
    pub company: String,

    /// Free-form location text ("Remote", "Berlin, DE", ...)
    pub location: String,

    /// Description or summary text
    pub description: String,

    /// Full URL to the posting
    pub url: String,

    /// Advertised compensation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<Salary>,

    #[serde(default)]
    pub employment_type: EmploymentType,

    /// Date the posting went live, if the source exposes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted: Option<NaiveDate>,

    /// Source that produced this listing
    pub source_id: String,

    /// Every source that reported this posting (filled by deduplication)
    #[serde(default)]
    pub sources: Vec<String>,

    /// URLs of duplicates merged into this listing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_urls: Vec<String>,

    #[serde(default)]
    pub confidence: ParseConfidence,
}

impl JobListing {
    /// Create a listing with the identity fields set and everything else empty.
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        let source_id = source_id.into();
        Self {
            title: title.into(),
            company: company.into(),
            location: String::new(),
            description: String::new(),
            url: url.into(),
            salary: None,
            employment_type: EmploymentType::Unknown,
            posted: None,
            sources: vec![source_id.clone()],
            alternate_urls: Vec::new(),
            source_id,
            confidence: ParseConfidence::High,
        }
    }

    /// All free text of the listing joined for keyword searches.
    pub fn searchable_text(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.title, self.company, self.location, self.description
        )
    }

    /// Format listing for display using a template.
    ///
    /// Supported placeholders:
    /// - `{title}`, `{company}`, `{location}`, `{url}`, `{source}`
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{title}", &self.title)
            .replace("{company}", &self.company)
            .replace("{location}", &self.location)
            .replace("{url}", &self.url)
            .replace("{source}", &self.source_id)
    }
}
