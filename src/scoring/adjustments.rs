// src/scoring/adjustments.rs

//! Post-scoring adjustments, applied in order: dealbreaker, staffing
//! multiplier, compensation floor penalty, low-confidence penalty.

use crate::models::{JobListing, ParseConfidence, Salary, StaffingPreference};
use crate::utils::text::words;

const STAFFING_FIRMS: &[&str] = &[
    "robert half",
    "teksystems",
    "randstad",
    "adecco",
    "kforce",
    "insight global",
    "manpower",
    "kelly services",
    "hays",
    "aerotek",
    "apex systems",
    "cybercoders",
    "experis",
    "allegis",
    "modis",
    "jobot",
];

const STAFFING_KEYWORDS: &[&str] = &["staffing", "recruiting", "recruitment", "talent solutions"];

/// First dealbreaker found in the listing's title, company, location or
/// description, compared case-insensitively.
pub fn find_dealbreaker<'a>(listing: &JobListing, dealbreakers: &'a [String]) -> Option<&'a str> {
    let haystack = listing.searchable_text().to_lowercase();
    dealbreakers
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .find(|d| haystack.contains(&d.to_lowercase()))
}

/// Whether `phrase` occurs in `company` as whole consecutive words.
fn has_phrase(company: &[String], phrase: &str) -> bool {
    let phrase = words(phrase);
    !phrase.is_empty() && company.windows(phrase.len()).any(|w| w == phrase.as_slice())
}

/// Whether a company name belongs to a staffing or recruiting agency.
pub fn is_staffing_firm(company: &str, extra: &[String]) -> bool {
    let company = words(company);
    if company.is_empty() {
        return false;
    }
    STAFFING_FIRMS
        .iter()
        .chain(STAFFING_KEYWORDS)
        .any(|f| has_phrase(&company, f))
        || extra.iter().any(|f| has_phrase(&company, f))
}

/// Multiplier for staffing-firm postings under the candidate's preference.
pub fn staffing_multiplier(preference: StaffingPreference, is_staffing: bool, pct: f64) -> f64 {
    if !is_staffing {
        return 1.0;
    }
    match preference {
        StaffingPreference::Boost => 1.0 + pct / 100.0,
        StaffingPreference::Neutral => 1.0,
        StaffingPreference::Penalize => 1.0 - pct / 100.0,
    }
}

/// Points subtracted when advertised pay tops out below the floor.
///
/// Listings without a salary, or profiles without a floor, are untouched.
pub fn comp_penalty(salary: Option<&Salary>, floor: Option<u64>) -> f64 {
    let (Some(top), Some(floor)) = (salary.and_then(Salary::top), floor) else {
        return 0.0;
    };
    let floor = floor as f64;
    if floor <= 0.0 || top >= floor {
        return 0.0;
    }
    let gap = (floor - top) / floor;
    (0.5 + gap).clamp(0.5, 1.5)
}

pub fn confidence_penalty(confidence: ParseConfidence, penalty: f64) -> f64 {
    if confidence == ParseConfidence::Low {
        penalty
    } else {
        0.0
    }
}
