// src/utils/text.rs

//! Text cleaning helpers shared by fetchers, scoring and deduplication.

use chrono::{Duration, NaiveDate};
use unicode_segmentation::UnicodeSegmentation;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased words of `s`, split on Unicode word boundaries.
pub fn words(s: &str) -> Vec<String> {
    s.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Lowercase, strip punctuation, and collapse whitespace.
///
/// Used for title/company comparison keys.
pub fn normalize_phrase(s: &str) -> String {
    words(s).join(" ")
}

/// Company name without legal suffixes, for comparison only.
pub fn normalize_company(s: &str) -> String {
    const SUFFIXES: &[&str] = &[
        "inc", "llc", "ltd", "limited", "corp", "corporation", "co", "gmbh", "plc", "sa", "ag",
    ];
    let mut parts = words(s);
    while parts.len() > 1 && parts.last().is_some_and(|w| SUFFIXES.contains(&w.as_str())) {
        parts.pop();
    }
    parts.join(" ")
}

/// Parse a posting date given as ISO date/datetime or as relative text
/// ("today", "3 days ago", "2d", "1 week ago").
pub fn parse_posted_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }

    let lower = trimmed.to_lowercase();
    if lower.contains("today") || lower.contains("just") || lower.contains("hour") {
        return Some(today);
    }
    if lower.contains("yesterday") {
        return Some(today - Duration::days(1));
    }

    let digits: String = lower.chars().take_while(|c| c.is_ascii_digit()).collect();
    let amount: i64 = digits.parse().ok()?;
    let unit = lower[digits.len()..].trim_start();
    let days = if unit.starts_with('d') {
        amount
    } else if unit.starts_with('w') {
        amount * 7
    } else if unit.starts_with("mo") {
        amount * 30
    } else {
        return None;
    };
    Some(today - Duration::days(days))
}
