// src/utils/salary.rs

//! Salary text parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{PayPeriod, Salary};

static AMOUNT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)[$£€]\s?(\d[\d,]*(?:\.\d+)?)\s*(k)?(?:\s*(?:-|–|—|to)\s*[$£€]?\s?(\d[\d,]*(?:\.\d+)?)\s*(k)?)?",
    )
    .expect("salary regex is valid")
});

static HOURLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(/\s*h(ou)?r\b|per\s+hour|hourly|an\s+hour)").expect("hourly regex is valid")
});

static MONTHLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(/\s*mo(nth)?\b|per\s+month|monthly|a\s+month)")
        .expect("monthly regex is valid")
});

fn parse_amount(digits: &str, thousands: bool) -> Option<f64> {
    let value: f64 = digits.replace(',', "").parse().ok()?;
    Some(if thousands { value * 1000.0 } else { value })
}

/// Detect the pay period a salary text is quoted in.
pub fn detect_period(text: &str) -> PayPeriod {
    if HOURLY.is_match(text) {
        PayPeriod::Hour
    } else if MONTHLY.is_match(text) {
        PayPeriod::Month
    } else {
        PayPeriod::Year
    }
}

/// Parse free-form salary text such as `"$120k - $150k"` or
/// `"$45 - $60 per hour"` into an annualised range.
pub fn parse_salary(text: &str) -> Option<Salary> {
    let caps = AMOUNT_RANGE.captures(text)?;
    let first_k = caps.get(2).is_some();
    let second_k = caps.get(4).is_some();

    // "$120 - 150k" quotes both ends in thousands.
    let mut low = parse_amount(caps.get(1)?.as_str(), first_k || second_k)?;
    let mut high = match caps.get(3) {
        Some(m) => Some(parse_amount(m.as_str(), second_k || first_k)?),
        None => None,
    };

    let period = detect_period(text);
    if period == PayPeriod::Year && low < 1000.0 && high.is_none_or(|h| h < 1000.0) {
        // Yearly amounts this small are shorthand for thousands.
        low *= 1000.0;
        high = high.map(|h| h * 1000.0);
    }

    let factor = period.annual_factor();
    let (mut min, mut max) = (low * factor, high.map(|h| h * factor));
    if let Some(hi) = max {
        if hi < min {
            max = Some(min);
            min = hi;
        }
    }

    Some(Salary {
        raw: text.trim().to_string(),
        min: Some(min),
        max,
        period,
    })
}
