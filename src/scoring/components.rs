// src/scoring/components.rs

//! The six independent scoring components. Each returns 0.0..=5.0.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{
    Arrangement, CandidateProfile, ExperienceLevel, JobListing, LocationPreference, MAX_SCORE,
};
use crate::scoring::skills::{PreparedText, SkillMatcher};
use crate::utils::text::{normalize_phrase, words};

const NEUTRAL: f64 = 2.5;

static YEARS_REQUIRED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})\s*\+?\s*(?:-\s*\d{1,2}\s*)?(?:years?|yrs?)")
        .expect("years regex is valid")
});

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, MAX_SCORE)
}

/// Share of profile skills present in the listing, secondary skills at
/// half weight.
pub fn skills(profile: &CandidateProfile, text: &PreparedText, matcher: &SkillMatcher) -> f64 {
    let core_total = profile.core_skills.len() as f64;
    let secondary_total = profile.secondary_skills.len() as f64;
    let possible = core_total + 0.5 * secondary_total;
    if possible == 0.0 {
        return NEUTRAL;
    }

    let count = |skills: &[String]| skills.iter().filter(|s| matcher.matches(s, text)).count() as f64;
    let matched = count(&profile.core_skills) + 0.5 * count(&profile.secondary_skills);
    clamp(MAX_SCORE * matched / possible)
}

/// Best match of the listing title against the ranked target titles.
pub fn title(listing_title: &str, targets: &[String]) -> f64 {
    let title = normalize_phrase(listing_title);
    let title_words = words(&title);

    targets
        .iter()
        .map(|t| normalize_phrase(t))
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(rank, target)| {
            let raw = if target == title {
                5.0
            } else if title.contains(&target) {
                4.0
            } else {
                let target_words = words(&target);
                let shared = target_words.iter().filter(|w| title_words.contains(w)).count();
                1.0 + 3.0 * shared as f64 / target_words.len() as f64
            };
            let decay = (0.1 * rank as f64).min(0.3);
            (raw - decay).max(1.0)
        })
        .fold(None, |best: Option<f64>, s| Some(best.map_or(s, |b| b.max(s))))
        .unwrap_or(NEUTRAL)
}

/// Seniority signalled by title keywords.
pub fn detect_level(title: &str) -> Option<ExperienceLevel> {
    let phrase = normalize_phrase(title);
    let tokens = words(&phrase);
    let has = |w: &str| tokens.iter().any(|t| t == w);

    if phrase.contains("head of")
        || ["director", "vp", "chief", "cto", "cio", "president"].iter().any(|w| has(w))
    {
        Some(ExperienceLevel::Executive)
    } else if ["staff", "principal", "architect", "distinguished"].iter().any(|w| has(w)) {
        Some(ExperienceLevel::Staff)
    } else if ["senior", "sr", "lead", "iii"].iter().any(|w| has(w)) {
        Some(ExperienceLevel::Senior)
    } else if ["intern", "internship", "trainee"].iter().any(|w| has(w)) {
        Some(ExperienceLevel::Intern)
    } else if phrase.contains("entry level")
        || ["junior", "jr", "graduate", "associate", "i"].iter().any(|w| has(w))
    {
        Some(ExperienceLevel::Junior)
    } else if ["mid", "intermediate", "ii"].iter().any(|w| has(w)) {
        Some(ExperienceLevel::Mid)
    } else {
        None
    }
}

/// Smallest "N years" figure mentioned in `text`.
pub fn required_years(text: &str) -> Option<u32> {
    YEARS_REQUIRED
        .captures_iter(text)
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .filter(|years| *years <= 30)
        .min()
}

fn level_for_years(years: u32) -> ExperienceLevel {
    match years {
        0..=1 => ExperienceLevel::Junior,
        2..=4 => ExperienceLevel::Mid,
        5..=7 => ExperienceLevel::Senior,
        _ => ExperienceLevel::Staff,
    }
}

/// Distance between the listing's level and the candidate's.
pub fn seniority(listing: &JobListing, profile: &CandidateProfile) -> f64 {
    let years = required_years(&listing.description);
    let detected = detect_level(&listing.title).or_else(|| years.map(level_for_years));

    let mut score: f64 = match detected {
        None => 4.0,
        Some(level) => match (level.rank() - profile.level.rank()).abs() {
            0 => 5.0,
            1 => 3.5,
            2 => 2.0,
            _ => 1.0,
        },
    };
    if let (Some(required), Some(have)) = (years, profile.years_experience) {
        if required > have + 1 {
            score = score.min(2.0);
        }
    }
    score
}

/// Work arrangement advertised by a listing, if any.
pub fn detect_arrangement(listing: &JobListing) -> Option<Arrangement> {
    let text = format!("{} {} {}", listing.location, listing.title, listing.description).to_lowercase();
    if text.contains("hybrid") {
        Some(Arrangement::Hybrid)
    } else if text.contains("remote") || text.contains("work from home") || text.contains("anywhere") {
        Some(Arrangement::Remote)
    } else if !listing.location.trim().is_empty() {
        Some(Arrangement::Onsite)
    } else {
        None
    }
}

/// Fit between the listing's arrangement/location and the preference.
pub fn location(listing: &JobListing, pref: &LocationPreference) -> f64 {
    let Some(arrangement) = detect_arrangement(listing) else {
        return 3.0;
    };
    let listing_location = listing.location.to_lowercase();
    let place_matches = pref.locations.is_empty()
        || pref
            .locations
            .iter()
            .map(|l| l.trim().to_lowercase())
            .any(|l| !l.is_empty() && listing_location.contains(&l));

    match pref.arrangement {
        Arrangement::Remote => match arrangement {
            Arrangement::Remote => 5.0,
            Arrangement::Hybrid => 2.5,
            _ if place_matches && !pref.locations.is_empty() => 2.0,
            _ => 1.0,
        },
        Arrangement::Any => {
            if place_matches || arrangement == Arrangement::Remote {
                5.0
            } else {
                4.0
            }
        }
        Arrangement::Onsite | Arrangement::Hybrid => {
            if arrangement == Arrangement::Remote {
                4.0
            } else if place_matches {
                5.0
            } else {
                1.5
            }
        }
    }
}

/// Overlap between the profile's domains and the listing text.
pub fn domain(profile: &CandidateProfile, text: &PreparedText, matcher: &SkillMatcher) -> f64 {
    if profile.domains.is_empty() {
        return 3.0;
    }
    let matched = profile
        .domains
        .iter()
        .filter(|d| matcher.matches(d, text))
        .count();
    if matched == 0 {
        1.0
    } else {
        2.5 + 2.5 * matched as f64 / profile.domains.len() as f64
    }
}

const DIRECT_CONTACT: &[&str] = &[
    "hiring manager",
    "email me",
    "reach out to",
    "dm me",
    "apply directly",
    "contact us directly",
    "founder",
];

/// Likelihood that an application gets a response.
pub fn response(listing: &JobListing, is_staffing: bool, today: NaiveDate) -> f64 {
    let mut score = 3.0;
    if is_staffing {
        score -= 1.0;
    }

    let text = listing.description.to_lowercase();
    if DIRECT_CONTACT.iter().any(|signal| text.contains(signal)) {
        score += 1.0;
    }

    if let Some(posted) = listing.posted {
        let age = (today - posted).num_days();
        if age <= 3 {
            score += 1.0;
        } else if age > 30 {
            score -= 1.0;
        }
    }

    clamp(score)
}
