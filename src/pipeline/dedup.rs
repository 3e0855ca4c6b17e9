// src/pipeline/dedup.rs

//! Within-run deduplication.
//!
//! An exact pass matches on normalized title + company, canonical URL and
//! extracted posting id. A fuzzy pass then compares normalized titles of
//! listings from the same company. The first listing of a group survives;
//! later duplicates only fill fields it lacks and add their source to its
//! attribution. Survivor titles, companies and URLs never change, so a
//! second pass over the output finds nothing to merge.

use std::collections::HashMap;

use strsim::normalized_levenshtein;

use crate::models::{DedupConfig, EmploymentType, JobListing};
use crate::utils::text::{normalize_company, normalize_phrase};
use crate::utils::url::{canonicalize, extract_posting_id};

/// Listings after deduplication.
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub listings: Vec<JobListing>,
    pub duplicates_removed: usize,
}

/// Exact identity keys of a listing.
pub fn exact_keys(listing: &JobListing) -> Vec<String> {
    let mut keys = Vec::with_capacity(3);
    let title = normalize_phrase(&listing.title);
    let company = normalize_company(&listing.company);
    if !title.is_empty() && !company.is_empty() {
        keys.push(format!("tc:{title}|{company}"));
    }
    for url in std::iter::once(&listing.url).chain(&listing.alternate_urls) {
        if let Some(url) = canonicalize(url) {
            keys.push(format!("url:{url}"));
        }
        if let Some(id) = extract_posting_id(url) {
            keys.push(format!("id:{id}"));
        }
    }
    keys
}

/// Normalized forms used by the fuzzy pass.
struct Fingerprint {
    title: String,
    company: String,
}

impl Fingerprint {
    fn of(listing: &JobListing) -> Self {
        Self {
            title: normalize_phrase(&listing.title),
            company: normalize_company(&listing.company),
        }
    }
}

pub struct Deduplicator {
    fuzzy_enabled: bool,
    threshold: f64,
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            fuzzy_enabled: config.fuzzy_enabled,
            threshold: config.fuzzy_threshold,
        }
    }

    /// Whether two fingerprints describe the same posting.
    fn is_fuzzy_match(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        if a.company.is_empty() || b.company.is_empty() || a.title.is_empty() || b.title.is_empty() {
            return false;
        }
        let same_company =
            a.company == b.company || normalized_levenshtein(&a.company, &b.company) >= self.threshold;
        same_company && normalized_levenshtein(&a.title, &b.title) >= self.threshold
    }

    pub fn dedup(&self, listings: Vec<JobListing>) -> DedupOutcome {
        let mut survivors: Vec<JobListing> = Vec::new();
        let mut fingerprints: Vec<Fingerprint> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut removed = 0;

        for listing in listings {
            let keys = exact_keys(&listing);
            let fingerprint = Fingerprint::of(&listing);

            let exact = keys.iter().find_map(|k| index.get(k).copied());
            let target = exact.or_else(|| {
                if !self.fuzzy_enabled {
                    return None;
                }
                fingerprints
                    .iter()
                    .position(|fp| self.is_fuzzy_match(fp, &fingerprint))
            });

            let slot = match target {
                Some(idx) => {
                    log::debug!(
                        "Merging duplicate '{}' from {} into listing from {}",
                        listing.title,
                        listing.source_id,
                        survivors[idx].source_id
                    );
                    merge_into(&mut survivors[idx], listing);
                    removed += 1;
                    idx
                }
                None => {
                    survivors.push(listing);
                    fingerprints.push(fingerprint);
                    survivors.len() - 1
                }
            };
            for key in keys {
                index.entry(key).or_insert(slot);
            }
        }

        DedupOutcome {
            listings: survivors,
            duplicates_removed: removed,
        }
    }
}

/// Fill what the survivor lacks and extend its attribution.
fn merge_into(survivor: &mut JobListing, duplicate: JobListing) {
    for source in duplicate.sources.iter().chain(std::iter::once(&duplicate.source_id)) {
        if !survivor.sources.contains(source) {
            survivor.sources.push(source.clone());
        }
    }
    for url in std::iter::once(&duplicate.url).chain(&duplicate.alternate_urls) {
        if *url != survivor.url && !survivor.alternate_urls.contains(url) {
            survivor.alternate_urls.push(url.clone());
        }
    }
    if survivor.location.is_empty() {
        survivor.location = duplicate.location;
    }
    if survivor.description.len() < duplicate.description.len() {
        survivor.description = duplicate.description;
    }
    if survivor.salary.as_ref().is_none_or(|s| s.is_empty()) && duplicate.salary.is_some() {
        survivor.salary = duplicate.salary;
    }
    if survivor.posted.is_none() {
        survivor.posted = duplicate.posted;
    }
    if survivor.employment_type == EmploymentType::Unknown {
        survivor.employment_type = duplicate.employment_type;
    }
    survivor.confidence = survivor.confidence.max(duplicate.confidence);
}
