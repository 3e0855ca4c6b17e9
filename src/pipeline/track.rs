// src/pipeline/track.rs

//! Cross-run tracking of listings.
//!
//! Each listing gets a stable key derived from its posting id or canonical
//! URL, falling back to title and company. A listing resolves to an existing
//! record when any of its identities matches: the primary key, the key of a
//! URL merged into it during dedup, or its title and company. Keys a record
//! is reached by are kept as aliases, so a posting keeps its record when a
//! different source survives dedup in a later run. The first run that
//! records a key tags it `New`; later runs tag it `Seen`. Re-tracking within
//! the same run id is idempotent.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{
    ApplicationStatus, Freshness, JobListing, RunHistoryEntry, TrackTag, TrackerData,
    TrackerRecord, TrackerStats,
};
use crate::utils::text::{normalize_company, normalize_phrase};
use crate::utils::url::{canonicalize, extract_posting_id};

fn digest(basis: &str) -> String {
    hex::encode(Sha256::digest(basis.as_bytes()))[..16].to_string()
}

fn url_key(url: &str) -> Option<String> {
    extract_posting_id(url)
        .or_else(|| canonicalize(url))
        .map(|u| digest(&format!("u:{u}")))
}

fn title_company_key(title: &str, company: &str) -> String {
    digest(&format!(
        "t:{}|{}",
        normalize_phrase(title),
        normalize_company(company)
    ))
}

/// Stable tracking key for a listing.
pub fn tracking_key(listing: &JobListing) -> String {
    url_key(&listing.url).unwrap_or_else(|| title_company_key(&listing.title, &listing.company))
}

/// Every key a listing may already be tracked under, primary key first.
fn identity_keys(listing: &JobListing) -> Vec<String> {
    let mut keys = vec![tracking_key(listing)];
    let alternates = listing.alternate_urls.iter().filter_map(|u| url_key(u));
    for key in alternates.chain(std::iter::once(title_company_key(
        &listing.title,
        &listing.company,
    ))) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Map every known identity to the record key it resolves to.
fn build_index(data: &TrackerData) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for record in data.jobs.values() {
        index.insert(record.key.clone(), record.key.clone());
    }
    for record in data.jobs.values() {
        let implied = title_company_key(&record.title, &record.company);
        for alias in record.aliases.iter().cloned().chain(std::iter::once(implied)) {
            index.entry(alias).or_insert_with(|| record.key.clone());
        }
    }
    index
}

pub struct RunTracker {
    data: TrackerData,
    index: HashMap<String, String>,
    retention_days: i64,
}

impl RunTracker {
    pub fn new(data: TrackerData, retention_days: i64) -> Self {
        Self {
            index: build_index(&data),
            data,
            retention_days,
        }
    }

    pub fn data(&self) -> &TrackerData {
        &self.data
    }

    pub fn into_data(self) -> TrackerData {
        self.data
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.retention_days.max(0))
    }

    /// Record key the first matching identity resolves to.
    fn resolve(&self, keys: &[String]) -> Option<String> {
        keys.iter().find_map(|k| self.index.get(k).cloned())
    }

    fn tag_for(&self, key: String, run_id: Option<&str>) -> TrackTag {
        match self.data.jobs.get(&key) {
            Some(record) => TrackTag {
                freshness: if run_id == Some(record.first_seen_run.as_str()) {
                    Freshness::New
                } else {
                    Freshness::Seen
                },
                status: record.status,
                key,
            },
            None => TrackTag {
                key,
                freshness: Freshness::New,
                status: ApplicationStatus::Unreviewed,
            },
        }
    }

    /// Tag listings without recording them.
    pub fn peek(&self, listings: &[JobListing]) -> Vec<TrackTag> {
        listings
            .iter()
            .map(|l| {
                let keys = identity_keys(l);
                let key = self.resolve(&keys).unwrap_or_else(|| keys[0].clone());
                self.tag_for(key, None)
            })
            .collect()
    }

    /// Record a run's listings and tag each one.
    pub fn track(&mut self, listings: &[JobListing], run_id: &str, now: DateTime<Utc>) -> Vec<TrackTag> {
        let mut tags = Vec::with_capacity(listings.len());

        for listing in listings {
            let keys = identity_keys(listing);
            let key = match self.resolve(&keys) {
                Some(key) => {
                    if let Some(record) = self.data.jobs.get_mut(&key) {
                        if record.last_seen_run != run_id {
                            record.times_seen += 1;
                            record.last_seen_run = run_id.to_string();
                        }
                        record.last_seen_at = now;
                        for alias in &keys {
                            if *alias != key && !record.aliases.contains(alias) {
                                record.aliases.push(alias.clone());
                            }
                        }
                    }
                    key
                }
                None => {
                    let key = keys[0].clone();
                    self.data.jobs.insert(
                        key.clone(),
                        TrackerRecord {
                            key: key.clone(),
                            aliases: keys[1..].to_vec(),
                            title: listing.title.clone(),
                            company: listing.company.clone(),
                            url: listing.url.clone(),
                            first_seen_run: run_id.to_string(),
                            first_seen_at: now,
                            last_seen_run: run_id.to_string(),
                            last_seen_at: now,
                            times_seen: 1,
                            status: ApplicationStatus::Unreviewed,
                            notes: None,
                        },
                    );
                    key
                }
            };
            for alias in keys {
                self.index.entry(alias).or_insert_with(|| key.clone());
            }
            tags.push(self.tag_for(key, Some(run_id)));
        }

        let entry = RunHistoryEntry {
            run_id: run_id.to_string(),
            timestamp: now,
            total_results: tags.len(),
            new_results: tags.iter().filter(|t| t.is_new()).count(),
        };
        match self.data.runs.iter_mut().find(|r| r.run_id == run_id) {
            Some(existing) => *existing = entry,
            None => self.data.runs.push(entry),
        }

        let cutoff = self.cutoff(now);
        self.data.runs.retain(|r| r.timestamp >= cutoff);

        log::debug!(
            "Tracked {} listings for run {} ({} new)",
            tags.len(),
            run_id,
            tags.iter().filter(|t| t.is_new()).count()
        );
        tags
    }

    /// Statistics over the retention window ending at `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> TrackerStats {
        let cutoff = self.cutoff(now);
        let retained: Vec<&RunHistoryEntry> =
            self.data.runs.iter().filter(|r| r.timestamp >= cutoff).collect();
        let new_total: usize = retained.iter().map(|r| r.new_results).sum();

        TrackerStats {
            retained_runs: retained.len(),
            average_new_per_run: if retained.is_empty() {
                0.0
            } else {
                new_total as f64 / retained.len() as f64
            },
            lifetime_unique: self.data.jobs.len(),
            active_keys: self
                .data
                .jobs
                .values()
                .filter(|r| r.last_seen_at >= cutoff)
                .count(),
        }
    }

    pub fn record(&self, key: &str) -> Option<&TrackerRecord> {
        self.data.jobs.get(key)
    }

    /// Set the application status of a tracked key.
    pub fn mark(
        &mut self,
        key: &str,
        status: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<&TrackerRecord> {
        let record = self
            .data
            .jobs
            .get_mut(key)
            .ok_or_else(|| AppError::UnknownKey(key.to_string()))?;
        record.status = status;
        if notes.is_some() {
            record.notes = notes;
        }
        Ok(record)
    }
}
