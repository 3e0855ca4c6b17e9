// src/pipeline/run.rs

//! One aggregation run: plan, fetch, dedup, score, track, persist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::{AppError, Result};
use crate::limiter::RateLimiter;
use crate::models::{CandidateProfile, Config, ManualSearchUrl, QueryPlan, RankedListing};
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::fetch::{CancelFlag, FetchOrchestrator, FetchUnit};
use crate::pipeline::track::RunTracker;
use crate::scoring::Scorer;
use crate::services::SourceRegistry;
use crate::storage::{ResultsSnapshot, TrackerStorage};

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Plan only; nothing is fetched or written
    pub dry_run: bool,
    /// Keep at most this many top results
    pub limit: Option<usize>,
    /// Record listings in the tracker
    pub track: bool,
    /// Run id; defaults to the start timestamp
    pub run_id: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: None,
            track: true,
            run_id: None,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunStats {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub after_dedup: usize,
    pub duplicates_removed: usize,
    pub disqualified: usize,
    pub results: usize,
    pub new_results: usize,
    pub units_total: usize,
    pub units_completed: usize,
    pub cancelled: bool,
}

/// What a run hands to the report layer.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Ranked listings, best first
    pub results: Vec<RankedListing>,
    pub stats: RunStats,
    pub manual_urls: Vec<ManualSearchUrl>,
    pub fetch_summary: String,
    /// Planned units (dry runs only)
    pub planned: Vec<FetchUnit>,
}

/// Long-lived collaborators shared by runs.
pub struct SearchContext {
    pub config: Config,
    pub profile: CandidateProfile,
    pub registry: Arc<SourceRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub credentials: Arc<Credentials>,
    pub storage: Arc<dyn TrackerStorage>,
    pub cancel: CancelFlag,
}

impl SearchContext {
    pub fn query_plan(&self) -> QueryPlan {
        QueryPlan::from_profile(
            &self.profile,
            self.config.fetch.max_queries_per_source,
            self.config.fetch.results_per_query,
        )
    }
}

fn default_run_id(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Execute one run.
///
/// Source failures never abort the run; they surface in the fetch summary.
/// Profile and weight problems are fatal and returned before any fetch.
pub async fn run_search<F>(ctx: &SearchContext, options: &RunOptions, progress: F) -> Result<RunOutput>
where
    F: FnMut(usize, usize, &str),
{
    let started_at = Utc::now();
    let run_id = options
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(started_at));

    let plan = ctx.query_plan();
    if plan.is_empty() {
        return Err(AppError::profile("profile produced no search queries"));
    }
    let scorer = Scorer::new(ctx.profile.clone(), &ctx.config.scoring)?;
    let manual_urls = ctx.registry.manual_urls(&plan);

    log::info!(
        "Run {}: {} queries across {} sources",
        run_id,
        plan.len(),
        ctx.registry.len()
    );

    let orchestrator = FetchOrchestrator::new(
        Arc::clone(&ctx.registry),
        Arc::clone(&ctx.limiter),
        Arc::clone(&ctx.credentials),
        &ctx.config.fetch,
    )
    .with_cancel_flag(ctx.cancel.clone());
    let report = orchestrator.run(&plan, options.dry_run, progress).await;
    let fetch_summary = report.summary();

    let mut stats = RunStats {
        run_id: run_id.clone(),
        started_at,
        finished_at: started_at,
        fetched: report.listings.len(),
        units_total: report.total_units,
        units_completed: report.completed_units,
        cancelled: report.cancelled,
        ..RunStats::default()
    };

    if options.dry_run {
        stats.finished_at = Utc::now();
        return Ok(RunOutput {
            results: Vec::new(),
            stats,
            manual_urls,
            fetch_summary,
            planned: report.planned,
        });
    }

    let deduped = Deduplicator::new(&ctx.config.dedup).dedup(report.listings);
    stats.after_dedup = deduped.listings.len();
    stats.duplicates_removed = deduped.duplicates_removed;

    let (ranked, disqualified) = scorer.rank(deduped.listings);
    stats.disqualified = disqualified;

    let tracker_data = ctx.storage.load_tracker().await?;
    let mut tracker = RunTracker::new(tracker_data, ctx.config.tracker.retention_days);
    let listings: Vec<_> = ranked.iter().map(|(l, _)| l.clone()).collect();
    let tags = if options.track {
        tracker.track(&listings, &run_id, Utc::now())
    } else {
        tracker.peek(&listings)
    };

    let mut results: Vec<RankedListing> = ranked
        .into_iter()
        .zip(tags)
        .map(|((listing, score), tag)| RankedListing { listing, score, tag })
        .collect();
    stats.new_results = results.iter().filter(|r| r.tag.is_new()).count();
    if let Some(limit) = options.limit {
        results.truncate(limit);
    }
    stats.results = results.len();

    if options.track {
        ctx.storage.save_tracker(tracker.data()).await?;
    }

    stats.finished_at = Utc::now();
    let output = RunOutput {
        results,
        stats,
        manual_urls,
        fetch_summary,
        planned: Vec::new(),
    };
    ctx.storage.save_results(&ResultsSnapshot::new(&output)).await?;

    log::info!(
        "Run {} finished: {} fetched, {} after dedup, {} disqualified, {} results ({} new)",
        output.stats.run_id,
        output.stats.fetched,
        output.stats.after_dedup,
        output.stats.disqualified,
        output.stats.results,
        output.stats.new_results
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::credentials::CredentialPair;
    use crate::limiter::RateLimitStore;
    use crate::models::{JobListing, Period, RateWindow, SearchQuery};
    use crate::services::JobSource;
    use crate::storage::LocalStorage;

    struct FixedSource {
        id: &'static str,
        listings: Vec<JobListing>,
    }

    #[async_trait]
    impl JobSource for FixedSource {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        async fn fetch(
            &self,
            query: &SearchQuery,
            _credentials: Option<&CredentialPair>,
        ) -> Result<Vec<JobListing>> {
            if query.rank > 0 {
                return Ok(Vec::new());
            }
            Ok(self.listings.clone())
        }
    }

    fn listing(source: &str, title: &str, company: &str, url: &str, description: &str) -> JobListing {
        let mut l = JobListing::new(source, title, company, url);
        l.description = description.into();
        l
    }

    fn profile() -> CandidateProfile {
        CandidateProfile {
            name: "Ada".into(),
            core_skills: vec!["python".into(), "docker".into()],
            target_titles: vec!["Python Developer".into()],
            dealbreakers: vec!["security clearance".into()],
            ..CandidateProfile::default()
        }
    }

    fn context(tmp: &TempDir) -> SearchContext {
        let board = FixedSource {
            id: "board",
            listings: vec![
                listing(
                    "board",
                    "Python Developer",
                    "Initech",
                    "https://board.test/jobs/100001",
                    "Python services shipped with Docker.",
                ),
                listing(
                    "board",
                    "Python Developer",
                    "Globex",
                    "https://board.test/jobs/100002",
                    "Python and Docker. Active security clearance required.",
                ),
                listing("board", "Barista", "Cafe", "https://board.test/jobs/100003", "Espresso."),
            ],
        };
        let feed = FixedSource {
            id: "feed",
            listings: vec![listing(
                "feed",
                "Python Developer",
                "Initech, Inc.",
                "https://feed.test/p/initech-python?utm_source=rss",
                "",
            )],
        };

        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(board));
        registry.register(Arc::new(feed));

        let store = Arc::new(RateLimitStore::open(tmp.path().join("rl.sqlite3")).unwrap());
        let limiter = RateLimiter::new(
            store,
            HashMap::new(),
            HashMap::from([("quota".to_string(), vec![RateWindow::new(60, Period::Minute)])]),
        );

        SearchContext {
            config: Config::default(),
            profile: profile(),
            registry: Arc::new(registry),
            limiter: Arc::new(limiter),
            credentials: Arc::new(Credentials::default()),
            storage: Arc::new(LocalStorage::new(tmp.path())),
            cancel: CancelFlag::new(),
        }
    }

    #[tokio::test]
    async fn test_end_to_end_run() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let mut calls = 0;
        let options = RunOptions {
            run_id: Some("run-1".into()),
            ..RunOptions::default()
        };

        let output = run_search(&ctx, &options, |_, _, _| calls += 1).await.unwrap();

        assert_eq!(calls, output.stats.units_total);
        assert_eq!(output.stats.fetched, 4);
        assert_eq!(output.stats.duplicates_removed, 1);
        assert_eq!(output.stats.disqualified, 1);
        assert_eq!(output.results.len(), 2);
        assert_eq!(output.fetch_summary, "2 sources succeeded, 0 skipped");

        let top = &output.results[0];
        assert_eq!(top.listing.company, "Initech");
        assert!(top.score.score >= 4.0, "score was {}", top.score.score);
        assert_eq!(top.listing.sources, vec!["board".to_string(), "feed".to_string()]);
        assert!(output.results.iter().all(|r| r.listing.company != "Globex"));
        assert!(output.results.iter().all(|r| r.tag.is_new()));

        let saved = ctx.storage.load_results().await.unwrap().unwrap();
        assert_eq!(saved.count, 2);

        // Rate limiting: 61 checks against 60/minute
        let now = Utc::now();
        let allowed = (0..61).filter(|_| ctx.limiter.check_at("quota", now)).count();
        assert_eq!(allowed, 60);
    }

    #[tokio::test]
    async fn test_second_run_tags_seen() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);

        let first = RunOptions {
            run_id: Some("run-1".into()),
            ..RunOptions::default()
        };
        run_search(&ctx, &first, |_, _, _| {}).await.unwrap();

        let second = RunOptions {
            run_id: Some("run-2".into()),
            limit: Some(1),
            ..RunOptions::default()
        };
        let output = run_search(&ctx, &second, |_, _, _| {}).await.unwrap();
        assert_eq!(output.results.len(), 1);
        assert_eq!(output.stats.new_results, 0);
        assert!(!output.results[0].tag.is_new());
    }

    #[tokio::test]
    async fn test_dry_run_fetches_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp);
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };

        let output = run_search(&ctx, &options, |_, _, _| {}).await.unwrap();
        assert!(output.results.is_empty());
        assert_eq!(output.planned.len(), 2);
        assert!(ctx.storage.load_results().await.unwrap().is_none());
        assert!(!tmp.path().join("tracker.json").exists());
    }

    #[tokio::test]
    async fn test_profile_without_titles_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = context(&tmp);
        ctx.profile.target_titles.clear();

        let err = run_search(&ctx, &RunOptions::default(), |_, _, _| {})
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
