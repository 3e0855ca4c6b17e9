// src/pipeline/fetch.rs

//! Concurrent fetch orchestration.
//!
//! Every enabled source is paired with every planned query. Units run on a
//! bounded pool; each one passes the credential check, then the rate-limit
//! check, then fetches. A unit that cannot run is skipped with a reason and
//! the run carries on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::credentials::{self, CredentialPair, Credentials};
use crate::limiter::{Decision, RateLimiter};
use crate::models::{FetchConfig, JobListing, QueryPlan, SearchQuery};
use crate::services::SourceRegistry;

/// Shared cooperative cancellation signal.
///
/// Checked before each unit is dispatched; units already in flight finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One (source, query) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchUnit {
    pub index: usize,
    pub source_id: String,
    pub source_name: String,
    pub query: SearchQuery,
}

/// Why a unit contributed nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    MissingCredentials { remediation: String },
    RateLimited { backend_id: String, retry_at: Option<DateTime<Utc>> },
    Failed { message: String },
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingCredentials { .. } => write!(f, "missing credentials"),
            SkipReason::RateLimited { retry_at: Some(at), .. } => {
                write!(f, "rate limited until {}", at.format("%H:%M:%S UTC"))
            }
            SkipReason::RateLimited { retry_at: None, .. } => write!(f, "rate limited"),
            SkipReason::Failed { message } => write!(f, "failed: {message}"),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

enum UnitResult {
    Fetched(Vec<JobListing>),
    Skipped(SkipReason),
}

/// Per-source tally of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceOutcome {
    pub source_id: String,
    pub source_name: String,
    pub fetched_units: usize,
    pub listing_count: usize,
    pub skips: Vec<SkipReason>,
}

impl SourceOutcome {
    fn new(source_id: &str, source_name: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            source_name: source_name.to_string(),
            fetched_units: 0,
            listing_count: 0,
            skips: Vec::new(),
        }
    }

    /// At least one query of this source was fetched.
    pub fn succeeded(&self) -> bool {
        self.fetched_units > 0
    }

    /// Distinct skip reasons in first-seen order.
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons: Vec<String> = Vec::new();
        for reason in self.skips.iter().map(ToString::to_string) {
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        }
        reasons
    }
}

/// Everything the orchestrator produced.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub listings: Vec<JobListing>,
    /// Outcomes in registry order
    pub sources: Vec<SourceOutcome>,
    /// Planned units (only filled on dry runs)
    pub planned: Vec<FetchUnit>,
    pub total_units: usize,
    pub completed_units: usize,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl FetchReport {
    fn outcome_mut(&mut self, source_id: &str, source_name: &str) -> &mut SourceOutcome {
        let idx = match self.sources.iter().position(|o| o.source_id == source_id) {
            Some(idx) => idx,
            None => {
                self.sources.push(SourceOutcome::new(source_id, source_name));
                self.sources.len() - 1
            }
        };
        &mut self.sources[idx]
    }

    /// Tally a unit and hand back its listings.
    fn record(&mut self, unit: &FetchUnit, result: UnitResult) -> Vec<JobListing> {
        match result {
            UnitResult::Fetched(listings) => {
                let outcome = self.outcome_mut(&unit.source_id, &unit.source_name);
                outcome.fetched_units += 1;
                outcome.listing_count += listings.len();
                listings
            }
            UnitResult::Skipped(reason) => {
                self.outcome_mut(&unit.source_id, &unit.source_name)
                    .skips
                    .push(reason);
                Vec::new()
            }
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources.iter().filter(|o| o.succeeded())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources.iter().filter(|o| !o.succeeded())
    }

    /// "N sources succeeded, M skipped (reasons)".
    pub fn summary(&self) -> String {
        let succeeded = self.succeeded().count();
        let skipped: Vec<&SourceOutcome> = self.skipped().collect();
        let mut line = format!("{succeeded} sources succeeded, {} skipped", skipped.len());
        if !skipped.is_empty() {
            let reasons: Vec<String> = skipped
                .iter()
                .map(|o| format!("{}: {}", o.source_id, o.reasons().join(", ")))
                .collect();
            line.push_str(&format!(" ({})", reasons.join("; ")));
        }
        line
    }
}

/// Runs (source, query) units concurrently under quota and credential gates.
pub struct FetchOrchestrator {
    registry: Arc<SourceRegistry>,
    limiter: Arc<RateLimiter>,
    credentials: Arc<Credentials>,
    max_workers: usize,
    request_delay: Duration,
    cancel: CancelFlag,
}

impl FetchOrchestrator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        limiter: Arc<RateLimiter>,
        credentials: Arc<Credentials>,
        config: &FetchConfig,
    ) -> Self {
        Self {
            registry,
            limiter,
            credentials,
            max_workers: config.max_workers.max(1),
            request_delay: Duration::from_millis(config.request_delay_ms),
            cancel: CancelFlag::new(),
        }
    }

    /// Share an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Cross product of automatable sources and queries, in registry order.
    pub fn plan(&self, plan: &QueryPlan) -> Vec<FetchUnit> {
        self.registry
            .sources()
            .iter()
            .flat_map(|source| {
                plan.queries.iter().map(move |query| (source, query))
            })
            .enumerate()
            .map(|(index, (source, query))| FetchUnit {
                index,
                source_id: source.id().to_string(),
                source_name: source.name().to_string(),
                query: query.clone(),
            })
            .collect()
    }

    /// Credential pair per source that needs one; missing pairs are logged
    /// once per source here rather than once per unit.
    fn resolve_credentials(&self) -> HashMap<String, Option<CredentialPair>> {
        self.registry
            .sources()
            .iter()
            .filter(|s| s.needs_credentials())
            .map(|source| {
                let backend = self.limiter.backend_for(source.id());
                let pair = self.credentials.get(source.id(), backend).cloned();
                if pair.is_none() {
                    log::warn!(
                        "Skipping {}: no credentials ({})",
                        source.name(),
                        credentials::remediation(source.id(), backend)
                    );
                }
                (source.id().to_string(), pair)
            })
            .collect()
    }

    async fn run_unit(&self, unit: &FetchUnit, creds: Option<&CredentialPair>) -> UnitResult {
        let Some(source) = self.registry.get(&unit.source_id) else {
            return UnitResult::Skipped(SkipReason::Failed {
                message: "source not registered".into(),
            });
        };

        if source.needs_credentials() && creds.is_none() {
            let backend = self.limiter.backend_for(&unit.source_id);
            return UnitResult::Skipped(SkipReason::MissingCredentials {
                remediation: credentials::remediation(&unit.source_id, backend),
            });
        }

        let backend_id = self.limiter.backend_for(&unit.source_id).to_string();
        let now = Utc::now();
        match self.limiter.decide(&unit.source_id, now) {
            Ok(Decision::Allowed) => {}
            Ok(Decision::Denied { retry_at, .. }) => {
                let wait = (retry_at - now).num_seconds().max(0);
                log::info!(
                    "Skipping {} '{}': rate limit for '{}' reached, resets in {}s",
                    unit.source_name,
                    unit.query.keywords,
                    backend_id,
                    wait
                );
                return UnitResult::Skipped(SkipReason::RateLimited {
                    backend_id,
                    retry_at: Some(retry_at),
                });
            }
            Err(e) => {
                log::warn!("Rate-limit check for {} failed, skipping: {}", unit.source_id, e);
                return UnitResult::Skipped(SkipReason::RateLimited {
                    backend_id,
                    retry_at: None,
                });
            }
        }

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        match source.fetch(&unit.query, creds).await {
            Ok(listings) => UnitResult::Fetched(listings),
            Err(e) => {
                log::warn!("{} '{}' failed: {}", unit.source_name, unit.query.keywords, e);
                UnitResult::Skipped(SkipReason::Failed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Run the plan.
    ///
    /// `progress(completed, total, source_name)` is called after every unit,
    /// in completion order. A dry run returns the planned units only.
    pub async fn run<F>(&self, plan: &QueryPlan, dry_run: bool, mut progress: F) -> FetchReport
    where
        F: FnMut(usize, usize, &str),
    {
        let units = self.plan(plan);
        let total = units.len();
        let mut report = FetchReport {
            total_units: total,
            dry_run,
            sources: self
                .registry
                .sources()
                .iter()
                .map(|s| SourceOutcome::new(s.id(), s.name()))
                .collect(),
            ..FetchReport::default()
        };

        if dry_run {
            report.planned = units;
            return report;
        }

        let credentials = self.resolve_credentials();
        let pending = units.clone();
        let mut done = vec![false; total];
        let mut fetched: Vec<Vec<JobListing>> = vec![Vec::new(); total];
        let cancel = self.cancel.clone();

        let mut results = stream::iter(units)
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(|unit| {
                let creds = credentials.get(&unit.source_id).cloned().flatten();
                async move {
                    let result = self.run_unit(&unit, creds.as_ref()).await;
                    (unit, result)
                }
            })
            .buffer_unordered(self.max_workers);

        while let Some((unit, result)) = results.next().await {
            done[unit.index] = true;
            fetched[unit.index] = report.record(&unit, result);
            report.completed_units += 1;
            progress(report.completed_units, total, &unit.source_name);
        }
        drop(results);

        if report.completed_units < total {
            report.cancelled = true;
            log::warn!(
                "Run cancelled: {} of {} units not dispatched",
                total - report.completed_units,
                total
            );
            for unit in pending.iter().filter(|u| !done[u.index]) {
                report.record(unit, UnitResult::Skipped(SkipReason::Cancelled));
            }
        }

        // Plan order, independent of completion order
        report.listings = fetched.into_iter().flatten().collect();

        log::info!("{}", report.summary());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::error::{AppError, Result};
    use crate::limiter::RateLimitStore;
    use crate::models::{Period, RateWindow};
    use crate::services::JobSource;

    struct MockSource {
        id: String,
        needs_credentials: bool,
        fail: bool,
        calls: AtomicUsize,
        cancel_on_fetch: Option<CancelFlag>,
    }

    impl MockSource {
        fn new(id: &str) -> Self {
            Self {
                id: id.into(),
                needs_credentials: false,
                fail: false,
                calls: AtomicUsize::new(0),
                cancel_on_fetch: None,
            }
        }
    }

    #[async_trait]
    impl JobSource for MockSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.id
        }

        fn needs_credentials(&self) -> bool {
            self.needs_credentials
        }

        async fn fetch(
            &self,
            query: &SearchQuery,
            _credentials: Option<&CredentialPair>,
        ) -> Result<Vec<JobListing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(flag) = &self.cancel_on_fetch {
                flag.cancel();
            }
            if self.fail {
                return Err(AppError::fetch(&self.id, "connection reset"));
            }
            Ok(vec![JobListing::new(
                &self.id,
                &query.keywords,
                "Acme",
                format!("https://{}.test/{}", self.id, query.rank),
            )])
        }
    }

    fn plan(n: usize) -> QueryPlan {
        QueryPlan {
            queries: (0..n)
                .map(|rank| SearchQuery {
                    keywords: format!("Engineer {rank}"),
                    rank,
                    location: None,
                    remote_only: false,
                    salary_min: None,
                    page_size: 10,
                })
                .collect(),
        }
    }

    fn limiter(tmp: &TempDir, windows: &[(&str, RateWindow)]) -> Arc<RateLimiter> {
        let store = Arc::new(RateLimitStore::open(tmp.path().join("rl.sqlite3")).unwrap());
        Arc::new(RateLimiter::new(
            store,
            HashMap::new(),
            windows
                .iter()
                .map(|(id, w)| (id.to_string(), vec![*w]))
                .collect(),
        ))
    }

    fn orchestrator(
        sources: Vec<Arc<MockSource>>,
        limiter: Arc<RateLimiter>,
        workers: usize,
    ) -> FetchOrchestrator {
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.register(source);
        }
        let config = FetchConfig {
            max_workers: workers,
            ..FetchConfig::default()
        };
        FetchOrchestrator::new(
            Arc::new(registry),
            limiter,
            Arc::new(Credentials::default()),
            &config,
        )
    }

    #[tokio::test]
    async fn test_failures_and_missing_credentials_are_skips() {
        let tmp = TempDir::new().unwrap();
        let ok = Arc::new(MockSource::new("ok"));
        let mut broken = MockSource::new("broken");
        broken.fail = true;
        let mut locked = MockSource::new("locked");
        locked.needs_credentials = true;
        let locked = Arc::new(locked);

        let orch = orchestrator(
            vec![ok.clone(), Arc::new(broken), locked.clone()],
            limiter(&tmp, &[]),
            4,
        );
        let report = orch.run(&plan(2), false, |_, _, _| {}).await;

        assert_eq!(report.listings.len(), 2);
        assert_eq!(report.completed_units, 6);
        assert_eq!(locked.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.succeeded().count(), 1);
        assert_eq!(report.skipped().count(), 2);

        let summary = report.summary();
        assert!(summary.starts_with("1 sources succeeded, 2 skipped ("), "{summary}");
        assert!(summary.contains("broken: failed:"), "{summary}");
        assert!(summary.contains("locked: missing credentials"), "{summary}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_delay_overlaps_across_workers() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(MockSource::new("slow"));
        let mut registry = SourceRegistry::new();
        registry.register(source.clone());
        let config = FetchConfig {
            max_workers: 4,
            request_delay_ms: 1_000,
            ..FetchConfig::default()
        };
        let orch = FetchOrchestrator::new(
            Arc::new(registry),
            limiter(&tmp, &[]),
            Arc::new(Credentials::default()),
            &config,
        );

        let started = tokio::time::Instant::now();
        let report = orch.run(&plan(4), false, |_, _, _| {}).await;
        let elapsed = started.elapsed();

        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert_eq!(report.listings.len(), 4);
        assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_rate_limited_units_skip_without_fetching() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(MockSource::new("limited"));
        let orch = orchestrator(
            vec![source.clone()],
            limiter(&tmp, &[("limited", RateWindow::new(1, Period::Minute))]),
            1,
        );
        let report = orch.run(&plan(3), false, |_, _, _| {}).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.listings.len(), 1);
        let outcome = &report.sources[0];
        assert_eq!(outcome.skips.len(), 2);
        assert!(matches!(
            &outcome.skips[0],
            SkipReason::RateLimited { retry_at: Some(_), .. }
        ));
        assert!(outcome.succeeded());
    }

    #[tokio::test]
    async fn test_missing_credentials_do_not_consume_quota() {
        let tmp = TempDir::new().unwrap();
        let mut locked = MockSource::new("locked");
        locked.needs_credentials = true;
        let limiter = limiter(&tmp, &[("locked", RateWindow::new(5, Period::Minute))]);
        let orch = orchestrator(vec![Arc::new(locked)], limiter.clone(), 2);

        orch.run(&plan(3), false, |_, _, _| {}).await;
        let state = limiter.status("locked", Utc::now()).unwrap();
        assert_eq!(state.remaining, Some(5));
    }

    #[tokio::test]
    async fn test_progress_reports_every_unit() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(
            vec![Arc::new(MockSource::new("a")), Arc::new(MockSource::new("b"))],
            limiter(&tmp, &[]),
            3,
        );
        let seen = Mutex::new(Vec::new());
        orch.run(&plan(2), false, |done, total, name| {
            seen.lock().unwrap().push((done, total, name.to_string()));
        })
        .await;

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 4);
        let counts: Vec<usize> = seen.iter().map(|(done, _, _)| *done).collect();
        assert_eq!(counts, vec![1, 2, 3, 4]);
        assert!(seen.iter().all(|(_, total, _)| *total == 4));
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(MockSource::new("a"));
        let orch = orchestrator(vec![source.clone(), Arc::new(MockSource::new("b"))], limiter(&tmp, &[]), 2);

        let report = orch.run(&plan(3), true, |_, _, _| panic!("no progress on dry run")).await;
        assert!(report.dry_run);
        assert_eq!(report.planned.len(), 6);
        assert_eq!(report.planned[0].source_id, "a");
        assert_eq!(report.planned[3].source_id, "b");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(report.listings.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_run_dispatches_nothing() {
        let tmp = TempDir::new().unwrap();
        let source = Arc::new(MockSource::new("a"));
        let orch = orchestrator(vec![source.clone()], limiter(&tmp, &[]), 2);
        orch.cancel_flag().cancel();

        let report = orch.run(&plan(2), false, |_, _, _| {}).await;
        assert!(report.cancelled);
        assert_eq!(report.completed_units, 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(report.sources[0].skips.iter().all(|s| *s == SkipReason::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_mid_run_lets_in_flight_unit_finish() {
        let tmp = TempDir::new().unwrap();
        let cancel = CancelFlag::new();
        let mut source = MockSource::new("a");
        source.cancel_on_fetch = Some(cancel.clone());
        let source = Arc::new(source);
        let orch = orchestrator(vec![source.clone()], limiter(&tmp, &[]), 1).with_cancel_flag(cancel);

        let report = orch.run(&plan(4), false, |_, _, _| {}).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.listings.len(), 1);
        assert_eq!(report.completed_units, 1);
        assert!(report.cancelled);
        assert_eq!(report.sources[0].skips.len(), 3);
    }
}
