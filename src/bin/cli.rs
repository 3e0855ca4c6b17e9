//! jobsweep CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use jobsweep::{
    config,
    credentials::Credentials,
    error::Result,
    limiter::RateLimiter,
    models::{ApplicationStatus, CandidateProfile, Config},
    pipeline::{self, CancelFlag, RunOptions, RunOutput, RunTracker, SearchContext},
    services::SourceRegistry,
    storage::{LocalStorage, TrackerStorage},
    utils::{http, log},
};

/// jobsweep - Job Listing Aggregator
#[derive(Parser, Debug)]
#[command(
    name = "jobsweep",
    version,
    about = "Aggregates, scores, and deduplicates job postings"
)]
struct Cli {
    /// Path to storage directory containing config and state files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Candidate profile (default: {storage_dir}/profile.toml)
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, score and rank listings from all enabled sources
    Run {
        /// Show what would be fetched without fetching or writing anything
        #[arg(long)]
        dry_run: bool,

        /// Keep only the top N results
        #[arg(long)]
        limit: Option<usize>,

        /// Do not record this run in the tracker
        #[arg(long)]
        no_track: bool,
    },

    /// Print the planned (source, query) fetches and manual search URLs
    Plan,

    /// Show remaining quota per rate-limit backend
    Limits,

    /// Show run history statistics
    History,

    /// Set the application status of a tracked listing
    Mark {
        /// Tracking key shown in the results
        key: String,

        /// unreviewed, interested, applied, interviewing, offer, rejected or ignored
        status: ApplicationStatus,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Validate configuration and profile
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
    log::init(level);
}

fn load(cli: &Cli) -> Result<(Config, CandidateProfile, Credentials)> {
    config::load_all(&cli.storage_dir, cli.profile.as_deref())
}

fn open_limiter(storage: &LocalStorage, config: &Config) -> Result<Arc<RateLimiter>> {
    Ok(Arc::new(RateLimiter::open(storage.limiter_path(), config)?))
}

fn print_results(output: &RunOutput) {
    log::header(&format!("Results ({})", output.results.len()));
    for (rank, ranked) in output.results.iter().enumerate() {
        let marker = if ranked.tag.is_new() { "NEW " } else { "" };
        log::info(&format!(
            "{:>3}. {}{:.2}  {}",
            rank + 1,
            marker,
            ranked.score.score,
            ranked.listing.format("{title} @ {company} ({location})")
        ));
        log::sub_item(&format!(
            "{}  [{}]  key={}",
            ranked.listing.url,
            ranked.listing.sources.join(", "),
            ranked.tag.key
        ));
    }

    print_manual_urls(output);
}

fn print_manual_urls(output: &RunOutput) {
    if output.manual_urls.is_empty() {
        return;
    }
    log::header("Search manually");
    for manual in &output.manual_urls {
        log::sub_item(&format!("{} ({}): {}", manual.source_name, manual.query, manual.url));
    }
}

async fn run(cli: &Cli, dry_run: bool, limit: Option<usize>, no_track: bool) -> Result<()> {
    let (config, profile, credentials) = load(cli)?;
    let storage = Arc::new(LocalStorage::new(&cli.storage_dir));
    let client = http::create_async_client(&config.fetch)?;
    let registry = SourceRegistry::from_config(&config, client)?;
    let limiter = open_limiter(&storage, &config)?;

    let cancel = CancelFlag::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn("Interrupt received, finishing in-flight fetches...");
            ctrl_c.cancel();
        }
    });

    let show_progress = config.logging.show_progress;
    let ctx = SearchContext {
        config,
        profile,
        registry: Arc::new(registry),
        limiter: Arc::clone(&limiter),
        credentials: Arc::new(credentials),
        storage,
        cancel,
    };
    let options = RunOptions {
        dry_run,
        limit,
        track: !no_track,
        run_id: None,
    };

    log::header(&format!("jobsweep run for {}", ctx.profile.name));
    let output = pipeline::run_search(&ctx, &options, |completed, total, source| {
        if show_progress {
            log::progress(completed, total, source);
        }
    })
    .await;
    limiter.close()?;
    let output = output?;

    if dry_run {
        log::header(&format!("Dry run: {} fetch units planned", output.planned.len()));
        for unit in &output.planned {
            log::sub_item(&format!("{}: {}", unit.source_name, unit.query.literal()));
        }
        print_manual_urls(&output);
        return Ok(());
    }

    print_results(&output);
    let stats = &output.stats;
    log::summary(
        "Run complete",
        &[
            ("Run", stats.run_id.clone()),
            ("Sources", output.fetch_summary.clone()),
            ("Fetched", stats.fetched.to_string()),
            ("Duplicates removed", stats.duplicates_removed.to_string()),
            ("Disqualified", stats.disqualified.to_string()),
            ("Results", format!("{} ({} new)", stats.results, stats.new_results)),
            ("Cancelled", stats.cancelled.to_string()),
        ],
    );
    Ok(())
}

fn limits(storage_dir: &Path) -> Result<()> {
    let config = config::load_config(&storage_dir.join(config::CONFIG_FILE))?;
    let storage = LocalStorage::new(storage_dir);
    let limiter = open_limiter(&storage, &config)?;
    let now = Utc::now();

    log::header("Rate limits");
    for backend in limiter.configured_backends() {
        let state = limiter.status(&backend, now)?;
        let remaining = state
            .remaining
            .map_or_else(|| "unlimited".to_string(), |r| r.to_string());
        log::info(&format!("{backend}: {remaining} remaining"));
        for usage in &state.windows {
            let resets = usage
                .resets_at
                .map(|t| format!(", oldest expires {}", t.format("%H:%M:%S")))
                .unwrap_or_default();
            log::sub_item(&format!(
                "{}/{:?}: {} used{}",
                usage.window.limit, usage.window.per, usage.used, resets
            ));
        }
        if let Some(reset) = state.next_reset {
            log::sub_item(&format!("next slot at {}", reset.format("%Y-%m-%d %H:%M:%S UTC")));
        }
    }
    limiter.close()
}

async fn history(storage_dir: &Path) -> Result<()> {
    let config = config::load_config(&storage_dir.join(config::CONFIG_FILE))?;
    let storage = LocalStorage::new(storage_dir);
    let tracker = RunTracker::new(storage.load_tracker().await?, config.tracker.retention_days);
    let stats = tracker.stats(Utc::now());

    log::summary(
        &format!("History (last {} days)", config.tracker.retention_days),
        &[
            ("Runs", stats.retained_runs.to_string()),
            ("Average new per run", format!("{:.1}", stats.average_new_per_run)),
            ("Active listings", stats.active_keys.to_string()),
            ("Lifetime unique", stats.lifetime_unique.to_string()),
        ],
    );
    for run in tracker.data().runs.iter().rev().take(10) {
        log::sub_item(&format!(
            "{}  {} results, {} new",
            run.run_id, run.total_results, run.new_results
        ));
    }
    Ok(())
}

async fn mark(
    storage_dir: &Path,
    key: &str,
    status: ApplicationStatus,
    notes: Option<String>,
) -> Result<()> {
    let config = config::load_config(&storage_dir.join(config::CONFIG_FILE))?;
    let storage = LocalStorage::new(storage_dir);
    let mut tracker = RunTracker::new(storage.load_tracker().await?, config.tracker.retention_days);

    let record = tracker.mark(key, status, notes)?;
    log::success(&format!(
        "{} @ {} marked {}",
        record.title, record.company, record.status
    ));
    storage.save_tracker(tracker.data()).await
}

fn validate(cli: &Cli) -> Result<()> {
    log::info("Validating configuration...");
    let (config, profile, credentials) = load(cli)?;
    let weights = profile.resolve_weights(
        &config.scoring.weights,
        config.scoring.auto_normalize_weights,
    )?;
    log::success(&format!(
        "Config OK: {} enabled sources",
        config.enabled_sources().count()
    ));
    log::success(&format!(
        "Profile OK: {} ({} target titles, weights sum {:.2})",
        profile.name,
        profile.target_titles.len(),
        weights.sum()
    ));
    if credentials.is_empty() {
        log::warn("No API credentials configured; API sources will be skipped");
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = config::load_config(&cli.storage_dir.join(config::CONFIG_FILE))
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let result = match &cli.command {
        Command::Run {
            dry_run,
            limit,
            no_track,
        } => run(&cli, *dry_run, *limit, *no_track).await,
        Command::Plan => run(&cli, true, None, true).await,
        Command::Limits => limits(&cli.storage_dir),
        Command::History => history(&cli.storage_dir).await,
        Command::Mark { key, status, notes } => {
            mark(&cli.storage_dir, key, *status, notes.clone()).await
        }
        Command::Validate => validate(&cli),
    };

    if let Err(e) = &result {
        log::error(&e.to_string());
    }
    result
}
