use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::{Mutex, Notify};

use speedy_digest::ai::{ChatClient, LlmSimilarity, LlmSummarizer, LlmTranslator, Translator};
use speedy_digest::config::Config;
use speedy_digest::db::Repository;
use speedy_digest::digest::{
    ClusterSummarizer, DigestPersister, DigestPipeline, InMemoryIssuanceStore, IssuanceTracker,
    SimilarityClusterer,
};
use speedy_digest::error::{AppError, Result};
use speedy_digest::feed::FeedFetcher;
use speedy_digest::lease::{InstanceLease, PidFileLease};
use speedy_digest::models::next_occurrence;
use speedy_digest::scheduler::{shutdown_on, JobRunner, JobTimetable, ReconciliationLoop};
use speedy_digest::services::ContentFetcher;

#[derive(Parser)]
#[command(name = "digest-worker", version, about = "Feed sync scheduler and daily digest worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted
    Run,
    /// Fetch every source once
    Sync,
    /// Build the digest once
    Digest,
    /// Delete items older than the retention window
    Cleanup,
    /// Discover and add a feed source
    AddSource {
        url: String,
        /// Keep this source out of the digest
        #[arg(long)]
        no_digest: bool,
    },
    /// Show or change the stored schedule and digest settings
    Settings(SettingsArgs),
    /// Print one page of digest entries
    Page {
        #[arg(long, default_value = "cli")]
        session: String,
        /// Id of the last entry of the previous page
        #[arg(long)]
        cursor: Option<i64>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        unread: bool,
    },
    /// Mark a digest entry as read
    MarkRead {
        id: i64,
        /// Mark it unread instead
        #[arg(long)]
        unread: bool,
    },
}

#[derive(clap::Args)]
struct SettingsArgs {
    #[arg(long)]
    sync_interval: Option<u32>,
    #[arg(long)]
    clean_after_days: Option<u32>,
    /// Offset from UTC in minutes, e.g. 120 or -300
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<i32>,
    #[arg(long, conflicts_with = "disable_digest")]
    enable_digest: bool,
    #[arg(long)]
    disable_digest: bool,
    /// Local time the digest should be ready by, as HH:MM
    #[arg(long)]
    digest_time: Option<String>,
    #[arg(long)]
    lookback_hours: Option<u32>,
    #[arg(long)]
    include_read: Option<bool>,
    #[arg(long)]
    compare_titles: Option<bool>,
    #[arg(long)]
    translate: Option<bool>,
    #[arg(long)]
    language: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Command::Run => run_scheduler(&config).await,
        Command::Sync => {
            let runner = build_runner(&config, Arc::new(open_repo(&config).await?), false)?;
            let report = runner.run_sync(Utc::now()).await?;
            println!(
                "Synced {} sources: {} new, {} too old, {} failed",
                report.sources, report.inserted, report.too_old, report.failed
            );
            Ok(())
        }
        Command::Digest => {
            let runner = build_runner(&config, Arc::new(open_repo(&config).await?), true)?;
            let report = runner.run_digest(Utc::now()).await?;
            println!(
                "{} clusters from {} items: {} created, {} reused, {} skipped, {} failed",
                report.clusters,
                report.candidates,
                report.created,
                report.reused,
                report.skipped,
                report.failed
            );
            Ok(())
        }
        Command::Cleanup => {
            let runner = build_runner(&config, Arc::new(open_repo(&config).await?), false)?;
            let deleted = runner.run_cleanup(Utc::now()).await?;
            println!("Deleted {deleted} items");
            Ok(())
        }
        Command::AddSource { url, no_digest } => {
            let repo = open_repo(&config).await?;
            let fetcher = FeedFetcher::new(Duration::from_secs(config.http_timeout_secs))?;
            let source = fetcher.discover_source(&url, !no_digest).await?;
            let title = source.title.clone();
            let id = repo.insert_source(source).await?;
            println!("Added source {id}: {title}");
            Ok(())
        }
        Command::Settings(args) => update_settings(&open_repo(&config).await?, args).await,
        Command::Page {
            session,
            cursor,
            limit,
            unread,
        } => {
            let tracker = IssuanceTracker::new(
                Arc::new(open_repo(&config).await?),
                Arc::new(InMemoryIssuanceStore::new()),
            );
            for view in tracker.next_page(&session, cursor, limit, unread).await? {
                println!(
                    "[{}] {} ({})",
                    view.entry.id,
                    view.entry.published_at.format("%Y-%m-%d %H:%M"),
                    view.entry.link
                );
                println!("  {}", view.entry.synopsis);
                for item in view.items {
                    println!("  - {} [{}] {}", item.title, item.source_title, item.link);
                }
            }
            Ok(())
        }
        Command::MarkRead { id, unread } => {
            open_repo(&config).await?.mark_digest_read(id, !unread).await
        }
    }
}

async fn open_repo(config: &Config) -> Result<Repository> {
    Repository::new(&config.db_path).await
}

async fn run_scheduler(config: &Config) -> Result<()> {
    let mut lease = PidFileLease::new(&config.lock_path);
    if !lease.acquire()? {
        tracing::error!(
            "Another scheduler instance is already running (lock file {})",
            lease.path().display()
        );
        std::process::exit(1);
    }

    let repo = Arc::new(open_repo(config).await?);
    let wake = Arc::new(Notify::new());
    let runner = Arc::new(build_runner(config, Arc::clone(&repo), true)?.with_wake(Arc::clone(&wake)));
    let timetable = Arc::new(Mutex::new(JobTimetable::new(runner.job_book()).await?));

    let reconciler = ReconciliationLoop::new(
        repo,
        timetable,
        Box::new(lease),
        Duration::from_secs(config.poll_interval_secs),
        wake,
    );
    reconciler.run(shutdown_on(tokio::signal::ctrl_c())).await
}

fn build_runner(config: &Config, repo: Arc<Repository>, needs_llm: bool) -> Result<JobRunner> {
    let api_key = match (&config.llm_api_key, needs_llm) {
        (Some(key), _) => key.clone(),
        (None, false) => String::new(),
        (None, true) => {
            return Err(AppError::Config(format!(
                "llm_api_key is not set in {}",
                Config::config_path().display()
            )))
        }
    };
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let chat = Arc::new(ChatClient::new(&config.llm_base_url, api_key, timeout)?);
    let fetcher = Arc::new(ContentFetcher::new(timeout)?);
    let translator: Arc<dyn Translator> = Arc::new(LlmTranslator::new(
        Arc::clone(&chat),
        config.summary_model.clone(),
    ));

    let pipeline = DigestPipeline::new(
        Arc::clone(&repo),
        SimilarityClusterer::new(
            Arc::new(LlmSimilarity::new(Arc::clone(&chat), config.similarity_model.clone())),
            fetcher.clone(),
        )
        .with_title_cap(config.candidate_cap),
        ClusterSummarizer::new(
            fetcher,
            Arc::new(LlmSummarizer::new(chat, config.summary_model.clone())),
        ),
        DigestPersister::new(Arc::clone(&repo), Some(translator)),
    );

    Ok(JobRunner::new(repo, FeedFetcher::new(timeout)?, pipeline))
}

async fn update_settings(repo: &Repository, args: SettingsArgs) -> Result<()> {
    if let Some(minutes) = args.sync_interval {
        if minutes == 0 {
            return Err(AppError::Config("sync interval must be at least one minute".into()));
        }
        repo.set_sync_interval(minutes).await?;
    }
    if let Some(days) = args.clean_after_days {
        repo.set_clean_after_days(days).await?;
    }
    if let Some(offset) = args.utc_offset {
        if offset.abs() >= 24 * 60 {
            return Err(AppError::Config(format!("UTC offset out of range: {offset}")));
        }
        repo.set_utc_offset(offset).await?;
    }

    let state = repo.load_schedule_state().await?;
    let now = Utc::now();
    if let Some(time) = &args.digest_time {
        let time = NaiveTime::parse_from_str(time, "%H:%M")
            .map_err(|e| AppError::Config(format!("invalid digest time {time:?}: {e}")))?;
        repo.set_digest_at(next_occurrence(time, state.timezone(), now)).await?;
    } else if args.enable_digest && state.digest_at.is_none() {
        repo.set_digest_at(state.digest_target(now)).await?;
    }
    if args.enable_digest {
        repo.set_digest_enabled(true).await?;
    } else if args.disable_digest {
        repo.set_digest_enabled(false).await?;
    }

    let mut settings = repo.load_digest_settings().await?;
    let before = settings.clone();
    if let Some(hours) = args.lookback_hours {
        settings.lookback_hours = hours;
    }
    if let Some(include_read) = args.include_read {
        settings.include_read = include_read;
    }
    if let Some(compare_titles) = args.compare_titles {
        settings.compare_titles = compare_titles;
    }
    if let Some(translate) = args.translate {
        settings.translate = translate;
    }
    if let Some(language) = args.language {
        settings.language = language;
    }
    if settings != before {
        repo.update_digest_settings(settings.clone()).await?;
    }

    let state = repo.load_schedule_state().await?;
    let tz = state.timezone();
    println!("sync every {} min, keep {} days", state.sync_interval_minutes, state.clean_after_days);
    println!("utc offset {} min", state.utc_offset_minutes);
    match state.last_sync {
        Some(at) => println!("last sync {}", at.with_timezone(&tz)),
        None => println!("never synced"),
    }
    println!(
        "digest {}{}",
        if state.digest_enabled { "enabled" } else { "disabled" },
        state
            .digest_at
            .map(|at| format!(", next due {}", at.with_timezone(&tz)))
            .unwrap_or_default()
    );
    if let Some(minutes) = state.digest_duration_minutes {
        println!("last digest run took {minutes} min");
    }
    println!(
        "lookback {} h, include read {}, compare titles {}, translate {} ({})",
        settings.lookback_hours,
        settings.include_read,
        settings.compare_titles,
        settings.translate,
        settings.language
    );
    Ok(())
}
