//! versebank: operator command line for the verse pipeline.
//!
//! Ingests songs, queues the process/unprocess/clear chains, runs the job
//! worker, and reports corpus and queue state.

mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use versebank_core::{defaults, EmbeddingBackend};
use versebank_db::{
    Database, JobRepository, NewSong, PoolConfig, ProcessSongBatchArgs, SongRepository,
    UnprocessSongBatchArgs,
};
use versebank_jobs::{
    enqueue_clear_all, enqueue_process_song_batch, enqueue_unprocess_song_batch,
    ClearAllHandler, ProcessSongBatchHandler, UnprocessSongBatchHandler, WorkerBuilder,
    WorkerConfig, WorkerEvent,
};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/versebank";

/// Upper bound on waiting for in-flight jobs after Ctrl-C.
const SHUTDOWN_GRACE_SECS: u64 = 30;

#[derive(Parser, Debug)]
#[command(name = "versebank")]
#[command(author, version, about = "Verse extraction and embedding pipeline")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection URL (falls back to DATABASE_URL)
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert songs from a JSON array file, skipping known geniusIds
    AddBatch {
        /// JSON file holding an array of songs
        file: PathBuf,
    },

    /// Queue the process chain (segment, embed, commit)
    Process {
        /// Songs per invocation
        #[arg(long, default_value_t = defaults::BATCH_LIMIT)]
        limit: i64,

        /// Only process songs with at least this many views
        #[arg(long, default_value_t = defaults::BATCH_MIN_VIEWS)]
        min_views: i64,

        /// Run a single invocation without queueing a successor
        #[arg(long)]
        no_recursive: bool,

        /// Run one invocation in this process instead of queueing it
        #[arg(long)]
        inline: bool,
    },

    /// Queue the unprocess chain (delete verses, reset processed flags)
    Unprocess {
        /// Songs per invocation
        #[arg(long, default_value_t = defaults::BATCH_LIMIT)]
        limit: i64,

        /// Run a single invocation without queueing a successor
        #[arg(long)]
        no_recursive: bool,

        /// Run one invocation in this process instead of queueing it
        #[arg(long)]
        inline: bool,
    },

    /// Queue deletion of every song and verse
    ClearAll {
        /// Run one invocation in this process instead of queueing it
        #[arg(long)]
        inline: bool,
    },

    /// Run the job worker until Ctrl-C
    Worker,

    /// Show corpus counts and queue statistics
    Status,

    /// List recent jobs
    Jobs {
        /// Number of jobs to show
        #[arg(long, default_value_t = defaults::JOB_LIST_LIMIT)]
        limit: i64,
    },

    /// Delete finished jobs older than the retention window
    PruneJobs {
        /// Retention window in days
        #[arg(long, default_value_t = defaults::JOB_RETENTION_DAYS)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cli = Cli::parse();

    let db = Database::connect_with_config(&cli.database_url, PoolConfig::from_env())
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("failed to run migrations")?;

    match cli.command {
        Commands::AddBatch { file } => add_batch(&db, &file).await,
        Commands::Process {
            limit,
            min_views,
            no_recursive,
            inline,
        } => {
            let args = ProcessSongBatchArgs {
                limit,
                min_views,
                recursive: !no_recursive,
            };
            process(&db, args, inline).await
        }
        Commands::Unprocess {
            limit,
            no_recursive,
            inline,
        } => {
            let args = UnprocessSongBatchArgs {
                limit,
                recursive: !no_recursive,
            };
            unprocess(&db, args, inline).await
        }
        Commands::ClearAll { inline } => clear_all(&db, inline).await,
        Commands::Worker => run_worker(&db).await,
        Commands::Status => status(&db).await,
        Commands::Jobs { limit } => list_jobs(&db, limit).await,
        Commands::PruneJobs { days } => {
            let removed = db.jobs.cleanup(days).await?;
            println!("removed {} jobs older than {} days", removed, days);
            Ok(())
        }
    }
}

/// Parse a JSON array of songs with camelCase keys.
fn parse_songs(json: &str) -> anyhow::Result<Vec<NewSong>> {
    serde_json::from_str(json).context("expected a JSON array of songs")
}

async fn add_batch(db: &Database, file: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let songs = parse_songs(&raw).with_context(|| format!("invalid song file {}", file.display()))?;

    let outcome = db.songs.add_batch(&songs).await?;
    println!(
        "inserted {}, skipped {} (of {})",
        outcome.inserted,
        outcome.skipped,
        songs.len()
    );
    Ok(())
}

async fn process(db: &Database, args: ProcessSongBatchArgs, inline: bool) -> anyhow::Result<()> {
    if inline {
        let jobs = Arc::new(db.jobs.clone());
        let handler = ProcessSongBatchHandler::new(
            Arc::new(db.pipeline.clone()),
            versebank_inference::backend_from_env()?,
            jobs,
        );
        let outcome = handler.run(args).await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let id = enqueue_process_song_batch(&db.jobs, args).await?;
        println!("queued process_song_batch job {}", id);
    }
    Ok(())
}

async fn unprocess(
    db: &Database,
    args: UnprocessSongBatchArgs,
    inline: bool,
) -> anyhow::Result<()> {
    if inline {
        let handler = UnprocessSongBatchHandler::new(
            Arc::new(db.pipeline.clone()),
            Arc::new(db.jobs.clone()),
        );
        let outcome = handler.run(args).await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let id = enqueue_unprocess_song_batch(&db.jobs, args).await?;
        println!("queued unprocess_song_batch job {}", id);
    }
    Ok(())
}

async fn clear_all(db: &Database, inline: bool) -> anyhow::Result<()> {
    if inline {
        let handler = ClearAllHandler::new(Arc::new(db.pipeline.clone()), Arc::new(db.jobs.clone()));
        let outcome = handler.run().await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let id = enqueue_clear_all(&db.jobs).await?;
        println!("queued clear_all job {}", id);
    }
    Ok(())
}

async fn run_worker(db: &Database) -> anyhow::Result<()> {
    let embedder = versebank_inference::backend_from_env()?;
    info!(
        model = embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedding backend ready"
    );

    let jobs = Arc::new(db.jobs.clone());
    let store = Arc::new(db.pipeline.clone());
    let worker = WorkerBuilder::new(jobs.clone())
        .with_notify(db.jobs.job_notify())
        .with_config(WorkerConfig::from_env())
        .with_handler(ProcessSongBatchHandler::new(
            store.clone(),
            embedder,
            jobs.clone(),
        ))
        .with_handler(UnprocessSongBatchHandler::new(store.clone(), jobs.clone()))
        .with_handler(ClearAllHandler::new(store, jobs))
        .build()
        .await;

    let pending = worker.pending_count().await?;
    info!(pending, "Starting job worker");

    let handle = worker.start();
    let mut events = handle.events();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested, waiting for in-flight jobs");
    handle.shutdown().await?;

    let stopped = tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), async {
        loop {
            match events.recv().await {
                Ok(WorkerEvent::WorkerStopped) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if stopped.is_err() {
        warn!(
            grace_secs = SHUTDOWN_GRACE_SECS,
            "Worker did not stop in time, exiting anyway"
        );
    }
    Ok(())
}

async fn status(db: &Database) -> anyhow::Result<()> {
    versebank_db::log_pool_metrics(&db.pool);
    let corpus = db.songs.stats().await?;
    let queue = db.jobs.queue_stats().await?;

    println!("songs:              {}", corpus.total_songs);
    println!("  processed:        {}", corpus.processed_songs);
    println!("  unprocessed:      {}", corpus.unprocessed_songs);
    println!("verses:             {}", corpus.total_verses);
    println!("jobs pending:       {}", queue.pending);
    println!("jobs running:       {}", queue.running);
    println!("completed (1h):     {}", queue.completed_last_hour);
    println!("failed (1h):        {}", queue.failed_last_hour);
    Ok(())
}

async fn list_jobs(db: &Database, limit: i64) -> anyhow::Result<()> {
    for job in db.jobs.list_recent(limit).await? {
        let detail = match (&job.error_message, &job.result) {
            (Some(error), _) => error.clone(),
            (None, Some(result)) => result.to_string(),
            (None, None) => String::new(),
        };
        println!(
            "{}  {:<22} {:<9} {}  {}",
            job.id,
            job.job_type.as_str(),
            job.status.as_str(),
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            detail
        );
    }
    Ok(())
}
