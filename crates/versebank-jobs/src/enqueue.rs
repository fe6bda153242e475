//! Entry points that start a pipeline chain.
//!
//! Arguments are validated here so a bad request is refused up front
//! instead of surfacing later as a failed job.

use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use versebank_core::{
    JobScheduler, JobType, ProcessSongBatchArgs, Result, UnprocessSongBatchArgs,
};

/// Queue the first `process_song_batch` invocation.
pub async fn enqueue_process_song_batch(
    scheduler: &dyn JobScheduler,
    args: ProcessSongBatchArgs,
) -> Result<Uuid> {
    args.validate()?;
    let id = scheduler
        .run_after(
            Duration::ZERO,
            JobType::ProcessSongBatch,
            Some(serde_json::to_value(args)?),
        )
        .await?;
    info!(
        subsystem = "jobs",
        job_id = %id,
        limit = args.limit,
        min_views = args.min_views,
        recursive = args.recursive,
        "Queued process_song_batch"
    );
    Ok(id)
}

/// Queue the first `unprocess_song_batch` invocation.
pub async fn enqueue_unprocess_song_batch(
    scheduler: &dyn JobScheduler,
    args: UnprocessSongBatchArgs,
) -> Result<Uuid> {
    args.validate()?;
    let id = scheduler
        .run_after(
            Duration::ZERO,
            JobType::UnprocessSongBatch,
            Some(serde_json::to_value(args)?),
        )
        .await?;
    info!(
        subsystem = "jobs",
        job_id = %id,
        limit = args.limit,
        recursive = args.recursive,
        "Queued unprocess_song_batch"
    );
    Ok(id)
}

/// Queue the first `clear_all` invocation.
pub async fn enqueue_clear_all(scheduler: &dyn JobScheduler) -> Result<Uuid> {
    let id = scheduler
        .run_after(Duration::ZERO, JobType::ClearAll, None)
        .await?;
    info!(subsystem = "jobs", job_id = %id, "Queued clear_all");
    Ok(id)
}
