//! # versebank-jobs
//!
//! The verse pipeline as self-rescheduling background jobs.
//!
//! This crate provides:
//! - `process_song_batch`: segment, embed, and commit a batch of songs
//! - `unprocess_song_batch` and `clear_all`: paged teardown
//! - Enqueue helpers that validate arguments before a job is queued
//! - A polling job worker with event broadcasting and graceful shutdown
//!
//! Each invocation handles one bounded batch and, when there may be more
//! work, queues its own successor. A failed invocation queues nothing, so
//! the chain stops there.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use versebank_db::Database;
//! use versebank_jobs::{ProcessSongBatchHandler, WorkerBuilder, WorkerConfig};
//!
//! let db = Database::connect("postgres://...").await?;
//! let jobs = Arc::new(db.jobs.clone());
//! let embedder = versebank_inference::backend_from_env()?;
//!
//! let worker = WorkerBuilder::new(jobs.clone())
//!     .with_notify(db.jobs.job_notify())
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(ProcessSongBatchHandler::new(
//!         Arc::new(db.pipeline.clone()),
//!         embedder,
//!         jobs,
//!     ))
//!     .build()
//!     .await;
//!
//! let handle = worker.start();
//! handle.shutdown().await?;
//! ```

pub mod enqueue;
pub mod handler;
pub mod process;
pub mod teardown;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

// Re-export core types
pub use versebank_core::*;

pub use enqueue::{enqueue_clear_all, enqueue_process_song_batch, enqueue_unprocess_song_batch};
pub use handler::{JobContext, JobHandler, JobResult};
pub use process::{ProcessOutcome, ProcessSongBatchHandler};
pub use teardown::{ClearAllHandler, TeardownOutcome, UnprocessSongBatchHandler};
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};

/// Default polling interval for job processing (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = versebank_core::defaults::JOB_POLL_INTERVAL_MS;
