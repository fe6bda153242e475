//! Job worker that claims due jobs from the queue and runs their handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, Notify, RwLock};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use versebank_core::{defaults, Error, Job, JobRepository, JobType, Result};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::DEFAULT_POLL_INTERVAL_MS;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Per-job execution limit in seconds.
    pub job_timeout_secs: u64,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            job_timeout_secs: defaults::JOB_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `JOB_MAX_CONCURRENT` | `1` | Max concurrent jobs |
    /// | `JOB_POLL_INTERVAL_MS` | `500` | Polling interval when queue is empty |
    /// | `JOB_TIMEOUT_SECS` | `300` | Per-job execution limit |
    pub fn from_env() -> Self {
        let enabled = std::env::var("JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        let job_timeout_secs = std::env::var("JOB_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_TIMEOUT_SECS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            job_timeout_secs,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent jobs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    /// Set the per-job execution limit.
    pub fn with_job_timeout(mut self, secs: u64) -> Self {
        self.job_timeout_secs = secs;
        self
    }

    /// Enable or disable job processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A job was started.
    JobStarted { job_id: Uuid, job_type: JobType },
    /// Job progress was updated.
    JobProgress {
        job_id: Uuid,
        percent: i32,
        message: Option<String>,
    },
    /// A job completed successfully.
    JobCompleted { job_id: Uuid, job_type: JobType },
    /// A job failed.
    JobFailed {
        job_id: Uuid,
        job_type: JobType,
        error: String,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down once in-flight jobs finish.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

type HandlerMap = Arc<RwLock<HashMap<JobType, Arc<dyn JobHandler>>>>;

/// Job worker that processes jobs from the queue.
pub struct JobWorker {
    jobs: Arc<dyn JobRepository>,
    notify: Option<Arc<Notify>>,
    config: WorkerConfig,
    handlers: HandlerMap,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    /// Create a new job worker.
    pub fn new(jobs: Arc<dyn JobRepository>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            jobs,
            notify: None,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Wake from the idle sleep as soon as `notify` fires.
    pub fn with_notify(mut self, notify: Arc<Notify>) -> Self {
        self.notify = Some(notify);
        self
    }

    /// Register a handler for a job type.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let job_type = handler.job_type();
        let mut handlers = self.handlers.write().await;
        handlers.insert(job_type, Arc::new(handler));
        debug!(?job_type, "Registered job handler");
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Claim up to `max_concurrent_jobs` due jobs, run them to completion,
    /// and repeat. Sleeps only when nothing is due.
    #[instrument(skip(self, shutdown_rx), fields(subsystem = "jobs", component = "worker"))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            job_timeout_secs = self.config.job_timeout_secs,
            "Job worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        while shutdown_rx.try_recv().is_err() {
            let mut batch = self.claim_batch().await;
            if batch.is_empty() {
                if !self.wait_for_work(shutdown_rx).await {
                    break;
                }
                continue;
            }

            debug!(claimed = batch.len(), "Running claimed jobs");
            while let Some(joined) = batch.join_next().await {
                if let Err(e) = joined {
                    error!(error = ?e, "Job task panicked");
                }
            }
        }

        info!("Job worker stopped");
        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
    }

    /// Claim and spawn due jobs, at most `max_concurrent_jobs` of them.
    async fn claim_batch(&self) -> JoinSet<()> {
        let mut batch = JoinSet::new();
        let job_types: Vec<JobType> = self.handlers.read().await.keys().copied().collect();
        if job_types.is_empty() {
            return batch;
        }

        while batch.len() < self.config.max_concurrent_jobs {
            let job = match self.jobs.claim_next_for_types(&job_types).await {
                Ok(Some(job)) => job,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, error_kind = e.kind(), "Failed to claim job");
                    break;
                }
            };
            let runner = self.runner();
            batch.spawn(runner.run(job));
        }
        batch
    }

    /// Idle until the poll interval elapses or an enqueue is signalled.
    /// Returns false when shutdown was requested instead.
    async fn wait_for_work(&self, shutdown_rx: &mut mpsc::Receiver<()>) -> bool {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let enqueued = async {
            match &self.notify {
                Some(notify) => notify.notified().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Job worker received shutdown signal");
                false
            }
            _ = sleep(poll_interval) => true,
            _ = enqueued => {
                debug!("Woken by enqueue");
                true
            }
        }
    }

    fn runner(&self) -> JobRunner {
        JobRunner {
            jobs: self.jobs.clone(),
            handlers: self.handlers.clone(),
            event_tx: self.event_tx.clone(),
            job_timeout: Duration::from_secs(self.config.job_timeout_secs),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Jobs waiting in the queue, due or not.
    pub async fn pending_count(&self) -> Result<i64> {
        self.jobs.pending_count().await
    }
}

/// Runs one claimed job on its own task and records the outcome.
struct JobRunner {
    jobs: Arc<dyn JobRepository>,
    handlers: HandlerMap,
    event_tx: broadcast::Sender<WorkerEvent>,
    job_timeout: Duration,
}

impl JobRunner {
    #[instrument(
        skip(self, job),
        fields(subsystem = "jobs", component = "worker", job_id = %job.id, job_type = %job.job_type)
    )]
    async fn run(self, job: Job) {
        let start = Instant::now();
        let (job_id, job_type) = (job.id, job.job_type);

        info!("Processing job");
        let _ = self
            .event_tx
            .send(WorkerEvent::JobStarted { job_id, job_type });

        let result = self.invoke(job).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            JobResult::Success(data) => match self.jobs.complete(job_id, data).await {
                Ok(()) => {
                    info!(duration_ms, "Job completed");
                    let _ = self
                        .event_tx
                        .send(WorkerEvent::JobCompleted { job_id, job_type });
                }
                Err(e) => error!(error = %e, "Failed to mark job as completed"),
            },
            JobResult::Failed(error) => match self.jobs.fail(job_id, &error).await {
                Ok(()) => {
                    warn!(%error, duration_ms, "Job failed");
                    let _ = self.event_tx.send(WorkerEvent::JobFailed {
                        job_id,
                        job_type,
                        error,
                    });
                }
                Err(e) => error!(error = %e, "Failed to mark job as failed"),
            },
        }
    }

    /// Hand the job to its handler under the execution limit.
    async fn invoke(&self, job: Job) -> JobResult {
        let (job_id, job_type) = (job.id, job.job_type);
        let Some(handler) = self.handlers.read().await.get(&job_type).cloned() else {
            warn!("No handler registered for job type");
            return JobResult::Failed(format!("No handler for job type: {}", job_type));
        };

        let event_tx = self.event_tx.clone();
        let jobs = self.jobs.clone();
        let ctx = JobContext::new(job).with_progress_callback(move |percent, message| {
            let message = message.map(String::from);
            let jobs = jobs.clone();
            let persisted = message.clone();
            tokio::spawn(async move {
                if let Err(e) = jobs
                    .update_progress(job_id, percent, persisted.as_deref())
                    .await
                {
                    debug!(%job_id, error = %e, "Failed to persist job progress");
                }
            });
            let _ = event_tx.send(WorkerEvent::JobProgress {
                job_id,
                percent,
                message,
            });
        });

        match tokio::time::timeout(self.job_timeout, handler.execute(ctx)).await {
            Ok(result) => result,
            Err(_) => {
                let limit = self.job_timeout.as_secs();
                warn!(timeout_secs = limit, "Job timed out");
                JobResult::Failed(format!("Job exceeded timeout of {}s", limit))
            }
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    jobs: Arc<dyn JobRepository>,
    notify: Option<Arc<Notify>>,
    config: WorkerConfig,
    handlers: Vec<Box<dyn JobHandler>>,
}

impl WorkerBuilder {
    /// Create a new worker builder.
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self {
            jobs,
            notify: None,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
        }
    }

    /// Set the worker configuration.
    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Wake the worker whenever `notify` fires instead of waiting out the
    /// poll interval.
    pub fn with_notify(mut self, notify: Arc<Notify>) -> Self {
        self.notify = Some(notify);
        self
    }

    /// Add a handler.
    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Build and return the worker.
    pub async fn build(self) -> JobWorker {
        let mut worker = JobWorker::new(self.jobs, self.config);
        if let Some(notify) = self.notify {
            worker = worker.with_notify(notify);
        }

        {
            let mut handlers = worker.handlers.write().await;
            for handler in self.handlers {
                handlers.insert(handler.job_type(), Arc::from(handler));
            }
        }

        worker
    }
}
