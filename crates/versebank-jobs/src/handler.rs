//! Job handler trait and the context handed to each invocation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use versebank_core::{Error, Job, JobType, Result};

/// Progress callback type for job handlers.
pub type ProgressCallback = Box<dyn Fn(i32, Option<&str>) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: Job,
    /// Progress callback for updating job progress.
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: Job) -> Self {
        Self {
            job,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i32, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Report progress to the callback.
    pub fn report_progress(&self, percent: i32, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(percent, message);
        }
    }

    /// Get the job payload.
    pub fn payload(&self) -> Option<&JsonValue> {
        self.job.payload.as_ref()
    }

    /// Decode the payload into job arguments. A missing payload yields the
    /// arguments' defaults; missing fields take their serde defaults.
    pub fn parse_args<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match self.payload() {
            None | Some(JsonValue::Null) => Ok(T::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                Error::InvalidInput(format!(
                    "Invalid {} payload: {}",
                    self.job.job_type, e
                ))
            }),
        }
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed with an error message.
    Failed(String),
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job type this handler processes.
    fn job_type(&self) -> JobType;

    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;

    /// Check if this handler can process the given job type.
    fn can_handle(&self, job_type: JobType) -> bool {
        self.job_type() == job_type
    }
}
