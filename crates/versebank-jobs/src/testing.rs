//! In-memory store and queue used to drive handlers and the worker in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use versebank_core::{
    new_v7, CommitSummary, Error, Job, JobRepository, JobStatus, JobType, PipelineStore,
    QueueStats, Result, SongVerses, TeardownSummary, UnprocessedSong, Vector,
};

/// A pending job with the given type and payload.
pub fn job_fixture(job_type: JobType, payload: Option<JsonValue>) -> Job {
    let now = Utc::now();
    Job {
        id: new_v7(),
        job_type,
        status: JobStatus::Pending,
        priority: job_type.default_priority(),
        payload,
        result: None,
        error_message: None,
        progress_percent: 0,
        progress_message: None,
        retry_count: 0,
        max_retries: 0,
        run_at: now,
        created_at: now,
        started_at: None,
        completed_at: None,
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

#[derive(Debug, Clone)]
pub struct MemSong {
    pub genius_views: i64,
    pub lyrics: String,
    pub processed: bool,
}

#[derive(Debug, Clone)]
pub struct StoredVerse {
    pub text: String,
    pub embedding: Vector,
    pub model: String,
}

#[derive(Default)]
struct StoreState {
    songs: BTreeMap<Uuid, MemSong>,
    verses: HashMap<Uuid, Vec<StoredVerse>>,
}

/// `PipelineStore` over a mutex-guarded map with the same commit and
/// teardown semantics as the PostgreSQL store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_song(&self, genius_views: i64, lyrics: &str) -> Uuid {
        let id = new_v7();
        self.state.lock().unwrap().songs.insert(
            id,
            MemSong {
                genius_views,
                lyrics: lyrics.to_string(),
                processed: false,
            },
        );
        id
    }

    pub fn song(&self, id: Uuid) -> Option<MemSong> {
        self.state.lock().unwrap().songs.get(&id).cloned()
    }

    pub fn song_count(&self) -> usize {
        self.state.lock().unwrap().songs.len()
    }

    pub fn processed_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .songs
            .values()
            .filter(|s| s.processed)
            .count()
    }

    pub fn verses(&self, song_id: Uuid) -> Vec<StoredVerse> {
        self.state
            .lock()
            .unwrap()
            .verses
            .get(&song_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn verse_count(&self) -> usize {
        self.state.lock().unwrap().verses.values().map(Vec::len).sum()
    }

    /// Make every following commit fail before touching any state.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn take_page(ids: impl Iterator<Item = Uuid>, limit: i64) -> Vec<Uuid> {
        if limit <= 0 {
            return Vec::new();
        }
        ids.take(limit as usize).collect()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn select_unprocessed(
        &self,
        limit: i64,
        min_views: i64,
    ) -> Result<Vec<UnprocessedSong>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let state = self.state.lock().unwrap();
        let mut page: Vec<(i64, Uuid, String)> = state
            .songs
            .iter()
            .filter(|(_, s)| !s.processed && s.genius_views >= min_views)
            .map(|(id, s)| (s.genius_views, *id, s.lyrics.clone()))
            .collect();
        page.sort_by_key(|(views, id, _)| (*views, *id));
        Ok(page
            .into_iter()
            .take(limit as usize)
            .map(|(_, id, lyrics)| UnprocessedSong { id, lyrics })
            .collect())
    }

    async fn select_processed(&self, limit: i64) -> Result<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(Self::take_page(
            state
                .songs
                .iter()
                .filter(|(_, s)| s.processed)
                .map(|(id, _)| *id),
            limit,
        ))
    }

    async fn select_any(&self, limit: i64) -> Result<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(Self::take_page(state.songs.keys().copied(), limit))
    }

    async fn commit_verses(&self, batch: &[SongVerses], model: &str) -> Result<CommitSummary> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::Internal("commit rejected by test store".to_string()));
        }

        let mut state = self.state.lock().unwrap();
        let mut summary = CommitSummary::default();
        for song in batch {
            match state.songs.get_mut(&song.song_id) {
                Some(stored) if !stored.processed => stored.processed = true,
                _ => {
                    summary.songs_skipped += 1;
                    continue;
                }
            }
            let rows = state.verses.entry(song.song_id).or_default();
            for (text, embedding) in &song.verses {
                rows.push(StoredVerse {
                    text: text.clone(),
                    embedding: embedding.clone(),
                    model: model.to_string(),
                });
            }
            summary.songs_committed += 1;
            summary.verses_written += song.verses.len();
        }
        Ok(summary)
    }

    async fn unprocess_songs(&self, song_ids: &[Uuid]) -> Result<TeardownSummary> {
        let mut state = self.state.lock().unwrap();
        let mut summary = TeardownSummary::default();
        for id in song_ids {
            summary.verses_deleted += state.verses.remove(id).map_or(0, |v| v.len());
            if let Some(song) = state.songs.get_mut(id) {
                if song.processed {
                    song.processed = false;
                    summary.songs_affected += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn clear_songs(&self, song_ids: &[Uuid]) -> Result<TeardownSummary> {
        let mut state = self.state.lock().unwrap();
        let mut summary = TeardownSummary::default();
        for id in song_ids {
            summary.verses_deleted += state.verses.remove(id).map_or(0, |v| v.len());
            if state.songs.remove(id).is_some() {
                summary.songs_affected += 1;
            }
        }
        Ok(summary)
    }
}

// =============================================================================
// MemoryJobQueue
// =============================================================================

/// `JobRepository` over a vector, claiming in the same order as the
/// PostgreSQL queue.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<Job>>,
    reject_enqueue: AtomicBool,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn pending_of(&self, job_type: JobType) -> Vec<Job> {
        self.jobs()
            .into_iter()
            .filter(|j| j.job_type == job_type && j.status == JobStatus::Pending)
            .collect()
    }

    /// Make every following enqueue fail.
    pub fn set_reject_enqueue(&self, reject: bool) {
        self.reject_enqueue.store(reject, Ordering::SeqCst);
    }

    fn update<F: FnOnce(&mut Job)>(&self, job_id: Uuid, f: F) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| Error::NotFound(format!("Job {}", job_id)))?;
        f(job);
        Ok(())
    }
}

#[async_trait]
impl JobRepository for MemoryJobQueue {
    async fn queue(
        &self,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        self.queue_after(Duration::ZERO, job_type, priority, payload)
            .await
    }

    async fn queue_after(
        &self,
        delay: Duration,
        job_type: JobType,
        priority: i32,
        payload: Option<JsonValue>,
    ) -> Result<Uuid> {
        if self.reject_enqueue.load(Ordering::SeqCst) {
            return Err(Error::Job("queue unavailable".to_string()));
        }
        let mut job = job_fixture(job_type, payload);
        job.priority = priority;
        job.run_at = job.created_at + chrono::Duration::from_std(delay).unwrap();
        let id = job.id;
        self.jobs.lock().unwrap().push(job);
        Ok(id)
    }

    async fn claim_next_for_types(&self, job_types: &[JobType]) -> Result<Option<Job>> {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().unwrap();
        let next = jobs
            .iter_mut()
            .filter(|j| j.status == JobStatus::Pending && j.run_at <= now)
            .filter(|j| job_types.is_empty() || job_types.contains(&j.job_type))
            .fold(None::<&mut Job>, |best, j| match best {
                Some(b) if b.priority >= j.priority => Some(b),
                _ => Some(j),
            });
        Ok(next.map(|job| {
            job.status = JobStatus::Running;
            job.started_at = Some(now);
            job.clone()
        }))
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        percent: i32,
        message: Option<&str>,
    ) -> Result<()> {
        self.update(job_id, |j| {
            if j.status == JobStatus::Running {
                j.progress_percent = percent.clamp(0, 100);
                j.progress_message = message.map(String::from);
            }
        })
    }

    async fn complete(&self, job_id: Uuid, result: Option<JsonValue>) -> Result<()> {
        self.update(job_id, |j| {
            j.status = JobStatus::Completed;
            j.result = result;
            j.progress_percent = 100;
            j.completed_at = Some(Utc::now());
        })
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> Result<()> {
        self.update(job_id, |j| {
            j.error_message = Some(error.to_string());
            if j.retry_count < j.max_retries {
                j.retry_count += 1;
                j.status = JobStatus::Pending;
                j.started_at = None;
            } else {
                j.status = JobStatus::Failed;
                j.completed_at = Some(Utc::now());
            }
        })
    }

    async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs().into_iter().find(|j| j.id == job_id))
    }

    async fn pending_count(&self) -> Result<i64> {
        Ok(self
            .jobs()
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count() as i64)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Job>> {
        Ok(self
            .jobs()
            .into_iter()
            .rev()
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let jobs = self.jobs();
        let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count() as i64;
        Ok(QueueStats {
            pending: count(JobStatus::Pending),
            running: count(JobStatus::Running),
            completed_last_hour: count(JobStatus::Completed),
            failed_last_hour: count(JobStatus::Failed),
            total: jobs.len() as i64,
        })
    }

    async fn cleanup(&self, older_than_days: i64) -> Result<i64> {
        let cutoff = Utc::now() - chrono::Duration::days(older_than_days);
        let mut jobs = self.jobs.lock().unwrap();
        let before = jobs.len();
        jobs.retain(|j| !(j.status.is_terminal() && j.completed_at.is_some_and(|t| t < cutoff)));
        Ok((before - jobs.len()) as i64)
    }
}
