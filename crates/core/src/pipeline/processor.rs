//! Job pipeline implementation.

use chrono::Utc;
use futures::FutureExt;
use reqwest::Url;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::{remove_quietly, JobWorkspace, TempArtifact};
use crate::credentials::CookieStore;
use crate::fetcher::Fetcher;
use crate::metrics::{
    CLEANUP_FAILURES, FETCH_DURATION, JOBS_FINISHED, JOBS_REJECTED, JOBS_SUBMITTED,
};
use crate::transcoder::{OutputFormat, TranscodeError, Transcoder};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::slots::{AdmissionTicket, SlotPool};
use super::types::{
    Artifact, FailureReason, JobCounts, JobId, JobSnapshot, JobState, PipelineStatus, PoolStatus,
};

/// How long `stop` waits for cancelled jobs to wind down.
const STOP_GRACE: Duration = Duration::from_secs(10);

/// Tracks statistics for the pipeline.
#[derive(Default)]
struct PipelineStats {
    total_processed: AtomicU64,
    total_failed: AtomicU64,
    total_rejected: AtomicU64,
}

struct JobRecord {
    snapshot: JobSnapshot,
    /// Present while the job task is alive.
    cancel: Option<watch::Sender<bool>>,
    finished_at: Option<Instant>,
}

type JobTable = Arc<RwLock<HashMap<JobId, JobRecord>>>;

/// Shared handles cloned into every job task.
#[derive(Clone)]
struct JobContext {
    config: Arc<PipelineConfig>,
    credentials: Arc<CookieStore>,
    fetcher: Arc<dyn Fetcher>,
    transcoder: Arc<Transcoder>,
    jobs: JobTable,
    stats: Arc<PipelineStats>,
}

/// Runs jobs through fetch, transcode and delivery with bounded concurrency.
pub struct JobPipeline {
    ctx: JobContext,
    slots: Arc<SlotPool>,
    running: Arc<RwLock<bool>>,
    reaper: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
}

impl JobPipeline {
    /// Creates a new pipeline. Call [`start`](Self::start) before submitting.
    pub fn new(
        config: PipelineConfig,
        credentials: Arc<CookieStore>,
        fetcher: Arc<dyn Fetcher>,
        transcoder: Arc<Transcoder>,
    ) -> Self {
        let slots = SlotPool::new(config.max_concurrent_jobs, config.queue_depth);

        Self {
            ctx: JobContext {
                config: Arc::new(config),
                credentials,
                fetcher,
                transcoder,
                jobs: Arc::new(RwLock::new(HashMap::new())),
                stats: Arc::new(PipelineStats::default()),
            },
            slots,
            running: Arc::new(RwLock::new(false)),
            reaper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.ctx.config
    }

    pub fn credentials(&self) -> &Arc<CookieStore> {
        &self.ctx.credentials
    }

    pub fn transcoder(&self) -> &Arc<Transcoder> {
        &self.ctx.transcoder
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Prepares the working directories and starts accepting jobs.
    ///
    /// Leftover workspaces from a previous process are removed. Calling
    /// `start` on a running pipeline does nothing.
    pub async fn start(&self) -> Result<(), PipelineError> {
        let mut running = self.running.write().await;
        if *running {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.ctx.config.temp_dir).await?;
        tokio::fs::create_dir_all(&self.ctx.config.data_dir).await?;
        let swept = sweep_dir(&self.ctx.config.temp_dir).await?;
        if swept > 0 {
            info!(count = swept, "Removed stale job workspaces");
        }

        let retention = Duration::from_secs(self.ctx.config.result_retention_secs);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_reaper(Arc::clone(&self.ctx.jobs), retention, shutdown_rx);
        *self.reaper.lock().await = Some((shutdown_tx, handle));

        *running = true;
        info!(
            max_concurrent = self.slots.max_concurrent(),
            queue_depth = self.slots.queue_depth(),
            temp_dir = %self.ctx.config.temp_dir.display(),
            data_dir = %self.ctx.config.data_dir.display(),
            "Job pipeline started"
        );
        Ok(())
    }

    /// Stops accepting jobs and cancels the ones still in flight.
    pub async fn stop(&self) {
        *self.running.write().await = false;

        if let Some((shutdown_tx, handle)) = self.reaper.lock().await.take() {
            let _ = shutdown_tx.send(true);
            let _ = handle.await;
        }

        let in_flight = {
            let jobs = self.ctx.jobs.read().await;
            jobs.values()
                .filter(|r| !r.snapshot.state.is_terminal())
                .filter_map(|r| r.cancel.as_ref())
                .map(|tx| tx.send(true))
                .count()
        };

        if in_flight > 0 {
            info!(count = in_flight, "Cancelling in-flight jobs");
            let deadline = Instant::now() + STOP_GRACE;
            while self.has_unfinished_jobs().await && Instant::now() < deadline {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        }

        info!("Job pipeline stopped");
    }

    async fn has_unfinished_jobs(&self) -> bool {
        self.ctx
            .jobs
            .read()
            .await
            .values()
            .any(|r| !r.snapshot.state.is_terminal())
    }

    /// Accepts a job for `url` in `format`.
    ///
    /// Admission is decided before returning: an accepted job holds its place
    /// in the pool, and a full pool fails with [`PipelineError::Saturated`].
    pub async fn submit(&self, url: &str, format: &str) -> Result<JobSnapshot, PipelineError> {
        let result = self.admit(url, format).await;
        if let Err(e) = &result {
            JOBS_REJECTED.with_label_values(&[e.rejection_reason()]).inc();
        }
        result
    }

    async fn admit(&self, url: &str, format: &str) -> Result<JobSnapshot, PipelineError> {
        if !*self.running.read().await {
            return Err(PipelineError::NotRunning);
        }

        let format: OutputFormat = format
            .parse()
            .map_err(|e: TranscodeError| PipelineError::InvalidRequest(e.to_string()))?;
        let url = self
            .ctx
            .fetcher
            .validate_url(url)
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

        let ticket = self.slots.try_admit().ok_or_else(|| {
            self.ctx.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
            warn!(capacity = self.slots.capacity(), "Pipeline saturated, rejecting job");
            PipelineError::Saturated {
                capacity: self.slots.capacity(),
            }
        })?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let snapshot = JobSnapshot {
            id: id.clone(),
            url: url.to_string(),
            format,
            state: JobState::Pending,
            failure: None,
            artifact: None,
            credential_version: None,
            created_at: now,
            updated_at: now,
        };

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.ctx.jobs.write().await.insert(
            id.clone(),
            JobRecord {
                snapshot: snapshot.clone(),
                cancel: Some(cancel_tx),
                finished_at: None,
            },
        );

        JOBS_SUBMITTED.inc();
        info!(job_id = %id, url = %url, format = %format, "Job accepted");

        tokio::spawn(run_job(
            self.ctx.clone(),
            id,
            url,
            format,
            ticket,
            cancel_rx,
        ));

        Ok(snapshot)
    }

    /// Current snapshot of a job.
    pub async fn status(&self, id: &str) -> Result<JobSnapshot, PipelineError> {
        self.ctx
            .jobs
            .read()
            .await
            .get(id)
            .map(|r| r.snapshot.clone())
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    /// The delivered artifact of a finished job.
    pub async fn result(&self, id: &str) -> Result<Artifact, PipelineError> {
        let jobs = self.ctx.jobs.read().await;
        let record = jobs
            .get(id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;

        match (&record.snapshot.state, &record.snapshot.artifact) {
            (JobState::Done, Some(artifact)) => Ok(artifact.clone()),
            (state, _) => Err(PipelineError::NotReady {
                job_id: id.to_string(),
                state: *state,
            }),
        }
    }

    /// Requests cancellation of a job.
    ///
    /// Returns the snapshot at the time of the request. A terminal job is
    /// left untouched.
    pub async fn cancel(&self, id: &str) -> Result<JobSnapshot, PipelineError> {
        let jobs = self.ctx.jobs.read().await;
        let record = jobs
            .get(id)
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;

        if !record.snapshot.state.is_terminal() {
            if let Some(cancel) = &record.cancel {
                let _ = cancel.send(true);
                info!(job_id = %id, state = %record.snapshot.state, "Cancellation requested");
            }
        }

        Ok(record.snapshot.clone())
    }

    /// Snapshots of all known jobs, newest first.
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let mut snapshots: Vec<JobSnapshot> = self
            .ctx
            .jobs
            .read()
            .await
            .values()
            .map(|r| r.snapshot.clone())
            .collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    /// Returns the current pipeline status.
    pub async fn status_summary(&self) -> PipelineStatus {
        let mut counts = JobCounts::default();
        for record in self.ctx.jobs.read().await.values() {
            counts.add(record.snapshot.state);
        }

        let stats = &self.ctx.stats;
        PipelineStatus {
            running: *self.running.read().await,
            pool: PoolStatus {
                active_jobs: self.slots.active(),
                queued_jobs: self.slots.queued(),
                max_concurrent: self.slots.max_concurrent(),
                queue_depth: self.slots.queue_depth(),
                total_processed: stats.total_processed.load(Ordering::Relaxed),
                total_failed: stats.total_failed.load(Ordering::Relaxed),
                total_rejected: stats.total_rejected.load(Ordering::Relaxed),
            },
            jobs: counts,
        }
    }

    /// Forgets finished jobs older than `retention` and deletes their artifacts.
    pub async fn purge_expired(&self, retention: Duration) -> usize {
        purge_expired(&self.ctx.jobs, retention).await
    }
}

impl JobContext {
    fn delivery_path(&self, id: &str, format: OutputFormat) -> std::path::PathBuf {
        self.config
            .data_dir
            .join(format!("{}.{}", id, format.extension()))
    }

    async fn transition(&self, id: &str, next: JobState, credential_version: Option<u64>) {
        let mut jobs = self.jobs.write().await;
        let Some(record) = jobs.get_mut(id) else {
            return;
        };

        let current = record.snapshot.state;
        if !current.can_transition_to(next) {
            warn!(job_id = %id, from = %current, to = %next, "Ignoring invalid state transition");
            return;
        }

        record.snapshot.state = next;
        record.snapshot.updated_at = Utc::now();
        if credential_version.is_some() {
            record.snapshot.credential_version = credential_version;
        }
        debug!(job_id = %id, from = %current, to = %next, "Job state changed");
    }

    /// Fetch, transcode and deliver. Runs while holding a slot.
    async fn process(
        &self,
        id: &str,
        url: &Url,
        format: OutputFormat,
        workspace: &JobWorkspace,
    ) -> Result<Artifact, FailureReason> {
        let credential = self
            .credentials
            .credential()
            .await
            .map_err(|e| FailureReason::from(&e))?;

        self.transition(id, JobState::Fetching, Some(credential.version))
            .await;
        debug!(job_id = %id, credential_version = credential.version, "Fetching source");

        let start = Instant::now();
        let fetched = self
            .fetcher
            .fetch(url, &credential, &workspace.source_path())
            .await;
        FETCH_DURATION
            .with_label_values(&[if fetched.is_ok() { "success" } else { "failed" }])
            .observe(start.elapsed().as_secs_f64());
        let source = fetched.map_err(|e| FailureReason::from(&e))?;

        self.transition(id, JobState::Transcoding, None).await;
        debug!(job_id = %id, bytes = source.size_bytes, format = %format, "Transcoding source");

        let output = self
            .transcoder
            .transcode(&source, format)
            .await
            .map_err(|e| FailureReason::from(&e))?;

        self.deliver(id, format, &output)
            .await
            .map_err(|e| FailureReason::internal(format!("Failed to deliver artifact: {}", e)))
    }

    /// Moves the transcoded output into the data directory.
    async fn deliver(
        &self,
        id: &str,
        format: OutputFormat,
        output: &TempArtifact,
    ) -> std::io::Result<Artifact> {
        let dest = self.delivery_path(id, format);

        if tokio::fs::rename(&output.path, &dest).await.is_err() {
            // Temp and data may live on different filesystems.
            if let Err(e) = tokio::fs::copy(&output.path, &dest).await {
                remove_quietly(&dest).await;
                return Err(e);
            }
        }

        let size_bytes = tokio::fs::metadata(&dest).await?.len();
        Ok(Artifact {
            file_name: format!("{}.{}", id, format.extension()),
            path: dest,
            size_bytes,
            format,
        })
    }

    async fn finish(&self, id: &str, outcome: Result<Artifact, FailureReason>) {
        let mut jobs = self.jobs.write().await;
        let Some(record) = jobs.get_mut(id) else {
            return;
        };
        if record.snapshot.state.is_terminal() {
            warn!(job_id = %id, state = %record.snapshot.state, "Job already finished");
            return;
        }

        match outcome {
            Ok(artifact) => {
                info!(
                    job_id = %id,
                    bytes = artifact.size_bytes,
                    file = %artifact.file_name,
                    "Job done"
                );
                record.snapshot.state = JobState::Done;
                record.snapshot.artifact = Some(artifact);
                self.stats.total_processed.fetch_add(1, Ordering::Relaxed);
                JOBS_FINISHED.with_label_values(&["succeeded"]).inc();
            }
            Err(reason) => {
                warn!(
                    job_id = %id,
                    from = %record.snapshot.state,
                    kind = %reason.kind,
                    message = %reason.message,
                    "Job failed"
                );
                let label = if reason.kind == "cancelled" {
                    "cancelled"
                } else {
                    "failed"
                };
                record.snapshot.state = JobState::Failed;
                record.snapshot.failure = Some(reason);
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                JOBS_FINISHED.with_label_values(&[label]).inc();
            }
        }

        record.snapshot.updated_at = Utc::now();
        record.finished_at = Some(Instant::now());
        record.cancel = None;
    }
}

/// Body of a job task.
///
/// The workspace is removed and the slot released before the terminal state
/// is published.
async fn run_job(
    ctx: JobContext,
    id: JobId,
    url: Url,
    format: OutputFormat,
    ticket: AdmissionTicket,
    mut cancel_rx: watch::Receiver<bool>,
) {
    let permit = tokio::select! {
        biased;
        _ = cancelled(&mut cancel_rx) => Err(FailureReason::cancelled()),
        permit = ticket.acquire() => permit.map_err(|e| FailureReason::internal(e.to_string())),
    };
    let permit = match permit {
        Ok(permit) => permit,
        Err(reason) => {
            ctx.finish(&id, Err(reason)).await;
            return;
        }
    };

    let workspace = match JobWorkspace::create(&ctx.config.temp_dir, &id).await {
        Ok(workspace) => workspace,
        Err(e) => {
            drop(permit);
            let reason = FailureReason::internal(format!("Failed to create workspace: {}", e));
            ctx.finish(&id, Err(reason)).await;
            return;
        }
    };

    let work = AssertUnwindSafe(ctx.process(&id, &url, format, &workspace)).catch_unwind();
    let outcome = tokio::select! {
        biased;
        _ = cancelled(&mut cancel_rx) => Err(FailureReason::cancelled()),
        result = work => result.unwrap_or_else(|_| Err(FailureReason::internal("Job task panicked"))),
    };

    if outcome.is_err() {
        remove_quietly(&ctx.delivery_path(&id, format)).await;
    }
    if !workspace.cleanup().await {
        CLEANUP_FAILURES.inc();
    }
    drop(permit);

    ctx.finish(&id, outcome).await;
}

/// Resolves once cancellation is requested. Never resolves if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn purge_expired(jobs: &JobTable, retention: Duration) -> usize {
    let expired: Vec<(JobId, Option<Artifact>)> = {
        let mut jobs = jobs.write().await;
        let ids: Vec<JobId> = jobs
            .iter()
            .filter(|(_, r)| r.finished_at.is_some_and(|at| at.elapsed() >= retention))
            .map(|(id, _)| id.clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| jobs.remove(&id).map(|r| (id, r.snapshot.artifact)))
            .collect()
    };

    for (id, artifact) in &expired {
        if let Some(artifact) = artifact {
            remove_quietly(&artifact.path).await;
        }
        debug!(job_id = %id, "Purged expired job");
    }
    expired.len()
}

fn reap_interval(retention: Duration) -> Duration {
    Duration::from_secs((retention.as_secs() / 4).clamp(1, 60))
}

fn spawn_reaper(
    jobs: JobTable,
    retention: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(reap_interval(retention));
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = purge_expired(&jobs, retention).await;
                    if purged > 0 {
                        info!(count = purged, "Purged expired jobs");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        debug!("Job reaper stopped");
    })
}

/// Removes everything inside `dir`, returning how many entries went.
async fn sweep_dir(dir: &Path) -> std::io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale entry"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;
    use crate::testing::{fixtures, MockEngine, MockFetcher, MockOutcome};
    use crate::transcoder::TranscoderConfig;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Harness {
        pipeline: JobPipeline,
        fetcher: Arc<MockFetcher>,
        engine: Arc<MockEngine>,
        temp: PathBuf,
        data: PathBuf,
        _dir: TempDir,
    }

    async fn harness(max_concurrent: usize, queue_depth: usize) -> Harness {
        let dir = TempDir::new().unwrap();
        let cookies = fixtures::write_cookie_file(dir.path()).unwrap();
        let store = Arc::new(CookieStore::new(cookies));
        store.load().await.unwrap();
        harness_with_store(dir, store, max_concurrent, queue_depth).await
    }

    async fn harness_with_store(
        dir: TempDir,
        store: Arc<CookieStore>,
        max_concurrent: usize,
        queue_depth: usize,
    ) -> Harness {
        let temp = dir.path().join("temp");
        let data = dir.path().join("data");
        let config = PipelineConfig::default()
            .with_limits(max_concurrent, queue_depth)
            .with_dirs(&temp, &data);

        let fetcher = Arc::new(MockFetcher::new());
        let engine = Arc::new(MockEngine::new());
        let transcoder = Arc::new(Transcoder::new(
            engine.clone(),
            TranscoderConfig::default(),
        ));

        let pipeline = JobPipeline::new(config, store, fetcher.clone(), transcoder);
        pipeline.start().await.unwrap();

        Harness {
            pipeline,
            fetcher,
            engine,
            temp,
            data,
            _dir: dir,
        }
    }

    const URL: &str = "https://media.example.com/watch?v=abc";

    async fn wait_terminal(pipeline: &JobPipeline, id: &str) -> JobSnapshot {
        for _ in 0..500 {
            let snapshot = pipeline.status(id).await.unwrap();
            if snapshot.state.is_terminal() {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", id);
    }

    async fn wait_state(pipeline: &JobPipeline, id: &str, state: JobState) {
        for _ in 0..500 {
            if pipeline.status(id).await.unwrap().state == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", id, state);
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_job_progresses_to_done() {
        let h = harness(2, 2).await;
        h.fetcher.set_fetch_duration(Duration::from_millis(150)).await;
        h.engine.set_run_duration(Duration::from_millis(150)).await;

        let job = h.pipeline.submit(URL, "mp3").await.unwrap();
        assert_eq!(job.state, JobState::Pending);

        let mut seen = vec![job.state];
        loop {
            let state = h.pipeline.status(&job.id).await.unwrap().state;
            if seen.last() != Some(&state) {
                seen.push(state);
            }
            if state.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            seen,
            vec![
                JobState::Pending,
                JobState::Fetching,
                JobState::Transcoding,
                JobState::Done
            ]
        );

        let artifact = h.pipeline.result(&job.id).await.unwrap();
        assert!(artifact.size_bytes > 0);
        assert_eq!(artifact.format, OutputFormat::Mp3);
        assert_eq!(artifact.file_name, format!("{}.mp3", job.id));
        assert_eq!(artifact.path, h.data.join(&artifact.file_name));
        assert!(artifact.path.exists());
        assert!(dir_is_empty(&h.temp));

        let snapshot = h.pipeline.status(&job.id).await.unwrap();
        assert_eq!(snapshot.credential_version, Some(1));
        assert!(h.fetcher.recorded_fetches().await[0].sent_cookies);
    }

    #[tokio::test]
    async fn test_fetch_failure_ends_failed() {
        let h = harness(1, 1).await;
        h.fetcher
            .set_next_error(FetchError::Connection("connection refused".to_string()))
            .await;

        let job = h.pipeline.submit(URL, "ogg").await.unwrap();
        let snapshot = wait_terminal(&h.pipeline, &job.id).await;

        assert_eq!(snapshot.state, JobState::Failed);
        let failure = snapshot.failure.unwrap();
        assert_eq!(failure.kind, "fetch_connection");
        assert!(snapshot.artifact.is_none());
        assert!(matches!(
            h.pipeline.result(&job.id).await,
            Err(PipelineError::NotReady {
                state: JobState::Failed,
                ..
            })
        ));
        assert!(dir_is_empty(&h.temp));
        assert!(dir_is_empty(&h.data));
        assert!(h.engine.recorded_invocations().await.is_empty());
    }

    #[tokio::test]
    async fn test_transcode_failure_and_timeout() {
        let h = harness(1, 2).await;
        h.engine
            .set_next_outcome(MockOutcome::Fail {
                code: 1,
                stderr: "Conversion failed!".to_string(),
            })
            .await;

        let failed = h.pipeline.submit(URL, "mp3").await.unwrap();
        let snapshot = wait_terminal(&h.pipeline, &failed.id).await;
        assert_eq!(snapshot.failure.unwrap().kind, "transcode_failed");

        h.engine.set_next_outcome(MockOutcome::TimeOut).await;
        let timed_out = h.pipeline.submit(URL, "mp3").await.unwrap();
        let snapshot = wait_terminal(&h.pipeline, &timed_out.id).await;
        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.failure.unwrap().kind, "transcode_timeout");

        assert!(dir_is_empty(&h.temp));
    }

    #[tokio::test]
    async fn test_saturation_is_deterministic() {
        let h = harness(1, 1).await;
        h.engine.set_outcome(MockOutcome::Hang).await;

        let first = h.pipeline.submit(URL, "mp3").await.unwrap();
        let second = h.pipeline.submit(URL, "mp3").await.unwrap();
        for _ in 0..3 {
            assert!(matches!(
                h.pipeline.submit(URL, "mp3").await,
                Err(PipelineError::Saturated { capacity: 2 })
            ));
        }

        let status = h.pipeline.status_summary().await;
        assert_eq!(status.pool.total_rejected, 3);
        assert_eq!(status.jobs.total(), 2);

        h.pipeline.cancel(&first.id).await.unwrap();
        h.pipeline.cancel(&second.id).await.unwrap();
        wait_terminal(&h.pipeline, &first.id).await;
        wait_terminal(&h.pipeline, &second.id).await;

        h.engine.set_outcome(MockOutcome::default()).await;
        let third = h.pipeline.submit(URL, "mp3").await.unwrap();
        assert_eq!(
            wait_terminal(&h.pipeline, &third.id).await.state,
            JobState::Done
        );
    }

    #[tokio::test]
    async fn test_cancel_running_transcode() {
        let h = harness(1, 0).await;
        h.engine.set_outcome(MockOutcome::Hang).await;

        let job = h.pipeline.submit(URL, "flac").await.unwrap();
        wait_state(&h.pipeline, &job.id, JobState::Transcoding).await;

        h.pipeline.cancel(&job.id).await.unwrap();
        let snapshot = wait_terminal(&h.pipeline, &job.id).await;

        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.failure.unwrap().kind, "cancelled");
        assert_eq!(h.engine.abandoned_runs(), 1);
        assert_eq!(h.engine.active_runs(), 0);
        assert_eq!(h.pipeline.status_summary().await.pool.active_jobs, 0);
        assert!(dir_is_empty(&h.temp));
    }

    #[tokio::test]
    async fn test_cancel_during_fetch() {
        let h = harness(1, 0).await;
        h.fetcher.set_fetch_duration(Duration::from_secs(60)).await;

        let job = h.pipeline.submit(URL, "mp3").await.unwrap();
        wait_state(&h.pipeline, &job.id, JobState::Fetching).await;

        h.pipeline.cancel(&job.id).await.unwrap();
        let snapshot = wait_terminal(&h.pipeline, &job.id).await;

        assert_eq!(snapshot.state, JobState::Failed);
        assert_eq!(snapshot.failure.unwrap().kind, "cancelled");
        assert!(h.engine.recorded_invocations().await.is_empty());
        assert!(dir_is_empty(&h.temp));
    }

    #[tokio::test]
    async fn test_cancel_queued_job() {
        let h = harness(1, 1).await;
        h.engine.set_outcome(MockOutcome::Hang).await;

        let running = h.pipeline.submit(URL, "mp3").await.unwrap();
        wait_state(&h.pipeline, &running.id, JobState::Transcoding).await;
        let queued = h.pipeline.submit(URL, "mp3").await.unwrap();

        h.pipeline.cancel(&queued.id).await.unwrap();
        let snapshot = wait_terminal(&h.pipeline, &queued.id).await;
        assert_eq!(snapshot.failure.unwrap().kind, "cancelled");
        assert_eq!(h.fetcher.recorded_fetches().await.len(), 1);

        h.pipeline.cancel(&running.id).await.unwrap();
        wait_terminal(&h.pipeline, &running.id).await;
    }

    #[tokio::test]
    async fn test_cancel_finished_job_is_noop() {
        let h = harness(1, 0).await;
        let job = h.pipeline.submit(URL, "wav").await.unwrap();
        wait_terminal(&h.pipeline, &job.id).await;

        let snapshot = h.pipeline.cancel(&job.id).await.unwrap();
        assert_eq!(snapshot.state, JobState::Done);
        assert!(h.pipeline.result(&job.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrency_limit_respected() {
        let h = harness(2, 10).await;
        h.engine.set_run_duration(Duration::from_millis(80)).await;

        let mut ids = Vec::new();
        for _ in 0..6 {
            ids.push(h.pipeline.submit(URL, "opus").await.unwrap().id);
        }
        for id in &ids {
            assert_eq!(wait_terminal(&h.pipeline, id).await.state, JobState::Done);
        }

        assert!(h.engine.peak_concurrency() <= 2);
        let status = h.pipeline.status_summary().await;
        assert_eq!(status.pool.total_processed, 6);
        assert_eq!(status.pool.active_jobs, 0);
        assert_eq!(status.pool.queued_jobs, 0);
        assert_eq!(status.jobs.done, 6);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let h = harness(1, 0).await;
        assert!(matches!(
            h.pipeline.submit(URL, "midi").await,
            Err(PipelineError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.pipeline.submit("not a url", "mp3").await,
            Err(PipelineError::InvalidRequest(_))
        ));
        assert!(matches!(
            h.pipeline.submit("ftp://example.com/a", "mp3").await,
            Err(PipelineError::InvalidRequest(_))
        ));
        assert!(h.pipeline.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let h = harness(1, 0).await;
        assert!(matches!(
            h.pipeline.status("missing").await,
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            h.pipeline.result("missing").await,
            Err(PipelineError::NotFound(_))
        ));
        assert!(matches!(
            h.pipeline.cancel("missing").await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_result_not_ready_while_running() {
        let h = harness(1, 0).await;
        h.engine.set_outcome(MockOutcome::Hang).await;

        let job = h.pipeline.submit(URL, "mp3").await.unwrap();
        assert!(matches!(
            h.pipeline.result(&job.id).await,
            Err(PipelineError::NotReady { .. })
        ));
        h.pipeline.stop().await;
        assert_eq!(
            h.pipeline.status(&job.id).await.unwrap().state,
            JobState::Failed
        );
    }

    #[tokio::test]
    async fn test_stop_rejects_new_jobs() {
        let h = harness(1, 0).await;
        h.pipeline.stop().await;
        assert!(!h.pipeline.is_running().await);
        assert!(matches!(
            h.pipeline.submit(URL, "mp3").await,
            Err(PipelineError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_job() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CookieStore::new(dir.path().join("cookies.txt")));
        let h = harness_with_store(dir, store, 1, 0).await;

        let job = h.pipeline.submit(URL, "mp3").await.unwrap();
        let snapshot = wait_terminal(&h.pipeline, &job.id).await;
        assert_eq!(snapshot.failure.unwrap().kind, "credential_unavailable");
        assert!(h.fetcher.recorded_fetches().await.is_empty());
    }

    #[tokio::test]
    async fn test_purge_removes_jobs_and_artifacts() {
        let h = harness(1, 0).await;
        let job = h.pipeline.submit(URL, "mp3").await.unwrap();
        wait_terminal(&h.pipeline, &job.id).await;
        let artifact = h.pipeline.result(&job.id).await.unwrap();

        assert_eq!(h.pipeline.purge_expired(Duration::from_secs(3600)).await, 0);
        assert_eq!(h.pipeline.purge_expired(Duration::ZERO).await, 1);

        assert!(!artifact.path.exists());
        assert!(matches!(
            h.pipeline.status(&job.id).await,
            Err(PipelineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let h = harness(2, 2).await;
        let first = h.pipeline.submit(URL, "mp3").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = h.pipeline.submit(URL, "m4a").await.unwrap();

        let listed = h.pipeline.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[tokio::test]
    async fn test_start_sweeps_stale_workspaces() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("temp").join("old-job");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("source"), b"x").unwrap();

        let cookies = fixtures::write_cookie_file(dir.path()).unwrap();
        let store = Arc::new(CookieStore::new(cookies));
        store.load().await.unwrap();
        let h = harness_with_store(dir, store, 1, 0).await;

        assert!(!stale.exists());
        assert!(dir_is_empty(&h.temp));
    }

    #[test]
    fn test_reap_interval_bounds() {
        assert_eq!(reap_interval(Duration::ZERO), Duration::from_secs(1));
        assert_eq!(reap_interval(Duration::from_secs(40)), Duration::from_secs(10));
        assert_eq!(reap_interval(Duration::from_secs(3600)), Duration::from_secs(60));
    }
}
