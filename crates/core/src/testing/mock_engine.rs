//! Mock media engine for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::transcoder::{ExitOutcome, MediaEngine, TranscodeError, TranscodeInvocation};

/// What the mock engine does on a run.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Writes `output` to the invocation's output path and exits 0.
    Succeed { output: Vec<u8> },
    /// Writes a partial output and exits with `code`.
    Fail { code: i32, stderr: String },
    /// Reports that the run exceeded its time limit.
    TimeOut,
    /// Exits 0 without producing any output.
    NoOutput,
    /// Never finishes on its own; only ends when the future is dropped.
    Hang,
}

impl Default for MockOutcome {
    fn default() -> Self {
        Self::Succeed {
            output: b"transcoded media".to_vec(),
        }
    }
}

/// Mock implementation of the MediaEngine trait.
///
/// Provides controllable behavior for testing:
/// - Track invocations for assertions
/// - Simulate success, failure, timeouts and hangs
/// - Observe concurrency and runs abandoned mid-flight
#[derive(Debug)]
pub struct MockEngine {
    /// Recorded invocations.
    invocations: Arc<RwLock<Vec<TranscodeInvocation>>>,
    /// Outcome used for every run.
    outcome: Arc<RwLock<MockOutcome>>,
    /// If set, the next run uses this outcome instead.
    next_outcome: Arc<RwLock<Option<MockOutcome>>>,
    /// Simulated run duration in milliseconds.
    run_duration_ms: Arc<RwLock<u64>>,
    /// Whether `check_available` succeeds.
    available: Arc<RwLock<bool>>,
    availability_checks: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine that succeeds immediately.
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            outcome: Arc::new(RwLock::new(MockOutcome::default())),
            next_outcome: Arc::new(RwLock::new(None)),
            run_duration_ms: Arc::new(RwLock::new(0)),
            available: Arc::new(RwLock::new(true)),
            availability_checks: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded invocations.
    pub async fn recorded_invocations(&self) -> Vec<TranscodeInvocation> {
        self.invocations.read().await.clone()
    }

    /// Set the outcome used for every run.
    pub async fn set_outcome(&self, outcome: MockOutcome) {
        *self.outcome.write().await = outcome;
    }

    /// Configure only the next run.
    pub async fn set_next_outcome(&self, outcome: MockOutcome) {
        *self.next_outcome.write().await = Some(outcome);
    }

    /// Set the simulated run duration.
    pub async fn set_run_duration(&self, duration: Duration) {
        *self.run_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Make `check_available` succeed or fail.
    pub async fn set_available(&self, available: bool) {
        *self.available.write().await = available;
    }

    /// Times `check_available` was called.
    pub fn availability_checks(&self) -> usize {
        self.availability_checks.load(Ordering::SeqCst)
    }

    /// Runs currently in flight.
    pub fn active_runs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous runs observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Runs whose future was dropped before finishing.
    pub fn abandoned_runs(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    async fn take_outcome(&self) -> MockOutcome {
        match self.next_outcome.write().await.take() {
            Some(outcome) => outcome,
            None => self.outcome.read().await.clone(),
        }
    }
}

/// Tracks one run; counts it as abandoned if dropped before `finish`.
struct RunGuard {
    active: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
    finished: bool,
}

impl RunGuard {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn check_available(&self) -> Result<(), TranscodeError> {
        self.availability_checks.fetch_add(1, Ordering::SeqCst);
        if *self.available.read().await {
            Ok(())
        } else {
            Err(TranscodeError::EngineNotFound {
                path: "mock-engine".into(),
            })
        }
    }

    async fn transcode(
        &self,
        invocation: &TranscodeInvocation,
    ) -> Result<ExitOutcome, TranscodeError> {
        self.invocations.write().await.push(invocation.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        let guard = RunGuard {
            active: Arc::clone(&self.active),
            abandoned: Arc::clone(&self.abandoned),
            finished: false,
        };

        let outcome = self.take_outcome().await;
        let duration = *self.run_duration_ms.read().await;
        if duration > 0 {
            tokio::time::sleep(Duration::from_millis(duration)).await;
        }

        let result = match outcome {
            MockOutcome::Succeed { output } => {
                tokio::fs::write(&invocation.output, output).await?;
                ExitOutcome::Exited {
                    code: Some(0),
                    stderr: Vec::new(),
                }
            }
            MockOutcome::Fail { code, stderr } => {
                tokio::fs::write(&invocation.output, b"partial").await?;
                ExitOutcome::Exited {
                    code: Some(code),
                    stderr: stderr.into_bytes(),
                }
            }
            MockOutcome::TimeOut => ExitOutcome::TimedOut,
            MockOutcome::NoOutput => ExitOutcome::Exited {
                code: Some(0),
                stderr: Vec::new(),
            },
            MockOutcome::Hang => {
                std::future::pending::<()>().await;
                ExitOutcome::TimedOut
            }
        };

        guard.finish();
        Ok(result)
    }
}
