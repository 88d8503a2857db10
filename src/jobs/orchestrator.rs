// Job orchestrator: bounded worker pool over a strongly consistent
// in-process registry

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};

use super::progress::{CancelToken, ProgressSink};
use super::{Job, JobKind, JobOutput, JobState};

pub type JobFuture = Pin<Box<dyn Future<Output = EngineResult<JobOutput>> + Send>>;

/// Handles a runner needs: a sink for progress and the cancellation flag
/// to observe at its checkpoints.
#[derive(Clone)]
pub struct JobContext {
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Jobs executing concurrently; the rest queue as PENDING.
    pub max_workers: usize,
    /// Overall per-job deadline; exceeding it fails the job.
    pub job_deadline: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            job_deadline: None,
        }
    }
}

struct JobEntry {
    job: Job,
    cancel: CancelToken,
    seq: u64,
}

struct Registry {
    jobs: Mutex<HashMap<String, JobEntry>>,
    semaphore: Arc<Semaphore>,
    job_deadline: Option<Duration>,
    seq: AtomicU64,
}

/// Owns the job registry and serialises every mutation of a `Job`.
#[derive(Clone)]
pub struct JobOrchestrator {
    registry: Arc<Registry>,
}

impl JobOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            registry: Arc::new(Registry {
                jobs: Mutex::new(HashMap::new()),
                semaphore: Arc::new(Semaphore::new(config.max_workers.max(1))),
                job_deadline: config.job_deadline,
                seq: AtomicU64::new(0),
            }),
        }
    }

    /// Create a PENDING job and schedule its runner on the worker pool.
    /// The registry is consistent on return: `status` immediately after
    /// `submit` finds the job.
    pub fn submit<F>(&self, kind: JobKind, runner: F) -> String
    where
        F: FnOnce(JobContext) -> JobFuture + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        let cancel = CancelToken::new();

        {
            let mut jobs = self.registry.jobs.lock().expect("registry lock");
            jobs.insert(
                id.clone(),
                JobEntry {
                    job: Job::new(id.clone(), kind),
                    cancel: cancel.clone(),
                    seq: self.registry.seq.fetch_add(1, Ordering::SeqCst),
                },
            );
        }

        let registry = self.registry.clone();
        let job_id = id.clone();
        tokio::spawn(async move {
            let _permit = registry
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore never closed");

            // Cancelled while queued: finish without running
            if cancel.is_cancelled() {
                finalize(&registry, &job_id, Err(EngineError::Cancelled));
                return;
            }

            {
                let mut jobs = registry.jobs.lock().expect("registry lock");
                if let Some(entry) = jobs.get_mut(&job_id) {
                    if entry.job.state.is_terminal() {
                        return;
                    }
                    entry.job.state = JobState::Running;
                    entry.job.message = "running".to_string();
                    entry.job.started_at = Some(Utc::now());
                }
            }

            let context = JobContext {
                progress: Arc::new(RegistrySink {
                    registry: registry.clone(),
                    job_id: job_id.clone(),
                }),
                cancel: cancel.clone(),
            };

            let fut = runner(context);
            let outcome = match registry.job_deadline {
                Some(deadline) => match tokio::time::timeout(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::DeadlineExceeded(deadline.as_secs())),
                },
                None => fut.await,
            };

            finalize(&registry, &job_id, outcome);
        });

        id
    }

    /// Current snapshot of a job.
    pub fn status(&self, job_id: &str) -> EngineResult<Job> {
        let jobs = self.registry.jobs.lock().expect("registry lock");
        jobs.get(job_id)
            .map(|e| e.job.clone())
            .ok_or_else(|| EngineError::NotFound(job_id.to_string()))
    }

    /// Result of a COMPLETED job. Non-terminal jobs report NotReady;
    /// failed and cancelled jobs surface their terminal error.
    pub fn result(&self, job_id: &str) -> EngineResult<JobOutput> {
        let jobs = self.registry.jobs.lock().expect("registry lock");
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| EngineError::NotFound(job_id.to_string()))?;

        match entry.job.state {
            JobState::Completed => entry
                .job
                .result
                .clone()
                .ok_or_else(|| EngineError::Failed("completed job lost its result".into())),
            JobState::Failed => Err(EngineError::Failed(
                entry.job.error.clone().unwrap_or_else(|| "unknown error".into()),
            )),
            JobState::Cancelled => Err(EngineError::Cancelled),
            JobState::Pending | JobState::Running => {
                Err(EngineError::NotReady(job_id.to_string()))
            }
        }
    }

    /// Request cancellation. Idempotent; returns false for unknown or
    /// already-terminal jobs and leaves their state untouched.
    pub fn cancel(&self, job_id: &str) -> bool {
        let mut jobs = self.registry.jobs.lock().expect("registry lock");
        let Some(entry) = jobs.get_mut(job_id) else {
            return false;
        };
        if entry.job.state.is_terminal() {
            return false;
        }

        entry.cancel.cancel();
        if entry.job.state == JobState::Pending {
            // Never started: terminal immediately
            entry.job.state = JobState::Cancelled;
            entry.job.message = "cancelled before start".to_string();
            entry.job.completed_at = Some(Utc::now());
        }
        true
    }

    /// Recent jobs, newest first, optionally filtered by state. The
    /// limit is capped at 100.
    pub fn list(&self, state: Option<JobState>, limit: usize) -> Vec<Job> {
        let jobs = self.registry.jobs.lock().expect("registry lock");
        let mut entries: Vec<(&u64, &Job)> = jobs
            .values()
            .filter(|e| state.map(|s| e.job.state == s).unwrap_or(true))
            .map(|e| (&e.seq, &e.job))
            .collect();
        entries.sort_by(|a, b| b.0.cmp(a.0));
        entries
            .into_iter()
            .take(limit.min(100))
            .map(|(_, job)| job.clone())
            .collect()
    }

    /// Number of jobs currently RUNNING.
    pub fn active_count(&self) -> usize {
        let jobs = self.registry.jobs.lock().expect("registry lock");
        jobs.values()
            .filter(|e| e.job.state == JobState::Running)
            .count()
    }
}

fn finalize(registry: &Registry, job_id: &str, outcome: EngineResult<JobOutput>) {
    let mut jobs = registry.jobs.lock().expect("registry lock");
    let Some(entry) = jobs.get_mut(job_id) else {
        return;
    };
    if entry.job.state.is_terminal() {
        return;
    }

    match outcome {
        Ok(output) => {
            entry.job.state = JobState::Completed;
            entry.job.progress = 100.0;
            entry.job.message = "completed".to_string();
            entry.job.result = Some(output);
        }
        Err(EngineError::Cancelled) => {
            entry.job.state = JobState::Cancelled;
            entry.job.message = "cancelled".to_string();
        }
        Err(err) => {
            log::error!("job {job_id} failed: {err}");
            entry.job.state = JobState::Failed;
            entry.job.message = format!("failed: {err}");
            entry.job.error = Some(err.to_string());
        }
    }
    entry.job.completed_at = Some(Utc::now());
}

/// Progress sink writing into the registry. Updates arriving after a
/// terminal transition are discarded.
struct RegistrySink {
    registry: Arc<Registry>,
    job_id: String,
}

impl ProgressSink for RegistrySink {
    fn report(&self, progress: f64, message: &str) {
        let mut jobs = self.registry.jobs.lock().expect("registry lock");
        if let Some(entry) = jobs.get_mut(&self.job_id) {
            if !entry.job.state.is_terminal() {
                entry.job.progress = progress.clamp(0.0, 100.0);
                entry.job.message = message.to_string();
            }
        }
    }
}
