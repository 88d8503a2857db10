// Async job lifecycle: registry, workers, progress, cancellation

pub mod orchestrator;
pub mod progress;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backtesting::BacktestResult;

pub use orchestrator::{JobContext, JobOrchestrator, OrchestratorConfig};
pub use progress::{CancelToken, NullProgress, ProgressSink, ScopedProgress};
pub use service::{BacktestService, ComparisonEntry, StrategyComparison};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobKind {
    Backtest,
    Compare,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Terminal states are immutable: no transition ever leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

/// Payload of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum JobOutput {
    Backtest(Box<BacktestResult>),
    Compare(StrategyComparison),
}

/// Registry record for one job. Snapshots handed to callers are deep
/// copies; internal mutation never escapes the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub state: JobState,
    /// Percent complete, [0, 100].
    pub progress: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<JobOutput>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: String, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            state: JobState::Pending,
            progress: 0.0,
            message: "queued".to_string(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}
