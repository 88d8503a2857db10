// Error taxonomy shared across the engine

use thiserror::Error;

/// Engine-wide error kinds. Recoverable conditions inside the kernels
/// (a missing indicator sample, a missing close on one day) are handled
/// locally and never surface here; everything that reaches a caller or a
/// job record goes through this enum.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Request malformed or semantically inconsistent.
    #[error("validation error: {0}")]
    Validation(String),

    /// Upstream data provider returned nothing, or not enough to proceed.
    #[error("data unavailable: {message}")]
    DataUnavailable {
        message: String,
        /// Symbols the failure applies to; empty when not symbol-specific.
        symbols: Vec<String>,
    },

    /// Non-finite value produced in pricing, indicators, or metrics.
    /// Fatal to the current job.
    #[error("numerical error in {context}: {detail}")]
    Numerical { context: String, detail: String },

    /// Cooperative cancellation observed at a checkpoint.
    #[error("cancelled")]
    Cancelled,

    /// The job's overall deadline elapsed before it finished.
    #[error("deadline exceeded after {0} seconds")]
    DeadlineExceeded(u64),

    /// Registry lookup for an unknown job id.
    #[error("job {0} not found")]
    NotFound(String),

    /// Result requested before the job reached a terminal state.
    #[error("job {0} is not finished")]
    NotReady(String),

    /// Result requested on a job that terminated with an error.
    #[error("job failed: {0}")]
    Failed(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn data_unavailable(msg: impl Into<String>, symbols: Vec<String>) -> Self {
        EngineError::DataUnavailable {
            message: msg.into(),
            symbols,
        }
    }

    pub fn numerical(context: impl Into<String>, detail: impl Into<String>) -> Self {
        EngineError::Numerical {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
