// Engine configuration: worker pool, deadlines, data location

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::jobs::OrchestratorConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Jobs executing concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Per-call deadline for market-data fetches, seconds.
    #[serde(default = "default_fetch_deadline_secs")]
    pub fetch_deadline_secs: u64,
    /// Optional overall job deadline, seconds.
    #[serde(default)]
    pub job_deadline_secs: Option<u64>,
    /// Flat annual risk-free rate used by the "constant" source.
    #[serde(default = "default_risk_free_rate")]
    pub default_risk_free_rate: f64,
    /// Directory holding `<symbol>.csv` bar files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_max_workers() -> usize {
    4
}

fn default_fetch_deadline_secs() -> u64 {
    30
}

fn default_risk_free_rate() -> f64 {
    0.02
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            fetch_deadline_secs: default_fetch_deadline_secs(),
            job_deadline_secs: None,
            default_risk_free_rate: default_risk_free_rate(),
            data_dir: default_data_dir(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| EngineError::validation(format!("bad engine config: {e}")))
    }

    /// Environment overrides on top of defaults (QUANTLAB_MAX_WORKERS,
    /// QUANTLAB_FETCH_DEADLINE_SECS, QUANTLAB_JOB_DEADLINE_SECS,
    /// QUANTLAB_RISK_FREE_RATE, QUANTLAB_DATA_DIR).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse::<usize>("QUANTLAB_MAX_WORKERS") {
            config.max_workers = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("QUANTLAB_FETCH_DEADLINE_SECS") {
            config.fetch_deadline_secs = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("QUANTLAB_JOB_DEADLINE_SECS") {
            config.job_deadline_secs = Some(v);
        }
        if let Some(v) = env_parse::<f64>("QUANTLAB_RISK_FREE_RATE") {
            config.default_risk_free_rate = v;
        }
        if let Ok(v) = std::env::var("QUANTLAB_DATA_DIR") {
            config.data_dir = v;
        }
        config
    }

    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_secs(self.fetch_deadline_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_workers: self.max_workers,
            job_deadline: self.job_deadline_secs.map(Duration::from_secs),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
