// Backtest job service: resolves market data and drives the engine
// through the orchestrator

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backtesting::{self, BacktestConfig, BacktestInputs, BacktestResult};
use crate::errors::{EngineError, EngineResult};
use crate::market_data::source::{with_deadline, MarketDataSource};

use super::orchestrator::{JobContext, JobFuture, JobOrchestrator, OrchestratorConfig};
use super::progress::{CancelToken, ProgressSink, ScopedProgress};
use super::{Job, JobKind, JobOutput, JobState};

/// One strategy's scores inside a comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub strategy_name: String,
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub entries: Vec<ComparisonEntry>,
    pub best_by_sharpe: Option<String>,
}

/// Process-level API over the orchestrator: submit, poll, fetch, cancel.
pub struct BacktestService {
    orchestrator: JobOrchestrator,
    source: Arc<dyn MarketDataSource>,
    fetch_deadline: Duration,
}

impl BacktestService {
    pub fn new(
        orchestrator_config: OrchestratorConfig,
        source: Arc<dyn MarketDataSource>,
        fetch_deadline: Duration,
    ) -> Self {
        Self {
            orchestrator: JobOrchestrator::new(orchestrator_config),
            source,
            fetch_deadline,
        }
    }

    /// Validate and enqueue a backtest. Validation failures surface to
    /// the caller directly; no job is created for them.
    pub fn submit_backtest(&self, config: BacktestConfig) -> EngineResult<String> {
        backtesting::validate_config(&config)?;

        let source = self.source.clone();
        let deadline = self.fetch_deadline;
        let id = self.orchestrator.submit(JobKind::Backtest, move |ctx| {
            Box::pin(async move {
                let result = run_backtest_job(config, source, deadline, &ctx).await?;
                Ok(JobOutput::Backtest(Box::new(result)))
            }) as JobFuture
        });

        log::info!("backtest job {id} submitted");
        Ok(id)
    }

    /// Run several configurations under one COMPARE job with blended
    /// progress, producing a ranked comparison.
    pub fn submit_compare(&self, configs: Vec<BacktestConfig>) -> EngineResult<String> {
        if configs.len() < 2 {
            return Err(EngineError::validation(
                "comparison needs at least two configurations",
            ));
        }
        for config in &configs {
            backtesting::validate_config(config)?;
        }

        let source = self.source.clone();
        let deadline = self.fetch_deadline;
        let id = self.orchestrator.submit(JobKind::Compare, move |ctx| {
            Box::pin(async move {
                let comparison = run_compare_job(configs, source, deadline, &ctx).await?;
                Ok(JobOutput::Compare(comparison))
            }) as JobFuture
        });

        log::info!("comparison job {id} submitted");
        Ok(id)
    }

    pub fn status(&self, job_id: &str) -> EngineResult<Job> {
        self.orchestrator.status(job_id)
    }

    pub fn result(&self, job_id: &str) -> EngineResult<JobOutput> {
        self.orchestrator.result(job_id)
    }

    pub fn cancel(&self, job_id: &str) -> bool {
        self.orchestrator.cancel(job_id)
    }

    pub fn list(&self, state: Option<JobState>, limit: usize) -> Vec<Job> {
        self.orchestrator.list(state, limit)
    }

    pub fn active_count(&self) -> usize {
        self.orchestrator.active_count()
    }
}

/// Fetch market data (10% of progress), then hand off to the compute
/// engine (10..95%) on a blocking thread.
async fn run_backtest_job(
    config: BacktestConfig,
    source: Arc<dyn MarketDataSource>,
    fetch_deadline: Duration,
    ctx: &JobContext,
) -> EngineResult<BacktestResult> {
    run_backtest_with(
        config,
        source,
        fetch_deadline,
        ctx.progress.clone(),
        ctx.cancel.clone(),
    )
    .await
}

async fn run_backtest_with(
    config: BacktestConfig,
    source: Arc<dyn MarketDataSource>,
    fetch_deadline: Duration,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
) -> EngineResult<BacktestResult> {
    progress.report(2.0, "Fetching market data");

    let panel = with_deadline(
        fetch_deadline,
        source.fetch_prices(&config.universe, config.start_date, config.end_date),
    )
    .await?;

    let benchmark_returns = match &config.benchmark {
        Some(benchmark_id) => {
            match with_deadline(
                fetch_deadline,
                source.fetch_benchmark_returns(benchmark_id, config.start_date, config.end_date),
            )
            .await
            {
                Ok(series) => series,
                Err(err) => {
                    // The benchmark enriches metrics but is not required
                    log::warn!("benchmark {benchmark_id} unavailable: {err}");
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };

    let risk_free_rate = match with_deadline(
        fetch_deadline,
        source.fetch_risk_free_rate(&config.risk_free_source, config.start_date, config.end_date),
    )
    .await
    {
        Ok(series) => series,
        Err(err) => {
            log::warn!("risk-free source {} unavailable: {err}", config.risk_free_source);
            Vec::new()
        }
    };

    progress.report(10.0, "Market data ready");

    let engine_progress = ScopedProgress::new(progress.clone(), 10.0, 95.0);
    let result = tokio::task::spawn_blocking(move || {
        let inputs = BacktestInputs {
            panel: &panel,
            benchmark_returns: &benchmark_returns,
            risk_free_rate: &risk_free_rate,
        };
        backtesting::run_backtest(&config, &inputs, &engine_progress, &cancel)
    })
    .await
    .map_err(|join_err| EngineError::numerical("backtest worker", join_err.to_string()))??;

    progress.report(95.0, "Finalising results");
    Ok(result)
}

async fn run_compare_job(
    configs: Vec<BacktestConfig>,
    source: Arc<dyn MarketDataSource>,
    fetch_deadline: Duration,
    ctx: &JobContext,
) -> EngineResult<StrategyComparison> {
    let total = configs.len();
    let mut entries = Vec::with_capacity(total);

    for (idx, config) in configs.into_iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let lo = idx as f64 / total as f64 * 100.0;
        let hi = (idx + 1) as f64 / total as f64 * 100.0;
        let scoped: Arc<dyn ProgressSink> =
            Arc::new(ScopedProgress::new(ctx.progress.clone(), lo, hi));

        let result = run_backtest_with(
            config,
            source.clone(),
            fetch_deadline,
            scoped,
            ctx.cancel.clone(),
        )
        .await?;

        entries.push(ComparisonEntry {
            strategy_name: result.strategy_name.clone(),
            total_return_pct: result.metrics.total_return_pct,
            sharpe_ratio: result.metrics.sharpe_ratio,
            max_drawdown: result.metrics.max_drawdown,
            win_rate: result.metrics.win_rate,
            total_trades: result.metrics.total_trades,
        });
    }

    entries.sort_by(|a, b| b.sharpe_ratio.total_cmp(&a.sharpe_ratio));
    let best_by_sharpe = entries.first().map(|e| e.strategy_name.clone());

    Ok(StrategyComparison {
        entries,
        best_by_sharpe,
    })
}
