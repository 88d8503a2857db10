// Walk-forward partitioning: rolling train/test windows over the range

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::EngineResult;
use crate::indicators::IndicatorPanel;
use crate::jobs::progress::{CancelToken, NullProgress, ProgressSink};
use crate::portfolio::performance;
use crate::strategies::CompiledStrategy;

use super::engine::{run_window, BacktestConfig, BacktestInputs};
use super::snapshot::PortfolioSnapshot;
use super::trade::Trade;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    #[serde(default = "default_train_days")]
    pub train_days: usize,
    #[serde(default = "default_test_days")]
    pub test_days: usize,
    #[serde(default = "default_step_days")]
    pub step_days: usize,
}

fn default_train_days() -> usize {
    252
}
fn default_test_days() -> usize {
    63
}
fn default_step_days() -> usize {
    63
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_days: default_train_days(),
            test_days: default_test_days(),
            step_days: default_step_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub train_sharpe: f64,
    pub test_sharpe: f64,
    /// Train/test divergence of the objective, normalised to [0, 1].
    pub overfitting_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub windows: Vec<WalkForwardWindow>,
    pub overfitting_score: f64,
}

type WalkForwardRun = (Vec<PortfolioSnapshot>, Vec<Trade>, Option<WalkForwardReport>);

/// Run the strategy across rolling test windows, stitching the test
/// equity curves into one continuous series (each window starts from the
/// previous window's final value). Without a parameter optimiser the
/// train windows only score the objective; when the range is too short
/// for even one window, this falls back to a plain single-window run.
#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &BacktestConfig,
    inputs: &BacktestInputs,
    indicators: &IndicatorPanel,
    compiled: &CompiledStrategy,
    wf: &WalkForwardConfig,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> EngineResult<WalkForwardRun> {
    let dates: Vec<NaiveDate> = inputs
        .panel
        .dates()
        .iter()
        .copied()
        .filter(|d| *d >= config.start_date && *d <= config.end_date)
        .collect();

    let train = wf.train_days.max(2);
    let test = wf.test_days.max(2);
    let step = wf.step_days.max(1);

    // Window index ranges over the in-range date axis
    let mut partitions: Vec<(usize, usize, usize)> = Vec::new(); // (train_lo, test_lo, test_hi)
    let mut lo = 0usize;
    while lo + train + test <= dates.len() {
        partitions.push((lo, lo + train, lo + train + test));
        lo += step;
    }

    if partitions.is_empty() {
        log::warn!(
            "range too short for walk-forward ({} days < train {} + test {}); running single window",
            dates.len(),
            train,
            test
        );
        let output = run_window(
            config,
            inputs,
            indicators,
            compiled,
            config.start_date,
            config.end_date,
            config.initial_capital,
            progress,
            (0.0, 100.0),
            cancel,
        )?;
        return Ok((output.curve, output.trades, None));
    }

    let mut stitched_curve: Vec<PortfolioSnapshot> = Vec::new();
    let mut all_trades: Vec<Trade> = Vec::new();
    let mut windows: Vec<WalkForwardWindow> = Vec::new();
    let mut capital = config.initial_capital;

    let null_progress = NullProgress;
    let n_windows = partitions.len();

    for (idx, &(train_lo, test_lo, test_hi)) in partitions.iter().enumerate() {
        let train_start = dates[train_lo];
        let train_end = dates[test_lo - 1];
        let test_start = dates[test_lo];
        let test_end = dates[test_hi - 1];

        // Train leg scores the objective only; trades are discarded
        let train_run = run_window(
            config,
            inputs,
            indicators,
            compiled,
            train_start,
            train_end,
            config.initial_capital,
            &null_progress,
            (0.0, 100.0),
            cancel,
        )?;
        let train_metrics =
            performance::calculate_metrics(&train_run.curve, &train_run.trades, &[], 0.0);

        let window_progress = WindowProgress {
            inner: progress,
            lo: idx as f64 / n_windows as f64 * 100.0,
            hi: (idx + 1) as f64 / n_windows as f64 * 100.0,
        };

        let test_run = run_window(
            config,
            inputs,
            indicators,
            compiled,
            test_start,
            test_end,
            capital,
            &window_progress,
            (0.0, 100.0),
            cancel,
        )?;
        let test_metrics =
            performance::calculate_metrics(&test_run.curve, &test_run.trades, &[], 0.0);

        let train_sharpe = train_metrics.sharpe_ratio;
        let test_sharpe = test_metrics.sharpe_ratio;
        let divergence = (train_sharpe - test_sharpe).abs();
        let scale = train_sharpe.abs() + test_sharpe.abs();
        let overfitting_score = if scale > 1e-9 {
            (divergence / scale).clamp(0.0, 1.0)
        } else {
            0.0
        };

        windows.push(WalkForwardWindow {
            train_start,
            train_end,
            test_start,
            test_end,
            train_sharpe,
            test_sharpe,
            overfitting_score,
        });

        capital = test_run
            .curve
            .last()
            .map(|s| s.total_value)
            .unwrap_or(capital);
        stitched_curve.extend(test_run.curve);
        all_trades.extend(test_run.trades);
    }

    let overall = windows.iter().map(|w| w.overfitting_score).sum::<f64>()
        / windows.len() as f64;

    Ok((
        stitched_curve,
        all_trades,
        Some(WalkForwardReport {
            windows,
            overfitting_score: overall,
        }),
    ))
}

/// Maps one window's 0..100 progress into its share of the whole run.
struct WindowProgress<'a> {
    inner: &'a dyn ProgressSink,
    lo: f64,
    hi: f64,
}

impl ProgressSink for WindowProgress<'_> {
    fn report(&self, progress: f64, message: &str) {
        let clamped = progress.clamp(0.0, 100.0);
        self.inner
            .report(self.lo + clamped / 100.0 * (self.hi - self.lo), message);
    }
}
