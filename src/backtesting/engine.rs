// Day-by-day backtest executor

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::indicators::{Indicator, IndicatorPanel};
use crate::jobs::progress::{CancelToken, ProgressSink};
use crate::market_data::panel::PricePanel;
use crate::portfolio::{correlation, performance, stats};
use crate::strategies::{
    validate_strategy, CompiledStrategy, PositionSizingMethod, RebalanceFrequency,
    TradingStrategy,
};

use super::costs::TransactionCostModel;
use super::portfolio::PortfolioLedger;
use super::result::BacktestResult;
use super::sizing;
use super::snapshot::PortfolioSnapshot;
use super::trade::Trade;
use super::walk_forward::{self, WalkForwardConfig};

/// Indicator fan-out per backtest stays bounded to keep memory stable.
pub const MAX_INDICATOR_THREADS: usize = 4;

const VOL_TARGET: f64 = 0.15;
const VOL_LOOKBACK: usize = 60;
const KELLY_LOOKBACK: usize = 252;
/// Entry-signal level that marks a day as "signalled" for Kelly history.
const KELLY_SIGNAL_LEVEL: f64 = 0.5;
/// Weight fallback when risk parity lacks history.
const RISK_PARITY_DEFAULT: f64 = 0.05;
const ROLLING_WINDOW: usize = 252;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub strategy: TradingStrategy,
    pub universe: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    #[serde(default)]
    pub costs: TransactionCostModel,
    /// Benchmark id resolved by the data layer (e.g. "SPY").
    #[serde(default)]
    pub benchmark: Option<String>,
    /// Risk-free-rate source id resolved by the data layer.
    #[serde(default = "default_risk_free_source")]
    pub risk_free_source: String,
    #[serde(default)]
    pub walk_forward: Option<WalkForwardConfig>,
    /// Optional symbol -> sector mapping for the per-sector cap.
    #[serde(default)]
    pub sectors: BTreeMap<String, String>,
}

fn default_risk_free_source() -> String {
    "constant".to_string()
}

/// Resolved inputs for one run. The panel covers at least the configured
/// range; benchmark and risk-free series align to the run's trading days
/// by index, truncating to the shorter series.
pub struct BacktestInputs<'a> {
    pub panel: &'a PricePanel,
    pub benchmark_returns: &'a [f64],
    pub risk_free_rate: &'a [f64],
}

pub fn validate_config(config: &BacktestConfig) -> EngineResult<()> {
    if config.start_date >= config.end_date {
        return Err(EngineError::validation("start date must precede end date"));
    }
    if config.universe.is_empty() || config.universe.len() > 1000 {
        return Err(EngineError::validation("universe must hold 1..=1000 symbols"));
    }
    for symbol in &config.universe {
        let ok = !symbol.is_empty()
            && symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !ok {
            return Err(EngineError::validation(format!("invalid symbol '{symbol}'")));
        }
    }
    if !(config.initial_capital > 0.0 && config.initial_capital.is_finite()) {
        return Err(EngineError::validation("initial capital must be positive"));
    }

    let report = validate_strategy(&config.strategy);
    if !report.is_valid {
        return Err(EngineError::validation(report.errors.join("; ")));
    }
    Ok(())
}

/// Run a backtest over resolved market data. Walk-forward partitioning is
/// applied when configured; otherwise a single window covers the range.
pub fn run_backtest(
    config: &BacktestConfig,
    inputs: &BacktestInputs,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> EngineResult<BacktestResult> {
    validate_config(config)?;

    let compiled = CompiledStrategy::compile(&config.strategy)?;

    // Indicators are computed once per job and cached for its lifetime
    let mut indicator_set = Indicator::standard_set();
    for ind in config.strategy.referenced_indicators()? {
        if !indicator_set.contains(&ind) {
            indicator_set.push(ind);
        }
    }
    let indicators =
        IndicatorPanel::compute(inputs.panel, &indicator_set, MAX_INDICATOR_THREADS)?;

    let (curve, trades, walk_forward_report) = match &config.walk_forward {
        Some(wf_config) => walk_forward::run(
            config, inputs, &indicators, &compiled, wf_config, progress, cancel,
        )?,
        None => {
            let output = run_window(
                config,
                inputs,
                &indicators,
                &compiled,
                config.start_date,
                config.end_date,
                config.initial_capital,
                progress,
                (0.0, 100.0),
                cancel,
            )?;
            (output.curve, output.trades, None)
        }
    };

    let risk_free = if inputs.risk_free_rate.is_empty() {
        0.02
    } else {
        stats::mean(inputs.risk_free_rate)
    };

    let mut result = assemble_result(config, curve, trades, inputs.benchmark_returns, risk_free);
    result.walk_forward = walk_forward_report;
    result.data_coverage = inputs.panel.coverage();
    Ok(result)
}

pub(crate) struct WindowOutput {
    pub curve: Vec<PortfolioSnapshot>,
    pub trades: Vec<Trade>,
}

/// Simulate one contiguous date window. Signals, sizing and execution see
/// only information available at the bar being processed.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_window(
    config: &BacktestConfig,
    inputs: &BacktestInputs,
    indicators: &IndicatorPanel,
    compiled: &CompiledStrategy,
    start: NaiveDate,
    end: NaiveDate,
    initial_capital: f64,
    progress: &dyn ProgressSink,
    progress_range: (f64, f64),
    cancel: &CancelToken,
) -> EngineResult<WindowOutput> {
    let panel = inputs.panel;
    let strategy = &config.strategy;

    let rows: Vec<usize> = (0..panel.n_dates())
        .filter(|&r| panel.dates()[r] >= start && panel.dates()[r] <= end)
        .collect();
    if rows.is_empty() {
        return Err(EngineError::data_unavailable(
            format!("no trading days between {start} and {end}"),
            config.universe.clone(),
        ));
    }

    // Universe symbols present in the panel, in configured order
    let mut universe: Vec<(String, usize)> = Vec::new();
    let mut missing: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for symbol in &config.universe {
        if !seen.insert(symbol.clone()) {
            continue;
        }
        match panel.symbol_index(symbol) {
            Some(col) => universe.push((symbol.clone(), col)),
            None => missing.push(symbol.clone()),
        }
    }
    if universe.is_empty() {
        return Err(EngineError::data_unavailable(
            "no universe symbol has price data",
            missing,
        ));
    }
    if !missing.is_empty() {
        log::warn!("symbols without price data are skipped: {}", missing.join(", "));
    }

    let mut ledger = PortfolioLedger::new(initial_capital, config.costs);
    let mut curve: Vec<PortfolioSnapshot> = Vec::with_capacity(rows.len());
    let mut prev_value: Option<f64> = None;
    let mut prev_date: Option<NaiveDate> = None;

    // Per-symbol state for sizing lookbacks, keyed by panel column
    let mut last_close: HashMap<usize, f64> = HashMap::new();
    let mut returns_hist: HashMap<usize, Vec<f64>> = HashMap::new();
    let mut fired_hist: HashMap<usize, Vec<bool>> = HashMap::new();

    let total_days = rows.len();
    let (progress_lo, progress_hi) = progress_range;

    for (day_idx, &row) in rows.iter().enumerate() {
        // Daily checkpoint: cancellation is observed here
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let date = panel.dates()[row];
        let rebalance_day = match prev_date {
            None => true,
            Some(prev) => match strategy.rebalance {
                RebalanceFrequency::Daily => true,
                RebalanceFrequency::Weekly => date.iso_week() != prev.iso_week(),
                RebalanceFrequency::Monthly => {
                    date.month() != prev.month() || date.year() != prev.year()
                }
            },
        };
        prev_date = Some(date);

        // Snapshot the market: closes for every tradable universe symbol
        let mut closes: BTreeMap<String, f64> = BTreeMap::new();
        for (symbol, col) in &universe {
            if let Some(close) = panel.close_at(row, *col) {
                closes.insert(symbol.clone(), close);
            }
        }

        // Signals for every symbol trading today; also extends the
        // signalled-return history that Kelly sizing consumes.
        let mut entry_signals: HashMap<usize, f64> = HashMap::new();
        let mut exit_signals: HashMap<usize, f64> = HashMap::new();
        for (symbol, col) in &universe {
            let Some(&close) = closes.get(symbol) else { continue };

            let entry = compiled.entry_signal(indicators, panel, *col, row);
            let exit = compiled.exit_signal(indicators, panel, *col, row);
            entry_signals.insert(*col, entry);
            exit_signals.insert(*col, exit);

            if let Some(&prev_close) = last_close.get(col) {
                if prev_close > 0.0 {
                    returns_hist
                        .entry(*col)
                        .or_default()
                        .push((close - prev_close) / prev_close);
                    fired_hist
                        .entry(*col)
                        .or_default()
                        .push(entry > KELLY_SIGNAL_LEVEL);
                }
            }
            last_close.insert(*col, close);
        }

        // Exits resolve before entries; a symbol exited on this bar does
        // not re-enter on the same bar.
        let mut exited_today: HashSet<String> = HashSet::new();
        let held: Vec<String> = ledger.positions().keys().cloned().collect();
        for symbol in held {
            let Some(&price) = closes.get(&symbol) else { continue };
            let col = panel.symbol_index(&symbol).expect("held symbol is in panel");

            let position = &ledger.positions()[&symbol];
            let pnl_pct = if position.entry_price > 0.0 {
                (price - position.entry_price) / position.entry_price
            } else {
                0.0
            };

            let stop_hit = strategy
                .stop_loss_pct
                .map(|sl| pnl_pct <= -sl / 100.0)
                .unwrap_or(false);
            let target_hit = strategy
                .take_profit_pct
                .map(|tp| pnl_pct >= tp / 100.0)
                .unwrap_or(false);
            let exit_signal = exit_signals.get(&col).copied().unwrap_or(0.0);
            let signal_exit = exit_signal >= strategy.exit_signal_threshold;

            if stop_hit || target_hit || signal_exit {
                let quantity = position.quantity;
                let volume = panel.volume_at(row, col);
                if ledger
                    .sell(&symbol, quantity, price, date, exit_signal, volume)?
                    .is_some()
                {
                    exited_today.insert(symbol);
                }
            }
        }

        // Entries
        let mut risk_parity_cache: Option<HashMap<usize, f64>> = None;
        if rebalance_day {
            for (symbol, col) in &universe {
                let Some(&price) = closes.get(symbol) else { continue };
                if ledger.holds(symbol)
                    || exited_today.contains(symbol)
                    || ledger.num_positions() >= strategy.max_positions
                {
                    continue;
                }

                let entry_signal = entry_signals.get(col).copied().unwrap_or(0.0);
                if entry_signal < strategy.entry_signal_threshold {
                    continue;
                }

                let portfolio_value = ledger.total_value();
                let size = match strategy.position_sizing {
                    PositionSizingMethod::EqualWeight => {
                        sizing::equal_weight(strategy.max_position_size)
                    }
                    PositionSizingMethod::VolatilityNormalized => sizing::volatility_normalized(
                        returns_hist.get(col).map(Vec::as_slice).unwrap_or(&[]),
                        VOL_TARGET,
                        VOL_LOOKBACK,
                    ),
                    PositionSizingMethod::KellyCriterion => sizing::kelly_criterion(
                        returns_hist.get(col).map(Vec::as_slice).unwrap_or(&[]),
                        fired_hist.get(col).map(Vec::as_slice).unwrap_or(&[]),
                        KELLY_LOOKBACK,
                    ),
                    PositionSizingMethod::FixedDollar(amount) => {
                        sizing::fixed_dollar(amount, portfolio_value)
                    }
                    PositionSizingMethod::RiskParity => {
                        let weights = risk_parity_cache.get_or_insert_with(|| {
                            risk_parity_day_weights(&universe, &returns_hist)
                        });
                        weights.get(col).copied().unwrap_or(RISK_PARITY_DEFAULT)
                    }
                };
                let size = size.clamp(0.0, strategy.max_position_size);

                if let Some(cap_pct) = strategy.sector_cap_pct {
                    if let Some(sector) = config.sectors.get(symbol) {
                        let sector_weight: f64 = ledger
                            .positions()
                            .values()
                            .filter(|p| config.sectors.get(&p.symbol) == Some(sector))
                            .map(|p| {
                                if portfolio_value > 0.0 {
                                    p.market_value / portfolio_value
                                } else {
                                    0.0
                                }
                            })
                            .sum();
                        if (sector_weight + size) * 100.0 > cap_pct {
                            continue;
                        }
                    }
                }

                let target_value = portfolio_value * size;
                let quantity = (target_value / price).floor() as i64;
                if quantity > 0 {
                    let volume = panel.volume_at(row, *col);
                    ledger.buy(symbol, quantity, price, date, entry_signal, volume)?;
                }
            }
        }

        // Mark to market and emit the daily snapshot
        ledger.update_marks(&closes);
        let benchmark_return = inputs.benchmark_returns.get(day_idx).copied();
        let snapshot = ledger.snapshot(date, prev_value, benchmark_return);
        if !snapshot.total_value.is_finite() {
            return Err(EngineError::numerical(
                "backtest",
                format!("non-finite portfolio value on {date}"),
            ));
        }
        prev_value = Some(snapshot.total_value);
        curve.push(snapshot);

        let pct = progress_lo
            + (day_idx + 1) as f64 / total_days as f64 * (progress_hi - progress_lo);
        progress.report(pct, &format!("Simulated {}/{} trading days", day_idx + 1, total_days));
    }

    Ok(WindowOutput {
        curve,
        trades: ledger.into_trades(),
    })
}

/// Risk-parity weights for today's universe from realised return
/// histories. Symbols without enough history take the default weight.
fn risk_parity_day_weights(
    universe: &[(String, usize)],
    returns_hist: &HashMap<usize, Vec<f64>>,
) -> HashMap<usize, f64> {
    let eligible: Vec<(usize, &Vec<f64>)> = universe
        .iter()
        .filter_map(|(_, col)| {
            returns_hist
                .get(col)
                .filter(|r| r.len() >= correlation::MIN_COMMON_LENGTH)
                .map(|r| (*col, r))
        })
        .collect();
    if eligible.len() < 2 {
        return HashMap::new();
    }

    let vols: Vec<f64> = eligible
        .iter()
        .map(|(_, r)| {
            let tail = &r[r.len().saturating_sub(VOL_LOOKBACK)..];
            (stats::std_pop(tail) * performance::TRADING_DAYS_PER_YEAR.sqrt()).max(1e-6)
        })
        .collect();

    let by_symbol: BTreeMap<String, Vec<f64>> = eligible
        .iter()
        .enumerate()
        .map(|(i, (_, r))| (format!("{i:04}"), (*r).clone()))
        .collect();
    let corr = correlation::correlation_matrix(&by_symbol);

    let weights = sizing::risk_parity_weights(&vols, &corr.matrix);
    eligible
        .iter()
        .zip(weights)
        .map(|((col, _), w)| (*col, w))
        .collect()
}

fn assemble_result(
    config: &BacktestConfig,
    curve: Vec<PortfolioSnapshot>,
    trades: Vec<Trade>,
    benchmark_returns: &[f64],
    risk_free: f64,
) -> BacktestResult {
    let metrics =
        performance::calculate_metrics(&curve, &trades, benchmark_returns, risk_free);

    let values: Vec<f64> = curve.iter().map(|s| s.total_value).collect();
    let final_value = values.last().copied().unwrap_or(config.initial_capital);

    let mut closed: Vec<&Trade> = trades.iter().filter(|t| t.realized_pnl.is_some()).collect();
    closed.sort_by(|a, b| {
        b.realized_pnl
            .unwrap_or(0.0)
            .total_cmp(&a.realized_pnl.unwrap_or(0.0))
    });
    let top_winners: Vec<Trade> = closed
        .iter()
        .filter(|t| t.realized_pnl.unwrap_or(0.0) > 0.0)
        .take(10)
        .map(|t| (*t).clone())
        .collect();
    let top_losers: Vec<Trade> = closed
        .iter()
        .rev()
        .filter(|t| t.realized_pnl.unwrap_or(0.0) < 0.0)
        .take(10)
        .map(|t| (*t).clone())
        .collect();

    BacktestResult {
        backtest_id: Uuid::new_v4(),
        strategy_name: config.strategy.name.clone(),
        start_date: config.start_date,
        end_date: config.end_date,
        initial_capital: config.initial_capital,
        final_value,
        metrics,
        monthly_returns: performance::monthly_returns(&curve),
        rolling_sharpe: performance::rolling_sharpe(&values, ROLLING_WINDOW, risk_free),
        rolling_volatility: performance::rolling_volatility(&values, ROLLING_WINDOW),
        equity_curve: curve,
        trades,
        top_winners,
        top_losers,
        walk_forward: None,
        data_coverage: 1.0,
    }
}
