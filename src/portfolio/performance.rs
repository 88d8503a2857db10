// Performance metrics over an equity curve

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::backtesting::snapshot::PortfolioSnapshot;
use crate::backtesting::trade::Trade;

use super::{risk, stats};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Returns
    pub total_return: f64,
    pub total_return_pct: f64,
    pub annualized_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub downside_volatility: f64,

    // Risk-adjusted ratios
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub omega_ratio: f64,

    // Benchmark-relative
    pub alpha: f64,
    pub beta: f64,
    pub benchmark_return: f64,
    pub information_ratio: f64,
    pub tracking_error: f64,

    // Drawdown
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub current_drawdown: f64,

    // Distribution
    pub skewness: f64,
    pub kurtosis: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub cvar_99: f64,
    pub tail_ratio: f64,
    pub gain_to_pain_ratio: f64,

    // Trade statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,

    // Exposure
    pub max_leverage: f64,
    pub avg_leverage: f64,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub trading_days: usize,
}

/// Daily arithmetic returns from an equity curve.
pub fn curve_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Running-peak drawdown series, each entry ≤ 0.
pub fn drawdown_series(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|&v| {
            peak = peak.max(v);
            if peak > 0.0 { (v - peak) / peak } else { 0.0 }
        })
        .collect()
}

/// (max_drawdown, max_duration, current_drawdown). Duration counts the
/// longest contiguous run of strictly negative drawdown.
pub fn drawdown_stats(values: &[f64]) -> (f64, usize, f64) {
    let dd = drawdown_series(values);
    if dd.is_empty() {
        return (0.0, 0, 0.0);
    }

    let max_drawdown = dd.iter().copied().fold(0.0, f64::min);
    let current = *dd.last().expect("non-empty checked above");

    let mut max_duration = 0usize;
    let mut run = 0usize;
    for &d in &dd {
        if d < -1e-12 {
            run += 1;
            max_duration = max_duration.max(run);
        } else {
            run = 0;
        }
    }

    (max_drawdown, max_duration, current)
}

/// Beta of portfolio returns against benchmark returns, length-aligned by
/// truncating to the shorter series.
pub fn beta(returns: &[f64], benchmark: &[f64]) -> f64 {
    let n = returns.len().min(benchmark.len());
    if n < 2 {
        return 1.0;
    }
    let (r, b) = (&returns[..n], &benchmark[..n]);
    let mr = stats::mean(r);
    let mb = stats::mean(b);

    let mut cov = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        cov += (r[i] - mr) * (b[i] - mb);
        var_b += (b[i] - mb).powi(2);
    }
    if var_b > 0.0 { cov / var_b } else { 1.0 }
}

/// Full metric sweep over an equity curve. A curve shorter than two
/// points yields zeroed metrics rather than an error.
pub fn calculate_metrics(
    equity_curve: &[PortfolioSnapshot],
    trades: &[Trade],
    benchmark_returns: &[f64],
    risk_free_rate: f64,
) -> PerformanceMetrics {
    let mut m = PerformanceMetrics::default();
    m.beta = 1.0;

    if !equity_curve.is_empty() {
        m.start_date = Some(equity_curve[0].date);
        m.end_date = Some(equity_curve[equity_curve.len() - 1].date);
        m.max_leverage = equity_curve.iter().map(|s| s.leverage).fold(0.0, f64::max);
        m.avg_leverage =
            stats::mean(&equity_curve.iter().map(|s| s.leverage).collect::<Vec<_>>());
    }
    apply_trade_stats(&mut m, trades);

    let values: Vec<f64> = equity_curve.iter().map(|s| s.total_value).collect();
    if values.len() < 2 {
        return m;
    }

    let returns = curve_returns(&values);
    if returns.is_empty() {
        return m;
    }
    let n = returns.len() as f64;
    m.trading_days = returns.len();

    m.total_return = (values[values.len() - 1] - values[0]) / values[0];
    m.total_return_pct = m.total_return * 100.0;
    m.annualized_return = (1.0 + m.total_return).powf(TRADING_DAYS_PER_YEAR / n) - 1.0;
    m.cagr = m.annualized_return;

    m.volatility = stats::std_pop(&returns) * TRADING_DAYS_PER_YEAR.sqrt();
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    m.downside_volatility = if downside.is_empty() {
        0.0
    } else {
        stats::std_pop(&downside) * TRADING_DAYS_PER_YEAR.sqrt()
    };

    m.sharpe_ratio = if m.volatility > 0.0 {
        (m.annualized_return - risk_free_rate) / m.volatility
    } else {
        0.0
    };
    m.sortino_ratio = if m.downside_volatility > 0.0 {
        (m.annualized_return - risk_free_rate) / m.downside_volatility
    } else {
        0.0
    };

    let (max_dd, dd_duration, current_dd) = drawdown_stats(&values);
    m.max_drawdown = max_dd;
    m.max_drawdown_duration = dd_duration;
    m.current_drawdown = current_dd;
    m.calmar_ratio = if max_dd < 0.0 {
        m.annualized_return / max_dd.abs()
    } else {
        0.0
    };

    m.omega_ratio = risk::omega_ratio(&returns, 0.0);

    m.skewness = stats::skewness(&returns);
    m.kurtosis = stats::excess_kurtosis(&returns);
    m.var_95 = risk::historical_var(&returns, 0.95);
    m.var_99 = risk::historical_var(&returns, 0.99);
    m.cvar_95 = risk::historical_cvar(&returns, 0.95);
    m.cvar_99 = risk::historical_cvar(&returns, 0.99);
    m.tail_ratio = risk::tail_ratio(&returns);
    m.gain_to_pain_ratio = risk::gain_to_pain_ratio(&returns);

    apply_benchmark_stats(&mut m, &returns, benchmark_returns, risk_free_rate);

    m
}

fn apply_benchmark_stats(
    m: &mut PerformanceMetrics,
    returns: &[f64],
    benchmark: &[f64],
    risk_free_rate: f64,
) {
    if benchmark.is_empty() {
        return;
    }

    // Length mismatches truncate to the shorter series; a date-indexed
    // join would be preferable when dates are available.
    let n = returns.len().min(benchmark.len());
    if n == 0 {
        return;
    }
    let (r, b) = (&returns[..n], &benchmark[..n]);

    m.benchmark_return = b.iter().fold(1.0, |acc, x| acc * (1.0 + x)) - 1.0;
    m.beta = beta(returns, benchmark);

    let portfolio_total = r.iter().fold(1.0, |acc, x| acc * (1.0 + x)) - 1.0;
    m.alpha = portfolio_total
        - (risk_free_rate + m.beta * (m.benchmark_return - risk_free_rate));

    let excess: Vec<f64> = r.iter().zip(b).map(|(x, y)| x - y).collect();
    m.tracking_error = stats::std_pop(&excess) * TRADING_DAYS_PER_YEAR.sqrt();
    m.information_ratio = if m.tracking_error > 0.0 {
        stats::mean(&excess) * TRADING_DAYS_PER_YEAR / m.tracking_error
    } else {
        0.0
    };
}

fn apply_trade_stats(m: &mut PerformanceMetrics, trades: &[Trade]) {
    let completed: Vec<&Trade> = trades.iter().filter(|t| t.realized_pnl.is_some()).collect();
    m.total_trades = completed.len();
    if completed.is_empty() {
        return;
    }

    let wins: Vec<f64> = completed
        .iter()
        .filter_map(|t| t.realized_pnl)
        .filter(|p| *p > 0.0)
        .collect();
    let losses: Vec<f64> = completed
        .iter()
        .filter_map(|t| t.realized_pnl)
        .filter(|p| *p < 0.0)
        .map(f64::abs)
        .collect();

    m.winning_trades = wins.len();
    m.losing_trades = losses.len();
    m.win_rate = wins.len() as f64 / completed.len() as f64;
    m.avg_win = stats::mean(&wins);
    m.avg_loss = stats::mean(&losses);

    let total_wins: f64 = wins.iter().sum();
    let total_losses: f64 = losses.iter().sum();
    m.profit_factor = if total_losses > 0.0 {
        total_wins / total_losses
    } else if total_wins > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
}

/// Month-end compounded returns from the equity curve.
pub fn monthly_returns(equity_curve: &[PortfolioSnapshot]) -> Vec<f64> {
    if equity_curve.len() < 2 {
        return Vec::new();
    }

    // Last value of each (year, month) bucket
    let mut month_ends: Vec<(i32, u32, f64)> = Vec::new();
    for snap in equity_curve {
        let key = (snap.date.year(), snap.date.month());
        match month_ends.last_mut() {
            Some((y, mth, v)) if *y == key.0 && *mth == key.1 => *v = snap.total_value,
            _ => month_ends.push((key.0, key.1, snap.total_value)),
        }
    }

    month_ends
        .windows(2)
        .filter(|w| w[0].2 > 0.0)
        .map(|w| (w[1].2 - w[0].2) / w[0].2)
        .collect()
}

/// Rolling Sharpe over `window` daily returns (annualised, against the
/// given risk-free rate). Empty until the window fills.
pub fn rolling_sharpe(values: &[f64], window: usize, risk_free_rate: f64) -> Vec<f64> {
    let returns = curve_returns(values);
    let mut out = Vec::new();
    if returns.len() <= window {
        return out;
    }
    for i in window..returns.len() {
        let slice = &returns[i - window..i];
        let std = stats::std_pop(slice);
        out.push(if std > 0.0 {
            (stats::mean(slice) * TRADING_DAYS_PER_YEAR - risk_free_rate)
                / (std * TRADING_DAYS_PER_YEAR.sqrt())
        } else {
            0.0
        });
    }
    out
}

/// Rolling annualised volatility over `window` daily returns.
pub fn rolling_volatility(values: &[f64], window: usize) -> Vec<f64> {
    let returns = curve_returns(values);
    let mut out = Vec::new();
    if returns.len() <= window {
        return out;
    }
    for i in window..returns.len() {
        out.push(stats::std_pop(&returns[i - window..i]) * TRADING_DAYS_PER_YEAR.sqrt());
    }
    out
}
