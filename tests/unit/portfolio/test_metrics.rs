// Performance metrics over equity curves

use quantlab::backtesting::{run_backtest, BacktestInputs};
use quantlab::jobs::{CancelToken, NullProgress};
use quantlab::portfolio::performance::{drawdown_stats, monthly_returns};

use crate::helpers;

#[test]
fn test_strictly_increasing_curve() {
    let values: Vec<f64> = (0..250).map(|i| 10_000.0 * (1.0 + 0.001 * i as f64)).collect();
    let (max_dd, duration, current) = drawdown_stats(&values);
    assert_eq!(max_dd, 0.0);
    assert_eq!(duration, 0);
    assert_eq!(current, 0.0);
}

#[test]
fn test_v_shaped_curve_recovers() {
    let mut values: Vec<f64> = (0..50).map(|i| 10_000.0 + i as f64 * 100.0).collect();
    values.extend((0..30).map(|i| 15_000.0 - i as f64 * 150.0)); // drop to 10,650
    values.extend((0..40).map(|i| 10_650.0 + i as f64 * 200.0)); // recover past peak

    let (max_dd, duration, current) = drawdown_stats(&values);
    assert!(max_dd < -0.25);
    assert!(duration > 30);
    assert_eq!(current, 0.0, "fully recovered by the end");
}

#[test]
fn test_metrics_attached_to_backtest_result() {
    let days = 120;
    let panel = helpers::synthetic_panel(&["A", "B"], days, |s, i| {
        let base = if s == "A" { 100.0 } else { 40.0 };
        base * (1.0 + 0.001 * i as f64) + (i as f64 * 1.3).sin()
    });
    let config = helpers::backtest_config(&["A", "B"], days, 50_000.0);
    let benchmark: Vec<f64> = (0..days).map(|i| ((i % 9) as f64 - 4.0) / 2_000.0).collect();
    let risk_free = vec![0.02; days];

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &benchmark,
        risk_free_rate: &risk_free,
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();
    let m = &result.metrics;

    assert_eq!(m.trading_days, days - 1);
    assert!(m.volatility >= 0.0);
    assert!(m.var_99 >= m.var_95);
    assert!(m.cvar_95 >= m.var_95);
    assert!(m.cvar_99 >= m.var_99);
    assert!(m.max_drawdown <= 0.0);
    assert!(m.beta.is_finite());
    assert!(m.tracking_error >= 0.0);
    assert_eq!(m.start_date, Some(helpers::start_date()));

    // Supplementary series
    assert!(!result.monthly_returns.is_empty());
    assert!(result.rolling_sharpe.is_empty() || result.rolling_sharpe.len() < days);
}

#[test]
fn test_monthly_returns_bucketing() {
    // 70 calendar days span three months
    let panel = helpers::synthetic_panel(&["A"], 70, |_, i| 100.0 + i as f64);
    let config = helpers::backtest_config(&["A"], 70, 10_000.0);
    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();
    let months = monthly_returns(&result.equity_curve);
    assert_eq!(months.len(), 2);
    assert!(months.iter().all(|r| *r > 0.0));
}
