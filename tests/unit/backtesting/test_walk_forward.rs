// Walk-forward partitioning and stitching

use quantlab::backtesting::walk_forward::WalkForwardConfig;
use quantlab::backtesting::{run_backtest, BacktestInputs};
use quantlab::jobs::{CancelToken, NullProgress};

use crate::helpers;

#[test]
fn test_windows_cover_range_and_stitch_continuously() {
    let days = 400;
    let panel = helpers::synthetic_panel(&["A"], days, |_, i| {
        100.0 + i as f64 * 0.1 + (i as f64 * 0.3).sin() * 3.0
    });
    let mut config = helpers::backtest_config(&["A"], days, 50_000.0);
    config.walk_forward = Some(WalkForwardConfig {
        train_days: 120,
        test_days: 60,
        step_days: 60,
    });

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    let report = result.walk_forward.expect("windows were produced");
    assert!(!report.windows.is_empty());
    assert!((0.0..=1.0).contains(&report.overfitting_score));

    for window in &report.windows {
        assert!(window.train_start < window.train_end);
        assert!(window.train_end < window.test_start);
        assert!(window.test_start < window.test_end);
        assert!((0.0..=1.0).contains(&window.overfitting_score));
    }
    for pair in report.windows.windows(2) {
        assert!(pair[1].test_start > pair[0].test_start);
    }

    // Stitched curve: each window opens from the prior window's close,
    // so the curve never jumps back to initial capital mid-stream.
    assert!(!result.equity_curve.is_empty());
    let values: Vec<f64> = result.equity_curve.iter().map(|s| s.total_value).collect();
    let n_windows = report.windows.len();
    assert_eq!(values.len(), n_windows * 60);
    for w in 1..n_windows {
        let boundary = w * 60;
        let prev_close = values[boundary - 1];
        let next_open = values[boundary];
        assert!(
            (next_open - prev_close).abs() / prev_close < 0.2,
            "window {w} restarted instead of stitching: {prev_close} -> {next_open}"
        );
    }
}

#[test]
fn test_short_range_falls_back_to_single_window() {
    let days = 90;
    let panel = helpers::synthetic_panel(&["A"], days, |_, i| 100.0 + i as f64 * 0.2);
    let mut config = helpers::backtest_config(&["A"], days, 20_000.0);
    // train+test exceed the available range
    config.walk_forward = Some(WalkForwardConfig {
        train_days: 252,
        test_days: 63,
        step_days: 63,
    });

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    assert!(result.walk_forward.is_none());
    assert_eq!(result.equity_curve.len(), days);
}
