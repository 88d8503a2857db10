// Backtest executor: event loop, execution, snapshots

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use quantlab::backtesting::{run_backtest, BacktestInputs, TradeSide};
use quantlab::errors::EngineError;
use quantlab::jobs::{CancelToken, NullProgress, ProgressSink};
use quantlab::market_data::panel::PricePanel;
use quantlab::strategies::{PositionSizingMethod, RuleOperator};

use crate::helpers;

#[test]
fn test_tiny_backtest_single_entry() {
    // Universe ["A"], 30 closes rising 100 -> 129, 10k capital, EQUAL_WEIGHT,
    // entry on close > SMA(5), exit never fires, zero costs.
    let panel = helpers::synthetic_panel(&["A"], 30, |_, i| 100.0 + i as f64);
    let config = helpers::backtest_config(&["A"], 30, 10_000.0);

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[0.02; 30],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    // Exactly one BUY, on the sixth trading day, held to the end
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.side, TradeSide::Buy);
    assert_eq!(
        trade.timestamp.date_naive(),
        helpers::start_date() + chrono::Days::new(5)
    );

    assert!(result.final_value > 10_000.0);
    assert_eq!(result.metrics.max_drawdown, 0.0);
    assert_eq!(result.metrics.max_drawdown_duration, 0);
    assert!(result.metrics.sharpe_ratio > 0.0);
}

#[test]
fn test_cash_constrained_entry() {
    // $1,000 capital, 10% sizing => $100 budget at price 45 buys 2 shares
    let panel = helpers::synthetic_panel(&["A"], 20, |_, _| 45.0);
    let mut config = helpers::backtest_config(&["A"], 20, 1_000.0);
    // Flat series never clears its SMA; enter on RSI being unavailable is
    // impossible, so force entry with an always-true oscillator rule
    config.strategy.entry_rules =
        vec![helpers::rule("STOCH_K", RuleOperator::Gte, 0.0, 1.0)];

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].quantity, 2);
    let last = result.equity_curve.last().unwrap();
    assert!(last.cash >= 0.0);
}

#[test]
fn test_no_look_ahead() {
    // Trades through day t are identical whether or not bars after t exist
    let full = helpers::synthetic_panel(&["A", "B"], 60, |s, i| {
        let base = if s == "A" { 100.0 } else { 70.0 };
        base + (i as f64 * 0.4).sin() * 5.0 + i as f64 * 0.2
    });
    let cutoff_date = helpers::start_date() + chrono::Days::new(39);

    let mut config = helpers::backtest_config(&["A", "B"], 39, 50_000.0);
    config.strategy.exit_rules = vec![helpers::rule("RSI", RuleOperator::Lt, 45.0, 1.0)];
    config.end_date = cutoff_date;

    let inputs_full = BacktestInputs {
        panel: &full,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result_full =
        run_backtest(&config, &inputs_full, &NullProgress, &CancelToken::new()).unwrap();

    // Re-run on a panel that simply ends at the cutoff
    let truncated = full
        .slice_dates(helpers::start_date(), cutoff_date)
        .unwrap();
    let inputs_cut = BacktestInputs {
        panel: &truncated,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result_cut =
        run_backtest(&config, &inputs_cut, &NullProgress, &CancelToken::new()).unwrap();

    assert_eq!(result_full.trades.len(), result_cut.trades.len());
    for (a, b) in result_full.trades.iter().zip(&result_cut.trades) {
        assert_eq!(a.symbol, b.symbol);
        assert_eq!(a.side, b.side);
        assert_eq!(a.quantity, b.quantity);
        assert_eq!(a.executed_price, b.executed_price);
        assert_eq!(a.timestamp, b.timestamp);
    }
    for (a, b) in result_full.equity_curve.iter().zip(&result_cut.equity_curve) {
        assert_eq!(a.date, b.date);
        assert_eq!(a.total_value, b.total_value);
    }
}

#[test]
fn test_snapshot_identity_and_weights_every_day() {
    let panel = helpers::synthetic_panel(&["A", "B", "C"], 80, |s, i| {
        let base = match s {
            "A" => 100.0,
            "B" => 60.0,
            _ => 30.0,
        };
        base * (1.0 + 0.002 * i as f64) + (i as f64 * 0.9).cos()
    });
    let mut config = helpers::backtest_config(&["A", "B", "C"], 80, 100_000.0);
    config.strategy.exit_rules = vec![helpers::rule("RSI", RuleOperator::Lt, 40.0, 1.0)];

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    assert_eq!(result.equity_curve.len(), 80);
    for snap in &result.equity_curve {
        let recomputed =
            snap.cash + snap.positions.iter().map(|p| p.market_value).sum::<f64>();
        assert!(
            (snap.total_value - recomputed).abs() / snap.total_value < 1e-9,
            "identity broke on {}", snap.date
        );
        let weight_sum: f64 = snap.positions.iter().map(|p| p.weight).sum();
        assert!(weight_sum <= 1.0 + 1e-9);
        for p in &snap.positions {
            assert!(p.weight >= 0.0);
            assert!(p.weight <= config.strategy.max_position_size + 0.05 + 1e-9,
                    "weight {} drifted far above the cap", p.weight);
        }
        assert!(snap.leverage >= 0.0);
    }
}

#[test]
fn test_exit_beats_entry_on_same_bar() {
    // Entry and exit composites both fire while holding: the exit wins
    // and the symbol does not re-enter on that bar.
    let panel = helpers::synthetic_panel(&["A"], 40, |_, i| 100.0 + i as f64);
    let mut config = helpers::backtest_config(&["A"], 40, 10_000.0);
    // Rising series: entry fires from day 6; force the exit to fire too
    config.strategy.exit_rules = vec![helpers::rule("RSI", RuleOperator::Gt, 50.0, 1.0)];

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    // Pattern: BUY day, SELL next day (RSI needs warm-up then stays hot),
    // BUY again the day after. Never SELL and BUY on the same date.
    let mut by_date: BTreeMap<chrono::NaiveDate, Vec<TradeSide>> = BTreeMap::new();
    for trade in &result.trades {
        by_date
            .entry(trade.timestamp.date_naive())
            .or_default()
            .push(trade.side);
    }
    for (date, sides) in &by_date {
        assert!(sides.len() <= 1, "multiple trades for A on {date}: {sides:?}");
    }
    assert!(result.trades.iter().any(|t| t.side == TradeSide::Sell));
}

#[test]
fn test_stop_loss_forces_exit() {
    // Price collapses after day 10; a 10% stop must close the position
    let panel = helpers::synthetic_panel(&["A"], 40, |_, i| {
        if i < 10 { 100.0 + i as f64 } else { 109.0 * 0.97_f64.powi(i as i32 - 9) }
    });
    let mut config = helpers::backtest_config(&["A"], 40, 10_000.0);
    config.strategy.stop_loss_pct = Some(10.0);

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    let sells: Vec<_> = result
        .trades
        .iter()
        .filter(|t| t.side == TradeSide::Sell)
        .collect();
    assert!(!sells.is_empty(), "stop loss never triggered");
    let sell = sells[0];
    assert!(sell.realized_pnl.unwrap() < 0.0);
    assert!(sell.return_pct.unwrap() <= -0.10 + 0.03, "exited near the stop level");
}

#[test]
fn test_day_without_prices_still_snapshots() {
    // A 3-day hole in the only symbol's bars must not break the curve
    let mut series = BTreeMap::new();
    let mut bars = helpers::synthetic_bars(20, |i| 100.0 + i as f64);
    bars.drain(8..11);
    series.insert("A".to_string(), bars);
    let panel = PricePanel::from_bars(&series).unwrap();

    let config = helpers::backtest_config(&["A"], 20, 10_000.0);
    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();
    assert_eq!(result.equity_curve.len(), 17);
}

#[test]
fn test_max_positions_enforced() {
    let symbols = ["A", "B", "C", "D", "E"];
    let panel = helpers::synthetic_panel(&symbols, 40, |s, i| {
        50.0 + s.len() as f64 + i as f64
    });
    let mut config = helpers::backtest_config(&symbols, 40, 100_000.0);
    config.strategy.max_positions = 2;

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    for snap in &result.equity_curve {
        assert!(snap.num_positions <= 2);
    }
    assert_eq!(result.trades.len(), 2);
}

#[test]
fn test_validation_errors() {
    let panel = helpers::synthetic_panel(&["A"], 10, |_, i| 100.0 + i as f64);
    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };

    let mut config = helpers::backtest_config(&["A"], 10, 10_000.0);
    config.start_date = config.end_date;
    assert!(matches!(
        run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()),
        Err(EngineError::Validation(_))
    ));

    let mut config = helpers::backtest_config(&["A"], 10, 10_000.0);
    config.universe = vec!["BAD SYMBOL!".to_string()];
    assert!(matches!(
        run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()),
        Err(EngineError::Validation(_))
    ));

    let mut config = helpers::backtest_config(&["A"], 10, 10_000.0);
    config.initial_capital = -5.0;
    assert!(run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).is_err());
}

#[test]
fn test_unknown_universe_is_data_error() {
    let panel = helpers::synthetic_panel(&["A"], 30, |_, i| 100.0 + i as f64);
    let config = helpers::backtest_config(&["ZZZ"], 30, 10_000.0);
    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    assert!(matches!(
        run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()),
        Err(EngineError::DataUnavailable { .. })
    ));
}

/// Sink that cancels the shared token as soon as the first engine-side
/// progress report lands.
struct CancelOnFirstReport {
    token: CancelToken,
    reports: AtomicUsize,
    log: Mutex<Vec<f64>>,
}

impl ProgressSink for CancelOnFirstReport {
    fn report(&self, progress: f64, _message: &str) {
        self.log.lock().unwrap().push(progress);
        if self.reports.fetch_add(1, Ordering::SeqCst) == 0 {
            self.token.cancel();
        }
    }
}

#[test]
fn test_cancellation_at_daily_checkpoint() {
    // Ten years of daily bars; cancel after the first progress callback
    let panel = helpers::synthetic_panel(&["A"], 2_600, |_, i| {
        100.0 + (i as f64 * 0.01).sin() * 10.0 + i as f64 * 0.01
    });
    let config = helpers::backtest_config(&["A"], 2_600, 100_000.0);

    let token = CancelToken::new();
    let sink = CancelOnFirstReport {
        token: token.clone(),
        reports: AtomicUsize::new(0),
        log: Mutex::new(Vec::new()),
    };

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let outcome = run_backtest(&config, &inputs, &sink, &token);
    assert!(matches!(outcome, Err(EngineError::Cancelled)));

    // The run stopped at the next daily boundary, far from the end
    let reports = sink.log.lock().unwrap();
    assert!(reports.len() < 10, "run kept reporting after cancellation");
}

#[test]
fn test_benchmark_series_attached_by_day() {
    let panel = helpers::synthetic_panel(&["A"], 30, |_, i| 100.0 + i as f64);
    let config = helpers::backtest_config(&["A"], 30, 10_000.0);
    let benchmark: Vec<f64> = (0..30).map(|i| i as f64 / 10_000.0).collect();

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &benchmark,
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();
    for (i, snap) in result.equity_curve.iter().enumerate() {
        assert_eq!(snap.benchmark_return_pct, Some(i as f64 / 10_000.0));
    }
}

#[test]
fn test_monthly_rebalance_defers_entry() {
    // Entry signal is live from the sixth bar (Jan 8), but with monthly
    // cadence the first eligible entry day is the first bar of February.
    let panel = helpers::synthetic_panel(&["A"], 45, |_, i| 100.0 + i as f64);
    let mut config = helpers::backtest_config(&["A"], 45, 10_000.0);
    config.strategy.rebalance = quantlab::strategies::RebalanceFrequency::Monthly;

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();

    assert_eq!(result.trades.len(), 1);
    let trade_date = result.trades[0].timestamp.date_naive();
    assert_eq!(trade_date, "2022-02-01".parse::<chrono::NaiveDate>().unwrap());
}

#[test]
fn test_fixed_dollar_sizing() {
    let panel = helpers::synthetic_panel(&["A"], 30, |_, i| 100.0 + i as f64);
    let mut config = helpers::backtest_config(&["A"], 30, 100_000.0);
    config.strategy.position_sizing = PositionSizingMethod::FixedDollar(10_000.0);
    config.strategy.max_position_size = 0.5;

    let inputs = BacktestInputs {
        panel: &panel,
        benchmark_returns: &[],
        risk_free_rate: &[],
    };
    let result = run_backtest(&config, &inputs, &NullProgress, &CancelToken::new()).unwrap();
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    let notional = trade.quantity as f64 * trade.executed_price;
    assert!((notional - 10_000.0).abs() < 200.0, "notional {notional}");
}
