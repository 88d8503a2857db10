// Shared test fixtures: synthetic market data and strategies

use std::collections::BTreeMap;

use chrono::NaiveDate;
use quantlab::backtesting::{BacktestConfig, TransactionCostModel};
use quantlab::market_data::panel::{Bar, PricePanel};
use quantlab::strategies::{
    PositionSizingMethod, RebalanceFrequency, RuleOperator, SignalRule, TradingStrategy,
};

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap()
}

/// Daily bars following `close_fn(day_index)`, with a 2% intraday range.
pub fn synthetic_bars(n: usize, close_fn: impl Fn(usize) -> f64) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = close_fn(i);
            Bar {
                date: start_date() + chrono::Days::new(i as u64),
                open: close * 0.999,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000_000.0,
            }
        })
        .collect()
}

/// Panel with one synthetic series per symbol.
pub fn synthetic_panel(symbols: &[&str], n: usize, close_fn: impl Fn(&str, usize) -> f64) -> PricePanel {
    let mut series = BTreeMap::new();
    for &symbol in symbols {
        series.insert(symbol.to_string(), synthetic_bars(n, |i| close_fn(symbol, i)));
    }
    PricePanel::from_bars(&series).unwrap()
}

pub fn rule(indicator: &str, operator: RuleOperator, threshold: f64, weight: f64) -> SignalRule {
    SignalRule {
        name: format!("{indicator} rule"),
        indicator: indicator.to_string(),
        operator,
        threshold,
        weight,
        lookback: 14,
    }
}

/// Entry on "close above SMA(5)", exit rule that can never fire.
pub fn sma_entry_strategy() -> TradingStrategy {
    TradingStrategy {
        name: "Close above SMA-5".to_string(),
        description: "Enter once price clears the 5-day average".to_string(),
        entry_rules: vec![rule("SMA_5", RuleOperator::Gt, 0.0, 1.0)],
        // RSI below zero is impossible: the exit side stays silent
        exit_rules: vec![rule("RSI", RuleOperator::Lt, -1.0, 1.0)],
        position_sizing: PositionSizingMethod::EqualWeight,
        rebalance: RebalanceFrequency::Daily,
        max_positions: 10,
        max_position_size: 0.15,
        min_holding_days: 1,
        stop_loss_pct: None,
        take_profit_pct: None,
        sector_cap_pct: None,
        entry_signal_threshold: 0.5,
        exit_signal_threshold: 0.5,
    }
}

pub fn backtest_config(symbols: &[&str], days: usize, capital: f64) -> BacktestConfig {
    BacktestConfig {
        strategy: sma_entry_strategy(),
        universe: symbols.iter().map(|s| s.to_string()).collect(),
        start_date: start_date(),
        end_date: start_date() + chrono::Days::new(days as u64),
        initial_capital: capital,
        costs: TransactionCostModel::zero(),
        benchmark: None,
        risk_free_source: "constant".to_string(),
        walk_forward: None,
        sectors: BTreeMap::new(),
    }
}
