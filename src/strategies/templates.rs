// Predefined strategy templates

use super::{
    PositionSizingMethod, RebalanceFrequency, RuleOperator, SignalRule, TradingStrategy,
};

fn rule(name: &str, indicator: &str, operator: RuleOperator, threshold: f64,
        weight: f64, lookback: usize) -> SignalRule {
    SignalRule {
        name: name.to_string(),
        indicator: indicator.to_string(),
        operator,
        threshold,
        weight,
        lookback,
    }
}

fn base(name: &str, description: &str) -> TradingStrategy {
    TradingStrategy {
        name: name.to_string(),
        description: description.to_string(),
        entry_rules: Vec::new(),
        exit_rules: Vec::new(),
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

/// Momentum: buy strength confirmed by trend, sell on weakness.
pub fn momentum_strategy() -> TradingStrategy {
    let mut s = base(
        "Momentum",
        "Buy stocks with strong momentum, sell on weakness",
    );
    s.entry_rules = vec![
        rule("RSI momentum", "RSI", RuleOperator::Gt, 70.0, 0.4, 14),
        rule("Price above SMA", "SMA_20", RuleOperator::Gt, 0.0, 0.6, 20),
    ];
    s.exit_rules = vec![
        rule("RSI weakness", "RSI", RuleOperator::Lt, 50.0, 1.0, 14),
    ];
    s
}

/// Mean reversion: buy oversold names, exit once they normalise.
pub fn mean_reversion_strategy() -> TradingStrategy {
    let mut s = base(
        "Mean Reversion",
        "Buy oversold stocks, sell once RSI normalises",
    );
    s.entry_rules = vec![
        rule("RSI oversold", "RSI", RuleOperator::Lt, 30.0, 0.7, 14),
        rule("Price below lower band", "BB_LOWER", RuleOperator::Lt, 0.0, 0.3, 20),
    ];
    s.exit_rules = vec![
        rule("RSI normalised", "RSI", RuleOperator::Gt, 50.0, 1.0, 14),
    ];
    s
}

pub fn all_templates() -> Vec<TradingStrategy> {
    vec![momentum_strategy(), mean_reversion_strategy()]
}
