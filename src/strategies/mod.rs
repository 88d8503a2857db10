// Trading strategies: signal rules, composites, and validation

pub mod templates;

use serde::{Deserialize, Serialize};

use crate::errors::EngineResult;
use crate::indicators::{Indicator, IndicatorPanel};
use crate::market_data::panel::{Field, PricePanel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Gt,
    Lt,
    Gte,
    Lte,
    Crossover,
    Crossunder,
}

/// One signal rule. Evaluated on a (symbol, date) it yields 0.0 or 1.0.
///
/// Overlay indicators (SMA/EMA/Bollinger) are compared through the close:
/// the rule value is `close - indicator`, so `{SMA_20, gt, 0.0}` reads
/// "price above the 20-day average". Oscillators compare their own value
/// against the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRule {
    pub name: String,
    pub indicator: String,
    pub operator: RuleOperator,
    pub threshold: f64,
    pub weight: f64,
    /// Bars of history the rule expects; informational for templates.
    pub lookback: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "method", content = "amount")]
pub enum PositionSizingMethod {
    EqualWeight,
    VolatilityNormalized,
    KellyCriterion,
    FixedDollar(f64),
    RiskParity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingStrategy {
    pub name: String,
    pub description: String,
    pub entry_rules: Vec<SignalRule>,
    pub exit_rules: Vec<SignalRule>,
    pub position_sizing: PositionSizingMethod,
    pub rebalance: RebalanceFrequency,
    pub max_positions: usize,
    /// Per-position weight ceiling in (0, 1].
    pub max_position_size: f64,
    pub min_holding_days: u32,
    /// Loss percentage (positive number) that forces an exit.
    pub stop_loss_pct: Option<f64>,
    /// Gain percentage that forces an exit.
    pub take_profit_pct: Option<f64>,
    /// Cap on the summed weight of any one sector, when sectors are known.
    pub sector_cap_pct: Option<f64>,
    pub entry_signal_threshold: f64,
    pub exit_signal_threshold: f64,
}

impl TradingStrategy {
    /// Every indicator the strategy's rules reference, parsed and
    /// deduplicated. Unknown indicator names are rejected here, at the
    /// boundary.
    pub fn referenced_indicators(&self) -> EngineResult<Vec<Indicator>> {
        let mut out = Vec::new();
        for rule in self.entry_rules.iter().chain(&self.exit_rules) {
            let ind = Indicator::parse(&rule.indicator)?;
            if !out.contains(&ind) {
                out.push(ind);
            }
        }
        Ok(out)
    }
}

/// Structural validation: errors make the strategy unusable, warnings are
/// advisory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn validate_strategy(strategy: &TradingStrategy) -> StrategyValidation {
    let mut report = StrategyValidation {
        is_valid: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    if strategy.entry_rules.is_empty() {
        report.errors.push("strategy must have at least one entry rule".into());
    }
    if strategy.exit_rules.is_empty() {
        report.errors.push("strategy must have at least one exit rule".into());
    }
    if !(strategy.max_position_size > 0.0 && strategy.max_position_size <= 1.0) {
        report.errors.push("max position size must be in (0, 1]".into());
    }
    if !(0.0..=1.0).contains(&strategy.entry_signal_threshold) {
        report.errors.push("entry signal threshold must be in [0, 1]".into());
    }
    if !(0.0..=1.0).contains(&strategy.exit_signal_threshold) {
        report.errors.push("exit signal threshold must be in [0, 1]".into());
    }
    if strategy.max_positions == 0 {
        report.errors.push("max positions must be at least 1".into());
    }

    for rule in strategy.entry_rules.iter().chain(&strategy.exit_rules) {
        if let Err(e) = Indicator::parse(&rule.indicator) {
            report.errors.push(e.to_string());
        }
        if rule.weight < 0.0 {
            report.errors.push(format!("rule '{}' has negative weight", rule.name));
        }
        if rule.lookback == 0 {
            report.errors.push(format!("rule '{}' has zero lookback", rule.name));
        }
    }

    if strategy.max_positions > 50 {
        report.warnings.push("high max positions may impact run time".into());
    }
    if strategy.min_holding_days > 30 {
        report.warnings.push("long minimum holding period reduces flexibility".into());
    }

    report.is_valid = report.errors.is_empty();
    report
}

/// Evaluate one rule for (symbol column, date row). Unavailable samples
/// yield 0.0, never an error.
pub fn evaluate_rule(
    rule: &SignalRule,
    indicator: Indicator,
    indicators: &IndicatorPanel,
    panel: &PricePanel,
    col: usize,
    row: usize,
) -> f64 {
    let value_at = |r: usize| -> f64 {
        let v = indicators.value(col, indicator, r);
        if indicator.is_overlay() {
            // Overlays compare through the close
            match panel.close_at(r, col) {
                Some(close) => close - v,
                None => f64::NAN,
            }
        } else {
            v
        }
    };

    let current = value_at(row);
    if !current.is_finite() {
        return 0.0;
    }

    match rule.operator {
        RuleOperator::Gt => (current > rule.threshold) as u8 as f64,
        RuleOperator::Lt => (current < rule.threshold) as u8 as f64,
        RuleOperator::Gte => (current >= rule.threshold) as u8 as f64,
        RuleOperator::Lte => (current <= rule.threshold) as u8 as f64,
        RuleOperator::Crossover => {
            if row == 0 {
                return 0.0;
            }
            let prev = value_at(row - 1);
            if !prev.is_finite() {
                return 0.0;
            }
            (prev <= rule.threshold && current > rule.threshold) as u8 as f64
        }
        RuleOperator::Crossunder => {
            if row == 0 {
                return 0.0;
            }
            let prev = value_at(row - 1);
            if !prev.is_finite() {
                return 0.0;
            }
            (prev >= rule.threshold && current < rule.threshold) as u8 as f64
        }
    }
}

/// Weighted composite of a rule set, in [0, 1]. Zero total weight (or an
/// empty set) yields 0.0.
pub fn composite_signal(
    rules: &[(SignalRule, Indicator)],
    indicators: &IndicatorPanel,
    panel: &PricePanel,
    col: usize,
    row: usize,
) -> f64 {
    let total_weight: f64 = rules.iter().map(|(r, _)| r.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }

    rules
        .iter()
        .map(|(rule, ind)| {
            rule.weight * evaluate_rule(rule, *ind, indicators, panel, col, row)
        })
        .sum::<f64>()
        / total_weight
}

/// Pre-parsed rule sets for a strategy, ready for the day loop.
pub struct CompiledStrategy {
    pub entry: Vec<(SignalRule, Indicator)>,
    pub exit: Vec<(SignalRule, Indicator)>,
}

impl CompiledStrategy {
    pub fn compile(strategy: &TradingStrategy) -> EngineResult<Self> {
        let compile_rules = |rules: &[SignalRule]| -> EngineResult<Vec<(SignalRule, Indicator)>> {
            rules
                .iter()
                .map(|r| Ok((r.clone(), Indicator::parse(&r.indicator)?)))
                .collect()
        };
        Ok(Self {
            entry: compile_rules(&strategy.entry_rules)?,
            exit: compile_rules(&strategy.exit_rules)?,
        })
    }

    pub fn entry_signal(&self, ind: &IndicatorPanel, panel: &PricePanel, col: usize, row: usize) -> f64 {
        composite_signal(&self.entry, ind, panel, col, row)
    }

    pub fn exit_signal(&self, ind: &IndicatorPanel, panel: &PricePanel, col: usize, row: usize) -> f64 {
        composite_signal(&self.exit, ind, panel, col, row)
    }
}
