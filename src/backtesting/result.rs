// Backtest output bundle

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::portfolio::performance::PerformanceMetrics;

use super::snapshot::PortfolioSnapshot;
use super::trade::Trade;
use super::walk_forward::WalkForwardReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub backtest_id: Uuid,
    pub strategy_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub final_value: f64,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<PortfolioSnapshot>,
    pub trades: Vec<Trade>,
    pub monthly_returns: Vec<f64>,
    pub rolling_sharpe: Vec<f64>,
    pub rolling_volatility: Vec<f64>,
    /// Ten best and worst closed trades by realized PnL.
    pub top_winners: Vec<Trade>,
    pub top_losers: Vec<Trade>,
    pub walk_forward: Option<WalkForwardReport>,
    /// Fraction of panel cells that carried data.
    pub data_coverage: f64,
}

impl BacktestResult {
    /// Compact log line for job completion messages.
    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} -> {} | return {:.2}% | sharpe {:.2} | max dd {:.2}% | {} trades",
            self.strategy_name,
            self.start_date,
            self.end_date,
            self.metrics.total_return_pct,
            self.metrics.sharpe_ratio,
            self.metrics.max_drawdown * 100.0,
            self.trades.len(),
        )
    }
}
