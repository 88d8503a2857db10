// Daily portfolio snapshot

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::position::Position;

/// End-of-day portfolio state. `total_value` always reconciles with
/// cash + Σ position market values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub date: NaiveDate,
    pub total_value: f64,
    pub cash: f64,
    pub positions: Vec<Position>,
    pub daily_return: f64,
    pub daily_return_pct: f64,
    pub benchmark_return_pct: Option<f64>,
    pub num_positions: usize,
    pub gross_exposure: f64,
    pub net_exposure: f64,
    pub leverage: f64,
}
