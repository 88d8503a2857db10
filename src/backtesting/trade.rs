// Executed trade record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: i64,
    /// Execution price after slippage adjustment.
    pub executed_price: f64,
    pub timestamp: DateTime<Utc>,
    pub commission: f64,
    pub slippage: f64,
    pub market_impact: f64,
    pub signal_strength: f64,
    /// Populated on SELL only.
    pub realized_pnl: Option<f64>,
    pub return_pct: Option<f64>,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.realized_pnl.map(|p| p > 0.0).unwrap_or(false)
    }
}
