// Open position state

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_pct: f64,
    /// Fraction of total portfolio value, refreshed on each mark.
    pub weight: f64,
}

impl Position {
    pub fn open(symbol: &str, quantity: i64, price: f64, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            entry_price: price,
            entry_date: date,
            current_price: price,
            market_value: quantity as f64 * price,
            unrealized_pnl: 0.0,
            unrealized_pnl_pct: 0.0,
            weight: 0.0,
        }
    }

    /// Mark to the latest price. Weight is set separately once the total
    /// portfolio value is known.
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.market_value = self.quantity as f64 * price;
        self.unrealized_pnl = (price - self.entry_price) * self.quantity as f64;
        self.unrealized_pnl_pct = if self.entry_price > 0.0 {
            (price - self.entry_price) / self.entry_price
        } else {
            0.0
        };
    }

    pub fn holding_days(&self, today: NaiveDate) -> i64 {
        (today - self.entry_date).num_days()
    }
}
