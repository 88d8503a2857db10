// Portfolio ledger: cash, positions, trade execution

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::EngineResult;

use super::costs::TransactionCostModel;
use super::position::Position;
use super::snapshot::PortfolioSnapshot;
use super::trade::{Trade, TradeSide};

/// Single-owner portfolio state for one backtest run. Positions iterate
/// in symbol order so execution is deterministic.
pub struct PortfolioLedger {
    pub cash: f64,
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    cost_model: TransactionCostModel,
}

impl PortfolioLedger {
    pub fn new(initial_capital: f64, cost_model: TransactionCostModel) -> Self {
        Self {
            cash: initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            cost_model,
        }
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// Total value at the positions' current marks.
    pub fn total_value(&self) -> f64 {
        self.cash + self.positions.values().map(|p| p.market_value).sum::<f64>()
    }

    /// Execute a BUY. Quantity is rescaled down against 99% of cash when
    /// the order plus costs would overdraw; a rescale to zero skips the
    /// trade. Returns the executed trade, if any.
    pub fn buy(
        &mut self,
        symbol: &str,
        quantity: i64,
        price: f64,
        date: NaiveDate,
        signal_strength: f64,
        market_volume: Option<f64>,
    ) -> EngineResult<Option<Trade>> {
        if quantity <= 0 || price <= 0.0 {
            return Ok(None);
        }

        let mut quantity = quantity;
        let mut costs = self.cost_model.costs(quantity, price, market_volume)?;
        // Per-share slippage pushes the fill above the mid
        let adjusted_price = price + costs.slippage / quantity as f64;

        let required = quantity as f64 * adjusted_price + costs.total;
        if required > self.cash {
            let budget = self.cash * 0.99;
            let per_share = adjusted_price + costs.total / quantity as f64;
            quantity = (budget / per_share).floor() as i64;
            if quantity <= 0 {
                return Ok(None);
            }
            costs = self.cost_model.costs(quantity, adjusted_price, market_volume)?;
        }

        // Shave in the rare case the rescaled order still overdraws
        while quantity > 0 && quantity as f64 * adjusted_price + costs.total > self.cash {
            quantity -= 1;
            if quantity == 0 {
                return Ok(None);
            }
            costs = self.cost_model.costs(quantity, adjusted_price, market_volume)?;
        }

        let notional = quantity as f64 * adjusted_price;
        self.cash -= notional + costs.total;

        if self.positions.contains_key(symbol) {
            // Adding to a long: entry becomes the weighted-average cost
            let existing = self.positions.get_mut(symbol).expect("presence checked");
            let total_quantity = existing.quantity + quantity;
            let cost_basis = existing.quantity as f64 * existing.entry_price + notional;
            existing.entry_price = cost_basis / total_quantity as f64;
            existing.quantity = total_quantity;
            existing.mark(adjusted_price);
        } else {
            self.positions.insert(
                symbol.to_string(),
                Position::open(symbol, quantity, adjusted_price, date),
            );
        }

        let trade = Trade {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: TradeSide::Buy,
            quantity,
            executed_price: adjusted_price,
            timestamp: date.and_hms_opt(0, 0, 0).expect("midnight exists").and_utc(),
            commission: costs.commission,
            slippage: costs.slippage,
            market_impact: costs.market_impact,
            signal_strength,
            realized_pnl: None,
            return_pct: None,
        };
        self.trades.push(trade.clone());
        Ok(Some(trade))
    }

    /// Execute a SELL, clamped to the held quantity. A partial sale keeps
    /// the residual position's entry price unchanged.
    pub fn sell(
        &mut self,
        symbol: &str,
        quantity: i64,
        price: f64,
        date: NaiveDate,
        signal_strength: f64,
        market_volume: Option<f64>,
    ) -> EngineResult<Option<Trade>> {
        let Some(existing) = self.positions.get(symbol) else {
            return Ok(None);
        };
        let quantity = quantity.min(existing.quantity);
        if quantity <= 0 || price <= 0.0 {
            return Ok(None);
        }

        let entry_price = existing.entry_price;
        let costs = self.cost_model.costs(quantity, price, market_volume)?;
        let adjusted_price = price - costs.slippage / quantity as f64;

        self.cash += quantity as f64 * adjusted_price - costs.total;

        let realized_pnl = (adjusted_price - entry_price) * quantity as f64;
        let return_pct = if entry_price > 0.0 {
            (adjusted_price - entry_price) / entry_price
        } else {
            0.0
        };

        let remaining = existing.quantity - quantity;
        if remaining == 0 {
            self.positions.remove(symbol);
        } else {
            let pos = self.positions.get_mut(symbol).expect("position checked above");
            pos.quantity = remaining;
            pos.mark(adjusted_price);
        }

        let trade = Trade {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side: TradeSide::Sell,
            quantity,
            executed_price: adjusted_price,
            timestamp: date.and_hms_opt(0, 0, 0).expect("midnight exists").and_utc(),
            commission: costs.commission,
            slippage: costs.slippage,
            market_impact: costs.market_impact,
            signal_strength,
            realized_pnl: Some(realized_pnl),
            return_pct: Some(return_pct),
        };
        self.trades.push(trade.clone());
        Ok(Some(trade))
    }

    /// Mark every open position that has a close today.
    pub fn update_marks(&mut self, prices: &BTreeMap<String, f64>) {
        for (symbol, position) in self.positions.iter_mut() {
            if let Some(&price) = prices.get(symbol) {
                position.mark(price);
            }
        }
    }

    /// Refresh weights and emit the end-of-day snapshot.
    pub fn snapshot(
        &mut self,
        date: NaiveDate,
        prev_value: Option<f64>,
        benchmark_return_pct: Option<f64>,
    ) -> PortfolioSnapshot {
        let total_value = self.total_value();

        for position in self.positions.values_mut() {
            position.weight = if total_value > 0.0 {
                position.market_value / total_value
            } else {
                0.0
            };
        }

        let (daily_return, daily_return_pct) = match prev_value {
            Some(prev) if prev > 0.0 => (total_value - prev, (total_value - prev) / prev),
            _ => (0.0, 0.0),
        };

        let gross_exposure: f64 = self.positions.values().map(|p| p.market_value.abs()).sum();
        let net_exposure: f64 = self.positions.values().map(|p| p.market_value).sum();

        PortfolioSnapshot {
            date,
            total_value,
            cash: self.cash,
            positions: self.positions.values().cloned().collect(),
            daily_return,
            daily_return_pct,
            benchmark_return_pct,
            num_positions: self.positions.len(),
            gross_exposure,
            net_exposure,
            leverage: if total_value > 0.0 { gross_exposure / total_value } else { 0.0 },
        }
    }
}
