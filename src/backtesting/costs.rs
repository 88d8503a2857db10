// Transaction cost model: commission, slippage, spread, market impact

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

/// Cost model parameters. Rates are in basis points where named so;
/// `impact_coeff` scales the √participation market-impact term.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransactionCostModel {
    pub fixed_per_trade: f64,
    pub pct_per_trade: f64,
    pub slippage_bps: f64,
    pub spread_bps: f64,
    pub impact_coeff: f64,
}

impl Default for TransactionCostModel {
    fn default() -> Self {
        Self {
            fixed_per_trade: 1.0,
            pct_per_trade: 0.0005,
            slippage_bps: 5.0,
            spread_bps: 2.0,
            impact_coeff: 0.1,
        }
    }
}

impl TransactionCostModel {
    /// Frictionless model, used by tests and toy runs.
    pub fn zero() -> Self {
        Self {
            fixed_per_trade: 0.0,
            pct_per_trade: 0.0,
            slippage_bps: 0.0,
            spread_bps: 0.0,
            impact_coeff: 0.0,
        }
    }
}

/// Cost breakdown for one proposed trade.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TradeCosts {
    pub commission: f64,
    pub slippage: f64,
    pub spread_cost: f64,
    pub market_impact: f64,
    pub total: f64,
}

impl TransactionCostModel {
    /// Compute the cost breakdown for (quantity, price). Market impact
    /// uses participation = notional / (volume · price); missing volume
    /// means zero participation, not a guess.
    pub fn costs(
        &self,
        quantity: i64,
        price: f64,
        market_volume: Option<f64>,
    ) -> EngineResult<TradeCosts> {
        let notional = (quantity as f64 * price).abs();

        let commission = self.fixed_per_trade + notional * self.pct_per_trade;
        let slippage = notional * self.slippage_bps / 1e4;
        let spread_cost = notional * self.spread_bps / 1e4;

        let participation = match market_volume {
            Some(volume) if volume > 0.0 && price > 0.0 => notional / (volume * price),
            _ => 0.0,
        };
        let market_impact = notional * self.impact_coeff * participation.sqrt();

        let total = commission + slippage + spread_cost + market_impact;
        if !total.is_finite() || total < 0.0 {
            return Err(EngineError::numerical(
                "cost model",
                format!("total cost {total} for quantity {quantity} at {price}"),
            ));
        }

        Ok(TradeCosts {
            commission,
            slippage,
            spread_cost,
            market_impact,
            total,
        })
    }
}
