// Transaction cost model bounds

use quantlab::backtesting::costs::TransactionCostModel;
use quantlab::backtesting::portfolio::PortfolioLedger;

use crate::helpers;

fn realistic_model() -> TransactionCostModel {
    TransactionCostModel {
        fixed_per_trade: 1.0,
        pct_per_trade: 0.0005,
        slippage_bps: 5.0,
        spread_bps: 2.0,
        impact_coeff: 0.1,
    }
}

#[test]
fn test_total_cost_never_negative() {
    let model = realistic_model();
    for quantity in [1i64, 10, 500, 100_000] {
        for price in [0.5, 10.0, 450.0] {
            for volume in [None, Some(1_000.0), Some(5e7)] {
                let costs = model.costs(quantity, price, volume).unwrap();
                assert!(costs.total >= 0.0);
                assert!(costs.commission >= 0.0);
                assert!(costs.slippage >= 0.0);
                assert!(costs.spread_cost >= 0.0);
                assert!(costs.market_impact >= 0.0);
                let sum = costs.commission + costs.slippage + costs.spread_cost
                    + costs.market_impact;
                assert!((costs.total - sum).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn test_buy_outflow_exceeds_notional_sell_trails_it() {
    let mut ledger = PortfolioLedger::new(1_000_000.0, realistic_model());
    let date = helpers::start_date();

    let cash_before = ledger.cash;
    ledger.buy("A", 1_000, 50.0, date, 1.0, Some(2e6)).unwrap().unwrap();
    let outflow = cash_before - ledger.cash;
    assert!(outflow > 1_000.0 * 50.0);

    let cash_before = ledger.cash;
    ledger.sell("A", 1_000, 50.0, date, 1.0, Some(2e6)).unwrap().unwrap();
    let proceeds = ledger.cash - cash_before;
    assert!(proceeds < 1_000.0 * 50.0);
}

#[test]
fn test_impact_term_uses_sqrt_participation() {
    let model = TransactionCostModel {
        impact_coeff: 0.25,
        ..TransactionCostModel::zero()
    };
    let volume = 1_000_000.0;
    let price = 20.0;

    let c1 = model.costs(1_000, price, Some(volume)).unwrap();
    let c4 = model.costs(4_000, price, Some(volume)).unwrap();
    // 4x notional with 4x participation: impact scales by 4·√4 = 8
    let ratio = c4.market_impact / c1.market_impact;
    assert!((ratio - 8.0).abs() < 1e-9, "ratio {ratio}");
}

#[test]
fn test_commission_split() {
    let model = realistic_model();
    let costs = model.costs(200, 25.0, None).unwrap();
    // fixed 1.0 + 0.05% of 5,000
    assert!((costs.commission - (1.0 + 2.5)).abs() < 1e-9);
    // 5 bps slippage + 2 bps spread on 5,000
    assert!((costs.slippage - 2.5).abs() < 1e-9);
    assert!((costs.spread_cost - 1.0).abs() < 1e-9);
}
