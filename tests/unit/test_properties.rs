// Property-based checks for the numerical kernels

use proptest::prelude::*;

use quantlab::backtesting::costs::TransactionCostModel;
use quantlab::models::bs_mod;
use quantlab::models::implied_vol::{solve, IvMethod, IvRequest};
use quantlab::models::OptionType;
use quantlab::portfolio::stats;

proptest! {
    /// Pricing with sigma and solving back recovers sigma within 1e-3,
    /// excluding intrinsic-only corners.
    #[test]
    fn prop_iv_round_trip(
        sigma in 0.05f64..1.5,
        moneyness in 0.7f64..1.3,
        t in 0.05f64..2.0,
    ) {
        let spot = 100.0;
        let strike = spot * moneyness;
        let (r, q) = (0.03, 0.0);

        let price = bs_mod::call_price(spot, strike, t, r, sigma, q);
        let intrinsic = (spot - strike).max(0.0);
        prop_assume!(price > intrinsic + 1e-4);
        prop_assume!(price > 1e-3);
        // Exclude the vega-dead plateau where any sigma prices identically
        prop_assume!(bs_mod::vega_raw(spot, strike, t, r, sigma, q) > 1e-4);

        let request = IvRequest::new(price, spot, strike, t, r, q, OptionType::Call);
        let solution = solve(&request);
        prop_assert!(solution.converged);
        prop_assert!((solution.sigma - sigma).abs() < 1e-3,
                     "recovered {} for {}", solution.sigma, sigma);
    }

    /// Newton agrees with Brent wherever both converge.
    #[test]
    fn prop_solver_methods_agree(
        sigma in 0.1f64..1.0,
        moneyness in 0.85f64..1.15,
    ) {
        let price = bs_mod::call_price(100.0, 100.0 * moneyness, 0.5, 0.03, sigma, 0.0);
        prop_assume!(price > (100.0 - 100.0 * moneyness).max(0.0) + 1e-4);

        let mut brent = IvRequest::new(price, 100.0, 100.0 * moneyness, 0.5, 0.03, 0.0, OptionType::Call);
        brent.method = IvMethod::Brent;
        let mut newton = brent.clone();
        newton.method = IvMethod::NewtonRaphson;

        let a = solve(&brent);
        let b = solve(&newton);
        prop_assert!(a.converged && b.converged);
        prop_assert!((a.sigma - b.sigma).abs() < 1e-3);
    }

    /// Put-call parity holds across the input space.
    #[test]
    fn prop_put_call_parity(
        s in 10.0f64..500.0,
        k in 10.0f64..500.0,
        t in 0.01f64..3.0,
        sigma in 0.02f64..2.0,
        r in 0.0f64..0.1,
        q in 0.0f64..0.05,
    ) {
        let call = bs_mod::call_price(s, k, t, r, sigma, q);
        let put = bs_mod::put_price(s, k, t, r, sigma, q);
        let forward = s * (-q * t).exp() - k * (-r * t).exp();
        prop_assert!((call - put - forward).abs() < 1e-9);
    }

    /// Every cost component is finite and non-negative for sane inputs.
    #[test]
    fn prop_costs_non_negative(
        quantity in 1i64..1_000_000,
        price in 0.01f64..10_000.0,
        volume in prop::option::of(0.0f64..1e9),
        fixed in 0.0f64..10.0,
        pct in 0.0f64..0.01,
        slippage_bps in 0.0f64..50.0,
        spread_bps in 0.0f64..50.0,
        impact in 0.0f64..1.0,
    ) {
        let model = TransactionCostModel {
            fixed_per_trade: fixed,
            pct_per_trade: pct,
            slippage_bps,
            spread_bps,
            impact_coeff: impact,
        };
        let costs = model.costs(quantity, price, volume).unwrap();
        prop_assert!(costs.total.is_finite());
        prop_assert!(costs.total >= 0.0);
        prop_assert!(costs.market_impact >= 0.0);
    }

    /// Percentiles are order statistics: bounded by min/max, monotone in
    /// the level.
    #[test]
    fn prop_percentile_bounds(values in prop::collection::vec(-1.0f64..1.0, 2..200)) {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let p5 = stats::percentile(&values, 5.0);
        let p50 = stats::percentile(&values, 50.0);
        let p95 = stats::percentile(&values, 95.0);

        prop_assert!(p5 >= min - 1e-12 && p95 <= max + 1e-12);
        prop_assert!(p5 <= p50 && p50 <= p95);
    }
}
