// Implied volatility solvers

use quantlab::models::bs_mod;
use quantlab::models::implied_vol::{solve, IvMethod, IvRequest, MIN_VOL};
use quantlab::models::OptionType;

#[test]
fn test_brent_recovery_scenario() {
    // Inject sigma=0.25 on S=100, K=100, T=0.25, r=5%, q=0
    let price = bs_mod::call_price(100.0, 100.0, 0.25, 0.05, 0.25, 0.0);
    let request = IvRequest::new(price, 100.0, 100.0, 0.25, 0.05, 0.0, OptionType::Call);
    let solution = solve(&request);

    assert!(solution.converged);
    assert!(solution.iterations <= 50);
    assert!(
        (0.2499..=0.2501).contains(&solution.sigma),
        "recovered {}", solution.sigma
    );
    assert!(solution.price_error < 1e-4);
}

#[test]
fn test_round_trip_grid() {
    // sigma in [0.05, 1.5] across strikes, every method, 1e-3 accuracy
    for method in [IvMethod::Brent, IvMethod::Bisection, IvMethod::NewtonRaphson] {
        for &sigma in &[0.05, 0.1, 0.25, 0.5, 0.9, 1.5] {
            for &k in &[85.0, 100.0, 115.0] {
                let price = bs_mod::call_price(100.0, k, 0.5, 0.03, sigma, 0.01);
                // Skip intrinsic-only corners with no time value to invert
                let intrinsic = (100.0f64 - k).max(0.0);
                if price <= intrinsic + 1e-6 {
                    continue;
                }
                let mut request =
                    IvRequest::new(price, 100.0, k, 0.5, 0.03, 0.01, OptionType::Call);
                request.method = method;
                let solution = solve(&request);
                assert!(solution.converged, "{method:?} sigma={sigma} K={k}");
                assert!(
                    (solution.sigma - sigma).abs() < 1e-3,
                    "{method:?}: {} vs {}", solution.sigma, sigma
                );
            }
        }
    }
}

#[test]
fn test_intrinsic_only_price_returns_floor() {
    let request = IvRequest::new(20.0, 120.0, 100.0, 0.25, 0.05, 0.0, OptionType::Call);
    let solution = solve(&request);
    assert!(solution.converged);
    assert_eq!(solution.sigma, MIN_VOL);
    assert_eq!(solution.iterations, 0);
}

#[test]
fn test_unattainable_price_reports_failure() {
    let request = IvRequest::new(99.5, 100.0, 100.0, 0.1, 0.05, 0.0, OptionType::Call);
    let solution = solve(&request);
    assert!(!solution.converged);
}

#[test]
fn test_expired_option_returns_floor() {
    let request = IvRequest::new(5.0, 100.0, 100.0, 0.0, 0.05, 0.0, OptionType::Call);
    let solution = solve(&request);
    assert_eq!(solution.sigma, MIN_VOL);
}

#[test]
fn test_newton_respects_iteration_budget() {
    let price = bs_mod::put_price(100.0, 100.0, 1.0, 0.02, 0.4, 0.0);
    let mut request = IvRequest::new(price, 100.0, 100.0, 1.0, 0.02, 0.0, OptionType::Put);
    request.method = IvMethod::NewtonRaphson;
    request.max_iterations = 100;
    let solution = solve(&request);
    assert!(solution.converged);
    assert!(solution.iterations <= 100);
    assert!((solution.sigma - 0.4).abs() < 1e-3);
}
