// End-to-end pipeline: submit -> simulate -> analyse -> fetch

use std::sync::Arc;
use std::time::Duration;

use quantlab::backtesting::walk_forward::WalkForwardConfig;
use quantlab::backtesting::TradeSide;
use quantlab::jobs::{BacktestService, JobOutput, JobState, OrchestratorConfig};
use quantlab::market_data::source::StaticMarketData;
use quantlab::portfolio::monte_carlo::{simulate, MonteCarloConfig};
use quantlab::portfolio::performance::curve_returns;
use quantlab::portfolio::stats;
use quantlab::portfolio::stress::{default_scenarios, run_stress_test};
use quantlab::strategies::RuleOperator;

use crate::helpers;

fn market(days: usize) -> Arc<StaticMarketData> {
    Arc::new(StaticMarketData {
        panel: helpers::synthetic_panel(&["AAA", "BBB", "CCC"], days, |s, i| {
            let (base, drift, wobble) = match s {
                "AAA" => (100.0, 0.08, 2.0),
                "BBB" => (60.0, 0.03, 4.0),
                _ => (25.0, 0.05, 1.0),
            };
            base + i as f64 * drift + (i as f64 * 0.45).sin() * wobble
        }),
        benchmark_returns: (0..days).map(|i| ((i % 11) as f64 - 5.0) / 2_500.0).collect(),
        risk_free_rate: vec![0.02; days],
    })
}

fn service(days: usize) -> BacktestService {
    BacktestService::new(
        OrchestratorConfig::default(),
        market(days),
        Duration::from_secs(30),
    )
}

async fn finish(service: &BacktestService, id: &str) -> quantlab::jobs::Job {
    for _ in 0..1_000 {
        let job = service.status(id).unwrap();
        if job.state.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never finished");
}

#[tokio::test]
async fn test_full_backtest_to_risk_pipeline() {
    let days = 300;
    let service = service(days);

    let mut config = helpers::backtest_config(&["AAA", "BBB", "CCC"], days, 250_000.0);
    config.benchmark = Some("AAA".to_string());
    config.strategy.exit_rules = vec![helpers::rule("RSI", RuleOperator::Lt, 42.0, 1.0)];

    let id = service.submit_backtest(config).unwrap();
    let job = finish(&service, &id).await;
    assert_eq!(job.state, JobState::Completed, "job failed: {:?}", job.error);

    let JobOutput::Backtest(result) = service.result(&id).unwrap() else {
        panic!("wrong output kind");
    };

    // Every emitted snapshot reconciles and stays long-only
    assert_eq!(result.equity_curve.len(), days);
    for snap in &result.equity_curve {
        let recomputed =
            snap.cash + snap.positions.iter().map(|p| p.market_value).sum::<f64>();
        assert!((snap.total_value - recomputed).abs() / snap.total_value < 1e-9);
        assert!(snap.cash >= 0.0);
        let weights: f64 = snap.positions.iter().map(|p| p.weight).sum();
        assert!(weights <= 1.0 + 1e-9);
    }

    // Trades alternate consistently per symbol: never a sell without a
    // position, so realized PnL only appears on SELL legs
    for trade in &result.trades {
        match trade.side {
            TradeSide::Buy => assert!(trade.realized_pnl.is_none()),
            TradeSide::Sell => assert!(trade.realized_pnl.is_some()),
        }
        assert!(trade.quantity > 0);
        assert!(trade.executed_price > 0.0);
    }

    // Metrics flow into the risk layer
    let m = &result.metrics;
    assert!(m.var_99 >= m.var_95);
    assert!(m.cvar_95 >= m.var_95);
    assert!(m.max_drawdown <= 0.0);

    // Feed the realised curve into Monte Carlo and stress analytics the
    // way the analytics endpoints do
    let values: Vec<f64> = result.equity_curve.iter().map(|s| s.total_value).collect();
    let returns = curve_returns(&values);
    let mc = simulate(
        *values.last().unwrap(),
        stats::mean(&returns),
        stats::std_pop(&returns),
        &MonteCarloConfig {
            num_simulations: 2_000,
            horizon_days: 126,
            seed: 5,
            target_return: 0.05,
            max_sample_paths: 20,
        },
    );
    assert!(mc.percentile_5 <= mc.percentile_95);
    assert!(mc.sample_paths.len() <= 20);

    let last = result.equity_curve.last().unwrap();
    let positions: Vec<(String, f64)> = last
        .positions
        .iter()
        .map(|p| (p.symbol.clone(), p.market_value))
        .collect();
    if !positions.is_empty() {
        let stress =
            run_stress_test(&positions, last.total_value, &default_scenarios()).unwrap();
        assert_eq!(stress.scenarios_tested, 5);
        assert!(stress.worst_case_pct < 0.0);
    }
}

#[tokio::test]
async fn test_walk_forward_job() {
    let days = 420;
    let service = service(days);

    let mut config = helpers::backtest_config(&["AAA", "BBB"], days, 100_000.0);
    config.walk_forward = Some(WalkForwardConfig {
        train_days: 150,
        test_days: 60,
        step_days: 60,
    });

    let id = service.submit_backtest(config).unwrap();
    let job = finish(&service, &id).await;
    assert_eq!(job.state, JobState::Completed, "job failed: {:?}", job.error);

    let JobOutput::Backtest(result) = service.result(&id).unwrap() else {
        panic!("wrong output kind");
    };
    let report = result.walk_forward.expect("walk-forward report present");
    assert!(!report.windows.is_empty());
    assert!((0.0..=1.0).contains(&report.overfitting_score));
    // Stitched curve only spans the test windows
    assert_eq!(result.equity_curve.len(), report.windows.len() * 60);
}

#[tokio::test]
async fn test_concurrent_jobs_stay_isolated() {
    let days = 150;
    let service = service(days);

    let capitals = [10_000.0, 50_000.0, 250_000.0];
    let mut ids = Vec::new();
    for &capital in &capitals {
        let config = helpers::backtest_config(&["AAA", "BBB", "CCC"], days, capital);
        ids.push(service.submit_backtest(config).unwrap());
    }

    for (id, &capital) in ids.iter().zip(&capitals) {
        let job = finish(&service, id).await;
        assert_eq!(job.state, JobState::Completed);
        let JobOutput::Backtest(result) = service.result(id).unwrap() else {
            panic!("wrong output kind");
        };
        // Results never leak between jobs
        assert_eq!(result.initial_capital, capital);
        assert_eq!(result.equity_curve[0].total_value, capital);
    }
}
