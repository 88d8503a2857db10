// Monte Carlo simulation of portfolio outcomes under GBM

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::stats;

/// Simple linear congruential generator, parameters from Numerical
/// Recipes. Seeded per path so parallel runs stay reproducible.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Lcg { state: seed }
    }

    // Uniform in [0, 1)
    fn next_uniform(&mut self) -> f64 {
        const A: u64 = 1664525;
        const C: u64 = 1013904223;
        const M: u64 = 4294967296; // 2^32

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        self.state as f64 / M as f64
    }

    // Box-Muller transform for a standard normal draw
    fn next_normal(&mut self) -> f64 {
        let u1 = self.next_uniform().max(1e-12);
        let u2 = self.next_uniform();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub num_simulations: usize,
    pub horizon_days: usize,
    pub seed: u64,
    /// Return level used for the probability-of-target statistic.
    pub target_return: f64,
    /// Cap on full paths kept for visualisation.
    pub max_sample_paths: usize,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_simulations: 10_000,
            horizon_days: 252,
            seed: 42,
            target_return: 0.10,
            max_sample_paths: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub num_simulations: usize,
    pub horizon_days: usize,
    pub expected_return: f64,
    pub expected_volatility: f64,
    /// Percentiles {5, 25, 50, 75, 95} of terminal returns.
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_50: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
    pub probability_of_loss: f64,
    pub probability_of_target: f64,
    pub max_simulated_loss: f64,
    pub max_simulated_gain: f64,
    /// At most `max_sample_paths` full value paths.
    pub sample_paths: Vec<Vec<f64>>,
}

/// Simulate GBM paths S_{t+1} = S_t·exp((μ - σ²/2)Δt + σ√Δt·Z) with
/// Δt = 1 day, from daily return statistics.
pub fn simulate(
    initial_value: f64,
    mean_daily_return: f64,
    daily_volatility: f64,
    config: &MonteCarloConfig,
) -> MonteCarloSummary {
    let n = config.num_simulations.max(1);
    let horizon = config.horizon_days.max(1);
    let keep = config.max_sample_paths.min(100);

    let drift = mean_daily_return - 0.5 * daily_volatility * daily_volatility;

    // Each path gets its own deterministic stream
    let results: Vec<(f64, Option<Vec<f64>>)> = (0..n)
        .into_par_iter()
        .map(|path_idx| {
            let mut rng = Lcg::new(
                config.seed ^ (path_idx as u64).wrapping_mul(0x9E3779B97F4A7C15),
            );
            let record = path_idx < keep;
            let mut path = record.then(|| {
                let mut p = Vec::with_capacity(horizon + 1);
                p.push(initial_value);
                p
            });

            let mut value = initial_value;
            for _ in 0..horizon {
                let z = rng.next_normal();
                value *= (drift + daily_volatility * z).exp();
                if let Some(p) = path.as_mut() {
                    p.push(value);
                }
            }
            (value, path)
        })
        .collect();

    let terminal_returns: Vec<f64> = results
        .iter()
        .map(|(v, _)| (v - initial_value) / initial_value)
        .collect();
    let sample_paths: Vec<Vec<f64>> = results.into_iter().filter_map(|(_, p)| p).collect();

    let losses = terminal_returns.iter().filter(|r| **r < 0.0).count();
    let hits = terminal_returns
        .iter()
        .filter(|r| **r >= config.target_return)
        .count();

    MonteCarloSummary {
        num_simulations: n,
        horizon_days: horizon,
        expected_return: mean_daily_return * horizon as f64,
        expected_volatility: daily_volatility * (horizon as f64).sqrt(),
        percentile_5: stats::percentile(&terminal_returns, 5.0),
        percentile_25: stats::percentile(&terminal_returns, 25.0),
        percentile_50: stats::percentile(&terminal_returns, 50.0),
        percentile_75: stats::percentile(&terminal_returns, 75.0),
        percentile_95: stats::percentile(&terminal_returns, 95.0),
        probability_of_loss: losses as f64 / n as f64,
        probability_of_target: hits as f64 / n as f64,
        max_simulated_loss: terminal_returns.iter().copied().fold(f64::INFINITY, f64::min),
        max_simulated_gain: terminal_returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        sample_paths,
    }
}

/// Monte Carlo VaR: quantile of normally resampled returns with the
/// sample's mean and vol.
pub fn monte_carlo_var(returns: &[f64], confidence: f64, num_simulations: usize, seed: u64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mu = stats::mean(returns);
    let sigma = stats::std_pop(returns);

    let mut rng = Lcg::new(seed);
    let simulated: Vec<f64> = (0..num_simulations.max(1))
        .map(|_| mu + sigma * rng.next_normal())
        .collect();

    stats::percentile(&simulated, (1.0 - confidence) * 100.0).abs()
}
