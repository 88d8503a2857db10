// Stress scenarios: fixed-shape shock sets applied to position values

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

/// Duration proxy for translating a rate shock into an equity-portfolio
/// return impact.
const RATE_DURATION: f64 = 5.0;
/// Return drag per unit of volatility shock.
const VOL_DRAG: f64 = 0.05;

/// The shocks a scenario may apply. The shape is fixed; unknown shock
/// names fail deserialization instead of being carried along silently.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StressShocks {
    /// Uniform return shock applied to every position (e.g. -0.20).
    pub market_shock: f64,
    /// Multiplier on volatility; translated to drag via `VOL_DRAG`.
    pub vol_shock: f64,
    /// Absolute shift in rates (e.g. +0.02), felt through `RATE_DURATION`.
    pub rate_shock: f64,
    /// Magnitude of a zero-sum rotation between positions.
    pub sector_rotation: f64,
    /// Direct liquidity-driven return shock (usually negative).
    pub liquidity_shock: f64,
    /// 0..1; pulls per-position impacts toward their mean, modelling the
    /// loss of diversification when correlations spike.
    pub correlation_shock: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,
    pub shocks: StressShocks,
}

/// The standard scenario set run when the caller supplies none.
pub fn default_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario {
            name: "Market Crash".into(),
            shocks: StressShocks {
                market_shock: -0.20,
                vol_shock: 2.0,
                ..Default::default()
            },
        },
        StressScenario {
            name: "Interest Rate Spike".into(),
            shocks: StressShocks {
                rate_shock: 0.02,
                ..Default::default()
            },
        },
        StressScenario {
            name: "High Volatility".into(),
            shocks: StressShocks {
                vol_shock: 3.0,
                correlation_shock: 0.8,
                ..Default::default()
            },
        },
        StressScenario {
            name: "Sector Rotation".into(),
            shocks: StressShocks {
                sector_rotation: 0.30,
                ..Default::default()
            },
        },
        StressScenario {
            name: "Liquidity Crisis".into(),
            shocks: StressShocks {
                liquidity_shock: -0.10,
                correlation_shock: 0.9,
                ..Default::default()
            },
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionImpact {
    pub symbol: String,
    /// Expected-return impact as a fraction.
    pub impact_pct: f64,
    /// Dollar impact on the position's market value.
    pub impact_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    /// Portfolio-level impact as a fraction of total value.
    pub portfolio_impact_pct: f64,
    pub portfolio_impact_value: f64,
    pub position_impacts: Vec<PositionImpact>,
    pub worst_position: Option<String>,
    pub best_position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestSummary {
    pub results: Vec<ScenarioResult>,
    pub worst_case_pct: f64,
    pub average_pct: f64,
    pub scenarios_tested: usize,
}

/// Apply one scenario to (symbol, market_value) positions.
fn run_scenario(
    positions: &[(String, f64)],
    total_value: f64,
    scenario: &StressScenario,
) -> EngineResult<ScenarioResult> {
    let s = &scenario.shocks;

    let base = s.market_shock + s.liquidity_shock - VOL_DRAG * s.vol_shock
        - RATE_DURATION * s.rate_shock;

    // Zero-sum rotation: alternate winners and losers deterministically
    let mut impacts: Vec<f64> = positions
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let tilt = if i % 2 == 0 { 0.5 } else { -0.5 };
            base + s.sector_rotation * tilt
        })
        .collect();

    // Correlation spike compresses dispersion toward the mean impact
    if s.correlation_shock > 0.0 && impacts.len() > 1 {
        let mean = impacts.iter().sum::<f64>() / impacts.len() as f64;
        let squeeze = s.correlation_shock.clamp(0.0, 1.0);
        for impact in impacts.iter_mut() {
            *impact = mean + (*impact - mean) * (1.0 - squeeze);
        }
    }

    let mut position_impacts = Vec::with_capacity(positions.len());
    let mut total_impact_value = 0.0;
    for ((symbol, market_value), &impact) in positions.iter().zip(&impacts) {
        if !impact.is_finite() {
            return Err(EngineError::numerical(
                "stress test",
                format!("non-finite impact for {symbol}"),
            ));
        }
        let impact_value = market_value * impact;
        total_impact_value += impact_value;
        position_impacts.push(PositionImpact {
            symbol: symbol.clone(),
            impact_pct: impact,
            impact_value,
        });
    }

    let worst_position = position_impacts
        .iter()
        .min_by(|a, b| a.impact_pct.total_cmp(&b.impact_pct))
        .map(|p| p.symbol.clone());
    let best_position = position_impacts
        .iter()
        .max_by(|a, b| a.impact_pct.total_cmp(&b.impact_pct))
        .map(|p| p.symbol.clone());

    let portfolio_impact_pct = if total_value > 0.0 {
        total_impact_value / total_value
    } else {
        0.0
    };

    Ok(ScenarioResult {
        scenario_name: scenario.name.clone(),
        portfolio_impact_pct,
        portfolio_impact_value: total_impact_value,
        position_impacts,
        worst_position,
        best_position,
    })
}

/// Run every scenario and summarise worst and average cases.
pub fn run_stress_test(
    positions: &[(String, f64)],
    total_value: f64,
    scenarios: &[StressScenario],
) -> EngineResult<StressTestSummary> {
    let scenarios = if scenarios.is_empty() {
        default_scenarios()
    } else {
        scenarios.to_vec()
    };

    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in &scenarios {
        results.push(run_scenario(positions, total_value, scenario)?);
    }

    let impacts: Vec<f64> = results.iter().map(|r| r.portfolio_impact_pct).collect();
    let worst_case_pct = impacts.iter().copied().fold(f64::INFINITY, f64::min);
    let average_pct = if impacts.is_empty() {
        0.0
    } else {
        impacts.iter().sum::<f64>() / impacts.len() as f64
    };

    Ok(StressTestSummary {
        scenarios_tested: results.len(),
        results,
        worst_case_pct,
        average_pct,
    })
}
