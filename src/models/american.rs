// Option pricing on a Cox-Ross-Rubinstein binomial lattice
// Handles early exercise optimally for American calls and puts

use crate::errors::{EngineError, EngineResult};

use super::bs_mod::Greeks;
use super::{ExerciseStyle, OptionType};

/// Binomial tree configuration
#[derive(Debug, Clone, Copy)]
pub struct BinomialConfig {
    pub steps: usize,
}

impl Default for BinomialConfig {
    fn default() -> Self {
        Self { steps: 100 }
    }
}

/// Price an option on a CRR lattice.
///
/// Parameters: Δt = T/N, u = e^(σ√Δt), d = 1/u,
/// p = (e^((r-q)Δt) - d)/(u - d). Terminal payoffs are rolled back with
/// the discounted expectation; American styles take
/// max(continuation, intrinsic) at every node.
///
/// Expired contracts (T ≤ 0) collapse to intrinsic value.
pub fn binomial_price(
    s: f64,
    k: f64,
    t: f64,
    r: f64,
    q: f64,
    sigma: f64,
    option_type: OptionType,
    style: ExerciseStyle,
    config: BinomialConfig,
) -> EngineResult<f64> {
    let intrinsic = |spot: f64| -> f64 {
        match option_type {
            OptionType::Call => (spot - k).max(0.0),
            OptionType::Put => (k - spot).max(0.0),
        }
    };

    if t <= 0.0 {
        return Ok(intrinsic(s));
    }
    if config.steps == 0 {
        return Err(EngineError::validation("binomial steps must be >= 1"));
    }

    let n = config.steps;
    let dt = t / n as f64;
    let u = (sigma * dt.sqrt()).exp(); // Up factor
    let d = 1.0 / u;                   // Down factor
    let disc = (-r * dt).exp();        // Per-step discount
    let p = (((r - q) * dt).exp() - d) / (u - d); // Risk-neutral up probability

    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(EngineError::numerical(
            "binomial lattice",
            format!("risk-neutral probability {p} outside [0, 1]"),
        ));
    }

    // Terminal node values at step N
    let mut values = vec![0.0; n + 1];
    for (i, v) in values.iter_mut().enumerate() {
        let spot = s * u.powi(i as i32) * d.powi((n - i) as i32);
        *v = intrinsic(spot);
    }

    // Backward induction
    for step in (0..n).rev() {
        for i in 0..=step {
            let continuation = disc * (p * values[i + 1] + (1.0 - p) * values[i]);
            values[i] = match style {
                ExerciseStyle::European => continuation,
                ExerciseStyle::American => {
                    let spot = s * u.powi(i as i32) * d.powi((step - i) as i32);
                    continuation.max(intrinsic(spot))
                }
            };
        }
    }

    let price = values[0];
    if !price.is_finite() {
        return Err(EngineError::numerical(
            "binomial lattice",
            "non-finite price out of backward induction".to_string(),
        ));
    }
    Ok(price)
}

/// Lattice Greeks via finite differences.
///
/// Spot is bumped centrally by 1% of S; time one-sided by one calendar
/// day; vol and rate one-sided by 0.01. Reported in the same units as the
/// closed-form Greeks (theta per day, vega and rho per 1% move).
pub fn binomial_greeks(
    s: f64,
    k: f64,
    t: f64,
    r: f64,
    q: f64,
    sigma: f64,
    option_type: OptionType,
    style: ExerciseStyle,
    config: BinomialConfig,
) -> EngineResult<Greeks> {
    if t <= 0.0 {
        return Ok(Greeks::default());
    }

    let base = binomial_price(s, k, t, r, q, sigma, option_type, style, config)?;

    let h = 0.01 * s;
    let v_up = binomial_price(s + h, k, t, r, q, sigma, option_type, style, config)?;
    let v_down = binomial_price(s - h, k, t, r, q, sigma, option_type, style, config)?;
    let delta = (v_up - v_down) / (2.0 * h);
    let gamma = (v_up - 2.0 * base + v_down) / (h * h);

    // One calendar day of decay, clamped at expiry
    let day = 1.0 / 365.0;
    let t_next = (t - day).max(0.0);
    let v_later = binomial_price(s, k, t_next, r, q, sigma, option_type, style, config)?;
    let theta = v_later - base;

    let dv = 0.01;
    let v_vol = binomial_price(s, k, t, r, q, sigma + dv, option_type, style, config)?;
    let vega = v_vol - base; // (ΔV / 0.01) / 100 = ΔV, per 1% vol

    let dr = 0.01;
    let v_rate = binomial_price(s, k, t, r + dr, q, sigma, option_type, style, config)?;
    let rho = v_rate - base; // per 1% rate

    Ok(Greeks { delta, gamma, theta, vega, rho })
}
