// Black-Scholes-Merton pricer + Greeks + historical vol
// Pure Rust, zero external crates

use super::OptionType;

const FRAC_1_SQRT_2PI: f64 = 0.39894228040143267793994605993439; // 1 / √(2π)

pub fn norm_pdf(x: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF via the Abramowitz-Stegun polynomial (|error| < 7.5e-8).
pub fn norm_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }

    if x.is_infinite() {
        return if x.is_sign_positive() { 1.0 } else { 0.0 };
    }

    if x >= 0.0 {
        let t = 1.0 / (1.0 + 0.2316419 * x);
        let poly = t * (0.319381530 +
                        t * (-0.356563782 +
                             t * (1.781477937 +
                                  t * (-1.821255978 +
                                       t * 1.330274429))));
        let pdf_part = norm_pdf(x);
        1.0 - pdf_part * poly * t
    } else {
        1.0 - norm_cdf(-x)
    }
}

/// Option sensitivities. Theta is per calendar day; vega per 1% vol move;
/// rho per 1% rate move.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

fn d1(s: f64, k: f64, t: f64, r: f64, sigma: f64, q: f64) -> f64 {
    ((s / k).ln() + (r - q + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Black-Scholes-Merton European call price.
/// q = continuous dividend yield (0.0 = vanilla Black-Scholes).
/// Expired options collapse to intrinsic value.
pub fn call_price(s: f64, k: f64, t: f64, r: f64, sigma: f64, q: f64) -> f64 {
    if t <= 0.0 {
        return (s - k).max(0.0);
    }

    let sqrt_t = t.sqrt();
    let d1 = d1(s, k, t, r, sigma, q);
    let d2 = d1 - sigma * sqrt_t;

    s * (-q * t).exp() * norm_cdf(d1) - k * (-r * t).exp() * norm_cdf(d2)
}

/// Black-Scholes-Merton European put price.
pub fn put_price(s: f64, k: f64, t: f64, r: f64, sigma: f64, q: f64) -> f64 {
    if t <= 0.0 {
        return (k - s).max(0.0);
    }

    let sqrt_t = t.sqrt();
    let d1 = d1(s, k, t, r, sigma, q);
    let d2 = d1 - sigma * sqrt_t;

    k * (-r * t).exp() * norm_cdf(-d2) - s * (-q * t).exp() * norm_cdf(-d1)
}

pub fn price(s: f64, k: f64, t: f64, r: f64, sigma: f64, q: f64, option_type: OptionType) -> f64 {
    match option_type {
        OptionType::Call => call_price(s, k, t, r, sigma, q),
        OptionType::Put => put_price(s, k, t, r, sigma, q),
    }
}

/// Full Greeks for a European option. All Greeks are zero once expired.
pub fn greeks(s: f64, k: f64, t: f64, r: f64, sigma: f64, q: f64, option_type: OptionType) -> Greeks {
    if t <= 0.0 {
        return Greeks::default();
    }

    let sqrt_t = t.sqrt();
    let d1 = d1(s, k, t, r, sigma, q);
    let d2 = d1 - sigma * sqrt_t;

    let pdf_d1 = norm_pdf(d1);
    let e_qt = (-q * t).exp();
    let e_rt = (-r * t).exp();

    let delta = match option_type {
        OptionType::Call => e_qt * norm_cdf(d1),
        OptionType::Put => -e_qt * norm_cdf(-d1),
    };

    // Gamma and vega are identical for calls and puts
    let gamma = e_qt * pdf_d1 / (s * sigma * sqrt_t);
    let vega = s * e_qt * pdf_d1 * sqrt_t / 100.0; // per 1% vol change

    let term1 = -s * pdf_d1 * sigma * e_qt / (2.0 * sqrt_t);
    let theta = match option_type {
        OptionType::Call => {
            (term1 + q * s * e_qt * norm_cdf(d1) - r * k * e_rt * norm_cdf(d2)) / 365.0
        }
        OptionType::Put => {
            (term1 - q * s * e_qt * norm_cdf(-d1) + r * k * e_rt * norm_cdf(-d2)) / 365.0
        }
    };

    let rho = match option_type {
        OptionType::Call => k * t * e_rt * norm_cdf(d2) / 100.0, // per 1% rate change
        OptionType::Put => -k * t * e_rt * norm_cdf(-d2) / 100.0,
    };

    Greeks { delta, gamma, theta, vega, rho }
}

/// Unscaled vega (dPrice/dSigma per unit of vol), used as the derivative
/// in the Newton-Raphson implied-vol solver.
pub fn vega_raw(s: f64, k: f64, t: f64, r: f64, sigma: f64, q: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    let d1 = d1(s, k, t, r, sigma, q);
    s * (-q * t).exp() * norm_pdf(d1) * t.sqrt()
}

/// Annualized historical volatility from closing prices.
/// Log returns, sample std dev, √252 annualization.
pub fn compute_historical_vol(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }

    let mut log_returns = Vec::with_capacity(closes.len() - 1);
    for i in 1..closes.len() {
        log_returns.push((closes[i] / closes[i - 1]).ln());
    }

    let mean = log_returns.iter().sum::<f64>() / log_returns.len() as f64;
    let variance = log_returns.iter()
        .map(|&r| (r - mean).powi(2))
        .sum::<f64>() / (log_returns.len() - 1) as f64;

    variance.sqrt() * 252f64.sqrt()
}
