// Tail-risk measures: VaR and CVaR under several estimators

use super::stats;
use crate::models::bs_mod::norm_pdf;

/// Historical VaR: magnitude of the (1 - confidence) quantile of returns.
pub fn historical_var(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    stats::percentile(returns, (1.0 - confidence) * 100.0).abs()
}

/// Historical CVaR: magnitude of the mean return at or below the VaR
/// quantile. Always at least as large as the matching VaR.
pub fn historical_cvar(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let quantile = stats::percentile(returns, (1.0 - confidence) * 100.0);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= quantile).collect();
    if tail.is_empty() {
        return quantile.abs();
    }
    stats::mean(&tail).abs()
}

/// Parametric (normal) VaR: |μ + Φ⁻¹(1-confidence)·σ|.
pub fn parametric_var(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mu = stats::mean(returns);
    let sigma = stats::std_pop(returns);
    let z = stats::norm_ppf(1.0 - confidence);
    (mu + z * sigma).abs()
}

/// Cornish-Fisher (modified) VaR: the normal quantile adjusted for the
/// sample's skew and excess kurtosis,
/// z_cf = z + (z²-1)S/6 + (z³-3z)K/24 - (2z³-5z)S²/36.
pub fn cornish_fisher_var(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mu = stats::mean(returns);
    let sigma = stats::std_pop(returns);
    let s = stats::skewness(returns);
    let k = stats::excess_kurtosis(returns);

    let z = stats::norm_ppf(1.0 - confidence);
    let z_cf = z
        + (z * z - 1.0) * s / 6.0
        + (z.powi(3) - 3.0 * z) * k / 24.0
        - (2.0 * z.powi(3) - 5.0 * z) * s * s / 36.0;

    (mu + z_cf * sigma).abs()
}

/// Parametric CVaR under normality: |μ - σ·φ(z)/α| with α = 1-confidence.
pub fn parametric_cvar(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let alpha = 1.0 - confidence;
    if alpha <= 0.0 {
        return 0.0;
    }
    let mu = stats::mean(returns);
    let sigma = stats::std_pop(returns);
    let z = stats::norm_ppf(alpha);
    (mu - sigma * norm_pdf(z) / alpha).abs()
}

/// Tail ratio |p95 / p5|; 1.0 when the sample is too small or the left
/// tail is empty.
pub fn tail_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 20 {
        return 1.0;
    }
    let p95 = stats::percentile(returns, 95.0);
    let p5 = stats::percentile(returns, 5.0);
    if p5 == 0.0 {
        return 1.0;
    }
    (p95 / p5).abs()
}

/// Gain-to-pain: Σ positive returns / |Σ negative returns|.
pub fn gain_to_pain_ratio(returns: &[f64]) -> f64 {
    let gain: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let pain: f64 = returns.iter().filter(|r| **r < 0.0).sum::<f64>().abs();
    if pain == 0.0 {
        return if gain > 0.0 { f64::INFINITY } else { 1.0 };
    }
    gain / pain
}

/// Omega ratio at threshold τ: Σ max(r-τ, 0) / Σ max(τ-r, 0).
pub fn omega_ratio(returns: &[f64], threshold: f64) -> f64 {
    if returns.is_empty() {
        return 1.0;
    }
    let upside: f64 = returns.iter().map(|r| (r - threshold).max(0.0)).sum();
    let downside: f64 = returns.iter().map(|r| (threshold - r).max(0.0)).sum();
    if downside == 0.0 {
        return if upside > 0.0 { f64::INFINITY } else { 1.0 };
    }
    upside / downside
}
