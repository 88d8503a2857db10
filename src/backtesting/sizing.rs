// Position sizing methodologies

/// Annualisation factor shared across the engine.
const TRADING_DAYS: f64 = 252.0;

/// Equal weight: a flat 10% per entry, capped by the strategy ceiling.
pub fn equal_weight(max_position_size: f64) -> f64 {
    0.10_f64.min(max_position_size)
}

/// Volatility-normalised: target_vol / realised annualised vol over the
/// last `lookback` returns, clamped to [0.01, 0.25]. Insufficient history
/// or degenerate vol falls back to 0.1.
pub fn volatility_normalized(returns: &[f64], target_vol: f64, lookback: usize) -> f64 {
    if returns.len() < lookback {
        return 0.1;
    }

    let window = &returns[returns.len() - lookback..];
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let variance = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / window.len() as f64;
    let annualised_vol = variance.sqrt() * TRADING_DAYS.sqrt();

    if annualised_vol <= 0.0 || !annualised_vol.is_finite() {
        return 0.1;
    }

    (target_vol / annualised_vol).clamp(0.01, 0.25)
}

/// Fractional Kelly over the signalled-trade history: returns at indices
/// where the entry signal fired, over the last `lookback` samples.
/// f* = (b·p − (1−p)) / b with b = avg_win / avg_loss, scaled by 0.25 and
/// clipped to [0.01, 0.15]. Degenerate inputs fall back to 0.1.
pub fn kelly_criterion(returns: &[f64], entry_fired: &[bool], lookback: usize) -> f64 {
    let n = returns.len().min(entry_fired.len());
    if n < lookback {
        return 0.1;
    }

    let start = n - lookback;
    let mut wins: Vec<f64> = Vec::new();
    let mut losses: Vec<f64> = Vec::new();
    for i in start..n {
        if entry_fired[i] {
            let r = returns[i];
            if r > 0.0 {
                wins.push(r);
            } else if r < 0.0 {
                losses.push(-r);
            }
        }
    }

    if wins.is_empty() || losses.is_empty() {
        return 0.1;
    }

    let p = wins.len() as f64 / (wins.len() + losses.len()) as f64;
    let avg_win = wins.iter().sum::<f64>() / wins.len() as f64;
    let avg_loss = losses.iter().sum::<f64>() / losses.len() as f64;
    if avg_loss <= 0.0 {
        return 0.1;
    }

    let b = avg_win / avg_loss;
    let kelly = (b * p - (1.0 - p)) / b;
    (kelly * 0.25).clamp(0.01, 0.15)
}

/// Fixed dollar amount as a fraction of portfolio value, capped at 20%.
pub fn fixed_dollar(amount: f64, portfolio_value: f64) -> f64 {
    if portfolio_value <= 0.0 {
        return 0.0;
    }
    (amount / portfolio_value).min(0.2)
}

/// Iterative risk-parity weights over a covariance built from per-asset
/// vols and a correlation matrix. Damped multiplicative updates run until
/// the risk-contribution dispersion drops below 1e-6 or 100 iterations.
pub fn risk_parity_weights(volatilities: &[f64], correlations: &[Vec<f64>]) -> Vec<f64> {
    let n = volatilities.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![1.0];
    }

    // Covariance from vols and correlations
    let cov: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| correlations[i][j] * volatilities[i] * volatilities[j])
                .collect()
        })
        .collect();

    let mut weights = vec![1.0 / n as f64; n];

    for _ in 0..100 {
        // Portfolio variance and marginal risk
        let cov_w: Vec<f64> = (0..n)
            .map(|i| (0..n).map(|j| cov[i][j] * weights[j]).sum())
            .collect();
        let variance: f64 = (0..n).map(|i| weights[i] * cov_w[i]).sum();
        if variance <= 0.0 {
            break;
        }
        let portfolio_vol = variance.sqrt();

        let contributions: Vec<f64> = (0..n)
            .map(|i| weights[i] * cov_w[i] / portfolio_vol)
            .collect();
        let target = portfolio_vol / n as f64;

        let dispersion = contributions
            .iter()
            .map(|rc| (rc - target).abs())
            .fold(0.0, f64::max);
        if dispersion < 1e-6 {
            break;
        }

        // Damped multiplicative reweighting toward equal contribution
        let mut adjusted: Vec<f64> = contributions
            .iter()
            .zip(&weights)
            .map(|(&rc, &w)| if rc > 0.0 { w * target / rc } else { w })
            .collect();
        let sum: f64 = adjusted.iter().sum();
        if sum <= 0.0 {
            break;
        }
        for a in adjusted.iter_mut() {
            *a /= sum;
        }

        for i in 0..n {
            weights[i] = 0.5 * weights[i] + 0.5 * adjusted[i];
        }
        let norm: f64 = weights.iter().sum();
        for w in weights.iter_mut() {
            *w /= norm;
        }
    }

    weights
}
