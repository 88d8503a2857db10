// Cross-asset correlation and concentration analytics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::stats;

/// Minimum overlapping return samples for a meaningful estimate; shorter
/// histories fall back to the identity matrix.
pub const MIN_COMMON_LENGTH: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    /// Row-major Pearson coefficients; diagonal is exactly 1.
    pub matrix: Vec<Vec<f64>>,
    pub avg_correlation: f64,
    pub max_correlation: f64,
    pub min_correlation: f64,
    /// 1 - mean |off-diagonal|.
    pub diversification_ratio: f64,
    /// n(1-ρ̄) / (1 + (n-1)ρ̄) on the mean off-diagonal correlation.
    pub effective_assets: f64,
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let ma = stats::mean(a);
    let mb = stats::mean(b);

    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for i in 0..n {
        let da = a[i] - ma;
        let db = b[i] - mb;
        cov += da * db;
        va += da * da;
        vb += db * db;
    }
    if va == 0.0 || vb == 0.0 {
        return 0.0;
    }
    let corr = cov / (va.sqrt() * vb.sqrt());
    if corr.is_finite() { corr } else { 0.0 }
}

fn identity(symbols: Vec<String>) -> CorrelationMatrix {
    let n = symbols.len();
    let matrix = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    CorrelationMatrix {
        symbols,
        matrix,
        avg_correlation: 0.0,
        max_correlation: if n > 1 { 0.0 } else { 1.0 },
        min_correlation: if n > 1 { 0.0 } else { 1.0 },
        diversification_ratio: 1.0,
        effective_assets: n as f64,
    }
}

/// Pearson correlation matrix over per-symbol daily returns, truncated to
/// the common trailing length.
pub fn correlation_matrix(returns_by_symbol: &BTreeMap<String, Vec<f64>>) -> CorrelationMatrix {
    let symbols: Vec<String> = returns_by_symbol.keys().cloned().collect();
    let n = symbols.len();
    if n < 2 {
        return identity(symbols);
    }

    let min_len = returns_by_symbol.values().map(|r| r.len()).min().unwrap_or(0);
    if min_len < MIN_COMMON_LENGTH {
        return identity(symbols);
    }

    // Align on the trailing min_len samples
    let aligned: Vec<&[f64]> = symbols
        .iter()
        .map(|s| {
            let r = &returns_by_symbol[s];
            &r[r.len() - min_len..]
        })
        .collect();

    let mut matrix = vec![vec![0.0; n]; n];
    let mut off_diagonal = Vec::new();
    for i in 0..n {
        for j in 0..n {
            let corr = if i == j {
                1.0
            } else {
                pearson(aligned[i], aligned[j])
            };
            matrix[i][j] = corr;
            if i != j {
                off_diagonal.push(corr.abs());
            }
        }
    }

    let avg = stats::mean(&off_diagonal);
    let max = off_diagonal.iter().copied().fold(0.0, f64::max);
    let min = off_diagonal.iter().copied().fold(1.0, f64::min);

    let effective_assets = if avg < 1.0 {
        n as f64 * (1.0 - avg) / (1.0 + (n as f64 - 1.0) * avg)
    } else {
        1.0
    };

    CorrelationMatrix {
        symbols,
        matrix,
        avg_correlation: avg,
        max_correlation: max,
        min_correlation: min,
        diversification_ratio: 1.0 - avg,
        effective_assets,
    }
}

/// Position-weight concentration measures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcentrationMetrics {
    pub num_positions: usize,
    pub largest_position_weight: f64,
    pub herfindahl_index: f64,
    /// 1 / Herfindahl; equals the position count under equal weights.
    pub effective_positions: f64,
}

pub fn concentration(weights: &[f64]) -> ConcentrationMetrics {
    let herfindahl: f64 = weights.iter().map(|w| w * w).sum();
    ConcentrationMetrics {
        num_positions: weights.len(),
        largest_position_weight: weights.iter().copied().fold(0.0, f64::max),
        herfindahl_index: herfindahl,
        effective_positions: if herfindahl > 0.0 { 1.0 / herfindahl } else { 0.0 },
    }
}
