// Array kernels for technical indicators
//
// Every kernel is causal: output[t] depends only on inputs at index <= t.
// The first `period` samples of a rolling statistic are warm-up and read
// as NaN; NaN inputs inside a window propagate to the output instead of
// being zero-filled.

/// Rolling mean over windows of `period` samples ending at t.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Rolling sample standard deviation (ddof = 1).
pub fn rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| {
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
        var.sqrt()
    })
}

pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

fn rolling(values: &[f64], period: usize, stat: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for t in period..values.len() {
        let window = &values[t + 1 - period..=t];
        if window.iter().all(|v| v.is_finite()) {
            out[t] = stat(window);
        }
    }
    out
}

/// Exponential moving average with smoothing 2/(span+1), seeded at the
/// first finite sample. Gap days repeat the prior state but stay marked
/// unavailable; the first `span` outputs are warm-up.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let Some(first) = values.iter().position(|v| v.is_finite()) else {
        return out;
    };

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut state = values[first];
    for t in first..values.len() {
        let x = values[t];
        if x.is_finite() {
            if t > first {
                state = alpha * x + (1.0 - alpha) * state;
            }
            if t >= first + span {
                out[t] = state;
            }
        }
    }
    out
}

/// RSI: 100 - 100/(1 + avg_gain/avg_loss), rolling means over `period`.
/// All-loss windows pin to 0, all-gain windows to 100; flat windows are
/// unavailable.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut gains = vec![f64::NAN; n];
    let mut losses = vec![f64::NAN; n];
    for t in 1..n {
        let delta = closes[t] - closes[t - 1];
        if delta.is_finite() {
            gains[t] = delta.max(0.0);
            losses[t] = (-delta).max(0.0);
        }
    }

    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| {
            if !g.is_finite() || !l.is_finite() {
                f64::NAN
            } else if l == 0.0 {
                if g > 0.0 { 100.0 } else { f64::NAN }
            } else {
                100.0 - 100.0 / (1.0 + g / l)
            }
        })
        .collect()
}

/// MACD line, signal line and histogram for (fast, slow, signal) spans.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);

    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(&f, &s)| f - s)
        .collect();
    let signal_line = ema(&line, signal);
    let hist: Vec<f64> = line
        .iter()
        .zip(&signal_line)
        .map(|(&m, &s)| m - s)
        .collect();

    (line, signal_line, hist)
}

/// Bollinger bands: (upper, middle, lower) at `width` standard deviations.
pub fn bollinger(closes: &[f64], period: usize, width: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = rolling_mean(closes, period);
    let std = rolling_std(closes, period);

    let upper = middle
        .iter()
        .zip(&std)
        .map(|(&m, &s)| m + width * s)
        .collect();
    let lower = middle
        .iter()
        .zip(&std)
        .map(|(&m, &s)| m - width * s)
        .collect();
    (upper, middle, lower)
}

/// True range series: max(h-l, |h-prev_close|, |l-prev_close|).
fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = close.len();
    let mut tr = vec![f64::NAN; n];
    for t in 1..n {
        let hl = high[t] - low[t];
        let hc = (high[t] - close[t - 1]).abs();
        let lc = (low[t] - close[t - 1]).abs();
        let v = hl.max(hc).max(lc);
        if v.is_finite() {
            tr[t] = v;
        }
    }
    tr
}

/// Average true range as a rolling mean of the true range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    rolling_mean(&true_range(high, low, close), period)
}

/// Stochastic oscillator: %K over `k_period`, %D as an SMA(%K, d_period).
pub fn stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_period: usize,
    d_period: usize,
) -> (Vec<f64>, Vec<f64>) {
    let lowest = rolling_min(low, k_period);
    let highest = rolling_max(high, k_period);

    let k: Vec<f64> = close
        .iter()
        .zip(lowest.iter().zip(&highest))
        .map(|(&c, (&lo, &hi))| {
            let range = hi - lo;
            if !c.is_finite() || !range.is_finite() || range <= 0.0 {
                f64::NAN
            } else {
                100.0 * (c - lo) / range
            }
        })
        .collect();
    let d = rolling_mean(&k, d_period);
    (k, d)
}

/// On-balance volume, cumulative from zero. Gap days repeat the running
/// total but stay unavailable.
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let n = close.len();
    let mut out = vec![f64::NAN; n];
    let mut total = 0.0;
    let mut prev_close: Option<f64> = None;

    for t in 0..n {
        if close[t].is_finite() && volume[t].is_finite() {
            if let Some(p) = prev_close {
                if close[t] > p {
                    total += volume[t];
                } else if close[t] < p {
                    total -= volume[t];
                }
            }
            prev_close = Some(close[t]);
            out[t] = total;
        }
    }
    out
}

/// Average directional index over `period`, with directional movement and
/// the true range smoothed by rolling means.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = close.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for t in 1..n {
        let up = high[t] - high[t - 1];
        let down = low[t - 1] - low[t];
        if up.is_finite() && down.is_finite() {
            plus_dm[t] = if up > down && up > 0.0 { up } else { 0.0 };
            minus_dm[t] = if down > up && down > 0.0 { down } else { 0.0 };
        }
    }

    let tr_smooth = rolling_mean(&true_range(high, low, close), period);
    let plus_smooth = rolling_mean(&plus_dm, period);
    let minus_smooth = rolling_mean(&minus_dm, period);

    let dx: Vec<f64> = (0..n)
        .map(|t| {
            let (tr, p, m) = (tr_smooth[t], plus_smooth[t], minus_smooth[t]);
            if !tr.is_finite() || !p.is_finite() || !m.is_finite() || tr <= 0.0 {
                return f64::NAN;
            }
            let plus_di = 100.0 * p / tr;
            let minus_di = 100.0 * m / tr;
            let denom = plus_di + minus_di;
            if denom == 0.0 {
                f64::NAN
            } else {
                100.0 * (plus_di - minus_di).abs() / denom
            }
        })
        .collect();

    rolling_mean(&dx, period)
}
