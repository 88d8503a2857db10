// Technical indicators over price panels

pub mod kernels;

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::market_data::panel::{Field, PricePanel};

/// Indicator identifiers. Parameterised variants carry their period so a
/// strategy can reference e.g. `SMA_5` alongside the standard set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Indicator {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd,
    MacdSignal,
    MacdHist,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
    Atr(usize),
    StochK,
    StochD,
    Obv,
    Adx(usize),
}

pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL_SPAN: usize = 9;
pub const STOCH_K_PERIOD: usize = 14;
pub const STOCH_D_PERIOD: usize = 3;

impl Indicator {
    /// The canonical set computed for every backtest.
    pub fn standard_set() -> Vec<Indicator> {
        vec![
            Indicator::Sma(20),
            Indicator::Sma(50),
            Indicator::Sma(200),
            Indicator::Ema(12),
            Indicator::Ema(26),
            Indicator::Rsi(14),
            Indicator::Macd,
            Indicator::MacdSignal,
            Indicator::MacdHist,
            Indicator::BollingerUpper,
            Indicator::BollingerMiddle,
            Indicator::BollingerLower,
            Indicator::Atr(14),
            Indicator::StochK,
            Indicator::StochD,
            Indicator::Obv,
            Indicator::Adx(14),
        ]
    }

    pub fn name(&self) -> String {
        match self {
            Indicator::Sma(p) => format!("SMA_{p}"),
            Indicator::Ema(p) => format!("EMA_{p}"),
            Indicator::Rsi(p) => format!("RSI_{p}"),
            Indicator::Macd => "MACD".to_string(),
            Indicator::MacdSignal => "MACD_SIGNAL".to_string(),
            Indicator::MacdHist => "MACD_HIST".to_string(),
            Indicator::BollingerUpper => "BB_UPPER".to_string(),
            Indicator::BollingerMiddle => "BB_MIDDLE".to_string(),
            Indicator::BollingerLower => "BB_LOWER".to_string(),
            Indicator::Atr(p) => format!("ATR_{p}"),
            Indicator::StochK => "STOCH_K".to_string(),
            Indicator::StochD => "STOCH_D".to_string(),
            Indicator::Obv => "OBV".to_string(),
            Indicator::Adx(p) => format!("ADX_{p}"),
        }
    }

    /// Parse an indicator reference from a rule. Bare names take the
    /// conventional default period (`RSI` = RSI_14, `ATR` = ATR_14,
    /// `ADX` = ADX_14, `SMA` = SMA_20, `EMA` = EMA_12). Unknown names are
    /// rejected at the boundary.
    pub fn parse(name: &str) -> EngineResult<Indicator> {
        let upper = name.trim().to_ascii_uppercase();
        let parsed = match upper.as_str() {
            "MACD" => Some(Indicator::Macd),
            "MACD_SIGNAL" => Some(Indicator::MacdSignal),
            "MACD_HIST" | "MACD_HISTOGRAM" => Some(Indicator::MacdHist),
            "BB_UPPER" => Some(Indicator::BollingerUpper),
            "BB_MIDDLE" => Some(Indicator::BollingerMiddle),
            "BB_LOWER" => Some(Indicator::BollingerLower),
            "STOCH_K" => Some(Indicator::StochK),
            "STOCH_D" => Some(Indicator::StochD),
            "OBV" => Some(Indicator::Obv),
            "RSI" => Some(Indicator::Rsi(14)),
            "ATR" => Some(Indicator::Atr(14)),
            "ADX" => Some(Indicator::Adx(14)),
            "SMA" => Some(Indicator::Sma(20)),
            "EMA" => Some(Indicator::Ema(12)),
            _ => None,
        };
        if let Some(ind) = parsed {
            return Ok(ind);
        }

        if let Some((prefix, period)) = upper.rsplit_once('_') {
            if let Ok(p) = period.parse::<usize>() {
                if p >= 1 {
                    match prefix {
                        "SMA" => return Ok(Indicator::Sma(p)),
                        "EMA" => return Ok(Indicator::Ema(p)),
                        "RSI" => return Ok(Indicator::Rsi(p)),
                        "ATR" => return Ok(Indicator::Atr(p)),
                        "ADX" => return Ok(Indicator::Adx(p)),
                        _ => {}
                    }
                }
            }
        }

        Err(EngineError::validation(format!("unknown indicator '{name}'")))
    }

    /// Overlay indicators live in price units and are evaluated relative
    /// to the close (rule value = close - indicator); oscillators are
    /// evaluated directly against the rule threshold.
    pub fn is_overlay(&self) -> bool {
        matches!(
            self,
            Indicator::Sma(_)
                | Indicator::Ema(_)
                | Indicator::BollingerUpper
                | Indicator::BollingerMiddle
                | Indicator::BollingerLower
        )
    }
}

/// Computed indicator series aligned with a panel's date axis, keyed by
/// (symbol column, indicator). One instance lives per job; it is never
/// shared across jobs.
pub struct IndicatorPanel {
    n_dates: usize,
    series: HashMap<(usize, Indicator), Vec<f64>>,
}

impl IndicatorPanel {
    /// Compute `set` for every symbol in the panel, fanning out per symbol
    /// on a dedicated rayon pool capped at `max_threads`.
    pub fn compute(panel: &PricePanel, set: &[Indicator], max_threads: usize) -> EngineResult<Self> {
        let set: BTreeSet<Indicator> = set.iter().copied().collect();
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let threads = max_threads.min(cores).clamp(1, 4);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| EngineError::numerical("indicator pool", e.to_string()))?;

        let per_symbol: Vec<HashMap<(usize, Indicator), Vec<f64>>> = pool.install(|| {
            (0..panel.n_symbols())
                .into_par_iter()
                .map(|col| compute_symbol(panel, col, &set))
                .collect()
        });

        let mut series = HashMap::new();
        for m in per_symbol {
            series.extend(m);
        }

        Ok(Self {
            n_dates: panel.n_dates(),
            series,
        })
    }

    /// Indicator value for (symbol column, date row); NaN = unavailable.
    pub fn value(&self, col: usize, indicator: Indicator, row: usize) -> f64 {
        self.series
            .get(&(col, indicator))
            .and_then(|s| s.get(row))
            .copied()
            .unwrap_or(f64::NAN)
    }

    pub fn n_dates(&self) -> usize {
        self.n_dates
    }

    pub fn contains(&self, col: usize, indicator: Indicator) -> bool {
        self.series.contains_key(&(col, indicator))
    }
}

fn compute_symbol(
    panel: &PricePanel,
    col: usize,
    set: &BTreeSet<Indicator>,
) -> HashMap<(usize, Indicator), Vec<f64>> {
    let close = panel.column(Field::Close, col);
    let high = panel.column(Field::High, col);
    let low = panel.column(Field::Low, col);
    let volume = panel.column(Field::Volume, col);

    let mut out = HashMap::new();

    let wants_macd = set
        .iter()
        .any(|i| matches!(i, Indicator::Macd | Indicator::MacdSignal | Indicator::MacdHist));
    if wants_macd {
        let (line, signal, hist) = kernels::macd(&close, MACD_FAST, MACD_SLOW, MACD_SIGNAL_SPAN);
        out.insert((col, Indicator::Macd), line);
        out.insert((col, Indicator::MacdSignal), signal);
        out.insert((col, Indicator::MacdHist), hist);
    }

    let wants_bollinger = set.iter().any(|i| {
        matches!(
            i,
            Indicator::BollingerUpper | Indicator::BollingerMiddle | Indicator::BollingerLower
        )
    });
    if wants_bollinger {
        let (upper, middle, lower) = kernels::bollinger(&close, BOLLINGER_PERIOD, BOLLINGER_WIDTH);
        out.insert((col, Indicator::BollingerUpper), upper);
        out.insert((col, Indicator::BollingerMiddle), middle);
        out.insert((col, Indicator::BollingerLower), lower);
    }

    let wants_stoch = set
        .iter()
        .any(|i| matches!(i, Indicator::StochK | Indicator::StochD));
    if wants_stoch {
        let (k, d) = kernels::stochastic(&high, &low, &close, STOCH_K_PERIOD, STOCH_D_PERIOD);
        out.insert((col, Indicator::StochK), k);
        out.insert((col, Indicator::StochD), d);
    }

    for indicator in set {
        match *indicator {
            Indicator::Sma(p) => {
                out.insert((col, *indicator), kernels::rolling_mean(&close, p));
            }
            Indicator::Ema(p) => {
                out.insert((col, *indicator), kernels::ema(&close, p));
            }
            Indicator::Rsi(p) => {
                out.insert((col, *indicator), kernels::rsi(&close, p));
            }
            Indicator::Atr(p) => {
                out.insert((col, *indicator), kernels::atr(&high, &low, &close, p));
            }
            Indicator::Adx(p) => {
                out.insert((col, *indicator), kernels::adx(&high, &low, &close, p));
            }
            Indicator::Obv => {
                out.insert((col, *indicator), kernels::obv(&close, &volume));
            }
            // Grouped families handled above
            Indicator::Macd
            | Indicator::MacdSignal
            | Indicator::MacdHist
            | Indicator::BollingerUpper
            | Indicator::BollingerMiddle
            | Indicator::BollingerLower
            | Indicator::StochK
            | Indicator::StochD => {}
        }
    }

    out
}
