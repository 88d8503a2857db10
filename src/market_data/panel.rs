// Daily OHLCV bars and the dense date×symbol price panel

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Bar invariants: low ≤ open,close ≤ high; volume ≥ 0; finite fields.
    pub fn validate(&self) -> EngineResult<()> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::validation(format!(
                "bar {} has non-finite fields", self.date
            )));
        }
        if self.low > self.open || self.low > self.close
            || self.high < self.open || self.high < self.close
        {
            return Err(EngineError::validation(format!(
                "bar {} violates low <= open,close <= high", self.date
            )));
        }
        if self.volume < 0.0 {
            return Err(EngineError::validation(format!(
                "bar {} has negative volume", self.date
            )));
        }
        Ok(())
    }
}

/// The OHLCV fields a panel stores per cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

/// Dense per-field matrices over a shared (dates × symbols) grid, plus an
/// availability bitmap. A cell is "unavailable" when the symbol had no bar
/// on that date; unavailable cells read as NaN and are never zero-filled.
#[derive(Debug, Clone)]
pub struct PricePanel {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    volume: Vec<f64>,
    available: Vec<bool>,
}

impl PricePanel {
    /// Build a panel from per-symbol bar series. The date axis is the
    /// sorted union of all bar dates; each series must be strictly
    /// increasing in date and pass bar validation.
    pub fn from_bars(series: &BTreeMap<String, Vec<Bar>>) -> EngineResult<Self> {
        if series.is_empty() {
            return Err(EngineError::data_unavailable("no symbols in panel", vec![]));
        }

        let mut dates: Vec<NaiveDate> = Vec::new();
        for (symbol, bars) in series {
            for pair in bars.windows(2) {
                if pair[1].date <= pair[0].date {
                    return Err(EngineError::validation(format!(
                        "bars for {symbol} are not strictly increasing at {}",
                        pair[1].date
                    )));
                }
            }
            for bar in bars {
                bar.validate()?;
                dates.push(bar.date);
            }
        }
        dates.sort_unstable();
        dates.dedup();

        if dates.is_empty() {
            return Err(EngineError::data_unavailable(
                "all symbols returned empty series",
                series.keys().cloned().collect(),
            ));
        }

        let symbols: Vec<String> = series.keys().cloned().collect();
        let cells = dates.len() * symbols.len();
        let mut panel = Self {
            dates,
            symbols,
            open: vec![f64::NAN; cells],
            high: vec![f64::NAN; cells],
            low: vec![f64::NAN; cells],
            close: vec![f64::NAN; cells],
            volume: vec![f64::NAN; cells],
            available: vec![false; cells],
        };

        for (col, symbol) in panel.symbols.clone().iter().enumerate() {
            for bar in &series[symbol] {
                let row = panel
                    .date_index(bar.date)
                    .expect("bar date is on the union axis");
                let idx = row * panel.symbols.len() + col;
                panel.open[idx] = bar.open;
                panel.high[idx] = bar.high;
                panel.low[idx] = bar.low;
                panel.close[idx] = bar.close;
                panel.volume[idx] = bar.volume;
                panel.available[idx] = true;
            }
        }

        Ok(panel)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn n_symbols(&self) -> usize {
        self.symbols.len()
    }

    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn is_available(&self, row: usize, col: usize) -> bool {
        self.available[row * self.symbols.len() + col]
    }

    /// Cell read; NaN when the cell is unavailable.
    pub fn value(&self, field: Field, row: usize, col: usize) -> f64 {
        let idx = row * self.symbols.len() + col;
        match field {
            Field::Open => self.open[idx],
            Field::High => self.high[idx],
            Field::Low => self.low[idx],
            Field::Close => self.close[idx],
            Field::Volume => self.volume[idx],
        }
    }

    pub fn close_at(&self, row: usize, col: usize) -> Option<f64> {
        self.is_available(row, col)
            .then(|| self.close[row * self.symbols.len() + col])
    }

    pub fn volume_at(&self, row: usize, col: usize) -> Option<f64> {
        self.is_available(row, col)
            .then(|| self.volume[row * self.symbols.len() + col])
    }

    /// Full column for one symbol and field, NaN where unavailable.
    pub fn column(&self, field: Field, col: usize) -> Vec<f64> {
        (0..self.dates.len())
            .map(|row| self.value(field, row, col))
            .collect()
    }

    /// Daily close-to-close returns for a symbol, skipping unavailable
    /// cells (a gap yields no return, not a zero).
    pub fn daily_returns(&self, col: usize) -> Vec<f64> {
        let closes = self.column(Field::Close, col);
        let mut returns = Vec::with_capacity(closes.len().saturating_sub(1));
        let mut prev: Option<f64> = None;
        for c in closes {
            if c.is_finite() {
                if let Some(p) = prev {
                    if p > 0.0 {
                        returns.push((c - p) / p);
                    }
                }
                prev = Some(c);
            }
        }
        returns
    }

    /// Fraction of cells that carry data, in [0, 1].
    pub fn coverage(&self) -> f64 {
        if self.available.is_empty() {
            return 0.0;
        }
        self.available.iter().filter(|&&a| a).count() as f64 / self.available.len() as f64
    }

    /// Restrict the date axis to [start, end], keeping symbols.
    pub fn slice_dates(&self, start: NaiveDate, end: NaiveDate) -> EngineResult<Self> {
        let rows: Vec<usize> = (0..self.dates.len())
            .filter(|&i| self.dates[i] >= start && self.dates[i] <= end)
            .collect();
        if rows.is_empty() {
            return Err(EngineError::data_unavailable(
                format!("no trading data between {start} and {end}"),
                self.symbols.clone(),
            ));
        }

        let n_sym = self.symbols.len();
        let pick = |src: &Vec<f64>| -> Vec<f64> {
            rows.iter()
                .flat_map(|&r| src[r * n_sym..(r + 1) * n_sym].iter().copied())
                .collect()
        };

        Ok(Self {
            dates: rows.iter().map(|&r| self.dates[r]).collect(),
            symbols: self.symbols.clone(),
            open: pick(&self.open),
            high: pick(&self.high),
            low: pick(&self.low),
            close: pick(&self.close),
            volume: pick(&self.volume),
            available: rows
                .iter()
                .flat_map(|&r| self.available[r * n_sym..(r + 1) * n_sym].iter().copied())
                .collect(),
        })
    }
}
