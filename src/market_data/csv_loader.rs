// CSV ingestion for daily OHLCV bars
// Expected header: date,open,high,low,close,volume

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::{EngineError, EngineResult};

use super::panel::{Bar, PricePanel};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load one symbol's bars from a CSV file, sorted ascending by date.
pub fn load_bars<P: AsRef<Path>>(path: P) -> EngineResult<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut bars = Vec::new();

    for row in reader.deserialize() {
        let row: CsvRow = row?;
        let date: NaiveDate = row.date.parse().map_err(|_| {
            EngineError::validation(format!("unparseable date '{}' in {}", row.date,
                                            path.as_ref().display()))
        })?;
        let bar = Bar {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        bar.validate()?;
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(EngineError::data_unavailable(
            format!("no rows in {}", path.as_ref().display()),
            vec![],
        ));
    }

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

/// Load a panel from one CSV file per symbol.
pub fn load_panel(files: &[(String, std::path::PathBuf)]) -> EngineResult<PricePanel> {
    let mut series = BTreeMap::new();
    let mut missing = Vec::new();

    for (symbol, path) in files {
        match load_bars(path) {
            Ok(bars) => {
                series.insert(symbol.clone(), bars);
            }
            Err(err) => {
                log::warn!("skipping {symbol}: {err}");
                missing.push(symbol.clone());
            }
        }
    }

    if series.is_empty() {
        return Err(EngineError::data_unavailable(
            "no symbol file could be loaded",
            missing,
        ));
    }

    PricePanel::from_bars(&series)
}
