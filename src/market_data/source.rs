// Collaborator interfaces consumed by the engine
// Market data and the clock are injected; the core never talks to the
// network itself.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::models::OptionContract;

use super::csv_loader;
use super::panel::PricePanel;

/// One quoted contract on an options chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionQuote {
    pub contract: OptionContract,
    pub bid: f64,
    pub ask: f64,
    pub last: f64,
    pub open_interest: f64,
}

/// Historical market data provider. Calls may suspend; each call is
/// expected to respect the per-call deadline applied by the caller.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Daily OHLCV bars for the given symbols over [start, end].
    async fn fetch_prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<PricePanel>;

    /// Daily benchmark returns aligned to business days.
    async fn fetch_benchmark_returns(
        &self,
        benchmark_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<f64>>;

    /// Daily annualised risk-free rate series.
    async fn fetch_risk_free_rate(
        &self,
        source: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<f64>>;

    /// Listed chain for a symbol, optionally limited to one expiry.
    async fn fetch_options_chain(
        &self,
        symbol: &str,
        expiry: Option<NaiveDate>,
    ) -> EngineResult<Vec<OptionQuote>>;
}

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

/// Apply the per-call fetch deadline to a data-source future.
pub async fn with_deadline<T>(
    deadline: Duration,
    fut: impl std::future::Future<Output = EngineResult<T>>,
) -> EngineResult<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::data_unavailable(
            format!("data fetch exceeded {}s deadline", deadline.as_secs()),
            vec![],
        )),
    }
}

/// File-backed market data source: one `<symbol>.csv` per symbol under a
/// base directory. Benchmark returns are derived from the benchmark
/// symbol's own closes; the risk-free series is a flat configured rate.
pub struct CsvMarketData {
    base_dir: PathBuf,
    flat_risk_free_rate: f64,
}

impl CsvMarketData {
    pub fn new(base_dir: impl Into<PathBuf>, flat_risk_free_rate: f64) -> Self {
        Self {
            base_dir: base_dir.into(),
            flat_risk_free_rate,
        }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.base_dir.join(format!("{symbol}.csv"))
    }
}

#[async_trait]
impl MarketDataSource for CsvMarketData {
    async fn fetch_prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<PricePanel> {
        let files: Vec<(String, PathBuf)> = symbols
            .iter()
            .map(|s| (s.clone(), self.path_for(s)))
            .collect();
        let panel = csv_loader::load_panel(&files)?;
        panel.slice_dates(start, end)
    }

    async fn fetch_benchmark_returns(
        &self,
        benchmark_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<f64>> {
        let mut series = BTreeMap::new();
        series.insert(benchmark_id.to_string(), csv_loader::load_bars(self.path_for(benchmark_id))?);
        let panel = PricePanel::from_bars(&series)?.slice_dates(start, end)?;
        Ok(panel.daily_returns(0))
    }

    async fn fetch_risk_free_rate(
        &self,
        _source: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<Vec<f64>> {
        let days = (end - start).num_days().max(0) as usize + 1;
        Ok(vec![self.flat_risk_free_rate; days])
    }

    async fn fetch_options_chain(
        &self,
        symbol: &str,
        _expiry: Option<NaiveDate>,
    ) -> EngineResult<Vec<OptionQuote>> {
        Err(EngineError::data_unavailable(
            format!("csv source carries no options chain for {symbol}"),
            vec![symbol.to_string()],
        ))
    }
}

/// In-memory source for tests and demos: a pre-built panel plus optional
/// benchmark/risk-free series.
pub struct StaticMarketData {
    pub panel: PricePanel,
    pub benchmark_returns: Vec<f64>,
    pub risk_free_rate: Vec<f64>,
}

#[async_trait]
impl MarketDataSource for StaticMarketData {
    async fn fetch_prices(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> EngineResult<PricePanel> {
        let missing: Vec<String> = symbols
            .iter()
            .filter(|s| self.panel.symbol_index(s).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(EngineError::data_unavailable(
                format!("symbols not in static panel: {}", missing.join(", ")),
                missing,
            ));
        }
        self.panel.slice_dates(start, end)
    }

    async fn fetch_benchmark_returns(
        &self,
        _benchmark_id: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> EngineResult<Vec<f64>> {
        Ok(self.benchmark_returns.clone())
    }

    async fn fetch_risk_free_rate(
        &self,
        _source: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> EngineResult<Vec<f64>> {
        Ok(self.risk_free_rate.clone())
    }

    async fn fetch_options_chain(
        &self,
        symbol: &str,
        _expiry: Option<NaiveDate>,
    ) -> EngineResult<Vec<OptionQuote>> {
        Err(EngineError::data_unavailable(
            "static source carries no options chain",
            vec![symbol.to_string()],
        ))
    }
}
