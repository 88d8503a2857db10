// Market data contracts and ingestion

pub mod csv_loader;
pub mod panel;
pub mod source;

pub use panel::{Bar, PricePanel};
pub use source::{Clock, MarketDataSource, SystemClock};
