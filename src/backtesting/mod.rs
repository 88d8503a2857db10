// Backtesting engine: day-by-day simulation over historical bars

pub mod costs;
pub mod engine;
pub mod portfolio;
pub mod position;
pub mod result;
pub mod sizing;
pub mod snapshot;
pub mod trade;
pub mod walk_forward;

pub use costs::TransactionCostModel;
pub use engine::{run_backtest, validate_config, BacktestConfig, BacktestInputs};
pub use result::BacktestResult;
pub use snapshot::PortfolioSnapshot;
pub use trade::{Trade, TradeSide};
