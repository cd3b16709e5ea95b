pub mod trading;
pub mod valuation;

pub use trading::{TradeError, TradingService};
pub use valuation::value_portfolio;
