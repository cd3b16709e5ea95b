mod account;
mod holding;
mod portfolio;
mod stock;
mod transaction;

pub use account::*;
pub use holding::*;
pub use portfolio::*;
pub use stock::*;
pub use transaction::*;
