pub mod adapters;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;

pub use adapters::{BinanceFuturesClient, DryRunClient, ExchangeClient};
pub use config::AppConfig;
pub use error::{EngineError, TransportError};
pub use executor::OrderExecutor;
