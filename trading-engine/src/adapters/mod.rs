pub mod adapter;
pub mod binance;
pub mod dry_run;
pub mod idempotent;
pub mod response_handler;
pub mod signer;

pub use adapter::ExchangeClient;
pub use binance::BinanceFuturesClient;
pub use dry_run::DryRunClient;
pub use idempotent::ClientOrderIds;
pub use signer::Signer;
