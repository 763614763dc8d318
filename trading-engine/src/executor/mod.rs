pub mod cancel;
mod dispatch;
pub mod executor;
pub mod grid;
pub mod order_builder;
pub mod twap;
pub mod types;

pub use cancel::{cancellation, CancelHandle, CancelSignal};
pub use executor::{ExecutionHandle, OrderExecutor};
pub use grid::GridLadderGenerator;
pub use order_builder::OrderRequestBuilder;
pub use twap::TwapScheduler;
pub use types::*;
