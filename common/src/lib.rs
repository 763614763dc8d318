//! Exchange vocabulary shared by the trading engine and its front ends.

pub mod types;

pub use types::*;
