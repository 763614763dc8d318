use crate::error::TransportError;
use crate::executor::types::OrderRequest;
use async_trait::async_trait;
use common::{Balance, Order, SymbolInfo};
use rust_decimal::Decimal;

/// What the engine needs from an exchange.
///
/// Implementations own transport concerns (auth, HTTP, response parsing)
/// and report every failure as a [`TransportError`].
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn exchange_name(&self) -> &str;

    async fn ping(&self) -> Result<(), TransportError>;

    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, TransportError>;

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<Order, TransportError>;

    async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, TransportError>;

    async fn all_orders(&self, symbol: &str) -> Result<Vec<Order>, TransportError>;

    async fn balances(&self) -> Result<Vec<Balance>, TransportError>;

    /// Balance for one asset, `None` when the account holds no such asset.
    async fn balance(&self, asset: &str) -> Result<Option<Balance>, TransportError> {
        let asset = asset.trim().to_ascii_uppercase();
        Ok(self
            .balances()
            .await?
            .into_iter()
            .find(|b| b.asset == asset))
    }

    async fn symbols(&self) -> Result<Vec<SymbolInfo>, TransportError>;

    /// Perpetual contracts quoted in `quote_asset`, sorted by name.
    async fn tradable_pairs(&self, quote_asset: &str) -> Result<Vec<String>, TransportError> {
        let quote_asset = quote_asset.trim().to_ascii_uppercase();
        let mut pairs: Vec<String> = self
            .symbols()
            .await?
            .into_iter()
            .filter(|s| s.is_perpetual() && s.quote_asset == quote_asset)
            .map(|s| s.symbol)
            .collect();
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }

    /// Net signed position size for `symbol` (negative when short).
    async fn position(&self, symbol: &str) -> Result<Decimal, TransportError>;
}
