use super::adapter::ExchangeClient;
use super::idempotent::ClientOrderIds;
use super::response_handler::handle_response;
use super::signer::Signer;
use crate::config::{Credentials, ExchangeConfig};
use crate::error::TransportError;
use crate::executor::types::{OrderRequest, OrderSpec};
use async_trait::async_trait;
use chrono::Utc;
use common::{Balance, Order, SymbolInfo};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRisk {
    symbol: String,
    position_amt: Decimal,
}

#[derive(Debug, Clone)]
pub struct BinanceFuturesClient {
    http: Client,
    base_url: String,
    signer: Option<Signer>,
    recv_window_ms: u64,
    order_ids: ClientOrderIds,
}

impl BinanceFuturesClient {
    pub fn new(
        config: &ExchangeConfig,
        credentials: Option<&Credentials>,
    ) -> Result<Self, TransportError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url,
            signer: credentials.map(|c| Signer::new(c.api_key.clone(), c.secret_key.clone())),
            recv_window_ms: config.recv_window_ms,
            order_ids: ClientOrderIds::new(&config.client_order_id_prefix),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn public<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let mut url = format!("{}{}", self.base_url, path);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&serde_urlencoded::to_string(params)?);
        }

        debug!("GET {}", path);
        let resp = self.http.get(&url).send().await?;
        handle_response(resp).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<T, TransportError> {
        let signer = self.signer.as_ref().ok_or(TransportError::MissingCredentials)?;

        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));
        let query = serde_urlencoded::to_string(&params)?;
        let signature = signer.sign(&query);
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);

        debug!("{} {}", method, path);
        let resp = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, signer.api_key())
            .send()
            .await?;
        handle_response(resp).await
    }
}

/// Wire parameters for a new order, in the exchange's field names.
pub fn order_params(request: &OrderRequest, client_order_id: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", request.symbol.clone()),
        ("side", request.side.as_str().to_string()),
        ("type", request.kind().as_str().to_string()),
        ("quantity", decimal_param(request.quantity)),
    ];

    match request.spec {
        OrderSpec::Market => {}
        OrderSpec::Limit {
            price,
            time_in_force,
        } => {
            params.push(("price", decimal_param(price)));
            params.push(("timeInForce", time_in_force.as_str().to_string()));
        }
        OrderSpec::Stop {
            price,
            stop_price,
            time_in_force,
        } => {
            params.push(("price", decimal_param(price)));
            params.push(("stopPrice", decimal_param(stop_price)));
            params.push(("timeInForce", time_in_force.as_str().to_string()));
        }
        OrderSpec::StopMarket { stop_price } => {
            params.push(("stopPrice", decimal_param(stop_price)));
        }
    }

    params.push(("newClientOrderId", client_order_id.to_string()));
    params
}

fn decimal_param(value: Decimal) -> String {
    value.normalize().to_string()
}

#[async_trait]
impl ExchangeClient for BinanceFuturesClient {
    fn exchange_name(&self) -> &str {
        "binance"
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let _: serde_json::Value = self.public("/fapi/v1/ping", &[]).await?;
        Ok(())
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<Order, TransportError> {
        let client_order_id = self.order_ids.next_id();
        let params = order_params(request, &client_order_id);
        self.signed(Method::POST, "/fapi/v1/order", params).await
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<Order, TransportError> {
        let params = vec![("symbol", symbol.to_string()), ("orderId", order_id.to_string())];
        self.signed(Method::DELETE, "/fapi/v1/order", params).await
    }

    async fn open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, TransportError> {
        let params = symbol
            .map(|s| vec![("symbol", s.to_string())])
            .unwrap_or_default();
        self.signed(Method::GET, "/fapi/v1/openOrders", params).await
    }

    async fn all_orders(&self, symbol: &str) -> Result<Vec<Order>, TransportError> {
        let params = vec![("symbol", symbol.to_string())];
        self.signed(Method::GET, "/fapi/v1/allOrders", params).await
    }

    async fn balances(&self) -> Result<Vec<Balance>, TransportError> {
        self.signed(Method::GET, "/fapi/v2/balance", Vec::new()).await
    }

    async fn symbols(&self) -> Result<Vec<SymbolInfo>, TransportError> {
        let info: ExchangeInfo = self.public("/fapi/v1/exchangeInfo", &[]).await?;
        Ok(info.symbols)
    }

    async fn position(&self, symbol: &str) -> Result<Decimal, TransportError> {
        let params = vec![("symbol", symbol.to_string())];
        let positions: Vec<PositionRisk> = self
            .signed(Method::GET, "/fapi/v2/positionRisk", params)
            .await?;

        // Hedge mode reports a LONG and a SHORT leg; their sum is the net size
        let mut legs = positions.into_iter().filter(|p| p.symbol == symbol).peekable();
        if legs.peek().is_none() {
            return Err(TransportError::NotFound(format!("position for {}", symbol)));
        }
        Ok(legs.map(|p| p.position_amt).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Side, TimeInForce};
    use rust_decimal_macros::dec;

    fn config() -> ExchangeConfig {
        ExchangeConfig {
            base_url: "https://testnet.binancefuture.com/".to_string(),
            ..ExchangeConfig::default()
        }
    }

    fn keys(params: &[(&'static str, String)]) -> Vec<&'static str> {
        params.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_client_new_trims_base_url() {
        let client = BinanceFuturesClient::new(&config(), None).unwrap();
        assert_eq!(client.base_url(), "https://testnet.binancefuture.com");
        assert_eq!(client.exchange_name(), "binance");
    }

    #[test]
    fn test_client_rejects_bad_url() {
        let config = ExchangeConfig {
            base_url: "not a url".to_string(),
            ..ExchangeConfig::default()
        };
        assert!(matches!(
            BinanceFuturesClient::new(&config, None),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_signed_call_without_credentials() {
        let client = BinanceFuturesClient::new(&config(), None).unwrap();
        let err = client.balances().await.unwrap_err();
        assert!(matches!(err, TransportError::MissingCredentials));
    }

    #[test]
    fn test_market_params() {
        let request = OrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            quantity: dec!(0.010),
            spec: OrderSpec::Market,
        };
        let params = order_params(&request, "fx-1");

        assert_eq!(keys(&params), vec!["symbol", "side", "type", "quantity", "newClientOrderId"]);
        assert_eq!(params[1].1, "BUY");
        assert_eq!(params[2].1, "MARKET");
        assert_eq!(params[3].1, "0.01");
    }

    #[test]
    fn test_limit_params_include_time_in_force() {
        let request = OrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: Side::Sell,
            quantity: dec!(1),
            spec: OrderSpec::Limit {
                price: dec!(65000.50),
                time_in_force: TimeInForce::GTC,
            },
        };
        let params = order_params(&request, "fx-2");

        assert_eq!(
            keys(&params),
            vec!["symbol", "side", "type", "quantity", "price", "timeInForce", "newClientOrderId"]
        );
        assert_eq!(params[4].1, "65000.5");
        assert_eq!(params[5].1, "GTC");
    }

    #[test]
    fn test_stop_params() {
        let stop = OrderRequest {
            symbol: "ETHUSDT".to_string(),
            side: Side::Sell,
            quantity: dec!(2),
            spec: OrderSpec::Stop {
                price: dec!(2990),
                stop_price: dec!(3000),
                time_in_force: TimeInForce::GTC,
            },
        };
        let params = order_params(&stop, "fx-3");
        assert_eq!(params[2].1, "STOP");
        assert!(keys(&params).contains(&"stopPrice"));
        assert!(keys(&params).contains(&"timeInForce"));

        let stop_market = OrderRequest {
            spec: OrderSpec::StopMarket { stop_price: dec!(3000) },
            ..stop
        };
        let params = order_params(&stop_market, "fx-4");
        assert_eq!(params[2].1, "STOP_MARKET");
        assert!(keys(&params).contains(&"stopPrice"));
        assert!(!keys(&params).contains(&"price"));
        assert!(!keys(&params).contains(&"timeInForce"));
    }
}
