use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use alloy_primitives::U256;
use anyhow::{bail, Context};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use services_common::utils::{decode_success_or_raw, limiter::LimiterGuard};
use tracing::debug;

use super::HttpClientConfig;
use crate::app::transfer::{TransactionParams, WalletProvider};

#[derive(Debug, Deserialize, Clone, serde_derive_default::Default)]
pub struct RpcConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub http: HttpClientConfig,
}

fn default_url() -> String {
    "https://mainnet.base.org".to_string()
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct RpcResponse<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// Minimal Ethereum JSON-RPC client.
pub struct RpcClient {
    client: LimiterGuard<reqwest::Client>,
    config: Arc<RpcConfig>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(config: RpcConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config.http.client()?,
            config: Arc::new(config),
            next_id: AtomicU64::new(1),
        })
    }

    /// `Ok(None)` when the node answered with a null result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<Option<T>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let response = self
            .client
            .use_single()
            .await
            .post(&self.config.url)
            .json(&request)
            .send()
            .await?;
        let response: RpcResponse<T> = decode_success_or_raw(response).await?;
        if let Some(RpcError { code, message }) = response.error {
            bail!("{method} failed with rpc error {code}: {message}");
        }
        Ok(response.result)
    }

    pub async fn get_balance(&self, address: &str) -> anyhow::Result<U256> {
        let raw: String = self
            .call("eth_getBalance", json!([address, "latest"]))
            .await?
            .context("eth_getBalance returned no result")?;
        let hex = raw
            .strip_prefix("0x")
            .with_context(|| format!("balance {raw} is not hex"))?;
        U256::from_str_radix(hex, 16).with_context(|| format!("balance {raw} is not hex"))
    }
}

#[async_trait::async_trait]
impl WalletProvider for RpcClient {
    async fn send_transaction(&self, params: &TransactionParams) -> anyhow::Result<Option<String>> {
        debug!("eth_sendTransaction to {} from {}", params.to, params.from);
        self.call("eth_sendTransaction", json!([params])).await
    }
}

/// Wei in ETH with four decimals, as the wallet header shows it.
pub fn format_eth(wei: U256) -> String {
    let eth = wei.to_string().parse::<f64>().unwrap_or_default() / 1e18;
    format!("{eth:.4}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::transfer::SAFE_TRANSFER_FROM_SELECTOR;
    use alloy_primitives::{Address, Bytes};
    use axum::{routing::post, Json, Router};
    use services_common::utils::tests::spawn_router;

    async fn node(Json(request): Json<serde_json::Value>) -> Json<serde_json::Value> {
        let id = request["id"].clone();
        match request["method"].as_str() {
            Some("eth_getBalance") => {
                assert_eq!(request["params"], json!(["0xabc", "latest"]));
                Json(json!({ "jsonrpc": "2.0", "id": id, "result": "0x1bc16d674ec80000" }))
            }
            Some("eth_sendTransaction") => {
                let tx = &request["params"][0];
                assert_eq!(tx["value"], "0x0");
                assert_eq!(tx["data"], "0x42842e0e");
                let to: Address = serde_json::from_value(tx["to"].clone()).unwrap();
                if to == REJECT {
                    Json(json!({ "jsonrpc": "2.0", "id": id, "error": { "code": 4001, "message": "User rejected" } }))
                } else if to == NO_HASH {
                    Json(json!({ "jsonrpc": "2.0", "id": id, "result": null }))
                } else {
                    Json(json!({ "jsonrpc": "2.0", "id": id, "result": "0xfeed" }))
                }
            }
            _ => Json(json!({ "jsonrpc": "2.0", "id": id, "error": { "code": -32601, "message": "method not found" } })),
        }
    }

    async fn client() -> RpcClient {
        let url = spawn_router(Router::new().route("/", post(node))).await.unwrap();
        RpcClient::new(RpcConfig {
            url,
            ..Default::default()
        })
        .unwrap()
    }

    const REJECT: Address = Address::repeat_byte(0x0e);
    const NO_HASH: Address = Address::repeat_byte(0x0f);

    fn tx(to: Address) -> TransactionParams {
        TransactionParams {
            from: Address::repeat_byte(0x11),
            to,
            data: Bytes::from_static(&SAFE_TRANSFER_FROM_SELECTOR),
            value: U256::ZERO,
        }
    }

    #[tokio::test]
    async fn test_balance() -> anyhow::Result<()> {
        let client = client().await;
        let balance = client.get_balance("0xabc").await?;
        assert_eq!(balance, U256::from(2_000_000_000_000_000_000u128));
        assert_eq!(format_eth(balance), "2.0000");
        Ok(())
    }

    #[tokio::test]
    async fn test_send_transaction() -> anyhow::Result<()> {
        let client = client().await;
        assert_eq!(
            client.send_transaction(&tx(Address::repeat_byte(0xcc))).await?,
            Some("0xfeed".to_owned())
        );
        assert_eq!(client.send_transaction(&tx(NO_HASH)).await?, None);

        let err = client.send_transaction(&tx(REJECT)).await.unwrap_err();
        assert!(err.to_string().contains("User rejected"), "{err}");
        Ok(())
    }

    #[test]
    fn test_format_eth() {
        assert_eq!(format_eth(U256::ZERO), "0.0000");
        assert_eq!(format_eth(U256::from(123_456_789_000_000_000u64)), "0.1235");
    }
}
