use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use serde::Deserialize;
use services_common::utils::{
    decode_success_or_raw, limiter::LimiterGuard, period_fetch::FetchExecutor,
};

use super::{trim_base, HttpClientConfig};

/// Used until the first price arrives.
pub const DEFAULT_ETH_USD: f64 = 2500.0;

#[derive(Debug, Deserialize, Clone, serde_derive_default::Default)]
pub struct CoinGeckoConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub http: HttpClientConfig,
}

fn default_base_url() -> String {
    "https://api.coingecko.com".to_string()
}

pub struct CoinGeckoClient {
    client: LimiterGuard<reqwest::Client>,
    config: Arc<CoinGeckoConfig>,
}

impl CoinGeckoClient {
    pub fn new(config: CoinGeckoConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config.http.client()?,
            config: Arc::new(config),
        })
    }

    pub async fn eth_usd(&self) -> anyhow::Result<f64> {
        let response = self
            .client
            .use_single()
            .await
            .get(format!(
                "{}/api/v3/simple/price",
                trim_base(&self.config.base_url)
            ))
            .query(&[("ids", "ethereum"), ("vs_currencies", "usd")])
            .send()
            .await?;
        let prices: HashMap<String, HashMap<String, f64>> = decode_success_or_raw(response).await?;
        prices
            .get("ethereum")
            .and_then(|currencies| currencies.get("usd"))
            .copied()
            .filter(|usd| usd.is_finite() && *usd > 0.0)
            .context("coingecko response has no ethereum usd price")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EthPrice {
    pub marker: u64,
    pub usd: f64,
}

impl PartialEq for EthPrice {
    fn eq(&self, other: &Self) -> bool {
        self.marker == other.marker
    }
}

impl PartialOrd for EthPrice {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.marker.partial_cmp(&other.marker)
    }
}

pub struct EthPriceFetcher {
    client: CoinGeckoClient,
    marker: u64,
}

impl EthPriceFetcher {
    pub fn new(client: CoinGeckoClient) -> Self {
        Self { client, marker: 0 }
    }
}

#[async_trait::async_trait]
impl FetchExecutor<EthPrice> for EthPriceFetcher {
    fn name(&self) -> &'static str {
        "eth-usd-price"
    }

    async fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fetch(&mut self) -> anyhow::Result<EthPrice> {
        let usd = self.client.eth_usd().await?;
        self.marker += 1;
        Ok(EthPrice {
            marker: self.marker,
            usd,
        })
    }
}
