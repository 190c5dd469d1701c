//! Clients of the third-party APIs the wallet view is built from.

use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use services_common::utils::limiter::{LimiterGuard, RateLimitConfig};

pub mod alchemy;
pub mod coingecko;
pub mod neynar;
pub mod opensea;
pub mod reservoir;
pub mod rpc;

#[derive(Deserialize, Debug, Clone, serde_derive_default::Default)]
pub struct HttpClientConfig {
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

pub fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

impl HttpClientConfig {
    pub fn client(&self) -> anyhow::Result<LimiterGuard<reqwest::Client>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("build http client")?;
        Ok(LimiterGuard::new(client, self.rate_limit.limiter()))
    }
}

#[derive(Deserialize, Debug, Clone, serde_derive_default::Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub alchemy: alchemy::AlchemyConfig,
    #[serde(default)]
    pub reservoir: reservoir::ReservoirConfig,
    #[serde(default)]
    pub opensea: opensea::OpenSeaConfig,
    #[serde(default)]
    pub coingecko: coingecko::CoinGeckoConfig,
    #[serde(default)]
    pub neynar: neynar::NeynarConfig,
    #[serde(default)]
    pub base_rpc: rpc::RpcConfig,
    /// Wallet node able to sign `eth_sendTransaction`, sends are refused without it.
    #[serde(default)]
    pub wallet_rpc: Option<rpc::RpcConfig>,
}

fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}
