use serde::Deserialize;
use services_common::{api::server::ApiConfig, utils::period_fetch::PeriodicFetcherConfig};

use crate::app::{providers::ProvidersConfig, storage::StorageConfig, FeedbackConfig};

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    /// Without a database, hide-lists and recipients live in memory.
    #[serde(default)]
    pub db: Option<StorageConfig>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub fetchers: FetchersConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

#[derive(Deserialize, Debug, Clone, serde_derive_default::Default)]
pub struct FetchersConfig {
    #[serde(default = "default_eth_price")]
    pub eth_price: PeriodicFetcherConfig,
}

fn default_eth_price() -> PeriodicFetcherConfig {
    PeriodicFetcherConfig::every_minute()
}
