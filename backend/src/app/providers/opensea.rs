use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use services_common::utils::{decode_success_or_raw, limiter::LimiterGuard};
use tracing::warn;
use utoipa::ToSchema;

use super::{trim_base, HttpClientConfig};

#[derive(Debug, Deserialize, Clone, serde_derive_default::Default)]
pub struct OpenSeaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_chain")]
    pub chain: String,
    #[serde(default)]
    pub http: HttpClientConfig,
}

fn default_base_url() -> String {
    "https://api.opensea.io".to_string()
}

fn default_chain() -> String {
    "base".to_string()
}

/// Collection market data shown next to an NFT. Unknown values are null.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMarketData {
    pub collection_floor: Option<f64>,
    pub top_offer: Option<f64>,
    pub description: Option<String>,
    pub supply: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ContractNfts {
    #[serde(default)]
    nfts: Vec<ContractNft>,
}

#[derive(Debug, Deserialize)]
struct ContractNft {
    #[serde(default)]
    collection: Option<String>,
}

#[serde_as]
#[derive(Debug, Deserialize, Default)]
struct StatsTotal {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    floor_price: Option<f64>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    best_offer: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct CollectionStats {
    #[serde(default)]
    total: Option<StatsTotal>,
}

#[serde_as]
#[derive(Debug, Deserialize, Default)]
struct CollectionDetails {
    #[serde(default)]
    description: Option<String>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    total_supply: Option<u64>,
}

pub struct OpenSeaClient {
    client: LimiterGuard<reqwest::Client>,
    config: Arc<OpenSeaConfig>,
}

impl OpenSeaClient {
    pub fn new(config: OpenSeaConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config.http.client()?,
            config: Arc::new(config),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .context("opensea api key is not configured")?;
        let response = self
            .client
            .use_single()
            .await
            .get(format!("{}{path}", trim_base(&self.config.base_url)))
            .header("x-api-key", api_key)
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await?;
        decode_success_or_raw(response).await
    }

    pub async fn collection_slug(&self, contract: &str) -> anyhow::Result<Option<String>> {
        let nfts: ContractNfts = self
            .get(&format!(
                "/api/v2/chain/{}/contract/{contract}/nfts?limit=1",
                self.config.chain
            ))
            .await?;
        Ok(nfts
            .nfts
            .into_iter()
            .next()
            .and_then(|nft| nft.collection)
            .filter(|slug| !slug.is_empty()))
    }

    /// Floor and best offer from the stats, description and supply from the
    /// collection itself. A missing collection yields all nulls.
    pub async fn market_data(&self, contract: &str) -> anyhow::Result<CollectionMarketData> {
        let Some(slug) = self.collection_slug(contract).await? else {
            return Ok(CollectionMarketData::default());
        };
        let stats: CollectionStats = self.get(&format!("/api/v2/collections/{slug}/stats")).await?;
        let details = self
            .get::<CollectionDetails>(&format!("/api/v2/collections/{slug}"))
            .await
            .unwrap_or_else(|err| {
                warn!("failed to fetch opensea collection {slug}: {err:#}");
                CollectionDetails::default()
            });
        let total = stats.total.unwrap_or_default();
        Ok(CollectionMarketData {
            collection_floor: total.floor_price,
            top_offer: total.best_offer,
            description: details.description,
            supply: details.total_supply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::HeaderMap, routing::get, Json, Router};
    use serde_json::json;
    use services_common::utils::tests::spawn_router;

    fn check_key(headers: &HeaderMap) {
        assert_eq!(headers["x-api-key"], "secret");
    }

    async fn client(router: Router, api_key: Option<&str>) -> OpenSeaClient {
        OpenSeaClient::new(OpenSeaConfig {
            base_url: spawn_router(router).await.unwrap(),
            api_key: api_key.map(Into::into),
            ..Default::default()
        })
        .unwrap()
    }

    fn upstream() -> Router {
        Router::new()
            .route(
                "/api/v2/chain/base/contract/{contract}/nfts",
                get(|Path(contract): Path<String>, headers: HeaderMap| async move {
                    check_key(&headers);
                    match contract.as_str() {
                        "0xknown" => Json(json!({ "nfts": [{ "collection": "based-punks" }] })),
                        _ => Json(json!({ "nfts": [] })),
                    }
                }),
            )
            .route(
                "/api/v2/collections/based-punks/stats",
                get(|headers: HeaderMap| async move {
                    check_key(&headers);
                    Json(json!({ "total": { "floor_price": 0.042, "best_offer": "0.04" } }))
                }),
            )
            .route(
                "/api/v2/collections/based-punks",
                get(|| async { Json(json!({ "description": "punks on base", "total_supply": 10000 })) }),
            )
    }

    #[tokio::test]
    async fn test_market_data() -> anyhow::Result<()> {
        let client = client(upstream(), Some("secret")).await;
        let data = client.market_data("0xknown").await?;
        assert_eq!(
            data,
            CollectionMarketData {
                collection_floor: Some(0.042),
                top_offer: Some(0.04),
                description: Some("punks on base".into()),
                supply: Some(10000),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_collection_is_all_null() -> anyhow::Result<()> {
        let client = client(upstream(), Some("secret")).await;
        assert_eq!(
            client.market_data("0xunknown").await?,
            CollectionMarketData::default()
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_key_is_an_error() {
        let client = client(upstream(), None).await;
        assert!(client.market_data("0xknown").await.is_err());
    }
}
