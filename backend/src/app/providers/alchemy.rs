use std::sync::Arc;

use serde::Deserialize;
use services_common::utils::{decode_success_or_raw, limiter::LimiterGuard};
use tracing::debug;

use super::{trim_base, HttpClientConfig};
use crate::app::{
    history::RawSale,
    reconciler::{NftSource, OwnedNftsPage},
};

pub const OWNED_PAGE_SIZE: u32 = 100;
pub const COLLECTION_SALES_LIMIT: u32 = 100;
pub const TOKEN_SALES_LIMIT: u32 = 50;

#[derive(Debug, Deserialize, Clone, serde_derive_default::Default)]
pub struct AlchemyConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub http: HttpClientConfig,
}

fn default_base_url() -> String {
    "https://base-mainnet.g.alchemy.com".to_string()
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OwnedNftsResponse {
    #[serde(default)]
    owned_nfts: Vec<serde_json::Value>,
    #[serde(default)]
    page_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SalesResponse {
    #[serde(default)]
    nft_sales: Vec<RawSale>,
}

pub struct AlchemyClient {
    client: LimiterGuard<reqwest::Client>,
    config: Arc<AlchemyConfig>,
}

impl AlchemyClient {
    pub fn new(config: AlchemyConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config.http.client()?,
            config: Arc::new(config),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/nft/v3/{}/{method}",
            trim_base(&self.config.base_url),
            self.config.api_key
        )
    }

    /// Recent sales, newest first. `token_id` narrows them to one token.
    pub async fn nft_sales(
        &self,
        contract: &str,
        token_id: Option<&str>,
    ) -> anyhow::Result<Vec<RawSale>> {
        let limit = match token_id {
            Some(_) => TOKEN_SALES_LIMIT,
            None => COLLECTION_SALES_LIMIT,
        };
        let mut query = vec![
            ("contractAddress", contract.to_owned()),
            ("order", "desc".to_owned()),
            ("limit", limit.to_string()),
        ];
        if let Some(token_id) = token_id {
            query.push(("tokenId", token_id.to_owned()));
        }
        let response = self
            .client
            .use_single()
            .await
            .get(self.endpoint("getNFTSales"))
            .query(&query)
            .send()
            .await?;
        let sales: SalesResponse = decode_success_or_raw(response).await?;
        debug!("fetched {} sales of {contract}", sales.nft_sales.len());
        Ok(sales.nft_sales)
    }
}

#[async_trait::async_trait]
impl NftSource for AlchemyClient {
    async fn owned_nfts_page(
        &self,
        owner: &str,
        page_key: Option<&str>,
    ) -> anyhow::Result<OwnedNftsPage> {
        let mut query = vec![
            ("owner", owner.to_owned()),
            ("withMetadata", "true".to_owned()),
            ("pageSize", OWNED_PAGE_SIZE.to_string()),
        ];
        if let Some(page_key) = page_key {
            query.push(("pageKey", page_key.to_owned()));
        }
        let response = self
            .client
            .use_single()
            .await
            .get(self.endpoint("getNFTsForOwner"))
            .query(&query)
            .send()
            .await?;
        let page: OwnedNftsResponse = decode_success_or_raw(response).await?;
        Ok(OwnedNftsPage {
            nfts: page.owned_nfts,
            page_key: page.page_key,
        })
    }
}
