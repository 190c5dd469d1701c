use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;
use services_common::utils::{decode_success_or_raw, limiter::LimiterGuard};

use super::{trim_base, HttpClientConfig};
use crate::app::search::{FarcasterUser, IdentityApi};

#[derive(Debug, Deserialize, Clone, serde_derive_default::Default)]
pub struct NeynarConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default)]
    pub http: HttpClientConfig,
}

fn default_base_url() -> String {
    "https://api.neynar.com".to_string()
}

/// Neynar's public documentation key, heavily rate limited.
fn default_api_key() -> String {
    "NEYNAR_API_DOCS".to_string()
}

#[derive(Debug, Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    result: SearchResult,
}

#[derive(Debug, Deserialize, Default)]
struct SearchResult {
    #[serde(default)]
    users: Vec<FarcasterUser>,
}

pub struct NeynarClient {
    client: LimiterGuard<reqwest::Client>,
    config: Arc<NeynarConfig>,
}

impl NeynarClient {
    pub fn new(config: NeynarConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config.http.client()?,
            config: Arc::new(config),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .use_single()
            .await
            .get(format!("{}{path}", trim_base(&self.config.base_url)))
            .header(http::header::ACCEPT, "application/json")
            .header("api_key", &self.config.api_key)
            .query(query)
            .send()
            .await?;
        decode_success_or_raw(response).await
    }
}

#[async_trait::async_trait]
impl IdentityApi for NeynarClient {
    async fn users_by_address(&self, address: &str) -> anyhow::Result<Vec<FarcasterUser>> {
        let by_address: HashMap<String, Vec<FarcasterUser>> = self
            .get(
                "/v2/farcaster/user/bulk-by-address",
                &[("addresses", address.to_owned())],
            )
            .await?;
        Ok(by_address.into_values().flatten().collect())
    }

    async fn search_users(&self, query: &str, limit: usize) -> anyhow::Result<Vec<FarcasterUser>> {
        let response: SearchResponse = self
            .get(
                "/v2/farcaster/user/search",
                &[("q", query.to_owned()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(response.result.users)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::app::search::{lookup, RecipientQuery};
    use axum::{extract::Query, http::HeaderMap, routing::get, Json, Router};
    use serde_json::json;
    use services_common::utils::tests::spawn_router;

    async fn client() -> NeynarClient {
        let router = Router::new()
            .route(
                "/v2/farcaster/user/bulk-by-address",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let address = params["addresses"].clone();
                    Json(json!({
                        address.clone(): [{
                            "fid": 3,
                            "username": "dwr",
                            "display_name": "Dan",
                            "custody_address": "0xcustody",
                            "verified_addresses": { "eth_addresses": [address] }
                        }]
                    }))
                }),
            )
            .route(
                "/v2/farcaster/user/search",
                get(|Query(params): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                    assert_eq!(headers["api_key"], "NEYNAR_API_DOCS");
                    assert_eq!(params["limit"], "5");
                    Json(json!({ "result": { "users": [
                        { "fid": 1, "username": params["q"], "custody_address": "0xc1" },
                        { "fid": 2, "username": "nowallet" }
                    ]}}))
                }),
            );
        NeynarClient::new(NeynarConfig {
            base_url: spawn_router(router).await.unwrap(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_username_search() {
        let client = client().await;
        let results = lookup(&client, &RecipientQuery::classify("vitalik")).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].username, "vitalik");
        assert_eq!(results[0].eth_address, "0xc1");
    }

    #[tokio::test]
    async fn test_address_search_prefers_verified() {
        let client = client().await;
        let address = "0x00000000000000000000000000000000000000aa";
        let results = lookup(&client, &RecipientQuery::classify(address)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].farcaster_id, 3);
        assert_eq!(results[0].display_name, "Dan");
        assert_eq!(results[0].eth_address, address);
    }
}
