//! Per-wallet routes: balance, the reconciled collection, hide-list, recipients and sends.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Router,
};
use services_common::api::response::{ApiError, AppJson, ErrorResponse};

use super::BackendState;
use crate::app::{
    exposed::{
        BalanceResponse, CollectionQuery, CollectionResponse, CollectionStats, HideListResponse,
        IdsRequest, RecipientsResponse, SearchQuery, SendRequest, SendResponse,
    },
    search::SearchOutcome,
};

pub fn router() -> Router<BackendState> {
    Router::new()
        .nest(
            "/wallet/{address}",
            Router::new()
                .route("/balance", get(balance))
                .route("/stats", get(stats))
                .route("/collection", get(collection))
                .route("/hide", post(hide))
                .route("/unhide", post(unhide))
                .route("/recipients", get(recipients))
                .route("/send", post(send)),
        )
        .route("/recipients/search", get(search_recipients))
}

fn owner(address: String) -> Result<String, ApiError> {
    let address = address.trim().to_lowercase();
    if address.is_empty() {
        return Err(ApiError::invalid("Wallet address is required"));
    }
    Ok(address)
}

#[utoipa::path(
    get,
    tag = "wallet",
    path = "/api/wallet/{address}/balance",
    params(("address" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, description = "ETH balance on Base", body = BalanceResponse),
        ErrorResponse
    )
)]
pub async fn balance(
    State(state): State<BackendState>,
    Path(address): Path<String>,
) -> Result<AppJson<BalanceResponse>, ApiError> {
    let address = owner(address)?;
    Ok(AppJson(state.app().balance(&address).await))
}

#[utoipa::path(
    get,
    tag = "wallet",
    path = "/api/wallet/{address}/stats",
    params(("address" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, description = "Visible NFT count and floor value", body = CollectionStats),
        ErrorResponse
    )
)]
pub async fn stats(
    State(state): State<BackendState>,
    Path(address): Path<String>,
) -> Result<AppJson<CollectionStats>, ApiError> {
    let address = owner(address)?;
    Ok(AppJson(state.app().stats(&address).await))
}

#[utoipa::path(
    get,
    tag = "wallet",
    path = "/api/wallet/{address}/collection",
    params(("address" = String, Path, description = "Wallet address"), CollectionQuery),
    responses(
        (status = 200, description = "Reconciled, sorted collection view", body = CollectionResponse),
        ErrorResponse
    )
)]
pub async fn collection(
    State(state): State<BackendState>,
    Path(address): Path<String>,
    Query(query): Query<CollectionQuery>,
) -> Result<AppJson<CollectionResponse>, ApiError> {
    let address = owner(address)?;
    let reconciled = state.app().collection(&address, query).await;
    Ok(AppJson(CollectionResponse {
        nfts: reconciled.records,
        hidden_ids: reconciled.hide_list,
    }))
}

#[utoipa::path(
    post,
    tag = "wallet",
    path = "/api/wallet/{address}/hide",
    params(("address" = String, Path, description = "Wallet address")),
    request_body = IdsRequest,
    responses(
        (status = 200, description = "Hide-list after hiding", body = HideListResponse),
        ErrorResponse
    )
)]
pub async fn hide(
    State(state): State<BackendState>,
    Path(address): Path<String>,
    AppJson(request): AppJson<IdsRequest>,
) -> Result<AppJson<HideListResponse>, ApiError> {
    let address = owner(address)?;
    let hidden_ids = state.app().hide(&address, &request.ids).await?;
    Ok(AppJson(HideListResponse { hidden_ids }))
}

#[utoipa::path(
    post,
    tag = "wallet",
    path = "/api/wallet/{address}/unhide",
    params(("address" = String, Path, description = "Wallet address")),
    request_body = IdsRequest,
    responses(
        (status = 200, description = "Hide-list after unhiding", body = HideListResponse),
        ErrorResponse
    )
)]
pub async fn unhide(
    State(state): State<BackendState>,
    Path(address): Path<String>,
    AppJson(request): AppJson<IdsRequest>,
) -> Result<AppJson<HideListResponse>, ApiError> {
    let address = owner(address)?;
    let hidden_ids = state.app().unhide(&address, &request.ids).await?;
    Ok(AppJson(HideListResponse { hidden_ids }))
}

#[utoipa::path(
    get,
    tag = "wallet",
    path = "/api/wallet/{address}/recipients",
    params(("address" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, description = "Most recent recipients first", body = RecipientsResponse),
        ErrorResponse
    )
)]
pub async fn recipients(
    State(state): State<BackendState>,
    Path(address): Path<String>,
) -> Result<AppJson<RecipientsResponse>, ApiError> {
    let address = owner(address)?;
    let recipients = state.app().recent_recipients(&address).await;
    Ok(AppJson(RecipientsResponse {
        recipients: recipients.as_slice().to_vec(),
    }))
}

#[utoipa::path(
    post,
    tag = "wallet",
    path = "/api/wallet/{address}/send",
    params(("address" = String, Path, description = "Sending wallet address")),
    request_body = SendRequest,
    responses(
        (status = 200, description = "All transfers submitted", body = SendResponse),
        ErrorResponse
    )
)]
pub async fn send(
    State(state): State<BackendState>,
    Path(address): Path<String>,
    AppJson(request): AppJson<SendRequest>,
) -> Result<AppJson<SendResponse>, ApiError> {
    let address = owner(address)?;
    Ok(AppJson(state.app().send(&address, request).await?))
}

#[utoipa::path(
    get,
    tag = "recipients",
    path = "/api/recipients/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Farcaster users with a wallet address", body = SearchOutcome),
        ErrorResponse
    )
)]
pub async fn search_recipients(
    State(state): State<BackendState>,
    Query(query): Query<SearchQuery>,
) -> Result<AppJson<SearchOutcome>, ApiError> {
    let session = query.session.as_deref().filter(|session| !session.trim().is_empty());
    Ok(AppJson(state.app().search_recipients(session, &query.q).await))
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use crate::api::tests::serve_app;
    use crate::app::{
        tests::{owned_nfts_upstream, test_app, BAR_ID, BAZ_ID, FOO_ID},
        transfer::{tests::RecordingWallet, WalletProvider},
    };
    use axum::{extract::Query, routing::get, Json};
    use http::StatusCode;
    use serde_json::{json, Value};

    const OWNER: &str = "0x1111111111111111111111111111111111111111";
    const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";

    #[tokio::test]
    async fn test_hide_unhide_collection() -> anyhow::Result<()> {
        let base = serve_app(test_app(owned_nfts_upstream(), None).await).await;
        let client = reqwest::Client::new();

        let main: Value = client
            .get(format!("{base}/api/wallet/{OWNER}/collection?sort=floor&direction=desc"))
            .send()
            .await?
            .json()
            .await?;
        let ids: Vec<&str> = main["nfts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|nft| nft["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![BAR_ID, BAZ_ID]);
        assert_eq!(main["hiddenIds"], json!([FOO_ID]));

        let hidden: Value = client
            .post(format!("{base}/api/wallet/{OWNER}/hide"))
            .json(&json!({ "ids": [BAR_ID] }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(hidden["hiddenIds"], json!([FOO_ID, BAR_ID]));

        let hidden_view: Value = client
            .get(format!("{base}/api/wallet/{OWNER}/collection?view=hidden&sort=name"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(hidden_view["nfts"][0]["id"], BAR_ID);
        assert_eq!(hidden_view["nfts"][1]["id"], FOO_ID);

        let unhidden: Value = client
            .post(format!("{base}/api/wallet/{OWNER}/unhide"))
            .json(&json!({ "ids": [BAR_ID, BAR_ID] }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(unhidden["hiddenIds"], json!([FOO_ID]));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_route() -> anyhow::Result<()> {
        let wallet = Arc::new(RecordingWallet::default());
        let app = test_app(
            owned_nfts_upstream(),
            Some(wallet.clone() as Arc<dyn WalletProvider>),
        )
        .await;
        let base = serve_app(app).await;
        let client = reqwest::Client::new();

        let sent: Value = client
            .post(format!("{base}/api/wallet/{OWNER}/send"))
            .json(&json!({ "recipient": RECIPIENT, "nftIds": [BAR_ID] }))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(sent, json!({ "step": "success", "txHashes": ["0xhash1"] }));

        let recents: Value = client
            .get(format!("{base}/api/wallet/{OWNER}/recipients"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(recents["recipients"][0]["ethAddress"], RECIPIENT);

        let unknown = client
            .post(format!("{base}/api/wallet/{OWNER}/send"))
            .json(&json!({ "recipient": RECIPIENT, "nftIds": ["0xZ-1"] }))
            .send()
            .await?;
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(wallet.sent.lock().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_without_wallet_rpc() -> anyhow::Result<()> {
        let base = serve_app(test_app(owned_nfts_upstream(), None).await).await;
        let response = reqwest::Client::new()
            .post(format!("{base}/api/wallet/{OWNER}/send"))
            .json(&json!({ "recipient": RECIPIENT, "nftIds": [BAR_ID] }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[tokio::test]
    async fn test_short_search_is_empty() -> anyhow::Result<()> {
        let base = serve_app(test_app(owned_nfts_upstream(), None).await).await;
        let outcome: Value = reqwest::Client::new()
            .get(format!("{base}/api/recipients/search?q=a"))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(outcome["results"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn test_searches_without_session_stay_independent() -> anyhow::Result<()> {
        let upstream = owned_nfts_upstream().route(
            "/v2/farcaster/user/search",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(json!({ "result": { "users": [
                    { "fid": 1, "username": params["q"], "custody_address": "0xc1" }
                ]}}))
            }),
        );
        let base = serve_app(test_app(upstream, None).await).await;
        let client = reqwest::Client::new();

        let search = |q: &'static str| {
            let request = client
                .get(format!("{base}/api/recipients/search"))
                .query(&[("q", q), ("session", "")]);
            async move { Ok::<Value, reqwest::Error>(request.send().await?.json().await?) }
        };
        let (alice, bob) = tokio::join!(search("alice"), search("bob"));

        let (alice, bob) = (alice?, bob?);
        assert_eq!(alice["stale"], false);
        assert_eq!(alice["results"][0]["username"], "alice");
        assert_eq!(bob["stale"], false);
        assert_eq!(bob["results"][0]["username"], "bob");
        Ok(())
    }
}
