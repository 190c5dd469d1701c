use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    routing::{get, post},
    Router,
};
use services_common::api::response::{ApiError, AppJson, ErrorResponse};
use utoipa::OpenApi;

use crate::app::{
    exposed::{
        BalanceResponse, CollectionResponse, CollectionStats, ContractQuery, FeedbackRequest,
        FlowPriceHistoryResponse, HideListResponse, IdsRequest, NftsQuery, NftsResponse,
        OpenSeaQuery, PriceHistoryResponse, RecipientsResponse, SendRequest, SendResponse,
        SuccessResponse, WebhookResponse, WebhookStatus,
    },
    history::{DailyFloor, DailyPrice, TokenSale},
    nft::{NftRecord, NftTrait},
    providers::opensea::CollectionMarketData,
    reconciler::{CollectionView, SortDirection, SortKey},
    search::SearchOutcome,
    storage::{hidden::HideList, recipients::RecentRecipient},
    transfer::wizard::SendStep,
    App,
};

pub mod wallet;

#[derive(OpenApi)]
#[openapi(
    paths(
        nfts,
        price_history,
        flow_price_history,
        opensea_data,
        feedback,
        webhook,
        webhook_status,
        wallet::balance,
        wallet::stats,
        wallet::collection,
        wallet::hide,
        wallet::unhide,
        wallet::recipients,
        wallet::send,
        wallet::search_recipients,
    ),
    components(schemas(
        NftsResponse,
        DailyPrice,
        DailyFloor,
        TokenSale,
        PriceHistoryResponse,
        FlowPriceHistoryResponse,
        CollectionMarketData,
        FeedbackRequest,
        SuccessResponse,
        WebhookResponse,
        WebhookStatus,
        BalanceResponse,
        CollectionStats,
        CollectionResponse,
        CollectionView,
        SortKey,
        SortDirection,
        NftRecord,
        NftTrait,
        HideList,
        IdsRequest,
        HideListResponse,
        RecentRecipient,
        RecipientsResponse,
        SearchOutcome,
        SendRequest,
        SendResponse,
        SendStep,
        ErrorResponse,
    ))
)]
pub struct ApiDoc;

pub type BackendState = services_common::api::server::AppState<App>;

pub fn router() -> Router<BackendState> {
    Router::new()
        .route("/nfts", get(nfts))
        .route("/price-history", get(price_history))
        .route("/flow-price-history", get(flow_price_history))
        .route("/opensea-data", get(opensea_data))
        .route("/feedback", post(feedback))
        .route("/webhook", get(webhook_status).post(webhook))
        .merge(wallet::router())
        .layer(DefaultBodyLimit::max(1024 * 16))
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::invalid(message))
}

#[utoipa::path(
    get,
    tag = "nfts",
    path = "/api/nfts",
    params(NftsQuery),
    responses(
        (status = 200, description = "Owned NFTs or sales history", body = NftsResponse),
        ErrorResponse
    )
)]
pub async fn nfts(
    State(state): State<BackendState>,
    Query(query): Query<NftsQuery>,
) -> Result<AppJson<NftsResponse>, ApiError> {
    Ok(AppJson(state.app().nfts(query).await?))
}

#[utoipa::path(
    get,
    tag = "market",
    path = "/api/price-history",
    params(ContractQuery),
    responses(
        (status = 200, description = "Daily average floor over the last year", body = PriceHistoryResponse),
        ErrorResponse
    )
)]
pub async fn price_history(
    State(state): State<BackendState>,
    Query(query): Query<ContractQuery>,
) -> Result<AppJson<PriceHistoryResponse>, ApiError> {
    let contract = required(query.contract_address, "Contract address is required")?;
    let events = state.app().price_history(&contract).await;
    Ok(AppJson(PriceHistoryResponse { events }))
}

#[utoipa::path(
    get,
    tag = "market",
    path = "/api/flow-price-history",
    params(ContractQuery),
    responses(
        (status = 200, description = "Daily floor over the last 90 days", body = FlowPriceHistoryResponse),
        ErrorResponse
    )
)]
pub async fn flow_price_history(
    State(state): State<BackendState>,
    Query(query): Query<ContractQuery>,
) -> Result<AppJson<FlowPriceHistoryResponse>, ApiError> {
    let contract = required(query.contract_address, "Contract address is required")?;
    let events = state.app().flow_price_history(&contract).await;
    Ok(AppJson(FlowPriceHistoryResponse { events }))
}

#[utoipa::path(
    get,
    tag = "market",
    path = "/api/opensea-data",
    params(OpenSeaQuery),
    responses(
        (status = 200, description = "Collection floor, top offer, description and supply", body = CollectionMarketData),
        ErrorResponse
    )
)]
pub async fn opensea_data(
    State(state): State<BackendState>,
    Query(query): Query<OpenSeaQuery>,
) -> Result<AppJson<CollectionMarketData>, ApiError> {
    let contract = required(query.contract, "Contract address is required")?;
    Ok(AppJson(state.app().opensea_data(&contract).await))
}

#[utoipa::path(
    post,
    tag = "mini-app",
    path = "/api/feedback",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback accepted", body = SuccessResponse),
        ErrorResponse
    )
)]
pub async fn feedback(
    State(state): State<BackendState>,
    AppJson(request): AppJson<FeedbackRequest>,
) -> Result<AppJson<SuccessResponse>, ApiError> {
    state.app().feedback(request)?;
    Ok(AppJson(SuccessResponse { success: true }))
}

#[utoipa::path(
    post,
    tag = "mini-app",
    path = "/api/webhook",
    request_body(content = String, description = "Mini app event json", content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookResponse),
    )
)]
pub async fn webhook(State(state): State<BackendState>, body: Bytes) -> AppJson<WebhookResponse> {
    AppJson(state.app().webhook(&body))
}

#[utoipa::path(
    get,
    tag = "mini-app",
    path = "/api/webhook",
    responses(
        (status = 200, description = "Webhook liveness", body = WebhookStatus),
    )
)]
pub async fn webhook_status() -> AppJson<WebhookStatus> {
    AppJson(WebhookStatus {
        status: "Webhook endpoint active".into(),
    })
}
