use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{
    history::{DailyFloor, DailyPrice, TokenSale},
    nft::NftRecord,
    reconciler::{CollectionView, SortDirection, SortKey},
    storage::{hidden::HideList, recipients::RecentRecipient},
    transfer::wizard::SendStep,
};

#[derive(Debug, Serialize, Deserialize, Clone, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NftsQuery {
    /// Wallet whose NFTs to list, or the contract when asking for one token's sales.
    pub address: Option<String>,
    /// `true` switches to sales history.
    pub history: Option<String>,
    pub contract_address: Option<String>,
    pub token_id: Option<String>,
}

impl NftsQuery {
    pub fn wants_history(&self) -> bool {
        self.history.as_deref() == Some("true")
    }
}

/// Either owned NFTs in provider format or a sales series.
#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(untagged)]
pub enum NftsResponse {
    Owned {
        #[schema(value_type = Vec<Object>)]
        nfts: Vec<serde_json::Value>,
    },
    DailySales {
        sales: Vec<DailyPrice>,
    },
    TokenSales {
        sales: Vec<TokenSale>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ContractQuery {
    pub contract_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OpenSeaQuery {
    pub contract: Option<String>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct PriceHistoryResponse {
    pub events: Vec<DailyPrice>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct FlowPriceHistoryResponse {
    pub events: Vec<DailyFloor>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub target_username: Option<String>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct WebhookStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct BalanceResponse {
    /// ETH, four decimals.
    pub balance: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub nft_count: usize,
    pub total_floor_eth: f64,
    pub total_floor_usd: f64,
    pub eth_usd: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CollectionQuery {
    #[serde(default)]
    pub view: CollectionView,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub nfts: Vec<NftRecord>,
    pub hidden_ids: HideList,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct IdsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HideListResponse {
    pub hidden_ids: HideList,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct RecipientsResponse {
    pub recipients: Vec<RecentRecipient>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    /// Client session whose earlier searches this one supersedes. Searches
    /// without one are neither debounced nor superseded.
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub recipient: String,
    #[serde(default)]
    pub recipient_user: Option<RecentRecipient>,
    pub nft_ids: Vec<String>,
}

#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub step: SendStep,
    pub tx_hashes: Vec<String>,
}
