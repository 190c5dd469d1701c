use std::{collections::HashSet, sync::Arc};

use anyhow::Context;
use serde::Deserialize;
use services_common::{api::response::ApiError, utils::period_fetch::DataReceiver};
use tracing::{debug, info, warn};

use collection::{CollectionState, CollectionTask};
use exposed::{
    BalanceResponse, CollectionQuery, CollectionStats, FeedbackRequest, NftsQuery, NftsResponse,
    SendRequest, SendResponse, WebhookResponse,
};
use history::{DailyFloor, DailyPrice};
use nft::NftRecord;
use providers::{
    alchemy::AlchemyClient,
    coingecko::{EthPrice, DEFAULT_ETH_USD},
    opensea::{CollectionMarketData, OpenSeaClient},
    reservoir::{EventsWindow, ReservoirClient},
    rpc::{format_eth, RpcClient},
    ProvidersConfig,
};
use reconciler::{
    fetch_owned_nfts, normalize, ReconcileRequest, Reconciled, Reconciler,
    SortOrder,
};
use search::{RecipientSearch, SearchOutcome};
use storage::{
    hidden::{self, HideList},
    recipients::{self, RecentRecipients},
    KeyValueStore,
};
use transfer::{wizard::SendWizard, WalletProvider};

pub mod collection;
pub mod exposed;
pub mod history;
pub mod nft;
pub mod providers;
pub mod reconciler;
pub mod search;
pub mod storage;
pub mod transfer;

pub const PRICE_HISTORY_DAYS: i64 = 365;
pub const PRICE_HISTORY_LIMIT: u32 = 500;
pub const FLOW_HISTORY_DAYS: i64 = 90;
pub const FLOW_HISTORY_LIMIT: u32 = 1000;

#[derive(Deserialize, Debug, Clone, serde_derive_default::Default)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_target")]
    pub default_target: String,
}

fn default_feedback_target() -> String {
    "dim39".to_string()
}

pub struct App {
    pub store: Arc<dyn KeyValueStore>,
    pub reconciler: Reconciler,
    pub alchemy: Arc<AlchemyClient>,
    pub reservoir: ReservoirClient,
    pub opensea: OpenSeaClient,
    pub base_rpc: RpcClient,
    pub wallet: Option<Arc<dyn WalletProvider>>,
    pub search: RecipientSearch,
    pub eth_price: DataReceiver<EthPrice>,
    pub feedback: FeedbackConfig,
}

impl App {
    pub fn new(
        providers: ProvidersConfig,
        feedback: FeedbackConfig,
        store: Arc<dyn KeyValueStore>,
        eth_price: DataReceiver<EthPrice>,
    ) -> anyhow::Result<Self> {
        let alchemy = Arc::new(AlchemyClient::new(providers.alchemy).context("alchemy client")?);
        let wallet = providers
            .wallet_rpc
            .map(|config| -> anyhow::Result<Arc<dyn WalletProvider>> {
                Ok(Arc::new(RpcClient::new(config).context("wallet rpc client")?))
            })
            .transpose()?;
        let search = RecipientSearch::new(Arc::new(
            providers::neynar::NeynarClient::new(providers.neynar).context("neynar client")?,
        ));
        Ok(Self {
            reconciler: Reconciler::new(alchemy.clone(), store.clone()),
            store,
            alchemy,
            reservoir: ReservoirClient::new(providers.reservoir).context("reservoir client")?,
            opensea: OpenSeaClient::new(providers.opensea).context("opensea client")?,
            base_rpc: RpcClient::new(providers.base_rpc).context("base rpc client")?,
            wallet,
            search,
            eth_price,
            feedback,
        })
    }

    pub fn eth_usd(&self) -> f64 {
        self.eth_price
            .latest()
            .map(|price| price.usd)
            .unwrap_or(DEFAULT_ETH_USD)
    }

    /// Owned NFTs in provider format, or one of the sales series.
    pub async fn nfts(&self, query: NftsQuery) -> Result<NftsResponse, ApiError> {
        if query.wants_history() {
            if let Some(contract) = query.contract_address.as_deref() {
                let sales = self.alchemy.nft_sales(contract, None).await.unwrap_or_else(|err| {
                    warn!("failed to fetch sales of {contract}: {err:#}");
                    Vec::new()
                });
                return Ok(NftsResponse::DailySales {
                    sales: history::daily_sales_average(&sales, chrono::Utc::now()),
                });
            }
            // for single tokens `address` carries the contract
            if let (Some(contract), Some(token_id)) =
                (query.address.as_deref(), query.token_id.as_deref())
            {
                let sales = self
                    .alchemy
                    .nft_sales(contract, Some(token_id))
                    .await
                    .unwrap_or_else(|err| {
                        warn!("failed to fetch sales of {contract}-{token_id}: {err:#}");
                        Vec::new()
                    });
                return Ok(NftsResponse::TokenSales {
                    sales: history::token_sales(sales),
                });
            }
        }

        let owner = query
            .address
            .filter(|address| !address.trim().is_empty())
            .ok_or_else(|| ApiError::invalid("Wallet address is required"))?;
        let nfts = fetch_owned_nfts(&*self.alchemy, &owner)
            .await
            .unwrap_or_else(|err| {
                warn!("failed to fetch nfts of {owner}: {err:#}");
                Vec::new()
            });
        Ok(NftsResponse::Owned { nfts })
    }

    pub async fn price_history(&self, contract: &str) -> Vec<DailyPrice> {
        let window = EventsWindow::last_days(chrono::Utc::now(), PRICE_HISTORY_DAYS, PRICE_HISTORY_LIMIT);
        match self.reservoir.floor_ask_events(contract, window).await {
            Ok(events) => history::daily_floor_average(&events),
            Err(err) => {
                warn!("failed to fetch floor history of {contract}: {err:#}");
                Vec::new()
            }
        }
    }

    pub async fn flow_price_history(&self, contract: &str) -> Vec<DailyFloor> {
        let window = EventsWindow::last_days(chrono::Utc::now(), FLOW_HISTORY_DAYS, FLOW_HISTORY_LIMIT);
        match self.reservoir.floor_ask_events(contract, window).await {
            Ok(events) => history::daily_floor_open(&events),
            Err(err) => {
                warn!("failed to fetch daily floors of {contract}: {err:#}");
                Vec::new()
            }
        }
    }

    pub async fn opensea_data(&self, contract: &str) -> CollectionMarketData {
        self.opensea
            .market_data(contract)
            .await
            .unwrap_or_else(|err| {
                warn!("failed to fetch opensea data of {contract}: {err:#}");
                CollectionMarketData::default()
            })
    }

    pub fn feedback(&self, request: FeedbackRequest) -> Result<(), ApiError> {
        let message = request
            .message
            .filter(|message| !message.trim().is_empty())
            .ok_or_else(|| ApiError::invalid("Message is required"))?;
        let target = request
            .target_username
            .filter(|target| !target.trim().is_empty())
            .unwrap_or_else(|| self.feedback.default_target.clone());
        info!(target_username = %target, "feedback: {message}");
        Ok(())
    }

    /// Mini app lifecycle events. Always acknowledged.
    pub fn webhook(&self, body: &[u8]) -> WebhookResponse {
        let event: serde_json::Value = match serde_json::from_slice(body) {
            Ok(event) => event,
            Err(err) => {
                warn!("malformed webhook payload: {err}");
                return WebhookResponse {
                    success: false,
                    error: Some("Invalid request".into()),
                };
            }
        };
        match event.get("event").and_then(|e| e.as_str()) {
            Some("frame_added") => info!("mini app added by user"),
            Some("frame_removed") => info!("mini app removed by user"),
            Some("notifications_enabled") => info!("notifications enabled by user"),
            Some("notifications_disabled") => info!("notifications disabled by user"),
            other => info!("unknown webhook event {other:?}"),
        }
        WebhookResponse {
            success: true,
            error: None,
        }
    }

    pub async fn balance(&self, address: &str) -> BalanceResponse {
        let balance = match self.base_rpc.get_balance(address).await {
            Ok(wei) => format_eth(wei),
            Err(err) => {
                warn!("failed to fetch balance of {address}: {err:#}");
                format_eth(Default::default())
            }
        };
        BalanceResponse { balance }
    }

    /// Reconciled collection. Failures collapse to an empty view with the
    /// stored hide-list.
    pub async fn collection(&self, owner: &str, query: CollectionQuery) -> Reconciled {
        let request = ReconcileRequest {
            view: query.view,
            order: SortOrder::new(query.sort, query.direction),
        };
        match CollectionTask::spawn(self.reconciler.clone(), owner.to_owned(), request)
            .join()
            .await
        {
            CollectionState::Ready(reconciled) => reconciled,
            state => {
                debug!("collection of {owner} ended as {state:?}");
                Reconciled::empty(HideList::load(&*self.store, owner).await)
            }
        }
    }

    pub async fn stats(&self, owner: &str) -> CollectionStats {
        let main = self
            .reconciler
            .reconcile_or_empty(owner, ReconcileRequest::default())
            .await;
        let total_floor_eth: f64 = main
            .records
            .iter()
            .filter_map(|record| record.floor_price_eth)
            .filter(|floor| *floor > 0.0)
            .sum();
        let eth_usd = self.eth_usd();
        CollectionStats {
            nft_count: main.records.len(),
            total_floor_eth,
            total_floor_usd: total_floor_eth * eth_usd,
            eth_usd,
        }
    }

    pub async fn hide(&self, owner: &str, ids: &[String]) -> Result<HideList, ApiError> {
        Ok(hidden::hide(&*self.store, owner, ids).await?)
    }

    pub async fn unhide(&self, owner: &str, ids: &[String]) -> Result<HideList, ApiError> {
        Ok(hidden::unhide(&*self.store, owner, ids).await?)
    }

    pub async fn recent_recipients(&self, owner: &str) -> RecentRecipients {
        RecentRecipients::load(&*self.store, owner).await
    }

    pub async fn search_recipients(&self, session: Option<&str>, query: &str) -> SearchOutcome {
        self.search.search(session, query).await
    }

    /// Transfers the requested NFTs of `owner` and remembers the recipient.
    pub async fn send(&self, owner: &str, request: SendRequest) -> Result<SendResponse, ApiError> {
        if request.nft_ids.is_empty() {
            return Err(ApiError::invalid("no nfts selected"));
        }
        let mut selected = HashSet::new();
        if let Some(id) = request.nft_ids.iter().find(|id| !selected.insert(id.as_str())) {
            return Err(ApiError::invalid(format!("nft {id} is selected more than once")));
        }
        let owned = normalize(fetch_owned_nfts(&*self.alchemy, owner).await?);
        let records = request
            .nft_ids
            .iter()
            .map(|id| {
                owned
                    .iter()
                    .find(|record| &record.id == id)
                    .cloned()
                    .ok_or_else(|| ApiError::invalid(format!("nft {id} is not owned by {owner}")))
            })
            .collect::<Result<Vec<NftRecord>, _>>()?;

        let mut wizard = SendWizard::new(request.nft_ids.clone());
        wizard.select_recipient(request.recipient.trim().to_lowercase(), request.recipient_user);
        wizard.confirm_address(true);
        wizard
            .submit(self.wallet.as_deref(), Some(owner), &records)
            .await??;

        if let Some(recipient) = wizard.recipient() {
            if let Err(err) = recipients::remember(&*self.store, owner, recipient.to_recent()).await {
                warn!("failed to remember recipient for {owner}: {err:#}");
            }
        }
        Ok(SendResponse {
            step: wizard.step(),
            tx_hashes: wizard.tx_hashes().to_vec(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::app::{
        providers::{
            alchemy::AlchemyConfig, neynar::NeynarConfig, opensea::OpenSeaConfig,
            reservoir::ReservoirConfig, rpc::RpcConfig,
        },
        storage::{recipients::RecentRecipient, MemoryStore},
        transfer::tests::{address, RecordingWallet, CONTRACT_A, CONTRACT_B, CONTRACT_C},
    };
    use axum::{routing::get, Json, Router};
    use serde_json::json;
    use services_common::utils::tests::spawn_router;

    /// Providers pointing at one fake upstream serving every third-party API.
    pub async fn fake_providers(upstream: Router) -> ProvidersConfig {
        let base_url = spawn_router(upstream).await.unwrap();
        ProvidersConfig {
            alchemy: AlchemyConfig {
                base_url: base_url.clone(),
                api_key: "key".into(),
                ..Default::default()
            },
            reservoir: ReservoirConfig {
                base_url: base_url.clone(),
                ..Default::default()
            },
            opensea: OpenSeaConfig {
                base_url: base_url.clone(),
                api_key: Some("secret".into()),
                ..Default::default()
            },
            neynar: NeynarConfig {
                base_url: base_url.clone(),
                ..Default::default()
            },
            base_rpc: RpcConfig {
                url: format!("{base_url}/rpc"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub const FOO_ID: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa-0";
    pub const BAR_ID: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb-5";
    pub const BAZ_ID: &str = "0xcccccccccccccccccccccccccccccccccccccccc-6";

    /// Foo is spam-hidden (token zero), Bar and Baz carry floors.
    pub fn owned_nfts_upstream() -> Router {
        Router::new().route(
            "/nft/v3/key/getNFTsForOwner",
            get(|| async {
                Json(json!({ "ownedNfts": [
                    { "contract": { "address": CONTRACT_A, "name": "Foos" }, "tokenId": "0", "name": "Foo" },
                    { "contract": { "address": CONTRACT_B, "name": "Bars", "openSeaMetadata": { "floorPrice": 0.5 } }, "tokenId": "5", "name": "Bar" },
                    { "contract": { "address": CONTRACT_C, "name": "Bazs", "openSeaMetadata": { "floorPrice": 0.25 } }, "tokenId": "6", "name": "Baz" }
                ]}))
            }),
        )
    }

    pub async fn test_app(upstream: Router, wallet: Option<Arc<dyn WalletProvider>>) -> App {
        let mut app = App::new(
            fake_providers(upstream).await,
            FeedbackConfig::default(),
            Arc::new(MemoryStore::new()),
            DataReceiver::fixed(EthPrice { marker: 1, usd: 2000.0 }),
        )
        .unwrap();
        app.wallet = wallet;
        app
    }

    #[tokio::test]
    async fn test_stats_sum_visible_floors() {
        let app = test_app(owned_nfts_upstream(), None).await;
        let stats = app.stats("0xowner").await;
        assert_eq!(
            stats,
            CollectionStats {
                nft_count: 2,
                total_floor_eth: 0.75,
                total_floor_usd: 1500.0,
                eth_usd: 2000.0,
            }
        );
    }

    #[tokio::test]
    async fn test_send_remembers_recipient() -> anyhow::Result<()> {
        let wallet = Arc::new(RecordingWallet::default());
        let app = test_app(owned_nfts_upstream(), Some(wallet.clone() as Arc<dyn WalletProvider>)).await;
        let recipient = "0x2222222222222222222222222222222222222222";

        let response = app
            .send(
                "0x1111111111111111111111111111111111111111",
                SendRequest {
                    recipient: recipient.into(),
                    recipient_user: None,
                    nft_ids: vec![BAZ_ID.into(), BAR_ID.into()],
                },
            )
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        assert_eq!(response.tx_hashes, vec!["0xhash1", "0xhash2"]);
        let sent = wallet.sent.lock().await;
        assert_eq!(sent[0].to, address(CONTRACT_C));
        assert_eq!(sent[1].to, address(CONTRACT_B));

        let recents = app
            .recent_recipients("0x1111111111111111111111111111111111111111")
            .await;
        assert_eq!(recents.as_slice()[0].eth_address, recipient);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_without_wallet_is_unavailable() {
        let app = test_app(owned_nfts_upstream(), None).await;
        let err = app
            .send(
                "0x1111111111111111111111111111111111111111",
                SendRequest {
                    recipient: "0x2222222222222222222222222222222222222222".into(),
                    recipient_user: None,
                    nft_ids: vec![BAR_ID.into()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unavailable(_)));
        assert!(app.recent_recipients("0x1111111111111111111111111111111111111111").await.is_empty());
    }

    #[tokio::test]
    async fn test_feedback_requires_message() {
        let app = test_app(Router::new(), None).await;
        assert!(app
            .feedback(FeedbackRequest {
                message: Some("  ".into()),
                target_username: None
            })
            .is_err());
        assert!(app
            .feedback(FeedbackRequest {
                message: Some("love it".into()),
                target_username: None
            })
            .is_ok());
    }

    #[tokio::test]
    async fn test_upstream_failures_degrade() {
        let app = test_app(Router::new(), None).await;
        assert!(app.price_history("0xabc").await.is_empty());
        assert!(app.flow_price_history("0xabc").await.is_empty());
        assert_eq!(app.opensea_data("0xabc").await, CollectionMarketData::default());
        assert_eq!(app.balance("0xabc").await.balance, "0.0000");
        assert!(app.collection("0xabc", CollectionQuery::default()).await.records.is_empty());
    }

    #[tokio::test]
    async fn test_send_records_paid_address_for_picked_user() -> anyhow::Result<()> {
        let wallet = Arc::new(RecordingWallet::default());
        let app = test_app(owned_nfts_upstream(), Some(wallet.clone() as Arc<dyn WalletProvider>)).await;
        let owner = "0x1111111111111111111111111111111111111111";
        let paid = "0x2222222222222222222222222222222222222222";

        app.send(
            owner,
            SendRequest {
                recipient: format!(" {paid} "),
                recipient_user: Some(RecentRecipient {
                    farcaster_id: 3,
                    username: "dwr".into(),
                    display_name: "Dan".into(),
                    avatar_url: None,
                    eth_address: "0x3333333333333333333333333333333333333333".into(),
                }),
                nft_ids: vec![BAR_ID.into()],
            },
        )
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;

        let recents = app.recent_recipients(owner).await;
        assert_eq!(recents.as_slice()[0].eth_address, paid);
        assert_eq!(recents.as_slice()[0].username, "dwr");
        Ok(())
    }

    #[tokio::test]
    async fn test_send_rejects_repeated_ids() {
        let wallet = Arc::new(RecordingWallet::default());
        let app = test_app(owned_nfts_upstream(), Some(wallet.clone() as Arc<dyn WalletProvider>)).await;

        let err = app
            .send(
                "0x1111111111111111111111111111111111111111",
                SendRequest {
                    recipient: "0x2222222222222222222222222222222222222222".into(),
                    recipient_user: None,
                    nft_ids: vec![BAR_ID.into(), BAZ_ID.into(), BAR_ID.into()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert!(wallet.sent.lock().await.is_empty());
    }
}
