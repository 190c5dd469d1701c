use nftdeck::{
    api::{router, ApiDoc},
    app::{
        providers::coingecko::{CoinGeckoClient, EthPriceFetcher},
        storage::{KeyValueStore, MemoryStore, StorageClient},
        App,
    },
    cfg::Config,
    log::setup_log,
};
use services_common::{
    api::server::{serve, AppState},
    cfg::load_config,
    utils::period_fetch::PeriodicFetcher,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    setup_log();
    let cfg = load_config::<Config>()?;

    let store: Arc<dyn KeyValueStore> = match cfg.db {
        Some(db) => Arc::new(StorageClient::from_config(db).await?),
        None => {
            warn!("no database configured, hide-lists and recipients are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let eth_price = PeriodicFetcher::new(
        EthPriceFetcher::new(CoinGeckoClient::new(cfg.providers.coingecko.clone())?),
        cfg.fetchers.eth_price,
    )
    .serve();

    let app = Arc::new(App::new(cfg.providers, cfg.feedback, store, eth_price)?);
    let api_state = AppState::new(app, cfg.api);
    info!("Starting API server");
    serve::<_, ApiDoc>(api_state, router()).await?;
    Ok(())
}
