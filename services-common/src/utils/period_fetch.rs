use serde::Deserialize;
use std::{marker::PhantomData, time::Duration};
use tokio::sync::watch;
use tracing::{debug, error};

#[derive(Clone)]
pub struct DataReceiver<T>(watch::Receiver<Option<T>>);

impl<T: Clone> DataReceiver<T> {
    /// Waits until the first value is fetched.
    pub async fn get(&mut self) -> anyhow::Result<T> {
        let value = self.0.wait_for(|meta| meta.is_some()).await?;
        value
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("invariant: waited for some"))
    }

    /// Last fetched value, `None` until the first successful fetch.
    pub fn latest(&self) -> Option<T> {
        self.0.borrow().clone()
    }

    /// Receiver that always yields `value`, for wiring without a background fetcher.
    pub fn fixed(value: T) -> Self {
        let (_sender, receiver) = watch::channel(Some(value));
        Self(receiver)
    }
}

#[async_trait::async_trait]
pub trait FetchExecutor<T> {
    async fn init(&mut self) -> anyhow::Result<()>;
    async fn fetch(&mut self) -> anyhow::Result<T>;
    fn name(&self) -> &'static str;
}

pub struct PeriodicFetcher<T, E> {
    executor: E,
    config: PeriodicFetcherConfig,
    _marker: PhantomData<T>,
}

#[derive(Clone, Debug, Deserialize, serde_derive_default::Default)]
pub struct PeriodicFetcherConfig {
    #[serde(with = "humantime_serde", default = "default_tick_interval")]
    pub tick_interval: Duration,
    #[serde(with = "humantime_serde", default = "default_error_backoff")]
    pub error_backoff: Duration,
}

impl PeriodicFetcherConfig {
    pub fn zero() -> Self {
        Self {
            tick_interval: Duration::ZERO,
            error_backoff: Duration::ZERO,
        }
    }

    pub fn every_minute() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            error_backoff: Duration::from_secs(60),
        }
    }
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_error_backoff() -> Duration {
    Duration::from_secs(60)
}

impl<T: Send + Sync + 'static + PartialOrd, E: FetchExecutor<T> + Send + Sync + 'static>
    PeriodicFetcher<T, E>
{
    pub fn new(executor: E, config: PeriodicFetcherConfig) -> Self {
        Self {
            executor,
            config,
            _marker: PhantomData,
        }
    }

    pub fn serve(mut self) -> DataReceiver<T> {
        let (sender, receiver) = watch::channel(None);
        tokio::spawn(async move {
            if let Err(e) = self.executor.init().await {
                error!("failed to init fetcher {}: {}", self.executor.name(), e);
                return;
            }
            loop {
                match self.tick(&sender).await {
                    Ok(_) => {
                        tokio::time::sleep(self.config.tick_interval).await;
                    }
                    Err(e) => {
                        error!("failed to fetch data from {}: {}", self.executor.name(), e);
                        tokio::time::sleep(self.config.error_backoff).await;
                    }
                }
                if sender.is_closed() {
                    debug!("all receivers of {} dropped, stopping", self.executor.name());
                    return;
                }
            }
        });
        DataReceiver(receiver)
    }

    async fn tick(&mut self, sender: &watch::Sender<Option<T>>) -> anyhow::Result<()> {
        let data = self.executor.fetch().await?;
        sender.send_if_modified(move |old| {
            let modified = old.as_ref().map_or(true, |current| *current < data);
            if modified {
                *old = Some(data);
            }
            modified
        });
        Ok(())
    }
}
