use std::sync::Arc;

use chrono::{DateTime, Duration};
use serde::Deserialize;
use services_common::{
    utils::{decode_success_or_raw, limiter::LimiterGuard},
    TZ,
};

use super::{trim_base, HttpClientConfig};
use crate::app::history::RawFloorEvent;

#[derive(Debug, Deserialize, Clone, serde_derive_default::Default)]
pub struct ReservoirConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub http: HttpClientConfig,
}

fn default_base_url() -> String {
    "https://api.reservoir.tools".to_string()
}

#[derive(Debug, Deserialize, Default)]
struct FloorEventsResponse {
    #[serde(default)]
    events: Vec<RawFloorEvent>,
}

/// Time window of floor events to request.
#[derive(Debug, Clone, Copy)]
pub struct EventsWindow {
    pub start: DateTime<TZ>,
    pub end: DateTime<TZ>,
    pub limit: u32,
}

impl EventsWindow {
    /// Window ending at `now` and reaching `days` back.
    pub fn last_days(now: DateTime<TZ>, days: i64, limit: u32) -> Self {
        Self {
            start: now - Duration::days(days),
            end: now,
            limit,
        }
    }
}

pub struct ReservoirClient {
    client: LimiterGuard<reqwest::Client>,
    config: Arc<ReservoirConfig>,
}

impl ReservoirClient {
    pub fn new(config: ReservoirConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: config.http.client()?,
            config: Arc::new(config),
        })
    }

    pub async fn floor_ask_events(
        &self,
        contract: &str,
        window: EventsWindow,
    ) -> anyhow::Result<Vec<RawFloorEvent>> {
        let url = format!(
            "{}/collections/{contract}/floor-ask/events/v1",
            trim_base(&self.config.base_url)
        );
        let mut request = self
            .client
            .use_single()
            .await
            .get(url)
            .header(http::header::ACCEPT, "application/json")
            .query(&[
                ("startTimestamp", window.start.timestamp().to_string()),
                ("endTimestamp", window.end.timestamp().to_string()),
                ("limit", window.limit.to_string()),
            ]);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("x-api-key", api_key);
        }
        let response: FloorEventsResponse = decode_success_or_raw(request.send().await?).await?;
        Ok(response.events)
    }
}
