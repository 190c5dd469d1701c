//! Sale and floor price series for the collection charts.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use tracing::warn;
use utoipa::ToSchema;

use services_common::TZ;

const WEI_PER_ETH: f64 = 1e18;

/// Wei amount (decimal or `0x` hex) in ETH. Unparseable amounts count as zero.
pub fn parse_wei_to_eth(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(raw, 10),
    };
    match parsed.map(|wei| wei.to_string().parse::<f64>()) {
        Ok(Ok(wei)) => wei / WEI_PER_ETH,
        _ => {
            warn!("failed to parse wei amount {raw:?}");
            0.0
        }
    }
}

fn value_as_string(value: &Option<serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawFee {
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
}

impl RawFee {
    fn eth(fee: &Option<RawFee>) -> f64 {
        fee.as_ref()
            .and_then(|fee| value_as_string(&fee.amount))
            .map(|amount| parse_wei_to_eth(&amount))
            .unwrap_or(0.0)
    }
}

/// Sale as returned by Alchemy `getNFTSales`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawSale {
    #[serde(default)]
    pub block_timestamp: Option<String>,
    #[serde(default)]
    pub seller_fee: Option<RawFee>,
    #[serde(default)]
    pub protocol_fee: Option<RawFee>,
    #[serde(default)]
    pub royalty_fee: Option<RawFee>,
    #[serde(default)]
    pub buyer_address: Option<String>,
    #[serde(default)]
    pub seller_address: Option<String>,
}

impl RawSale {
    /// Seller, protocol and royalty fees together.
    pub fn price_eth(&self) -> f64 {
        RawFee::eth(&self.seller_fee) + RawFee::eth(&self.protocol_fee) + RawFee::eth(&self.royalty_fee)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct DailyPrice {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct DailyFloor {
    pub date: String,
    pub price: f64,
    /// UTC day start, seconds.
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct TokenSale {
    pub timestamp: Option<String>,
    /// Seller fee in wei as delivered, `"0"` when absent.
    pub price: String,
    pub buyer: Option<String>,
    pub seller: Option<String>,
}

fn average_by_day(points: impl IntoIterator<Item = (String, f64)>) -> Vec<DailyPrice> {
    let mut days: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for (date, price) in points {
        let day = days.entry(date).or_default();
        day.0 += price;
        day.1 += 1;
    }
    days.into_iter()
        .map(|(date, (total, count))| DailyPrice {
            date,
            price: total / f64::from(count),
        })
        .collect()
}

/// Average sale price per day, skipping sales without a positive price.
pub fn daily_sales_average(sales: &[RawSale], now: DateTime<TZ>) -> Vec<DailyPrice> {
    let today = now.format("%Y-%m-%d").to_string();
    average_by_day(sales.iter().filter_map(|sale| {
        let price = sale.price_eth();
        if !price.is_finite() || price <= 0.0 {
            return None;
        }
        let date = sale
            .block_timestamp
            .as_deref()
            .and_then(|ts| ts.get(..10))
            .map(str::to_owned)
            .unwrap_or_else(|| today.clone());
        Some((date, price))
    }))
}

pub fn token_sales(sales: Vec<RawSale>) -> Vec<TokenSale> {
    sales
        .into_iter()
        .map(|sale| TokenSale {
            price: sale
                .seller_fee
                .as_ref()
                .and_then(|fee| value_as_string(&fee.amount))
                .filter(|amount| !amount.is_empty())
                .unwrap_or_else(|| "0".to_owned()),
            timestamp: sale.block_timestamp,
            buyer: sale.buyer_address,
            seller: sale.seller_address,
        })
        .collect()
}

#[serde_as]
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawAmount {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub native: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawPrice {
    #[serde(default)]
    pub amount: Option<RawAmount>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawFloorAsk {
    #[serde(default)]
    pub price: Option<RawPrice>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawEventInfo {
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Floor ask event as returned by Reservoir `floor-ask/events`.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawFloorEvent {
    #[serde(default)]
    pub floor_ask: Option<RawFloorAsk>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub event: Option<RawEventInfo>,
}

impl RawFloorEvent {
    fn native_price(&self) -> Option<f64> {
        self.floor_ask
            .as_ref()?
            .price
            .as_ref()?
            .amount
            .as_ref()?
            .native
            .filter(|price| price.is_finite() && *price > 0.0)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self
            .created_at
            .as_deref()
            .or_else(|| self.event.as_ref()?.created_at.as_deref())?;
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .ok()
    }

    fn priced_day(&self) -> Option<(NaiveDate, f64)> {
        Some((self.created_at()?.date_naive(), self.native_price()?))
    }
}

/// Average floor per UTC day.
pub fn daily_floor_average(events: &[RawFloorEvent]) -> Vec<DailyPrice> {
    average_by_day(
        events
            .iter()
            .filter_map(RawFloorEvent::priced_day)
            .map(|(day, price)| (day.format("%Y-%m-%d").to_string(), price)),
    )
}

fn round4(value: f64) -> f64 {
    (value * 1e4).round() / 1e4
}

/// First listed event of each UTC day, stamped with the day start.
pub fn daily_floor_open(events: &[RawFloorEvent]) -> Vec<DailyFloor> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (day, price) in events.iter().filter_map(RawFloorEvent::priced_day) {
        days.entry(day).or_insert(price);
    }
    days.into_iter()
        .map(|(day, price)| DailyFloor {
            date: day.format("%Y-%m-%d").to_string(),
            price: round4(price),
            timestamp: day
                .and_hms_opt(0, 0, 0)
                .map(|start| start.and_utc().timestamp())
                .unwrap_or_default(),
        })
        .collect()
}
