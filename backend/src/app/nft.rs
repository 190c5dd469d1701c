//! Canonical NFT record and the boundary parsing of provider payloads into it.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use utoipa::ToSchema;

pub const PLACEHOLDER_IMAGE: &str = "/digital-art-collection.png";
pub const UNNAMED_NFT: &str = "Unnamed NFT";
pub const UNKNOWN_COLLECTION: &str = "Unknown Collection";

/// Case-insensitive name fragments that mark likely-unwanted airdrops.
pub const SPAM_KEYWORDS: [&str; 3] = ["claim", "reward", "airdrop"];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NftRecord {
    /// `{contractAddress}-{tokenId}`.
    pub id: String,
    pub name: String,
    pub collection_name: String,
    pub image_url: String,
    pub contract_address: String,
    /// As delivered by the provider, decimal or `0x` hex.
    pub token_id: String,
    /// `None` when the collection has no known floor; zero is a real floor.
    pub floor_price_eth: Option<f64>,
    pub traits: Vec<NftTrait>,
    pub is_spam_flag: bool,
    pub description: Option<String>,
    pub supply: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NftTrait {
    #[serde(rename = "type")]
    pub trait_type: String,
    pub value: String,
    pub occurrence_count: Option<u64>,
}

pub fn nft_id(contract_address: &str, token_id: &str) -> String {
    format!("{contract_address}-{token_id}")
}

/// Parses `0x`-prefixed hex or decimal token ids.
pub fn parse_token_id(raw: &str) -> Option<U256> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => U256::from_str_radix(hex, 16).ok(),
        None => U256::from_str_radix(raw, 10).ok(),
    }
}

/// Unparseable ids count as zero for the spam heuristic.
pub fn is_zero_token_id(raw: &str) -> bool {
    parse_token_id(raw).map_or(true, |id| id.is_zero())
}

pub fn has_spam_keyword(name: &str) -> bool {
    let name = name.to_lowercase();
    SPAM_KEYWORDS.iter().any(|keyword| name.contains(keyword))
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("owned nft payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("owned nft has no contract address")]
    MissingContract,
    #[error("owned nft of {contract} has no token id")]
    MissingTokenId { contract: String },
}

/// Owned token as returned by the Alchemy v3 `getNFTsForOwner` endpoint.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawNft {
    pub contract: RawContract,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<RawImage>,
    #[serde(default)]
    pub raw: Option<RawMetadataEnvelope>,
    #[serde(default)]
    pub spam: Option<RawSpam>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawContract {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub total_supply: Option<serde_json::Value>,
    #[serde(default)]
    pub is_spam: Option<bool>,
    #[serde(default)]
    pub open_sea_metadata: Option<RawOpenSeaMetadata>,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawOpenSeaMetadata {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub floor_price: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawImage {
    pub cached_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub original_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawMetadataEnvelope {
    #[serde(default)]
    pub metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Option<Vec<RawAttribute>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawAttribute {
    #[serde(default)]
    pub trait_type: Option<serde_json::Value>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub trait_count: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RawSpam {
    #[serde(default)]
    pub is_spam: Option<bool>,
}

fn value_to_display(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawNft {
    pub fn from_value(value: serde_json::Value) -> Result<Self, ParseError> {
        Ok(serde_json::from_value(value)?)
    }

    fn provider_spam_flag(&self) -> bool {
        self.contract.is_spam.unwrap_or(false)
            || self.spam.as_ref().and_then(|s| s.is_spam).unwrap_or(false)
    }
}

impl TryFrom<RawNft> for NftRecord {
    type Error = ParseError;

    fn try_from(raw: RawNft) -> Result<Self, Self::Error> {
        let is_spam_flag = raw.provider_spam_flag()
            || raw.name.as_deref().map(has_spam_keyword).unwrap_or(false);

        let RawNft {
            contract,
            token_id,
            name,
            description,
            image,
            raw: metadata,
            ..
        } = raw;

        let contract_address = non_empty(contract.address).ok_or(ParseError::MissingContract)?;
        let token_id = non_empty(token_id).ok_or_else(|| ParseError::MissingTokenId {
            contract: contract_address.clone(),
        })?;

        let contract_name = non_empty(contract.name);
        let name = non_empty(name)
            .or_else(|| contract_name.clone())
            .unwrap_or_else(|| UNNAMED_NFT.to_owned());
        let collection_name = contract_name.unwrap_or_else(|| UNKNOWN_COLLECTION.to_owned());

        let image_url = image
            .and_then(|image| {
                non_empty(image.cached_url)
                    .or_else(|| non_empty(image.thumbnail_url))
                    .or_else(|| non_empty(image.original_url))
            })
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_owned());

        let metadata = metadata.and_then(|envelope| envelope.metadata);
        let description = metadata
            .as_ref()
            .and_then(|m| non_empty(m.description.clone()))
            .or_else(|| non_empty(description));
        let traits = metadata
            .and_then(|m| m.attributes)
            .unwrap_or_default()
            .into_iter()
            .map(|attr| NftTrait {
                trait_type: value_to_display(attr.trait_type),
                value: value_to_display(attr.value),
                occurrence_count: attr.trait_count,
            })
            .collect();

        let floor_price_eth = contract
            .open_sea_metadata
            .and_then(|meta| meta.floor_price)
            .filter(|floor| floor.is_finite());

        Ok(NftRecord {
            id: nft_id(&contract_address, &token_id),
            name,
            collection_name,
            image_url,
            contract_address,
            token_id,
            floor_price_eth,
            traits,
            is_spam_flag,
            description,
            supply: contract
                .total_supply
                .map(|supply| value_to_display(Some(supply)))
                .filter(|supply| !supply.is_empty()),
        })
    }
}

impl NftRecord {
    /// Boundary parse of one provider item.
    pub fn parse(value: serde_json::Value) -> Result<Self, ParseError> {
        RawNft::from_value(value)?.try_into()
    }

    /// Whether the record should be hidden without the user asking for it.
    pub fn should_auto_hide(&self) -> bool {
        is_zero_token_id(&self.token_id) || self.is_spam_flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_alchemy_item() {
        let record = NftRecord::parse(json!({
            "contract": {
                "address": "0xabc",
                "name": "Based Punks",
                "totalSupply": "10000",
                "isSpam": false,
                "openSeaMetadata": { "floorPrice": 0.0125 }
            },
            "tokenId": "42",
            "name": "Punk #42",
            "image": { "cachedUrl": null, "thumbnailUrl": "https://img/thumb.png", "originalUrl": "ipfs://x" },
            "raw": { "metadata": {
                "description": "a punk",
                "attributes": [
                    { "trait_type": "Hat", "value": "Cap", "trait_count": 12 },
                    { "trait_type": "Level", "value": 3 }
                ]
            }}
        }))
        .unwrap();

        assert_eq!(record.id, "0xabc-42");
        assert_eq!(record.name, "Punk #42");
        assert_eq!(record.collection_name, "Based Punks");
        assert_eq!(record.image_url, "https://img/thumb.png");
        assert_eq!(record.floor_price_eth, Some(0.0125));
        assert_eq!(record.supply.as_deref(), Some("10000"));
        assert_eq!(record.description.as_deref(), Some("a punk"));
        assert_eq!(
            record.traits,
            vec![
                NftTrait {
                    trait_type: "Hat".into(),
                    value: "Cap".into(),
                    occurrence_count: Some(12)
                },
                NftTrait {
                    trait_type: "Level".into(),
                    value: "3".into(),
                    occurrence_count: None
                },
            ]
        );
        assert!(!record.is_spam_flag);
        assert!(!record.should_auto_hide());
    }

    #[test]
    fn test_parse_falls_back_to_defaults() {
        let record = NftRecord::parse(json!({
            "contract": { "address": "0xdef" },
            "tokenId": "7"
        }))
        .unwrap();

        assert_eq!(record.name, UNNAMED_NFT);
        assert_eq!(record.collection_name, UNKNOWN_COLLECTION);
        assert_eq!(record.image_url, PLACEHOLDER_IMAGE);
        assert_eq!(record.floor_price_eth, None);
        assert!(record.traits.is_empty());

        let named_by_contract = NftRecord::parse(json!({
            "contract": { "address": "0xdef", "name": "Coll" },
            "tokenId": "7",
            "name": ""
        }))
        .unwrap();
        assert_eq!(named_by_contract.name, "Coll");
    }

    #[test]
    fn test_zero_floor_is_kept() {
        let record = NftRecord::parse(json!({
            "contract": { "address": "0x1", "openSeaMetadata": { "floorPrice": 0 } },
            "tokenId": "1"
        }))
        .unwrap();
        assert_eq!(record.floor_price_eth, Some(0.0));
    }

    #[test]
    fn test_parse_rejects_incomplete_items() {
        assert!(matches!(
            NftRecord::parse(json!({ "contract": {}, "tokenId": "1" })),
            Err(ParseError::MissingContract)
        ));
        assert!(matches!(
            NftRecord::parse(json!({ "contract": { "address": "0x1" } })),
            Err(ParseError::MissingTokenId { .. })
        ));
        assert!(matches!(
            NftRecord::parse(json!("not an nft")),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_spam_detection() {
        let keyword = NftRecord::parse(json!({
            "contract": { "address": "0x1" },
            "tokenId": "3",
            "name": "Free AIRDROP voucher"
        }))
        .unwrap();
        assert!(keyword.is_spam_flag);

        let contract_flag = NftRecord::parse(json!({
            "contract": { "address": "0x1", "isSpam": true },
            "tokenId": "3",
            "name": "Nice art"
        }))
        .unwrap();
        assert!(contract_flag.is_spam_flag);

        let token_flag = NftRecord::parse(json!({
            "contract": { "address": "0x1" },
            "tokenId": "3",
            "spam": { "isSpam": true }
        }))
        .unwrap();
        assert!(token_flag.is_spam_flag);
    }

    #[test]
    fn test_token_id_parsing() {
        assert_eq!(parse_token_id("10"), Some(U256::from(10)));
        assert_eq!(parse_token_id("0x0a"), Some(U256::from(10)));
        assert_eq!(parse_token_id("zz"), None);
        assert!(is_zero_token_id("0"));
        assert!(is_zero_token_id("0x0"));
        assert!(is_zero_token_id("garbage"));
        assert!(!is_zero_token_id("5"));
    }
}
