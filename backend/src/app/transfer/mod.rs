//! ERC-721 transfers of owned NFTs through the user's wallet.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use services_common::api::response::ApiError;
use tracing::{info, warn};

use super::nft::NftRecord;

pub mod calldata;
pub mod wizard;

pub use calldata::{
    encode_safe_transfer_from, parse_address, parse_token_id, CalldataError,
    SAFE_TRANSFER_FROM_SELECTOR,
};

/// Transaction params as accepted by `eth_sendTransaction`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TransactionParams {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// One NFT moving from the sender to the recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from_address: Address,
    pub to_address: Address,
    pub contract_address: Address,
    pub token_id: U256,
}

impl TransferRequest {
    pub fn from_record(from: Address, to: Address, record: &NftRecord) -> Result<Self, TransferError> {
        let contract_address = record.contract_address.trim();
        let token_id = record.token_id.trim();
        if contract_address.is_empty() || token_id.is_empty() {
            return Err(TransferError::MissingTokenData {
                id: record.id.clone(),
            });
        }
        let encoding = |error| TransferError::Encoding {
            id: record.id.clone(),
            error,
        };
        Ok(Self {
            from_address: from,
            to_address: to,
            contract_address: parse_address(contract_address).map_err(encoding)?,
            token_id: parse_token_id(token_id).map_err(encoding)?,
        })
    }

    pub fn calldata(&self) -> Bytes {
        encode_safe_transfer_from(self.from_address, self.to_address, self.token_id)
    }

    pub fn to_tx_params(&self) -> TransactionParams {
        TransactionParams {
            from: self.from_address,
            to: self.contract_address,
            data: self.calldata(),
            value: U256::ZERO,
        }
    }
}

/// Wallet able to sign and submit transactions on the user's behalf.
#[async_trait::async_trait]
pub trait WalletProvider: Send + Sync {
    /// Returns the transaction hash, `None` if the wallet gave none back.
    async fn send_transaction(&self, params: &TransactionParams) -> anyhow::Result<Option<String>>;
}

#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("wallet provider is not available")]
    ProviderUnavailable,
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("sender wallet is not connected")]
    SenderUnknown,
    #[error("no nfts selected")]
    NothingSelected,
    #[error("nft {id} is missing contract address or token id")]
    MissingTokenData { id: String },
    #[error("failed to encode transfer of {id}: {error}")]
    Encoding { id: String, error: CalldataError },
    #[error(
        "transfer of {nft_id} failed after {submitted} of {total} submitted, \
         some transfers may have completed: {error:#}"
    )]
    Submission {
        nft_id: String,
        submitted: usize,
        total: usize,
        error: anyhow::Error,
    },
    #[error(
        "transfer of {nft_id} returned no transaction hash after {submitted} of {total} submitted, \
         some transfers may have completed"
    )]
    NoHash {
        nft_id: String,
        submitted: usize,
        total: usize,
    },
}

impl TransferError {
    /// Transfers that reached the wallet before the failure.
    pub fn submitted(&self) -> usize {
        match self {
            TransferError::Submission { submitted, .. } | TransferError::NoHash { submitted, .. } => {
                *submitted
            }
            _ => 0,
        }
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::ProviderUnavailable => ApiError::Unavailable(err.into()),
            TransferError::Submission { .. } | TransferError::NoHash { .. } => {
                ApiError::Upstream(err.into())
            }
            _ => ApiError::InvalidRequest(err.into()),
        }
    }
}

/// Checks every precondition and builds all transaction params before anything
/// is submitted.
pub fn prepare_transfers(
    has_provider: bool,
    sender: Option<&str>,
    recipient: &str,
    records: &[NftRecord],
) -> Result<Vec<(String, TransactionParams)>, TransferError> {
    if !has_provider {
        return Err(TransferError::ProviderUnavailable);
    }
    let recipient = parse_address(recipient)
        .map_err(|_| TransferError::InvalidRecipient(recipient.trim().to_owned()))?;
    let sender = sender
        .and_then(|sender| parse_address(sender).ok())
        .ok_or(TransferError::SenderUnknown)?;
    if records.is_empty() {
        return Err(TransferError::NothingSelected);
    }

    records
        .iter()
        .map(|record| {
            let request = TransferRequest::from_record(sender, recipient, record)?;
            Ok((record.id.clone(), request.to_tx_params()))
        })
        .collect()
}

/// Submits one transfer per record, in order, stopping at the first failure.
/// Returns the transaction hashes.
pub async fn send_nfts(
    provider: Option<&dyn WalletProvider>,
    sender: Option<&str>,
    recipient: &str,
    records: &[NftRecord],
) -> Result<Vec<String>, TransferError> {
    let transfers = prepare_transfers(provider.is_some(), sender, recipient, records)?;
    let provider = provider.ok_or(TransferError::ProviderUnavailable)?;

    let total = transfers.len();
    let mut hashes = Vec::with_capacity(total);
    for (nft_id, params) in transfers {
        let submitted = hashes.len();
        match provider.send_transaction(&params).await {
            Ok(Some(hash)) if !hash.is_empty() => {
                info!("submitted transfer of {nft_id} via {}: {hash}", params.to);
                hashes.push(hash);
            }
            Ok(_) => {
                warn!("transfer of {nft_id} returned no hash, {submitted} of {total} already submitted");
                return Err(TransferError::NoHash {
                    nft_id,
                    submitted,
                    total,
                });
            }
            Err(error) => {
                warn!("transfer of {nft_id} failed, {submitted} of {total} already submitted: {error:#}");
                return Err(TransferError::Submission {
                    nft_id,
                    submitted,
                    total,
                    error,
                });
            }
        }
    }
    Ok(hashes)
}
