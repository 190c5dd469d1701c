use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

use crate::app::nft;

sol! {
    function safeTransferFrom(address from, address to, uint256 tokenId);
}

pub const SAFE_TRANSFER_FROM_SELECTOR: [u8; 4] = safeTransferFromCall::SELECTOR;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CalldataError {
    #[error("{0} is not a 0x-prefixed 20-byte address")]
    InvalidAddress(String),
    #[error("token id {0} is neither decimal nor 0x-prefixed hex")]
    InvalidTokenId(String),
}

/// Parses a `0x` address. Case is ignored, checksums are not enforced.
pub fn parse_address(raw: &str) -> Result<Address, CalldataError> {
    let raw = raw.trim();
    let invalid = || CalldataError::InvalidAddress(raw.to_owned());
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .filter(|digits| digits.len() == 40)
        .ok_or_else(invalid)?;
    digits.to_lowercase().parse().map_err(|_| invalid())
}

/// Token ids come either as decimal strings or as `0x` hex.
pub fn parse_token_id(raw: &str) -> Result<U256, CalldataError> {
    let raw = raw.trim();
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    Some(raw)
        .filter(|_| !digits.is_empty())
        .and_then(nft::parse_token_id)
        .ok_or_else(|| CalldataError::InvalidTokenId(raw.to_owned()))
}

/// Calldata for an ERC-721 `safeTransferFrom(from, to, tokenId)`.
pub fn encode_safe_transfer_from(from: Address, to: Address, token_id: U256) -> Bytes {
    safeTransferFromCall {
        from,
        to,
        tokenId: token_id,
    }
    .abi_encode()
    .into()
}
