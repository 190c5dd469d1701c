use serde::Serialize;
use utoipa::ToSchema;

use super::{send_nfts, TransferError, WalletProvider};
use crate::app::{nft::NftRecord, storage::recipients::RecentRecipient};

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SendStep {
    ChoosingRecipient,
    Confirming,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
    /// Farcaster account behind the address, if it was picked from search.
    pub user: Option<RecentRecipient>,
}

impl Recipient {
    /// The address the NFTs went to always wins over the one on the picked user.
    pub fn to_recent(&self) -> RecentRecipient {
        match &self.user {
            Some(user) => RecentRecipient {
                eth_address: self.address.clone(),
                ..user.clone()
            },
            None => RecentRecipient::from_address(&self.address),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WizardError {
    #[error("no recipient chosen")]
    NoRecipient,
    #[error("recipient address must be confirmed first")]
    AddressNotConfirmed,
    #[error("cannot send from step {0:?}")]
    WrongStep(SendStep),
}

/// Send flow: pick a recipient, confirm the address, submit.
#[derive(Debug, Clone)]
pub struct SendWizard {
    step: SendStep,
    recipient: Option<Recipient>,
    selection: Vec<String>,
    address_confirmed: bool,
    error: Option<String>,
    tx_hashes: Vec<String>,
}

impl SendWizard {
    pub fn new(selection: Vec<String>) -> Self {
        Self {
            step: SendStep::ChoosingRecipient,
            recipient: None,
            selection,
            address_confirmed: false,
            error: None,
            tx_hashes: Vec::new(),
        }
    }

    pub fn step(&self) -> SendStep {
        self.step
    }

    pub fn recipient(&self) -> Option<&Recipient> {
        self.recipient.as_ref()
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn tx_hashes(&self) -> &[String] {
        &self.tx_hashes
    }

    pub fn select_recipient(&mut self, address: impl Into<String>, user: Option<RecentRecipient>) {
        self.recipient = Some(Recipient {
            address: address.into(),
            user,
        });
        self.address_confirmed = false;
        self.error = None;
        self.step = SendStep::Confirming;
    }

    pub fn confirm_address(&mut self, confirmed: bool) {
        self.address_confirmed = confirmed;
    }

    pub fn back(&mut self) {
        if self.step == SendStep::Confirming {
            self.step = SendStep::ChoosingRecipient;
            self.error = None;
        }
    }

    /// Applies a send outcome. Failures keep the wizard on the confirmation step.
    pub fn finish(&mut self, result: Result<Vec<String>, TransferError>) -> Result<(), TransferError> {
        match result {
            Ok(hashes) => {
                self.tx_hashes = hashes;
                self.error = None;
                self.step = SendStep::Success;
                Ok(())
            }
            Err(err) => {
                self.error = Some(err.to_string());
                self.step = SendStep::Confirming;
                Err(err)
            }
        }
    }

    /// Submits the selection through `provider` once the recipient is confirmed.
    pub async fn submit(
        &mut self,
        provider: Option<&dyn WalletProvider>,
        sender: Option<&str>,
        records: &[NftRecord],
    ) -> anyhow::Result<Result<(), TransferError>> {
        if self.step != SendStep::Confirming {
            return Err(WizardError::WrongStep(self.step).into());
        }
        let recipient = self.recipient.clone().ok_or(WizardError::NoRecipient)?;
        if !self.address_confirmed {
            return Err(WizardError::AddressNotConfirmed.into());
        }
        let result = send_nfts(provider, sender, &recipient.address, records).await;
        Ok(self.finish(result))
    }

    /// Clears recipient, selection and the address confirmation.
    pub fn reset(&mut self) {
        *self = Self::new(Vec::new());
    }
}
