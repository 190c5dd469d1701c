use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{load_json_or_default, owner_key, store_json, KeyValueStore};

const RECENT_RECIPIENTS_PREFIX: &str = "recent_nft_recipients";
pub const MAX_RECENT_RECIPIENTS: usize = 4;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentRecipient {
    /// Zero for plain addresses without a Farcaster account.
    pub farcaster_id: u64,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub eth_address: String,
}

impl RecentRecipient {
    pub fn from_address(address: &str) -> Self {
        Self {
            farcaster_id: 0,
            username: String::new(),
            display_name: address.to_owned(),
            avatar_url: None,
            eth_address: address.to_owned(),
        }
    }
}

/// Most recent first, at most [`MAX_RECENT_RECIPIENTS`], unique by address.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, ToSchema)]
#[serde(transparent)]
pub struct RecentRecipients(Vec<RecentRecipient>);

impl RecentRecipients {
    pub async fn load(store: &dyn KeyValueStore, owner: &str) -> Self {
        let mut loaded: Self =
            load_json_or_default(store, &owner_key(RECENT_RECIPIENTS_PREFIX, owner)).await;
        // stored data is not trusted to respect the invariants
        let entries = std::mem::take(&mut loaded.0);
        for entry in entries.into_iter().rev() {
            loaded.push(entry);
        }
        loaded
    }

    pub async fn save(&self, store: &dyn KeyValueStore, owner: &str) -> anyhow::Result<()> {
        store_json(store, &owner_key(RECENT_RECIPIENTS_PREFIX, owner), self).await
    }

    /// Moves `recipient` to the front, dropping older entries with the same address
    /// and evicting beyond the cap.
    pub fn push(&mut self, recipient: RecentRecipient) {
        self.0
            .retain(|r| !r.eth_address.eq_ignore_ascii_case(&recipient.eth_address));
        self.0.insert(0, recipient);
        self.0.truncate(MAX_RECENT_RECIPIENTS);
    }

    pub fn as_slice(&self) -> &[RecentRecipient] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Records a successful send to `recipient`.
pub async fn remember(
    store: &dyn KeyValueStore,
    owner: &str,
    recipient: RecentRecipient,
) -> anyhow::Result<RecentRecipients> {
    let mut recents = RecentRecipients::load(store, owner).await;
    recents.push(recipient);
    recents.save(store, owner).await?;
    Ok(recents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::storage::MemoryStore;

    fn user(fid: u64, address: &str) -> RecentRecipient {
        RecentRecipient {
            farcaster_id: fid,
            username: format!("user{fid}"),
            display_name: format!("User {fid}"),
            avatar_url: None,
            eth_address: address.into(),
        }
    }

    #[test]
    fn test_cap_and_order() {
        let mut recents = RecentRecipients::default();
        for i in 1..=6 {
            recents.push(user(i, &format!("0x{i}")));
        }

        assert_eq!(recents.len(), MAX_RECENT_RECIPIENTS);
        let fids: Vec<_> = recents.as_slice().iter().map(|r| r.farcaster_id).collect();
        assert_eq!(fids, vec![6, 5, 4, 3]);
    }

    #[test]
    fn test_dedup_by_address_moves_to_front() {
        let mut recents = RecentRecipients::default();
        recents.push(user(1, "0xaa"));
        recents.push(user(2, "0xbb"));
        recents.push(RecentRecipient::from_address("0xAA"));

        assert_eq!(recents.len(), 2);
        assert_eq!(recents.as_slice()[0].eth_address, "0xAA");
        assert_eq!(recents.as_slice()[0].farcaster_id, 0);
        assert_eq!(recents.as_slice()[1].farcaster_id, 2);
    }

    #[tokio::test]
    async fn test_remember_persists() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        remember(&store, "0xme", user(9, "0x9")).await?;
        remember(&store, "0xme", user(10, "0x10")).await?;

        let loaded = RecentRecipients::load(&store, "0xME").await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.as_slice()[0].farcaster_id, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_repairs_stored_duplicates() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let broken = vec![user(1, "0x1"), user(2, "0x1"), user(3, "0x3"), user(4, "0x4"), user(5, "0x5"), user(6, "0x6")];
        store_json(&store, &owner_key(RECENT_RECIPIENTS_PREFIX, "0xme"), &broken).await?;

        let loaded = RecentRecipients::load(&store, "0xme").await;
        assert_eq!(loaded.len(), MAX_RECENT_RECIPIENTS);
        let fids: Vec<_> = loaded.as_slice().iter().map(|r| r.farcaster_id).collect();
        assert_eq!(fids, vec![1, 3, 4, 5]);
        Ok(())
    }
}
