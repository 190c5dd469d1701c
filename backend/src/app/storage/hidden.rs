use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{load_json_or_default, owner_key, store_json, KeyValueStore};

const HIDDEN_NFTS_PREFIX: &str = "hidden_nfts";

/// Ids of NFTs kept out of the main collection view.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Vec<String>)]
pub struct HideList(BTreeSet<String>);

impl HideList {
    pub async fn load(store: &dyn KeyValueStore, owner: &str) -> Self {
        load_json_or_default(store, &owner_key(HIDDEN_NFTS_PREFIX, owner)).await
    }

    /// Replaces the whole persisted set.
    pub async fn save(&self, store: &dyn KeyValueStore, owner: &str) -> anyhow::Result<()> {
        store_json(store, &owner_key(HIDDEN_NFTS_PREFIX, owner), self).await
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Returns whether the id was newly added.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    pub fn hide<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, ids: I) -> bool {
        ids.into_iter()
            .fold(false, |changed, id| self.0.insert(id.into()) || changed)
    }

    pub fn unhide<I: IntoIterator<Item = S>, S: AsRef<str>>(&mut self, ids: I) -> bool {
        ids.into_iter()
            .fold(false, |changed, id| self.0.remove(id.as_ref()) || changed)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for HideList {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Hides `ids` for `owner` and persists the result as one write.
pub async fn hide(
    store: &dyn KeyValueStore,
    owner: &str,
    ids: &[String],
) -> anyhow::Result<HideList> {
    let mut list = HideList::load(store, owner).await;
    list.hide(ids.iter().cloned());
    list.save(store, owner).await?;
    Ok(list)
}

/// Unhides `ids` for `owner` and persists the result as one write.
pub async fn unhide(
    store: &dyn KeyValueStore,
    owner: &str,
    ids: &[String],
) -> anyhow::Result<HideList> {
    let mut list = HideList::load(store, owner).await;
    list.unhide(ids);
    list.save(store, owner).await?;
    Ok(list)
}
