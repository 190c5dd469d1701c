//! Turns a wallet's raw provider holdings into the ordered, partitioned
//! collection the wallet view shows, hiding likely spam along the way.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::{
    nft::NftRecord,
    storage::{hidden::HideList, KeyValueStore},
};

/// One page of owned NFTs in provider format.
#[derive(Debug, Default, Clone)]
pub struct OwnedNftsPage {
    pub nfts: Vec<serde_json::Value>,
    pub page_key: Option<String>,
}

/// Paginated source of owned NFTs.
#[async_trait::async_trait]
pub trait NftSource: Send + Sync {
    async fn owned_nfts_page(
        &self,
        owner: &str,
        page_key: Option<&str>,
    ) -> anyhow::Result<OwnedNftsPage>;
}

/// Follows page cursors until the provider stops returning one.
pub async fn fetch_owned_nfts(
    source: &dyn NftSource,
    owner: &str,
) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut nfts = Vec::new();
    let mut page_key: Option<String> = None;
    loop {
        let page = source.owned_nfts_page(owner, page_key.as_deref()).await?;
        nfts.extend(page.nfts);
        match page.page_key.filter(|key| !key.is_empty()) {
            Some(next) => page_key = Some(next),
            None => break,
        }
    }
    Ok(nfts)
}

/// Parses provider items, skipping the unparseable ones. Duplicate ids keep
/// the position of their first occurrence and the content of the last.
pub fn normalize(values: Vec<serde_json::Value>) -> Vec<NftRecord> {
    let mut records: Vec<NftRecord> = Vec::with_capacity(values.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for value in values {
        let record = match NftRecord::parse(value) {
            Ok(record) => record,
            Err(err) => {
                warn!("skipping owned nft: {err}");
                continue;
            }
        };
        match positions.get(&record.id) {
            Some(&position) => records[position] = record,
            None => {
                positions.insert(record.id.clone(), records.len());
                records.push(record);
            }
        }
    }
    records
}

/// Adds auto-hide candidates to `hide_list`, returning whether anything was added.
pub fn apply_auto_hide(records: &[NftRecord], hide_list: &mut HideList) -> bool {
    hide_list.hide(
        records
            .iter()
            .filter(|record| record.should_auto_hide())
            .map(|record| record.id.clone()),
    )
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum CollectionView {
    #[default]
    Main,
    Hidden,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Order the provider returned.
    #[default]
    Date,
    Name,
    Collection,
    Floor,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

/// Keeps the records that belong to `view`.
pub fn partition(
    records: Vec<NftRecord>,
    hide_list: &HideList,
    view: CollectionView,
) -> Vec<NftRecord> {
    records
        .into_iter()
        .filter(|record| hide_list.contains(&record.id) == (view == CollectionView::Hidden))
        .collect()
}

fn folded_cmp(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Stable sort. Records without a floor stay below every priced record
/// regardless of direction.
pub fn sort_records(records: &mut [NftRecord], order: SortOrder) {
    match order.key {
        SortKey::Date => {}
        SortKey::Name => records.sort_by(|a, b| directed(folded_cmp(&a.name, &b.name), order.direction)),
        SortKey::Collection => records.sort_by(|a, b| {
            directed(
                folded_cmp(&a.collection_name, &b.collection_name),
                order.direction,
            )
        }),
        SortKey::Floor => records.sort_by(|a, b| match (a.floor_price_eth, b.floor_price_eth) {
            (Some(a), Some(b)) => directed(a.total_cmp(&b), order.direction),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled {
    pub records: Vec<NftRecord>,
    pub hide_list: HideList,
}

impl Reconciled {
    pub fn empty(hide_list: HideList) -> Self {
        Self {
            records: Vec::new(),
            hide_list,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub view: CollectionView,
    pub order: SortOrder,
}

#[derive(Clone)]
pub struct Reconciler {
    source: Arc<dyn NftSource>,
    store: Arc<dyn KeyValueStore>,
}

impl Reconciler {
    pub fn new(source: Arc<dyn NftSource>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        &*self.store
    }

    /// Fetches every owned NFT, persists newly auto-hidden ids and returns the
    /// requested partition in the requested order.
    pub async fn reconcile(
        &self,
        owner: &str,
        request: ReconcileRequest,
    ) -> anyhow::Result<Reconciled> {
        if owner.trim().is_empty() {
            anyhow::bail!("wallet address is empty");
        }
        let mut hide_list = HideList::load(&*self.store, owner).await;
        let raw = fetch_owned_nfts(&*self.source, owner).await?;
        let fetched = raw.len();
        let records = normalize(raw);

        if apply_auto_hide(&records, &mut hide_list) {
            hide_list.save(&*self.store, owner).await?;
        }

        let mut records = partition(records, &hide_list, request.view);
        sort_records(&mut records, request.order);
        debug!(
            "reconciled {owner}: {fetched} fetched, {} in {:?} view, {} hidden",
            records.len(),
            request.view,
            hide_list.len()
        );
        Ok(Reconciled { records, hide_list })
    }

    /// Failures collapse to an empty collection with whatever hide-list is stored.
    pub async fn reconcile_or_empty(&self, owner: &str, request: ReconcileRequest) -> Reconciled {
        match self.reconcile(owner, request).await {
            Ok(reconciled) => reconciled,
            Err(err) => {
                warn!("failed to reconcile nfts of {owner}: {err:#}");
                Reconciled::empty(HideList::load(&*self.store, owner).await)
            }
        }
    }
}
