//! Recipient lookup by Farcaster username or wallet address.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::storage::recipients::RecentRecipient;

pub const MIN_QUERY_LEN: usize = 2;
pub const USERNAME_SEARCH_LIMIT: usize = 5;
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Farcaster user as the identity API returns it.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct FarcasterUser {
    pub fid: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp_url: Option<String>,
    #[serde(default)]
    pub custody_address: Option<String>,
    #[serde(default)]
    pub verified_addresses: VerifiedAddresses,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct VerifiedAddresses {
    #[serde(default)]
    pub eth_addresses: Vec<String>,
}

impl FarcasterUser {
    /// First verified ETH address, falling back to the custody address.
    pub fn preferred_address(&self) -> Option<&str> {
        self.verified_addresses
            .eth_addresses
            .iter()
            .map(String::as_str)
            .chain(self.custody_address.as_deref())
            .find(|address| !address.trim().is_empty())
    }

    pub fn into_recipient(self) -> Option<RecentRecipient> {
        let eth_address = self.preferred_address()?.to_owned();
        let display_name = self
            .display_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.username.clone());
        Some(RecentRecipient {
            farcaster_id: self.fid,
            username: self.username,
            display_name,
            avatar_url: self.pfp_url,
            eth_address,
        })
    }
}

#[async_trait::async_trait]
pub trait IdentityApi: Send + Sync {
    async fn users_by_address(&self, address: &str) -> anyhow::Result<Vec<FarcasterUser>>;
    async fn search_users(&self, query: &str, limit: usize) -> anyhow::Result<Vec<FarcasterUser>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientQuery {
    TooShort,
    Address(String),
    Username(String),
}

impl RecipientQuery {
    pub fn classify(input: &str) -> Self {
        let len = input.chars().count();
        if len < MIN_QUERY_LEN {
            RecipientQuery::TooShort
        } else if input.starts_with("0x") && len > 10 {
            RecipientQuery::Address(input.to_owned())
        } else {
            RecipientQuery::Username(input.to_owned())
        }
    }
}

/// Runs a classified query. Upstream failures read as no results.
pub async fn lookup(api: &dyn IdentityApi, query: &RecipientQuery) -> Vec<RecentRecipient> {
    let users = match query {
        RecipientQuery::TooShort => return Vec::new(),
        RecipientQuery::Address(address) => api.users_by_address(address).await,
        RecipientQuery::Username(name) => api.search_users(name, USERNAME_SEARCH_LIMIT).await,
    };
    match users {
        Ok(users) => users
            .into_iter()
            .filter_map(FarcasterUser::into_recipient)
            .collect(),
        Err(err) => {
            warn!("recipient search for {query:?} failed: {err:#}");
            Vec::new()
        }
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub results: Vec<RecentRecipient>,
    /// A newer query from the same session superseded this one.
    pub stale: bool,
}

/// Debounced search where only the latest query of each session gets results.
pub struct RecipientSearch {
    api: Arc<dyn IdentityApi>,
    debounce: Duration,
    sequence: AtomicU64,
    latest: Mutex<HashMap<String, u64>>,
}

/// Sequence number of an in-flight search. Releases the session slot when
/// dropped, including when the caller goes away mid-search.
struct PendingSearch<'a> {
    latest: &'a Mutex<HashMap<String, u64>>,
    session: &'a str,
    seq: u64,
}

impl PendingSearch<'_> {
    fn is_latest(&self) -> bool {
        lock(self.latest).get(self.session) == Some(&self.seq)
    }
}

impl Drop for PendingSearch<'_> {
    fn drop(&mut self) {
        let mut latest = lock(self.latest);
        if latest.get(self.session) == Some(&self.seq) {
            latest.remove(self.session);
        }
    }
}

fn lock(latest: &Mutex<HashMap<String, u64>>) -> MutexGuard<'_, HashMap<String, u64>> {
    latest.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecipientSearch {
    pub fn new(api: Arc<dyn IdentityApi>) -> Self {
        Self::with_debounce(api, SEARCH_DEBOUNCE)
    }

    pub fn with_debounce(api: Arc<dyn IdentityApi>, debounce: Duration) -> Self {
        Self {
            api,
            debounce,
            sequence: AtomicU64::new(0),
            latest: Mutex::new(HashMap::new()),
        }
    }

    fn issue<'a>(&'a self, session: &'a str) -> PendingSearch<'a> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.latest).insert(session.to_owned(), seq);
        PendingSearch {
            latest: &self.latest,
            session,
            seq,
        }
    }

    /// Without a session nothing can supersede the query, so it runs at once.
    pub async fn search(&self, session: Option<&str>, input: &str) -> SearchOutcome {
        let query = RecipientQuery::classify(input);
        let Some(session) = session else {
            return SearchOutcome {
                results: lookup(&*self.api, &query).await,
                stale: false,
            };
        };
        if query == RecipientQuery::TooShort {
            // clearing the input still supersedes whatever is in flight
            lock(&self.latest).remove(session);
            return SearchOutcome::default();
        }

        let pending = self.issue(session);
        tokio::time::sleep(self.debounce).await;
        if !pending.is_latest() {
            debug!("search #{} of {session} superseded before lookup", pending.seq);
            return SearchOutcome {
                results: Vec::new(),
                stale: true,
            };
        }

        let results = lookup(&*self.api, &query).await;
        if !pending.is_latest() {
            debug!("search #{} of {session} superseded during lookup", pending.seq);
            return SearchOutcome {
                results: Vec::new(),
                stale: true,
            };
        }
        SearchOutcome {
            results,
            stale: false,
        }
    }
}
