use std::{collections::HashMap, str::FromStr};

use anyhow::Context;
use derive_more::derive::Deref;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::RwLock;
use tracing::warn;

pub mod hidden;
pub mod recipients;

/// Whole-value key-value persistence. Writes replace the stored value, the last
/// writer wins.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
}

/// Reads a json value, defaulting on absent or malformed data.
pub async fn load_json_or_default<T: DeserializeOwned + Default>(
    store: &dyn KeyValueStore,
    key: &str,
) -> T {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!("failed to read {key} from store, using default: {err:#}");
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!("stored {key} is malformed, using default: {err}");
        T::default()
    })
}

pub async fn store_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value).with_context(|| format!("serialize {key}"))?;
    store.set(key, raw).await
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

pub fn default_max_connections() -> u32 {
    5
}

#[derive(Deref, Clone)]
pub struct StorageClient {
    pub pool: sqlx::Pool<sqlx::Sqlite>,
}

impl StorageClient {
    pub async fn new(pool: sqlx::Pool<sqlx::Sqlite>) -> anyhow::Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .context("create kv_store table")?;
        Ok(Self { pool })
    }

    pub async fn from_config(config: StorageConfig) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("invalid sqlite url {}", config.url))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        Self::new(pool).await
    }
}

#[async_trait::async_trait]
impl KeyValueStore for StorageClient {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.values.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Per-wallet storage key, addresses compared case-insensitively.
pub fn owner_key(prefix: &str, owner: &str) -> String {
    format!("{prefix}:{}", owner.trim().to_lowercase())
}
