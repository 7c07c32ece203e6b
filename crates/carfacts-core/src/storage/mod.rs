use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub mod memory;
pub mod schema;
pub mod sqlite;

#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryReportStore;
pub use sqlite::SqliteReportStore;

#[cfg(feature = "redis")]
pub use self::redis::RedisReportStore;

/// Durable string-to-string store holding generated reports.
///
/// `get`/`set` must be atomic per key. Any `Err` means the store could not
/// be reached; absence is `Ok(None)`.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            password: None,
            db: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,
    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from(".carfacts/reports.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: default_sqlite_path(),
            redis: RedisConfig::default(),
        }
    }
}

/// Opens the configured backend once; the handle is shared for the process lifetime.
pub async fn open_store(cfg: &StoreConfig) -> anyhow::Result<Arc<dyn ReportStore>> {
    match cfg.backend {
        StoreBackend::Sqlite => {
            if let Some(parent) = cfg.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let store = SqliteReportStore::open(&cfg.path)?;
            store.init_schema()?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryReportStore::new())),
        StoreBackend::Redis => open_redis(&cfg.redis).await,
    }
}

#[cfg(feature = "redis")]
async fn open_redis(cfg: &RedisConfig) -> anyhow::Result<Arc<dyn ReportStore>> {
    Ok(Arc::new(RedisReportStore::connect(cfg).await?))
}

#[cfg(not(feature = "redis"))]
async fn open_redis(_cfg: &RedisConfig) -> anyhow::Result<Arc<dyn ReportStore>> {
    anyhow::bail!("store backend 'redis' requires building with the `redis` feature")
}
