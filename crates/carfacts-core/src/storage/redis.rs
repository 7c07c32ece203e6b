use super::{RedisConfig, ReportStore};
use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Network store backed by a Redis instance (host, port, password from config).
#[derive(Clone)]
pub struct RedisReportStore {
    conn: ConnectionManager,
}

impl RedisReportStore {
    pub async fn connect(cfg: &RedisConfig) -> anyhow::Result<Self> {
        let url = connection_url(cfg)?;
        let client = redis::Client::open(url.as_str())
            .with_context(|| format!("invalid redis address {}:{}", cfg.host, cfg.port))?;
        let conn = ConnectionManager::new(client)
            .await
            .with_context(|| format!("failed to connect to redis at {}:{}", cfg.host, cfg.port))?;
        tracing::info!(event = "store.redis.connected", host = %cfg.host, port = cfg.port);
        Ok(Self { conn })
    }
}

fn connection_url(cfg: &RedisConfig) -> anyhow::Result<url::Url> {
    let mut url = url::Url::parse(&format!("redis://{}:{}/{}", cfg.host, cfg.port, cfg.db))
        .with_context(|| format!("invalid redis host '{}'", cfg.host))?;
    if let Some(password) = &cfg.password {
        url.set_password(Some(password))
            .map_err(|_| anyhow::anyhow!("cannot set password on redis url"))?;
    }
    Ok(url)
}

#[async_trait]
impl ReportStore for RedisReportStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
