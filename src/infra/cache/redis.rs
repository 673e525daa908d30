use anyhow::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use std::time::Duration;

use crate::domain::feed::{FeedPage, FeedScope};
use crate::infra::cache::{CacheError, CacheKey, CacheResult, FeedCache};

const SCAN_BATCH: usize = 500;

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedCache for RedisCache {
    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<FeedPage> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(key).await?;
        let payload = payload.ok_or(CacheError::Miss)?;
        Ok(serde_json::from_str(&payload)?)
    }

    async fn put(&self, key: &str, page: &FeedPage, ttl: Duration) -> CacheResult<()> {
        let payload = serde_json::to_string(page)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        // SET EX rejects 0; round sub-second TTLs up.
        let ttl_seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, payload, ttl_seconds).await?;
        Ok(())
    }

    async fn generation(&self, scope: &FeedScope) -> CacheResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let generation: Option<u64> = conn.get(CacheKey::generation(scope)).await?;
        Ok(generation.unwrap_or(0))
    }

    async fn invalidate(&self, scopes: &[FeedScope]) -> CacheResult<()> {
        if scopes.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for scope in scopes {
            pipe.incr(CacheKey::generation(scope), 1).ignore();
        }
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        pipe.query_async::<_, ()>(&mut conn).await?;

        tracing::debug!(count = scopes.len(), "invalidated feed scopes");
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pattern = format!("{}*", CacheKey::page_prefix());
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                removed += keys.len();
                conn.del::<_, ()>(keys).await?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::info!(removed, "cleared feed cache");
        Ok(())
    }
}
