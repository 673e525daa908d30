//! Feed page cache.
//!
//! Pages are stored under keys that embed the scope's current generation.
//! Invalidating a scope bumps its generation, so every page computed for
//! the old generation becomes unreachable even if it is written after the
//! bump. Entries additionally expire after their TTL.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::feed::{FeedPage, FeedScope};

pub mod memory;
pub mod redis;

pub use self::memory::MemoryFeedCache;
pub use self::redis::RedisCache;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache miss")]
    Miss,

    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Bump when the cached page layout changes.
pub const CACHE_VERSION: u32 = 1;

pub struct CacheKey;

impl CacheKey {
    /// Prefix shared by every cached page.
    /// Format: feed:v1:page:
    pub fn page_prefix() -> String {
        format!("feed:v{}:page:", CACHE_VERSION)
    }

    /// Prefix shared by every cached page of one scope.
    /// Format: feed:v1:page:{scope}:
    pub fn scope_prefix(scope: &FeedScope) -> String {
        format!("{}{}:", Self::page_prefix(), scope.tag())
    }

    /// The [`CacheKey::scope_prefix`] a page key was built from.
    pub fn owning_scope_prefix(key: &str) -> Option<&str> {
        let mut cut = key.len();
        for _ in 0..3 {
            cut = key[..cut].rfind(':')?;
        }
        Some(&key[..=cut])
    }

    /// Format: feed:v1:page:{scope}:g{generation}:p{page}:s{page_size}
    pub fn page(scope: &FeedScope, generation: u64, page: u32, page_size: u32) -> String {
        format!(
            "{}g{}:p{}:s{}",
            Self::scope_prefix(scope),
            generation,
            page,
            page_size
        )
    }

    /// Format: feed:v1:gen:{scope}
    pub fn generation(scope: &FeedScope) -> String {
        format!("feed:v{}:gen:{}", CACHE_VERSION, scope.tag())
    }
}

#[async_trait]
pub trait FeedCache: Send + Sync {
    async fn ping(&self) -> CacheResult<()>;

    /// Returns [`CacheError::Miss`] when the key is absent or expired.
    async fn get(&self, key: &str) -> CacheResult<FeedPage>;

    async fn put(&self, key: &str, page: &FeedPage, ttl: Duration) -> CacheResult<()>;

    /// Current generation of a scope; 0 for a scope never invalidated.
    async fn generation(&self, scope: &FeedScope) -> CacheResult<u64>;

    /// Bump the generation of every scope given.
    async fn invalidate(&self, scopes: &[FeedScope]) -> CacheResult<()>;

    /// Drop every cached page. Generations survive so in-flight fills keyed
    /// on an older generation stay unreachable.
    async fn clear(&self) -> CacheResult<()>;
}
