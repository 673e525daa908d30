use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::feed::{FeedPage, FeedScope};
use crate::infra::cache::{CacheError, CacheKey, CacheResult, FeedCache};

struct CachedPage {
    page: FeedPage,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    pages: HashMap<String, CachedPage>,
    generations: HashMap<FeedScope, u64>,
}

/// Process-local feed cache bounded by `max_entries`.
pub struct MemoryFeedCache {
    inner: RwLock<Inner>,
    max_entries: usize,
}

impl MemoryFeedCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.pages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Inner {
    /// Make room for one more page: drop expired pages first, then the page
    /// closest to expiry.
    fn evict_for_insert(&mut self, max_entries: usize, now: Instant) {
        if self.pages.len() < max_entries {
            return;
        }
        self.pages.retain(|_, cached| cached.expires_at > now);

        while self.pages.len() >= max_entries {
            let oldest = self
                .pages
                .iter()
                .min_by_key(|(_, cached)| cached.expires_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.pages.remove(&key);
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl FeedCache for MemoryFeedCache {
    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<FeedPage> {
        let now = Instant::now();
        {
            let inner = self.inner.read().await;
            match inner.pages.get(key) {
                Some(cached) if cached.expires_at > now => return Ok(cached.page.clone()),
                Some(_) => {}
                None => return Err(CacheError::Miss),
            }
        }

        // Expired: drop it unless a fresh page replaced it in the meantime.
        let mut inner = self.inner.write().await;
        if let Some(cached) = inner.pages.get(key) {
            if cached.expires_at <= now {
                inner.pages.remove(key);
            }
        }
        Err(CacheError::Miss)
    }

    async fn put(&self, key: &str, page: &FeedPage, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        if !inner.pages.contains_key(key) {
            inner.evict_for_insert(self.max_entries, now);
        }
        inner.pages.insert(
            key.to_string(),
            CachedPage {
                page: page.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn generation(&self, scope: &FeedScope) -> CacheResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.generations.get(scope).copied().unwrap_or(0))
    }

    async fn invalidate(&self, scopes: &[FeedScope]) -> CacheResult<()> {
        let stale: HashSet<String> = scopes.iter().map(CacheKey::scope_prefix).collect();

        let mut inner = self.inner.write().await;
        for scope in scopes {
            *inner.generations.entry(*scope).or_insert(0) += 1;
        }
        inner.pages.retain(|key, _| {
            !CacheKey::owning_scope_prefix(key).is_some_and(|prefix| stale.contains(prefix))
        });
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut inner = self.inner.write().await;
        let removed = inner.pages.len();
        inner.pages.clear();
        tracing::info!(removed, "cleared feed cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn page(scope: FeedScope) -> FeedPage {
        FeedPage::new(scope, 1, 10, 0, Vec::new())
    }

    #[tokio::test(start_paused = true)]
    async fn expired_pages_are_never_served() {
        let cache = MemoryFeedCache::new(16);
        let key = CacheKey::page(&FeedScope::Global, 0, 1, 10);
        cache
            .put(&key, &page(FeedScope::Global), Duration::from_secs(20))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(19)).await;
        assert!(cache.get(&key).await.is_ok());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(cache.get(&key).await, Err(CacheError::Miss)));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn invalidate_bumps_generation_and_drops_scope_pages() {
        let cache = MemoryFeedCache::new(16);
        let author = FeedScope::Author(Uuid::new_v4());
        let ttl = Duration::from_secs(60);

        let author_key = CacheKey::page(&author, 0, 1, 10);
        let global_key = CacheKey::page(&FeedScope::Global, 0, 1, 10);
        cache.put(&author_key, &page(author), ttl).await.unwrap();
        cache.put(&global_key, &page(FeedScope::Global), ttl).await.unwrap();

        cache.invalidate(&[author]).await.unwrap();

        assert_eq!(cache.generation(&author).await.unwrap(), 1);
        assert_eq!(cache.generation(&FeedScope::Global).await.unwrap(), 0);
        assert!(matches!(cache.get(&author_key).await, Err(CacheError::Miss)));
        assert!(cache.get(&global_key).await.is_ok());
    }

    #[tokio::test]
    async fn invalidating_many_scopes_drops_only_their_pages() {
        let cache = MemoryFeedCache::new(256);
        let ttl = Duration::from_secs(60);
        let followers: Vec<FeedScope> = (0..50)
            .map(|_| FeedScope::Following(Uuid::new_v4()))
            .collect();
        for scope in &followers {
            for page_no in 1..=2 {
                let key = CacheKey::page(scope, 0, page_no, 10);
                cache.put(&key, &page(*scope), ttl).await.unwrap();
            }
        }
        let bystander = FeedScope::Following(Uuid::new_v4());
        let bystander_key = CacheKey::page(&bystander, 0, 1, 10);
        cache.put(&bystander_key, &page(bystander), ttl).await.unwrap();

        cache.invalidate(&followers).await.unwrap();

        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&bystander_key).await.is_ok());
        for scope in &followers {
            assert_eq!(cache.generation(scope).await.unwrap(), 1);
        }
        assert_eq!(cache.generation(&bystander).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn clear_keeps_generations() {
        let cache = MemoryFeedCache::new(16);
        let ttl = Duration::from_secs(60);
        cache.invalidate(&[FeedScope::Global]).await.unwrap();
        let key = CacheKey::page(&FeedScope::Global, 1, 1, 10);
        cache.put(&key, &page(FeedScope::Global), ttl).await.unwrap();

        cache.clear().await.unwrap();

        assert!(cache.is_empty().await);
        assert_eq!(cache.generation(&FeedScope::Global).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_page_closest_to_expiry() {
        let cache = MemoryFeedCache::new(2);
        let first = CacheKey::page(&FeedScope::Global, 0, 1, 10);
        let second = CacheKey::page(&FeedScope::Global, 0, 2, 10);
        let third = CacheKey::page(&FeedScope::Global, 0, 3, 10);

        cache
            .put(&first, &page(FeedScope::Global), Duration::from_secs(5))
            .await
            .unwrap();
        cache
            .put(&second, &page(FeedScope::Global), Duration::from_secs(50))
            .await
            .unwrap();
        cache
            .put(&third, &page(FeedScope::Global), Duration::from_secs(50))
            .await
            .unwrap();

        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&first).await.is_err());
        assert!(cache.get(&second).await.is_ok());
        assert!(cache.get(&third).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invalidations_are_not_lost() {
        let cache = Arc::new(MemoryFeedCache::new(1024));
        let mut handles = Vec::new();
        for i in 0..32u32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.invalidate(&[FeedScope::Global]).await.unwrap();
                let key = CacheKey::page(&FeedScope::Global, u64::from(i), 1, 10);
                cache
                    .put(&key, &page(FeedScope::Global), Duration::from_secs(60))
                    .await
                    .unwrap();
                let _ = cache.get(&key).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.generation(&FeedScope::Global).await.unwrap(), 32);
    }
}
