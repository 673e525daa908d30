use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::feed::{page_offset, FeedPage, FeedScope};
use crate::domain::post::PostFilter;
use crate::infra::cache::{CacheError, CacheKey, FeedCache};
use crate::infra::store::{ContentStore, FollowStore};

#[derive(Clone, Copy, Debug)]
pub struct FeedSettings {
    pub cache_ttl: Duration,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(20),
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn ContentStore>,
    follows: Arc<dyn FollowStore>,
    cache: Arc<dyn FeedCache>,
    settings: FeedSettings,
}

impl FeedService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        follows: Arc<dyn FollowStore>,
        cache: Arc<dyn FeedCache>,
        settings: FeedSettings,
    ) -> Self {
        Self {
            store,
            follows,
            cache,
            settings,
        }
    }

    /// One page of `scope`, most recent first. Pages are one-based; a page
    /// past the end is empty rather than an error.
    pub async fn get_page(
        &self,
        viewer_id: Option<Uuid>,
        scope: FeedScope,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> ServiceResult<FeedPage> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(ServiceError::invalid("page must be at least 1"));
        }
        let page_size = page_size.unwrap_or(self.settings.default_page_size);
        if page_size == 0 || page_size > self.settings.max_page_size {
            return Err(ServiceError::invalid(format!(
                "page_size must be between 1 and {}",
                self.settings.max_page_size
            )));
        }

        self.check_scope(viewer_id, &scope).await?;

        // The generation must be read before the store is queried: a page
        // computed concurrently with a write then lands under a superseded
        // generation and is never served.
        let generation = match self.cache.generation(&scope).await {
            Ok(generation) => Some(generation),
            Err(err) => {
                warn!(error = ?err, scope = %scope, "failed to read feed generation, bypassing cache");
                None
            }
        };
        let cache_key =
            generation.map(|generation| CacheKey::page(&scope, generation, page, page_size));

        if let Some(key) = cache_key.as_deref() {
            match self.cache.get(key).await {
                Ok(cached) => {
                    debug!(scope = %scope, page, "feed cache hit");
                    return Ok(cached);
                }
                Err(CacheError::Miss) => {}
                Err(err) => warn!(error = ?err, scope = %scope, "failed to read feed cache"),
            }
        }

        let feed_page = self.assemble(scope, page, page_size).await?;

        if let Some(key) = cache_key.as_deref() {
            if let Err(err) = self.cache.put(key, &feed_page, self.settings.cache_ttl).await {
                warn!(error = ?err, scope = %scope, "failed to write feed cache");
            }
        }

        Ok(feed_page)
    }

    async fn check_scope(&self, viewer_id: Option<Uuid>, scope: &FeedScope) -> ServiceResult<()> {
        match scope {
            FeedScope::Global => Ok(()),
            FeedScope::Author(author_id) => {
                if self.store.author_by_id(*author_id).await?.is_none() {
                    return Err(ServiceError::not_found("author not found"));
                }
                Ok(())
            }
            FeedScope::Group(group_id) => {
                if self.store.group_by_id(*group_id).await?.is_none() {
                    return Err(ServiceError::not_found("group not found"));
                }
                Ok(())
            }
            FeedScope::Following(follower_id) => {
                if viewer_id != Some(*follower_id) {
                    return Err(ServiceError::forbidden(
                        "following feed is only visible to its owner",
                    ));
                }
                if self.store.author_by_id(*follower_id).await?.is_none() {
                    return Err(ServiceError::not_found("user not found"));
                }
                Ok(())
            }
        }
    }

    async fn assemble(&self, scope: FeedScope, page: u32, page_size: u32) -> ServiceResult<FeedPage> {
        let filter = match scope {
            FeedScope::Global => PostFilter::All,
            FeedScope::Author(author_id) => PostFilter::Author(author_id),
            FeedScope::Group(group_id) => PostFilter::Group(group_id),
            FeedScope::Following(follower_id) => {
                let followed = self
                    .follows
                    .list_followed(follower_id)
                    .await?
                    .into_iter()
                    .map(|follow| follow.followed_id)
                    .collect();
                PostFilter::Authors(followed)
            }
        };

        let window = self
            .store
            .page_posts(&filter, page_offset(page, page_size), i64::from(page_size))
            .await?;

        debug!(
            scope = %scope,
            page,
            total_count = window.total_count,
            items = window.items.len(),
            "assembled feed page"
        );
        Ok(FeedPage::new(scope, page, page_size, window.total_count, window.items))
    }

    /// Invalidate every scope a post by `author_id` in `group_ids` shows up in.
    /// Failures are logged; the TTL still bounds staleness.
    pub async fn invalidate_post_scopes(&self, author_id: Uuid, group_ids: &[Uuid]) {
        let mut scopes = vec![FeedScope::Global, FeedScope::Author(author_id)];
        for group_id in group_ids {
            let scope = FeedScope::Group(*group_id);
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }

        match self.follows.list_follower_ids(author_id).await {
            Ok(follower_ids) => {
                scopes.extend(follower_ids.into_iter().map(FeedScope::Following));
            }
            Err(err) => {
                warn!(error = ?err, author_id = %author_id, "failed to list followers for feed invalidation");
            }
        }

        if let Err(err) = self.cache.invalidate(&scopes).await {
            warn!(error = ?err, author_id = %author_id, "failed to invalidate feed cache");
        }
    }

    pub async fn invalidate_following(&self, follower_id: Uuid) {
        if let Err(err) = self
            .cache
            .invalidate(&[FeedScope::Following(follower_id)])
            .await
        {
            warn!(error = ?err, follower_id = %follower_id, "failed to invalidate following feed");
        }
    }

    pub async fn clear_cache(&self) -> ServiceResult<()> {
        self.cache
            .clear()
            .await
            .map_err(|err| ServiceError::Internal(err.into()))
    }
}
