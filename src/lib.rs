pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::feed::{FeedService, FeedSettings};
use crate::app::groups::GroupService;
use crate::app::posts::PostService;
use crate::app::social::SubscriptionIndex;
use crate::app::users::UserService;
use crate::config::{AppConfig, CacheBackend, StoreBackend};
use crate::infra::cache::{FeedCache, MemoryFeedCache, RedisCache};
use crate::infra::db::Db;
use crate::infra::store::memory::MemoryStore;
use crate::infra::store::postgres::PgStore;
use crate::infra::store::{ContentStore, FollowStore};

const MIGRATIONS_DIR: &str = "migrations";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub follows: Arc<dyn FollowStore>,
    pub cache: Arc<dyn FeedCache>,
    pub feed_settings: FeedSettings,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub request_body_limit_bytes: usize,
}

impl AppState {
    /// Connect the configured backends.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let (store, follows): (Arc<dyn ContentStore>, Arc<dyn FollowStore>) =
            match config.store_backend {
                StoreBackend::Postgres => {
                    let db = Db::connect(config).await?;
                    if config.run_migrations {
                        db.run_migrations(MIGRATIONS_DIR).await?;
                    }
                    let store = Arc::new(PgStore::new(db));
                    let content: Arc<dyn ContentStore> = store.clone();
                    let follows: Arc<dyn FollowStore> = store;
                    (content, follows)
                }
                StoreBackend::Memory => {
                    tracing::warn!("using in-memory content store, data is not persisted");
                    let store = Arc::new(MemoryStore::new());
                    let content: Arc<dyn ContentStore> = store.clone();
                    let follows: Arc<dyn FollowStore> = store;
                    (content, follows)
                }
            };

        let cache: Arc<dyn FeedCache> = match config.cache_backend {
            CacheBackend::Redis => Arc::new(RedisCache::connect(&config.redis_url).await?),
            CacheBackend::Memory => Arc::new(MemoryFeedCache::new(config.feed_cache_max_entries)),
        };

        Ok(Self {
            store,
            follows,
            cache,
            feed_settings: FeedSettings {
                cache_ttl: Duration::from_secs(config.feed_cache_ttl_seconds),
                default_page_size: config.feed_page_size,
                max_page_size: config.feed_max_page_size,
            },
            admin_token: config.admin_token.clone(),
            paseto_access_key: config.paseto_access_key,
            access_ttl_minutes: config.access_ttl_minutes,
            request_body_limit_bytes: config.request_body_limit_bytes,
        })
    }

    pub fn feed_service(&self) -> FeedService {
        FeedService::new(
            self.store.clone(),
            self.follows.clone(),
            self.cache.clone(),
            self.feed_settings,
        )
    }

    pub fn post_service(&self) -> PostService {
        PostService::new(self.store.clone(), self.feed_service())
    }

    pub fn comment_service(&self) -> CommentService {
        CommentService::new(self.store.clone())
    }

    pub fn group_service(&self) -> GroupService {
        GroupService::new(self.store.clone())
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(self.store.clone(), self.follows.clone(), self.subscriptions())
    }

    pub fn subscriptions(&self) -> SubscriptionIndex {
        SubscriptionIndex::new(self.store.clone(), self.follows.clone(), self.feed_service())
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.paseto_access_key, self.access_ttl_minutes)
    }
}
