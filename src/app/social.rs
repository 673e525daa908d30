use std::sync::Arc;
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::app::feed::FeedService;
use crate::domain::social_graph::Follow;
use crate::domain::user::Author;
use crate::infra::store::{ContentStore, FollowStore};

/// Follower → followed-authors relation backing the following feed.
#[derive(Clone)]
pub struct SubscriptionIndex {
    store: Arc<dyn ContentStore>,
    follows: Arc<dyn FollowStore>,
    feed: FeedService,
}

impl SubscriptionIndex {
    pub fn new(store: Arc<dyn ContentStore>, follows: Arc<dyn FollowStore>, feed: FeedService) -> Self {
        Self {
            store,
            follows,
            feed,
        }
    }

    pub async fn add(&self, follower_id: Uuid, followed_id: Uuid) -> ServiceResult<()> {
        if follower_id == followed_id {
            return Err(ServiceError::invalid("cannot follow yourself"));
        }
        self.require_author(follower_id, "user not found").await?;
        self.require_author(followed_id, "author not found").await?;

        let inserted = self.follows.insert_follow(follower_id, followed_id).await?;
        if !inserted {
            return Err(ServiceError::invalid("already following this author"));
        }

        self.feed.invalidate_following(follower_id).await;
        tracing::info!(follower_id = %follower_id, followed_id = %followed_id, "followed author");
        Ok(())
    }

    /// Returns whether a follow was removed; removing an absent pair is a no-op.
    pub async fn remove(&self, follower_id: Uuid, followed_id: Uuid) -> ServiceResult<bool> {
        self.require_author(followed_id, "author not found").await?;

        let removed = self.follows.delete_follow(follower_id, followed_id).await?;
        if removed {
            self.feed.invalidate_following(follower_id).await;
            tracing::info!(follower_id = %follower_id, followed_id = %followed_id, "unfollowed author");
        }
        Ok(removed)
    }

    /// Ids of every author `follower_id` follows, most recent follow first.
    pub async fn list(&self, follower_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        let follows = self.follows.list_followed(follower_id).await?;
        Ok(follows.into_iter().map(|follow| follow.followed_id).collect())
    }

    pub async fn list_followed_authors(&self, follower_id: Uuid) -> ServiceResult<Vec<(Author, Follow)>> {
        let follows = self.follows.list_followed(follower_id).await?;
        let mut items = Vec::with_capacity(follows.len());
        for follow in follows {
            // Skip authors removed upstream between the two reads.
            if let Some(author) = self.store.author_by_id(follow.followed_id).await? {
                items.push((author, follow));
            }
        }
        Ok(items)
    }

    pub async fn followers_of(&self, author_id: Uuid) -> ServiceResult<Vec<Uuid>> {
        Ok(self.follows.list_follower_ids(author_id).await?)
    }

    pub async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> ServiceResult<bool> {
        Ok(self.follows.is_following(follower_id, followed_id).await?)
    }

    async fn require_author(&self, id: Uuid, message: &str) -> ServiceResult<Author> {
        self.store
            .author_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(message))
    }
}
