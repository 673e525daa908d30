use std::sync::Arc;
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::app::social::SubscriptionIndex;
use crate::domain::post::PostFilter;
use crate::domain::user::{Author, Profile};
use crate::infra::store::{ContentStore, FollowStore};

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn ContentStore>,
    follows: Arc<dyn FollowStore>,
    subscriptions: SubscriptionIndex,
}

impl UserService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        follows: Arc<dyn FollowStore>,
        subscriptions: SubscriptionIndex,
    ) -> Self {
        Self {
            store,
            follows,
            subscriptions,
        }
    }

    pub async fn get_by_username(&self, username: &str) -> ServiceResult<Author> {
        self.store
            .author_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::not_found("user not found"))
    }

    pub async fn profile(&self, username: &str, viewer_id: Option<Uuid>) -> ServiceResult<Profile> {
        let author = self.get_by_username(username).await?;
        let author_id = author.id;

        let mut profile = Profile::from_author(author);
        profile.posts_count = self.store.count_posts(&PostFilter::Author(author_id)).await?;
        profile.followers_count = self.follows.count_followers(author_id).await?;
        profile.following_count = self.follows.count_following(author_id).await?;
        profile.following = match viewer_id {
            Some(viewer_id) if viewer_id != author_id => {
                self.subscriptions.is_following(viewer_id, author_id).await?
            }
            _ => false,
        };
        Ok(profile)
    }
}
