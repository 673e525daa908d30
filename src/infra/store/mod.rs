//! Persistence seams for content and the social graph.
//!
//! Both traits are implemented by [`postgres::PgStore`] and
//! [`memory::MemoryStore`]; services only ever see the trait objects.

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::group::{Group, NewGroup};
use crate::domain::post::{NewPost, Post, PostChanges, PostFilter, PostSummary};
use crate::domain::social_graph::Follow;
use crate::domain::user::{Author, NewAuthor};

pub mod memory;
pub mod postgres;

/// `(created_at, id)` of the last item of the previous page.
pub type Cursor = (OffsetDateTime, Uuid);

/// A window of a post listing plus the size of the whole listing, both read
/// from one snapshot.
#[derive(Debug, Clone, Default)]
pub struct PostWindow {
    pub total_count: i64,
    pub items: Vec<PostSummary>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Fails if the username is taken.
    async fn insert_author(&self, author: NewAuthor) -> Result<Author>;

    async fn author_by_id(&self, id: Uuid) -> Result<Option<Author>>;

    async fn author_by_username(&self, username: &str) -> Result<Option<Author>>;

    /// Returns `None` if the slug is taken.
    async fn insert_group(&self, group: NewGroup) -> Result<Option<Group>>;

    async fn group_by_id(&self, id: Uuid) -> Result<Option<Group>>;

    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>>;

    async fn insert_post(&self, post: NewPost) -> Result<Post>;

    async fn post_by_id(&self, id: Uuid) -> Result<Option<Post>>;

    /// Returns the updated post, or `None` if it does not exist.
    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<Option<Post>>;

    /// Deletes the post together with its comments.
    async fn delete_post(&self, id: Uuid) -> Result<bool>;

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64>;

    /// Posts ordered by `(created_at DESC, id DESC)`, with the total count of
    /// matching posts taken from the same snapshot.
    async fn page_posts(&self, filter: &PostFilter, offset: i64, limit: i64)
        -> Result<PostWindow>;

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment>;

    /// Comments ordered by `(created_at DESC, id DESC)`, strictly after `cursor`.
    async fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Comment>>;
}

#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Returns `false` if the pair already exists or is reflexive.
    async fn insert_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool>;

    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool>;

    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool>;

    /// Follows made by `follower_id`, most recent first.
    async fn list_followed(&self, follower_id: Uuid) -> Result<Vec<Follow>>;

    async fn list_follower_ids(&self, followed_id: Uuid) -> Result<Vec<Uuid>>;

    async fn count_followers(&self, followed_id: Uuid) -> Result<i64>;

    async fn count_following(&self, follower_id: Uuid) -> Result<i64>;
}
