//! In-process content store for local runs and tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::group::{Group, NewGroup};
use crate::domain::post::{NewPost, Post, PostChanges, PostFilter, PostSummary};
use crate::domain::social_graph::Follow;
use crate::domain::user::{Author, NewAuthor};
use crate::infra::store::{ContentStore, Cursor, FollowStore, PostWindow};

#[derive(Clone)]
struct PostRecord {
    id: Uuid,
    author_id: Uuid,
    text: String,
    group_id: Option<Uuid>,
    image: Option<String>,
    created_at: OffsetDateTime,
}

#[derive(Clone)]
struct CommentRecord {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    text: String,
    created_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    authors: HashMap<Uuid, Author>,
    usernames: HashMap<String, Uuid>,
    groups: HashMap<Uuid, Group>,
    slugs: HashMap<String, Uuid>,
    posts: HashMap<Uuid, PostRecord>,
    comments: HashMap<Uuid, CommentRecord>,
    follows: BTreeMap<(Uuid, Uuid), OffsetDateTime>,
    last_timestamp: Option<OffsetDateTime>,
}

impl Inner {
    /// Strictly increasing wall-clock timestamps so that insertion order is a
    /// total order even when several writes land in the same microsecond.
    fn next_timestamp(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    fn hydrate_post(&self, record: &PostRecord) -> Result<Post> {
        let author = self
            .authors
            .get(&record.author_id)
            .ok_or_else(|| anyhow!("post {} references missing author", record.id))?;
        let group_slug = record
            .group_id
            .and_then(|group_id| self.groups.get(&group_id))
            .map(|group| group.slug.clone());

        Ok(Post {
            id: record.id,
            author_id: record.author_id,
            author_username: author.username.clone(),
            text: record.text.clone(),
            group_id: record.group_id,
            group_slug,
            image: record.image.clone(),
            created_at: record.created_at,
        })
    }

    fn hydrate_comment(&self, record: &CommentRecord) -> Result<Comment> {
        let author = self
            .authors
            .get(&record.author_id)
            .ok_or_else(|| anyhow!("comment {} references missing author", record.id))?;

        Ok(Comment {
            id: record.id,
            post_id: record.post_id,
            author_id: record.author_id,
            author_username: author.username.clone(),
            text: record.text.clone(),
            created_at: record.created_at,
        })
    }

    fn comments_count(&self, post_id: Uuid) -> i64 {
        self.comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .count() as i64
    }

    fn matching_posts(&self, filter: &PostFilter) -> Vec<&PostRecord> {
        self.posts
            .values()
            .filter(|record| match filter {
                PostFilter::All => true,
                PostFilter::Author(author_id) => record.author_id == *author_id,
                PostFilter::Group(group_id) => record.group_id == Some(*group_id),
                PostFilter::Authors(author_ids) => author_ids.contains(&record.author_id),
            })
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_author(&self, author: NewAuthor) -> Result<Author> {
        let mut inner = self.inner.write().await;
        if inner.usernames.contains_key(&author.username) {
            return Err(anyhow!("username already taken: {}", author.username));
        }

        let created_at = inner.next_timestamp();
        let author = Author {
            id: Uuid::new_v4(),
            username: author.username,
            display_name: author.display_name,
            created_at,
        };
        inner.usernames.insert(author.username.clone(), author.id);
        inner.authors.insert(author.id, author.clone());

        Ok(author)
    }

    async fn author_by_id(&self, id: Uuid) -> Result<Option<Author>> {
        let inner = self.inner.read().await;
        Ok(inner.authors.get(&id).cloned())
    }

    async fn author_by_username(&self, username: &str) -> Result<Option<Author>> {
        let inner = self.inner.read().await;
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.authors.get(id))
            .cloned())
    }

    async fn insert_group(&self, group: NewGroup) -> Result<Option<Group>> {
        let mut inner = self.inner.write().await;
        if inner.slugs.contains_key(&group.slug) {
            return Ok(None);
        }

        let group = Group {
            id: Uuid::new_v4(),
            title: group.title,
            slug: group.slug,
            description: group.description,
        };
        inner.slugs.insert(group.slug.clone(), group.id);
        inner.groups.insert(group.id, group.clone());

        Ok(Some(group))
    }

    async fn group_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        let inner = self.inner.read().await;
        Ok(inner.groups.get(&id).cloned())
    }

    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let inner = self.inner.read().await;
        Ok(inner
            .slugs
            .get(slug)
            .and_then(|id| inner.groups.get(id))
            .cloned())
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let mut inner = self.inner.write().await;
        if !inner.authors.contains_key(&post.author_id) {
            return Err(anyhow!("unknown author: {}", post.author_id));
        }
        if let Some(group_id) = post.group_id {
            if !inner.groups.contains_key(&group_id) {
                return Err(anyhow!("unknown group: {}", group_id));
            }
        }

        let record = PostRecord {
            id: Uuid::new_v4(),
            author_id: post.author_id,
            text: post.text,
            group_id: post.group_id,
            image: post.image,
            created_at: inner.next_timestamp(),
        };
        let hydrated = inner.hydrate_post(&record)?;
        inner.posts.insert(record.id, record);

        Ok(hydrated)
    }

    async fn post_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        let inner = self.inner.read().await;
        inner
            .posts
            .get(&id)
            .map(|record| inner.hydrate_post(record))
            .transpose()
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<Option<Post>> {
        let mut inner = self.inner.write().await;
        if let Some(Some(group_id)) = changes.group_id {
            if !inner.groups.contains_key(&group_id) {
                return Err(anyhow!("unknown group: {}", group_id));
            }
        }

        let Some(record) = inner.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(text) = changes.text {
            record.text = text;
        }
        if let Some(group_id) = changes.group_id {
            record.group_id = group_id;
        }
        if let Some(image) = changes.image {
            record.image = image;
        }
        let record = record.clone();

        inner.hydrate_post(&record).map(Some)
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.posts.remove(&id).is_none() {
            return Ok(false);
        }
        inner.comments.retain(|_, comment| comment.post_id != id);
        Ok(true)
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner.matching_posts(filter).len() as i64)
    }

    async fn page_posts(
        &self,
        filter: &PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<PostWindow> {
        let inner = self.inner.read().await;
        let mut records = inner.matching_posts(filter);
        let total_count = records.len() as i64;
        records.sort_by_key(|record| Reverse((record.created_at, record.id)));

        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);

        let items = records
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|record| -> Result<PostSummary> {
                Ok(PostSummary {
                    post: inner.hydrate_post(record)?,
                    comments_count: inner.comments_count(record.id),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PostWindow { total_count, items })
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let mut inner = self.inner.write().await;
        if !inner.posts.contains_key(&comment.post_id) {
            return Err(anyhow!("unknown post: {}", comment.post_id));
        }
        if !inner.authors.contains_key(&comment.author_id) {
            return Err(anyhow!("unknown author: {}", comment.author_id));
        }

        let record = CommentRecord {
            id: Uuid::new_v4(),
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text,
            created_at: inner.next_timestamp(),
        };
        let hydrated = inner.hydrate_comment(&record)?;
        inner.comments.insert(record.id, record);

        Ok(hydrated)
    }

    async fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Comment>> {
        let inner = self.inner.read().await;
        let mut records: Vec<&CommentRecord> = inner
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .filter(|comment| match cursor {
                Some(cursor) => (comment.created_at, comment.id) < cursor,
                None => true,
            })
            .collect();
        records.sort_by_key(|record| Reverse((record.created_at, record.id)));

        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        records
            .into_iter()
            .take(limit)
            .map(|record| inner.hydrate_comment(record))
            .collect()
    }
}

#[async_trait]
impl FollowStore for MemoryStore {
    async fn insert_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        if follower_id == followed_id {
            return Ok(false);
        }
        let mut inner = self.inner.write().await;
        if inner.follows.contains_key(&(follower_id, followed_id)) {
            return Ok(false);
        }
        let created_at = inner.next_timestamp();
        inner.follows.insert((follower_id, followed_id), created_at);
        Ok(true)
    }

    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.follows.remove(&(follower_id, followed_id)).is_some())
    }

    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let inner = self.inner.read().await;
        Ok(inner.follows.contains_key(&(follower_id, followed_id)))
    }

    async fn list_followed(&self, follower_id: Uuid) -> Result<Vec<Follow>> {
        let inner = self.inner.read().await;
        let mut follows: Vec<Follow> = inner
            .follows
            .range((follower_id, Uuid::from_u128(0))..=(follower_id, Uuid::from_u128(u128::MAX)))
            .map(|(&(follower_id, followed_id), &created_at)| Follow {
                follower_id,
                followed_id,
                created_at,
            })
            .collect();
        follows.sort_by_key(|follow| Reverse((follow.created_at, follow.followed_id)));
        Ok(follows)
    }

    async fn list_follower_ids(&self, followed_id: Uuid) -> Result<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .follows
            .keys()
            .filter(|(_, followed)| *followed == followed_id)
            .map(|(follower, _)| *follower)
            .collect())
    }

    async fn count_followers(&self, followed_id: Uuid) -> Result<i64> {
        Ok(self.list_follower_ids(followed_id).await?.len() as i64)
    }

    async fn count_following(&self, follower_id: Uuid) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .follows
            .range((follower_id, Uuid::from_u128(0))..=(follower_id, Uuid::from_u128(u128::MAX)))
            .count() as i64)
    }
}
