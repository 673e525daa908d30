use std::sync::Arc;
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::app::feed::FeedService;
use crate::domain::group::Group;
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::infra::store::ContentStore;

pub const MAX_IMAGE_KEY_LEN: usize = 255;

/// Requested edits to a post. Groups are addressed by slug.
#[derive(Debug, Clone, Default)]
pub struct PostEdit {
    pub text: Option<String>,
    pub group_slug: Option<Option<String>>,
    pub image: Option<Option<String>>,
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn ContentStore>,
    feed: FeedService,
}

impl PostService {
    pub fn new(store: Arc<dyn ContentStore>, feed: FeedService) -> Self {
        Self { store, feed }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        text: String,
        group_slug: Option<String>,
        image: Option<String>,
    ) -> ServiceResult<Post> {
        let text = validate_text(text)?;
        let image = validate_image(image)?;
        if self.store.author_by_id(author_id).await?.is_none() {
            return Err(ServiceError::not_found("user not found"));
        }
        let group = match group_slug.as_deref() {
            Some(slug) => Some(self.require_group(slug).await?),
            None => None,
        };

        let post = self
            .store
            .insert_post(NewPost {
                author_id,
                text,
                group_id: group.as_ref().map(|group| group.id),
                image,
            })
            .await?;

        let group_ids: Vec<Uuid> = post.group_id.into_iter().collect();
        self.feed.invalidate_post_scopes(post.author_id, &group_ids).await;
        tracing::info!(post_id = %post.id, author_id = %post.author_id, "post created");
        Ok(post)
    }

    pub async fn get_post(&self, post_id: Uuid) -> ServiceResult<Post> {
        self.store
            .post_by_id(post_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("post not found"))
    }

    pub async fn edit_post(
        &self,
        editor_id: Uuid,
        post_id: Uuid,
        edit: PostEdit,
    ) -> ServiceResult<Post> {
        let existing = self.get_post(post_id).await?;
        if existing.author_id != editor_id {
            return Err(ServiceError::forbidden("only the author can edit this post"));
        }

        let mut changes = PostChanges::default();
        if let Some(text) = edit.text {
            changes.text = Some(validate_text(text)?);
        }
        if let Some(image) = edit.image {
            changes.image = Some(validate_image(image)?);
        }
        match edit.group_slug {
            Some(Some(slug)) => changes.group_id = Some(Some(self.require_group(&slug).await?.id)),
            Some(None) => changes.group_id = Some(None),
            None => {}
        }

        let updated = self
            .store
            .update_post(post_id, changes)
            .await?
            .ok_or_else(|| ServiceError::not_found("post not found"))?;

        // Both the group it left and the one it joined show the post.
        let group_ids: Vec<Uuid> = existing
            .group_id
            .into_iter()
            .chain(updated.group_id)
            .collect();
        self.feed.invalidate_post_scopes(updated.author_id, &group_ids).await;
        tracing::info!(post_id = %post_id, "post edited");
        Ok(updated)
    }

    pub async fn delete_post(&self, requester_id: Uuid, post_id: Uuid) -> ServiceResult<()> {
        let existing = self.get_post(post_id).await?;
        if existing.author_id != requester_id {
            return Err(ServiceError::forbidden("only the author can delete this post"));
        }

        if !self.store.delete_post(post_id).await? {
            return Err(ServiceError::not_found("post not found"));
        }

        let group_ids: Vec<Uuid> = existing.group_id.into_iter().collect();
        self.feed.invalidate_post_scopes(existing.author_id, &group_ids).await;
        tracing::info!(post_id = %post_id, "post deleted");
        Ok(())
    }

    async fn require_group(&self, slug: &str) -> ServiceResult<Group> {
        self.store
            .group_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::not_found("group not found"))
    }
}

fn validate_text(text: String) -> ServiceResult<String> {
    if text.trim().is_empty() {
        return Err(ServiceError::invalid("post text must not be empty"));
    }
    Ok(text)
}

fn validate_image(image: Option<String>) -> ServiceResult<Option<String>> {
    match image {
        Some(key) if key.trim().is_empty() => Ok(None),
        Some(key) if key.len() > MAX_IMAGE_KEY_LEN => Err(ServiceError::invalid(format!(
            "image key must be at most {} characters",
            MAX_IMAGE_KEY_LEN
        ))),
        other => Ok(other),
    }
}
