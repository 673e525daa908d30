use std::sync::Arc;
use uuid::Uuid;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::comment::{Comment, NewComment};
use crate::infra::store::{ContentStore, Cursor};

pub const MAX_COMMENT_LEN: usize = 1000;

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn ContentStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Feed pages only carry a comment count, so new comments surface there
    /// once the cached page expires.
    pub async fn add_comment(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        text: String,
    ) -> ServiceResult<Comment> {
        if text.trim().is_empty() {
            return Err(ServiceError::invalid("comment text must not be empty"));
        }
        if text.chars().count() > MAX_COMMENT_LEN {
            return Err(ServiceError::invalid(format!(
                "comment text exceeds {} characters",
                MAX_COMMENT_LEN
            )));
        }
        if self.store.author_by_id(author_id).await?.is_none() {
            return Err(ServiceError::not_found("user not found"));
        }
        if self.store.post_by_id(post_id).await?.is_none() {
            return Err(ServiceError::not_found("post not found"));
        }

        let comment = self
            .store
            .insert_comment(NewComment {
                post_id,
                author_id,
                text,
            })
            .await?;
        tracing::info!(comment_id = %comment.id, post_id = %post_id, "comment added");
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> ServiceResult<Vec<Comment>> {
        if self.store.post_by_id(post_id).await?.is_none() {
            return Err(ServiceError::not_found("post not found"));
        }
        Ok(self.store.list_comments(post_id, cursor, limit).await?)
    }
}
