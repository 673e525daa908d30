use std::sync::Arc;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::group::{is_valid_slug, Group, NewGroup, MAX_SLUG_LEN, MAX_TITLE_LEN};
use crate::infra::store::ContentStore;

#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn ContentStore>,
}

impl GroupService {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn create_group(
        &self,
        title: String,
        slug: String,
        description: String,
    ) -> ServiceResult<Group> {
        let title = title.trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(ServiceError::invalid(format!(
                "title must be between 1 and {} characters",
                MAX_TITLE_LEN
            )));
        }
        if !is_valid_slug(&slug) {
            return Err(ServiceError::invalid(format!(
                "slug must be 1 to {} letters, digits, hyphens or underscores",
                MAX_SLUG_LEN
            )));
        }

        let group = self
            .store
            .insert_group(NewGroup {
                title,
                slug,
                description,
            })
            .await?
            .ok_or_else(|| ServiceError::invalid("slug already in use"))?;
        tracing::info!(group_id = %group.id, slug = %group.slug, "group created");
        Ok(group)
    }

    pub async fn get_by_slug(&self, slug: &str) -> ServiceResult<Group> {
        self.store
            .group_by_slug(slug)
            .await?
            .ok_or_else(|| ServiceError::not_found("group not found"))
    }
}
