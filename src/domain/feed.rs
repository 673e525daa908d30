use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::post::PostSummary;

/// The filter context a feed is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum FeedScope {
    Global,
    Author(Uuid),
    Group(Uuid),
    /// Posts of every author the given user follows
    Following(Uuid),
}

impl FeedScope {
    /// Stable tag used in cache keys. Every tag is prefix-free with respect
    /// to the others so a scope's entries can be matched by prefix.
    pub fn tag(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Author(id) => format!("author:{}", id),
            Self::Group(id) => format!("group:{}", id),
            Self::Following(id) => format!("following:{}", id),
        }
    }
}

impl fmt::Display for FeedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedPage {
    pub scope: FeedScope,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub num_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub items: Vec<PostSummary>,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

impl FeedPage {
    pub fn new(
        scope: FeedScope,
        page: u32,
        page_size: u32,
        total_count: i64,
        items: Vec<PostSummary>,
    ) -> Self {
        let num_pages = num_pages(total_count, page_size);
        Self {
            scope,
            page,
            page_size,
            total_count,
            num_pages,
            has_next: page < num_pages,
            has_previous: page > 1,
            items,
            generated_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Number of pages needed for `total_count` items. An empty listing still
/// has one (empty) page.
pub fn num_pages(total_count: i64, page_size: u32) -> u32 {
    if total_count <= 0 || page_size == 0 {
        return 1;
    }
    let size = i64::from(page_size);
    let pages = (total_count + size - 1) / size;
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Zero-based offset of the first item of a one-based page.
pub fn page_offset(page: u32, page_size: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_pages_rounds_up() {
        assert_eq!(num_pages(25, 10), 3);
        assert_eq!(num_pages(30, 10), 3);
        assert_eq!(num_pages(31, 10), 4);
        assert_eq!(num_pages(1, 10), 1);
    }

    #[test]
    fn empty_listing_has_one_page() {
        assert_eq!(num_pages(0, 10), 1);
        let page = FeedPage::new(FeedScope::Global, 1, 10, 0, Vec::new());
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn page_offsets_are_contiguous() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(2, 10), 10);
        assert_eq!(page_offset(4, 10), 30);
    }

    #[test]
    fn scope_tags_are_distinct() {
        let id = Uuid::new_v4();
        let tags = [
            FeedScope::Global.tag(),
            FeedScope::Author(id).tag(),
            FeedScope::Group(id).tag(),
            FeedScope::Following(id).tag(),
        ];
        for (i, a) in tags.iter().enumerate() {
            for b in tags.iter().skip(i + 1) {
                assert!(!a.starts_with(b.as_str()) && !b.starts_with(a.as_str()));
            }
        }
    }
}
