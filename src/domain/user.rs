use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A user as seen by the content store. Accounts themselves are managed by
/// the identity provider; only what posts and follows need is kept here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAuthor {
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub posts_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    /// Whether the requesting viewer follows this author
    pub following: bool,
}

impl Profile {
    pub fn from_author(author: Author) -> Self {
        Self {
            id: author.id,
            username: author.username,
            display_name: author.display_name,
            created_at: author.created_at,
            posts_count: 0,
            followers_count: 0,
            following_count: 0,
            following: false,
        }
    }
}
