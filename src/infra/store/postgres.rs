use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::group::{Group, NewGroup};
use crate::domain::post::{NewPost, Post, PostChanges, PostFilter, PostSummary};
use crate::domain::social_graph::Follow;
use crate::domain::user::{Author, NewAuthor};
use crate::infra::db::Db;
use crate::infra::store::{ContentStore, Cursor, FollowStore, PostWindow};

const POST_COLUMNS: &str = "p.id, p.author_id, u.username AS author_username, p.text, \
     p.group_id, g.slug AS group_slug, p.image, p.created_at";

const POST_JOINS: &str = "FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

fn author_from_row(row: &PgRow) -> Author {
    Author {
        id: row.get("id"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

fn group_from_row(row: &PgRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        text: row.get("text"),
        group_id: row.get("group_id"),
        group_slug: row.get("group_slug"),
        image: row.get("image"),
        created_at: row.get("created_at"),
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        author_username: row.get("author_username"),
        text: row.get("text"),
        created_at: row.get("created_at"),
    }
}

async fn count_matching(conn: &mut PgConnection, filter: &PostFilter) -> Result<i64> {
    let count: i64 = match filter {
        PostFilter::All => {
            sqlx::query_scalar("SELECT COUNT(*) FROM posts")
                .fetch_one(&mut *conn)
                .await?
        }
        PostFilter::Author(author_id) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
                .bind(*author_id)
                .fetch_one(&mut *conn)
                .await?
        }
        PostFilter::Group(group_id) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE group_id = $1")
                .bind(*group_id)
                .fetch_one(&mut *conn)
                .await?
        }
        PostFilter::Authors(author_ids) => {
            if author_ids.is_empty() {
                return Ok(0);
            }
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ANY($1)")
                .bind(author_ids.as_slice())
                .fetch_one(&mut *conn)
                .await?
        }
    };

    Ok(count)
}

async fn list_matching(
    conn: &mut PgConnection,
    filter: &PostFilter,
    offset: i64,
    limit: i64,
) -> Result<Vec<PostSummary>> {
    let select = format!(
        "SELECT {}, \
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count \
         {}",
        POST_COLUMNS, POST_JOINS
    );
    const ORDER: &str = "ORDER BY p.created_at DESC, p.id DESC";

    let rows = match filter {
        PostFilter::All => {
            let sql = format!("{} {} LIMIT $1 OFFSET $2", select, ORDER);
            sqlx::query(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *conn)
                .await?
        }
        PostFilter::Author(author_id) => {
            let sql = format!(
                "{} WHERE p.author_id = $1 {} LIMIT $2 OFFSET $3",
                select, ORDER
            );
            sqlx::query(&sql)
                .bind(*author_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *conn)
                .await?
        }
        PostFilter::Group(group_id) => {
            let sql = format!(
                "{} WHERE p.group_id = $1 {} LIMIT $2 OFFSET $3",
                select, ORDER
            );
            sqlx::query(&sql)
                .bind(*group_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *conn)
                .await?
        }
        PostFilter::Authors(author_ids) => {
            if author_ids.is_empty() {
                return Ok(Vec::new());
            }
            let sql = format!(
                "{} WHERE p.author_id = ANY($1) {} LIMIT $2 OFFSET $3",
                select, ORDER
            );
            sqlx::query(&sql)
                .bind(author_ids.as_slice())
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *conn)
                .await?
        }
    };

    Ok(rows
        .iter()
        .map(|row| PostSummary {
            post: post_from_row(row),
            comments_count: row.get("comments_count"),
        })
        .collect())
}

#[async_trait]
impl ContentStore for PgStore {
    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }

    async fn insert_author(&self, author: NewAuthor) -> Result<Author> {
        let row = sqlx::query(
            "INSERT INTO users (username, display_name) VALUES ($1, $2) \
             RETURNING id, username, display_name, created_at",
        )
        .bind(author.username)
        .bind(author.display_name)
        .fetch_one(self.db.pool())
        .await?;

        Ok(author_from_row(&row))
    }

    async fn author_by_id(&self, id: Uuid) -> Result<Option<Author>> {
        let row = sqlx::query(
            "SELECT id, username, display_name, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(author_from_row))
    }

    async fn author_by_username(&self, username: &str) -> Result<Option<Author>> {
        let row = sqlx::query(
            "SELECT id, username, display_name, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(author_from_row))
    }

    async fn insert_group(&self, group: NewGroup) -> Result<Option<Group>> {
        let row = sqlx::query(
            "INSERT INTO groups (title, slug, description) VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO NOTHING \
             RETURNING id, title, slug, description",
        )
        .bind(group.title)
        .bind(group.slug)
        .bind(group.description)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    async fn group_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    async fn group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let row = sqlx::query(
            "WITH inserted_post AS ( \
                INSERT INTO posts (author_id, text, group_id, image) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, author_id, text, group_id, image, created_at \
             ) \
             SELECT p.*, u.username AS author_username, g.slug AS group_slug \
             FROM inserted_post p \
             JOIN users u ON u.id = p.author_id \
             LEFT JOIN groups g ON g.id = p.group_id",
        )
        .bind(post.author_id)
        .bind(post.text)
        .bind(post.group_id)
        .bind(post.image)
        .fetch_one(self.db.pool())
        .await?;

        Ok(post_from_row(&row))
    }

    async fn post_by_id(&self, id: Uuid) -> Result<Option<Post>> {
        let sql = format!("SELECT {} {} WHERE p.id = $1", POST_COLUMNS, POST_JOINS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn update_post(&self, id: Uuid, changes: PostChanges) -> Result<Option<Post>> {
        let (set_group, group_id) = match changes.group_id {
            Some(group_id) => (true, group_id),
            None => (false, None),
        };
        let (set_image, image) = match changes.image {
            Some(image) => (true, image),
            None => (false, None),
        };

        let updated: Option<Uuid> = sqlx::query_scalar(
            "UPDATE posts \
             SET text = COALESCE($2, text), \
                 group_id = CASE WHEN $3 THEN $4 ELSE group_id END, \
                 image = CASE WHEN $5 THEN $6 ELSE image END \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(changes.text)
        .bind(set_group)
        .bind(group_id)
        .bind(set_image)
        .bind(image)
        .fetch_optional(self.db.pool())
        .await?;

        match updated {
            Some(id) => self.post_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn delete_post(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<i64> {
        let mut conn = self.db.pool().acquire().await?;
        count_matching(&mut conn, filter).await
    }

    async fn page_posts(
        &self,
        filter: &PostFilter,
        offset: i64,
        limit: i64,
    ) -> Result<PostWindow> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let total_count = count_matching(&mut tx, filter).await?;
        let items = if offset >= total_count {
            Vec::new()
        } else {
            list_matching(&mut tx, filter, offset, limit).await?
        };

        tx.commit().await?;

        Ok(PostWindow { total_count, items })
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let row = sqlx::query(
            "WITH inserted_comment AS ( \
                INSERT INTO comments (post_id, author_id, text) VALUES ($1, $2, $3) \
                RETURNING id, post_id, author_id, text, created_at \
             ) \
             SELECT c.*, u.username AS author_username \
             FROM inserted_comment c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(comment.text)
        .fetch_one(self.db.pool())
        .await?;

        Ok(comment_from_row(&row))
    }

    async fn list_comments(
        &self,
        post_id: Uuid,
        cursor: Option<Cursor>,
        limit: i64,
    ) -> Result<Vec<Comment>> {
        let rows = match cursor {
            Some((created_at, comment_id)) => {
                sqlx::query(
                    "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                            c.text, c.created_at \
                     FROM comments c \
                     JOIN users u ON u.id = c.author_id \
                     WHERE c.post_id = $1 \
                       AND (c.created_at < $2 OR (c.created_at = $2 AND c.id < $3)) \
                     ORDER BY c.created_at DESC, c.id DESC \
                     LIMIT $4",
                )
                .bind(post_id)
                .bind(created_at)
                .bind(comment_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, \
                            c.text, c.created_at \
                     FROM comments c \
                     JOIN users u ON u.id = c.author_id \
                     WHERE c.post_id = $1 \
                     ORDER BY c.created_at DESC, c.id DESC \
                     LIMIT $2",
                )
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(comment_from_row).collect())
    }
}

#[async_trait]
impl FollowStore for PgStore {
    async fn insert_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followed_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followed_id = $2",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND followed_id = $2)",
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }

    async fn list_followed(&self, follower_id: Uuid) -> Result<Vec<Follow>> {
        let rows = sqlx::query(
            "SELECT follower_id, followed_id, created_at \
             FROM follows \
             WHERE follower_id = $1 \
             ORDER BY created_at DESC, followed_id DESC",
        )
        .bind(follower_id)
        .fetch_all(self.db.pool())
        .await?;

        let follows = rows
            .iter()
            .map(|row| Follow {
                follower_id: row.get("follower_id"),
                followed_id: row.get("followed_id"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(follows)
    }

    async fn list_follower_ids(&self, followed_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT follower_id FROM follows WHERE followed_id = $1")
                .bind(followed_id)
                .fetch_all(self.db.pool())
                .await?;

        Ok(ids)
    }

    async fn count_followers(&self, followed_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followed_id = $1")
            .bind(followed_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    async fn count_following(&self, follower_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(follower_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }
}
