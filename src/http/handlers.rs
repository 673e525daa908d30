use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::posts::PostEdit;
use crate::domain::comment::Comment;
use crate::domain::feed::{FeedPage, FeedScope};
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::domain::user::{Author, Profile};
use crate::http::{AdminToken, AppError, AuthUser, MaybeAuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PaginationQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Deserialize)]
pub struct FeedQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

/// Distinguishes an absent field from an explicit `null` in PATCH bodies.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn feed_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", hex::encode(digest))
}

fn etag_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|candidate| candidate.trim())
        .any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
}

/// Serializes a feed page with an `ETag`, answering 304 when the client
/// already holds the same bytes.
fn feed_response(headers: &HeaderMap, page: &FeedPage) -> Result<Response, AppError> {
    let body = serde_json::to_vec(page).map_err(|err| {
        tracing::error!(error = ?err, scope = %page.scope, "failed to serialize feed page");
        AppError::internal("failed to render feed")
    })?;
    let etag = feed_etag(&body);
    let etag_value =
        HeaderValue::from_str(&etag).map_err(|_| AppError::internal("failed to render feed"))?;

    if etag_matches(headers, &etag) {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag_value)]).into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (header::ETAG, etag_value),
        ],
        body,
    )
        .into_response())
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store.ping().await.is_ok();
    let cache = state.cache.ping().await.is_ok();
    let status = if store && cache { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn global_feed(
    auth: MaybeAuthUser,
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    let page = state
        .feed_service()
        .get_page(auth.user_id(), FeedScope::Global, query.page, query.page_size)
        .await?;
    feed_response(&headers, &page)
}

pub async fn following_feed(
    auth: AuthUser,
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    let page = state
        .feed_service()
        .get_page(
            Some(auth.user_id),
            FeedScope::Following(auth.user_id),
            query.page,
            query.page_size,
        )
        .await?;
    feed_response(&headers, &page)
}

pub async fn get_group(
    Path(slug): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Group>, AppError> {
    let group = state.group_service().get_by_slug(&slug).await?;
    Ok(Json(group))
}

pub async fn group_feed(
    Path(slug): Path<String>,
    auth: MaybeAuthUser,
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    let group = state.group_service().get_by_slug(&slug).await?;
    let page = state
        .feed_service()
        .get_page(
            auth.user_id(),
            FeedScope::Group(group.id),
            query.page,
            query.page_size,
        )
        .await?;
    feed_response(&headers, &page)
}

pub async fn get_profile(
    Path(username): Path<String>,
    auth: MaybeAuthUser,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    let profile = state
        .user_service()
        .profile(&username, auth.user_id())
        .await?;
    Ok(Json(profile))
}

pub async fn profile_feed(
    Path(username): Path<String>,
    auth: MaybeAuthUser,
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    let author = state.user_service().get_by_username(&username).await?;
    let page = state
        .feed_service()
        .get_page(
            auth.user_id(),
            FeedScope::Author(author.id),
            query.page,
            query.page_size,
        )
        .await?;
    feed_response(&headers, &page)
}

#[derive(Serialize)]
pub struct FollowedAuthorItem {
    #[serde(flatten)]
    pub author: Author,
    #[serde(with = "time::serde::rfc3339")]
    pub followed_at: OffsetDateTime,
}

#[derive(Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

pub async fn list_following(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ItemsResponse<FollowedAuthorItem>>, AppError> {
    let author = state.user_service().get_by_username(&username).await?;
    let followed = state
        .subscriptions()
        .list_followed_authors(author.id)
        .await?;

    let items = followed
        .into_iter()
        .map(|(author, follow)| FollowedAuthorItem {
            author,
            followed_at: follow.created_at,
        })
        .collect();
    Ok(Json(ItemsResponse { items }))
}

pub async fn list_followers(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ItemsResponse<Uuid>>, AppError> {
    let author = state.user_service().get_by_username(&username).await?;
    let items = state.subscriptions().followers_of(author.id).await?;
    Ok(Json(ItemsResponse { items }))
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub followed: bool,
}

pub async fn follow_author(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    let author = state.user_service().get_by_username(&username).await?;
    state.subscriptions().add(auth.user_id, author.id).await?;
    Ok(Json(FollowResponse { followed: true }))
}

#[derive(Serialize)]
pub struct UnfollowResponse {
    pub unfollowed: bool,
}

pub async fn unfollow_author(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnfollowResponse>, AppError> {
    let author = state.user_service().get_by_username(&username).await?;
    let unfollowed = state.subscriptions().remove(auth.user_id, author.id).await?;
    Ok(Json(UnfollowResponse { unfollowed }))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<String>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let post = state
        .post_service()
        .create_post(auth.user_id, payload.text, payload.group, payload.image)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Post>, AppError> {
    let post = state.post_service().get_post(id).await?;
    Ok(Json(post))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub text: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub group: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub image: Option<Option<String>>,
}

pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let edit = PostEdit {
        text: payload.text,
        group_slug: payload.group,
        image: payload.image,
    };
    let post = state.post_service().edit_post(auth.user_id, id, edit).await?;
    Ok(Json(post))
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.post_service().delete_post(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

pub async fn comment_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = state
        .comment_service()
        .add_comment(auth.user_id, id, payload.text)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_post_comments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Comment>>, AppError> {
    let limit = query.limit.unwrap_or(30);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let cursor = parse_cursor(query.cursor)?;

    let mut comments = state
        .comment_service()
        .list_comments(id, cursor, limit + 1)
        .await?;

    let next_cursor = if comments.len() > limit as usize {
        comments.truncate(limit as usize);
        comments.last().map(|last| (last.created_at, last.id))
    } else {
        None
    };

    Ok(Json(ListResponse {
        items: comments,
        next_cursor: encode_cursor(next_cursor),
    }))
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    let group = state
        .group_service()
        .create_group(payload.title, payload.slug, payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn clear_feed_cache(
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.feed_service().clear_cache().await?;
    tracing::info!("feed cache cleared");
    Ok(StatusCode::NO_CONTENT)
}
