use axum::{routing::get, routing::post, Router};

use crate::AppState;
use crate::http::handlers;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn feed() -> Router<AppState> {
    Router::new()
        .route("/feed", get(handlers::global_feed))
        .route("/feed/following", get(handlers::following_feed))
}

pub fn groups() -> Router<AppState> {
    Router::new()
        .route("/groups/:slug", get(handlers::get_group))
        .route("/groups/:slug/posts", get(handlers::group_feed))
}

pub fn profiles() -> Router<AppState> {
    Router::new()
        .route("/profiles/:username", get(handlers::get_profile))
        .route("/profiles/:username/posts", get(handlers::profile_feed))
        .route("/profiles/:username/following", get(handlers::list_following))
        .route("/profiles/:username/followers", get(handlers::list_followers))
        .route("/profiles/:username/follow", post(handlers::follow_author))
        .route("/profiles/:username/unfollow", post(handlers::unfollow_author))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route(
            "/posts/:id",
            get(handlers::get_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route(
            "/posts/:id/comments",
            get(handlers::list_post_comments).post(handlers::comment_post),
        )
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/groups", post(handlers::create_group))
        .route("/admin/cache/clear", post(handlers::clear_feed_cache))
}
