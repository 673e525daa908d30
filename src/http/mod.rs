use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use error::AppError;
pub use auth::{AdminToken, AuthUser, MaybeAuthUser};

pub fn router(state: AppState) -> Router {
    let body_limit = state.request_body_limit_bytes;
    Router::new()
        .merge(routes::health())
        .merge(routes::feed())
        .merge(routes::groups())
        .merge(routes::profiles())
        .merge(routes::posts())
        .merge(routes::admin())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
