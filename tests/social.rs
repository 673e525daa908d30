//! Subscription Tests
//!
//! Covers follows, unfollows and profile counters.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

// ===========================================================================
// Follow
// ===========================================================================

#[tokio::test]
async fn follow_author() {
    let app = app().await;
    let alice = app.create_user("soc_follow_a").await;
    let bob = app.create_user("soc_follow_b").await;

    let resp = app
        .post_json("/profiles/soc_follow_b/follow", json!({}), alice.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["followed"], true);

    let followed = app.state.subscriptions().list(alice.id).await.unwrap();
    assert_eq!(followed, vec![bob.id]);
}

#[tokio::test]
async fn follow_requires_auth() {
    let app = app().await;
    app.create_user("soc_noauth_b").await;

    let resp = app
        .post_json("/profiles/soc_noauth_b/follow", json!({}), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn follow_self_is_rejected() {
    let app = app().await;
    let alice = app.create_user("soc_self").await;

    let resp = app
        .post_json("/profiles/soc_self/follow", json!({}), alice.token())
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error_message().contains("yourself"));

    let followed = app.state.subscriptions().list(alice.id).await.unwrap();
    assert!(followed.is_empty());
}

#[tokio::test]
async fn follow_twice_is_rejected_and_listed_once() {
    let app = app().await;
    let alice = app.create_user("soc_dup_a").await;
    let bob = app.create_user("soc_dup_b").await;

    let resp = app
        .post_json("/profiles/soc_dup_b/follow", json!({}), alice.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .post_json("/profiles/soc_dup_b/follow", json!({}), alice.token())
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.error_message().contains("already"));

    let followed = app.state.subscriptions().list(alice.id).await.unwrap();
    assert_eq!(followed, vec![bob.id]);
}

#[tokio::test]
async fn follow_unknown_author_is_not_found() {
    let app = app().await;
    let alice = app.create_user("soc_unknown_a").await;

    let resp = app
        .post_json("/profiles/ghost/follow", json!({}), alice.token())
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Unfollow
// ===========================================================================

#[tokio::test]
async fn unfollow_author() {
    let app = app().await;
    let alice = app.create_user("soc_unfollow_a").await;
    app.create_user("soc_unfollow_b").await;

    app.post_json("/profiles/soc_unfollow_b/follow", json!({}), alice.token())
        .await;

    let resp = app
        .post_json("/profiles/soc_unfollow_b/unfollow", json!({}), alice.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unfollowed"], true);

    let followed = app.state.subscriptions().list(alice.id).await.unwrap();
    assert!(followed.is_empty());
}

#[tokio::test]
async fn unfollow_when_not_following_is_a_noop() {
    let app = app().await;
    let alice = app.create_user("soc_noop_a").await;
    app.create_user("soc_noop_b").await;

    let resp = app
        .post_json("/profiles/soc_noop_b/unfollow", json!({}), alice.token())
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unfollowed"], false);
}

#[tokio::test]
async fn unfollow_unknown_author_is_not_found() {
    let app = app().await;
    let alice = app.create_user("soc_unfollow_ghost").await;

    let resp = app
        .post_json("/profiles/ghost/unfollow", json!({}), alice.token())
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Listings & profiles
// ===========================================================================

#[tokio::test]
async fn following_and_followers_listings() {
    let app = app().await;
    let alice = app.create_user("soc_list_a").await;
    app.create_user("soc_list_b").await;
    app.create_user("soc_list_c").await;

    app.post_json("/profiles/soc_list_b/follow", json!({}), alice.token())
        .await;
    app.post_json("/profiles/soc_list_c/follow", json!({}), alice.token())
        .await;

    let resp = app.get("/profiles/soc_list_a/following", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json()["items"].as_array().cloned().unwrap();
    let usernames: Vec<_> = items
        .iter()
        .map(|item| item["username"].as_str().unwrap().to_string())
        .collect();
    // Most recent follow first.
    assert_eq!(usernames, vec!["soc_list_c", "soc_list_b"]);
    assert!(items[0]["followed_at"].is_string());

    let resp = app.get("/profiles/soc_list_b/followers", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["items"], json!([alice.id.to_string()]));
}

#[tokio::test]
async fn profile_reports_counts_and_following_flag() {
    let app = app().await;
    let alice = app.create_user("soc_profile_a").await;
    let bob = app.create_user("soc_profile_b").await;

    app.publish(&bob, "hello", None).await;
    app.publish(&bob, "again", None).await;
    app.post_json("/profiles/soc_profile_b/follow", json!({}), alice.token())
        .await;

    let resp = app.get("/profiles/soc_profile_b", alice.token()).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["username"], "soc_profile_b");
    assert_eq!(body["posts_count"], 2);
    assert_eq!(body["followers_count"], 1);
    assert_eq!(body["following_count"], 0);
    assert_eq!(body["following"], true);

    let resp = app.get("/profiles/soc_profile_b", None).await;
    assert_eq!(resp.json()["following"], false);

    let resp = app.get("/profiles/soc_profile_a", bob.token()).await;
    let body = resp.json();
    assert_eq!(body["following_count"], 1);
    assert_eq!(body["following"], false);
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let app = app().await;

    let resp = app.get("/profiles/ghost", None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
