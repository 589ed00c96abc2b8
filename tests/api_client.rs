//! End-to-end tests for the API client against a mocked TT-RSS server.
//!
//! Each test starts its own `wiremock` server, so the full path is exercised:
//! JSON request encoding, envelope decoding, error classification, session
//! re-establishment and response caching.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{json, Value};
use ttrss_core::api::{
    ApiClient, ApiError, CacheKey, Credentials, FeedUpdate, HeadlineSource, SessionState,
    SubscribeOutcome, TtrssRemote,
};
use url::Url;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok(content: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"seq": 0, "status": 0, "content": content}))
}

fn api_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({"seq": 0, "status": 1, "content": {"error": code}}))
}

fn client_for(server: &MockServer, capacity: usize) -> ApiClient {
    let url = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let credentials = Credentials::new(
        url.clone(),
        "alice",
        SecretString::from("pw".to_string()),
    );
    ApiClient::new(TtrssRemote::new(url).unwrap(), credentials, capacity).unwrap()
}

async fn mount_login(server: &MockServer, sid: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "login"})))
        .respond_with(ok(json!({"session_id": sid, "api_level": 18})))
        .mount(server)
        .await;
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_sends_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(
            json!({"op": "login", "user": "alice", "password": "pw"}),
        ))
        .respond_with(ok(json!({"session_id": "s1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    client.login().await.unwrap();
    assert_eq!(client.session_state().await, SessionState::Authenticated);
}

#[tokio::test]
async fn test_rejected_login_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "login"})))
        .respond_with(api_error("LOGIN_ERROR"))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let err = client.login().await.unwrap_err();

    assert!(err.is_auth_failure());
    assert_eq!(client.session_state().await, SessionState::LoginFailed);

    // Guarded calls fail fast until an explicit login succeeds
    let err = client.list_categories(false).await.unwrap_err();
    assert!(err.is_auth_failure());
}

// ============================================================================
// Listings and caching
// ============================================================================

#[tokio::test]
async fn test_categories_decoded_and_cached() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(
            json!({"op": "getCategories", "sid": "s1", "unread_only": true}),
        ))
        .respond_with(ok(json!([
            {"id": "2", "title": "News", "unread": 5, "order_id": 0},
            {"id": -1, "title": "Special", "unread": 1}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let first = client.list_categories(false).await.unwrap();
    let second = client.list_categories(false).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].id, 2);
    assert_eq!(first[0].title, "News");
    assert_eq!(first[0].unread, 5);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_identical_headline_requests_hit_server_once() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "op": "getHeadlines",
            "feed_id": 5,
            "is_cat": false,
            "view_mode": "unread",
            "limit": 20,
            "skip": 0
        })))
        .respond_with(ok(json!([
            {"id": 42, "title": "First &amp; best", "unread": true, "marked": false,
             "feed_id": "5", "feed_title": "Example", "updated": 1704067200},
            {"id": 43, "title": "Second", "unread": false, "marked": true, "feed_id": 5}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let first = client
        .list_articles(HeadlineSource::Feed(5), false, 20, 0)
        .await
        .unwrap();
    let second = client
        .list_articles(HeadlineSource::Feed(5), false, 20, 0)
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first[0].feed_id, Some(5));
    assert!(first[1].marked);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_set_read_forces_fresh_listing() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getHeadlines", "feed_id": 5})))
        .respond_with(ok(json!([{"id": 42, "title": "Only", "unread": true}])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "op": "updateArticle",
            "article_ids": "42",
            "field": 2,
            "mode": 0
        })))
        .respond_with(ok(json!({"status": "OK", "updated": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    client
        .list_articles(HeadlineSource::Feed(5), false, 20, 0)
        .await
        .unwrap();
    client.set_read(42, true).await.unwrap();
    client
        .list_articles(HeadlineSource::Feed(5), false, 20, 0)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_starred_refreshes_starred_feed_count() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getFeeds", "cat_id": -1})))
        .respond_with(ok(json!([{"id": -1, "title": "Starred articles", "unread": 0}])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getFeeds", "cat_id": -1})))
        .respond_with(ok(json!([{"id": -1, "title": "Starred articles", "unread": 1}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "op": "updateArticle",
            "article_ids": "42",
            "field": 0,
            "mode": 1
        })))
        .respond_with(ok(json!({"status": "OK", "updated": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let before = client.list_feeds(-1, false).await.unwrap();
    client.set_starred(42, true).await.unwrap();
    let after = client.list_feeds(-1, false).await.unwrap();

    assert_eq!(before[0].unread, 0);
    assert_eq!(after[0].unread, 1);
}

#[tokio::test]
async fn test_category_headlines_use_is_cat() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "op": "getHeadlines",
            "feed_id": 3,
            "is_cat": true,
            "view_mode": "all_articles",
            "skip": 40
        })))
        .respond_with(ok(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let page = client
        .list_articles(HeadlineSource::Category(3), true, 20, 40)
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn test_get_article_and_not_found() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getArticle", "article_id": "42"})))
        .respond_with(ok(json!([{
            "id": "42",
            "title": "Full story",
            "link": "https://example.com/story",
            "content": "<p>Hello</p>",
            "unread": true,
            "feed_id": "5"
        }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getArticle", "article_id": "99"})))
        .respond_with(ok(json!([])))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let article = client.get_article(42).await.unwrap();
    assert_eq!(article.content, "<p>Hello</p>");
    assert_eq!(article.link, "https://example.com/story");
    client.get_article(42).await.unwrap();

    let err = client.get_article(99).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert!(!client.is_cached(&CacheKey::Article(99)).await);
}

// ============================================================================
// Session expiry
// ============================================================================

#[tokio::test]
async fn test_expired_session_relogs_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "login"})))
        .respond_with(ok(json!({"session_id": "old"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "login"})))
        .respond_with(ok(json!({"session_id": "new"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getFeeds", "sid": "old"})))
        .respond_with(api_error("NOT_LOGGED_IN"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getFeeds", "sid": "new", "cat_id": 4})))
        .respond_with(ok(json!([{"id": 7, "title": "Blog", "unread": 2, "cat_id": 4}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    client.login().await.unwrap();
    let feeds = client.list_feeds(4, false).await.unwrap();

    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].cat_id, Some(4));
    assert_eq!(client.session_state().await, SessionState::Authenticated);
}

#[tokio::test]
async fn test_persistent_expiry_stops_after_one_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "login"})))
        .respond_with(ok(json!({"session_id": "s"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getCategories"})))
        .respond_with(api_error("NOT_LOGGED_IN"))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    client.login().await.unwrap();
    let err = client.list_categories(true).await.unwrap_err();

    assert!(err.is_auth_failure());
    assert_eq!(client.cached_entries().await, 0);
}

// ============================================================================
// Transport and decoding failures
// ============================================================================

#[tokio::test]
async fn test_http_error_is_retryable_transport_error() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getCategories"})))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let err = client.list_categories(false).await.unwrap_err();

    assert!(matches!(err, ApiError::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let url = Url::parse("http://127.0.0.1:9/api/").unwrap();
    let credentials = Credentials::new(url.clone(), "alice", SecretString::from("pw".to_string()));
    let client = ApiClient::new(TtrssRemote::new(url).unwrap(), credentials, 4).unwrap();

    let err = client.login().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(client.session_state().await, SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_malformed_response_not_cached() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getFeeds"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    for _ in 0..2 {
        let err = client.list_feeds(1, false).await.unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse(_)));
    }
    assert_eq!(client.cached_entries().await, 0);
}

#[tokio::test]
async fn test_wrong_content_shape_is_malformed() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getCategories"})))
        .respond_with(ok(json!({"unexpected": "object"})))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let err = client.list_categories(false).await.unwrap_err();
    assert!(matches!(err, ApiError::MalformedResponse(_)));
}

// ============================================================================
// Feed management
// ============================================================================

#[tokio::test]
async fn test_subscribe_outcomes() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "op": "subscribeToFeed",
            "feed_url": "https://example.com/feed.xml"
        })))
        .respond_with(ok(json!({"status": {"code": 1}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "op": "subscribeToFeed",
            "feed_url": "https://example.com/broken"
        })))
        .respond_with(ok(json!({"status": {"code": 5, "message": "download failed"}})))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    assert_eq!(
        client.subscribe("https://example.com/feed.xml", 0).await.unwrap(),
        SubscribeOutcome::Subscribed
    );
    assert_eq!(
        client.subscribe("https://example.com/broken", 0).await.unwrap(),
        SubscribeOutcome::Rejected {
            code: 5,
            message: Some("download failed".to_string())
        }
    );
}

#[tokio::test]
async fn test_unsubscribe_unknown_feed_is_not_found() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "unsubscribeFeed", "feed_id": 77})))
        .respond_with(api_error("FEED_NOT_FOUND"))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let err = client.unsubscribe(77).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_catchup_invalidates_categories() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getCategories"})))
        .respond_with(ok(json!([{"id": 1, "title": "A", "unread": 3}])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "catchupFeed", "feed_id": 1, "is_cat": true})))
        .respond_with(ok(json!({"status": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    client.list_categories(false).await.unwrap();
    client.mark_all_read(HeadlineSource::Category(1)).await.unwrap();
    client.list_categories(false).await.unwrap();
}

#[tokio::test]
async fn test_feed_properties_lookup_and_update() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getFeeds", "cat_id": -4})))
        .respond_with(ok(json!([
            {"id": -1, "title": "Starred articles", "unread": 0},
            {"id": "12", "title": "Example blog", "feed_url": "https://example.com/feed.xml",
             "cat_id": "3", "unread": 4}
        ])))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "op": "updateFeedProperties",
            "feed_id": 12,
            "title": "Renamed blog"
        })))
        .respond_with(ok(json!({"status": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let feed = client.get_feed_properties(12).await.unwrap();
    assert_eq!(feed.title, "Example blog");
    assert_eq!(feed.feed_url.as_deref(), Some("https://example.com/feed.xml"));
    assert_eq!(feed.cat_id, Some(3));
    client.get_feed_properties(12).await.unwrap();

    let update = FeedUpdate {
        title: Some("Renamed blog".to_string()),
        category_id: None,
    };
    client.update_feed_properties(12, &update).await.unwrap();
    assert!(!client.is_cached(&CacheKey::FeedProperties(12)).await);

    client.get_feed_properties(12).await.unwrap();
}

#[tokio::test]
async fn test_feed_properties_unknown_feed_is_not_found() {
    let server = MockServer::start().await;
    mount_login(&server, "s1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"op": "getFeeds", "cat_id": -4})))
        .respond_with(ok(json!([{"id": 12, "title": "Example blog"}])))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let err = client.get_feed_properties(99).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}
