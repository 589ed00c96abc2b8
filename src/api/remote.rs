//! Black-box RPC surface of the TT-RSS server and its JSON-over-HTTP transport.
//!
//! Every call is a POST of `{"op": ..., "sid": ..., <params>}` to the API URL.
//! The server always answers with an envelope `{"seq", "status", "content"}`;
//! `status == 1` carries `content.error` with a symbolic error code.
use super::error::ApiError;
use super::types::{
    Article, ArticleField, ArticleId, Category, CategoryId, Credentials, Feed, FeedId,
    FeedUpdate, Headline, HeadlineSource, SessionId, SubscribeOutcome, UpdateMode,
};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::time::Duration;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024; // 16MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `getFeeds` pseudo-category listing every feed, virtual ones included.
const ALL_FEEDS_CATEGORY: CategoryId = -4;

/// Parameters of one headline listing. Also used verbatim as part of its cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlineQuery {
    pub source: HeadlineSource,
    pub include_read: bool,
    pub limit: u32,
    pub offset: u32,
}

/// The remote calls the API client is built on.
///
/// Implementations report an invalid session as [`ApiError::SessionExpired`] and
/// rejected credentials as [`ApiError::AuthenticationFailed`].
pub trait RemoteApi: Send + Sync {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<SessionId, ApiError>> + Send;

    fn get_categories(
        &self,
        sid: &SessionId,
        unread_only: bool,
    ) -> impl Future<Output = Result<Vec<Category>, ApiError>> + Send;

    fn get_feeds(
        &self,
        sid: &SessionId,
        category_id: CategoryId,
        unread_only: bool,
    ) -> impl Future<Output = Result<Vec<Feed>, ApiError>> + Send;

    fn get_headlines(
        &self,
        sid: &SessionId,
        query: &HeadlineQuery,
    ) -> impl Future<Output = Result<Vec<Headline>, ApiError>> + Send;

    fn get_article(
        &self,
        sid: &SessionId,
        article_id: ArticleId,
    ) -> impl Future<Output = Result<Article, ApiError>> + Send;

    fn update_article(
        &self,
        sid: &SessionId,
        article_id: ArticleId,
        field: ArticleField,
        mode: UpdateMode,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn catchup_feed(
        &self,
        sid: &SessionId,
        source: HeadlineSource,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn subscribe_to_feed(
        &self,
        sid: &SessionId,
        feed_url: &str,
        category_id: CategoryId,
    ) -> impl Future<Output = Result<SubscribeOutcome, ApiError>> + Send;

    fn unsubscribe_feed(
        &self,
        sid: &SessionId,
        feed_id: FeedId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Properties of one feed; [`ApiError::NotFound`] if it is not subscribed.
    fn get_feed_properties(
        &self,
        sid: &SessionId,
        feed_id: FeedId,
    ) -> impl Future<Output = Result<Feed, ApiError>> + Send;

    fn update_feed_properties(
        &self,
        sid: &SessionId,
        feed_id: FeedId,
        update: &FeedUpdate,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    content: Value,
}

#[derive(Deserialize)]
struct LoginContent {
    session_id: String,
    #[serde(default)]
    api_level: Option<i64>,
}

#[derive(Deserialize)]
struct SubscribeContent {
    status: SubscribeStatus,
}

#[derive(Deserialize)]
struct SubscribeStatus {
    code: i64,
    #[serde(default)]
    message: Option<String>,
}

/// Map a symbolic server error code onto the client's error taxonomy.
fn classify_error(code: &str) -> ApiError {
    match code {
        "NOT_LOGGED_IN" => ApiError::SessionExpired,
        "LOGIN_ERROR" | "API_DISABLED" => ApiError::AuthenticationFailed(code.to_string()),
        c if c.ends_with("NOT_FOUND") => ApiError::NotFound(code.to_string()),
        _ => ApiError::Api(code.to_string()),
    }
}

// ============================================================================
// TtrssRemote
// ============================================================================

/// `reqwest` implementation of [`RemoteApi`] for a TT-RSS `/api/` endpoint.
#[derive(Clone)]
pub struct TtrssRemote {
    http: reqwest::Client,
    endpoint: Url,
}

impl TtrssRemote {
    /// Remote for `endpoint` with the default 30 second request timeout.
    pub fn new(endpoint: Url) -> Result<Self, ApiError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Remote for `endpoint` whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the TLS backend cannot be initialised.
    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { http, endpoint })
    }

    /// The API URL every call is posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Issue one API call and decode `content` as `T`.
    async fn call<T: DeserializeOwned>(
        &self,
        op: &str,
        sid: Option<&SessionId>,
        params: Value,
    ) -> Result<T, ApiError> {
        let mut body = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.insert("op".into(), Value::from(op));
        if let Some(sid) = sid {
            body.insert("sid".into(), Value::from(sid.expose()));
        }

        tracing::trace!(op = op, "TT-RSS request");
        let response = self.http.post(self.endpoint.as_str()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(op = op, status = status.as_u16(), "TT-RSS HTTP error");
            return Err(ApiError::Transport(format!(
                "HTTP error: status {}",
                status.as_u16()
            )));
        }

        let bytes = read_limited(response, MAX_RESPONSE_SIZE).await?;
        let envelope: Envelope = serde_json::from_slice(&bytes)?;

        if envelope.status != 0 {
            let code = envelope
                .content
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN_ERROR");
            tracing::debug!(op = op, error = code, "TT-RSS API error");
            return Err(classify_error(code));
        }

        Ok(serde_json::from_value(envelope.content)?)
    }
}

impl std::fmt::Debug for TtrssRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtrssRemote")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl RemoteApi for TtrssRemote {
    async fn login(&self, credentials: &Credentials) -> Result<SessionId, ApiError> {
        use secrecy::ExposeSecret;

        let content: LoginContent = self
            .call(
                "login",
                None,
                json!({
                    "user": credentials.username,
                    "password": credentials.password.expose_secret(),
                }),
            )
            .await?;
        tracing::debug!(api_level = ?content.api_level, "Logged in to TT-RSS");
        Ok(SessionId::new(content.session_id))
    }

    async fn get_categories(
        &self,
        sid: &SessionId,
        unread_only: bool,
    ) -> Result<Vec<Category>, ApiError> {
        self.call(
            "getCategories",
            Some(sid),
            json!({ "unread_only": unread_only, "include_empty": !unread_only }),
        )
        .await
    }

    async fn get_feeds(
        &self,
        sid: &SessionId,
        category_id: CategoryId,
        unread_only: bool,
    ) -> Result<Vec<Feed>, ApiError> {
        self.call(
            "getFeeds",
            Some(sid),
            json!({ "cat_id": category_id, "unread_only": unread_only }),
        )
        .await
    }

    async fn get_headlines(
        &self,
        sid: &SessionId,
        query: &HeadlineQuery,
    ) -> Result<Vec<Headline>, ApiError> {
        let view_mode = if query.include_read {
            "all_articles"
        } else {
            "unread"
        };
        self.call(
            "getHeadlines",
            Some(sid),
            json!({
                "feed_id": query.source.id(),
                "is_cat": query.source.is_category(),
                "view_mode": view_mode,
                "limit": query.limit,
                "skip": query.offset,
                "show_excerpt": true,
            }),
        )
        .await
    }

    async fn get_article(
        &self,
        sid: &SessionId,
        article_id: ArticleId,
    ) -> Result<Article, ApiError> {
        let articles: Vec<Article> = self
            .call(
                "getArticle",
                Some(sid),
                json!({ "article_id": article_id.to_string() }),
            )
            .await?;
        articles
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("article {article_id}")))
    }

    async fn update_article(
        &self,
        sid: &SessionId,
        article_id: ArticleId,
        field: ArticleField,
        mode: UpdateMode,
    ) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .call(
                "updateArticle",
                Some(sid),
                json!({
                    "article_ids": article_id.to_string(),
                    "field": field as i64,
                    "mode": mode as i64,
                }),
            )
            .await?;
        Ok(())
    }

    async fn catchup_feed(&self, sid: &SessionId, source: HeadlineSource) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .call(
                "catchupFeed",
                Some(sid),
                json!({ "feed_id": source.id(), "is_cat": source.is_category() }),
            )
            .await?;
        Ok(())
    }

    async fn subscribe_to_feed(
        &self,
        sid: &SessionId,
        feed_url: &str,
        category_id: CategoryId,
    ) -> Result<SubscribeOutcome, ApiError> {
        let content: SubscribeContent = self
            .call(
                "subscribeToFeed",
                Some(sid),
                json!({ "feed_url": feed_url, "category_id": category_id }),
            )
            .await?;
        Ok(match content.status.code {
            0 => SubscribeOutcome::AlreadySubscribed,
            1 => SubscribeOutcome::Subscribed,
            code => SubscribeOutcome::Rejected {
                code,
                message: content.status.message,
            },
        })
    }

    async fn unsubscribe_feed(&self, sid: &SessionId, feed_id: FeedId) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .call("unsubscribeFeed", Some(sid), json!({ "feed_id": feed_id }))
            .await?;
        Ok(())
    }

    async fn get_feed_properties(
        &self,
        sid: &SessionId,
        feed_id: FeedId,
    ) -> Result<Feed, ApiError> {
        let params = json!({
            "cat_id": ALL_FEEDS_CATEGORY,
            "unread_only": false,
            "include_nested": true,
        });
        let feeds: Vec<Feed> = self.call("getFeeds", Some(sid), params).await?;
        feeds
            .into_iter()
            .find(|feed| feed.id == feed_id)
            .ok_or_else(|| ApiError::NotFound(format!("feed {feed_id}")))
    }

    async fn update_feed_properties(
        &self,
        sid: &SessionId,
        feed_id: FeedId,
        update: &FeedUpdate,
    ) -> Result<(), ApiError> {
        let mut params = Map::new();
        params.insert("feed_id".into(), Value::from(feed_id));
        if let Some(title) = &update.title {
            params.insert("title".into(), Value::from(title.as_str()));
        }
        if let Some(category_id) = update.category_id {
            params.insert("category_id".into(), Value::from(category_id));
        }
        let _: IgnoredAny = self
            .call("updateFeedProperties", Some(sid), Value::Object(params))
            .await?;
        Ok(())
    }
}

/// Read a response body, refusing anything larger than `limit` bytes.
async fn read_limited(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ApiError::MalformedResponse(format!(
                "response exceeds {limit} bytes"
            )));
        }
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::MalformedResponse(format!(
                "response exceeds {limit} bytes"
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
