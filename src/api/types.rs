use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use url::Url;

pub type CategoryId = i64;
pub type FeedId = i64;
pub type ArticleId = i64;

// ============================================================================
// Credentials and Session
// ============================================================================

/// Resolved login bundle for one TT-RSS account.
///
/// The password is never printed by `Debug`.
#[derive(Clone)]
pub struct Credentials {
    pub api_url: Url,
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(api_url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            api_url,
            username: username.into(),
            password,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_url", &self.api_url.as_str())
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Opaque session id handed out by the server's `login` call.
#[derive(Clone)]
pub struct SessionId(SecretString);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(SecretString::from(id.into()))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionId([REDACTED])")
    }
}

// ============================================================================
// Listing Sources
// ============================================================================

/// What a headline listing is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadlineSource {
    Feed(FeedId),
    Category(CategoryId),
}

impl HeadlineSource {
    /// Virtual feeds maintained by the server.
    pub const ARCHIVED: FeedId = 0;
    pub const STARRED: FeedId = -1;
    pub const PUBLISHED: FeedId = -2;
    pub const FRESH: FeedId = -3;
    pub const ALL_ARTICLES: FeedId = -4;
    pub const RECENTLY_READ: FeedId = -6;

    pub fn all_articles() -> Self {
        HeadlineSource::Feed(Self::ALL_ARTICLES)
    }

    pub fn starred() -> Self {
        HeadlineSource::Feed(Self::STARRED)
    }

    pub fn id(&self) -> i64 {
        match self {
            HeadlineSource::Feed(id) | HeadlineSource::Category(id) => *id,
        }
    }

    pub fn is_category(&self) -> bool {
        matches!(self, HeadlineSource::Category(_))
    }
}

/// Which field an article update touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleField {
    Starred = 0,
    Published = 1,
    Unread = 2,
}

/// How an article update changes the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Clear = 0,
    Set = 1,
    Toggle = 2,
}

impl From<bool> for UpdateMode {
    fn from(value: bool) -> Self {
        if value {
            UpdateMode::Set
        } else {
            UpdateMode::Clear
        }
    }
}

/// Outcome of a subscribe request, mirroring the server's status codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    AlreadySubscribed,
    Subscribed,
    Rejected { code: i64, message: Option<String> },
}

/// Feed properties to change; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedUpdate {
    pub title: Option<String>,
    pub category_id: Option<CategoryId>,
}

impl FeedUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.category_id.is_none()
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "flexible_id")]
    pub id: CategoryId,
    pub title: String,
    #[serde(default)]
    pub unread: i64,
    #[serde(default)]
    pub order_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feed {
    #[serde(deserialize_with = "flexible_id")]
    pub id: FeedId,
    pub title: String,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub unread: i64,
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub cat_id: Option<CategoryId>,
    #[serde(default)]
    pub has_icon: bool,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// One entry of an article listing (no body unless requested).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Headline {
    #[serde(deserialize_with = "flexible_id")]
    pub id: ArticleId,
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub marked: bool,
    #[serde(default)]
    pub published: bool,
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub feed_id: Option<FeedId>,
    #[serde(default)]
    pub feed_title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub updated: Option<DateTime<Utc>>,
}

/// A full article as returned by `getArticle`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Article {
    #[serde(deserialize_with = "flexible_id")]
    pub id: ArticleId,
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub marked: bool,
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub feed_id: Option<FeedId>,
    #[serde(default)]
    pub feed_title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub updated: Option<DateTime<Utc>>,
}

pub type Categories = Arc<Vec<Category>>;
pub type Feeds = Arc<Vec<Feed>>;
pub type Headlines = Arc<Vec<Headline>>;

// ============================================================================
// Id deserialization
// ============================================================================

// The server emits ids as JSON numbers in some calls and numeric strings in others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

impl RawId {
    fn into_id<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            RawId::Int(id) => Ok(id),
            RawId::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid id: {s:?}"))),
        }
    }
}

fn flexible_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    RawId::deserialize(deserializer)?.into_id()
}

fn flexible_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    match Option::<RawId>::deserialize(deserializer)? {
        Some(raw) => raw.into_id().map(Some),
        None => Ok(None),
    }
}
