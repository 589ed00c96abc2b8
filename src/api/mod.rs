//! TT-RSS API access: remote transport, session guard and the caching client.
//!
//! - `remote` - the black-box RPC trait and its `reqwest` implementation
//! - `session` - one-shot transparent re-authentication
//! - `client` - the façade that combines both with the bounded cache
//!
//! # Example
//!
//! ```ignore
//! use ttrss_core::api::{ApiClient, HeadlineSource};
//!
//! let client = ApiClient::connect(credentials, 500)?;
//! client.login().await?;
//! let categories = client.list_categories(false).await?;
//! let page = client.list_articles(HeadlineSource::all_articles(), false, 50, 0).await?;
//! ```

mod client;
mod error;
mod remote;
mod session;
mod types;

pub use client::{ApiClient, CacheKey, DEFAULT_CACHE_CAPACITY};
pub use error::ApiError;
pub use remote::{HeadlineQuery, RemoteApi, TtrssRemote};
pub use session::{SessionGuard, SessionState};
pub use types::{
    Article, ArticleField, ArticleId, Categories, Category, CategoryId, Credentials, Feed, FeedId,
    FeedUpdate, Feeds, Headline, HeadlineSource, Headlines, SessionId, SubscribeOutcome,
    UpdateMode,
};
