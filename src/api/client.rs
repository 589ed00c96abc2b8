//! The façade consumed by the UI: cached listings, guarded remote calls.
use super::error::ApiError;
use super::remote::{HeadlineQuery, RemoteApi, TtrssRemote};
use super::session::{SessionGuard, SessionState};
use super::types::{
    Article, ArticleField, ArticleId, Categories, CategoryId, Credentials, Feed, FeedId,
    FeedUpdate, Feeds, HeadlineSource, Headlines, SubscribeOutcome, UpdateMode,
};
use crate::cache::BoundedCache;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Identity of a cached response: the operation plus its argument tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Categories { include_read: bool },
    Feeds { category_id: CategoryId, include_read: bool },
    Headlines(HeadlineQuery),
    Article(ArticleId),
    FeedProperties(FeedId),
}

impl CacheKey {
    /// Collections whose counts or membership change with any mutation.
    fn is_listing(&self) -> bool {
        matches!(
            self,
            CacheKey::Categories { .. } | CacheKey::Feeds { .. } | CacheKey::Headlines(_)
        )
    }
}

#[derive(Debug, Clone)]
enum CachedValue {
    Categories(Categories),
    Feeds(Feeds),
    Headlines(Headlines),
    Article(Arc<Article>),
    FeedProperties(Arc<Feed>),
}

struct Inner<R> {
    remote: R,
    credentials: Credentials,
    guard: SessionGuard,
    cache: BoundedCache<CacheKey, CachedValue>,
}

impl<R> Inner<R> {
    fn parts(
        &mut self,
    ) -> (
        &R,
        &Credentials,
        &mut SessionGuard,
        &mut BoundedCache<CacheKey, CachedValue>,
    ) {
        (
            &self.remote,
            &self.credentials,
            &mut self.guard,
            &mut self.cache,
        )
    }

    /// Drop every cached listing, plus `record` when given.
    fn invalidate_listings(&mut self, record: Option<CacheKey>) {
        let removed = self.cache.invalidate_where(CacheKey::is_listing);
        if let Some(key) = record {
            self.cache.invalidate(&key);
        }
        tracing::debug!(removed = removed, "Invalidated cached listings");
    }
}

/// Session-aware, caching client for one TT-RSS account.
///
/// Cloning is cheap and every clone shares the same session and cache. All
/// operations are serialised: the lock is held from the cache lookup through
/// the remote call to the cache update, so concurrent callers never race a
/// stale write.
pub struct ApiClient<R: RemoteApi = TtrssRemote> {
    inner: Arc<Mutex<Inner<R>>>,
}

impl<R: RemoteApi> Clone for ApiClient<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ApiClient<TtrssRemote> {
    /// Client talking to the credentials' API URL over HTTP.
    pub fn connect(credentials: Credentials, cache_capacity: usize) -> Result<Self, ApiError> {
        let remote = TtrssRemote::new(credentials.api_url.clone())?;
        Self::new(remote, credentials, cache_capacity)
    }
}

impl<R: RemoteApi> ApiClient<R> {
    /// Build a client; no network traffic happens until the first call.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidCapacity` if `cache_capacity` is 0.
    pub fn new(
        remote: R,
        credentials: Credentials,
        cache_capacity: usize,
    ) -> Result<Self, ApiError> {
        let cache = BoundedCache::new(cache_capacity)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                remote,
                credentials,
                guard: SessionGuard::new(),
                cache,
            })),
        })
    }

    /// Authenticate now and keep the session. Leaves `LoginFailed` on success.
    pub async fn login(&self) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().await;
        let (remote, credentials, guard, _) = inner.parts();
        guard.login(move || remote.login(credentials)).await?;
        tracing::info!(user = %credentials.username, "Authenticated");
        Ok(())
    }

    /// Where the session currently stands.
    pub async fn session_state(&self) -> SessionState {
        self.inner.lock().await.guard.state()
    }

    /// All categories with their unread counts.
    ///
    /// With `include_read == false` the server omits categories without unread
    /// articles.
    pub async fn list_categories(&self, include_read: bool) -> Result<Categories, ApiError> {
        let key = CacheKey::Categories { include_read };
        let mut inner = self.inner.lock().await;
        if let Some(CachedValue::Categories(hit)) = inner.cache.get(&key) {
            return Ok(Arc::clone(hit));
        }

        tracing::debug!(include_read = include_read, "Fetching categories");
        let (remote, credentials, guard, cache) = inner.parts();
        let categories = guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move { remote.get_categories(&sid, !include_read).await },
            )
            .await?;
        let categories = Arc::new(categories);
        cache.put(key, CachedValue::Categories(Arc::clone(&categories)));
        Ok(categories)
    }

    /// Feeds in one category. Special category ids (-1, -2, ...) list virtual feeds.
    pub async fn list_feeds(
        &self,
        category_id: CategoryId,
        include_read: bool,
    ) -> Result<Feeds, ApiError> {
        let key = CacheKey::Feeds {
            category_id,
            include_read,
        };
        let mut inner = self.inner.lock().await;
        if let Some(CachedValue::Feeds(hit)) = inner.cache.get(&key) {
            return Ok(Arc::clone(hit));
        }

        tracing::debug!(
            category_id = category_id,
            include_read = include_read,
            "Fetching feeds"
        );
        let (remote, credentials, guard, cache) = inner.parts();
        let feeds = guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move {
                    remote.get_feeds(&sid, category_id, !include_read).await
                },
            )
            .await?;
        let feeds = Arc::new(feeds);
        cache.put(key, CachedValue::Feeds(Arc::clone(&feeds)));
        Ok(feeds)
    }

    /// One page of headlines. Every distinct page is cached on its own.
    pub async fn list_articles(
        &self,
        source: HeadlineSource,
        include_read: bool,
        limit: u32,
        offset: u32,
    ) -> Result<Headlines, ApiError> {
        let query = HeadlineQuery {
            source,
            include_read,
            limit,
            offset,
        };
        let key = CacheKey::Headlines(query);
        let mut inner = self.inner.lock().await;
        if let Some(CachedValue::Headlines(hit)) = inner.cache.get(&key) {
            return Ok(Arc::clone(hit));
        }

        tracing::debug!(
            source = ?source,
            include_read = include_read,
            limit = limit,
            offset = offset,
            "Fetching headlines"
        );
        let (remote, credentials, guard, cache) = inner.parts();
        let headlines = guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move { remote.get_headlines(&sid, &query).await },
            )
            .await?;
        let headlines = Arc::new(headlines);
        cache.put(key, CachedValue::Headlines(Arc::clone(&headlines)));
        Ok(headlines)
    }

    /// A single article including its content.
    pub async fn get_article(&self, article_id: ArticleId) -> Result<Arc<Article>, ApiError> {
        let key = CacheKey::Article(article_id);
        let mut inner = self.inner.lock().await;
        if let Some(CachedValue::Article(hit)) = inner.cache.get(&key) {
            return Ok(Arc::clone(hit));
        }

        tracing::debug!(article_id = article_id, "Fetching article");
        let (remote, credentials, guard, cache) = inner.parts();
        let article = guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move { remote.get_article(&sid, article_id).await },
            )
            .await?;
        let article = Arc::new(article);
        cache.put(key, CachedValue::Article(Arc::clone(&article)));
        Ok(article)
    }

    /// Title, URL and category of one subscribed feed.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` when the account has no feed with this id.
    pub async fn get_feed_properties(&self, feed_id: FeedId) -> Result<Arc<Feed>, ApiError> {
        let key = CacheKey::FeedProperties(feed_id);
        let mut inner = self.inner.lock().await;
        if let Some(CachedValue::FeedProperties(hit)) = inner.cache.get(&key) {
            return Ok(Arc::clone(hit));
        }

        tracing::debug!(feed_id = feed_id, "Fetching feed properties");
        let (remote, credentials, guard, cache) = inner.parts();
        let feed = guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move { remote.get_feed_properties(&sid, feed_id).await },
            )
            .await?;
        let feed = Arc::new(feed);
        cache.put(key, CachedValue::FeedProperties(Arc::clone(&feed)));
        Ok(feed)
    }

    /// Rename a feed or move it to another category.
    ///
    /// Drops the feed's cached properties and every cached listing. An empty
    /// update is a no-op and never reaches the server.
    pub async fn update_feed_properties(
        &self,
        feed_id: FeedId,
        update: &FeedUpdate,
    ) -> Result<(), ApiError> {
        if update.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock().await;
        let (remote, credentials, guard, _) = inner.parts();
        guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move {
                    remote.update_feed_properties(&sid, feed_id, update).await
                },
            )
            .await?;
        tracing::info!(feed_id = feed_id, update = ?update, "Feed properties updated");
        inner.invalidate_listings(Some(CacheKey::FeedProperties(feed_id)));
        Ok(())
    }

    /// Mark an article read or unread.
    ///
    /// Drops every cached listing (unread counts changed); the article's own
    /// cache entry is left for the next `get_article`.
    pub async fn set_read(&self, article_id: ArticleId, is_read: bool) -> Result<(), ApiError> {
        let mode = UpdateMode::from(!is_read);
        self.update_article(article_id, ArticleField::Unread, mode, false)
            .await
    }

    /// Star or unstar an article.
    ///
    /// Drops every cached listing: the starred virtual feed and the special
    /// category count starred articles too.
    pub async fn set_starred(
        &self,
        article_id: ArticleId,
        is_starred: bool,
    ) -> Result<(), ApiError> {
        let mode = UpdateMode::from(is_starred);
        self.update_article(article_id, ArticleField::Starred, mode, false)
            .await
    }

    /// Flip the read state on the server. The cached article is dropped too.
    pub async fn toggle_read(&self, article_id: ArticleId) -> Result<(), ApiError> {
        self.update_article(article_id, ArticleField::Unread, UpdateMode::Toggle, true)
            .await
    }

    /// Flip the starred state on the server. The cached article is dropped too.
    pub async fn toggle_starred(&self, article_id: ArticleId) -> Result<(), ApiError> {
        self.update_article(article_id, ArticleField::Starred, UpdateMode::Toggle, true)
            .await
    }

    /// Mark everything in a feed or category as read.
    pub async fn mark_all_read(&self, source: HeadlineSource) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().await;
        let (remote, credentials, guard, _) = inner.parts();
        guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move { remote.catchup_feed(&sid, source).await },
            )
            .await?;
        tracing::info!(source = ?source, "Marked all read");
        inner.invalidate_listings(None);
        Ok(())
    }

    /// Ask the server to subscribe to `feed_url` in `category_id` (0 = uncategorized).
    ///
    /// Listings are only dropped when the server reports a new subscription.
    pub async fn subscribe(
        &self,
        feed_url: &str,
        category_id: CategoryId,
    ) -> Result<SubscribeOutcome, ApiError> {
        let mut inner = self.inner.lock().await;
        let (remote, credentials, guard, _) = inner.parts();
        let outcome = guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move {
                    remote.subscribe_to_feed(&sid, feed_url, category_id).await
                },
            )
            .await?;
        tracing::info!(feed_url = %feed_url, outcome = ?outcome, "Subscribe request finished");
        if outcome == SubscribeOutcome::Subscribed {
            inner.invalidate_listings(None);
        }
        Ok(outcome)
    }

    /// Remove a subscription and every cached listing that could show it.
    pub async fn unsubscribe(&self, feed_id: FeedId) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().await;
        let (remote, credentials, guard, _) = inner.parts();
        guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move { remote.unsubscribe_feed(&sid, feed_id).await },
            )
            .await?;
        tracing::info!(feed_id = feed_id, "Unsubscribed");
        inner.invalidate_listings(Some(CacheKey::FeedProperties(feed_id)));
        Ok(())
    }

    /// Forget every cached response (explicit user refresh).
    pub async fn clear_cache(&self) {
        self.inner.lock().await.cache.clear();
        tracing::debug!("Response cache cleared");
    }

    /// Whether a response for `key` is currently cached.
    pub async fn is_cached(&self, key: &CacheKey) -> bool {
        self.inner.lock().await.cache.contains(key)
    }

    /// Number of cached responses.
    pub async fn cached_entries(&self) -> usize {
        self.inner.lock().await.cache.len()
    }

    async fn update_article(
        &self,
        article_id: ArticleId,
        field: ArticleField,
        mode: UpdateMode,
        drop_article: bool,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().await;
        let (remote, credentials, guard, _) = inner.parts();
        guard
            .execute(
                move || remote.login(credentials),
                move |sid| async move {
                    remote.update_article(&sid, article_id, field, mode).await
                },
            )
            .await?;
        tracing::debug!(
            article_id = article_id,
            field = ?field,
            mode = ?mode,
            "Article updated"
        );
        inner.invalidate_listings(drop_article.then_some(CacheKey::Article(article_id)));
        Ok(())
    }
}
