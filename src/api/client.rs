use super::error::ApiError;
use crate::model::{MutationAction, Notification, Page, Post, ResourceKind, UserCard};
use crate::paging::{Mutator, PageFetcher, PageRequest};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const MAX_RETRIES: u32 = 3;
const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB
/// Concurrent single-item requests when hydrating id lists.
const BATCH_CONCURRENCY: usize = 8;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// Session
// ============================================================================

/// Who the client acts as. Passed in explicitly; nothing reads ambient state.
#[derive(Clone)]
pub struct Session {
    pub user_id: String,
    token: Option<Arc<SecretString>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, token: Option<SecretString>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.map(Arc::new),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ============================================================================
// Wire Envelopes
// ============================================================================

#[derive(Debug, Deserialize)]
struct PostsEnvelope {
    #[serde(default)]
    posts: Vec<Post>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct UsersEnvelope<T> {
    #[serde(default = "Vec::new")]
    users: Vec<T>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct NotificationsEnvelope {
    #[serde(default)]
    notifs: Vec<Notification>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct LikeStatus {
    #[serde(rename = "isLiked", default)]
    is_liked: bool,
}

#[derive(Debug, Deserialize)]
struct FollowStatus {
    #[serde(rename = "isFollowing", default)]
    is_following: bool,
}

/// Which side of the follow graph to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Followers,
    Following,
}

impl Connection {
    fn segment(self) -> &'static str {
        match self {
            Connection::Followers => "followers",
            Connection::Following => "following",
        }
    }
}

// ============================================================================
// Client
// ============================================================================

struct Inner {
    http: reqwest::Client,
    base: Url,
    session: Session,
    timeout: Duration,
    max_retries: u32,
    /// First backoff step; doubles per retry.
    retry_base: Duration,
}

/// HTTP client for the journal backend.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base.as_str())
            .field("session", &self.inner.session)
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session, timeout: Duration) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        if base.scheme() != "https" {
            let host = base.host_str().unwrap_or_default();
            if host != "localhost" && host != "127.0.0.1" {
                tracing::warn!(base_url = %base, "Using non-HTTPS backend URL, token is sent in clear text");
            }
        }

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base,
                session,
                timeout,
                max_retries: MAX_RETRIES,
                retry_base: Duration::from_secs(1),
            }),
        })
    }

    /// Override retry count and first backoff delay (tests use tiny delays).
    pub fn with_retry_policy(self, max_retries: u32, retry_base: Duration) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(Inner {
                http: inner.http.clone(),
                base: inner.base.clone(),
                session: inner.session.clone(),
                timeout: inner.timeout,
                max_retries,
                retry_base,
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    // ------------------------------------------------------------------
    // Paginated lists
    // ------------------------------------------------------------------

    pub async fn feed_page(&self, page: u32, limit: u32) -> Result<Page<Post>, ApiError> {
        let url = self.url(&["posts"])?;
        let env: PostsEnvelope = self.get_json(url, &page_params(page, limit, None)).await?;
        let posts = self.with_like_status(env.posts).await?;
        Ok(Page::new(posts, env.has_more))
    }

    pub async fn search_posts(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<Post>, ApiError> {
        let url = self.url(&["posts", "search"])?;
        let env: PostsEnvelope = self
            .get_json(url, &page_params(page, limit, Some(query)))
            .await?;
        let posts = self.with_like_status(env.posts).await?;
        Ok(Page::new(posts, env.has_more))
    }

    pub async fn search_users(
        &self,
        query: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<UserCard>, ApiError> {
        let url = self.url(&["users", "search"])?;
        let env: UsersEnvelope<UserCard> = self
            .get_json(url, &page_params(page, limit, Some(query)))
            .await?;
        let users = self.with_follow_status(env.users).await?;
        Ok(Page::new(users, env.has_more))
    }

    pub async fn notifications(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<Notification>, ApiError> {
        let url = self.url(&["users", user_id, "notifications"])?;
        let env: NotificationsEnvelope =
            self.get_json(url, &page_params(page, limit, None)).await?;
        Ok(Page::new(env.notifs, env.has_more))
    }

    /// Followers or followed users of `user_id`.
    ///
    /// The list endpoint returns ids only; each page is hydrated into cards,
    /// silently dropping users that can no longer be fetched.
    pub async fn connections(
        &self,
        user_id: &str,
        which: Connection,
        page: u32,
        limit: u32,
    ) -> Result<Page<UserCard>, ApiError> {
        let url = self.url(&["users", user_id, which.segment()])?;
        let env: UsersEnvelope<String> =
            self.get_json(url, &page_params(page, limit, None)).await?;
        let users = self.users_by_id(env.users).await?;
        let users = self.with_follow_status(users).await?;
        Ok(Page::new(users, env.has_more))
    }

    /// Posts authored by `user_id`, paged locally over the profile's post ids.
    pub async fn user_posts(
        &self,
        user_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<Page<Post>, ApiError> {
        let profile = self.user(user_id).await?;
        let start = (page.saturating_sub(1) as usize).saturating_mul(limit as usize);
        let end = start.saturating_add(limit as usize).min(profile.posts.len());
        let ids = profile.posts.get(start..end).unwrap_or_default().to_vec();
        let posts = self.posts_by_id(ids).await?;
        let posts = self.with_like_status(posts).await?;
        Ok(Page::new(posts, end < profile.posts.len()))
    }

    // ------------------------------------------------------------------
    // Single items
    // ------------------------------------------------------------------

    pub async fn user(&self, user_id: &str) -> Result<UserCard, ApiError> {
        let url = self.url(&["users", user_id])?;
        self.get_json(url, &[]).await
    }

    pub async fn post(&self, post_id: &str) -> Result<Post, ApiError> {
        let url = self.url(&["posts", post_id])?;
        self.get_json(url, &[]).await
    }

    pub async fn like_status(&self, post_id: &str) -> Result<bool, ApiError> {
        let url = self.url(&["posts", post_id, "likes", "status"])?;
        let status: LikeStatus = self.get_json(url, &[]).await?;
        Ok(status.is_liked)
    }

    pub async fn following_status(&self, user_id: &str) -> Result<bool, ApiError> {
        let url = self.url(&["users", user_id, "following", "status"])?;
        let status: FollowStatus = self.get_json(url, &[]).await?;
        Ok(status.is_following)
    }

    /// Profile card with `following` filled in from the status endpoint.
    pub async fn profile(&self, user_id: &str) -> Result<UserCard, ApiError> {
        let mut card = self.user(user_id).await?;
        card.following = self.following_status(user_id).await?;
        Ok(card)
    }

    /// Set `liked` on each post from the per-post status endpoint.
    ///
    /// Without a token there is nobody to ask about, so posts come back as is.
    /// A post whose status is unavailable stays unliked.
    async fn with_like_status(&self, mut posts: Vec<Post>) -> Result<Vec<Post>, ApiError> {
        if !self.inner.session.has_token() || posts.is_empty() {
            return Ok(posts);
        }
        let ids = posts.iter().map(|p| p.id.clone()).collect();
        let liked: HashSet<String> = fetch_batch(ids, |id| {
            let client = self.clone();
            async move {
                let liked = client.like_status(&id).await?;
                Ok::<_, ApiError>((id, liked))
            }
        })
        .await?
        .into_iter()
        .filter_map(|(id, liked)| liked.then_some(id))
        .collect();
        for post in &mut posts {
            post.liked = liked.contains(&post.id);
        }
        Ok(posts)
    }

    /// Set `following` on each card. The signed-in user is never asked about.
    async fn with_follow_status(
        &self,
        mut users: Vec<UserCard>,
    ) -> Result<Vec<UserCard>, ApiError> {
        if !self.inner.session.has_token() {
            return Ok(users);
        }
        let me = self.inner.session.user_id.as_str();
        let ids: Vec<String> = users
            .iter()
            .filter(|u| u.id != me)
            .map(|u| u.id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(users);
        }
        let following: HashSet<String> = fetch_batch(ids, |id| {
            let client = self.clone();
            async move {
                let following = client.following_status(&id).await?;
                Ok::<_, ApiError>((id, following))
            }
        })
        .await?
        .into_iter()
        .filter_map(|(id, following)| following.then_some(id))
        .collect();
        for user in &mut users {
            user.following = following.contains(&user.id);
        }
        Ok(users)
    }

    pub async fn users_by_id(&self, ids: Vec<String>) -> Result<Vec<UserCard>, ApiError> {
        fetch_batch(ids, |id| {
            let client = self.clone();
            async move { client.user(&id).await }
        })
        .await
    }

    pub async fn posts_by_id(&self, ids: Vec<String>) -> Result<Vec<Post>, ApiError> {
        fetch_batch(ids, |id| {
            let client = self.clone();
            async move { client.post(&id).await }
        })
        .await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Send one mutation. Not retried: the caller rolls back on failure.
    pub async fn mutate(&self, action: &MutationAction) -> Result<(), ApiError> {
        let (method, url) = match action {
            MutationAction::Like { post_id } => {
                (Method::POST, self.url(&["posts", post_id.as_str(), "likes"])?)
            }
            MutationAction::Unlike { post_id } => {
                (Method::DELETE, self.url(&["posts", post_id.as_str(), "likes"])?)
            }
            MutationAction::Follow { user_id } => {
                (Method::POST, self.url(&["users", user_id.as_str(), "followers"])?)
            }
            MutationAction::Unfollow { user_id } => {
                (Method::DELETE, self.url(&["users", user_id.as_str(), "followers"])?)
            }
            MutationAction::MarkRead {
                recipient_id,
                notification_id,
            } => (
                Method::PATCH,
                self.url(&[
                    "users",
                    recipient_id.as_str(),
                    "notifications",
                    notification_id.as_str(),
                ])?,
            ),
            MutationAction::AcceptFollower { user_id } => {
                (Method::PATCH, self.url(&["users", user_id.as_str(), "accept"])?)
            }
        };

        tracing::debug!(action = action.name(), path = url.path(), "sending mutation");
        let mut request = self.request(method.clone(), url);
        if method != Method::DELETE {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body("{}");
        }
        let response = tokio::time::timeout(self.inner.timeout, request.send())
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(ApiError::Network)?;

        if !response.status().is_success() {
            return Err(ApiError::from_status(response.status().as_u16()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.inner.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut request = self.inner.http.request(method, url);
        if let Some(token) = &self.inner.session.token {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }
        request
    }

    /// GET with timeout, backoff on 429/5xx/transient errors, and a size cap.
    async fn get_json<T: DeserializeOwned>(
        &self,
        mut url: Url,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        let mut retry_count = 0;

        loop {
            let request = self.request(Method::GET, url.clone());
            let attempt = async {
                let response = tokio::time::timeout(self.inner.timeout, request.send())
                    .await
                    .map_err(|_| ApiError::Timeout)?
                    .map_err(ApiError::Network)?;

                let status = response.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(ApiError::RateLimited(retry_count));
                }
                if !status.is_success() {
                    return Err(ApiError::from_status(status.as_u16()));
                }
                read_limited_bytes(response, MAX_RESPONSE_SIZE).await
            };

            match attempt.await {
                Ok(bytes) => {
                    return serde_json::from_slice(&bytes)
                        .map_err(|e| ApiError::Decode(e.to_string()));
                }
                Err(e) if self.should_retry(&e) && retry_count < self.inner.max_retries => {
                    let delay = self.inner.retry_base * (1u32 << retry_count); // 1s, 2s, 4s
                    tracing::warn!(
                        path = url.path(),
                        error = %e,
                        retry = retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                Err(ApiError::RateLimited(_)) => {
                    return Err(ApiError::RateLimited(self.inner.max_retries))
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn should_retry(&self, err: &ApiError) -> bool {
        matches!(err, ApiError::RateLimited(_)) || err.is_retryable()
    }
}

fn page_params(page: u32, limit: u32, search: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(3);
    if let Some(search) = search {
        params.push(("search", search.to_string()));
    }
    params.push(("page", page.to_string()));
    params.push(("limit", limit.to_string()));
    params
}

/// Fetch many single items concurrently, preserving input order.
///
/// Items that answer not-found or not-authorized are left out. Any other
/// failure fails the whole batch.
pub async fn fetch_batch<T, F, Fut>(ids: Vec<String>, fetch_one: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut fetch_one = fetch_one;
    let results: Vec<Option<T>> = stream::iter(ids)
        .map(|id| {
            let fut = fetch_one(id.clone());
            async move {
                match fut.await {
                    Ok(item) => Ok(Some(item)),
                    Err(e) if e.is_excluded_from_batch() => {
                        tracing::debug!(id = %id, error = %e, "skipping unavailable item");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            }
        })
        .buffered(BATCH_CONCURRENCY)
        .try_collect()
        .await?;
    Ok(results.into_iter().flatten().collect())
}

async fn read_limited_bytes(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ApiError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ApiError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ApiError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(ApiError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

// ============================================================================
// Engine Adapters
// ============================================================================

fn unsupported<T: Send + 'static>(kind: ResourceKind) -> BoxFuture<'static, Result<Page<T>, ApiError>> {
    async move { Err(ApiError::Unsupported(kind.label())) }.boxed()
}

impl PageFetcher<Post> for ApiClient {
    fn fetch_page(&self, request: &PageRequest) -> BoxFuture<'static, Result<Page<Post>, ApiError>> {
        let client = self.clone();
        let req = request.clone();
        match req.kind {
            ResourceKind::Feed => async move { client.feed_page(req.page, req.limit).await }.boxed(),
            ResourceKind::SearchPosts => {
                async move { client.search_posts(&req.identity, req.page, req.limit).await }.boxed()
            }
            ResourceKind::UserPosts => {
                async move { client.user_posts(&req.identity, req.page, req.limit).await }.boxed()
            }
            other => unsupported(other),
        }
    }
}

impl PageFetcher<UserCard> for ApiClient {
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> BoxFuture<'static, Result<Page<UserCard>, ApiError>> {
        let client = self.clone();
        let req = request.clone();
        match req.kind {
            ResourceKind::SearchUsers => {
                async move { client.search_users(&req.identity, req.page, req.limit).await }.boxed()
            }
            ResourceKind::Followers => async move {
                client
                    .connections(&req.identity, Connection::Followers, req.page, req.limit)
                    .await
            }
            .boxed(),
            ResourceKind::Following => async move {
                client
                    .connections(&req.identity, Connection::Following, req.page, req.limit)
                    .await
            }
            .boxed(),
            other => unsupported(other),
        }
    }
}

impl PageFetcher<Notification> for ApiClient {
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> BoxFuture<'static, Result<Page<Notification>, ApiError>> {
        let client = self.clone();
        let req = request.clone();
        match req.kind {
            ResourceKind::Notifications => {
                async move { client.notifications(&req.identity, req.page, req.limit).await }
                    .boxed()
            }
            other => unsupported(other),
        }
    }
}

impl Mutator for ApiClient {
    fn perform(&self, action: &MutationAction) -> BoxFuture<'static, Result<(), ApiError>> {
        let client = self.clone();
        let action = action.clone();
        async move { client.mutate(&action).await }.boxed()
    }
}
