use super::cursor::{CursorError, PageCursor};
use super::store::IncrementalListStore;
use super::viewport::{Hold, LoadGate, SentinelSample, ViewportConfig, ViewportTrigger};
use crate::api::{ApiError, ErrorClass};
use crate::model::{Identifiable, Page, ResourceKind};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Requests and Fetchers
// ============================================================================

/// One page fetch, tagged with everything needed to recognise a stale reply.
///
/// `identity` is the controller's filter parameter at issue time (user id,
/// search text, notification owner); `generation` changes on every reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub kind: ResourceKind,
    pub identity: Arc<str>,
    pub page: u32,
    pub limit: u32,
    pub generation: u64,
}

/// Pluggable page source: `fetchPage(resourceKey, page, limit, filters)`.
///
/// Implemented by the HTTP client and by any closure returning a boxed
/// future, which is what tests use.
pub trait PageFetcher<T>: Send + Sync {
    fn fetch_page(&self, request: &PageRequest) -> BoxFuture<'static, Result<Page<T>, ApiError>>;
}

impl<T, F> PageFetcher<T> for F
where
    F: Fn(&PageRequest) -> BoxFuture<'static, Result<Page<T>, ApiError>> + Send + Sync,
{
    fn fetch_page(&self, request: &PageRequest) -> BoxFuture<'static, Result<Page<T>, ApiError>> {
        self(request)
    }
}

// ============================================================================
// State
// ============================================================================

/// A failure as remembered by the controller for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedError {
    pub class: ErrorClass,
    pub message: String,
}

impl From<&ApiError> for FeedError {
    fn from(err: &ApiError) -> Self {
        Self {
            class: err.class(),
            message: err.to_string(),
        }
    }
}

/// Controller lifecycle: `Idle → Loading → Ready ⇄ LoadingMore`, with
/// `Error` reachable from `Loading` only (load-more failures fall back to
/// `Ready`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    /// Page 1 outstanding; nothing to show yet.
    Loading,
    Ready,
    /// Page N > 1 outstanding; existing items stay visible.
    LoadingMore,
    /// Page 1 failed. Recoverable via retry or a new identity.
    Error(FeedError),
}

/// What the UI should draw for this resource right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    /// Full skeleton: first page not in yet.
    Skeleton,
    /// First page arrived and was empty.
    Empty,
    /// Items, optionally followed by a "loading more" indicator.
    List { loading_more: bool },
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadMoreError {
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error("first page has not loaded")]
    NotReady,
}

/// Result of feeding a response back into the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied {
        page: u32,
        added: usize,
        has_more: bool,
    },
    /// Response belonged to an earlier identity or generation; dropped.
    Stale,
    Failed {
        page: u32,
        error: FeedError,
    },
}

impl ApplyOutcome {
    /// True when the failure must be escalated to session handling.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Failed { error, .. } if error.class == ErrorClass::Auth
        )
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Reusable infinite-scroll controller for one resource instance.
///
/// Owns its cursor, its store and its viewport trigger. Every request it
/// hands out carries the identity and generation it was issued for; replies
/// that no longer match are discarded by [`PaginatedFeedController::apply`].
pub struct PaginatedFeedController<T> {
    kind: ResourceKind,
    identity: Option<Arc<str>>,
    generation: u64,
    state: LoadState,
    cursor: PageCursor,
    store: IncrementalListStore<T>,
    trigger: ViewportTrigger,
    fetcher: Arc<dyn PageFetcher<T>>,
    timeout: Option<Duration>,
    /// Advisory message from the last failed load-more.
    notice: Option<FeedError>,
}

impl<T: Identifiable + Clone + Send + 'static> PaginatedFeedController<T> {
    pub fn new(kind: ResourceKind, page_size: u32, fetcher: Arc<dyn PageFetcher<T>>) -> Self {
        Self {
            kind,
            identity: None,
            generation: 0,
            state: LoadState::Idle,
            cursor: PageCursor::new(page_size),
            store: IncrementalListStore::new(),
            trigger: ViewportTrigger::default(),
            fetcher,
            timeout: None,
            notice: None,
        }
    }

    /// Bound every fetch issued through [`Self::dispatch`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_viewport(mut self, config: ViewportConfig) -> Self {
        self.trigger = ViewportTrigger::new(config);
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn items(&self) -> &[T] {
        self.store.items()
    }

    pub fn snapshot(&self) -> Arc<Vec<T>> {
        self.store.snapshot()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.store.get(id)
    }

    pub fn notice(&self) -> Option<&FeedError> {
        self.notice.as_ref()
    }

    /// Take the advisory notice so it is surfaced only once.
    pub fn take_notice(&mut self) -> Option<FeedError> {
        self.notice.take()
    }

    pub fn display_state(&self) -> DisplayState {
        match &self.state {
            LoadState::Idle | LoadState::Loading => DisplayState::Skeleton,
            LoadState::Error(_) => DisplayState::Error,
            LoadState::Ready if self.store.is_empty() => DisplayState::Empty,
            LoadState::Ready => DisplayState::List {
                loading_more: false,
            },
            LoadState::LoadingMore => DisplayState::List { loading_more: true },
        }
    }

    /// Start loading for `identity` unless already showing it.
    ///
    /// Returns the page-1 request when a load begins.
    pub fn mount(&mut self, identity: &str) -> Option<PageRequest> {
        let same = self.identity.as_deref() == Some(identity);
        if same && self.state != LoadState::Idle {
            return None;
        }
        Some(self.reset_to(identity))
    }

    /// Drop everything and load page 1 for `identity`.
    ///
    /// Bumps the generation so any reply still in flight for the previous
    /// identity is recognised as stale.
    pub fn reset_to(&mut self, identity: &str) -> PageRequest {
        self.generation = self.generation.wrapping_add(1);
        self.identity = Some(Arc::from(identity));
        self.cursor.reset();
        self.store.clear();
        self.trigger.rearm();
        self.notice = None;
        self.state = LoadState::Loading;

        let page = self.cursor.request_next_page().unwrap_or(1);
        tracing::debug!(
            kind = %self.kind,
            identity,
            generation = self.generation,
            "loading first page"
        );
        self.request_for(page)
    }

    /// Manual retry: re-enter `Loading` after a page-1 failure, or re-ask for
    /// the page whose load-more failed.
    pub fn retry(&mut self) -> Option<PageRequest> {
        match &self.state {
            LoadState::Error(_) => {
                let identity = self.identity.clone()?;
                Some(self.reset_to(&identity))
            }
            LoadState::Ready => {
                let request = self.load_more().ok()?;
                self.trigger.rearm();
                Some(request)
            }
            _ => None,
        }
    }

    /// Request the next page from `Ready`.
    pub fn load_more(&mut self) -> Result<PageRequest, LoadMoreError> {
        match self.state {
            LoadState::Ready => {}
            LoadState::Loading | LoadState::LoadingMore => {
                return Err(CursorError::AlreadyInFlight.into())
            }
            LoadState::Idle | LoadState::Error(_) => return Err(LoadMoreError::NotReady),
        }
        let page = self.cursor.request_next_page()?;
        self.state = LoadState::LoadingMore;
        tracing::debug!(kind = %self.kind, page, generation = self.generation, "loading more");
        Ok(self.request_for(page))
    }

    /// Feed a sentinel observation; returns a request when it should fire.
    pub fn on_viewport(&mut self, sample: SentinelSample) -> Option<PageRequest> {
        let gate = if self.state == LoadState::Ready {
            LoadGate::from(&self.cursor)
        } else {
            // Not ready counts as busy so the trigger re-arms for later.
            LoadGate {
                in_flight: true,
                has_more: self.cursor.has_more(),
            }
        };
        if self.trigger.observe(sample, gate) {
            self.load_more().ok()
        } else {
            None
        }
    }

    /// Start the network call for `request`, bounded by the configured timeout.
    pub fn dispatch(&self, request: &PageRequest) -> BoxFuture<'static, Result<Page<T>, ApiError>> {
        let fut = self.fetcher.fetch_page(request);
        match self.timeout {
            Some(limit) => async move {
                tokio::time::timeout(limit, fut)
                    .await
                    .unwrap_or(Err(ApiError::Timeout))
            }
            .boxed(),
            None => fut,
        }
    }

    /// Fetch and apply in one step. Holds `&mut self` across the await, so
    /// it suits sequential drivers and tests; the UI uses
    /// [`Self::dispatch`] plus [`Self::apply`].
    pub async fn load(&mut self, request: PageRequest) -> ApplyOutcome {
        let result = self.dispatch(&request).await;
        self.apply(&request, result)
    }

    /// Apply a reply to the request it answers.
    pub fn apply(
        &mut self,
        request: &PageRequest,
        result: Result<Page<T>, ApiError>,
    ) -> ApplyOutcome {
        if !self.is_current(request) {
            tracing::debug!(
                kind = %self.kind,
                page = request.page,
                request_generation = request.generation,
                generation = self.generation,
                "discarding stale page response"
            );
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(page) => {
                self.cursor.complete(true, page.has_more);
                let added = if request.page <= 1 {
                    self.store.replace_all(page.items);
                    self.store.len()
                } else {
                    self.store.append(page.items)
                };
                self.state = LoadState::Ready;
                self.notice = None;
                self.trigger.rearm();
                tracing::debug!(
                    kind = %self.kind,
                    page = request.page,
                    added,
                    total = self.store.len(),
                    has_more = page.has_more,
                    "page applied"
                );
                ApplyOutcome::Applied {
                    page: request.page,
                    added,
                    has_more: page.has_more,
                }
            }
            Err(err) => {
                self.cursor.complete(false, false);
                let error = FeedError::from(&err);
                if request.page <= 1 {
                    tracing::warn!(kind = %self.kind, error = %err, "first page failed");
                    self.state = LoadState::Error(error.clone());
                } else {
                    tracing::warn!(
                        kind = %self.kind,
                        page = request.page,
                        error = %err,
                        "load more failed, keeping existing items"
                    );
                    self.state = LoadState::Ready;
                    self.notice = Some(error.clone());
                    // No automatic re-fire: the user scrolls back or retries.
                    let hold = if error.class == ErrorClass::Auth {
                        Hold::UntilRearm
                    } else {
                        Hold::UntilLeave
                    };
                    self.trigger.suspend(hold);
                }
                ApplyOutcome::Failed {
                    page: request.page,
                    error,
                }
            }
        }
    }

    /// Targeted in-place edit of one loaded item. No-op when absent.
    pub fn update_item<F>(&mut self, id: &str, updater: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        self.store.update_by_id(id, updater)
    }

    pub fn remove_item(&mut self, id: &str) -> Option<T> {
        self.store.remove_by_id(id)
    }

    fn is_current(&self, request: &PageRequest) -> bool {
        request.kind == self.kind
            && request.generation == self.generation
            && self.identity.as_deref() == Some(&*request.identity)
    }

    fn request_for(&self, page: u32) -> PageRequest {
        PageRequest {
            kind: self.kind,
            identity: self.identity.clone().unwrap_or_else(|| Arc::from("")),
            page,
            limit: self.cursor.page_size(),
            generation: self.generation,
        }
    }
}

/// Controllers whose page 1 depends on a query string.
///
/// Lets the search debouncer reset controllers of different item types in
/// one pass.
pub trait QueryDependent {
    fn reset_for_query(&mut self, query: &str) -> PageRequest;
}

impl<T: Identifiable + Clone + Send + 'static> QueryDependent for PaginatedFeedController<T> {
    fn reset_for_query(&mut self, query: &str) -> PageRequest {
        self.reset_to(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Item(String);

    impl Identifiable for Item {
        fn id(&self) -> &str {
            &self.0
        }
    }

    /// Serves `total` numbered items, `limit` per page, counting calls.
    fn numbered(total: usize, calls: Arc<AtomicUsize>) -> Arc<dyn PageFetcher<Item>> {
        Arc::new(move |req: &PageRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            let start = (req.page as usize - 1) * req.limit as usize;
            let end = (start + req.limit as usize).min(total);
            let items = (start..end)
                .map(|i| Item(format!("{}-{}", req.identity, i)))
                .collect();
            let page = Page::new(items, end < total);
            async move { Ok::<_, ApiError>(page) }.boxed()
        })
    }

    fn failing(err: fn() -> ApiError) -> Arc<dyn PageFetcher<Item>> {
        Arc::new(move |_: &PageRequest| {
            let e = err();
            async move { Err::<Page<Item>, _>(e) }.boxed()
        })
    }

    #[tokio::test]
    async fn test_mount_loads_first_page() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = PaginatedFeedController::new(ResourceKind::Feed, 10, numbered(25, calls.clone()));

        assert_eq!(c.display_state(), DisplayState::Skeleton);
        let req = c.mount("all").unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(c.state(), &LoadState::Loading);

        let outcome = c.load(req).await;
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                page: 1,
                added: 10,
                has_more: true
            }
        );
        assert_eq!(c.len(), 10);
        assert_eq!(c.display_state(), DisplayState::List { loading_more: false });

        // Mounting the same identity again does nothing
        assert!(c.mount("all").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_more_rejected_while_in_flight() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = PaginatedFeedController::new(ResourceKind::Feed, 10, numbered(25, calls));
        let first = c.mount("all").unwrap();

        // Still loading page 1
        assert_eq!(
            c.load_more(),
            Err(LoadMoreError::Cursor(CursorError::AlreadyInFlight))
        );
        c.load(first).await;

        let second = c.load_more().unwrap();
        assert_eq!(c.display_state(), DisplayState::List { loading_more: true });
        assert_eq!(
            c.load_more(),
            Err(LoadMoreError::Cursor(CursorError::AlreadyInFlight))
        );
        c.load(second).await;
        assert_eq!(c.len(), 20);
    }

    #[tokio::test]
    async fn test_empty_first_page_is_empty_not_skeleton() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c =
            PaginatedFeedController::new(ResourceKind::SearchPosts, 10, numbered(0, calls));
        let req = c.mount("zzzznoresults").unwrap();
        c.load(req).await;

        assert_eq!(c.state(), &LoadState::Ready);
        assert_eq!(c.display_state(), DisplayState::Empty);
        assert_eq!(c.load_more(), Err(LoadMoreError::Cursor(CursorError::Exhausted)));
    }

    #[tokio::test]
    async fn test_first_page_failure_enters_error_and_retry_recovers() {
        let mut c = PaginatedFeedController::new(
            ResourceKind::Feed,
            10,
            failing(|| ApiError::HttpStatus(503)),
        );
        let req = c.mount("all").unwrap();
        let outcome = c.load(req).await;

        assert!(matches!(outcome, ApplyOutcome::Failed { page: 1, .. }));
        assert!(matches!(c.state(), LoadState::Error(e) if e.class == ErrorClass::Network));
        assert_eq!(c.display_state(), DisplayState::Error);

        let retry = c.retry().unwrap();
        assert_eq!(retry.page, 1);
        assert_eq!(c.state(), &LoadState::Loading);
    }

    #[tokio::test]
    async fn test_load_more_failure_keeps_items_and_is_retryable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let good = numbered(30, calls);
        let fail_next = Arc::new(AtomicUsize::new(0));
        let flaky: Arc<dyn PageFetcher<Item>> = {
            let fail_next = fail_next.clone();
            Arc::new(move |req: &PageRequest| {
                if req.page == 2 && fail_next.fetch_add(1, Ordering::SeqCst) == 0 {
                    async { Err::<Page<Item>, _>(ApiError::Timeout) }.boxed()
                } else {
                    good.fetch_page(req)
                }
            })
        };
        let mut c = PaginatedFeedController::new(ResourceKind::Feed, 10, flaky);
        let req = c.mount("all").unwrap();
        c.load(req).await;

        let req = c.load_more().unwrap();
        let outcome = c.load(req).await;
        assert!(matches!(outcome, ApplyOutcome::Failed { page: 2, .. }));
        assert_eq!(c.state(), &LoadState::Ready);
        assert_eq!(c.len(), 10);
        assert!(c.take_notice().is_some());
        assert!(c.notice().is_none());

        let again = c.retry().unwrap();
        assert_eq!(again.page, 2, "retry reuses the failed page number");
        c.load(again).await;
        assert_eq!(c.len(), 20);
    }

    #[tokio::test]
    async fn test_stale_response_after_identity_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = numbered(25, calls);
        let mut c = PaginatedFeedController::new(ResourceKind::Followers, 10, fetcher.clone());

        let for_a = c.mount("user-a").unwrap();
        let late_a = c.dispatch(&for_a);

        let for_b = c.mount("user-b").unwrap();
        let b_page = c.dispatch(&for_b).await;
        c.apply(&for_b, b_page);

        let outcome = c.apply(&for_a, late_a.await);
        assert_eq!(outcome, ApplyOutcome::Stale);
        assert!(c.items().iter().all(|i| i.0.starts_with("user-b")));
        assert_eq!(c.len(), 10);
    }

    #[tokio::test]
    async fn test_auth_failure_flagged_for_session_handling() {
        let mut c = PaginatedFeedController::new(
            ResourceKind::Notifications,
            10,
            failing(|| ApiError::Auth(401)),
        );
        let req = c.mount("me").unwrap();
        let outcome = c.load(req).await;
        assert!(outcome.requires_auth());
    }

    #[tokio::test]
    async fn test_dispatch_timeout_is_network_failure() {
        tokio::time::pause();
        let hang: Arc<dyn PageFetcher<Item>> = Arc::new(|_: &PageRequest| {
            async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<Page<Item>, ApiError>(Page::empty())
            }
            .boxed()
        });
        let mut c = PaginatedFeedController::new(ResourceKind::Feed, 10, hang)
            .with_timeout(Duration::from_secs(20));
        let req = c.mount("all").unwrap();
        let outcome = c.load(req).await;
        assert!(matches!(
            outcome,
            ApplyOutcome::Failed { error, .. } if error.class == ErrorClass::Network
        ));
    }

    /// Pages after the first fail with `err`; page 1 succeeds.
    fn failing_after_first(err: fn() -> ApiError, calls: Arc<AtomicUsize>) -> Arc<dyn PageFetcher<Item>> {
        let good = numbered(30, Arc::new(AtomicUsize::new(0)));
        Arc::new(move |req: &PageRequest| {
            calls.fetch_add(1, Ordering::SeqCst);
            if req.page > 1 {
                let e = err();
                async move { Err::<Page<Item>, _>(e) }.boxed()
            } else {
                good.fetch_page(req)
            }
        })
    }

    const SEEN: SentinelSample = SentinelSample::Visible { ratio: 1.0 };

    #[tokio::test]
    async fn test_failed_load_more_is_not_refired_by_visible_sentinel() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = PaginatedFeedController::new(
            ResourceKind::Feed,
            10,
            failing_after_first(|| ApiError::HttpStatus(503), calls.clone()),
        );
        let req = c.mount("all").unwrap();
        c.load(req).await;

        let more = c.on_viewport(SEEN).unwrap();
        // Tick while page 2 is outstanding
        assert!(c.on_viewport(SEEN).is_none());
        assert!(matches!(c.load(more).await, ApplyOutcome::Failed { page: 2, .. }));

        for _ in 0..5 {
            assert!(c.on_viewport(SEEN).is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Scrolling away and back asks again
        assert!(c.on_viewport(SentinelSample::Offscreen { distance: 500 }).is_none());
        assert_eq!(c.on_viewport(SEEN).map(|r| r.page), Some(2));
    }

    #[tokio::test]
    async fn test_auth_failure_on_load_more_waits_for_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = PaginatedFeedController::new(
            ResourceKind::Notifications,
            10,
            failing_after_first(|| ApiError::Auth(401), calls.clone()),
        );
        let req = c.mount("me").unwrap();
        c.load(req).await;

        let more = c.on_viewport(SEEN).unwrap();
        assert!(c.on_viewport(SEEN).is_none());
        let outcome = c.load(more).await;
        assert!(outcome.requires_auth());

        for sample in [
            SEEN,
            SentinelSample::Offscreen { distance: 500 },
            SentinelSample::Detached,
            SEEN,
            SEEN,
        ] {
            assert!(c.on_viewport(sample).is_none());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Only an explicit retry sends page 2 again
        assert_eq!(c.retry().map(|r| r.page), Some(2));
    }

    #[tokio::test]
    async fn test_short_page_refires_without_busy_sample() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = PaginatedFeedController::new(ResourceKind::Feed, 10, numbered(25, calls));
        let req = c.mount("all").unwrap();
        c.load(req).await;

        let more = c.on_viewport(SEEN).unwrap();
        c.load(more).await;
        assert_eq!(c.on_viewport(SEEN).map(|r| r.page), Some(3));
    }

    #[tokio::test]
    async fn test_first_page_added_counts_distinct_items() {
        let dupes: Arc<dyn PageFetcher<Item>> = Arc::new(|_: &PageRequest| {
            let items = ["a", "b", "a", "c", "b"]
                .iter()
                .map(|id| Item(id.to_string()))
                .collect();
            async move { Ok::<_, ApiError>(Page::new(items, false)) }.boxed()
        });
        let mut c = PaginatedFeedController::new(ResourceKind::Feed, 10, dupes);
        let req = c.mount("all").unwrap();

        let outcome = c.load(req).await;
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                page: 1,
                added: 3,
                has_more: false
            }
        );
        assert_eq!(c.len(), 3);
    }

    #[tokio::test]
    async fn test_viewport_drives_load_more() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut c = PaginatedFeedController::new(ResourceKind::Feed, 10, numbered(25, calls));
        let req = c.mount("all").unwrap();

        // Sentinel visible before page 1 lands: ignored
        assert!(c.on_viewport(SentinelSample::Visible { ratio: 1.0 }).is_none());
        c.load(req).await;

        let more = c.on_viewport(SentinelSample::Visible { ratio: 1.0 }).unwrap();
        assert_eq!(more.page, 2);
        // Re-entrant sample while page 2 is outstanding
        assert!(c.on_viewport(SentinelSample::Visible { ratio: 1.0 }).is_none());
    }
}
