use super::controller::{PageRequest, QueryDependent};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Default quiet period before a query is issued.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Coalesces keystrokes into one query reset per pause in typing.
///
/// The text is stored on every change so the input always shows what was
/// typed; only the reset of dependent controllers waits for the quiet period.
#[derive(Debug, Clone)]
pub struct SearchDebouncer {
    text: String,
    delay: Duration,
    deadline: Option<Instant>,
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            text: String::new(),
            delay,
            deadline: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record new input text and restart the timer, replacing any pending one.
    pub fn on_text_change(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// Drop the pending timer without issuing anything.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Return the query to issue if the timer expired at or before `now`.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(self.text.clone())
            }
            _ => None,
        }
    }

    /// Reset every dependent controller if the timer has expired.
    pub fn fire(&mut self, now: Instant, deps: &mut [&mut dyn QueryDependent]) -> Vec<PageRequest> {
        match self.poll(now) {
            Some(query) => {
                tracing::debug!(query = %query, dependents = deps.len(), "debounced query fired");
                reset_all(&query, deps)
            }
            None => Vec::new(),
        }
    }

    /// Issue the current text right away (explicit submit).
    pub fn flush(&mut self, deps: &mut [&mut dyn QueryDependent]) -> Vec<PageRequest> {
        self.deadline = None;
        let query = self.text.clone();
        reset_all(&query, deps)
    }

    /// Seed text from outside (command line) and load immediately.
    pub fn seed(
        &mut self,
        text: impl Into<String>,
        deps: &mut [&mut dyn QueryDependent],
    ) -> Vec<PageRequest> {
        self.text = text.into();
        self.flush(deps)
    }

    /// Resolves when the pending timer expires; never, if none is pending.
    ///
    /// The returned future owns a copy of the deadline, so the debouncer can
    /// be mutated while it is being awaited.
    pub fn expired(&self) -> impl Future<Output = ()> + Send + 'static {
        let deadline = self.deadline;
        async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        }
    }
}

fn reset_all(query: &str, deps: &mut [&mut dyn QueryDependent]) -> Vec<PageRequest> {
    deps.iter_mut().map(|dep| dep.reset_for_query(query)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Page, ResourceKind};
    use crate::paging::controller::{PageFetcher, PaginatedFeedController};
    use futures::FutureExt;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Hit(String);

    impl crate::model::Identifiable for Hit {
        fn id(&self) -> &str {
            &self.0
        }
    }

    fn controller(kind: ResourceKind) -> PaginatedFeedController<Hit> {
        let fetcher: Arc<dyn PageFetcher<Hit>> = Arc::new(|_: &PageRequest| {
            async { Ok::<Page<Hit>, crate::api::ApiError>(Page::empty()) }.boxed()
        });
        PaginatedFeedController::new(kind, 10, fetcher)
    }

    #[tokio::test]
    async fn test_only_last_keystroke_fires() {
        tokio::time::pause();
        let mut posts = controller(ResourceKind::SearchPosts);
        let mut users = controller(ResourceKind::SearchUsers);
        let mut debouncer = SearchDebouncer::default();

        for text in ["r", "ru", "rus", "rust"] {
            debouncer.on_text_change(text);
            assert_eq!(debouncer.text(), text, "text is current immediately");
            tokio::time::advance(Duration::from_millis(100)).await;
            assert!(debouncer
                .fire(Instant::now(), &mut [&mut posts, &mut users])
                .is_empty());
        }

        tokio::time::advance(Duration::from_millis(200)).await;
        let requests = debouncer.fire(Instant::now(), &mut [&mut posts, &mut users]);

        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| &*r.identity == "rust" && r.page == 1));
        assert_eq!(posts.identity(), Some("rust"));
        assert_eq!(users.identity(), Some("rust"));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_expired_future_resolves_at_deadline() {
        tokio::time::pause();
        let mut debouncer = SearchDebouncer::new(Duration::from_millis(300));
        debouncer.on_text_change("journal");
        let start = Instant::now();
        debouncer.expired().await;
        assert!(Instant::now() - start >= Duration::from_millis(300));
        assert_eq!(debouncer.poll(Instant::now()), Some("journal".to_string()));
    }

    #[tokio::test]
    async fn test_seed_loads_without_waiting() {
        tokio::time::pause();
        let mut posts = controller(ResourceKind::SearchPosts);
        let mut debouncer = SearchDebouncer::default();

        let requests = debouncer.seed("tokio", &mut [&mut posts]);
        assert_eq!(requests.len(), 1);
        assert_eq!(debouncer.text(), "tokio");
        assert!(!debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_query() {
        tokio::time::pause();
        let mut debouncer = SearchDebouncer::default();
        debouncer.on_text_change("abc");
        debouncer.cancel();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(debouncer.poll(Instant::now()), None);
        assert_eq!(debouncer.text(), "abc");
    }
}
