//! End-to-end scenarios for the paging engine through the public API.
//!
//! Fetchers are in-memory closures, so each test controls exactly what the
//! "server" answers and when.

use futures::future::FutureExt;
use jotter::api::ApiError;
use jotter::model::{MutationAction, MutationSubject, Page, Post, ResourceKind, ToggleField, UserCard};
use jotter::paging::{
    ApplyOutcome, DisplayState, LoadState, OptimisticMutationController, PageFetcher, PageRequest,
    PaginatedFeedController, Resolution, SearchDebouncer, SentinelSample,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn post(id: &str, like_count: u32) -> Post {
    serde_json::from_value(serde_json::json!({
        "_id": id,
        "title": format!("Entry {}", id),
        "likeCount": like_count,
    }))
    .unwrap()
}

fn user(id: &str) -> UserCard {
    serde_json::from_value(serde_json::json!({ "_id": id, "username": id })).unwrap()
}

/// Serves `total` posts per identity, `limit` per page, counting calls.
fn post_server(total: usize, calls: Arc<AtomicUsize>) -> Arc<dyn PageFetcher<Post>> {
    Arc::new(move |req: &PageRequest| {
        calls.fetch_add(1, Ordering::SeqCst);
        let start = (req.page as usize - 1) * req.limit as usize;
        let end = (start + req.limit as usize).min(total);
        let items = (start..end)
            .map(|i| post(&format!("{}{}", req.identity, i), 0))
            .collect();
        let page = Page::new(items, end < total);
        async move { Ok::<_, ApiError>(page) }.boxed()
    })
}

const VISIBLE: SentinelSample = SentinelSample::Visible { ratio: 1.0 };

fn ids(posts: &[Post]) -> Vec<&str> {
    posts.iter().map(|p| p.id.as_str()).collect()
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_feed_pagination_stops_at_end() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut feed = PaginatedFeedController::new(ResourceKind::Feed, 10, post_server(25, calls.clone()));

    let first = feed.mount("").unwrap();
    feed.load(first).await;
    assert_eq!(feed.len(), 10);

    let second = feed.on_viewport(VISIBLE).expect("sentinel visible loads page 2");
    assert_eq!(second.page, 2);
    feed.load(second).await;
    assert_eq!(feed.len(), 20);

    let third = feed.on_viewport(VISIBLE).expect("still visible loads page 3");
    assert_eq!(third.page, 3);
    let outcome = feed.load(third).await;
    assert_eq!(
        outcome,
        ApplyOutcome::Applied {
            page: 3,
            added: 5,
            has_more: false
        }
    );
    assert_eq!(feed.len(), 25);

    // Exhausted: the sentinel no longer triggers anything.
    assert!(feed.on_viewport(VISIBLE).is_none());
    assert!(feed.on_viewport(SentinelSample::Detached).is_none());
    assert!(feed.on_viewport(VISIBLE).is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(!feed.cursor().has_more());
}

#[tokio::test]
async fn test_sentinel_while_in_flight_is_ignored() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut feed = PaginatedFeedController::new(ResourceKind::Feed, 10, post_server(25, calls.clone()));
    let first = feed.mount("").unwrap();
    feed.load(first).await;

    let second = feed.on_viewport(VISIBLE).unwrap();
    for _ in 0..5 {
        assert!(feed.on_viewport(VISIBLE).is_none());
    }
    feed.load(second).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(feed.len(), 20);
}

#[tokio::test]
async fn test_load_more_failure_keeps_items_and_retries_same_page() {
    let fail_next = Arc::new(AtomicUsize::new(0));
    let flag = fail_next.clone();
    let fetcher: Arc<dyn PageFetcher<Post>> = Arc::new(move |req: &PageRequest| {
        let fail = req.page > 1 && flag.swap(0, Ordering::SeqCst) == 1;
        let start = (req.page as usize - 1) * 10;
        let items: Vec<Post> = (start..start + 10).map(|i| post(&i.to_string(), 0)).collect();
        async move {
            if fail {
                Err(ApiError::HttpStatus(503))
            } else {
                Ok(Page::new(items, true))
            }
        }
        .boxed()
    });
    let mut feed = PaginatedFeedController::new(ResourceKind::Feed, 10, fetcher);
    let first = feed.mount("").unwrap();
    feed.load(first).await;

    fail_next.store(1, Ordering::SeqCst);
    let second = feed.on_viewport(VISIBLE).unwrap();
    let outcome = feed.load(second).await;
    assert!(matches!(outcome, ApplyOutcome::Failed { page: 2, .. }));
    assert_eq!(feed.len(), 10, "existing items stay visible");
    assert_eq!(feed.state(), &LoadState::Ready);
    assert!(feed.notice().is_some());
    for _ in 0..3 {
        assert!(feed.on_viewport(VISIBLE).is_none(), "failed page is not re-polled");
    }

    let retry = feed.retry().expect("load-more is retryable");
    assert_eq!(retry.page, 2);
    feed.load(retry).await;
    assert_eq!(feed.len(), 20);
    assert!(feed.notice().is_none());
}

#[tokio::test]
async fn test_first_page_failure_is_blocking_until_retry() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let fetcher: Arc<dyn PageFetcher<Post>> = Arc::new(move |_: &PageRequest| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(ApiError::Timeout)
            } else {
                Ok(Page::new(vec![post("a", 0)], false))
            }
        }
        .boxed()
    });
    let mut feed = PaginatedFeedController::new(ResourceKind::Feed, 10, fetcher);
    let first = feed.mount("").unwrap();
    feed.load(first).await;
    assert_eq!(feed.display_state(), DisplayState::Error);
    assert!(feed.on_viewport(VISIBLE).is_none());

    let again = feed.retry().unwrap();
    assert_eq!(again.page, 1);
    feed.load(again).await;
    assert_eq!(feed.display_state(), DisplayState::List { loading_more: false });
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_empty_search_result_shows_empty_state() {
    let fetcher: Arc<dyn PageFetcher<UserCard>> = Arc::new(|req: &PageRequest| {
        let items = if &*req.identity == "zzzz" {
            Vec::new()
        } else {
            vec![user("someone")]
        };
        async move { Ok::<_, ApiError>(Page::new(items, false)) }.boxed()
    });
    let mut users = PaginatedFeedController::new(ResourceKind::SearchUsers, 10, fetcher);

    let request = users.reset_to("zzzz");
    users.load(request).await;

    assert_eq!(users.display_state(), DisplayState::Empty);
    assert!(users.on_viewport(VISIBLE).is_none());
}

#[tokio::test]
async fn test_stale_search_response_is_discarded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut posts = PaginatedFeedController::new(ResourceKind::SearchPosts, 10, post_server(3, calls));

    let old = posts.reset_to("cat");
    let old_reply = posts.dispatch(&old);
    let new = posts.reset_to("dog");
    let new_reply = posts.dispatch(&new);

    // The newer reply lands first, then the old one straggles in.
    let outcome = posts.apply(&new, new_reply.await);
    assert!(matches!(outcome, ApplyOutcome::Applied { .. }));
    let outcome = posts.apply(&old, old_reply.await);
    assert_eq!(outcome, ApplyOutcome::Stale);

    assert_eq!(ids(posts.items()), vec!["dog0", "dog1", "dog2"]);
    assert_eq!(posts.identity(), Some("dog"));
}

#[tokio::test]
async fn test_debounced_typing_resets_search_once() {
    tokio::time::pause();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut posts = PaginatedFeedController::new(ResourceKind::SearchPosts, 10, post_server(3, calls.clone()));
    let mut debouncer = SearchDebouncer::new(Duration::from_millis(300));

    for text in ["j", "jo", "jou", "journ", "journal"] {
        debouncer.on_text_change(text);
        tokio::time::advance(Duration::from_millis(120)).await;
        assert!(debouncer.fire(Instant::now(), &mut [&mut posts]).is_empty());
    }

    debouncer.expired().await;
    let requests = debouncer.fire(Instant::now(), &mut [&mut posts]);
    assert_eq!(requests.len(), 1);
    posts.load(requests[0].clone()).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(posts.identity(), Some("journal"));
    assert_eq!(posts.len(), 3);
}

// ============================================================================
// Optimistic mutations
// ============================================================================

async fn loaded_feed(posts: Vec<Post>) -> PaginatedFeedController<Post> {
    let fetcher: Arc<dyn PageFetcher<Post>> = Arc::new(move |_: &PageRequest| {
        let page = Page::new(posts.clone(), false);
        async move { Ok::<_, ApiError>(page) }.boxed()
    });
    let mut feed = PaginatedFeedController::new(ResourceKind::Feed, 10, fetcher);
    let first = feed.mount("").unwrap();
    feed.load(first).await;
    feed
}

#[tokio::test]
async fn test_like_rollback_restores_state_and_reports_once() {
    let mut feed = loaded_feed(vec![post("p1", 4)]).await;
    let mut likes = OptimisticMutationController::new();

    let ticket = likes
        .toggle(&mut feed, MutationSubject::new("p1"), ToggleField::Liked)
        .unwrap();
    assert_eq!(ticket.action, MutationAction::Like { post_id: "p1".into() });
    assert!(feed.get("p1").unwrap().liked);
    assert_eq!(feed.get("p1").unwrap().like_count, 5);

    let resolution = likes.resolve(&ticket, Err(ApiError::HttpStatus(500)), &mut feed);
    match &resolution {
        Resolution::RolledBack { message, .. } => {
            assert_eq!(message, "Failed to like post: HTTP error: status 500")
        }
        other => panic!("expected rollback, got {:?}", other),
    }
    assert!(!feed.get("p1").unwrap().liked);
    assert_eq!(feed.get("p1").unwrap().like_count, 4);

    // A duplicate reply for the same ticket changes nothing.
    assert_eq!(
        likes.resolve(&ticket, Err(ApiError::HttpStatus(500)), &mut feed),
        Resolution::Stale
    );
    assert_eq!(likes.pending_count(), 0);
}

#[tokio::test]
async fn test_like_unlike_race_converges_to_last_intent() {
    let mut feed = loaded_feed(vec![post("p1", 0)]).await;
    let mut likes = OptimisticMutationController::new();
    let subject = || MutationSubject::new("p1");

    // like, unlike, like before anything comes back
    let first = likes.toggle(&mut feed, subject(), ToggleField::Liked).unwrap();
    assert!(likes.toggle(&mut feed, subject(), ToggleField::Liked).is_none());
    assert!(likes.toggle(&mut feed, subject(), ToggleField::Liked).is_none());
    assert!(feed.get("p1").unwrap().liked);

    // Server confirms the like; intent matches, so nothing else is sent.
    let resolution = likes.resolve(&first, Ok(()), &mut feed);
    assert!(matches!(resolution, Resolution::Committed(_)));
    assert!(feed.get("p1").unwrap().liked);
    assert_eq!(feed.get("p1").unwrap().like_count, 1);
    assert_eq!(likes.pending_count(), 0);
}

#[tokio::test]
async fn test_double_tap_sends_follow_up_for_final_intent() {
    let mut feed = loaded_feed(vec![post("p1", 0)]).await;
    let mut likes = OptimisticMutationController::new();

    let like = likes
        .toggle(&mut feed, MutationSubject::new("p1"), ToggleField::Liked)
        .unwrap();
    assert!(likes
        .toggle(&mut feed, MutationSubject::new("p1"), ToggleField::Liked)
        .is_none());

    let follow_up = match likes.resolve(&like, Ok(()), &mut feed) {
        Resolution::FollowUp(next) => next,
        other => panic!("expected follow-up, got {:?}", other),
    };
    assert_eq!(follow_up.action, MutationAction::Unlike { post_id: "p1".into() });

    // The original like ticket cannot be replayed against the new request.
    assert_eq!(likes.resolve(&like, Ok(()), &mut feed), Resolution::Stale);

    assert!(matches!(
        likes.resolve(&follow_up, Ok(()), &mut feed),
        Resolution::Committed(_)
    ));
    assert!(!feed.get("p1").unwrap().liked);
    assert_eq!(feed.get("p1").unwrap().like_count, 0);
}

#[tokio::test]
async fn test_failure_after_user_reverted_is_superseded() {
    let mut feed = loaded_feed(vec![post("p1", 0)]).await;
    let mut likes = OptimisticMutationController::new();

    let like = likes
        .toggle(&mut feed, MutationSubject::new("p1"), ToggleField::Liked)
        .unwrap();
    likes.toggle(&mut feed, MutationSubject::new("p1"), ToggleField::Liked);

    assert_eq!(
        likes.resolve(&like, Err(ApiError::Timeout), &mut feed),
        Resolution::Superseded
    );
    assert!(!feed.get("p1").unwrap().liked);
}

#[tokio::test]
async fn test_reset_clears_items_under_pending_edit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut posts = PaginatedFeedController::new(ResourceKind::SearchPosts, 10, post_server(2, calls));
    let first = posts.reset_to("a");
    posts.load(first).await;

    let mut likes = OptimisticMutationController::new();
    let ticket = likes
        .toggle(&mut posts, MutationSubject::new("a0"), ToggleField::Liked)
        .unwrap();

    let next = posts.reset_to("b");
    likes.clear();
    posts.load(next).await;

    assert_eq!(likes.resolve(&ticket, Err(ApiError::Timeout), &mut posts), Resolution::Stale);
    assert!(posts.get("a0").is_none());
    assert!(posts.items().iter().all(|p| !p.liked));
}
