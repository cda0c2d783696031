//! Application state for the terminal client.
//!
//! `App` owns one [`PaginatedFeedController`] per resource, the optimistic
//! edit trackers that sit in front of them, and the search debouncer. It never
//! performs I/O itself: it hands out futures and requests that the UI layer
//! spawns, and applies the [`AppEvent`]s those tasks send back.

use crate::api::{ApiClient, ApiError, Session};
use crate::config::Config;
use crate::model::{
    Identifiable, MutationSubject, Notification, NotificationKind, Page, Post, ResourceKind,
    ToggleField, UserCard,
};
use crate::paging::{
    ApplyOutcome, DisplayState, FeedError, Mutator, MutationTicket, OptimisticMutationController,
    PageFetcher, PageRequest, PaginatedFeedController, QueryDependent, Resolution, SearchDebouncer,
    SentinelSample, ToggleTarget,
};
use futures::future::{BoxFuture, FutureExt};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Terminal rows used by one list entry (headline + detail line).
pub const ITEM_HEIGHT: usize = 2;

/// Seconds a status message stays on screen.
const STATUS_TTL_SECS: u64 = 3;

// ============================================================================
// Backend
// ============================================================================

/// Loads a single profile outside any paginated list.
pub trait ProfileSource: Send + Sync {
    fn load_profile(&self, user_id: &str) -> BoxFuture<'static, Result<UserCard, ApiError>>;
}

impl<F> ProfileSource for F
where
    F: Fn(&str) -> BoxFuture<'static, Result<UserCard, ApiError>> + Send + Sync,
{
    fn load_profile(&self, user_id: &str) -> BoxFuture<'static, Result<UserCard, ApiError>> {
        self(user_id)
    }
}

impl ProfileSource for ApiClient {
    fn load_profile(&self, user_id: &str) -> BoxFuture<'static, Result<UserCard, ApiError>> {
        let client = self.clone();
        let user_id = user_id.to_string();
        async move { client.profile(&user_id).await }.boxed()
    }
}

/// Everything the app talks to, injected at construction.
#[derive(Clone)]
pub struct Backend {
    pub posts: Arc<dyn PageFetcher<Post>>,
    pub users: Arc<dyn PageFetcher<UserCard>>,
    pub notifications: Arc<dyn PageFetcher<Notification>>,
    pub mutator: Arc<dyn Mutator>,
    pub profiles: Arc<dyn ProfileSource>,
}

impl From<ApiClient> for Backend {
    fn from(client: ApiClient) -> Self {
        Self {
            posts: Arc::new(client.clone()),
            users: Arc::new(client.clone()),
            notifications: Arc::new(client.clone()),
            mutator: Arc::new(client.clone()),
            profiles: Arc::new(client),
        }
    }
}

// ============================================================================
// View Enums
// ============================================================================

/// Current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Feed,
    Notifications,
    Search,
    Followers,
    Following,
    /// One user's header plus their posts.
    Profile,
}

impl View {
    /// Views reachable with Tab, in order.
    pub const TABS: [View; 5] = [
        View::Feed,
        View::Notifications,
        View::Search,
        View::Followers,
        View::Following,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::Feed => "Feed",
            View::Notifications => "Notifications",
            View::Search => "Search",
            View::Followers => "Followers",
            View::Following => "Following",
            View::Profile => "Profile",
        }
    }
}

/// Which result list the search view shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFocus {
    Posts,
    Users,
}

/// Selection and scroll offset of one list, in items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListPosition {
    pub selected: usize,
    pub offset: usize,
}

/// Where an optimistic edit was applied, so its reply finds the same target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationScope {
    List(ResourceKind),
    /// The single profile shown above the posts carousel.
    Profile,
}

/// Events from background tasks
pub enum AppEvent {
    PostsLoaded {
        request: PageRequest,
        result: Result<Page<Post>, ApiError>,
    },
    UsersLoaded {
        request: PageRequest,
        result: Result<Page<UserCard>, ApiError>,
    },
    NotificationsLoaded {
        request: PageRequest,
        result: Result<Page<Notification>, ApiError>,
    },
    ProfileLoaded {
        user_id: String,
        result: Result<UserCard, ApiError>,
    },
    MutationResolved {
        scope: MutationScope,
        ticket: MutationTicket,
        result: Result<(), ApiError>,
    },
    /// A background task panicked.
    ///
    /// Fields:
    /// - `task`: name of the task that panicked (e.g., "page_load")
    /// - `error`: the panic message
    TaskPanicked { task: &'static str, error: String },
}

/// State of the profile header.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileState {
    None,
    Loading,
    Ready,
    Error(FeedError),
}

// ============================================================================
// Type-erased list access
// ============================================================================

/// The item-independent part of a controller, so input and rendering code
/// can drive whichever list is active.
pub trait ListHandle {
    fn kind(&self) -> ResourceKind;
    fn len(&self) -> usize;
    fn display_state(&self) -> DisplayState;
    fn error(&self) -> Option<&FeedError>;
    fn on_viewport(&mut self, sample: SentinelSample) -> Option<PageRequest>;
    fn retry(&mut self) -> Option<PageRequest>;
    fn take_notice(&mut self) -> Option<FeedError>;
}

impl<T: Identifiable + Clone + Send + 'static> ListHandle for PaginatedFeedController<T> {
    fn kind(&self) -> ResourceKind {
        PaginatedFeedController::kind(self)
    }

    fn len(&self) -> usize {
        PaginatedFeedController::len(self)
    }

    fn display_state(&self) -> DisplayState {
        PaginatedFeedController::display_state(self)
    }

    fn error(&self) -> Option<&FeedError> {
        match self.state() {
            crate::paging::LoadState::Error(e) => Some(e),
            _ => None,
        }
    }

    fn on_viewport(&mut self, sample: SentinelSample) -> Option<PageRequest> {
        PaginatedFeedController::on_viewport(self, sample)
    }

    fn retry(&mut self) -> Option<PageRequest> {
        PaginatedFeedController::retry(self)
    }

    fn take_notice(&mut self) -> Option<FeedError> {
        PaginatedFeedController::take_notice(self)
    }
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub session: Session,
    backend: Backend,
    pub view: View,
    /// Where Esc returns to from the profile view.
    pub previous_view: View,
    pub search_focus: SearchFocus,
    /// Keystrokes go to the search box.
    pub search_mode: bool,

    pub feed: PaginatedFeedController<Post>,
    pub search_posts: PaginatedFeedController<Post>,
    pub search_users: PaginatedFeedController<UserCard>,
    pub notifications: PaginatedFeedController<Notification>,
    pub followers: PaginatedFeedController<UserCard>,
    pub following: PaginatedFeedController<UserCard>,
    pub user_posts: PaginatedFeedController<Post>,

    /// Profile being viewed, if any. Target of the profile follow toggle.
    pub profile: Option<UserCard>,
    pub profile_id: Option<String>,
    pub profile_state: ProfileState,

    edits: HashMap<MutationScope, OptimisticMutationController>,
    positions: HashMap<ResourceKind, ListPosition>,
    pub debouncer: SearchDebouncer,

    /// Rows available to the active list; set by the renderer.
    pub list_rows: usize,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub needs_redraw: bool,
    pub show_help: bool,
    /// Set once the server rejected our credentials.
    pub session_expired: bool,
}

impl App {
    pub fn new(config: &Config, session: Session, backend: Backend) -> Self {
        let page_size = config.page_size;
        let timeout = config.request_timeout();
        let viewport = config.viewport();
        let posts = |kind| {
            PaginatedFeedController::new(kind, page_size, backend.posts.clone())
                .with_timeout(timeout)
                .with_viewport(viewport)
        };
        let users = |kind| {
            PaginatedFeedController::new(kind, page_size, backend.users.clone())
                .with_timeout(timeout)
                .with_viewport(viewport)
        };

        Self {
            feed: posts(ResourceKind::Feed),
            search_posts: posts(ResourceKind::SearchPosts),
            user_posts: posts(ResourceKind::UserPosts),
            search_users: users(ResourceKind::SearchUsers),
            followers: users(ResourceKind::Followers),
            following: users(ResourceKind::Following),
            notifications: PaginatedFeedController::new(
                ResourceKind::Notifications,
                page_size,
                backend.notifications.clone(),
            )
            .with_timeout(timeout)
            .with_viewport(viewport),
            session,
            backend,
            view: View::Feed,
            previous_view: View::Feed,
            search_focus: SearchFocus::Posts,
            search_mode: false,
            profile: None,
            profile_id: None,
            profile_state: ProfileState::None,
            edits: HashMap::new(),
            positions: HashMap::new(),
            debouncer: SearchDebouncer::new(config.search_debounce()),
            list_rows: 0,
            status_message: None,
            needs_redraw: true,
            show_help: false,
            session_expired: false,
        }
    }

    // ------------------------------------------------------------------------
    // Status line
    // ------------------------------------------------------------------------

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }

    // ------------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------------

    /// Resource shown by the current view.
    pub fn active_kind(&self) -> ResourceKind {
        match self.view {
            View::Feed => ResourceKind::Feed,
            View::Notifications => ResourceKind::Notifications,
            View::Search => match self.search_focus {
                SearchFocus::Posts => ResourceKind::SearchPosts,
                SearchFocus::Users => ResourceKind::SearchUsers,
            },
            View::Followers => ResourceKind::Followers,
            View::Following => ResourceKind::Following,
            View::Profile => ResourceKind::UserPosts,
        }
    }

    pub fn list(&self, kind: ResourceKind) -> &dyn ListHandle {
        match kind {
            ResourceKind::Feed => &self.feed,
            ResourceKind::SearchPosts => &self.search_posts,
            ResourceKind::SearchUsers => &self.search_users,
            ResourceKind::Notifications => &self.notifications,
            ResourceKind::Followers => &self.followers,
            ResourceKind::Following => &self.following,
            ResourceKind::UserPosts => &self.user_posts,
        }
    }

    pub fn list_mut(&mut self, kind: ResourceKind) -> &mut dyn ListHandle {
        match kind {
            ResourceKind::Feed => &mut self.feed,
            ResourceKind::SearchPosts => &mut self.search_posts,
            ResourceKind::SearchUsers => &mut self.search_users,
            ResourceKind::Notifications => &mut self.notifications,
            ResourceKind::Followers => &mut self.followers,
            ResourceKind::Following => &mut self.following,
            ResourceKind::UserPosts => &mut self.user_posts,
        }
    }

    fn posts_mut(&mut self, kind: ResourceKind) -> Option<&mut PaginatedFeedController<Post>> {
        match kind {
            ResourceKind::Feed => Some(&mut self.feed),
            ResourceKind::SearchPosts => Some(&mut self.search_posts),
            ResourceKind::UserPosts => Some(&mut self.user_posts),
            _ => None,
        }
    }

    fn users_mut(&mut self, kind: ResourceKind) -> Option<&mut PaginatedFeedController<UserCard>> {
        match kind {
            ResourceKind::SearchUsers => Some(&mut self.search_users),
            ResourceKind::Followers => Some(&mut self.followers),
            ResourceKind::Following => Some(&mut self.following),
            _ => None,
        }
    }

    pub fn posts_list(&self, kind: ResourceKind) -> Option<&PaginatedFeedController<Post>> {
        match kind {
            ResourceKind::Feed => Some(&self.feed),
            ResourceKind::SearchPosts => Some(&self.search_posts),
            ResourceKind::UserPosts => Some(&self.user_posts),
            _ => None,
        }
    }

    pub fn users_list(&self, kind: ResourceKind) -> Option<&PaginatedFeedController<UserCard>> {
        match kind {
            ResourceKind::SearchUsers => Some(&self.search_users),
            ResourceKind::Followers => Some(&self.followers),
            ResourceKind::Following => Some(&self.following),
            _ => None,
        }
    }

    pub fn position(&self, kind: ResourceKind) -> ListPosition {
        self.positions.get(&kind).copied().unwrap_or_default()
    }

    /// Items that fit in the list area.
    pub fn capacity(&self) -> usize {
        (self.list_rows / ITEM_HEIGHT).max(1)
    }

    /// Move the selection of the active list by `delta` items, scrolling to
    /// keep it on screen.
    pub fn move_selection(&mut self, delta: isize) {
        let kind = self.active_kind();
        let len = self.list(kind).len();
        if len == 0 {
            return;
        }
        let capacity = self.capacity();
        let pos = self.positions.entry(kind).or_default();
        pos.selected = pos
            .selected
            .saturating_add_signed(delta)
            .min(len.saturating_sub(1));
        if pos.selected < pos.offset {
            pos.offset = pos.selected;
        } else if pos.selected >= pos.offset + capacity {
            pos.offset = pos.selected + 1 - capacity;
        }
    }

    pub fn select_first(&mut self) {
        let kind = self.active_kind();
        self.positions.insert(kind, ListPosition::default());
    }

    pub fn select_last(&mut self) {
        self.move_selection(isize::MAX);
    }

    fn clamp_position(&mut self, kind: ResourceKind) {
        let len = self.list(kind).len();
        let capacity = self.capacity();
        if let Some(pos) = self.positions.get_mut(&kind) {
            let max = len.saturating_sub(1);
            pos.selected = pos.selected.min(max);
            pos.offset = pos.offset.min(pos.selected);
            if pos.selected >= pos.offset + capacity {
                pos.offset = pos.selected + 1 - capacity;
            }
        }
    }

    /// Index of the last item row currently on screen.
    pub fn last_visible(&self, kind: ResourceKind) -> usize {
        self.position(kind).offset + self.capacity() - 1
    }

    /// Where the end-of-list sentinel sits for `kind`.
    pub fn sentinel_sample(&self, kind: ResourceKind) -> SentinelSample {
        let list = self.list(kind);
        match list.display_state() {
            DisplayState::List { .. } => {
                SentinelSample::from_list_position(self.last_visible(kind), list.len())
            }
            _ => SentinelSample::Detached,
        }
    }

    /// Report the active list's scroll position to its trigger.
    pub fn observe_viewport(&mut self) -> Option<PageRequest> {
        let kind = self.active_kind();
        let sample = self.sentinel_sample(kind);
        self.list_mut(kind).on_viewport(sample)
    }

    // ------------------------------------------------------------------------
    // Mounting
    // ------------------------------------------------------------------------

    /// Subject of the follower/following lists reached from the tab bar.
    fn own_id(&self) -> String {
        self.session.user_id.clone()
    }

    /// Show `view`, loading its first page when it has not been shown for
    /// the current identity yet.
    pub fn switch_view(&mut self, view: View) -> Vec<PageRequest> {
        self.view = view;
        self.search_mode = false;
        match view {
            View::Feed => self.mount(ResourceKind::Feed, ""),
            View::Notifications => {
                let owner = self.own_id();
                self.mount(ResourceKind::Notifications, &owner)
            }
            View::Search => {
                let query = self.debouncer.text().to_string();
                let mut requests = self.mount(ResourceKind::SearchPosts, &query);
                requests.extend(self.mount(ResourceKind::SearchUsers, &query));
                requests
            }
            View::Followers => {
                let owner = self.own_id();
                self.mount(ResourceKind::Followers, &owner)
            }
            View::Following => {
                let owner = self.own_id();
                self.mount(ResourceKind::Following, &owner)
            }
            View::Profile => match self.profile_id.clone() {
                Some(id) => self.mount(ResourceKind::UserPosts, &id),
                None => Vec::new(),
            },
        }
    }

    /// Followers or following of the viewed profile.
    pub fn open_connections(&mut self, kind: ResourceKind) -> Vec<PageRequest> {
        let Some(subject) = self.profile_id.clone() else {
            return Vec::new();
        };
        self.view = match kind {
            ResourceKind::Following => View::Following,
            _ => View::Followers,
        };
        self.mount(kind, &subject)
    }

    fn mount(&mut self, kind: ResourceKind, identity: &str) -> Vec<PageRequest> {
        let request = match kind {
            ResourceKind::Feed => self.feed.mount(identity),
            ResourceKind::SearchPosts => self.search_posts.mount(identity),
            ResourceKind::SearchUsers => self.search_users.mount(identity),
            ResourceKind::Notifications => self.notifications.mount(identity),
            ResourceKind::Followers => self.followers.mount(identity),
            ResourceKind::Following => self.following.mount(identity),
            ResourceKind::UserPosts => self.user_posts.mount(identity),
        };
        if request.is_some() {
            self.after_reset(kind);
        }
        request.into_iter().collect()
    }

    /// A list was emptied for a new identity: forget its scroll position and
    /// edits that can no longer find their items.
    fn after_reset(&mut self, kind: ResourceKind) {
        self.positions.remove(&kind);
        if let Some(edits) = self.edits.get_mut(&MutationScope::List(kind)) {
            edits.clear();
        }
    }

    /// Open the profile of `user_id`. Returns the carousel's first-page
    /// request; the header is loaded separately via [`Self::profile_future`].
    pub fn open_profile(&mut self, user_id: &str) -> Vec<PageRequest> {
        if self.profile_id.as_deref() != Some(user_id) {
            self.profile_id = Some(user_id.to_string());
            self.profile = None;
            self.profile_state = ProfileState::Loading;
            if let Some(edits) = self.edits.get_mut(&MutationScope::Profile) {
                edits.clear();
            }
        }
        if self.view != View::Profile {
            self.previous_view = self.view;
        }
        self.view = View::Profile;
        self.search_mode = false;
        self.mount(ResourceKind::UserPosts, user_id)
    }

    /// Retry whatever failed in the active view.
    pub fn retry(&mut self) -> Vec<PageRequest> {
        let kind = self.active_kind();
        let request = self.list_mut(kind).retry();
        if request.is_some() && self.list(kind).len() == 0 {
            self.after_reset(kind);
        }
        request.into_iter().collect()
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    pub fn on_search_input(&mut self, text: impl Into<String>) {
        self.debouncer.on_text_change(text);
    }

    /// Issue the debounced query if its quiet period has passed.
    pub fn fire_search(&mut self, now: Instant) -> Vec<PageRequest> {
        let Self {
            debouncer,
            search_posts,
            search_users,
            ..
        } = self;
        let mut deps: [&mut dyn QueryDependent; 2] = [search_posts, search_users];
        let requests = debouncer.fire(now, &mut deps);
        if !requests.is_empty() {
            self.after_search_reset();
        }
        requests
    }

    /// Enter in the search box: issue now.
    pub fn submit_search(&mut self) -> Vec<PageRequest> {
        let Self {
            debouncer,
            search_posts,
            search_users,
            ..
        } = self;
        let mut deps: [&mut dyn QueryDependent; 2] = [search_posts, search_users];
        let requests = debouncer.flush(&mut deps);
        self.after_search_reset();
        requests
    }

    /// Query handed in from outside (command line): load without waiting.
    pub fn seed_search(&mut self, query: &str) -> Vec<PageRequest> {
        let Self {
            debouncer,
            search_posts,
            search_users,
            ..
        } = self;
        let mut deps: [&mut dyn QueryDependent; 2] = [search_posts, search_users];
        let requests = debouncer.seed(query, &mut deps);
        self.after_search_reset();
        self.view = View::Search;
        requests
    }

    fn after_search_reset(&mut self) {
        self.after_reset(ResourceKind::SearchPosts);
        self.after_reset(ResourceKind::SearchUsers);
    }

    // ------------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------------

    /// Future that performs `request` and yields the event to apply.
    pub fn page_future(&self, request: PageRequest) -> BoxFuture<'static, AppEvent> {
        match request.kind {
            ResourceKind::Feed => posts_event(self.feed.dispatch(&request), request),
            ResourceKind::SearchPosts => posts_event(self.search_posts.dispatch(&request), request),
            ResourceKind::UserPosts => posts_event(self.user_posts.dispatch(&request), request),
            ResourceKind::SearchUsers => users_event(self.search_users.dispatch(&request), request),
            ResourceKind::Followers => users_event(self.followers.dispatch(&request), request),
            ResourceKind::Following => users_event(self.following.dispatch(&request), request),
            ResourceKind::Notifications => {
                let fut = self.notifications.dispatch(&request);
                async move {
                    AppEvent::NotificationsLoaded {
                        result: fut.await,
                        request,
                    }
                }
                .boxed()
            }
        }
    }

    pub fn profile_future(&self, user_id: &str) -> BoxFuture<'static, AppEvent> {
        let fut = self.backend.profiles.load_profile(user_id);
        let user_id = user_id.to_string();
        async move {
            AppEvent::ProfileLoaded {
                result: fut.await,
                user_id,
            }
        }
        .boxed()
    }

    pub fn mutation_future(
        &self,
        scope: MutationScope,
        ticket: MutationTicket,
    ) -> BoxFuture<'static, AppEvent> {
        let fut = self.backend.mutator.perform(&ticket.action);
        async move {
            AppEvent::MutationResolved {
                result: fut.await,
                scope,
                ticket,
            }
        }
        .boxed()
    }

    pub fn apply_posts(
        &mut self,
        request: &PageRequest,
        result: Result<Page<Post>, ApiError>,
    ) -> ApplyOutcome {
        let outcome = match self.posts_mut(request.kind) {
            Some(list) => list.apply(request, result),
            None => ApplyOutcome::Stale,
        };
        self.clamp_position(request.kind);
        outcome
    }

    pub fn apply_users(
        &mut self,
        request: &PageRequest,
        result: Result<Page<UserCard>, ApiError>,
    ) -> ApplyOutcome {
        let outcome = match self.users_mut(request.kind) {
            Some(list) => list.apply(request, result),
            None => ApplyOutcome::Stale,
        };
        self.clamp_position(request.kind);
        outcome
    }

    pub fn apply_notifications(
        &mut self,
        request: &PageRequest,
        result: Result<Page<Notification>, ApiError>,
    ) -> ApplyOutcome {
        let outcome = self.notifications.apply(request, result);
        self.clamp_position(ResourceKind::Notifications);
        outcome
    }

    /// Install a loaded profile header. Returns `false` for a reply to a
    /// profile that is no longer open.
    pub fn apply_profile(&mut self, user_id: &str, result: Result<UserCard, ApiError>) -> bool {
        if self.profile_id.as_deref() != Some(user_id) {
            tracing::debug!(user_id, "discarding stale profile response");
            return false;
        }
        match result {
            Ok(profile) => {
                self.profile = Some(profile);
                self.profile_state = ProfileState::Ready;
            }
            Err(err) => {
                tracing::warn!(user_id, error = %err, "profile load failed");
                self.profile_state = ProfileState::Error(FeedError::from(&err));
            }
        }
        true
    }

    // ------------------------------------------------------------------------
    // Optimistic edits
    // ------------------------------------------------------------------------

    fn edit_parts(
        &mut self,
        scope: MutationScope,
    ) -> (&mut OptimisticMutationController, &mut dyn ToggleTarget) {
        let edits = self.edits.entry(scope).or_default();
        let target: &mut dyn ToggleTarget = match scope {
            MutationScope::Profile => &mut self.profile,
            MutationScope::List(ResourceKind::Feed) => &mut self.feed,
            MutationScope::List(ResourceKind::SearchPosts) => &mut self.search_posts,
            MutationScope::List(ResourceKind::UserPosts) => &mut self.user_posts,
            MutationScope::List(ResourceKind::SearchUsers) => &mut self.search_users,
            MutationScope::List(ResourceKind::Followers) => &mut self.followers,
            MutationScope::List(ResourceKind::Following) => &mut self.following,
            MutationScope::List(ResourceKind::Notifications) => &mut self.notifications,
        };
        (edits, target)
    }

    pub fn toggle(
        &mut self,
        scope: MutationScope,
        subject: MutationSubject,
        field: ToggleField,
    ) -> Option<MutationTicket> {
        let (edits, target) = self.edit_parts(scope);
        edits.toggle(target, subject, field)
    }

    pub fn set_field(
        &mut self,
        scope: MutationScope,
        subject: MutationSubject,
        field: ToggleField,
        value: bool,
    ) -> Option<MutationTicket> {
        let (edits, target) = self.edit_parts(scope);
        edits.set(target, subject, field, value)
    }

    pub fn resolve(
        &mut self,
        scope: MutationScope,
        ticket: &MutationTicket,
        result: Result<(), ApiError>,
    ) -> Resolution {
        let (edits, target) = self.edit_parts(scope);
        edits.resolve(ticket, result, target)
    }

    pub fn is_pending(&self, scope: MutationScope, id: &str, field: ToggleField) -> bool {
        self.edits
            .get(&scope)
            .is_some_and(|edits| edits.is_pending(id, field))
    }

    /// Selected post of the active list, if it lists posts.
    pub fn selected_post(&self) -> Option<&Post> {
        let kind = self.active_kind();
        self.posts_list(kind)?.items().get(self.position(kind).selected)
    }

    pub fn selected_user(&self) -> Option<&UserCard> {
        let kind = self.active_kind();
        self.users_list(kind)?.items().get(self.position(kind).selected)
    }

    pub fn selected_notification(&self) -> Option<&Notification> {
        if self.active_kind() != ResourceKind::Notifications {
            return None;
        }
        let pos = self.position(ResourceKind::Notifications);
        self.notifications.items().get(pos.selected)
    }

    /// Like or unlike the selected post.
    pub fn toggle_like_selected(&mut self) -> Option<(MutationScope, MutationTicket)> {
        let id = self.selected_post()?.id.clone();
        let scope = MutationScope::List(self.active_kind());
        let ticket = self.toggle(scope, MutationSubject::new(id), ToggleField::Liked)?;
        Some((scope, ticket))
    }

    /// Follow or unfollow the selected user, or the open profile.
    pub fn toggle_follow_selected(&mut self) -> Option<(MutationScope, MutationTicket)> {
        let (scope, id) = if self.view == View::Profile {
            (MutationScope::Profile, self.profile.as_ref()?.id.clone())
        } else {
            let id = self.selected_user()?.id.clone();
            (MutationScope::List(self.active_kind()), id)
        };
        if id == self.session.user_id {
            self.set_status("You can't follow yourself");
            return None;
        }
        let ticket = self.toggle(scope, MutationSubject::new(id), ToggleField::Following)?;
        Some((scope, ticket))
    }

    /// Accept the selected follow request.
    pub fn accept_selected(&mut self) -> Option<(MutationScope, MutationTicket)> {
        let notification = self.selected_notification()?;
        if notification.kind != NotificationKind::Request {
            return None;
        }
        let subject =
            MutationSubject::with_related(notification.id.clone(), notification.from_user.clone());
        let scope = MutationScope::List(ResourceKind::Notifications);
        let ticket = self.set_field(scope, subject, ToggleField::Accepted, true)?;
        Some((scope, ticket))
    }

    /// Mark every unread notification on screen as read.
    pub fn mark_visible_read(&mut self) -> Vec<(MutationScope, MutationTicket)> {
        if self.view != View::Notifications {
            return Vec::new();
        }
        let pos = self.position(ResourceKind::Notifications);
        let owner = self.session.user_id.clone();
        let unread: Vec<MutationSubject> = self
            .notifications
            .items()
            .iter()
            .skip(pos.offset)
            .take(self.capacity())
            .filter(|n| !n.read)
            .map(|n| {
                let recipient = if n.recipient.is_empty() {
                    owner.clone()
                } else {
                    n.recipient.clone()
                };
                MutationSubject::with_related(n.id.clone(), recipient)
            })
            .collect();

        let scope = MutationScope::List(ResourceKind::Notifications);
        unread
            .into_iter()
            .filter_map(|subject| self.set_field(scope, subject, ToggleField::Read, true))
            .map(|ticket| (scope, ticket))
            .collect()
    }

    /// User id behind the selection: the user itself, a post's author, or a
    /// notification's sender.
    pub fn selected_profile_target(&self) -> Option<String> {
        if let Some(user) = self.selected_user() {
            return Some(user.id.clone());
        }
        if let Some(post) = self.selected_post() {
            return Some(post.user_id.clone()).filter(|id| !id.is_empty());
        }
        self.selected_notification()
            .map(|n| n.from_user.clone())
            .filter(|id| !id.is_empty())
    }
}

fn posts_event(
    fut: BoxFuture<'static, Result<Page<Post>, ApiError>>,
    request: PageRequest,
) -> BoxFuture<'static, AppEvent> {
    async move {
        AppEvent::PostsLoaded {
            result: fut.await,
            request,
        }
    }
    .boxed()
}

fn users_event(
    fut: BoxFuture<'static, Result<Page<UserCard>, ApiError>>,
    request: PageRequest,
) -> BoxFuture<'static, AppEvent> {
    async move {
        AppEvent::UsersLoaded {
            result: fut.await,
            request,
        }
    }
    .boxed()
}
