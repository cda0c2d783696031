//! Paginated infinite-scroll engine.
//!
//! [`PaginatedFeedController`] ties together a [`PageCursor`], an
//! [`IncrementalListStore`] and a [`ViewportTrigger`] for one resource.
//! [`OptimisticMutationController`] edits loaded items in place and
//! [`SearchDebouncer`] resets query-driven controllers after typing pauses.
//!
//! Nothing in here touches the network or the terminal directly: fetchers
//! and mutators are injected, and viewport samples come from the caller.

mod controller;
mod cursor;
mod debounce;
mod optimistic;
mod store;
mod viewport;

pub use controller::{
    ApplyOutcome, DisplayState, FeedError, LoadMoreError, LoadState, PageFetcher, PageRequest,
    PaginatedFeedController, QueryDependent,
};
pub use cursor::{CursorError, PageCursor};
pub use debounce::SearchDebouncer;
pub use optimistic::{
    EditStatus, MutationTicket, Mutator, OptimisticEdit, OptimisticMutationController,
    Resolution, ToggleTarget,
};
pub use store::IncrementalListStore;
pub use viewport::{Hold, LoadGate, SentinelSample, ViewportConfig, ViewportTrigger};
