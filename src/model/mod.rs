//! Data types shared by the paging engine, the HTTP client and the UI.
//!
//! Wire types mirror the backend's JSON (Mongo-style `_id` keys). The traits
//! [`Identifiable`] and [`Toggleable`] are the only shape the engine relies on.

mod types;

pub use types::{
    Identifiable, MutationAction, MutationSubject, Notification, NotificationKind, Page, Post,
    ResourceKind, ToggleField, Toggleable, UserCard,
};
