//! Backend HTTP collaborator.
//!
//! [`ApiClient`] implements the paging engine's [`PageFetcher`] and
//! [`Mutator`] seams on top of the journal backend's REST endpoints.
//!
//! [`PageFetcher`]: crate::paging::PageFetcher
//! [`Mutator`]: crate::paging::Mutator

mod client;
mod error;

pub use client::{fetch_batch, ApiClient, Connection, Session, DEFAULT_TIMEOUT};
pub use error::{ApiError, ErrorClass};
