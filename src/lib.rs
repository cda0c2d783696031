//! jotter: infinite-scroll paging engine and terminal client for a
//! journaling and social-posting service.
//!
//! The engine lives in [`paging`] and is independent of both the network
//! ([`api`]) and the terminal ([`ui`]); [`app`] wires them together.

pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod paging;
pub mod ui;
pub mod util;
