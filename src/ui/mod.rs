//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `events` - Background task event processing
//! - `render` - Layout and view dispatch
//! - `lists` - Paginated list panel
//! - `helpers` - Background task spawning
//! - `status` - Status bar widget
//! - `help` - Keybinding overlay

mod events;
mod help;
mod helpers;
mod input;
mod lists;
mod loop_runner;
mod render;
mod status;

pub use loop_runner::{run, Action};
