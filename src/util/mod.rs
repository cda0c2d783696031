//! Text and time helpers for rendering server-supplied data in a terminal.
//!
//! ```
//! use jotter::util::{content_preview, truncate_to_width};
//!
//! let preview = content_preview("<p>Hello <b>world</b></p>", 40);
//! assert_eq!(preview, "Hello world");
//! assert_eq!(truncate_to_width("Long journal title", 10), "Long jo...");
//! ```

mod text;
mod time;

pub use text::{content_preview, display_width, sanitize, truncate_to_width};
pub use time::relative_time;

/// Maximum search query length accepted from the input line.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 256;
