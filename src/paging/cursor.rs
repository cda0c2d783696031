use thiserror::Error;

/// Why a next-page request was refused. Both cases leave the cursor unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CursorError {
    /// A fetch for this cursor is still outstanding.
    #[error("a page request is already in flight")]
    AlreadyInFlight,
    /// The backend reported no further pages.
    #[error("no more pages")]
    Exhausted,
}

/// Pagination position for one resource stream.
///
/// `page` is the last page successfully applied (0 before the first load).
/// At most one request is outstanding at a time; `has_more == false` is
/// terminal until [`PageCursor::reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    page: u32,
    has_more: bool,
    page_size: u32,
    in_flight: bool,
}

impl PageCursor {
    /// Create a fresh cursor. A zero page size is bumped to 1.
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 0,
            has_more: true,
            page_size: page_size.max(1),
            in_flight: false,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Claim the next page number.
    ///
    /// On success the cursor is marked in flight and the caller owns the
    /// obligation to call [`PageCursor::complete`] exactly once.
    pub fn request_next_page(&mut self) -> Result<u32, CursorError> {
        if self.in_flight {
            return Err(CursorError::AlreadyInFlight);
        }
        if !self.has_more {
            return Err(CursorError::Exhausted);
        }
        self.in_flight = true;
        Ok(self.page.saturating_add(1))
    }

    /// Finish the outstanding request.
    ///
    /// A failed request leaves `page` and `has_more` untouched so a retry asks
    /// for the same page number again.
    pub fn complete(&mut self, success: bool, new_has_more: bool) {
        if !self.in_flight {
            tracing::debug!(page = self.page, "complete() without an outstanding request");
        }
        self.in_flight = false;
        if success {
            self.page = self.page.saturating_add(1);
            self.has_more = new_has_more;
        }
    }

    /// Return to the initial position. The next request will be for page 1.
    pub fn reset(&mut self) {
        self.page = 0;
        self.has_more = true;
        self.in_flight = false;
    }
}
