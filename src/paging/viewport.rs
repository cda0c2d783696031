//! Sentinel visibility → "load more" signal.
//!
//! The trigger does not know about the DOM, a terminal, or a button. Any
//! environment that can report where the end-of-list sentinel sits relative to
//! the viewport feeds it [`SentinelSample`]s; the trigger decides when that
//! amounts to one load-more request.

use super::cursor::PageCursor;

/// Default fraction of the sentinel that must be visible.
pub const DEFAULT_THRESHOLD: f32 = 0.5;
/// Default distance before the viewport edge at which loading starts.
pub const DEFAULT_MARGIN: u32 = 100;

/// Intersection tuning. `margin` uses whatever unit the reporting
/// environment measures distance in (pixels, terminal rows).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    pub threshold: f32,
    pub margin: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            margin: DEFAULT_MARGIN,
        }
    }
}

impl ViewportConfig {
    pub fn new(threshold: f32, margin: u32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            margin,
        }
    }
}

/// One observation of the sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SentinelSample {
    /// Sentinel is not rendered (list unmounted or re-rendering).
    Detached,
    /// Sentinel is below the viewport by `distance` units.
    Offscreen { distance: u32 },
    /// Sentinel is inside the viewport; `ratio` of it is visible.
    Visible { ratio: f32 },
}

impl SentinelSample {
    /// Derive a sample from a scrolled list: the sentinel sits one row past
    /// the last item.
    ///
    /// `last_visible` is the index of the last row on screen.
    pub fn from_list_position(last_visible: usize, len: usize) -> Self {
        let sentinel_row = len;
        if last_visible >= sentinel_row {
            SentinelSample::Visible { ratio: 1.0 }
        } else {
            let distance = sentinel_row - last_visible;
            SentinelSample::Offscreen {
                distance: u32::try_from(distance).unwrap_or(u32::MAX),
            }
        }
    }
}

/// Snapshot of the cursor state the trigger gates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadGate {
    pub in_flight: bool,
    pub has_more: bool,
}

impl LoadGate {
    pub fn is_open(&self) -> bool {
        !self.in_flight && self.has_more
    }
}

impl From<&PageCursor> for LoadGate {
    fn from(cursor: &PageCursor) -> Self {
        Self {
            in_flight: cursor.in_flight(),
            has_more: cursor.has_more(),
        }
    }
}

/// Edge-triggered load-more detector.
///
/// Fires once per visibility event: after firing it stays quiet until the
/// sentinel leaves the trigger zone, is detached, or the gated fetch
/// finishes. Observation is suspended while the gate is closed, and
/// resuming it counts as a fresh observation, so a sentinel that is still on
/// screen after a page lands fires again. Samples taken while a fetch is
/// outstanding are dropped, never queued.
///
/// After a failed fetch the owner puts the trigger on [`Hold`]; a held
/// trigger never fires on its own, whatever the gate does.
#[derive(Debug, Clone)]
pub struct ViewportTrigger {
    config: ViewportConfig,
    armed: bool,
    attached: bool,
    hold: Hold,
}

/// How a held trigger is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    Free,
    /// Released when the sentinel leaves the zone or detaches.
    UntilLeave,
    /// Released only by [`ViewportTrigger::rearm`].
    UntilRearm,
}

impl Default for ViewportTrigger {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportTrigger {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            armed: true,
            attached: false,
            hold: Hold::Free,
        }
    }

    pub fn config(&self) -> ViewportConfig {
        self.config
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn hold(&self) -> Hold {
        self.hold
    }

    /// Whether `sample` counts as intersecting under this config.
    pub fn intersects(&self, sample: SentinelSample) -> bool {
        match sample {
            SentinelSample::Detached => false,
            SentinelSample::Offscreen { distance } => distance <= self.config.margin,
            SentinelSample::Visible { ratio } => ratio >= self.config.threshold,
        }
    }

    /// Feed one observation; returns `true` when the caller should request
    /// the next page now.
    pub fn observe(&mut self, sample: SentinelSample, gate: LoadGate) -> bool {
        if matches!(sample, SentinelSample::Detached) {
            if self.attached {
                tracing::trace!("sentinel detached");
            }
            self.attached = false;
            self.release_on_leave();
            return false;
        }
        self.attached = true;

        if !gate.is_open() {
            // Suspended: the next open-gate observation is a new event.
            if self.hold == Hold::Free {
                self.armed = true;
            }
            return false;
        }

        if !self.intersects(sample) {
            self.release_on_leave();
            return false;
        }

        if self.armed && self.hold == Hold::Free {
            self.armed = false;
            tracing::debug!(?sample, "sentinel entered trigger zone");
            return true;
        }
        false
    }

    /// Forget any pending state, e.g. after the owning list was reset or a
    /// fetch landed. Clears any hold.
    pub fn rearm(&mut self) {
        self.hold = Hold::Free;
        self.armed = true;
    }

    /// Stop firing until `hold` is released.
    pub fn suspend(&mut self, hold: Hold) {
        if hold != Hold::Free {
            tracing::debug!(?hold, "viewport trigger suspended");
        }
        self.hold = hold;
        self.armed = false;
    }

    fn release_on_leave(&mut self) {
        if self.hold == Hold::UntilLeave {
            self.hold = Hold::Free;
        }
        self.armed = true;
    }
}
