//! Optimistic toggles with rollback.
//!
//! A toggle is applied locally before the request is sent. Per item and
//! field at most one request is in flight; further taps while it is pending
//! only move the desired value, and once the reply lands a follow-up request
//! is issued if the desired value still differs from what the server
//! confirmed. A failure rolls back only when no newer contrary intent exists.

use super::controller::PaginatedFeedController;
use super::store::IncrementalListStore;
use crate::api::ApiError;
use crate::model::{Identifiable, MutationAction, MutationSubject, ToggleField, Toggleable};
use futures::future::BoxFuture;
use std::collections::HashMap;

/// Performs one mutation request. The reply body is never needed.
pub trait Mutator: Send + Sync {
    fn perform(&self, action: &MutationAction) -> BoxFuture<'static, Result<(), ApiError>>;
}

impl<F> Mutator for F
where
    F: Fn(&MutationAction) -> BoxFuture<'static, Result<(), ApiError>> + Send + Sync,
{
    fn perform(&self, action: &MutationAction) -> BoxFuture<'static, Result<(), ApiError>> {
        self(action)
    }
}

/// Anything holding toggleable items addressable by id.
pub trait ToggleTarget {
    fn current(&self, id: &str, field: ToggleField) -> Option<bool>;
    /// Set the field locally. Returns `false` when the item is gone.
    fn apply(&mut self, id: &str, field: ToggleField, value: bool) -> bool;
}

impl<T: Identifiable + Toggleable + Clone> ToggleTarget for IncrementalListStore<T> {
    fn current(&self, id: &str, field: ToggleField) -> Option<bool> {
        self.get(id)?.toggle(field)
    }

    fn apply(&mut self, id: &str, field: ToggleField, value: bool) -> bool {
        let mut applied = false;
        self.update_by_id(id, |item| applied = item.set_toggle(field, value));
        applied
    }
}

impl<T> ToggleTarget for PaginatedFeedController<T>
where
    T: Identifiable + Toggleable + Clone + Send + 'static,
{
    fn current(&self, id: &str, field: ToggleField) -> Option<bool> {
        self.get(id)?.toggle(field)
    }

    fn apply(&mut self, id: &str, field: ToggleField, value: bool) -> bool {
        let mut applied = false;
        self.update_item(id, |item| applied = item.set_toggle(field, value));
        applied
    }
}

/// A single loaded entity outside any list, e.g. the profile being viewed.
impl<T: Identifiable + Toggleable> ToggleTarget for Option<T> {
    fn current(&self, id: &str, field: ToggleField) -> Option<bool> {
        self.as_ref().filter(|item| item.id() == id)?.toggle(field)
    }

    fn apply(&mut self, id: &str, field: ToggleField, value: bool) -> bool {
        match self.as_mut() {
            Some(item) if item.id() == id => item.set_toggle(field, value),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStatus {
    Pending,
    Committed,
    RolledBack,
}

/// Record of one optimistic change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticEdit {
    pub item_id: String,
    pub field: ToggleField,
    pub previous: bool,
    pub new: bool,
    pub status: EditStatus,
}

/// Proof that a request was issued. Hand it back to
/// [`OptimisticMutationController::resolve`] with the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTicket {
    pub item_id: String,
    pub field: ToggleField,
    pub value: bool,
    pub action: MutationAction,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Committed(OptimisticEdit),
    /// The failed value was still the user's intent; local state restored.
    RolledBack {
        edit: OptimisticEdit,
        message: String,
    },
    /// Server now holds an outdated value; send this next.
    FollowUp(MutationTicket),
    /// Failed, but the user had already toggled back; nothing to restore.
    Superseded,
    /// Ticket no longer matches any pending edit.
    Stale,
}

#[derive(Debug, Clone)]
struct Entry {
    subject: MutationSubject,
    /// Last value known to match the server.
    confirmed: bool,
    /// Latest local intent.
    desired: bool,
    in_flight: bool,
    seq: u64,
}

/// Tracks pending toggles for one [`ToggleTarget`].
#[derive(Debug, Default)]
pub struct OptimisticMutationController {
    entries: HashMap<(String, ToggleField), Entry>,
    next_seq: u64,
}

impl OptimisticMutationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, id: &str, field: ToggleField) -> bool {
        self.entries.contains_key(&(id.to_string(), field))
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Current edits that have not settled yet.
    pub fn pending_edits(&self) -> Vec<OptimisticEdit> {
        self.entries
            .iter()
            .map(|((id, field), e)| OptimisticEdit {
                item_id: id.clone(),
                field: *field,
                previous: e.confirmed,
                new: e.desired,
                status: EditStatus::Pending,
            })
            .collect()
    }

    /// Drop all bookkeeping, e.g. after the target list was reset.
    /// Replies for dropped edits resolve as [`Resolution::Stale`].
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Flip the field's current local value.
    pub fn toggle<G: ToggleTarget + ?Sized>(
        &mut self,
        target: &mut G,
        subject: MutationSubject,
        field: ToggleField,
    ) -> Option<MutationTicket> {
        let current = target.current(&subject.item_id, field)?;
        self.set(target, subject, field, !current)
    }

    /// Move the field to `desired`, applying it locally at once.
    ///
    /// Returns a ticket when a request must be sent now. `None` means the
    /// intent was recorded against a request already in flight, the value
    /// already matched, or the item is not loaded.
    pub fn set<G: ToggleTarget + ?Sized>(
        &mut self,
        target: &mut G,
        subject: MutationSubject,
        field: ToggleField,
        desired: bool,
    ) -> Option<MutationTicket> {
        let Some(current) = target.current(&subject.item_id, field) else {
            tracing::debug!(id = %subject.item_id, %field, "toggle on item that is not loaded");
            return None;
        };
        let key = (subject.item_id.clone(), field);
        let entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            subject: subject.clone(),
            confirmed: current,
            desired: current,
            in_flight: false,
            seq: 0,
        });

        entry.desired = desired;
        target.apply(&subject.item_id, field, desired);

        if entry.in_flight {
            tracing::debug!(id = %subject.item_id, %field, desired, "coalesced into pending request");
            return None;
        }
        if desired == entry.confirmed {
            self.entries.remove(&key);
            return None;
        }

        let confirmed = entry.confirmed;
        match Self::issue(&mut self.next_seq, entry, field) {
            Some(ticket) => Some(ticket),
            None => {
                // One-way field asked to go backwards: nothing to send.
                target.apply(&subject.item_id, field, confirmed);
                self.entries.remove(&key);
                None
            }
        }
    }

    /// Settle a request.
    pub fn resolve<G: ToggleTarget + ?Sized>(
        &mut self,
        ticket: &MutationTicket,
        result: Result<(), ApiError>,
        target: &mut G,
    ) -> Resolution {
        let key = (ticket.item_id.clone(), ticket.field);
        let Some(entry) = self.entries.get_mut(&key) else {
            return Resolution::Stale;
        };
        if entry.seq != ticket.seq || !entry.in_flight {
            return Resolution::Stale;
        }
        entry.in_flight = false;

        match result {
            Ok(()) => {
                let previous = entry.confirmed;
                entry.confirmed = ticket.value;
                if entry.desired != entry.confirmed {
                    tracing::debug!(
                        id = %ticket.item_id,
                        field = %ticket.field,
                        desired = entry.desired,
                        "intent changed while in flight, sending follow-up"
                    );
                    if let Some(next) = Self::issue(&mut self.next_seq, entry, ticket.field) {
                        return Resolution::FollowUp(next);
                    }
                    // No endpoint for the reverse direction; keep what the server has.
                    target.apply(&ticket.item_id, ticket.field, ticket.value);
                }
                self.entries.remove(&key);
                Resolution::Committed(OptimisticEdit {
                    item_id: ticket.item_id.clone(),
                    field: ticket.field,
                    previous,
                    new: ticket.value,
                    status: EditStatus::Committed,
                })
            }
            Err(err) => {
                let confirmed = entry.confirmed;
                let desired = entry.desired;
                self.entries.remove(&key);
                if desired != ticket.value {
                    // User already went back to the confirmed value.
                    return Resolution::Superseded;
                }
                target.apply(&ticket.item_id, ticket.field, confirmed);
                tracing::warn!(
                    id = %ticket.item_id,
                    action = ticket.action.name(),
                    error = %err,
                    "mutation failed, rolled back"
                );
                Resolution::RolledBack {
                    edit: OptimisticEdit {
                        item_id: ticket.item_id.clone(),
                        field: ticket.field,
                        previous: confirmed,
                        new: ticket.value,
                        status: EditStatus::RolledBack,
                    },
                    message: rollback_message(&ticket.action, &err),
                }
            }
        }
    }

    fn issue(next_seq: &mut u64, entry: &mut Entry, field: ToggleField) -> Option<MutationTicket> {
        let action = MutationAction::for_toggle(field, &entry.subject, entry.desired)?;
        *next_seq = next_seq.wrapping_add(1);
        entry.seq = *next_seq;
        entry.in_flight = true;
        Some(MutationTicket {
            item_id: entry.subject.item_id.clone(),
            field,
            value: entry.desired,
            action,
            seq: entry.seq,
        })
    }
}

fn rollback_message(action: &MutationAction, err: &ApiError) -> String {
    let what = match action {
        MutationAction::Like { .. } => "like post",
        MutationAction::Unlike { .. } => "unlike post",
        MutationAction::Follow { .. } => "follow user",
        MutationAction::Unfollow { .. } => "unfollow user",
        MutationAction::MarkRead { .. } => "mark notification read",
        MutationAction::AcceptFollower { .. } => "accept follow request",
    };
    format!("Failed to {}: {}", what, err)
}
