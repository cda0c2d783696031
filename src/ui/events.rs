//! Background task event processing.
//!
//! Applies page, profile and mutation results to the app and turns their
//! consequences (advisory notices, follow-up requests, rollbacks) into
//! status messages or new background work.

use crate::app::{App, AppEvent, MutationScope};
use crate::model::ResourceKind;
use crate::paging::{ApplyOutcome, Resolution};
use tokio::sync::mpsc;

use super::helpers::{spawn_mutations, spawn_page_loads};

/// Handle events from background tasks.
pub(super) fn handle_app_event(app: &mut App, event: AppEvent, event_tx: &mpsc::Sender<AppEvent>) {
    match event {
        AppEvent::PostsLoaded { request, result } => {
            let outcome = app.apply_posts(&request, result);
            handle_outcome(app, request.kind, outcome, event_tx);
        }
        AppEvent::UsersLoaded { request, result } => {
            let outcome = app.apply_users(&request, result);
            handle_outcome(app, request.kind, outcome, event_tx);
        }
        AppEvent::NotificationsLoaded { request, result } => {
            let outcome = app.apply_notifications(&request, result);
            handle_outcome(app, request.kind, outcome, event_tx);
        }
        AppEvent::ProfileLoaded { user_id, result } => {
            let auth = matches!(&result, Err(e) if e.class() == crate::api::ErrorClass::Auth);
            if app.apply_profile(&user_id, result) && auth {
                session_expired(app);
            }
        }
        AppEvent::MutationResolved {
            scope,
            ticket,
            result,
        } => {
            let auth = matches!(&result, Err(e) if e.class() == crate::api::ErrorClass::Auth);
            let resolution = app.resolve(scope, &ticket, result);
            handle_resolution(app, scope, resolution, event_tx);
            if auth {
                session_expired(app);
            }
        }
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task, error = %error, "Background task panicked");
            app.set_status(format!("Internal error in {} task", task));
        }
    }
    app.needs_redraw = true;
}

fn handle_outcome(
    app: &mut App,
    kind: ResourceKind,
    outcome: ApplyOutcome,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    if outcome.requires_auth() {
        session_expired(app);
        return;
    }
    match outcome {
        ApplyOutcome::Applied { .. } => {
            // A short page can leave the sentinel on screen; look again.
            if kind == app.active_kind() {
                if let Some(request) = app.observe_viewport() {
                    spawn_page_loads(app, [request], event_tx);
                }
                let reads = app.mark_visible_read();
                spawn_mutations(app, reads, event_tx);
            }
        }
        ApplyOutcome::Failed { page, error } if page > 1 => {
            // Advisory only; the list stays as it was.
            app.list_mut(kind).take_notice();
            app.set_status(format!(
                "Couldn't load more {}: {} (r to retry)",
                kind.label().to_lowercase(),
                error.message
            ));
        }
        ApplyOutcome::Failed { .. } | ApplyOutcome::Stale => {}
    }
}

fn handle_resolution(
    app: &mut App,
    scope: MutationScope,
    resolution: Resolution,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    match resolution {
        Resolution::Committed(edit) => {
            tracing::debug!(item_id = %edit.item_id, field = %edit.field, value = edit.new, "edit committed");
        }
        Resolution::RolledBack { edit, message } => {
            tracing::debug!(item_id = %edit.item_id, field = %edit.field, "edit rolled back");
            app.set_status(format!("{} - reverted", message));
        }
        Resolution::FollowUp(ticket) => {
            spawn_mutations(app, [(scope, ticket)], event_tx);
        }
        Resolution::Superseded | Resolution::Stale => {}
    }
}

fn session_expired(app: &mut App) {
    if !app.session_expired {
        tracing::warn!("server rejected credentials");
    }
    app.session_expired = true;
    app.set_status("Session expired - set JOTTER_TOKEN or api_token and restart");
}
