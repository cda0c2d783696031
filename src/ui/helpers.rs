//! Background task spawning shared by input, tick and event handling.
//!
//! Every task runs under [`catch_task_panic`] and reports back through the
//! `AppEvent` channel; state is only ever mutated on the event loop.

use crate::app::{App, AppEvent, MutationScope};
use crate::paging::{MutationTicket, PageRequest};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;

/// Wraps a future to catch panics and convert them to errors.
///
/// Instead of the task silently disappearing (caught by Tokio's runtime but
/// not handled), panics are converted to `Err(String)` containing the panic
/// message.
///
/// # Returns
///
/// - `Ok(result)` if the future completes normally
/// - `Err(panic_message)` if the future panics
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else if let Some(e) = panic.downcast_ref::<Box<dyn std::error::Error + Send>>() {
                e.to_string()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Run `work` in the background and deliver its event.
fn spawn_event(task: &'static str, work: BoxFuture<'static, AppEvent>, tx: &mpsc::Sender<AppEvent>) {
    let tx = tx.clone();
    tokio::spawn(async move {
        let event = match catch_task_panic(work).await {
            Ok(event) => event,
            Err(panic_msg) => {
                tracing::error!(task, error = %panic_msg, "Background task panicked");
                AppEvent::TaskPanicked {
                    task,
                    error: panic_msg,
                }
            }
        };
        if tx.send(event).await.is_err() {
            tracing::warn!(task, "Channel send failed (receiver dropped)");
        }
    });
}

/// Spawn one fetch per request. Replies come back as `*Loaded` events and
/// are checked for staleness when applied.
pub(super) fn spawn_page_loads(
    app: &App,
    requests: impl IntoIterator<Item = PageRequest>,
    tx: &mpsc::Sender<AppEvent>,
) {
    for request in requests {
        tracing::debug!(
            kind = %request.kind,
            page = request.page,
            generation = request.generation,
            "spawning page load"
        );
        spawn_event("page_load", app.page_future(request), tx);
    }
}

pub(super) fn spawn_mutations(
    app: &App,
    tickets: impl IntoIterator<Item = (MutationScope, MutationTicket)>,
    tx: &mpsc::Sender<AppEvent>,
) {
    for (scope, ticket) in tickets {
        tracing::debug!(
            item_id = %ticket.item_id,
            action = ticket.action.name(),
            "spawning mutation"
        );
        spawn_event("mutation", app.mutation_future(scope, ticket), tx);
    }
}

pub(super) fn spawn_profile_load(app: &App, user_id: &str, tx: &mpsc::Sender<AppEvent>) {
    spawn_event("profile_load", app.profile_future(user_id), tx);
}
