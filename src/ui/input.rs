//! Keyboard input handling.

use crate::app::{App, AppEvent, ProfileState, SearchFocus, View};
use crate::model::ResourceKind;
use crate::util::MAX_SEARCH_QUERY_LENGTH;
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::helpers::{spawn_mutations, spawn_page_loads, spawn_profile_load};
use super::loop_runner::Action;

/// Handle a key press in the current mode.
pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        return Action::Quit;
    }

    if app.show_help {
        if matches!(code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return Action::Continue;
    }

    if app.search_mode {
        handle_search_input(app, code, modifiers, event_tx);
        return Action::Continue;
    }

    match code {
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('?') => app.show_help = true,

        KeyCode::Tab => cycle_view(app, 1, event_tx),
        KeyCode::BackTab => cycle_view(app, -1, event_tx),
        KeyCode::Char(c @ '1'..='5') => {
            let idx = c as usize - '1' as usize;
            let requests = app.switch_view(View::TABS[idx]);
            spawn_page_loads(app, requests, event_tx);
        }

        // Profile-only bindings shadow the list ones below.
        KeyCode::Char('F') if app.view == View::Profile => {
            let requests = app.open_connections(ResourceKind::Followers);
            spawn_page_loads(app, requests, event_tx);
        }
        KeyCode::Char('G') if app.view == View::Profile => {
            let requests = app.open_connections(ResourceKind::Following);
            spawn_page_loads(app, requests, event_tx);
        }
        KeyCode::Esc if app.view == View::Profile => {
            let requests = app.switch_view(app.previous_view);
            spawn_page_loads(app, requests, event_tx);
        }

        KeyCode::Char('j') | KeyCode::Down => scroll(app, 1, event_tx),
        KeyCode::Char('k') | KeyCode::Up => scroll(app, -1, event_tx),
        KeyCode::PageDown => {
            let page = app.capacity() as isize;
            scroll(app, page, event_tx);
        }
        KeyCode::PageUp => {
            let page = app.capacity() as isize;
            scroll(app, -page, event_tx);
        }
        KeyCode::Char('g') | KeyCode::Home => {
            app.select_first();
            after_scroll(app, event_tx);
        }
        KeyCode::Char('G') | KeyCode::End => {
            app.select_last();
            after_scroll(app, event_tx);
        }

        KeyCode::Char('l') => {
            let ticket = app.toggle_like_selected();
            spawn_mutations(app, ticket, event_tx);
        }
        KeyCode::Char('f') => {
            let ticket = app.toggle_follow_selected();
            spawn_mutations(app, ticket, event_tx);
        }
        KeyCode::Char('a') => {
            let ticket = app.accept_selected();
            spawn_mutations(app, ticket, event_tx);
        }
        KeyCode::Char('r') => {
            let requests = app.retry();
            spawn_page_loads(app, requests, event_tx);
            if app.view == View::Profile && matches!(app.profile_state, ProfileState::Error(_)) {
                if let Some(id) = app.profile_id.clone() {
                    app.profile_state = ProfileState::Loading;
                    spawn_profile_load(app, &id, event_tx);
                }
            }
        }

        KeyCode::Char('/') => {
            let requests = app.switch_view(View::Search);
            spawn_page_loads(app, requests, event_tx);
            app.search_mode = true;
        }
        KeyCode::Char('u') if app.view == View::Search => {
            app.search_focus = match app.search_focus {
                SearchFocus::Posts => SearchFocus::Users,
                SearchFocus::Users => SearchFocus::Posts,
            };
            after_scroll(app, event_tx);
        }
        KeyCode::Enter => {
            if let Some(user_id) = app.selected_profile_target() {
                let requests = app.open_profile(&user_id);
                spawn_page_loads(app, requests, event_tx);
                if app.profile_state == ProfileState::Loading {
                    spawn_profile_load(app, &user_id, event_tx);
                }
            }
        }
        _ => {}
    }
    Action::Continue
}

fn handle_search_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    match code {
        KeyCode::Esc => app.search_mode = false,
        KeyCode::Enter => {
            app.search_mode = false;
            let requests = app.submit_search();
            spawn_page_loads(app, requests, event_tx);
        }
        KeyCode::Backspace => {
            let mut text = app.debouncer.text().to_string();
            if text.pop().is_some() {
                app.on_search_input(text);
            }
        }
        KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.on_search_input(String::new());
        }
        KeyCode::Char(c) => {
            let text = app.debouncer.text();
            if text.len() + c.len_utf8() > MAX_SEARCH_QUERY_LENGTH {
                app.set_status(format!(
                    "Search query too long (max {} chars)",
                    MAX_SEARCH_QUERY_LENGTH
                ));
                return;
            }
            let mut text = text.to_string();
            text.push(c);
            app.on_search_input(text);
        }
        _ => {}
    }
}

fn cycle_view(app: &mut App, step: isize, event_tx: &mpsc::Sender<AppEvent>) {
    let tabs = View::TABS;
    let current = tabs.iter().position(|v| *v == app.view).unwrap_or(0) as isize;
    let next = (current + step).rem_euclid(tabs.len() as isize) as usize;
    let requests = app.switch_view(tabs[next]);
    spawn_page_loads(app, requests, event_tx);
}

fn scroll(app: &mut App, delta: isize, event_tx: &mpsc::Sender<AppEvent>) {
    app.move_selection(delta);
    after_scroll(app, event_tx);
}

/// The visible window changed: check the sentinel and mark what came into view.
fn after_scroll(app: &mut App, event_tx: &mpsc::Sender<AppEvent>) {
    if let Some(request) = app.observe_viewport() {
        spawn_page_loads(app, [request], event_tx);
    }
    let reads = app.mark_visible_read();
    spawn_mutations(app, reads, event_tx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::test_app;
    use crate::paging::LoadState;

    fn press(app: &mut App, code: KeyCode, tx: &mpsc::Sender<AppEvent>) -> Action {
        handle_input(app, code, KeyModifiers::NONE, tx)
    }

    #[tokio::test]
    async fn test_quit_keys() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app(0);
        assert!(matches!(press(&mut app, KeyCode::Char('q'), &tx), Action::Quit));
        assert!(matches!(
            handle_input(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL, &tx),
            Action::Quit
        ));
    }

    #[tokio::test]
    async fn test_q_types_into_search_box() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app(0);
        press(&mut app, KeyCode::Char('/'), &tx);
        assert!(app.search_mode);
        assert!(matches!(press(&mut app, KeyCode::Char('q'), &tx), Action::Continue));
        assert_eq!(app.debouncer.text(), "q");
        assert!(app.debouncer.is_pending());
    }

    #[tokio::test]
    async fn test_enter_searches_immediately() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut app = test_app(2);
        press(&mut app, KeyCode::Char('/'), &tx);
        // Mount with the empty query.
        for _ in 0..2 {
            rx.recv().await.unwrap();
        }
        for c in "rust".chars() {
            press(&mut app, KeyCode::Char(c), &tx);
        }
        press(&mut app, KeyCode::Enter, &tx);

        assert!(!app.search_mode);
        assert!(!app.debouncer.is_pending());
        assert_eq!(app.search_posts.identity(), Some("rust"));
        assert_eq!(app.search_users.identity(), Some("rust"));
        assert!(matches!(app.search_posts.state(), LoadState::Loading));
    }

    #[tokio::test]
    async fn test_query_length_limited() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app(0);
        app.search_mode = true;
        app.on_search_input("x".repeat(MAX_SEARCH_QUERY_LENGTH));
        press(&mut app, KeyCode::Char('y'), &tx);
        assert_eq!(app.debouncer.text().len(), MAX_SEARCH_QUERY_LENGTH);
        assert!(app.status_message.is_some());
    }

    #[tokio::test]
    async fn test_tab_cycles_views() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app(0);
        press(&mut app, KeyCode::Tab, &tx);
        assert_eq!(app.view, View::Notifications);
        press(&mut app, KeyCode::BackTab, &tx);
        press(&mut app, KeyCode::BackTab, &tx);
        assert_eq!(app.view, View::Following);
    }

    #[tokio::test]
    async fn test_help_swallows_keys() {
        let (tx, _rx) = mpsc::channel(8);
        let mut app = test_app(0);
        press(&mut app, KeyCode::Char('?'), &tx);
        assert!(app.show_help);
        assert!(matches!(press(&mut app, KeyCode::Tab, &tx), Action::Continue));
        assert_eq!(app.view, View::Feed);
        press(&mut app, KeyCode::Esc, &tx);
        assert!(!app.show_help);
    }
}
