//! Render functions for the TUI.
//!
//! Lays out the tab bar, the active view and the status line, and records how
//! many rows the list got so scrolling and sentinel checks match the screen.

use crate::app::{App, ProfileState, SearchFocus, View};
use crate::model::ResourceKind;
use crate::util::{sanitize, truncate_to_width};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::{help, lists, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 50;
pub(super) const MIN_HEIGHT: u16 = 12;

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_tabs(f, app, chunks[0]);

    let list_area = match app.view {
        View::Search => render_search_header(f, app, chunks[1]),
        View::Profile => render_profile_header(f, app, chunks[1]),
        _ => chunks[1],
    };
    app.list_rows = list_area.height.saturating_sub(2) as usize;

    let kind = app.active_kind();
    let title = list_title(app, kind);
    lists::render(f, app, kind, list_area, &title);

    status::render(f, app, chunks[2]);

    if app.show_help {
        help::render(f);
    }
}

fn render_tabs(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(" jotter ", Style::default().add_modifier(Modifier::BOLD))];
    let profile = (app.view == View::Profile).then_some(View::Profile);
    for view in View::TABS.into_iter().chain(profile) {
        let style = if view == app.view {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {} ", view.title()), style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn list_title(app: &App, kind: ResourceKind) -> String {
    let owner = match kind {
        ResourceKind::Followers => app.followers.identity(),
        ResourceKind::Following => app.following.identity(),
        _ => None,
    };
    match owner {
        Some(id) if id != app.session.user_id => {
            format!("{} of {}", kind.label(), viewed_name(app))
        }
        _ => kind.label().to_string(),
    }
}

fn viewed_name(app: &App) -> String {
    app.profile
        .as_ref()
        .map(|p| sanitize(&p.username).into_owned())
        .or_else(|| app.profile_id.clone())
        .unwrap_or_default()
}

/// Search box and posts/users switch. Returns the area left for the list.
fn render_search_header(f: &mut Frame, app: &App, area: Rect) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(1), Constraint::Min(0)])
        .split(area);

    let cursor = if app.search_mode { "_" } else { "" };
    let border = if app.search_mode {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let pending = if app.debouncer.is_pending() { " ..." } else { "" };
    let input = Paragraph::new(format!("{}{}", app.debouncer.text(), cursor)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(format!("Search{}", pending)),
    );
    f.render_widget(input, chunks[0]);

    let tab = |label: &'static str, active: bool| {
        if active {
            Span::styled(label, Style::default().add_modifier(Modifier::REVERSED))
        } else {
            Span::raw(label)
        }
    };
    let switch = Line::from(vec![
        Span::raw(" "),
        tab(" Posts ", app.search_focus == SearchFocus::Posts),
        Span::raw(" "),
        tab(" Users ", app.search_focus == SearchFocus::Users),
    ]);
    f.render_widget(Paragraph::new(switch), chunks[1]);

    chunks[2]
}

/// Profile header with follow state. Returns the area left for the posts.
fn render_profile_header(f: &mut Frame, app: &App, area: Rect) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let width = chunks[0].width.saturating_sub(2) as usize;
    let lines: Vec<Line> = match (&app.profile_state, app.profile.as_ref()) {
        (ProfileState::Ready, Some(p)) => {
            let follow = if p.id == app.session.user_id {
                Span::styled("(you)", Style::default().fg(Color::Gray))
            } else if p.following {
                Span::styled("[following]", Style::default().fg(Color::Green))
            } else {
                Span::styled("[f to follow]", Style::default().fg(Color::Gray))
            };
            vec![
                Line::from(vec![
                    Span::styled(
                        sanitize(&p.display_name()).into_owned(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!(" @{} ", sanitize(&p.username))),
                    follow,
                ]),
                Line::from(format!(
                    "{} followers · {} following · {} posts",
                    p.num_followers,
                    p.num_following,
                    p.posts.len()
                )),
                Line::from(truncate_to_width(&sanitize(&p.bio), width).into_owned()),
            ]
        }
        (ProfileState::Error(e), _) => vec![
            Line::from(Span::styled(
                "Failed to load profile",
                Style::default().fg(Color::Red),
            )),
            Line::from(sanitize(&e.message).into_owned()),
        ],
        _ => vec![Line::from(Span::styled(
            "Loading profile...",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let header = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Profile"));
    f.render_widget(header, chunks[0]);

    chunks[1]
}
