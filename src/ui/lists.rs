//! Paginated list panel: skeleton, empty, error and item states, plus the
//! "loading more" footer.

use crate::app::{App, MutationScope, ITEM_HEIGHT};
use crate::model::{Notification, NotificationKind, Post, ResourceKind, ToggleField, UserCard};
use crate::paging::DisplayState;
use crate::util::{content_preview, relative_time, sanitize, truncate_to_width};
use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

const SKELETON_ROWS: usize = 4;

/// Render the list for `kind` into `area`.
pub fn render(f: &mut Frame, app: &App, kind: ResourceKind, area: Rect, title: &str) {
    let list = app.list(kind);
    let title = match list.display_state() {
        DisplayState::List { .. } | DisplayState::Empty => format!("{} ({})", title, list.len()),
        _ => title.to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    match list.display_state() {
        DisplayState::Skeleton => {
            let width = area.width.saturating_sub(4) as usize;
            let items: Vec<ListItem> = (0..SKELETON_ROWS)
                .map(|i| {
                    let bar = "░".repeat(width.saturating_sub(i * 7 % 13));
                    let short = "░".repeat(width / 2);
                    ListItem::new(vec![Line::from(bar), Line::from(short)])
                        .style(Style::default().fg(Color::DarkGray))
                })
                .collect();
            f.render_widget(List::new(items).block(block), area);
        }
        DisplayState::Empty => {
            let msg = Paragraph::new(kind.empty_message())
                .style(Style::default().fg(Color::Gray))
                .block(block);
            f.render_widget(msg, area);
        }
        DisplayState::Error => {
            let message = list
                .error()
                .map(|e| sanitize(&e.message).into_owned())
                .unwrap_or_default();
            let text = vec![
                Line::from(Span::styled(
                    format!("Failed to load {}", kind.label().to_lowercase()),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(message),
                Line::from(""),
                Line::from("Press r to retry"),
            ];
            let msg = Paragraph::new(text).wrap(Wrap { trim: true }).block(block);
            f.render_widget(msg, area);
        }
        DisplayState::List { loading_more } => {
            let width = area.width.saturating_sub(2) as usize;
            let capacity = (area.height.saturating_sub(2) as usize / ITEM_HEIGHT).max(1);
            let pos = app.position(kind);
            let mut items = visible_items(app, kind, pos.offset, capacity, pos.selected, width);
            if loading_more {
                items.push(ListItem::new(Line::from(Span::styled(
                    "Loading more...",
                    Style::default().fg(Color::Yellow),
                ))));
            }
            f.render_widget(List::new(items).block(block), area);
        }
    }
}

fn visible_items(
    app: &App,
    kind: ResourceKind,
    offset: usize,
    capacity: usize,
    selected: usize,
    width: usize,
) -> Vec<ListItem<'static>> {
    let scope = MutationScope::List(kind);
    if let Some(posts) = app.posts_list(kind) {
        return window(posts.items(), offset, capacity)
            .map(|(i, p)| {
                let pending = app.is_pending(scope, &p.id, ToggleField::Liked);
                post_item(p, width, i == selected, pending)
            })
            .collect();
    }
    if let Some(users) = app.users_list(kind) {
        return window(users.items(), offset, capacity)
            .map(|(i, u)| {
                let pending = app.is_pending(scope, &u.id, ToggleField::Following);
                user_item(u, width, i == selected, pending)
            })
            .collect();
    }
    window(app.notifications.items(), offset, capacity)
        .map(|(i, n)| notification_item(n, width, i == selected))
        .collect()
}

fn window<T>(items: &[T], offset: usize, capacity: usize) -> impl Iterator<Item = (usize, &T)> {
    items.iter().enumerate().skip(offset).take(capacity)
}

fn row_style(selected: bool) -> Style {
    if selected {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    } else {
        Style::default()
    }
}

fn post_item(post: &Post, width: usize, selected: bool, pending: bool) -> ListItem<'static> {
    let heart = if post.liked {
        Span::styled("♥ ", Style::default().fg(Color::Red))
    } else {
        Span::raw("♡ ")
    };
    let count = Span::styled(
        format!("{:<3} ", post.like_count),
        if pending {
            Style::default().add_modifier(Modifier::DIM)
        } else {
            Style::default()
        },
    );
    let title = sanitize(&post.title);
    let title = truncate_to_width(&title, width.saturating_sub(7)).into_owned();

    let author = sanitize(&post.author).into_owned();
    let preview = content_preview(&post.content, width);
    let detail = if author.is_empty() {
        preview
    } else {
        format!("{} · {}", author, preview)
    };
    let detail = truncate_to_width(&detail, width.saturating_sub(2)).into_owned();

    ListItem::new(vec![
        Line::from(vec![
            heart,
            count,
            Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(Span::styled(
            format!("  {}", detail),
            Style::default().fg(Color::Gray),
        )),
    ])
    .style(row_style(selected))
}

fn user_item(user: &UserCard, width: usize, selected: bool, pending: bool) -> ListItem<'static> {
    let name = sanitize(&user.display_name()).into_owned();
    let handle = format!(" @{}", sanitize(&user.username));
    let marker = match (user.following, pending) {
        (true, _) => Span::styled(" [following]", Style::default().fg(Color::Green)),
        (false, true) => Span::styled(" [...]", Style::default().add_modifier(Modifier::DIM)),
        (false, false) => Span::raw(""),
    };
    let bio = if user.bio.is_empty() {
        format!(
            "{} followers · {} following",
            user.num_followers, user.num_following
        )
    } else {
        sanitize(&user.bio).replace('\n', " ")
    };

    ListItem::new(vec![
        Line::from(vec![
            Span::styled(
                truncate_to_width(&name, width / 2).into_owned(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(handle, Style::default().fg(Color::Gray)),
            marker,
        ]),
        Line::from(Span::styled(
            format!("  {}", truncate_to_width(&bio, width.saturating_sub(2))),
            Style::default().fg(Color::Gray),
        )),
    ])
    .style(row_style(selected))
}

fn notification_item(n: &Notification, width: usize, selected: bool) -> ListItem<'static> {
    let bullet = if n.read {
        Span::raw("  ")
    } else {
        Span::styled("● ", Style::default().fg(Color::Cyan))
    };
    let style = if n.read {
        Style::default()
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    let message = sanitize(&n.message);
    let message = truncate_to_width(&message, width.saturating_sub(2)).into_owned();

    let when = n
        .created_at
        .map(|t| relative_time(t, Utc::now()))
        .unwrap_or_default();
    let hint = match n.kind {
        NotificationKind::Request => "  follow request - press a to accept",
        NotificationKind::Follow => "  now following you",
        _ => "",
    };

    ListItem::new(vec![
        Line::from(vec![bullet, Span::styled(message, style)]),
        Line::from(Span::styled(
            format!("  {}{}", when, hint),
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .style(row_style(selected))
}
