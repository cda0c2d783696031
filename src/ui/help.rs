//! Help overlay: keybinding table grouped by context.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

const SECTIONS: [(&str, &[(&str, &str)]); 4] = [
    (
        "General",
        &[
            ("Tab / S-Tab", "Next / previous view"),
            ("j / k", "Move down / up"),
            ("PgDn / PgUp", "Move a screen"),
            ("g / G", "First / last item"),
            ("r", "Retry failed load"),
            ("?", "Toggle this help"),
            ("q", "Quit"),
        ],
    ),
    (
        "Posts and users",
        &[
            ("l", "Like / unlike post"),
            ("f", "Follow / unfollow user"),
            ("Enter", "Open profile"),
        ],
    ),
    (
        "Search",
        &[
            ("/", "Edit query"),
            ("Enter", "Search now"),
            ("Esc", "Stop typing"),
            ("u", "Switch posts / users"),
        ],
    ),
    (
        "Notifications and profile",
        &[
            ("a", "Accept follow request"),
            ("F / G", "Profile followers / following"),
            ("Esc", "Leave profile"),
        ],
    ),
];

/// Render the help overlay on top of the current view.
pub fn render(f: &mut Frame) {
    let overlay = centered_rect(70, 80, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }

    f.render_widget(Clear, overlay);

    let mut rows: Vec<Row> = Vec::new();
    for (label, bindings) in SECTIONS {
        rows.push(Row::new(vec![
            Line::from(Span::styled(
                format!("-- {} --", label),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ]));
        for (key, action) in bindings {
            rows.push(Row::new(vec![format!("  {}", key), action.to_string()]));
        }
        rows.push(Row::new(vec![String::new(), String::new()]));
    }
    rows.pop();

    let widths = [Constraint::Length(16), Constraint::Min(20)];
    let table = Table::new(rows, widths).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Help (? to close) "),
    );

    f.render_widget(table, overlay);
}

/// Create a centered rectangle with the given percentage of the parent area.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
