use crate::app::{App, View};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: &str = if let Some((msg, _)) = &app.status_message {
        msg
    } else if app.search_mode {
        "Type to search | ESC stop typing | ENTER search now"
    } else {
        match app.view {
            View::Feed => {
                "[j/k]move [l]ike [Enter]author [/]search [Tab]view [r]etry [?]help [q]uit"
            }
            View::Notifications => {
                "[j/k]move [a]ccept request [Enter]sender [Tab]view [r]etry [?]help [q]uit"
            }
            View::Search => {
                "[/]edit query [u]sers/posts [l]ike [f]ollow [Enter]profile [Tab]view [q]uit"
            }
            View::Followers | View::Following => {
                "[j/k]move [f]ollow [Enter]profile [Tab]view [r]etry [?]help [q]uit"
            }
            View::Profile => {
                "[f]ollow [l]ike [F]ollowers [G]following [Esc]back [r]etry [?]help [q]uit"
            }
        }
    };

    let style = if app.session_expired {
        Style::default().bg(Color::Red).fg(Color::White)
    } else {
        Style::default().bg(Color::DarkGray).fg(Color::White)
    };

    let paragraph = Paragraph::new(text).style(style);
    f.render_widget(paragraph, area);
}
