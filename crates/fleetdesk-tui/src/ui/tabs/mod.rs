//! Tab content. Each tab renders only after its route guard allowed it.

pub mod analytics;
pub mod cars;
pub mod dashboard;
pub mod owners;
pub mod settings;
pub mod users;

use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use fleetdesk_core::cache::QueryState;
use fleetdesk_core::console::ConsoleError;

use super::guard::render_loading;
use super::styles;

pub fn panel(title: String, focused: bool) -> Block<'static> {
    Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused))
}

/// " (updating)" while stale data is being refetched.
pub fn fetching_suffix<T>(state: &QueryState<T>) -> &'static str {
    if state.is_fetching && state.data.is_some() {
        " (updating)"
    } else {
        ""
    }
}

/// Draw the loading or error state when `state` has nothing to show yet.
/// Returns true if it drew something.
pub fn render_placeholder<T>(
    frame: &mut Frame,
    state: &QueryState<T>,
    what: &str,
    tick: usize,
    area: Rect,
) -> bool {
    if state.data.is_some() {
        return false;
    }

    if let Some(error) = &state.error {
        let error = ConsoleError::from_query(error, &format!("view {}", what));
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("Could not load {}", what),
                styles::error_style(),
            )),
            Line::from(Span::styled(error.user_message(), styles::muted_style())),
        ];
        if error.is_retryable() {
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::styled("Press ", styles::muted_style()),
                Span::styled("[R]", styles::help_key_style()),
                Span::styled(" to try again", styles::muted_style()),
            ]));
        }
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(panel(format!(" {} ", capitalize(what)), false));
        frame.render_widget(paragraph, area);
        return true;
    }

    render_loading(frame, &format!("Loading {}", what), tick, area);
    true
}

/// A single muted line, used for empty lists.
pub fn empty_line(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(text.into(), styles::muted_style()))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
