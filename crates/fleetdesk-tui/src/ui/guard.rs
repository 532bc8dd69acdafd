//! What a protected tab shows instead of its content.

use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use fleetdesk_core::guard::{DenyReason, GuardDecision};

use super::styles;

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Render the view for a non-`Allowed` decision. Returns false when the tab
/// may render its own content.
pub fn render_guard(frame: &mut Frame, decision: GuardDecision, tick: usize, area: Rect) -> bool {
    match decision {
        GuardDecision::Allowed => false,
        GuardDecision::Loading => {
            render_loading(frame, "Checking session", tick, area);
            true
        }
        GuardDecision::Denied(reason) => {
            render_denied(frame, reason, area);
            true
        }
    }
}

pub fn render_loading(frame: &mut Frame, label: &str, tick: usize, area: Rect) {
    let spinner = SPINNER[tick % SPINNER.len()];
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("{} {}...", spinner, label),
            styles::muted_style(),
        )),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(styles::border_style(false)));
    frame.render_widget(paragraph, area);
}

fn render_denied(frame: &mut Frame, reason: DenyReason, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(reason.title(), styles::error_style())),
        Line::from(""),
        Line::from(Span::styled(reason.message(), styles::list_item_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("Press ", styles::muted_style()),
            Span::styled("[Enter]", styles::help_key_style()),
            Span::styled(format!(" to {}", reason.action_label().to_lowercase()), styles::muted_style()),
        ]),
    ];
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(styles::border_style(false)));
    frame.render_widget(paragraph, area);
}
