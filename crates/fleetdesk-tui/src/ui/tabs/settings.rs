use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};
use serde_json::Value;

use crate::app::App;
use crate::ui::styles;

use super::analytics::value_rows;
use super::{empty_line, fetching_suffix, panel, render_placeholder};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(5)])
        .split(area);
    render_settings(frame, app, rows[0]);
    render_logs(frame, app, rows[1]);
}

fn render_settings(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.settings;
    if render_placeholder(frame, state, "settings", app.frames, area) {
        return;
    }

    let mut lines: Vec<Line> = state
        .data
        .as_deref()
        .map(value_rows)
        .unwrap_or_default()
        .into_iter()
        .map(|(label, value)| {
            let style = match value.as_str() {
                "true" | "false" => styles::toggle_style(value == "true"),
                _ => styles::list_item_style(),
            };
            Line::from(vec![
                Span::styled(format!("  {:<20}", label), styles::muted_style()),
                Span::styled(value, style),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("  [e]", styles::help_key_style()),
        Span::styled(" edit  ", styles::muted_style()),
        Span::styled("[b]", styles::help_key_style()),
        Span::styled(" create backup", styles::muted_style()),
    ]));

    let title = format!(" Settings{} ", fetching_suffix(state));
    frame.render_widget(Paragraph::new(lines).block(panel(title, false)), area);
}

/// Log lines from either `{"logs": [...]}` or a bare array.
pub fn log_lines(value: &Value) -> Vec<String> {
    let entries = value.get("logs").unwrap_or(value);
    match entries {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => s.lines().map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn render_logs(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.logs;
    if render_placeholder(frame, state, "logs", app.frames, area) {
        return;
    }

    let mut lines: Vec<Line> = state
        .data
        .as_deref()
        .map(log_lines)
        .unwrap_or_default()
        .into_iter()
        .map(Line::from)
        .collect();
    if lines.is_empty() {
        lines.push(empty_line("No recent log entries"));
    }
    let title = format!(" Recent logs{} ", fetching_suffix(state));
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel(title, false));
    frame.render_widget(paragraph, area);
}
