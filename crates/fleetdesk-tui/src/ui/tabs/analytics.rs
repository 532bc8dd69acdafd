use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Paragraph},
    Frame,
};
use serde_json::Value;

use fleetdesk_core::models::CarsByYear;

use crate::app::App;
use crate::ui::styles;
use crate::utils::truncate;

use super::{empty_line, fetching_suffix, panel, render_placeholder};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(8)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[1]);

    render_overview(frame, app, rows[0]);
    render_cars_by_year(frame, app, columns[0]);
    render_owners_stats(frame, app, columns[1]);
}

/// Flatten a JSON object into label/value pairs, e.g. `total_cars` -> `Total cars`.
pub fn value_rows(value: &Value) -> Vec<(String, String)> {
    let Some(map) = value.as_object() else {
        return vec![(String::new(), scalar(value))];
    };
    map.iter()
        .map(|(key, v)| (humanize(key), scalar(v)))
        .collect()
}

fn humanize(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn render_overview(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.overview;
    if render_placeholder(frame, state, "overview", app.frames, area) {
        return;
    }
    let lines: Vec<Line> = state
        .data
        .as_deref()
        .map(value_rows)
        .unwrap_or_default()
        .into_iter()
        .map(|(label, value)| {
            Line::from(vec![
                Span::styled(format!("  {:<20}", label), styles::muted_style()),
                Span::styled(value, styles::highlight_style()),
            ])
        })
        .collect();
    let title = format!(" Overview{} ", fetching_suffix(state));
    frame.render_widget(Paragraph::new(lines).block(panel(title, false)), area);
}

fn render_cars_by_year(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.cars_by_year;
    if render_placeholder(frame, state, "cars by year", app.frames, area) {
        return;
    }
    let title = format!(" Cars by year{} ", fetching_suffix(state));
    let years: Vec<CarsByYear> = state
        .data
        .as_deref()
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    if years.is_empty() {
        let paragraph = Paragraph::new(empty_line("  No data")).block(panel(title, false));
        frame.render_widget(paragraph, area);
        return;
    }

    let bars: Vec<Bar> = years
        .iter()
        .map(|y| {
            Bar::default()
                .label(Line::from(y.year.to_string()))
                .value(y.count.max(0) as u64)
                .style(styles::chart_bar_style())
        })
        .collect();
    let chart = BarChart::default()
        .block(panel(title, false))
        .data(BarGroup::default().bars(&bars))
        .bar_width(5)
        .bar_gap(1)
        .value_style(styles::title_style());
    frame.render_widget(chart, area);
}

fn render_owners_stats(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.owners_stats;
    if render_placeholder(frame, state, "owner stats", app.frames, area) {
        return;
    }
    let title = format!(" Owners{} ", fetching_suffix(state));
    let entries = state
        .data
        .as_deref()
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut lines: Vec<Line> = entries
        .iter()
        .map(|entry| {
            let name = entry
                .get("name")
                .map(scalar)
                .unwrap_or_else(|| scalar(entry));
            let count = entry.get("car_count").map(scalar).unwrap_or_default();
            Line::from(vec![
                Span::raw(format!("  {:<26}", truncate(&name, 26))),
                Span::styled(format!("{:>4}", count), styles::highlight_style()),
            ])
        })
        .collect();
    if lines.is_empty() {
        lines.push(empty_line("  No owners"));
    }
    frame.render_widget(Paragraph::new(lines).block(panel(title, false)), area);
}
