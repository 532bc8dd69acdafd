use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;
use crate::ui::styles;
use crate::utils::{format_count, format_price, truncate};

use super::{empty_line, fetching_suffix, panel, render_placeholder};

/// Owners listed in the "most cars" panel.
const TOP_OWNERS: usize = 10;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(8)])
        .split(area);
    render_welcome(frame, app, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);
    render_car_stats(frame, app, columns[0]);
    render_owner_stats(frame, app, columns[1]);
}

fn render_welcome(frame: &mut Frame, app: &App, area: Rect) {
    let snapshot = app.snapshot();
    let username = snapshot.username().unwrap_or("guest").to_string();
    let role = snapshot
        .identity
        .as_ref()
        .map(|u| u.role.to_string())
        .unwrap_or_default();

    let server = match (&app.views.status.data, &app.views.status.error) {
        (Some(status), _) => Span::styled(
            format!("{} {} is {}", status.app, status.version, status.status),
            styles::success_style(),
        ),
        (None, Some(_)) => Span::styled("Server unreachable", styles::error_style()),
        (None, None) => Span::styled("Checking server...", styles::muted_style()),
    };

    let lines = vec![
        Line::from(vec![
            Span::raw("Welcome, "),
            Span::styled(username, styles::highlight_style()),
            Span::raw(" "),
            Span::styled(format!("[{}]", role), styles::role_style(snapshot.is_admin())),
        ]),
        Line::from(server),
    ];
    frame.render_widget(Paragraph::new(lines).block(panel(" Dashboard ".into(), false)), area);
}

fn render_car_stats(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.car_stats;
    if render_placeholder(frame, state, "statistics", app.frames, area) {
        return;
    }
    let Some(stats) = state.data.as_deref() else {
        return;
    };

    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<16}", label), styles::muted_style()),
            Span::styled(value, styles::list_item_style()),
        ])
    };
    let priced = |car: &Option<fleetdesk_core::models::PricedCar>| match car {
        Some(car) => format!("{} {} ({})", car.brand, car.model, format_price(car.price)),
        None => "-".to_string(),
    };

    let lines = vec![
        row("Cars", format_count(stats.total_cars)),
        row("Owners", format_count(stats.total_owners)),
        row("Average price", format_price(stats.average_price)),
        Line::from(""),
        row("Most expensive", priced(&stats.most_expensive)),
        row("Cheapest", priced(&stats.cheapest)),
    ];
    let title = format!(" Fleet{} ", fetching_suffix(state));
    frame.render_widget(Paragraph::new(lines).block(panel(title, false)), area);
}

fn render_owner_stats(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.owner_stats;
    if render_placeholder(frame, state, "owner statistics", app.frames, area) {
        return;
    }
    let mut owners: Vec<_> = state.data.as_deref().into_iter().flatten().collect();
    owners.sort_by(|a, b| b.car_count.cmp(&a.car_count).then_with(|| a.lastname.cmp(&b.lastname)));

    let mut lines: Vec<Line> = owners
        .iter()
        .take(TOP_OWNERS)
        .map(|o| {
            Line::from(vec![
                Span::styled(format!("{:>3}  ", o.car_count), styles::highlight_style()),
                Span::raw(truncate(&o.full_name(), 30)),
            ])
        })
        .collect();
    if lines.is_empty() {
        lines.push(empty_line("No owners yet"));
    }
    let title = format!(" Most cars{} ", fetching_suffix(state));
    frame.render_widget(Paragraph::new(lines).block(panel(title, false)), area);
}
