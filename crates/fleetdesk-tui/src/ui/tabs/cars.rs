use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

use fleetdesk_core::authz::Permission;
use fleetdesk_core::models::{CarQuery, CarWithOwner};

use crate::app::{App, Focus};
use crate::ui::styles;
use crate::utils::{format_price, truncate};

use super::{empty_line, fetching_suffix, panel, render_placeholder};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);
    render_filters(frame, app.car_query.get(), chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[1]);
    render_list(frame, app, columns[0]);
    render_detail(frame, app, columns[1]);
}

/// One-line summary of the active search, e.g. `brand~toyota  year=2019`.
pub fn describe_filters(query: &CarQuery) -> String {
    let mut parts = Vec::new();
    if let Some(brand) = &query.brand {
        parts.push(format!("brand~{}", brand));
    }
    if let Some(color) = &query.color {
        parts.push(format!("color~{}", color));
    }
    if let Some(year) = query.model_year {
        parts.push(format!("year={}", year));
    }
    match (query.min_price, query.max_price) {
        (Some(min), Some(max)) => parts.push(format!("price {}..{}", min, max)),
        (Some(min), None) => parts.push(format!("price>={}", min)),
        (None, Some(max)) => parts.push(format!("price<={}", max)),
        (None, None) => {}
    }
    if let Some(owner) = query.owner_id {
        parts.push(format!("owner=#{}", owner));
    }
    if parts.is_empty() {
        "all cars".to_string()
    } else {
        parts.join("  ")
    }
}

fn render_filters(frame: &mut Frame, query: &CarQuery, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" Filter: ", styles::muted_style()),
        Span::styled(describe_filters(query), styles::search_style()),
        Span::styled("   Sort: ", styles::muted_style()),
        Span::raw(format!("{} {}", query.sort_by.label(), query.sort_order.arrow())),
        Span::styled("   Page: ", styles::muted_style()),
        Span::raw(query.page_number().to_string()),
    ]);
    frame.render_widget(Paragraph::new(line).block(panel(" Search ".into(), false)), area);
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.cars;
    if render_placeholder(frame, state, "cars", app.frames, area) {
        return;
    }

    let cars = app.cars();
    let focused = app.focus == Focus::List;
    let mut title = format!(" Cars ({}){} ", cars.len(), fetching_suffix(state));
    if state.is_previous_data {
        title = format!(" Cars (loading page {}...) ", app.car_query.get().page_number());
    }

    if cars.is_empty() {
        let mut lines = vec![Line::from(""), empty_line("  No cars match this search")];
        if app.allows(Permission::ManageRecords) {
            lines.push(empty_line("  Press n to add a car"));
        }
        frame.render_widget(Paragraph::new(lines).block(panel(title, focused)), area);
        return;
    }

    let items: Vec<ListItem> = cars
        .iter()
        .enumerate()
        .map(|(i, car)| {
            let line = Line::from(format!(
                "{:>5}  {:<22} {:>4}  {:<10} {:>14}",
                car.id,
                truncate(&car.title(), 22),
                car.model_year,
                truncate(&car.color, 10),
                format_price(car.price),
            ));
            let style = if i == app.car_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            ListItem::new(line).style(style)
        })
        .collect();

    let list = List::new(items).block(panel(title, focused));
    let mut list_state = ListState::default();
    list_state.select(Some(app.car_selection));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn detail_lines(car: &CarWithOwner) -> Vec<Line<'static>> {
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<14}", label), styles::muted_style()),
            Span::raw(value),
        ])
    };
    vec![
        Line::from(Span::styled(car.title(), styles::title_style())),
        Line::from(""),
        row("Year", car.model_year.to_string()),
        row("Color", car.color.clone()),
        row("Registration", car.registration_number.clone()),
        row("Price", format_price(car.price)),
        row("Owner", car.owner_name()),
    ]
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Detail;
    let mut lines = match app.selected_car() {
        Some(car) => detail_lines(car),
        None => vec![empty_line("Select a car from the list")],
    };
    if app.selected_car().is_some() && app.allows(Permission::ManageRecords) {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("[e]", styles::help_key_style()),
            Span::styled(" edit  ", styles::muted_style()),
            Span::styled("[d]", styles::help_key_style()),
            Span::styled(" delete", styles::muted_style()),
        ]));
    }
    frame.render_widget(Paragraph::new(lines).block(panel(" Details ".into(), focused)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_filters() {
        assert_eq!(describe_filters(&CarQuery::default()), "all cars");
        let query = CarQuery {
            brand: Some("toyota".into()),
            model_year: Some(2019),
            min_price: Some(1000.0),
            ..CarQuery::default()
        };
        assert_eq!(describe_filters(&query), "brand~toyota  year=2019  price>=1000");
    }
}
