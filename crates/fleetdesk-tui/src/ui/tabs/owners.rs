use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

use fleetdesk_core::authz::Permission;

use crate::app::{App, AppState, Focus};
use crate::ui::styles;
use crate::utils::{format_price, truncate};

use super::{empty_line, fetching_suffix, panel, render_placeholder};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);
    render_search(frame, app, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);
    render_list(frame, app, columns[0]);
    render_detail(frame, app, columns[1]);
}

fn render_search(frame: &mut Frame, app: &App, area: Rect) {
    let searching = app.state == AppState::Searching;
    let term = app.owner_term.get();
    let text = if term.is_empty() && !searching {
        Span::styled("press / to search by name", styles::muted_style())
    } else {
        let cursor = if searching { "▌" } else { "" };
        Span::styled(format!("{}{}", term, cursor), styles::search_style())
    };
    let line = Line::from(vec![Span::styled(" Name: ", styles::muted_style()), text]);
    frame.render_widget(Paragraph::new(line).block(panel(" Search ".into(), searching)), area);
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.views.owners;
    if render_placeholder(frame, state, "owners", app.frames, area) {
        return;
    }

    let owners = app.owners();
    let focused = app.focus == Focus::List;
    let title = format!(" Owners ({}){} ", owners.len(), fetching_suffix(state));

    if owners.is_empty() {
        let mut lines = vec![Line::from(""), empty_line("  No owners found")];
        if app.allows(Permission::ManageRecords) {
            lines.push(empty_line("  Press n to add an owner"));
        }
        frame.render_widget(Paragraph::new(lines).block(panel(title, focused)), area);
        return;
    }

    let items: Vec<ListItem> = owners
        .iter()
        .enumerate()
        .map(|(i, owner)| {
            let line = Line::from(format!(
                "{:<28} {:>8}",
                truncate(&owner.full_name(), 28),
                owner.car_count_display()
            ));
            let style = if i == app.owner_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            ListItem::new(line).style(style)
        })
        .collect();

    let list = List::new(items).block(panel(title, focused));
    let mut list_state = ListState::default();
    list_state.select(Some(app.owner_selection));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_detail(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Detail;
    let Some(owner) = app.selected_owner() else {
        let paragraph = Paragraph::new(empty_line("Select an owner from the list"))
            .block(panel(" Owner ".into(), focused));
        frame.render_widget(paragraph, area);
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(
            format!("Cars ({})", owner.cars.len()),
            styles::highlight_style(),
        )),
        Line::from(""),
    ];
    for car in &owner.cars {
        lines.push(Line::from(vec![
            Span::raw(format!(
                "  {} {} ({}) ",
                car.brand, car.model, car.model_year
            )),
            Span::styled(car.registration_number.clone(), styles::muted_style()),
            Span::raw(format!("  {}", format_price(car.price))),
        ]));
    }
    if owner.cars.is_empty() {
        lines.push(empty_line("  No cars registered"));
    }
    if app.allows(Permission::ManageRecords) {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("[e]", styles::help_key_style()),
            Span::styled(" edit  ", styles::muted_style()),
            Span::styled("[d]", styles::help_key_style()),
            Span::styled(" delete with cars", styles::muted_style()),
        ]));
    }

    let title = format!(" {} ", owner.full_name());
    frame.render_widget(Paragraph::new(lines).block(panel(title, focused)), area);
}
