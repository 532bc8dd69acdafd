use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::{App, Focus};
use crate::ui::styles;
use crate::utils::truncate;

use super::{empty_line, fetching_suffix, panel, render_placeholder};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let state = &app.views.users;
    if render_placeholder(frame, state, "users", app.frames, columns[0]) {
        return;
    }

    let users = app.users();
    let me = app.snapshot().identity.map(|u| u.id);
    let title = format!(" Users ({}){} ", users.len(), fetching_suffix(state));
    let items: Vec<ListItem> = users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let marker = if Some(user.id) == me { " (you)" } else { "" };
            let line = Line::from(vec![
                Span::raw(format!("{:>5}  {:<24}", user.id, truncate(&user.username, 24))),
                Span::styled(format!("{:<6}", user.role), styles::role_style(user.is_admin())),
                Span::styled(marker, styles::muted_style()),
            ]);
            let style = if i == app.user_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            ListItem::new(line).style(style)
        })
        .collect();

    let list = List::new(items).block(panel(title, app.focus == Focus::List));
    let mut list_state = ListState::default();
    list_state.select(Some(app.user_selection));
    frame.render_stateful_widget(list, columns[0], &mut list_state);

    let lines = match app.selected_user() {
        Some(user) => vec![
            Line::from(Span::styled(user.username.clone(), styles::title_style())),
            Line::from(""),
            Line::from(vec![
                Span::styled("Role          ", styles::muted_style()),
                Span::styled(user.role.to_string(), styles::role_style(user.is_admin())),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled("[e]", styles::help_key_style()),
                Span::styled(" edit  ", styles::muted_style()),
                Span::styled("[d]", styles::help_key_style()),
                Span::styled(" delete", styles::muted_style()),
            ]),
        ],
        None => vec![empty_line("No users")],
    };
    let detail = Paragraph::new(lines).block(panel(" Account ".into(), app.focus == Focus::Detail));
    frame.render_widget(detail, columns[1]);
}
