use std::time::Duration;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use fleetdesk_core::authz::Permission;

use crate::app::{App, AppState, Tab};
use crate::utils::format_age;

use super::form::render_form;
use super::guard::render_guard;
use super::styles;
use super::tabs::{analytics, cars, dashboard, owners, settings, users};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame, app),
        AppState::ConfirmingDelete => render_delete_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        _ => {}
    }
    if let Some(form) = &app.form {
        let area = frame.area();
        render_form(frame, app, form, area);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Fleetdesk";
    let snapshot = app.snapshot();
    let user = match &snapshot.identity {
        Some(user) => vec![
            Span::styled(user.username.clone(), styles::list_item_style()),
            Span::raw(" "),
            Span::styled(format!("[{}]", user.role), styles::role_style(user.is_admin())),
            Span::styled("  [?] Help", styles::muted_style()),
        ],
        None => vec![Span::styled("not logged in  [?] Help", styles::muted_style())],
    };
    let right_len: usize = user.iter().map(|s| s.content.chars().count()).sum();

    let mut spans = vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + right_len + 2),
        )),
    ];
    spans.extend(user);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let admin = app.allows(Permission::AdminPages);
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let locked = tab.guard().require_admin && !admin;
        let label = format!("[{}] {}{}", i + 1, tab.title(), if locked { "*" } else { "" });
        spans.push(Span::styled(label, styles::tab_style(*tab == app.current_tab, locked)));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    if render_guard(frame, app.guard_decision(), app.frames, area) {
        return;
    }
    match app.current_tab {
        Tab::Dashboard => dashboard::render(frame, app, area),
        Tab::Cars => cars::render(frame, app, area),
        Tab::Owners => owners::render(frame, app, area),
        Tab::Analytics => analytics::render(frame, app, area),
        Tab::Users => users::render(frame, app, area),
        Tab::Settings => settings::render(frame, app, area),
    }
}

/// Age of the data the visible tab is built on.
fn visible_age(app: &App) -> Option<Duration> {
    let views = &app.views;
    match app.current_tab {
        Tab::Dashboard => views.car_stats.age(),
        Tab::Cars => views.cars.age(),
        Tab::Owners => views.owners.age(),
        Tab::Analytics => views.overview.age(),
        Tab::Users => views.users.age(),
        Tab::Settings => views.settings.age(),
    }
}

fn shortcuts(app: &App) -> &'static str {
    let manage = app.allows(Permission::ManageRecords);
    match app.current_tab {
        Tab::Cars if manage => "[n]ew [e]dit [d]elete [/]filter [s]ort [u]pdate [q]uit",
        Tab::Cars => "[/]filter [s]ort [[/]] page [u]pdate [q]uit",
        Tab::Owners if manage => "[n]ew [e]dit [d]elete [/]search [u]pdate [q]uit",
        Tab::Owners => "[/]search [u]pdate [q]uit",
        Tab::Users => "[e]dit [d]elete [u]pdate [q]uit",
        Tab::Settings => "[e]dit [b]ackup [u]pdate [q]uit",
        _ => "[u]pdate [L]ogout [q]uit",
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (left_text, left_style) = match &app.notification {
        Some(n) => (format!(" {} ", n.message), styles::notification_style(n.kind)),
        None => (
            format!(" Updated {} ", format_age(visible_age(app))),
            styles::muted_style(),
        ),
    };
    let right_text = format!(" {} ", shortcuts(app));

    let padding = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());
    let line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(Paragraph::new(line).style(styles::status_bar_style()), area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame, _app: &App) {
    let area = centered_rect_fixed(54, 30, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let help_text = vec![
        Line::from(Span::styled("  Fleetdesk", styles::title_style())),
        Line::from(Span::styled(format!("  version {}", version), styles::muted_style())),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1-6", "Switch tabs"),
        help_line("←/→", "Prev/next tab"),
        help_line("Tab", "Switch focus (list ↔ detail)"),
        help_line("↑/↓", "Navigate list"),
        help_line("PgUp/PgDn", "Scroll a page"),
        help_line("Enter", "Log in / leave a denied page"),
        Line::from(""),
        Line::from(Span::styled(" Records", styles::highlight_style())),
        help_line("n", "New car or owner"),
        help_line("e", "Edit selection"),
        help_line("d", "Delete selection"),
        help_line("/", "Filter cars / search owners"),
        help_line("s / o", "Sort column / direction"),
        help_line("[ / ]", "Previous / next page"),
        help_line("x", "Clear filters"),
        Line::from(""),
        Line::from(Span::styled(" Session", styles::highlight_style())),
        help_line("u", "Refresh visible data"),
        help_line("R", "Retry failed requests"),
        help_line("b", "Create backup (settings)"),
        help_line("L", "Log out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_delete_overlay(frame: &mut Frame, app: &App) {
    let Some(target) = &app.pending_delete else {
        return;
    };
    let area = centered_rect_fixed(56, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {}", target.prompt()), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to delete, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];
    let block = Block::default()
        .title(" Confirm delete ")
        .title_style(styles::error_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
