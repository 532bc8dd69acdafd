//! Colors and text styles shared by every view.

use ratatui::style::{Color, Modifier, Style};

use crate::app::NotificationKind;

// Palette
pub const BRAND: Color = Color::Rgb(70, 140, 200);
pub const AMBER: Color = Color::Rgb(220, 170, 60);
pub const GREEN: Color = Color::Rgb(90, 170, 110);
pub const RED: Color = Color::Rgb(210, 80, 70);
pub const GREY: Color = Color::Rgb(130, 130, 140);
pub const TEXT: Color = Color::Rgb(225, 225, 230);
const SELECTION_BG: Color = Color::Rgb(40, 52, 70);
const STATUS_BG: Color = Color::Rgb(28, 30, 38);

// Text

pub fn title_style() -> Style {
    Style::default().fg(BRAND).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(TEXT)
}

pub fn selected_style() -> Style {
    Style::default().fg(TEXT).bg(SELECTION_BG).add_modifier(Modifier::BOLD)
}

pub fn muted_style() -> Style {
    Style::default().fg(GREY)
}

pub fn highlight_style() -> Style {
    Style::default().fg(AMBER)
}

pub fn search_style() -> Style {
    Style::default().fg(AMBER).add_modifier(Modifier::ITALIC)
}

// Outcomes

pub fn success_style() -> Style {
    Style::default().fg(GREEN)
}

pub fn error_style() -> Style {
    Style::default().fg(RED).add_modifier(Modifier::BOLD)
}

pub fn notification_style(kind: NotificationKind) -> Style {
    match kind {
        NotificationKind::Success => success_style(),
        NotificationKind::Error => error_style(),
    }
}

/// Boolean setting values.
pub fn toggle_style(on: bool) -> Style {
    if on {
        success_style()
    } else {
        muted_style()
    }
}

/// Role badge: admins stand out.
pub fn role_style(is_admin: bool) -> Style {
    if is_admin {
        Style::default().fg(AMBER).add_modifier(Modifier::BOLD)
    } else {
        muted_style()
    }
}

// Chrome

/// Tabs the current role may not open are dimmed.
pub fn tab_style(selected: bool, locked: bool) -> Style {
    match (selected, locked) {
        (true, _) => Style::default()
            .fg(BRAND)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        (false, true) => Style::default().fg(GREY).add_modifier(Modifier::DIM),
        (false, false) => Style::default().fg(TEXT),
    }
}

pub fn border_style(focused: bool) -> Style {
    Style::default().fg(if focused { BRAND } else { GREY })
}

pub fn status_bar_style() -> Style {
    Style::default().bg(STATUS_BG).fg(TEXT)
}

pub fn chart_bar_style() -> Style {
    Style::default().fg(BRAND)
}

pub fn help_key_style() -> Style {
    Style::default().fg(AMBER).add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    list_item_style()
}
