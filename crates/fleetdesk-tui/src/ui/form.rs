use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use fleetdesk_core::models::Owner;

use crate::app::App;
use crate::forms::{FieldKind, Form, FormField, FormKind};
use crate::utils::truncate;

use super::styles;

const FORM_WIDTH: u16 = 60;
const VALUE_WIDTH: usize = 32;

pub fn render_form(frame: &mut Frame, app: &App, form: &Form, area: Rect) {
    let lines = form_lines(form, app.form_owners());
    let height = (lines.len() as u16 + 2).min(area.height);
    let dialog = super::render::centered_rect_fixed(FORM_WIDTH, height, area);
    frame.render_widget(Clear, dialog);

    let block = Block::default()
        .title(format!(" {} ", form.kind.title()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());
    frame.render_widget(Paragraph::new(lines).block(block), dialog);
}

/// What a field shows: masked secrets and owner names instead of ids.
pub fn display_value(field: &FormField, owners: &[Owner]) -> String {
    match field.kind {
        FieldKind::Secret => "*".repeat(field.value.chars().count()),
        FieldKind::Owner if field.value.is_empty() => "(choose with ←/→)".to_string(),
        FieldKind::Owner => owners
            .iter()
            .find(|o| o.ownerid.to_string() == field.value)
            .map(|o| format!("{} (#{})", o.full_name(), o.ownerid))
            .unwrap_or_else(|| format!("#{}", field.value)),
        FieldKind::Toggle if field.value == "true" => "[x] on".to_string(),
        FieldKind::Toggle => "[ ] off".to_string(),
        FieldKind::Text | FieldKind::Role => field.value.clone(),
    }
}

fn form_lines(form: &Form, owners: &[Owner]) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from("")];

    for (i, field) in form.fields.iter().enumerate() {
        let focused = form.focus == i;
        let style = if focused {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        let cursor = if focused && field.is_editable_text() { "▌" } else { "" };
        let value = truncate(&display_value(field, owners), VALUE_WIDTH);
        lines.push(Line::from(vec![
            Span::styled(format!("  {:>16}: ", field.label), styles::muted_style()),
            Span::styled(format!("{}{}", value, cursor), style),
        ]));
        if let Some(error) = form.errors.get(field.name) {
            lines.push(Line::from(Span::styled(
                format!("{:>20}{}", "", error),
                styles::error_style(),
            )));
        }
    }

    // Errors for fields this form does not show
    for (name, error) in form.errors.iter() {
        if !form.fields.iter().any(|f| f.name == name) {
            lines.push(Line::from(Span::styled(format!("  {}", error), styles::error_style())));
        }
    }

    lines.push(Line::from(""));
    let label = form.kind.submit_label();
    let button = if form.on_submit() {
        Span::styled(format!(" ▶ {} ◀ ", label), styles::selected_style())
    } else {
        Span::styled(format!("   {}   ", label), styles::list_item_style())
    };
    lines.push(Line::from(vec![Span::raw("                    ["), button, Span::raw("]")]));

    if let Some(message) = &form.message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("  {}", message), styles::error_style())));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(hint_spans(form.kind)));
    lines
}

fn hint_spans(kind: FormKind) -> Vec<Span<'static>> {
    let mut spans = vec![
        Span::styled("  [Tab]", styles::help_key_style()),
        Span::styled(" next  ", styles::muted_style()),
        Span::styled("[Esc]", styles::help_key_style()),
        Span::styled(" cancel", styles::muted_style()),
    ];
    match kind {
        FormKind::Login => {
            spans.push(Span::styled("  [F2]", styles::help_key_style()));
            spans.push(Span::styled(" register", styles::muted_style()));
            spans.push(Span::styled("  [F3]", styles::help_key_style()));
            spans.push(Span::styled(" admin", styles::muted_style()));
        }
        FormKind::Register | FormKind::RegisterAdmin => {
            spans.push(Span::styled("  [F2]", styles::help_key_style()));
            spans.push(Span::styled(" back to login", styles::muted_style()));
        }
        _ => {}
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetdesk_core::models::CarQuery;

    #[test]
    fn test_secret_is_masked() {
        let mut form = Form::login(Some("ann"));
        form.focus = 1;
        for c in "hunter2".chars() {
            form.input_char(c);
        }
        let password = &form.fields[1];
        assert_eq!(display_value(password, &[]), "*******");
    }

    #[test]
    fn test_owner_shows_name() {
        let owners = vec![Owner {
            ownerid: 4,
            firstname: "Ann".into(),
            lastname: "Lee".into(),
            cars: vec![],
        }];
        let mut form = Form::car_filters(&CarQuery::default());
        let index = form
            .fields
            .iter()
            .position(|f| f.kind == FieldKind::Owner)
            .expect("owner field");
        form.focus = index;
        assert_eq!(display_value(&form.fields[index], &owners), "(choose with ←/→)");
        form.cycle(true, &owners);
        assert_eq!(display_value(&form.fields[index], &owners), "Ann Lee (#4)");
    }

    #[test]
    fn test_unknown_field_errors_are_listed() {
        let mut form = Form::register(false);
        let mut errors = fleetdesk_core::validation::FieldErrors::new();
        errors.add("server", "Username already taken");
        form.set_errors(errors);
        let text: String = form_lines(&form, &[])
            .iter()
            .flat_map(|l| l.spans.iter().map(|s| s.content.to_string()))
            .collect();
        assert!(text.contains("Username already taken"));
    }
}
