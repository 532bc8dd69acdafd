//! Keyboard input handling for the TUI.
//!
//! Keys are routed by `AppState`: overlays first, then the open form, then
//! the owners search line, then the global bindings.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, Focus, Tab, PAGE_SCROLL_SIZE};
use crate::forms::FormKind;

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::EditingForm => {
            handle_form_input(app, key).await;
            return Ok(false);
        }
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete().await,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_delete(),
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Searching => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,

        // Tabs
        KeyCode::Char(c @ '1'..='6') => {
            let index = c as usize - '1' as usize;
            app.switch_tab(Tab::ALL[index]);
        }
        KeyCode::Left => app.switch_tab(app.current_tab.prev()),
        KeyCode::Right => app.switch_tab(app.current_tab.next()),
        KeyCode::Tab | KeyCode::BackTab => {
            app.focus = match app.focus {
                Focus::List => Focus::Detail,
                Focus::Detail => Focus::List,
            };
        }
        KeyCode::Enter => app.guard_action(),

        // Data
        KeyCode::Char('u') => {
            app.refresh_visible();
            app.notify_success("Refreshing");
        }
        KeyCode::Char('R') => app.retry(),
        KeyCode::Char('L') => app.logout(),

        // Records
        KeyCode::Char('n') => app.open_create_form(),
        KeyCode::Char('e') => app.open_edit_form(),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char('/') => match app.current_tab {
            Tab::Cars => app.open_filters(),
            Tab::Owners => app.start_search(),
            _ => {}
        },
        KeyCode::Char('s') if app.current_tab == Tab::Cars => app.cycle_sort(),
        KeyCode::Char('o') if app.current_tab == Tab::Cars => app.toggle_sort_order(),
        KeyCode::Char(']') if app.current_tab == Tab::Cars => app.next_page(),
        KeyCode::Char('[') if app.current_tab == Tab::Cars => app.prev_page(),
        KeyCode::Char('x') => match app.current_tab {
            Tab::Cars => app.reset_filters(),
            Tab::Owners => app.clear_search(),
            _ => {}
        },
        KeyCode::Char('b') if app.current_tab == Tab::Settings => app.create_backup().await,

        // Lists
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::PageUp => app.move_selection(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::PageDown => app.move_selection(PAGE_SCROLL_SIZE as isize),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),
        _ => {}
    }
    Ok(false)
}

async fn handle_form_input(app: &mut App, key: KeyEvent) {
    let owners = app.form_owners().to_vec();
    let Some(form) = app.form.as_mut() else {
        app.state = AppState::Normal;
        return;
    };
    let kind = form.kind;
    let choice = form
        .focused_field()
        .is_some_and(|f| !f.is_editable_text());

    match key.code {
        KeyCode::Esc => app.close_form(),
        KeyCode::Tab | KeyCode::Down => form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => form.focus_prev(),
        KeyCode::Enter => {
            if form.on_submit() {
                app.submit_form().await;
            } else {
                form.focus_next();
            }
        }
        KeyCode::Left if choice => form.cycle(false, &owners),
        KeyCode::Right | KeyCode::Char(' ') if choice => form.cycle(true, &owners),
        KeyCode::Backspace => form.backspace(),
        KeyCode::F(2) if kind == FormKind::Login => app.open_register(false),
        KeyCode::F(3) if kind == FormKind::Login => app.open_register(true),
        KeyCode::F(2) if kind.is_auth() => app.open_login(None),
        KeyCode::Char(c) => form.input_char(c),
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.clear_search();
            app.state = AppState::Normal;
        }
        KeyCode::Enter | KeyCode::Down => app.state = AppState::Normal,
        KeyCode::Backspace => app.search_backspace(),
        KeyCode::Char(c) => app.search_input(c),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    use crate::app::tests::{app_with, start};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_input(app, press(KeyCode::Char(c))).await.expect("input");
        }
    }

    #[tokio::test]
    async fn test_login_through_keys() {
        let (_backend, mut app) = app_with(None);
        start(&mut app).await;
        assert_eq!(app.state, AppState::EditingForm);

        type_text(&mut app, "admin").await;
        handle_input(&mut app, press(KeyCode::Tab)).await.expect("input");
        type_text(&mut app, "admin123").await;
        handle_input(&mut app, press(KeyCode::Tab)).await.expect("input");
        handle_input(&mut app, press(KeyCode::Enter)).await.expect("input");

        assert!(app.snapshot().is_authenticated());
        assert!(app.form.is_none());
        assert_eq!(app.state, AppState::Normal);
    }

    #[tokio::test]
    async fn test_f2_switches_to_register() {
        let (_backend, mut app) = app_with(None);
        start(&mut app).await;
        handle_input(&mut app, press(KeyCode::F(2))).await.expect("input");
        assert_eq!(app.form.as_ref().map(|f| f.kind), Some(FormKind::Register));
        handle_input(&mut app, press(KeyCode::F(2))).await.expect("input");
        assert_eq!(app.form.as_ref().map(|f| f.kind), Some(FormKind::Login));
    }

    #[tokio::test]
    async fn test_quit_needs_confirmation() {
        let (_backend, mut app) = app_with(None);
        app.close_form();
        assert!(!handle_input(&mut app, press(KeyCode::Char('q'))).await.expect("input"));
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!handle_input(&mut app, press(KeyCode::Char('n'))).await.expect("input"));
        assert_eq!(app.state, AppState::Normal);
        handle_input(&mut app, press(KeyCode::Char('q'))).await.expect("input");
        assert!(handle_input(&mut app, press(KeyCode::Char('y'))).await.expect("input"));
    }

    #[tokio::test]
    async fn test_number_keys_switch_tabs() {
        let (_backend, mut app) = app_with(None);
        app.close_form();
        handle_input(&mut app, press(KeyCode::Char('3'))).await.expect("input");
        assert_eq!(app.current_tab, Tab::Owners);
        handle_input(&mut app, press(KeyCode::Left)).await.expect("input");
        assert_eq!(app.current_tab, Tab::Cars);
    }

    #[tokio::test]
    async fn test_owner_search_typing() {
        let (_backend, mut app) = app_with(None);
        app.close_form();
        app.switch_tab(Tab::Owners);
        handle_input(&mut app, press(KeyCode::Char('/'))).await.expect("input");
        assert_eq!(app.state, AppState::Searching);
        type_text(&mut app, "lee").await;
        assert_eq!(app.owner_term.get(), "lee");
        handle_input(&mut app, press(KeyCode::Esc)).await.expect("input");
        assert_eq!(app.owner_term.get(), "");
        assert_eq!(app.state, AppState::Normal);
    }
}
