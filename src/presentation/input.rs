use crate::application::{App, AppMode};
use crate::infrastructure::clipboard;
use crossterm::event::{KeyCode, KeyModifiers};

pub struct InputHandler;

impl InputHandler {
    pub fn handle_key_event(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        match app.mode {
            AppMode::Menu => Self::handle_menu_mode(app, key),
            AppMode::Form(_) => Self::handle_form_mode(app, key, modifiers),
            AppMode::Help(_) => Self::handle_help_mode(app, key),
        }
    }

    fn handle_menu_mode(app: &mut App, key: KeyCode) {
        app.status_message = None;
        match key {
            KeyCode::Up | KeyCode::Char('k') => app.menu_up(),
            KeyCode::Down | KeyCode::Char('j') => app.menu_down(),
            KeyCode::Enter => app.open_selected(),
            KeyCode::F(1) | KeyCode::Char('?') => app.show_help(),
            KeyCode::Char('q') => {
                // Will be handled by main loop
            }
            _ => {}
        }
    }

    fn handle_form_mode(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match key {
                KeyCode::Char('r') => app.resend_code(),
                KeyCode::Char('t') => app.toggle_channel(),
                KeyCode::Char('v') => Self::paste(app),
                _ => {}
            }
            return;
        }

        match key {
            KeyCode::Enter => app.submit(),
            KeyCode::Esc => app.back(),
            KeyCode::Tab | KeyCode::Down => app.focus_next(),
            KeyCode::BackTab | KeyCode::Up => app.focus_prev(),
            KeyCode::Left => app.move_left(),
            KeyCode::Right => app.move_right(),
            KeyCode::Home => app.cursor_home(),
            KeyCode::End => app.cursor_end(),
            KeyCode::Backspace => app.backspace(),
            KeyCode::Delete => app.delete(),
            KeyCode::F(1) => app.show_help(),
            KeyCode::Char(c) => app.insert_char(c),
            _ => {}
        }
    }

    fn paste(app: &mut App) {
        match clipboard::paste_text() {
            Some(text) => app.insert_text(&text),
            None => app.status_message = Some("Nothing to paste".to_string()),
        }
    }

    fn handle_help_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Char('q') => {
                app.close_help();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if app.help_scroll > 0 {
                    app.help_scroll -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.help_scroll += 1;
            }
            KeyCode::PageUp => {
                app.help_scroll = app.help_scroll.saturating_sub(5);
            }
            KeyCode::PageDown => {
                app.help_scroll += 5;
            }
            KeyCode::Home => {
                app.help_scroll = 0;
            }
            _ => {}
        }
    }
}
