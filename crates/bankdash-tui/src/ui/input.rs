//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Every key press also counts as session
//! activity; that is reported by the event loop before dispatch here.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{can_add_email_char, can_add_password_char, App, AppState, LoginFocus, Tab};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
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
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('1') => app.current_tab = Tab::Overview,
        KeyCode::Char('2') => app.current_tab = Tab::Notifications,
        KeyCode::Char('3') => app.current_tab = Tab::Settings,
        KeyCode::Left => app.current_tab = app.current_tab.prev(),
        KeyCode::Right | KeyCode::Tab => app.current_tab = app.current_tab.next(),
        KeyCode::Char('r') => app.refresh_background(),
        KeyCode::Char('L') => app.logout_background(),
        _ => {
            if app.current_tab == Tab::Notifications {
                handle_notifications_input(app, key);
            }
        }
    }
    Ok(false)
}

fn handle_notifications_input(app: &mut App, key: KeyEvent) {
    let count = app
        .snapshot
        .as_ref()
        .map(|s| s.notifications.len())
        .unwrap_or(0);

    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.notification_selection = app.notification_selection.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.notification_selection + 1 < count {
                app.notification_selection += 1;
            }
        }
        KeyCode::Home => app.notification_selection = 0,
        KeyCode::End => app.notification_selection = count.saturating_sub(1),
        KeyCode::Char('m') => {
            if count > 0 {
                app.mark_all_read_background();
            }
        }
        _ => {}
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            if app.login_focus == LoginFocus::Email {
                app.fill_stored_password();
            }
            app.login_focus = app.login_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = app.login_focus.prev();
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => {
                app.fill_stored_password();
                app.login_focus = LoginFocus::Password;
            }
            LoginFocus::Password => app.login_focus = LoginFocus::Button,
            LoginFocus::Remember => app.remember_credentials = !app.remember_credentials,
            LoginFocus::Button => {
                // On failure login_error is set and the form stays up
                if app.attempt_login().await.is_ok() {
                    app.refresh_background();
                }
            }
        },
        KeyCode::Char(' ') if app.login_focus == LoginFocus::Remember => {
            app.remember_credentials = !app.remember_credentials;
        }
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Remember | LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.len(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.len(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Remember | LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bankdash_core::{Config, SessionContext};
    use crossterm::event::KeyModifiers;

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        let config = Config {
            api_base_url: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        };
        App::with_session(config, Arc::new(SessionContext::in_memory())).unwrap()
    }

    #[tokio::test]
    async fn test_tab_switching() {
        let mut app = app();
        handle_input(&mut app, key(KeyCode::Char('3'))).await.unwrap();
        assert_eq!(app.current_tab, Tab::Settings);
        handle_input(&mut app, key(KeyCode::Right)).await.unwrap();
        assert_eq!(app.current_tab, Tab::Overview);
    }

    #[tokio::test]
    async fn test_quit_requires_confirmation() {
        let mut app = app();
        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))).await.unwrap());
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))).await.unwrap());
        assert_eq!(app.state, AppState::Normal);

        handle_input(&mut app, key(KeyCode::Char('q'))).await.unwrap();
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_form_typing() {
        let mut app = app();
        app.login_email.clear();
        app.start_login();
        assert_eq!(app.login_focus, LoginFocus::Email);

        for c in "a b@x.io".chars() {
            handle_input(&mut app, key(KeyCode::Char(c))).await.unwrap();
        }
        // Spaces are not part of an address
        assert_eq!(app.login_email, "ab@x.io");

        app.login_focus = LoginFocus::Password;
        for c in "p w".chars() {
            handle_input(&mut app, key(KeyCode::Char(c))).await.unwrap();
        }
        handle_input(&mut app, key(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.login_password, "p ");
    }

    #[tokio::test]
    async fn test_remember_toggle() {
        let mut app = app();
        app.start_login();
        app.login_focus = LoginFocus::Remember;
        let before = app.remember_credentials;

        handle_input(&mut app, key(KeyCode::Char(' '))).await.unwrap();
        assert_eq!(app.remember_credentials, !before);
        handle_input(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.remember_credentials, before);
    }

    #[tokio::test]
    async fn test_escape_on_login_quits() {
        let mut app = app();
        app.start_login();
        assert!(handle_input(&mut app, key(KeyCode::Esc)).await.unwrap());
        assert_eq!(app.state, AppState::Quitting);
    }
}
