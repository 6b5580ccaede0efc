//! bankdash - a terminal dashboard for a banking account.
//!
//! Signs in against the banking backend, shows account, notifications and
//! settings, and ends the session after 30 minutes without a key press or
//! when the session expires.

mod app;
mod ui;
mod utils;

use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use bankdash_core::auth::InteractionKind;
use bankdash_core::Config;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file prefix inside the cache directory; rotated daily
const LOG_FILE_NAME: &str = "bankdash.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a file so they never draw over the terminal UI. Use the
/// RUST_LOG env var to control log level (e.g., RUST_LOG=debug).
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

/// Map a terminal event to the session activity it represents
fn interaction_for(event: &Event) -> Option<InteractionKind> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(InteractionKind::KeyPress),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(_) => Some(InteractionKind::PointerDown),
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(InteractionKind::PointerMove),
            MouseEventKind::ScrollUp
            | MouseEventKind::ScrollDown
            | MouseEventKind::ScrollLeft
            | MouseEventKind::ScrollRight => Some(InteractionKind::Scroll),
            MouseEventKind::Up(_) => None,
        },
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({:#}), using defaults", e);
            Config::default()
        }
    };

    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)?;
    let _log_guard = init_tracing(&cache_dir);
    info!("bankdash starting");

    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.startup();

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        warn!(error = %e, "Event loop failed");
        eprintln!("Error: {}", e);
    }

    info!("bankdash shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            let event = event::read()?;
            if let Some(kind) = interaction_for(&event) {
                app.record_interaction(kind);
            }

            if let Event::Key(key) = event {
                if key.kind == KeyEventKind::Press {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        return Ok(());
                    }

                    if handle_input(app, key).await? {
                        return Ok(());
                    }
                }
            }
        }

        // Session redirects first, so stale results are dropped
        app.check_redirects();
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, MouseButton, MouseEvent};

    fn mouse(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_interaction_mapping() {
        let key = Event::Key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(interaction_for(&key), Some(InteractionKind::KeyPress));
        assert_eq!(
            interaction_for(&mouse(MouseEventKind::Down(MouseButton::Left))),
            Some(InteractionKind::PointerDown)
        );
        assert_eq!(
            interaction_for(&mouse(MouseEventKind::Moved)),
            Some(InteractionKind::PointerMove)
        );
        assert_eq!(
            interaction_for(&mouse(MouseEventKind::ScrollDown)),
            Some(InteractionKind::Scroll)
        );
        assert_eq!(interaction_for(&mouse(MouseEventKind::Up(MouseButton::Left))), None);
        assert_eq!(interaction_for(&Event::FocusGained), None);
    }
}
