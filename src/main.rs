//! formstage - staged forms in the terminal
//!
//! Runs the expert registration wizard and the contact form against either a
//! configured HTTP backend or an offline simulation.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend as TerminalBackend, CrosstermBackend},
};

use formstage::application::{App, AppMode};
use formstage::domain::{Backend, SystemClock};
use formstage::infrastructure::{Config, HttpBackend, SimulatedBackend, init_tracing};
use formstage::presentation::{InputHandler, render_ui};

/// How long to wait for a key before checking on background work.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn config_path_from_args() -> Result<Option<PathBuf>, String> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => match args.next() {
                Some(value) => path = Some(PathBuf::from(value)),
                None => return Err("--config needs a path".to_string()),
            },
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(path)
}

fn build_app(config: &Config) -> Result<App, Box<dyn std::error::Error>> {
    let policy = config.otp.policy();
    let clock = Arc::new(SystemClock);

    let app = match &config.backend.base_url {
        Some(url) => {
            tracing::info!(%url, "using HTTP backend");
            let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(url, config.backend.timeout())?);
            App::new(backend, policy, config.otp.channel, clock)?
        }
        None => {
            tracing::info!("no backend configured, using simulation");
            let simulated = Arc::new(
                SimulatedBackend::new(config.simulation.delay(), policy)
                    .rejecting_registrations(config.simulation.reject_registrations),
            );
            let hint = Arc::clone(&simulated);
            App::new(simulated, policy, config.otp.channel, clock)?
                .with_code_hint(move || hint.last_code())
        }
    };
    Ok(app)
}

/// Entry point for the formstage terminal application.
///
/// Loads configuration, sets up file logging and the terminal, then runs the
/// event loop until the user quits from the menu.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path_from_args()?;
    let config = Config::load(config_path.as_deref())?;
    init_tracing(&config.logging.filter);
    let mut app = build_app(&config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal loop failed");
        println!("{err:?}");
    }

    Ok(())
}

/// Main application event loop.
///
/// Redraws, waits briefly for a key, and folds finished background work into
/// the forms on every pass.
fn run_app<B: TerminalBackend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| render_ui(f, app))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('q') if app.mode == AppMode::Menu => return Ok(()),
                _ => InputHandler::handle_key_event(app, key.code, key.modifiers),
            }
        }
    }
}
