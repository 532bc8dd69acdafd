//! Fleetdesk - a terminal console for the fleet records service.
//!
//! Browse and edit cars and owners, view statistics and, as an administrator,
//! manage accounts and system settings. A few one-shot commands run without
//! the full-screen interface.

mod app;
mod config;
mod forms;
mod ui;
mod utils;

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fleetdesk_core::Console;

use app::{App, AppState};
use config::Config;
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_NAME: &str = "fleetdesk.log";

const USAGE: &str = "\
Usage: fleetdesk [COMMAND]

Without a command the interactive console starts.

Commands:
  --status    Check that the backend is reachable
  --login     Log in and store the session token
  --logout    Forget the stored session token
  --whoami    Show the account of the stored session
  --help      Show this message

Environment:
  FLEETDESK_API_URL                        Backend base URL
  FLEETDESK_USERNAME, FLEETDESK_PASSWORD   Credentials for --login
  RUST_LOG                                 Log filter (default: warn)";

/// Log to stderr; used by the one-shot commands.
fn init_cli_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Log to a file in the cache directory; the terminal belongs to the UI.
/// The returned guard flushes the writer when dropped.
fn init_tui_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let dir = config.cache_dir().ok()?;
    if std::fs::create_dir_all(&dir).is_err() {
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = args.first() {
        if command == "--help" || command == "-h" {
            println!("{}", USAGE);
            return Ok(());
        }
        init_cli_tracing();
        return match command.as_str() {
            "--status" => status(&config).await,
            "--login" => login(config).await,
            "--logout" => logout(&config).await,
            "--whoami" => whoami(&config).await,
            other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
        };
    }

    let _log_guard = init_tui_tracing(&config);
    info!(api = %config.api_base_url, "Fleetdesk starting");

    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // The stored session is checked while the loop already draws
    app.start();

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableFocusChange)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Fleetdesk shutting down");
    Ok(())
}

fn connect(config: &Config) -> Result<Console> {
    let tokens = config.token_store()?;
    Console::connect(&config.api_base_url, config.request_timeout(), tokens)
}

async fn status(config: &Config) -> Result<()> {
    let console = connect(config)?;
    let status = console
        .fetch_status()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .with_context(|| format!("Backend at {} is not reachable", config.api_base_url))?;
    println!(
        "{} {} is {} ({})",
        status.app, status.version, status.status, config.api_base_url
    );
    match console.greeting().await {
        Ok(greeting) => println!("{}", greeting),
        Err(e) => warn!(error = %e.user_message(), "No greeting from the backend"),
    }
    Ok(())
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn login(mut config: Config) -> Result<()> {
    let (env_user, env_password) = Config::env_credentials(|name| std::env::var(name).ok());
    let username = match env_user {
        Some(username) => username,
        None => {
            let remembered = config.last_username.clone().unwrap_or_default();
            let label = if remembered.is_empty() {
                "Username: ".to_string()
            } else {
                format!("Username [{}]: ", remembered)
            };
            let typed = prompt_line(&label)?;
            if typed.is_empty() {
                remembered
            } else {
                typed
            }
        }
    };
    let password = match env_password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };

    let console = connect(&config)?;
    console
        .login(&username, &password)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let snapshot = console.snapshot();
    let role = snapshot
        .identity
        .as_ref()
        .map(|u| u.role.to_string())
        .unwrap_or_default();
    println!("Logged in as {} ({})", username.trim(), role);

    config.last_username = Some(username.trim().to_string());
    config.save()?;
    Ok(())
}

async fn logout(config: &Config) -> Result<()> {
    let console = connect(config)?;
    console.logout();
    println!("Logged out");
    Ok(())
}

async fn whoami(config: &Config) -> Result<()> {
    let console = connect(config)?;
    console.initialize().await;
    match console.snapshot().identity {
        Some(user) => println!("{} ({})", user.username, user.role),
        None => bail!("Not logged in. Run `fleetdesk --login` first."),
    }
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout so queries and timers keep moving
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        return Ok(());
                    }
                    if handle_input(app, key).await? {
                        return Ok(());
                    }
                }
                Event::FocusGained => app.focus_gained(),
                _ => {}
            }
        }

        // Let spawned fetches make progress between frames
        tokio::task::yield_now().await;

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
