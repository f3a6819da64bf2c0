mod app;
mod barcode;
mod config;
mod frame;
mod panel;
mod prefs;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::App;
use barcode::{BarcodeLine, Symbology};
use config::AppConfig;
use prefs::{FilePreferenceStore, LocalAuth, PreferenceStore, UserId, DEFAULT_TYPE_KEY};

#[derive(Parser, Debug)]
#[command(name = "barcode-text")]
#[command(version)]
#[command(about = "Edit barcode text lines with a per-user default barcode type")]
struct Args {
    /// Sign in as this user on start (overrides the remembered user)
    #[arg(short, long)]
    user: Option<String>,

    /// Preference file to use instead of the configured one
    #[arg(short, long)]
    preferences: Option<PathBuf>,

    /// Start from the lines in this JSON file
    #[arg(short, long)]
    lines: Option<PathBuf>,

    /// Print the edited lines as JSON on exit
    #[arg(long)]
    json: bool,

    /// Print the stored default type as JSON and exit
    #[arg(long)]
    show_default: bool,

    /// Store a default type (QR, Code128) for --user and exit
    #[arg(long, requires = "user")]
    set_default: Option<Symbology>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    let config = AppConfig::load().unwrap_or_default();

    let prefs_path = match &args.preferences {
        Some(path) => path.clone(),
        None => config.preferences_path()?,
    };
    let store = Arc::new(FilePreferenceStore::new(prefs_path));

    let user = match args.user.as_deref().or(config.last_user.as_deref()) {
        Some(raw) => Some(UserId::parse(raw).with_context(|| format!("Invalid user id: {:?}", raw))?),
        None => None,
    };

    // Handle CLI-only commands
    if let Some(symbology) = args.set_default {
        let user = user.context("--set-default needs --user")?;
        return set_default(store.as_ref(), &user, symbology).await;
    }

    if args.show_default {
        return show_default(store.as_ref(), user.as_ref()).await;
    }

    let lines = match &args.lines {
        Some(path) => read_lines(path)?,
        None => Vec::new(),
    };

    let lines = run_tui(config, user, store, lines).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    }
    Ok(())
}

/// Log to a file in the config dir; the terminal belongs to the TUI
fn init_logging() {
    let file_layer = AppConfig::config_dir()
        .ok()
        .and_then(|dir| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("barcode-text.log"))
                .ok()
        })
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .init();
}

/// `RUST_LOG` directives on top of a warn default, so failed preference
/// loads and saves always reach the log
fn log_filter(directives: Option<String>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives.unwrap_or_default())
}

fn read_lines(path: &Path) -> Result<Vec<BarcodeLine>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let lines: Vec<BarcodeLine> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON list of lines", path.display()))?;

    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = lines.iter().find(|line| !seen.insert(line.id)) {
        anyhow::bail!("Duplicate line id {} in {}", dup.id, path.display());
    }
    Ok(lines)
}

async fn show_default(store: &dyn PreferenceStore, user: Option<&UserId>) -> Result<()> {
    let stored = match user {
        Some(user) => store.load(user, DEFAULT_TYPE_KEY).await?,
        None => None,
    };
    let default_type = stored
        .as_deref()
        .and_then(|raw| raw.parse::<Symbology>().ok())
        .unwrap_or(Symbology::FALLBACK);

    let output = serde_json::json!({
        "user": user.map(|u| u.as_str()),
        "defaultType": default_type,
        "stored": stored.is_some(),
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

async fn set_default(store: &dyn PreferenceStore, user: &UserId, symbology: Symbology) -> Result<()> {
    let values = BTreeMap::from([(DEFAULT_TYPE_KEY.to_string(), symbology.to_string())]);
    store.save(user, values).await?;
    println!("Default type for {} set to {}", user, symbology);
    Ok(())
}

async fn run_tui(
    config: AppConfig,
    user: Option<UserId>,
    store: Arc<FilePreferenceStore>,
    lines: Vec<BarcodeLine>,
) -> Result<Vec<BarcodeLine>> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let auth = Arc::new(LocalAuth::new(None));
    let mut app = App::new(config, auth, store, lines, true);
    if let Some(user) = user {
        app.sign_in(user);
    }

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

    result.map(|_| app.lines)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll faster while the panel animates
        let animating = app.frame.panel_animating(std::time::Instant::now());
        let poll = std::time::Duration::from_millis(if animating { 16 } else { 100 });

        if event::poll(poll)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return Ok(()),
                        _ => {
                            // Handle key and catch any errors to prevent crashes
                            if let Err(e) = app.handle_key(key).await {
                                app.status_message = Some(format!("Error: {}", e));
                            }
                        }
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
        }

        // Periodic refresh
        let _ = app.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_defaults_to_warn() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(Some(String::new())).max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_log_filter_honours_directives() {
        assert_eq!(log_filter(Some("debug".to_string())).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("trace".to_string())).max_level_hint(), Some(LevelFilter::TRACE));
    }
}
