//! Terminal UI for yieldcast that estimates solar yield for a UK postcode.

mod app;
mod input;
mod ui;

use std::{
    env,
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing_subscriber::EnvFilter;
use yieldcast_core::{
    config::Settings, model::SystemSpec, service::YieldService, sources::DataSources,
};
use yieldcast_provider_nasa_power::NasaPowerSource;
use yieldcast_provider_postcodes::PostcodesIoLookup;

use crate::app::{App, describe_error};
use crate::input::Action;

/// Environment variable naming a TOML settings file.
const CONFIG_ENV: &str = "YIELDCAST_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_settings()?;
    if let Some(path) = &settings.log_file {
        init_logging(path)?;
    }

    // HTTP + service setup
    let client = Client::builder()
        .user_agent(settings.user_agent.as_str())
        .build()?;
    let postcodes = PostcodesIoLookup::with_base_url(client.clone(), &settings.postcodes_base_url)
        .with_timeout(settings.location_timeout());
    let climate = NasaPowerSource::with_base_url(client, &settings.nasa_power_base_url)
        .with_timeout(settings.climate_timeout());
    let sources = DataSources::new(Arc::new(postcodes), Arc::new(climate));
    let service = Arc::new(YieldService::from_settings(&sources, &settings));

    tracing::info!(
        postcodes = %settings.postcodes_base_url,
        climate = %settings.nasa_power_base_url,
        "yieldcast started"
    );

    // App state
    let app = App::new(service);

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

fn load_settings() -> Result<Settings> {
    let mut settings = match env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            Settings::from_toml_file(&path)
                .with_context(|| format!("loading settings from {}", path.display()))?
        }
        None => Settings::default(),
    };
    settings
        .apply_env()
        .context("applying YIELDCAST_* overrides")?;
    Ok(settings)
}

// The terminal belongs to the UI, so log lines go to a file.
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("installing log subscriber: {err}"))
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        // Draw current UI
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            match input::handle_key_event(key, &mut app) {
                Action::Quit => break,
                Action::None => {}
                Action::Estimate => {
                    if app.form.postcode.trim().is_empty() {
                        app.error_message = Some("Type a postcode, then press Enter".into());
                        continue;
                    }

                    let spec = match app.form.build_spec() {
                        Ok(spec) => SystemSpec::from(spec),
                        Err(message) => {
                            app.error_message = Some(message);
                            continue;
                        }
                    };

                    app.is_loading = true;
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    app.service.purge_expired();
                    let res = app.service.estimate(&app.form.postcode, &spec).await;

                    app.is_loading = false;
                    match res {
                        Ok(estimate) => app.show_estimate(estimate),
                        Err(err) => {
                            tracing::warn!(code = err.kind().code(), error = %err, "estimate failed");
                            app.error_message = Some(describe_error(&err));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
