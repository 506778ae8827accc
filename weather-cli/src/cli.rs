use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use tokio::sync::broadcast::{Receiver, error::TryRecvError};
use tracing::debug;
use weather_core::{
    Config, FileHistoryStore, OpenWeatherClient, SessionEvent, WeatherClient, WeatherSession,
    client_from_config,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key and default city.
    Configure,

    /// Show current weather for a place.
    Show {
        /// City, optionally with country code, e.g. "Manila, PH".
        /// Falls back to the configured default location.
        query: Option<String>,
    },

    /// Show current weather at a latitude/longitude.
    Coords {
        #[arg(allow_negative_numbers = true)]
        lat: f64,

        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },

    /// List previous lookups, newest first.
    History {
        /// Choose an entry and show it again without a new lookup.
        #[arg(long)]
        pick: bool,
    },

    /// Forget all previous lookups.
    Clear,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => configure(&mut config),
            Command::Show { query } => {
                let session = open_session(&config, true).await?;
                let mut events = session.events();

                let pending = match query {
                    Some(query) => session
                        .submit_city_query(&query)
                        .ok_or_else(|| anyhow!("Location must not be empty"))?,
                    None => session
                        .load_default(&config.default_location())
                        .ok_or_else(|| anyhow!("Default location is empty"))?,
                };
                pending.await.context("Weather lookup task failed")?;

                report_events(&mut events);
                render::state(&session.current_state())
            }
            Command::Coords { lat, lon } => {
                let session = open_session(&config, true).await?;
                let mut events = session.events();

                session.submit_coordinates(lat, lon).await.context("Weather lookup task failed")?;

                report_events(&mut events);
                render::state(&session.current_state())
            }
            Command::History { pick } => {
                let session = open_session(&config, false).await?;
                let history = session.current_history();

                if !pick || history.is_empty() {
                    render::history(&history);
                    return Ok(());
                }

                let labels: Vec<String> = history.iter().map(render::history_line).collect();
                let choice = Select::new("Show which lookup?", labels).raw_prompt()?;

                session.select_history_entry(history[choice.index].snapshot().clone());
                render::state(&session.current_state())
            }
            Command::Clear => {
                let session = open_session(&config, false).await?;
                let mut events = session.events();

                session.clear_history().await;

                if report_events(&mut events) {
                    return Err(anyhow!("History was cleared for this run but could not be saved"));
                }
                println!("History cleared.");
                Ok(())
            }
        }
    }
}

fn configure(config: &mut Config) -> anyhow::Result<()> {
    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    if api_key.trim().is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }

    let current_city = config.default_city.clone().unwrap_or_default();
    let city = Text::new("Default city (optional):")
        .with_default(&current_city)
        .with_help_message("e.g. \"Manila, PH\"; leave empty to keep the current default")
        .prompt()?;

    config.configure(api_key.trim().to_string(), Some(city));
    config.save()?;

    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

/// `history` and `clear` never reach the client: they only read the store,
/// select an already-fetched snapshot or clear the list. They get an
/// unauthenticated client so they keep working before `weather configure`.
async fn open_session(config: &Config, needs_network: bool) -> anyhow::Result<WeatherSession> {
    let client: Arc<dyn WeatherClient> = if needs_network {
        Arc::new(client_from_config(config)?)
    } else {
        Arc::new(OpenWeatherClient::new(config.api_key().unwrap_or_default()))
    };

    let history_path = config.history_file_path()?;
    debug!(path = %history_path.display(), needs_network, "opening weather session");
    let store = FileHistoryStore::open(history_path).await;

    Ok(WeatherSession::new(client, Arc::new(store)))
}

/// Print pending session notices. Returns true if any were reported.
fn report_events(events: &mut Receiver<SessionEvent>) -> bool {
    let mut reported = false;

    loop {
        match events.try_recv() {
            Ok(SessionEvent::PersistenceFailed(msg)) => {
                eprintln!("warning: {msg}");
                reported = true;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                eprintln!("warning: {skipped} notices dropped");
                reported = true;
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    reported
}
