use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use inquire::Password;
use weatherdash_core::{
    Config, DashboardController, FileStore, Phase, PreferencesStore, WeatherProvider,
    provider_from_config,
};

use crate::{interactive, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Terminal weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the WeatherAPI.com API key.
    Configure,

    /// Show current weather, the next hours and the week for a city.
    Show {
        /// City name or any query WeatherAPI understands.
        city: String,
    },

    /// Show the weather of a past day.
    History {
        city: String,

        /// Day in YYYY-MM-DD format.
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Suggest cities matching a prefix.
    Search { prefix: String },

    /// Manage favorite cities. Lists them when no action is given.
    Favorites {
        #[command(subcommand)]
        action: Option<FavoritesCommand>,
    },

    /// Show the temperature unit, or switch between Celsius and Fahrenheit.
    Unit {
        #[arg(long)]
        toggle: bool,
    },

    /// Interactive dashboard.
    Dashboard,
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    List,
    /// Look the city up and save the name the provider resolves it to.
    Add { city: String },
    Remove { city: String },
    /// Show the weather for a saved favorite.
    Show { city: String },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config)?,
            Command::Show { city } => {
                let mut dash = open_dashboard(&config)?;
                dash.search(&city).await;
                finish_fetch(&dash)?;
            }
            Command::History { city, date } => {
                let provider = provider_from_config(&config)?;
                let snapshot = provider
                    .historical(&city, date)
                    .await
                    .with_context(|| format!("Failed to fetch weather for {city} on {date}"))?;
                let prefs = open_preferences(&config)?;
                println!("{date}");
                print!("{}", render::snapshot(&snapshot, prefs.unit()));
            }
            Command::Search { prefix } => {
                let mut dash = open_dashboard(&config)?;
                dash.query_suggestions(&prefix).await;
                print!("{}", render::suggestions(&dash.view().suggestions));
            }
            Command::Favorites { action } => favorites(&config, action.unwrap_or(FavoritesCommand::List)).await?,
            Command::Unit { toggle } => {
                let mut prefs = open_preferences(&config)?;
                if toggle {
                    prefs.set_unit(prefs.unit().toggled())?;
                }
                println!("°{}", prefs.unit());
            }
            Command::Dashboard => {
                let dash = open_dashboard(&config)?;
                interactive::run(dash).await?;
            }
        }

        Ok(())
    }
}

async fn favorites(config: &Config, action: FavoritesCommand) -> Result<()> {
    match action {
        FavoritesCommand::List => {
            print!("{}", render::favorites(open_preferences(config)?.favorites()));
        }
        FavoritesCommand::Add { city } => {
            let mut dash = open_dashboard(config)?;
            dash.search(&city).await;
            if let Some(err) = &dash.view().error {
                bail!("{err}");
            }
            if !dash.add_favorite()? {
                println!("Already a favorite.");
            }
            print_notification(&dash);
        }
        FavoritesCommand::Remove { city } => {
            let mut prefs = open_preferences(config)?;
            if prefs.remove_favorite(&city)? {
                println!("{city} removed from favorites!");
            } else {
                println!("{city} is not a favorite.");
            }
        }
        FavoritesCommand::Show { city } => {
            let mut dash = open_dashboard(config)?;
            dash.select_favorite(&city).await;
            finish_fetch(&dash)?;
        }
    }
    Ok(())
}

fn configure(mut config: Config) -> Result<()> {
    let key = Password::new("WeatherAPI.com API key:")
        .without_confirmation()
        .with_help_message("Get one at https://www.weatherapi.com/my/")
        .prompt()
        .context("No API key entered")?;

    config.set_api_key(key.trim().to_string());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

pub fn open_preferences(config: &Config) -> Result<PreferencesStore<FileStore>> {
    let path = config.storage_path()?;
    tracing::debug!(path = %path.display(), "opening preferences");
    Ok(PreferencesStore::load(FileStore::open(path)))
}

pub fn open_dashboard(config: &Config) -> Result<DashboardController<FileStore>> {
    let provider: Arc<dyn WeatherProvider> = Arc::from(provider_from_config(config)?);
    let prefs = open_preferences(config)?;
    Ok(DashboardController::new(provider, prefs).with_notification_ttl(config.notification_ttl()))
}

/// Print a finished fetch, turning a failure into the process error.
fn finish_fetch(dash: &DashboardController<FileStore>) -> Result<()> {
    let view = dash.view();
    if view.phase == Phase::Failed {
        bail!("{}", view.error.as_deref().unwrap_or("Error: weather could not be loaded"));
    }
    print!("{}", render::view(view, dash.unit()));
    Ok(())
}

pub fn print_notification(dash: &DashboardController<FileStore>) {
    if let Some(note) = dash.notification(std::time::Instant::now()) {
        println!("{}", note.message);
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}
