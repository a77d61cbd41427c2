//! Interactive dashboard loop.

use std::{fmt, time::Instant};

use anyhow::Result;
use inquire::{InquireError, Select, Text};
use weatherdash_core::{DashboardController, DashboardError, FileStore};

use crate::{cli::print_notification, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Search,
    OpenFavorite,
    AddFavorite,
    RemoveFavorite,
    ToggleUnit,
    Quit,
}

impl Action {
    const ALL: [Action; 6] = [
        Action::Search,
        Action::OpenFavorite,
        Action::AddFavorite,
        Action::RemoveFavorite,
        Action::ToggleUnit,
        Action::Quit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Search => "Search a city",
            Action::OpenFavorite => "Get weather for a favorite",
            Action::AddFavorite => "Add current city to favorites",
            Action::RemoveFavorite => "Remove a favorite",
            Action::ToggleUnit => "Switch °C / °F",
            Action::Quit => "Quit",
        })
    }
}

pub async fn run(mut dash: DashboardController<FileStore>) -> Result<()> {
    loop {
        dash.expire_notification(Instant::now());

        let action = match prompt(Select::new("What next?", Action::ALL.to_vec()).prompt())? {
            Some(action) => action,
            None => return Ok(()),
        };

        match action {
            Action::Search => search(&mut dash).await?,
            Action::OpenFavorite => {
                if let Some(city) = pick_favorite(&dash, "Favorite:")? {
                    dash.select_favorite(&city).await;
                }
            }
            Action::AddFavorite => match dash.add_favorite() {
                Ok(_) => {}
                Err(DashboardError::NoWeatherLoaded) => println!("Search for a city first."),
                Err(err) => return Err(err.into()),
            },
            Action::RemoveFavorite => {
                if let Some(city) = pick_favorite(&dash, "Remove:")? {
                    dash.remove_favorite(&city)?;
                }
            }
            Action::ToggleUnit => {
                dash.toggle_unit()?;
            }
            Action::Quit => return Ok(()),
        }

        println!();
        print!("{}", render::view(dash.view(), dash.unit()));
        print_notification(&dash);
        print!("\n{}", render::favorites(dash.favorites()));
        println!();
    }
}

async fn search(dash: &mut DashboardController<FileStore>) -> Result<()> {
    let Some(text) = prompt(Text::new("City:").prompt())? else {
        return Ok(());
    };

    dash.query_suggestions(&text).await;
    let suggestions: Vec<String> = dash.view().suggestions.iter().map(|s| s.to_string()).collect();

    let query = if suggestions.is_empty() {
        text
    } else {
        let typed = format!("\"{}\" as typed", text.trim());
        let mut options = suggestions;
        options.push(typed.clone());
        match prompt(Select::new("Did you mean:", options).prompt())? {
            Some(choice) if choice == typed => text,
            Some(choice) => choice,
            None => return Ok(()),
        }
    };

    dash.search(&query).await;
    Ok(())
}

fn pick_favorite(dash: &DashboardController<FileStore>, message: &str) -> Result<Option<String>> {
    if dash.favorites().is_empty() {
        println!("No favorite cities added.");
        return Ok(None);
    }
    prompt(Select::new(message, dash.favorites().to_vec()).prompt())
}

/// Esc / Ctrl-C end the current prompt instead of failing.
fn prompt<T>(answer: Result<T, InquireError>) -> Result<Option<T>> {
    match answer {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
