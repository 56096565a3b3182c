use anyhow::{Context, Result};
use inquire::{InquireError, Select, Text};
use std::{fmt, path::Path};
use weather_core::{AppState, Config, PipelineSnapshot, ThemeMode, ThemePreference, view};

use crate::cli::{Pipeline, build_pipeline, palette_for};

const CITY_PLACEHOLDER: &str = "Enter city name (e.g. London, Paris, Tokyo)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Search,
    ToggleTheme(ThemeMode),
    Quit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Search => f.write_str("Search city"),
            Action::ToggleTheme(current) => write!(f, "Theme: {}", view::toggle_label(*current)),
            Action::Quit => f.write_str("Quit"),
        }
    }
}

/// Interactive loop: render, ask what to do, repeat.
pub async fn run(config: &Config, settings_path: &Path) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let mut theme = ThemePreference::load(settings_path)?;

    search(&pipeline, &theme, config.default_city()).await?;

    loop {
        draw(pipeline.snapshot(), &theme);

        let actions = vec![Action::Search, Action::ToggleTheme(theme.get()), Action::Quit];
        let Some(action) = answered(Select::new("What next?", actions).prompt())
            .context("Failed to read menu choice")?
        else {
            break;
        };

        match action {
            Action::Search => {
                let Some(city) = ask_city()? else { continue };
                // Whitespace-only input is not submitted.
                if city.trim().is_empty() {
                    continue;
                }
                search(&pipeline, &theme, &city).await?;
            }
            Action::ToggleTheme(_) => {
                if let Err(err) = theme.toggle() {
                    tracing::error!(error = %format!("{err:#}"), "Could not save theme");
                    eprintln!("Could not save theme: {err:#}");
                }
            }
            Action::Quit => break,
        }
    }

    Ok(())
}

/// Run a lookup, redrawing on every state change so the loading screen shows.
async fn search(pipeline: &Pipeline, theme: &ThemePreference, city: &str) -> Result<()> {
    pipeline.search_observed(city, |snapshot| draw(snapshot.clone(), theme)).await?;
    Ok(())
}

/// `None` when the user backs out with Esc or Ctrl-C.
fn answered<T>(res: Result<T, InquireError>) -> Result<Option<T>, InquireError> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err),
    }
}

fn ask_city() -> Result<Option<String>> {
    answered(Text::new("City:").with_placeholder(CITY_PLACEHOLDER).prompt())
        .context("Failed to read city name")
}

fn draw(snapshot: PipelineSnapshot, theme: &ThemePreference) {
    let app = AppState { pipeline: snapshot, theme: theme.get() };
    let palette = palette_for(&app);

    if !palette.reset.is_empty() {
        // Clear screen, cursor home.
        print!("\x1b[2J\x1b[H");
    }
    println!("{}", view::render_with(&app, palette));
}
