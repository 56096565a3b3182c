use anyhow::Context;
use clap::{Parser, Subcommand};
use std::{io::IsTerminal, path::PathBuf, sync::Arc};
use weather_core::{
    AppState, Config, OpenMeteoClient, ResolutionPipeline, ThemePreference,
    provider::client_from_config,
    view::{self, Palette},
};

pub type Pipeline = ResolutionPipeline<Arc<OpenMeteoClient>, Arc<OpenMeteoClient>>;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Terminal weather dashboard")]
pub struct Cli {
    /// Print debug logs to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file to use instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Defaults to `dashboard`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive dashboard: search cities and toggle the theme.
    Dashboard,

    /// Look up one city and print its forecast.
    Show {
        /// City name, e.g. "London".
        city: String,
    },

    /// Show or toggle the light/dark theme.
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },

    /// Print the settings file path.
    ConfigPath,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ThemeAction {
    /// Print the active theme.
    Show,
    /// Flip between light and dark and save the choice.
    Toggle,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let settings_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command.unwrap_or(Command::Dashboard) {
            Command::Dashboard => {
                let config = Config::load_from(&settings_path)?;
                crate::dashboard::run(&config, &settings_path).await?;
            }
            Command::Show { city } => {
                let config = Config::load_from(&settings_path)?;
                let theme = ThemePreference::load(&settings_path)?;
                let pipeline = build_pipeline(&config)?;

                let snapshot = pipeline.search(&city).await?;
                let app = AppState { pipeline: snapshot, theme: theme.get() };
                print!("{}", view::render_with(&app, palette_for(&app)));
            }
            Command::Theme { action } => {
                let mut theme = ThemePreference::load(&settings_path)?;
                match action.unwrap_or(ThemeAction::Show) {
                    ThemeAction::Show => println!("{}", theme.get()),
                    ThemeAction::Toggle => println!("{}", theme.toggle()?),
                }
            }
            Command::ConfigPath => println!("{}", settings_path.display()),
        }

        Ok(())
    }
}

pub fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let client = Arc::new(client_from_config(config).context("Failed to set up weather client")?);
    Ok(ResolutionPipeline::new(client.clone(), client))
}

/// Themed colours on a terminal, plain text when piped or `NO_COLOR` is set.
pub fn palette_for(app: &AppState) -> Palette {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        Palette::plain()
    } else {
        Palette::for_theme(app.theme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_dashboard() {
        let cli = Cli::try_parse_from(["weatherdash"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn show_takes_city_and_global_flags() {
        let cli =
            Cli::try_parse_from(["weatherdash", "show", "New York", "-v", "--config", "/tmp/c.toml"])
                .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        match cli.command {
            Some(Command::Show { city }) => assert_eq!(city, "New York"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn theme_toggle_parses() {
        let cli = Cli::try_parse_from(["weatherdash", "theme", "toggle"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Theme { action: Some(ThemeAction::Toggle) })
        ));
    }

    #[test]
    fn build_pipeline_from_defaults() {
        let pipeline = build_pipeline(&Config::default()).unwrap();
        assert!(pipeline.snapshot().state.is_at_rest());
    }
}
