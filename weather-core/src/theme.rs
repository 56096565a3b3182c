//! Light/dark preference, persisted write-through to the settings file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The active theme plus the settings file it is mirrored to.
///
/// Memory and disk never disagree: `toggle` writes first and only then
/// updates the in-memory value.
#[derive(Debug)]
pub struct ThemePreference {
    mode: ThemeMode,
    path: PathBuf,
}

impl ThemePreference {
    /// Read the persisted theme once; absent means `Light`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cfg = Config::load_from(&path).context("Failed to read theme preference")?;
        let mode = cfg.theme.unwrap_or_default();
        tracing::debug!(theme = %mode, path = %path.display(), "Loaded theme preference");

        Ok(Self { mode, path })
    }

    pub fn get(&self) -> ThemeMode {
        self.mode
    }

    pub fn toggle(&mut self) -> Result<ThemeMode> {
        let next = self.mode.toggled();

        // Re-read so other settings written since startup are preserved.
        let mut cfg = Config::load_from(&self.path)?;
        cfg.theme = Some(next);
        cfg.save_to(&self.path).context("Failed to persist theme preference")?;

        self.mode = next;
        tracing::info!(theme = %next, "Theme toggled");
        Ok(next)
    }
}
