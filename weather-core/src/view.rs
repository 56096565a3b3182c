//! Text rendering of the dashboard.

use std::fmt::Write;

use crate::{
    model::{DailyForecast, ForecastData},
    pipeline::{PipelineSnapshot, PipelineState},
    theme::ThemeMode,
    weather_code,
};

/// Everything on screen: pipeline state and theme, each with its own owner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub pipeline: PipelineSnapshot,
    pub theme: ThemeMode,
}

/// ANSI styling for one theme. `plain()` emits no escape codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub title: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
    pub error: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn for_theme(theme: ThemeMode) -> Self {
        match theme {
            ThemeMode::Light => Self {
                title: "\x1b[1;34m",
                text: "\x1b[30m",
                muted: "\x1b[90m",
                error: "\x1b[31m",
                reset: "\x1b[0m",
            },
            ThemeMode::Dark => Self {
                title: "\x1b[1;96m",
                text: "\x1b[97m",
                muted: "\x1b[37m",
                error: "\x1b[91m",
                reset: "\x1b[0m",
            },
        }
    }

    pub fn plain() -> Self {
        Self { title: "", text: "", muted: "", error: "", reset: "" }
    }
}

/// Label on the theme toggle: names the theme it switches *to*.
pub fn toggle_label(theme: ThemeMode) -> &'static str {
    match theme {
        ThemeMode::Light => "🌙 Dark",
        ThemeMode::Dark => "☀️ Light",
    }
}

/// Render with the palette of the active theme.
pub fn render(app: &AppState) -> String {
    render_with(app, Palette::for_theme(app.theme))
}

pub fn render_with(app: &AppState, p: Palette) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_dashboard(&mut out, app, p);
    out
}

fn write_dashboard(out: &mut String, app: &AppState, p: Palette) -> std::fmt::Result {
    writeln!(out, "{}🌦️ Weather Dashboard{}    [{}]", p.title, p.reset, toggle_label(app.theme))?;
    writeln!(out)?;

    let snap = &app.pipeline;
    match &snap.state {
        PipelineState::Idle => {
            writeln!(out, "{}Enter city name (e.g. London, Paris, Tokyo){}", p.muted, p.reset)?;
        }
        PipelineState::ResolvingCity | PipelineState::ResolvingForecast => {
            writeln!(out, "{}Loading weather data...{}", p.muted, p.reset)?;
        }
        PipelineState::Error(err) => {
            writeln!(out, "{}{}{}", p.error, err, p.reset)?;
        }
        PipelineState::Ready(data) => write_forecast(out, snap, data, p)?,
    }
    Ok(())
}

fn write_forecast(
    out: &mut String,
    snap: &PipelineSnapshot,
    data: &ForecastData,
    p: Palette,
) -> std::fmt::Result {
    let city = snap.query.as_ref().map(|q| q.as_str()).unwrap_or("Unknown");

    writeln!(out, "{}Current Weather{}", p.title, p.reset)?;
    writeln!(out, "{}📍 Location: {} {}{}", p.text, city, snap.coordinate, p.reset)?;
    writeln!(out, "{}🌡️ Temperature: {}°C{}", p.text, data.current.temperature, p.reset)?;
    writeln!(out, "{}🌈 Condition: {}{}", p.text, label_for(data.current.weather_code), p.reset)?;
    writeln!(out)?;

    writeln!(out, "{}Daily Forecast{}", p.title, p.reset)?;
    for day in &data.daily {
        write_day(out, day, p)?;
    }
    Ok(())
}

fn write_day(out: &mut String, day: &DailyForecast, p: Palette) -> std::fmt::Result {
    write!(
        out,
        "{}{}{}  🌡️ High: {}°C  🌡️ Low: {}°C",
        p.muted,
        day.date.format("%a %d %b"),
        p.reset,
        day.temp_max,
        day.temp_min,
    )?;
    let label = label_for(day.weather_code);
    if label.is_empty() {
        writeln!(out)
    } else {
        writeln!(out, "  {label}")
    }
}

fn label_for(code: i32) -> String {
    weather_code::describe(code).map(|l| l.to_string()).unwrap_or_default()
}
