//! Core library for the `weatherdash` terminal dashboard.
//!
//! This crate defines:
//! - Settings storage, including the persisted theme
//! - The city → coordinates → forecast pipeline and its state machine
//! - The Open-Meteo lookup client behind provider traits
//! - Weather code labels and text rendering of the dashboard
//!
//! It is used by `weatherdash-cli`, but can also be reused by other front ends.

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod theme;
pub mod view;
pub mod weather_code;

pub use config::{Config, EndpointConfig};
pub use error::LookupError;
pub use model::{CityQuery, Coordinate, CurrentConditions, DailyForecast, EmptyQuery, ForecastData};
pub use pipeline::{PipelineMachine, PipelineSnapshot, PipelineState, ResolutionPipeline};
pub use provider::{ForecastFetcher, GeocodingResolver, openmeteo::OpenMeteoClient};
pub use theme::{ThemeMode, ThemePreference};
pub use view::AppState;
