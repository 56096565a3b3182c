//! Failures of the city → forecast lookup.
//!
//! The `Display` text of each variant is what the dashboard shows; the
//! `detail` fields only go to the log.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// Geocoding answered, but with no matching place.
    #[error("City not found. Please try another name.")]
    NotFound,

    #[error("Failed to find city coordinates")]
    GeocodeNetwork { detail: String },

    #[error("Failed to fetch weather data")]
    ForecastNetwork { detail: String },
}

impl LookupError {
    pub fn geocode(err: &anyhow::Error) -> Self {
        Self::GeocodeNetwork { detail: format!("{err:#}") }
    }

    pub fn forecast(err: &anyhow::Error) -> Self {
        Self::ForecastNetwork { detail: format!("{err:#}") }
    }

    /// Technical cause, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::NotFound => None,
            Self::GeocodeNetwork { detail } | Self::ForecastNetwork { detail } => Some(detail),
        }
    }
}
