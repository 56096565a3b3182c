use crate::{
    Config, Coordinate, ForecastData, LookupError, model::CityQuery,
    provider::openmeteo::OpenMeteoClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openmeteo;

/// Turns a city name into coordinates.
#[async_trait]
pub trait GeocodingResolver: Send + Sync + Debug {
    /// Returns the first match reported by the service; no re-ranking.
    async fn resolve(&self, city: &CityQuery) -> Result<Coordinate, LookupError>;
}

/// Fetches current conditions and the daily forecast for a coordinate.
#[async_trait]
pub trait ForecastFetcher: Send + Sync + Debug {
    async fn fetch(&self, coord: Coordinate) -> Result<ForecastData, LookupError>;
}

#[async_trait]
impl<T: GeocodingResolver + ?Sized> GeocodingResolver for Arc<T> {
    async fn resolve(&self, city: &CityQuery) -> Result<Coordinate, LookupError> {
        (**self).resolve(city).await
    }
}

#[async_trait]
impl<T: ForecastFetcher + ?Sized> ForecastFetcher for Arc<T> {
    async fn fetch(&self, coord: Coordinate) -> Result<ForecastData, LookupError> {
        (**self).fetch(coord).await
    }
}

/// Construct the Open-Meteo client from the configured endpoints.
pub fn client_from_config(config: &Config) -> anyhow::Result<OpenMeteoClient> {
    OpenMeteoClient::new(&config.endpoints)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
