use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    config::EndpointConfig,
    error::LookupError,
    model::{CityQuery, Coordinate, CurrentConditions, DailyForecast, ForecastData},
    provider::truncate_body,
};

use super::{ForecastFetcher, GeocodingResolver};

const USER_AGENT: &str = concat!("weatherdash/", env!("CARGO_PKG_VERSION"));

/// Open-Meteo geocoding + forecast client. Neither endpoint needs an API key.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: Client,
    geocoding_url: String,
    forecast_url: String,
}

impl OpenMeteoClient {
    pub fn new(endpoints: &EndpointConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(endpoints.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            geocoding_url: endpoints.geocoding_url.clone(),
            forecast_url: endpoints.forecast_url.clone(),
        })
    }

    /// `Ok(None)` when the service answered but found nothing.
    async fn search(&self, name: &str) -> Result<Option<Coordinate>> {
        tracing::debug!(city = name, "Sending geocoding request");

        let res = self
            .http
            .get(&self.geocoding_url)
            .query(&[("name", name), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await
            .context("Failed to send request to Open-Meteo (geocoding)")?;

        let parsed: OmGeocodingResponse = read_json(res, "geocoding").await?;

        Ok(parsed
            .results
            .unwrap_or_default()
            .first()
            .map(|r| Coordinate::new(r.latitude, r.longitude)))
    }

    async fn forecast(&self, coord: Coordinate) -> Result<ForecastData> {
        tracing::debug!(%coord, "Sending forecast request");

        let res = self
            .http
            .get(&self.forecast_url)
            .query(&[
                ("latitude", coord.latitude.to_string()),
                ("longitude", coord.longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("hourly", "temperature_2m,weathercode".to_string()),
                ("daily", "weathercode,temperature_2m_max,temperature_2m_min".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .context("Failed to send request to Open-Meteo (forecast)")?;

        let parsed: OmForecastResponse = read_json(res, "forecast").await?;
        parsed.into_forecast()
    }
}

async fn read_json<T: DeserializeOwned>(res: reqwest::Response, what: &str) -> Result<T> {
    let status = res.status();
    let body = res
        .text()
        .await
        .with_context(|| format!("Failed to read Open-Meteo {what} response body"))?;

    if !status.is_success() {
        return Err(anyhow!(
            "Open-Meteo {what} request failed with status {}: {}",
            status,
            truncate_body(&body),
        ));
    }

    serde_json::from_str(&body).with_context(|| format!("Failed to parse Open-Meteo {what} JSON"))
}

#[derive(Debug, Deserialize)]
struct OmGeocodingResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct OmGeocodingResponse {
    #[serde(default)]
    results: Option<Vec<OmGeocodingResult>>,
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    temperature: f64,
    weathercode: i32,
}

#[derive(Debug, Deserialize)]
struct OmDaily {
    time: Vec<NaiveDate>,
    temperature_2m_max: Vec<f64>,
    temperature_2m_min: Vec<f64>,
    weathercode: Vec<i32>,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    current_weather: OmCurrentWeather,
    daily: OmDaily,
}

impl OmForecastResponse {
    fn into_forecast(self) -> Result<ForecastData> {
        let OmDaily { time, temperature_2m_max, temperature_2m_min, weathercode } = self.daily;

        let n = time.len();
        if temperature_2m_max.len() != n || temperature_2m_min.len() != n || weathercode.len() != n
        {
            return Err(anyhow!(
                "Open-Meteo daily series have mismatched lengths (time={}, max={}, min={}, code={})",
                n,
                temperature_2m_max.len(),
                temperature_2m_min.len(),
                weathercode.len(),
            ));
        }

        let daily = time
            .into_iter()
            .zip(temperature_2m_max)
            .zip(temperature_2m_min)
            .zip(weathercode)
            .map(|(((date, temp_max), temp_min), weather_code)| DailyForecast {
                date,
                temp_max,
                temp_min,
                weather_code,
            })
            .collect();

        Ok(ForecastData {
            current: CurrentConditions {
                temperature: self.current_weather.temperature,
                weather_code: self.current_weather.weathercode,
            },
            daily,
        })
    }
}

#[async_trait]
impl GeocodingResolver for OpenMeteoClient {
    async fn resolve(&self, city: &CityQuery) -> Result<Coordinate, LookupError> {
        match self.search(city.as_str()).await {
            Ok(Some(coord)) => Ok(coord),
            Ok(None) => {
                tracing::warn!(city = %city, "Geocoding returned no results");
                Err(LookupError::NotFound)
            }
            Err(err) => {
                tracing::warn!(city = %city, error = %format!("{err:#}"), "Geocoding failed");
                Err(LookupError::geocode(&err))
            }
        }
    }
}

#[async_trait]
impl ForecastFetcher for OpenMeteoClient {
    async fn fetch(&self, coord: Coordinate) -> Result<ForecastData, LookupError> {
        self.forecast(coord).await.map_err(|err| {
            tracing::warn!(%coord, error = %format!("{err:#}"), "Forecast fetch failed");
            LookupError::forecast(&err)
        })
    }
}
