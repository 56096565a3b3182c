use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair produced by geocoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Used before any city has been resolved (New York City).
    pub const FALLBACK: Coordinate = Coordinate { latitude: 40.7128, longitude: -74.0060 };

    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// Returned when a query is empty or only whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("City name must not be empty")]
pub struct EmptyQuery;

/// A non-empty, trimmed city name as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityQuery(String);

impl CityQuery {
    pub fn parse(raw: &str) -> Result<Self, EmptyQuery> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyQuery);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub weather_code: i32,
}

/// One day of the forecast; days are kept in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temp_max: f64,
    pub temp_min: f64,
    pub weather_code: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastData {
    pub current: CurrentConditions,
    pub daily: Vec<DailyForecast>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_query_is_trimmed() {
        let q = CityQuery::parse("  London \n").unwrap();
        assert_eq!(q.as_str(), "London");
    }

    #[test]
    fn blank_city_query_is_rejected() {
        assert_eq!(CityQuery::parse(""), Err(EmptyQuery));
        assert_eq!(CityQuery::parse(" \t "), Err(EmptyQuery));
    }

    #[test]
    fn default_coordinate_is_fallback() {
        let c = Coordinate::default();
        assert_eq!(c, Coordinate::new(40.7128, -74.006));
        assert_eq!(c.to_string(), "(40.7128, -74.006)");
    }
}
