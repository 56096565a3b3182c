//! WMO weather interpretation codes as returned by Open-Meteo.
//! See: https://open-meteo.com/en/docs#weathervariables

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherLabel {
    pub icon: &'static str,
    pub text: &'static str,
}

impl fmt::Display for WeatherLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon, self.text)
    }
}

const fn label(icon: &'static str, text: &'static str) -> Option<WeatherLabel> {
    Some(WeatherLabel { icon, text })
}

/// Look up the display label for a weather code. Codes outside the table
/// have no label and callers render nothing for them.
pub fn describe(code: i32) -> Option<WeatherLabel> {
    match code {
        0 => label("☀️", "Clear sky"),
        1 => label("🌤️", "Mainly clear"),
        2 => label("⛅", "Partly cloudy"),
        3 => label("☁️", "Overcast"),
        45 => label("🌫️", "Foggy"),
        48 => label("🌫️", "Depositing rime fog"),
        51 => label("🌧️", "Light drizzle"),
        53 => label("🌧️", "Moderate drizzle"),
        55 => label("🌧️", "Dense drizzle"),
        61 => label("🌧️", "Slight rain"),
        63 => label("🌧️", "Moderate rain"),
        65 => label("🌧️", "Heavy rain"),
        71 => label("❄️", "Slight snow fall"),
        73 => label("❄️", "Moderate snow fall"),
        75 => label("❄️", "Heavy snow fall"),
        77 => label("❄️", "Snow grains"),
        80 => label("🌧️", "Slight rain showers"),
        81 => label("🌧️", "Moderate rain showers"),
        82 => label("🌧️", "Violent rain showers"),
        85 => label("❄️", "Slight snow showers"),
        86 => label("❄️", "Heavy snow showers"),
        95 => label("⛈️", "Thunderstorm"),
        96 => label("⛈️", "Thunderstorm with light hail"),
        99 => label("⛈️", "Thunderstorm with heavy hail"),
        _ => None,
    }
}
