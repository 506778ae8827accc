use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// One successful current-weather lookup.
///
/// The field layout follows the upstream response, which is also the shape
/// persisted in the history file. A snapshot is never updated in place;
/// a new lookup yields a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// City name as reported by the upstream.
    pub name: String,
    pub sys: SunInfo,
    pub main: Measurements,
    pub weather: Vec<Condition>,
    /// Offset from UTC in seconds.
    pub timezone: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunInfo {
    pub country: String,
    /// Epoch seconds, UTC.
    pub sunrise: i64,
    /// Epoch seconds, UTC.
    pub sunset: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Primary category, e.g. "Rain", "Clear", "Clouds".
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// Primary weather category, as reported in `weather[0].main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Snow,
    Thunderstorm,
    Atmosphere,
    Other,
}

impl ConditionKind {
    pub fn from_main(main: &str) -> Self {
        match main {
            "Clear" => ConditionKind::Clear,
            "Clouds" => ConditionKind::Clouds,
            "Rain" => ConditionKind::Rain,
            "Drizzle" => ConditionKind::Drizzle,
            "Snow" => ConditionKind::Snow,
            "Thunderstorm" => ConditionKind::Thunderstorm,
            "Mist" | "Smoke" | "Haze" | "Dust" | "Fog" | "Sand" | "Ash" | "Squall" | "Tornado" => {
                ConditionKind::Atmosphere
            }
            _ => ConditionKind::Other,
        }
    }
}

impl WeatherSnapshot {
    /// Key used to deduplicate history entries.
    pub fn location_name(&self) -> &str {
        &self.name
    }

    /// "City, CC"
    pub fn location_label(&self) -> String {
        format!("{}, {}", self.name, self.sys.country)
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.weather.first()
    }

    pub fn condition_kind(&self) -> ConditionKind {
        self.condition()
            .map(|c| ConditionKind::from_main(&c.main))
            .unwrap_or(ConditionKind::Other)
    }

    /// Formats an epoch timestamp as `HH:MM` in the location's local time.
    pub fn format_local_time(&self, ts: i64) -> String {
        ts.checked_add(self.timezone)
            .and_then(|local| DateTime::<Utc>::from_timestamp(local, 0))
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string())
    }

    pub fn sunrise_local(&self) -> String {
        self.format_local_time(self.sys.sunrise)
    }

    pub fn sunset_local(&self) -> String {
        self.format_local_time(self.sys.sunset)
    }

    /// True when `now` lies outside the sunrise..sunset window of this snapshot.
    pub fn is_night_at(&self, now: DateTime<Utc>) -> bool {
        let ts = now.timestamp();
        ts < self.sys.sunrise || ts >= self.sys.sunset
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn snapshot(name: &str, country: &str, temp: f64, humidity: u8) -> WeatherSnapshot {
        WeatherSnapshot {
            name: name.to_string(),
            sys: SunInfo { country: country.to_string(), sunrise: 1_700_000_000, sunset: 1_700_043_200 },
            main: Measurements { temp, feels_like: temp + 2.0, humidity },
            weather: vec![Condition {
                main: "Clouds".to_string(),
                description: "scattered clouds".to_string(),
                icon: "03d".to_string(),
            }],
            timezone: 28_800,
        }
    }
}
