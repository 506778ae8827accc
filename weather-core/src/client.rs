use crate::{Config, WeatherError, WeatherSnapshot, model::Coordinates};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

pub use openweather::OpenWeatherClient;

/// Stateless access to the upstream current-weather endpoint.
///
/// Each call performs exactly one request. Errors are returned as-is; there
/// is no retry and no caching.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    async fn fetch_by_coordinates(&self, coords: Coordinates) -> Result<WeatherSnapshot, WeatherError>;

    /// `query` is free text, optionally "City, CC". Blank queries are rejected.
    async fn fetch_by_place(&self, query: &str) -> Result<WeatherSnapshot, WeatherError>;
}

/// Construct the OpenWeather client from config.
pub fn client_from_config(config: &Config) -> anyhow::Result<OpenWeatherClient> {
    build_client(config, config.api_key())
}

fn build_client(config: &Config, api_key: Option<String>) -> anyhow::Result<OpenWeatherClient> {
    let api_key = api_key.ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured.\n\
                 Hint: run `weather configure` or set OPENWEATHER_API_KEY."
        )
    })?;

    OpenWeatherClient::builder(api_key)
        .base_url(config.base_url())
        .timeout(config.request_timeout())
        .build()
}
