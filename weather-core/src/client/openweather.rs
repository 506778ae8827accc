use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{WeatherError, WeatherSnapshot, model::Coordinates};

use super::WeatherClient;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

#[derive(Debug)]
pub struct OpenWeatherClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl OpenWeatherClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> anyhow::Result<OpenWeatherClient> {
        let mut http = Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }

        Ok(OpenWeatherClient {
            api_key: self.api_key,
            base_url: self.base_url,
            http: http.build().map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?,
        })
    }
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn builder(api_key: impl Into<String>) -> OpenWeatherClientBuilder {
        OpenWeatherClientBuilder {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }

    async fn fetch_current(&self, params: &[(&str, &str)]) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(transport)?;

        let status = res.status();
        let body = res.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(WeatherError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body)
                    .unwrap_or_else(|| format!("Request failed with status {}: {}", status, truncate_body(&body))),
            });
        }

        let parsed: WeatherSnapshot = serde_json::from_str(&body)?;

        if parsed.weather.is_empty() {
            return Err(WeatherError::Schema("response contained no weather conditions".to_string()));
        }

        Ok(parsed)
    }
}

/// The request URL carries the API key, so it is stripped from the error.
fn transport(err: reqwest::Error) -> WeatherError {
    WeatherError::Transport(err.without_url())
}

/// Error body the upstream sends alongside a non-success status.
#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: String,
}

fn upstream_message(body: &str) -> Option<String> {
    serde_json::from_str::<OwErrorBody>(body)
        .ok()
        .map(|e| e.message)
        .filter(|m| !m.trim().is_empty())
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn fetch_by_coordinates(&self, coords: Coordinates) -> Result<WeatherSnapshot, WeatherError> {
        debug!(lat = coords.lat, lon = coords.lon, "fetching current weather by coordinates");
        let lat = coords.lat.to_string();
        let lon = coords.lon.to_string();
        self.fetch_current(&[("lat", lat.as_str()), ("lon", lon.as_str())]).await
    }

    async fn fetch_by_place(&self, query: &str) -> Result<WeatherSnapshot, WeatherError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(WeatherError::InvalidQuery);
        }

        debug!(query, "fetching current weather by place");
        self.fetch_current(&[("q", query)]).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const MANILA: &str = r#"{
        "coord": {"lon": 120.98, "lat": 14.6},
        "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}],
        "main": {"temp": 30.5, "feels_like": 35.2, "humidity": 70},
        "sys": {"country": "PH", "sunrise": 1700000000, "sunset": 1700043200},
        "timezone": 28800,
        "name": "Manila",
        "cod": 200
    }"#;

    fn client(server: &Server) -> OpenWeatherClient {
        OpenWeatherClient::builder("TEST_KEY")
            .base_url(server.url())
            .build()
            .expect("client builds")
    }

    #[tokio::test]
    async fn fetch_by_place_sends_query_key_and_units() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/weather")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "Manila, PH".into()),
                Matcher::UrlEncoded("appid".into(), "TEST_KEY".into()),
                Matcher::UrlEncoded("units".into(), "metric".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(MANILA)
            .create_async()
            .await;

        let snap = client(&server).fetch_by_place("  Manila, PH ").await.expect("success");

        mock.assert_async().await;
        assert_eq!(snap.name, "Manila");
        assert_eq!(snap.sys.country, "PH");
        assert_eq!(snap.main.temp, 30.5);
        assert_eq!(snap.main.humidity, 70);
        assert_eq!(snap.timezone, 28800);
    }

    #[tokio::test]
    async fn fetch_by_coordinates_sends_lat_lon() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/weather")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("lat".into(), "14.6".into()),
                Matcher::UrlEncoded("lon".into(), "120.98".into()),
                Matcher::UrlEncoded("units".into(), "metric".into()),
            ]))
            .with_status(200)
            .with_body(MANILA)
            .create_async()
            .await;

        let snap = client(&server)
            .fetch_by_coordinates(Coordinates { lat: 14.6, lon: 120.98 })
            .await
            .expect("success");

        mock.assert_async().await;
        assert_eq!(snap.name, "Manila");
    }

    #[tokio::test]
    async fn not_found_surfaces_upstream_message() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"cod":"404","message":"city not found"}"#)
            .create_async()
            .await;

        let err = client(&server).fetch_by_place("Nowhere123").await.unwrap_err();

        assert!(matches!(err, WeatherError::Upstream { status: 404, .. }));
        assert_eq!(err.to_string(), "city not found");
    }

    #[tokio::test]
    async fn non_json_error_body_is_truncated_into_message() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(502)
            .with_body("x".repeat(500))
            .create_async()
            .await;

        let err = client(&server).fetch_by_place("London").await.unwrap_err();

        match err {
            WeatherError::Upstream { status, message } => {
                assert_eq!(status, 502);
                assert!(message.contains("502"));
                assert!(message.ends_with("..."));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_schema_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"name": "Manila", "main": {"temp": 30.5}}"#)
            .create_async()
            .await;

        let err = client(&server).fetch_by_place("Manila").await.unwrap_err();
        assert!(matches!(err, WeatherError::Schema(_)));
    }

    #[tokio::test]
    async fn empty_conditions_is_schema_error() {
        let mut server = Server::new_async().await;
        let body = MANILA.replace(
            r#"[{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}]"#,
            "[]",
        );
        server
            .mock("GET", "/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let err = client(&server).fetch_by_place("Manila").await.unwrap_err();
        assert!(matches!(err, WeatherError::Schema(_)));
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_request() {
        let mut server = Server::new_async().await;
        let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;

        let err = client(&server).fetch_by_place("   ").await.unwrap_err();

        assert!(matches!(err, WeatherError::InvalidQuery));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error_without_key() {
        let client = OpenWeatherClient::builder("SECRET_KEY_123")
            .base_url("http://127.0.0.1:1")
            .timeout(Some(Duration::from_secs(2)))
            .build()
            .expect("client builds");

        let err = client.fetch_by_place("London").await.unwrap_err();
        assert!(matches!(err, WeatherError::Transport(_)));
        assert!(!err.to_string().contains("SECRET_KEY_123"));
        assert!(!format!("{err:?}").contains("SECRET_KEY_123"));
    }

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("short"), "short");
        assert_eq!(truncate_body(&"é".repeat(300)).chars().count(), 203);
    }
}
