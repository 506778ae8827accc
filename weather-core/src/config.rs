use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{client::openweather::DEFAULT_BASE_URL, model::Coordinates};

/// Environment variable that takes precedence over the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

pub const DEFAULT_CITY: &str = "Manila, PH";

const HISTORY_FILE_NAME: &str = "weather_prefs.json";

/// Where the session goes on startup when the user hasn't asked for anything.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultLocation {
    City(String),
    Coordinates(Coordinates),
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_key: Option<String>,

    /// Override for the upstream endpoint root, mainly for testing.
    pub base_url: Option<String>,

    /// e.g. "London" or "London, GB"
    pub default_city: Option<String>,

    pub history_file: Option<PathBuf>,

    pub request_timeout_secs: Option<u64>,

    /// Kept last: TOML tables must follow plain values.
    ///
    /// Example TOML:
    /// [default_coordinates]
    /// lat = 14.6
    /// lon = 120.98
    pub default_coordinates: Option<Coordinates>,
}

impl Config {
    /// API key from the environment, falling back to the stored one.
    pub fn api_key(&self) -> Option<String> {
        self.resolve_api_key(std::env::var(API_KEY_ENV).ok())
    }

    pub(crate) fn resolve_api_key(&self, from_env: Option<String>) -> Option<String> {
        from_env
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Coordinates win over the city when both are configured.
    pub fn default_location(&self) -> DefaultLocation {
        if let Some(coords) = self.default_coordinates {
            return DefaultLocation::Coordinates(coords);
        }

        let city = self
            .default_city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CITY);

        DefaultLocation::City(city.to_string())
    }

    /// Path of the preferences file that holds the search history.
    pub fn history_file_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.history_file {
            return Ok(path.clone());
        }

        Ok(Self::project_dirs()?.data_dir().join(HISTORY_FILE_NAME))
    }

    /// Set the API key and, when given, the default city.
    pub fn configure(&mut self, api_key: String, default_city: Option<String>) {
        self.api_key = Some(api_key);

        if let Some(city) = default_city.filter(|c| !c.trim().is_empty()) {
            self.default_city = Some(city.trim().to_string());
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_location_falls_back_to_manila() {
        let cfg = Config::default();
        assert_eq!(cfg.default_location(), DefaultLocation::City(DEFAULT_CITY.into()));

        let cfg = Config { default_city: Some("   ".into()), ..Config::default() };
        assert_eq!(cfg.default_location(), DefaultLocation::City(DEFAULT_CITY.into()));
    }

    #[test]
    fn env_key_wins_unless_blank() {
        let cfg = Config { api_key: Some("STORED".into()), ..Config::default() };

        assert_eq!(cfg.resolve_api_key(Some("FROM_ENV".into())).as_deref(), Some("FROM_ENV"));
        assert_eq!(cfg.resolve_api_key(Some("  ".into())).as_deref(), Some("STORED"));
        assert_eq!(cfg.resolve_api_key(None).as_deref(), Some("STORED"));
        assert_eq!(Config::default().resolve_api_key(None), None);
    }

    #[test]
    fn coordinates_take_precedence_over_city() {
        let coords = Coordinates { lat: 51.5, lon: -0.12 };
        let cfg = Config {
            default_city: Some("Paris".into()),
            default_coordinates: Some(coords),
            ..Config::default()
        };

        assert_eq!(cfg.default_location(), DefaultLocation::Coordinates(coords));
    }

    #[test]
    fn configure_keeps_city_when_blank() {
        let mut cfg = Config { default_city: Some("Oslo".into()), ..Config::default() };

        cfg.configure("KEY".into(), Some("  ".into()));
        assert_eq!(cfg.api_key.as_deref(), Some("KEY"));
        assert_eq!(cfg.default_city.as_deref(), Some("Oslo"));

        cfg.configure("KEY2".into(), Some(" London, GB ".into()));
        assert_eq!(cfg.api_key.as_deref(), Some("KEY2"));
        assert_eq!(cfg.default_city.as_deref(), Some("London, GB"));
    }

    #[test]
    fn history_file_override_is_used() {
        let cfg = Config { history_file: Some(PathBuf::from("/tmp/h.json")), ..Config::default() };
        assert_eq!(cfg.history_file_path().unwrap(), PathBuf::from("/tmp/h.json"));
    }

    #[test]
    fn save_and_load_roundtrip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = Config {
            api_key: Some("KEY".into()),
            default_coordinates: Some(Coordinates { lat: 14.6, lon: 120.98 }),
            request_timeout_secs: Some(10),
            ..Config::default()
        };
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("KEY"));
        assert_eq!(loaded.default_coordinates, cfg.default_coordinates);
        assert_eq!(loaded.request_timeout(), Some(Duration::from_secs(10)));
        assert!(loaded.default_city.is_none());
    }

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_key = [").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
