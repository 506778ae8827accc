//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The upstream current-weather client
//! - Durable search history
//! - The weather session: observable current state plus history, driven by
//!   user intents
//!
//! It is used by `weather-cli`, but any other front end can drive a
//! [`WeatherSession`] the same way.

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod session;
pub mod store;

pub use client::{OpenWeatherClient, WeatherClient, client_from_config};
pub use config::{Config, DefaultLocation};
pub use error::WeatherError;
pub use model::{Condition, ConditionKind, Coordinates, Measurements, SunInfo, WeatherSnapshot};
pub use session::{HistoryEntry, SessionEvent, SessionState, WeatherSession};
pub use store::{FileHistoryStore, HistoryStore};
