use thiserror::Error;

/// Failures surfaced by the weather client and the history store.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The request never produced a response (connectivity, timeout, body read).
    #[error("Network error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The upstream answered with a non-success status.
    ///
    /// Displays the upstream's own message, e.g. `city not found`.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// The response body did not match the expected schema.
    #[error("Unexpected response from weather service: {0}")]
    Schema(String),

    /// Writing the history file failed.
    #[error("Failed to persist history: {0}")]
    Persistence(String),

    #[error("Location query must not be empty")]
    InvalidQuery,
}

impl From<serde_json::Error> for WeatherError {
    fn from(err: serde_json::Error) -> Self {
        WeatherError::Schema(err.to_string())
    }
}
