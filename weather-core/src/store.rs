//! Durable search history.
//!
//! The history is kept in a small JSON preferences file as a single array
//! under [`HISTORY_KEY`]. Every save replaces the whole array; there are no
//! incremental updates.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{
    fmt::Debug,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

use crate::{WeatherError, WeatherSnapshot};

pub const HISTORY_KEY: &str = "weather_history";

#[async_trait]
pub trait HistoryStore: Send + Sync + Debug {
    /// The persisted history as an observable value.
    ///
    /// A fresh receiver starts at the currently persisted list and yields
    /// every later successful save, so any number of readers can restart
    /// from the current value at any time.
    fn load(&self) -> watch::Receiver<Vec<WeatherSnapshot>>;

    /// Replace the persisted history with `list`.
    async fn save(&self, list: &[WeatherSnapshot]) -> Result<(), WeatherError>;
}

/// History persisted in a JSON preferences file.
#[derive(Debug)]
pub struct FileHistoryStore {
    path: PathBuf,
    // Serializes read-modify-write of the preferences file.
    io: Mutex<()>,
    published: watch::Sender<Vec<WeatherSnapshot>>,
}

impl FileHistoryStore {
    /// Open the store and read whatever is already persisted.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = read_history(&path).await;
        debug!(path = %path.display(), entries = initial.len(), "history store opened");

        let (published, _) = watch::channel(initial);

        Self { path, io: Mutex::new(()), published }
    }

    async fn write_history(&self, list: &[WeatherSnapshot]) -> Result<(), WeatherError> {
        let _guard = self.io.lock().await;

        let mut prefs = read_prefs(&self.path).await.unwrap_or_default();
        prefs.insert(HISTORY_KEY.to_string(), serde_json::to_value(list).map_err(persistence)?);

        let bytes = serde_json::to_vec_pretty(&Value::Object(prefs)).map_err(persistence)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                WeatherError::Persistence(format!("{}: {e}", parent.display()))
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| WeatherError::Persistence(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| WeatherError::Persistence(format!("{}: {e}", self.path.display())))?;

        Ok(())
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    fn load(&self) -> watch::Receiver<Vec<WeatherSnapshot>> {
        self.published.subscribe()
    }

    async fn save(&self, list: &[WeatherSnapshot]) -> Result<(), WeatherError> {
        self.write_history(list).await?;
        debug!(entries = list.len(), "history saved");

        self.published.send_replace(list.to_vec());
        Ok(())
    }
}

fn persistence(err: serde_json::Error) -> WeatherError {
    WeatherError::Persistence(err.to_string())
}

async fn read_prefs(path: &Path) -> Option<Map<String, Value>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read preferences file");
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!(path = %path.display(), "preferences file is not a JSON object");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse preferences file");
            None
        }
    }
}

/// Anything unreadable counts as no history.
async fn read_history(path: &Path) -> Vec<WeatherSnapshot> {
    let Some(mut prefs) = read_prefs(path).await else {
        return Vec::new();
    };

    let Some(raw) = prefs.remove(HISTORY_KEY) else {
        return Vec::new();
    };

    serde_json::from_value(raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "discarding unreadable history");
        Vec::new()
    })
}
