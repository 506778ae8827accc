//! Current-weather session: owns the displayed state and the search history.
//!
//! A [`WeatherSession`] exposes two observable values ([`SessionState`] and
//! the history list) and accepts the user intents that change them. Fetches
//! run as spawned tasks; every attempt is stamped with a generation and a
//! result whose generation is no longer current is dropped, so the state
//! always reflects the most recent user action.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicU64, Ordering},
};

use tokio::{
    sync::{Mutex, broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    WeatherSnapshot,
    client::WeatherClient,
    config::DefaultLocation,
    model::Coordinates,
    store::HistoryStore,
};

const EVENT_CAPACITY: usize = 16;

/// What the current-weather view should show.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Ready(WeatherSnapshot),
    Failed(String),
}

/// One history row, ready to be shown or re-selected.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    snapshot: WeatherSnapshot,
}

impl HistoryEntry {
    pub fn new(snapshot: WeatherSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &WeatherSnapshot {
        &self.snapshot
    }

    /// The state this entry would display as.
    pub fn to_state(&self) -> SessionState {
        SessionState::Ready(self.snapshot.clone())
    }
}

/// Non-fatal notifications that don't belong in [`SessionState`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// History changed in memory but could not be written to disk.
    PersistenceFailed(String),
}

#[derive(Debug, Clone)]
enum FetchRequest {
    Place(String),
    Coordinates(Coordinates),
}

#[derive(Debug)]
pub struct WeatherSession {
    inner: Arc<Inner>,
    mirror: JoinHandle<()>,
}

#[derive(Debug)]
struct Inner {
    client: Arc<dyn WeatherClient>,
    store: Arc<dyn HistoryStore>,
    state: watch::Sender<SessionState>,
    history: watch::Sender<Vec<HistoryEntry>>,
    events: broadcast::Sender<SessionEvent>,
    generation: AtomicU64,
    // Held across every history mutation and its save, so the file is
    // written in the same order the in-memory list changes.
    history_writes: Mutex<()>,
}

impl WeatherSession {
    /// Create a session and start mirroring the store's persisted history.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(client: Arc<dyn WeatherClient>, store: Arc<dyn HistoryStore>) -> Self {
        let mut persisted = store.load();
        let initial = to_entries(&persisted.borrow_and_update());
        debug!(entries = initial.len(), "session starting with persisted history");

        let (state, _) = watch::channel(SessionState::Loading);
        let (history, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new(Inner {
            client,
            store,
            state,
            history,
            events,
            generation: AtomicU64::new(0),
            history_writes: Mutex::new(()),
        });

        let mirror = tokio::spawn(mirror_store(Arc::downgrade(&inner), persisted));

        Self { inner, mirror }
    }

    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn history(&self) -> watch::Receiver<Vec<HistoryEntry>> {
        self.inner.history.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn current_state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn current_history(&self) -> Vec<HistoryEntry> {
        self.inner.history.borrow().clone()
    }

    /// Look up the weather for a free-text place.
    ///
    /// Returns `None`, without touching any state, when `query` is blank.
    /// Otherwise the state becomes [`SessionState::Loading`] before this
    /// returns, and the handle resolves once the attempt has settled.
    pub fn submit_city_query(&self, query: &str) -> Option<JoinHandle<()>> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        Some(self.start(FetchRequest::Place(query.to_string())))
    }

    pub fn submit_coordinates(&self, lat: f64, lon: f64) -> JoinHandle<()> {
        self.start(FetchRequest::Coordinates(Coordinates { lat, lon }))
    }

    /// Kick off the startup lookup for the configured default location.
    pub fn load_default(&self, location: &DefaultLocation) -> Option<JoinHandle<()>> {
        match location {
            DefaultLocation::City(city) => self.submit_city_query(city),
            DefaultLocation::Coordinates(c) => Some(self.submit_coordinates(c.lat, c.lon)),
        }
    }

    /// Show a past lookup without going to the network.
    ///
    /// Supersedes any fetch still in flight.
    pub fn select_history_entry(&self, snapshot: WeatherSnapshot) {
        self.inner.state.send_modify(|state| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::Ready(snapshot);
        });
    }

    /// Empty the history and persist the empty list. The current state is kept.
    pub async fn clear_history(&self) {
        let _guard = self.inner.history_writes.lock().await;

        self.inner.history.send_replace(Vec::new());
        self.inner.persist(&[]).await;
    }

    fn start(&self, request: FetchRequest) -> JoinHandle<()> {
        let mut generation = 0;
        self.inner.state.send_modify(|state| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = SessionState::Loading;
        });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(generation, request).await })
    }
}

impl Drop for WeatherSession {
    fn drop(&mut self) {
        self.mirror.abort();
    }
}

impl Inner {
    async fn run(&self, generation: u64, request: FetchRequest) {
        debug!(generation, ?request, "weather fetch started");

        let result = match &request {
            FetchRequest::Place(query) => self.client.fetch_by_place(query).await,
            FetchRequest::Coordinates(coords) => self.client.fetch_by_coordinates(*coords).await,
        };

        let _guard = self.history_writes.lock().await;

        let next = match &result {
            Ok(snapshot) => SessionState::Ready(snapshot.clone()),
            Err(e) => SessionState::Failed(e.to_string()),
        };

        if !self.apply_if_current(generation, next) {
            debug!(generation, "discarding result of superseded fetch");
            return;
        }

        match result {
            Ok(snapshot) => {
                debug!(generation, location = %snapshot.location_label(), "weather fetch succeeded");

                let mut updated = Vec::new();
                self.history.send_modify(|history| {
                    promote(history, snapshot);
                    updated = history.iter().map(|e| e.snapshot.clone()).collect();
                });

                self.persist(&updated).await;
            }
            Err(e) => {
                debug!(generation, error = %e, "weather fetch failed");
            }
        }
    }

    /// Replace the state unless a newer attempt or selection has started.
    fn apply_if_current(&self, generation: u64, next: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }

            *state = next;
            true
        })
    }

    async fn persist(&self, list: &[WeatherSnapshot]) {
        if let Err(e) = self.store.save(list).await {
            warn!(error = %e, entries = list.len(), "history not persisted");
            // No subscribers is fine; the failure is already logged.
            let _ = self.events.send(SessionEvent::PersistenceFailed(e.to_string()));
        }
    }
}

/// Dedup-and-promote: drop any entry for the same location, then put the
/// new snapshot first.
fn promote(history: &mut Vec<HistoryEntry>, snapshot: WeatherSnapshot) {
    history.retain(|e| e.snapshot.location_name() != snapshot.location_name());
    history.insert(0, HistoryEntry::new(snapshot));
}

fn to_entries(list: &[WeatherSnapshot]) -> Vec<HistoryEntry> {
    list.iter().cloned().map(HistoryEntry::new).collect()
}

/// Follow the store for the lifetime of the session.
async fn mirror_store(inner: Weak<Inner>, mut persisted: watch::Receiver<Vec<WeatherSnapshot>>) {
    while persisted.changed().await.is_ok() {
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let _guard = inner.history_writes.lock().await;
        let latest = to_entries(&persisted.borrow_and_update());

        inner.history.send_if_modified(|history| {
            if *history == latest {
                return false;
            }

            *history = latest;
            true
        });
    }
}
