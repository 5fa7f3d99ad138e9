use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::api::FileApi;
use crate::config::{ApiEndpoint, normalize_base_url};
use crate::domain::{FileResult, MaterialUsageFilters, SearchFilters};
use crate::error::SearchError;
use crate::fs_util::save_unique;
use crate::normalize::{download_name, fallback_download_name};
use crate::probe::ConnectivityProbe;
use crate::query::{ZeroPolicy, encode_material_usage_with, encode_search};
use crate::tracker::DownloadTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// One-shot user-facing message: a short title plus a description.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    pub issued_at: DateTime<Utc>,
}

impl Notification {
    fn new(level: NotificationLevel, title: &str, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            description: description.into(),
            issued_at: Utc::now(),
        }
    }
}

/// Upper bound on concurrent requests issued by `App::download_many`.
pub const MAX_PARALLEL_DOWNLOADS: usize = 8;

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Files,
    Materials,
}

impl SearchKind {
    fn complete_title(self) -> &'static str {
        match self {
            SearchKind::Files => "Search Complete",
            SearchKind::Materials => "Material Search Complete",
        }
    }

    fn failed_title(self) -> &'static str {
        match self {
            SearchKind::Files => "Search Failed",
            SearchKind::Materials => "Material Search Failed",
        }
    }

    fn complete_description(self, count: usize) -> String {
        match self {
            SearchKind::Files => format!("Found {count} files matching your criteria."),
            SearchKind::Materials => {
                format!("Found {count} material usage files matching your criteria.")
            }
        }
    }

    fn failure_message(self, err: &SearchError) -> String {
        let prefix = match self {
            SearchKind::Files => "Search failed",
            SearchKind::Materials => "Material search failed",
        };
        match err {
            SearchError::Status { .. } => format!("{prefix}: {}", err.status_text()),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SearchOutcome {
    Completed { count: usize },
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Saved { id: i64, path: Utf8PathBuf, bytes: u64 },
    Missing { id: i64 },
    Failed { id: i64, message: String },
    AlreadyInFlight { id: i64 },
}

impl DownloadOutcome {
    pub fn id(&self) -> i64 {
        match self {
            DownloadOutcome::Saved { id, .. }
            | DownloadOutcome::Missing { id }
            | DownloadOutcome::Failed { id, .. }
            | DownloadOutcome::AlreadyInFlight { id } => *id,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, DownloadOutcome::Saved { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConnectOutcome {
    Connected { endpoint: ApiEndpoint },
    Failed { candidate: String },
}

/// A download target; `name` is `None` when the record is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub id: i64,
    pub name: Option<String>,
}

impl DownloadRequest {
    pub fn by_id(id: i64) -> Self {
        Self { id, name: None }
    }
}

impl From<&FileResult> for DownloadRequest {
    fn from(record: &FileResult) -> Self {
        Self {
            id: record.id,
            name: Some(download_name(record)),
        }
    }
}

#[derive(Debug, Default)]
struct ResultPanel {
    results: Vec<FileResult>,
    loading: bool,
}

/// Holds a panel's loading flag up for as long as it lives.
struct Loading<'a> {
    panel: &'a Mutex<ResultPanel>,
}

impl<'a> Loading<'a> {
    fn start(panel: &'a Mutex<ResultPanel>) -> Self {
        lock(panel).loading = true;
        Self { panel }
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        lock(self.panel).loading = false;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct App<A: FileApi> {
    api: A,
    endpoint: Mutex<ApiEndpoint>,
    tracker: DownloadTracker,
    files: Mutex<ResultPanel>,
    materials: Mutex<ResultPanel>,
}

impl<A: FileApi> App<A> {
    pub fn new(api: A, endpoint: ApiEndpoint) -> Self {
        Self {
            api,
            endpoint: Mutex::new(endpoint),
            tracker: DownloadTracker::new(),
            files: Mutex::new(ResultPanel::default()),
            materials: Mutex::new(ResultPanel::default()),
        }
    }

    pub fn endpoint(&self) -> ApiEndpoint {
        lock(&self.endpoint).clone()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn tracker(&self) -> &DownloadTracker {
        &self.tracker
    }

    pub fn results(&self, kind: SearchKind) -> Vec<FileResult> {
        lock(self.panel(kind)).results.clone()
    }

    pub fn is_loading(&self, kind: SearchKind) -> bool {
        lock(self.panel(kind)).loading
    }

    /// Whether the row's download control should be enabled.
    pub fn can_download(&self, id: i64) -> bool {
        !self.tracker.is_in_flight(id)
    }

    pub fn search(&self, filters: &SearchFilters, sink: &dyn NotificationSink) -> SearchOutcome {
        let query = encode_search(filters);
        let endpoint = self.endpoint();
        self.run_search(SearchKind::Files, sink, || self.api.search(&endpoint, &query))
    }

    pub fn search_materials(
        &self,
        filters: &MaterialUsageFilters,
        policy: ZeroPolicy,
        sink: &dyn NotificationSink,
    ) -> SearchOutcome {
        let query = encode_material_usage_with(filters, policy);
        let endpoint = self.endpoint();
        self.run_search(SearchKind::Materials, sink, || {
            self.api.material_usage(&endpoint, &query)
        })
    }

    fn run_search<F>(&self, kind: SearchKind, sink: &dyn NotificationSink, fetch: F) -> SearchOutcome
    where
        F: FnOnce() -> Result<Vec<FileResult>, SearchError>,
    {
        let panel = self.panel(kind);
        let _loading = Loading::start(panel);
        match fetch() {
            Ok(results) => {
                let count = results.len();
                lock(panel).results = results;
                info!(?kind, count, "search complete");
                sink.notify(Notification::new(
                    NotificationLevel::Info,
                    kind.complete_title(),
                    kind.complete_description(count),
                ));
                SearchOutcome::Completed { count }
            }
            Err(err) => {
                let message = kind.failure_message(&err);
                warn!(?kind, error = %err, "search failed");
                sink.notify(Notification::new(
                    NotificationLevel::Error,
                    kind.failed_title(),
                    message.clone(),
                ));
                SearchOutcome::Failed { message }
            }
        }
    }

    pub fn download(
        &self,
        request: &DownloadRequest,
        dir: &Utf8Path,
        sink: &dyn NotificationSink,
    ) -> DownloadOutcome {
        let id = request.id;
        let Some(_claim) = self.tracker.claim(id) else {
            info!(id, "download already in flight");
            return DownloadOutcome::AlreadyInFlight { id };
        };

        let endpoint = self.endpoint();
        let saved = self.api.download(&endpoint, id).and_then(|payload| {
            let name = request
                .name
                .clone()
                .or(payload.filename)
                .unwrap_or_else(|| fallback_download_name(id));
            let path = save_unique(dir, &name, &payload.bytes)?;
            Ok((name, path, payload.bytes.len() as u64))
        });

        match saved {
            Ok((name, path, bytes)) => {
                info!(id, %path, bytes, "download saved");
                sink.notify(Notification::new(
                    NotificationLevel::Info,
                    "Download Complete",
                    format!("{name} saved to {path}"),
                ));
                DownloadOutcome::Saved { id, path, bytes }
            }
            Err(SearchError::Gone { .. }) => {
                warn!(id, "resource missing on disk");
                sink.notify(Notification::new(
                    NotificationLevel::Warning,
                    "File Missing",
                    "This file is no longer available on disk.",
                ));
                DownloadOutcome::Missing { id }
            }
            Err(err) => {
                let message = match &err {
                    SearchError::Status { .. } => format!("Download failed: {}", err.status_text()),
                    other => other.to_string(),
                };
                warn!(id, error = %err, "download failed");
                sink.notify(Notification::new(
                    NotificationLevel::Error,
                    "Download Failed",
                    message.clone(),
                ));
                DownloadOutcome::Failed { id, message }
            }
        }
    }

    /// Runs the requests on worker threads, at most
    /// `MAX_PARALLEL_DOWNLOADS` at a time. Outcomes keep request order;
    /// a repeated id in the batch is reported as already in flight.
    pub fn download_many(
        &self,
        requests: &[DownloadRequest],
        dir: &Utf8Path,
        sink: &dyn NotificationSink,
    ) -> Vec<DownloadOutcome> {
        let mut seen = HashSet::new();
        let mut outcomes = Vec::with_capacity(requests.len());
        for wave in requests.chunks(MAX_PARALLEL_DOWNLOADS) {
            thread::scope(|scope| {
                let handles = wave
                    .iter()
                    .map(|request| {
                        let worker = seen
                            .insert(request.id)
                            .then(|| scope.spawn(move || self.download(request, dir, sink)));
                        (request.id, worker)
                    })
                    .collect::<Vec<_>>();
                outcomes.extend(handles.into_iter().map(|(id, worker)| match worker {
                    Some(handle) => handle.join().unwrap_or_else(|_| DownloadOutcome::Failed {
                        id,
                        message: "download worker panicked".to_string(),
                    }),
                    None => {
                        info!(id, "duplicate id in batch");
                        DownloadOutcome::AlreadyInFlight { id }
                    }
                }));
            });
        }
        outcomes
    }

    /// Probes the active endpoint.
    pub fn check_connection(&self) -> bool {
        ConnectivityProbe::new(&self.api).check(self.endpoint().as_str())
    }

    /// Probes `candidate` and adopts it as the active endpoint if healthy.
    pub fn connect(&self, candidate: &str, sink: &dyn NotificationSink) -> ConnectOutcome {
        let cleaned = normalize_base_url(candidate);
        let adopted = ConnectivityProbe::new(&self.api)
            .check(cleaned)
            .then(|| cleaned.parse::<ApiEndpoint>().ok())
            .flatten();

        match adopted {
            Some(endpoint) => {
                *lock(&self.endpoint) = endpoint.clone();
                info!(%endpoint, "api endpoint adopted");
                sink.notify(Notification::new(
                    NotificationLevel::Info,
                    "API Connected",
                    "Successfully connected to the backend API.",
                ));
                ConnectOutcome::Connected { endpoint }
            }
            None => {
                warn!(candidate = cleaned, "connection check failed");
                sink.notify(Notification::new(
                    NotificationLevel::Error,
                    "Connection Failed",
                    "Unable to connect to the API. Please check the URL and try again.",
                ));
                ConnectOutcome::Failed {
                    candidate: cleaned.to_string(),
                }
            }
        }
    }

    fn panel(&self, kind: SearchKind) -> &Mutex<ResultPanel> {
        match kind {
            SearchKind::Files => &self.files,
            SearchKind::Materials => &self.materials,
        }
    }
}
