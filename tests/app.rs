use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use job_file_search::api::{DownloadPayload, FileApi, HealthReply};
use job_file_search::app::{
    App, ConnectOutcome, DownloadOutcome, DownloadRequest, MAX_PARALLEL_DOWNLOADS, Notification,
    NotificationLevel, NotificationSink, SearchKind, SearchOutcome,
};
use job_file_search::config::ApiEndpoint;
use job_file_search::domain::{FileResult, Limit, MaterialUsageFilters, SearchFilters};
use job_file_search::error::SearchError;
use job_file_search::query::{ZeroPolicy, to_query_string};

#[derive(Default)]
struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    fn titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }

    fn last(&self) -> Notification {
        self.notifications.lock().unwrap().last().cloned().unwrap()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

enum Reply {
    Results(Vec<FileResult>),
    Fail(u16),
    Offline,
}

enum Body {
    Bytes(&'static [u8], Option<&'static str>),
    Gone,
    Fail(u16),
}

struct MockApi {
    search_reply: Mutex<Reply>,
    download_reply: Body,
    health: Option<HealthReply>,
    queries: Mutex<Vec<String>>,
    health_calls: Mutex<Vec<String>>,
    download_calls: Mutex<Vec<i64>>,
    active_downloads: AtomicUsize,
    peak_downloads: AtomicUsize,
}

impl MockApi {
    fn new() -> Self {
        Self {
            search_reply: Mutex::new(Reply::Results(Vec::new())),
            download_reply: Body::Bytes(b"data", None),
            health: None,
            queries: Mutex::new(Vec::new()),
            health_calls: Mutex::new(Vec::new()),
            download_calls: Mutex::new(Vec::new()),
            active_downloads: AtomicUsize::new(0),
            peak_downloads: AtomicUsize::new(0),
        }
    }

    fn reply(&self) -> Result<Vec<FileResult>, SearchError> {
        match &*self.search_reply.lock().unwrap() {
            Reply::Results(results) => Ok(results.clone()),
            Reply::Fail(status) => Err(SearchError::Status {
                status: *status,
                reason: "Internal Server Error".to_string(),
            }),
            Reply::Offline => Err(SearchError::Transport("connection refused".to_string())),
        }
    }
}

impl FileApi for MockApi {
    fn health(&self, base_url: &str) -> Result<HealthReply, SearchError> {
        self.health_calls.lock().unwrap().push(base_url.to_string());
        self.health
            .clone()
            .ok_or_else(|| SearchError::Transport("offline".to_string()))
    }

    fn search(
        &self,
        endpoint: &ApiEndpoint,
        query: &[(String, String)],
    ) -> Result<Vec<FileResult>, SearchError> {
        self.queries
            .lock()
            .unwrap()
            .push(format!("{}?{}", endpoint.join("search"), to_query_string(query)));
        self.reply()
    }

    fn material_usage(
        &self,
        endpoint: &ApiEndpoint,
        query: &[(String, String)],
    ) -> Result<Vec<FileResult>, SearchError> {
        self.queries.lock().unwrap().push(format!(
            "{}?{}",
            endpoint.join("material_usage"),
            to_query_string(query)
        ));
        self.reply()
    }

    fn download(&self, _endpoint: &ApiEndpoint, id: i64) -> Result<DownloadPayload, SearchError> {
        self.download_calls.lock().unwrap().push(id);
        let active = self.active_downloads.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_downloads.fetch_max(active, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(5));
        self.active_downloads.fetch_sub(1, Ordering::SeqCst);
        match &self.download_reply {
            Body::Bytes(bytes, filename) => Ok(DownloadPayload {
                bytes: bytes.to_vec(),
                filename: filename.map(str::to_string),
            }),
            Body::Gone => Err(SearchError::Gone { id }),
            Body::Fail(status) => Err(SearchError::Status {
                status: *status,
                reason: "Forbidden".to_string(),
            }),
        }
    }
}

fn endpoint() -> ApiEndpoint {
    "http://files.local:8000".parse().unwrap()
}

fn record(id: i64, filename: Option<&str>, abs_path: &str) -> FileResult {
    FileResult {
        id,
        job_id: format!("J-{id}"),
        resource_type: "cut_file".to_string(),
        abs_path: abs_path.to_string(),
        job_name: Some("Banner".to_string()),
        filename: filename.map(str::to_string),
    }
}

fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, dir)
}

#[test]
fn file_search_builds_canonical_query() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();
    let filters = SearchFilters {
        name: Some("banner".to_string()),
        types: ["cut_file", "pics"].into_iter().collect(),
        limit: Limit::new(50).unwrap(),
        ..SearchFilters::default()
    };

    let outcome = app.search(&filters, &sink);

    assert_eq!(outcome, SearchOutcome::Completed { count: 0 });
    let queries = app_queries(&app);
    assert_eq!(
        queries,
        vec!["http://files.local:8000/search?name=banner&type=cut_file&type=pics&limit=50"]
    );
}

#[test]
fn results_are_replaced_wholesale() {
    let api = MockApi::new();
    *api.search_reply.lock().unwrap() = Reply::Results(vec![
        record(1, None, "/a/one.dxf"),
        record(2, None, "/a/two.dxf"),
    ]);
    let app = App::new(api, endpoint());
    let sink = RecordingSink::default();

    app.search(&SearchFilters::default(), &sink);
    assert_eq!(app.results(SearchKind::Files).len(), 2);

    set_reply(&app, Reply::Results(vec![record(3, None, "/a/three.dxf")]));
    app.search(&SearchFilters::default(), &sink);
    let results = app.results(SearchKind::Files);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, 3);
    assert!(app.results(SearchKind::Materials).is_empty());

    let last = sink.last();
    assert_eq!(last.title, "Search Complete");
    assert_eq!(last.description, "Found 1 files matching your criteria.");
}

#[test]
fn failed_search_keeps_previous_results_and_clears_loading() {
    let api = MockApi::new();
    *api.search_reply.lock().unwrap() = Reply::Results(vec![record(1, None, "/a/one.dxf")]);
    let app = App::new(api, endpoint());
    let sink = RecordingSink::default();
    app.search(&SearchFilters::default(), &sink);

    set_reply(&app, Reply::Fail(500));
    let outcome = app.search(&SearchFilters::default(), &sink);

    assert_eq!(
        outcome,
        SearchOutcome::Failed {
            message: "Search failed: Internal Server Error".to_string()
        }
    );
    assert_eq!(app.results(SearchKind::Files).len(), 1);
    assert!(!app.is_loading(SearchKind::Files));
    let last = sink.last();
    assert_eq!(last.level, NotificationLevel::Error);
    assert_eq!(last.title, "Search Failed");
}

#[test]
fn material_search_transport_failure() {
    let api = MockApi::new();
    *api.search_reply.lock().unwrap() = Reply::Offline;
    let app = App::new(api, endpoint());
    let sink = RecordingSink::default();

    let outcome =
        app.search_materials(&MaterialUsageFilters::default(), ZeroPolicy::OmitZero, &sink);

    assert_matches!(outcome, SearchOutcome::Failed { message } if message.contains("connection refused"));
    assert_eq!(sink.titles(), vec!["Material Search Failed"]);
    assert!(!app.is_loading(SearchKind::Materials));
}

#[test]
fn material_search_drops_zero_dimensions() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();
    let filters = MaterialUsageFilters {
        xb_type: Some("XB 10mm".to_string()),
        width: Some(0),
        height: Some(1200),
        ..MaterialUsageFilters::default()
    };

    app.search_materials(&filters, ZeroPolicy::OmitZero, &sink);
    app.search_materials(&filters, ZeroPolicy::Keep, &sink);

    assert_eq!(
        app_queries(&app),
        vec![
            "http://files.local:8000/material_usage?xb_type=XB+10mm&height=1200&limit=100",
            "http://files.local:8000/material_usage?xb_type=XB+10mm&width=0&height=1200&limit=100",
        ]
    );
    assert_eq!(
        sink.last().description,
        "Found 0 material usage files matching your criteria."
    );
}

#[test]
fn download_saves_under_display_name() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();
    let result = record(42, None, "C:\\jobs\\42\\cut.dxf");

    let outcome = app.download(&DownloadRequest::from(&result), &dir, &sink);

    assert_matches!(&outcome, DownloadOutcome::Saved { id: 42, path, bytes: 4 } if path.file_name() == Some("cut.dxf"));
    assert_eq!(std::fs::read(dir.join("cut.dxf")).unwrap(), b"data");
    assert!(app.can_download(42));
    assert_eq!(sink.titles(), vec!["Download Complete"]);
}

#[test]
fn saved_outcome_serializes_path() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();

    let outcome = app.download(&DownloadRequest::from(&record(8, Some("a.pdf"), "")), &dir, &sink);

    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["outcome"], "saved");
    assert_eq!(value["id"], 8);
    assert_eq!(value["path"], json!(dir.join("a.pdf").as_str()));
    assert_eq!(value["bytes"], 4);
}

#[test]
fn download_by_id_uses_server_name_or_fallback() {
    let mut api = MockApi::new();
    api.download_reply = Body::Bytes(b"pdf", Some("plan.pdf"));
    let app = App::new(api, endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();

    app.download(&DownloadRequest::by_id(5), &dir, &sink);
    assert!(dir.join("plan.pdf").as_std_path().exists());

    let app = App::new(MockApi::new(), endpoint());
    app.download(&DownloadRequest::by_id(6), &dir, &sink);
    assert!(dir.join("file_6").as_std_path().exists());
}

#[test]
fn gone_download_clears_tracker_and_saves_nothing() {
    let mut api = MockApi::new();
    api.download_reply = Body::Gone;
    let app = App::new(api, endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();

    let outcome = app.download(&DownloadRequest::by_id(7), &dir, &sink);

    assert_eq!(outcome, DownloadOutcome::Missing { id: 7 });
    assert!(!app.tracker().is_in_flight(7));
    assert_eq!(std::fs::read_dir(dir.as_std_path()).unwrap().count(), 0);
    let last = sink.last();
    assert_eq!(last.level, NotificationLevel::Warning);
    assert_eq!(last.title, "File Missing");
    assert_eq!(last.description, "This file is no longer available on disk.");
}

#[test]
fn generic_download_failure_carries_status_text() {
    let mut api = MockApi::new();
    api.download_reply = Body::Fail(403);
    let app = App::new(api, endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();

    let outcome = app.download(&DownloadRequest::by_id(8), &dir, &sink);

    assert_eq!(
        outcome,
        DownloadOutcome::Failed {
            id: 8,
            message: "Download failed: Forbidden".to_string()
        }
    );
    assert!(app.can_download(8));
    assert_eq!(sink.last().title, "Download Failed");
}

#[test]
fn in_flight_download_is_not_dispatched_again() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();

    assert!(app.tracker().begin(9));
    assert!(!app.can_download(9));
    let outcome = app.download(&DownloadRequest::by_id(9), &dir, &sink);
    assert_eq!(outcome, DownloadOutcome::AlreadyInFlight { id: 9 });
    assert!(sink.titles().is_empty());

    app.tracker().end(9);
    let outcome = app.download(&DownloadRequest::by_id(9), &dir, &sink);
    assert!(outcome.is_saved());
}

#[test]
fn download_many_keeps_request_order() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();
    let requests = vec![
        DownloadRequest::from(&record(1, Some("a.pdf"), "/x/a.pdf")),
        DownloadRequest::from(&record(2, Some("b.pdf"), "/x/b.pdf")),
        DownloadRequest::from(&record(3, Some("c.pdf"), "/x/c.pdf")),
    ];

    let outcomes = app.download_many(&requests, &dir, &sink);

    assert_eq!(outcomes.iter().map(|o| o.id()).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(outcomes.iter().all(DownloadOutcome::is_saved));
    assert_eq!(app.tracker().in_flight_count(), 0);
}

#[test]
fn download_many_bounds_concurrent_requests() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();
    let requests = (1..=30)
        .map(|id| DownloadRequest::from(&record(id, Some(&format!("f{id}.pdf")), "")))
        .collect::<Vec<_>>();

    let outcomes = app.download_many(&requests, &dir, &sink);

    assert_eq!(outcomes.len(), 30);
    assert!(outcomes.iter().all(DownloadOutcome::is_saved));
    assert_eq!(app_api(&app).download_calls.lock().unwrap().len(), 30);
    let peak = app_api(&app).peak_downloads.load(Ordering::SeqCst);
    assert!((1..=MAX_PARALLEL_DOWNLOADS).contains(&peak), "peak {peak}");
}

#[test]
fn download_many_skips_repeated_id() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();
    let (_temp, dir) = temp_dir();
    let requests = vec![DownloadRequest::by_id(4), DownloadRequest::by_id(4)];

    let outcomes = app.download_many(&requests, &dir, &sink);

    assert!(outcomes[0].is_saved());
    assert_eq!(outcomes[1], DownloadOutcome::AlreadyInFlight { id: 4 });
    assert_eq!(app_api(&app).download_calls.lock().unwrap().len(), 1);
}

#[test]
fn connect_strips_trailing_slashes_and_adopts() {
    let mut api = MockApi::new();
    api.health = Some(HealthReply {
        status: 200,
        body: Some(json!({"ok": true})),
    });
    let app = App::new(api, endpoint());
    let sink = RecordingSink::default();

    let outcome = app.connect("  http://backend:9000//  ", &sink);

    assert_matches!(outcome, ConnectOutcome::Connected { endpoint } if endpoint.as_str() == "http://backend:9000");
    assert_eq!(app.endpoint().as_str(), "http://backend:9000");
    assert_eq!(sink.titles(), vec!["API Connected"]);
}

#[test]
fn failed_connect_keeps_endpoint() {
    let mut api = MockApi::new();
    api.health = Some(HealthReply {
        status: 200,
        body: Some(json!({"ok": false})),
    });
    let app = App::new(api, endpoint());
    let sink = RecordingSink::default();

    let outcome = app.connect("http://other:1/", &sink);

    assert_eq!(
        outcome,
        ConnectOutcome::Failed {
            candidate: "http://other:1".to_string()
        }
    );
    assert_eq!(app.endpoint(), endpoint());
    assert_eq!(sink.last().title, "Connection Failed");
}

#[test]
fn blank_connect_makes_no_request() {
    let app = App::new(MockApi::new(), endpoint());
    let sink = RecordingSink::default();

    let outcome = app.connect("   ", &sink);

    assert_matches!(outcome, ConnectOutcome::Failed { .. });
    assert!(app_health_calls(&app).is_empty());
}

fn app_queries(app: &App<MockApi>) -> Vec<String> {
    app_api(app).queries.lock().unwrap().clone()
}

fn app_health_calls(app: &App<MockApi>) -> Vec<String> {
    app_api(app).health_calls.lock().unwrap().clone()
}

fn set_reply(app: &App<MockApi>, reply: Reply) {
    *app_api(app).search_reply.lock().unwrap() = reply;
}

fn app_api(app: &App<MockApi>) -> &MockApi {
    app.api()
}
