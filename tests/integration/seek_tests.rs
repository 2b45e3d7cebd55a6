//! Integration tests for the seeker
//!
//! These tests use wiremock to stand in for the app-list and detail endpoints
//! and run full seeker cycles against an in-memory store.

use gamecha::config::SteamConfig;
use gamecha::seeker::catalog::PATH_GET_APP_LIST;
use gamecha::seeker::detail::PATH_APP_DETAILS;
use gamecha::seeker::{SeekerError, SeekerState, SteamSeeker};
use gamecha::storage::{
    Catalog, DetailRecord, GameStore, MemoryStore, StorageError, StorageResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn test_config(server: &MockServer) -> SteamConfig {
    let mut config = SteamConfig::new(server.uri(), "TESTKEY");
    config.store_portal = server.uri();
    config.worker = 4;
    config.retry_interval = Duration::from_millis(10);
    config.retry_count = 3;
    config.grace_period = Duration::from_secs(3);
    config
}

fn app_list(ids: &[(u32, &str)]) -> String {
    let apps: Vec<String> = ids
        .iter()
        .map(|(id, name)| format!(r#"{{"appid":{},"name":"{}"}}"#, id, name))
        .collect();
    format!(r#"{{"applist":{{"apps":[{}]}}}}"#, apps.join(","))
}

fn detail_body(id: &str, name: &str) -> String {
    format!(
        r#"{{"{id}":{{"success":true,"data":{{"name":"{name}","steam_appid":{id},"required_age":"0","developers":["Dev {id}"],"publishers":[]}}}}}}"#
    )
}

fn requested_id(request: &Request) -> String {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == "appids")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

async fn mount_app_list(server: &MockServer, ids: &[(u32, &str)]) {
    Mock::given(method("GET"))
        .and(path(PATH_GET_APP_LIST))
        .and(query_param("key", "TESTKEY"))
        .respond_with(ResponseTemplate::new(200).set_body_string(app_list(ids)))
        .mount(server)
        .await;
}

async fn seek(
    config: SteamConfig,
    store: Arc<dyn GameStore>,
) -> Result<gamecha::SeekSummary, SeekerError> {
    let seeker = SteamSeeker::start(&CancellationToken::new(), config, store).await?;
    assert_eq!(seeker.state(), SeekerState::Running);
    seeker.wait_until_done().await
}

/// Store double whose record writes always fail
struct FailingStore {
    inner: MemoryStore,
}

impl GameStore for FailingStore {
    fn get_catalog(&self, platform: &str) -> StorageResult<Catalog> {
        self.inner.get_catalog(platform)
    }

    fn save_catalog(&self, platform: &str, catalog: &Catalog) -> StorageResult<()> {
        self.inner.save_catalog(platform, catalog)
    }

    fn save_record(&self, _: &str, _: &str, _: &DetailRecord) -> StorageResult<()> {
        Err(StorageError::Backend("disk full".to_string()))
    }

    fn get_record(&self, platform: &str, sub_id: &str) -> StorageResult<Option<DetailRecord>> {
        self.inner.get_record(platform, sub_id)
    }

    fn list_records(&self, platform: &str) -> StorageResult<Vec<(String, DetailRecord)>> {
        self.inner.list_records(platform)
    }

    fn close(&self) -> StorageResult<()> {
        self.inner.close()
    }
}

/// Store double whose record writes block for `delay`, then optionally fail
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    fail: bool,
    writing: Arc<Notify>,
}

impl SlowStore {
    fn new(delay: Duration, fail: bool) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
            fail,
            writing: Arc::new(Notify::new()),
        }
    }
}

impl GameStore for SlowStore {
    fn get_catalog(&self, platform: &str) -> StorageResult<Catalog> {
        self.inner.get_catalog(platform)
    }

    fn save_catalog(&self, platform: &str, catalog: &Catalog) -> StorageResult<()> {
        self.inner.save_catalog(platform, catalog)
    }

    fn save_record(
        &self,
        platform: &str,
        sub_id: &str,
        record: &DetailRecord,
    ) -> StorageResult<()> {
        self.writing.notify_one();
        std::thread::sleep(self.delay);
        if self.fail {
            return Err(StorageError::Backend("write stalled".to_string()));
        }
        self.inner.save_record(platform, sub_id, record)
    }

    fn get_record(&self, platform: &str, sub_id: &str) -> StorageResult<Option<DetailRecord>> {
        self.inner.get_record(platform, sub_id)
    }

    fn list_records(&self, platform: &str) -> StorageResult<Vec<(String, DetailRecord)>> {
        self.inner.list_records(platform)
    }

    fn close(&self) -> StorageResult<()> {
        self.inner.close()
    }
}

async fn mount_detail(server: &MockServer, id: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(PATH_APP_DETAILS))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_body(id, name)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_new_title_is_fetched_and_catalog_replaced() {
    let server = MockServer::start().await;
    mount_app_list(&server, &[(1, "A"), (2, "B")]).await;

    Mock::given(method("GET"))
        .and(path(PATH_APP_DETAILS))
        .and(query_param("appids", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_body("2", "B")))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::with_catalog(
        "steam",
        [(1, "A".to_string())].into(),
    ));

    let summary = seek(test_config(&server), store.clone()).await.unwrap();

    assert_eq!(summary.seeded, 1);
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.saved, 1);
    assert_eq!(summary.workers_finished, 4);

    let catalog = store.get_catalog("steam").unwrap();
    assert_eq!(
        catalog,
        [(1, "A".to_string()), (2, "B".to_string())].into()
    );

    let record = store.get_record("steam", "2").unwrap().unwrap();
    assert_eq!(record.name, "B");
    assert_eq!(record.developers, vec!["Dev 2"]);
    assert!(store.get_record("steam", "1").unwrap().is_none());
}

#[tokio::test]
async fn test_rerun_with_unchanged_catalog_fetches_nothing() {
    let server = MockServer::start().await;
    mount_app_list(&server, &[(1, "A"), (2, "B")]).await;

    Mock::given(method("GET"))
        .and(path(PATH_APP_DETAILS))
        .respond_with(|request: &Request| {
            let id = requested_id(request);
            ResponseTemplate::new(200).set_body_string(detail_body(&id, "x"))
        })
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());

    let first = seek(test_config(&server), store.clone()).await.unwrap();
    assert_eq!(first.seeded, 2);

    let second = seek(test_config(&server), store.clone()).await.unwrap();
    assert_eq!(second.seeded, 0);
    assert_eq!(second.fetched, 0);
    assert_eq!(store.list_records("steam").unwrap().len(), 2);
}

#[tokio::test]
async fn test_retry_budget_is_respected() {
    let server = MockServer::start().await;
    mount_app_list(&server, &[(7, "Broken")]).await;

    Mock::given(method("GET"))
        .and(path(PATH_APP_DETAILS))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let summary = seek(test_config(&server), store.clone()).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.fetched, 0);
    assert!(store.list_records("steam").unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limit_does_not_exhaust_budget() {
    let server = MockServer::start().await;
    mount_app_list(&server, &[(9, "Throttled")]).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    Mock::given(method("GET"))
        .and(path(PATH_APP_DETAILS))
        .respond_with(move |_: &Request| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 | 1 | 3 => ResponseTemplate::new(500),
                2 => ResponseTemplate::new(200).set_body_string("null"),
                _ => ResponseTemplate::new(200).set_body_string(detail_body("9", "Throttled")),
            }
        })
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let summary = seek(test_config(&server), store.clone()).await.unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert!(store.get_record("steam", "9").unwrap().is_some());
}

#[tokio::test]
async fn test_every_seeded_id_is_fetched_exactly_once() {
    let server = MockServer::start().await;
    let ids: Vec<(u32, &str)> = (1..=200).map(|id| (id, "Game")).collect();
    mount_app_list(&server, &ids).await;

    let seen = Arc::new(Mutex::new(HashMap::<String, usize>::new()));
    let recorder = seen.clone();
    Mock::given(method("GET"))
        .and(path(PATH_APP_DETAILS))
        .respond_with(move |request: &Request| {
            let id = requested_id(request);
            *recorder.lock().unwrap().entry(id.clone()).or_default() += 1;
            ResponseTemplate::new(200).set_body_string(detail_body(&id, "Game"))
        })
        .expect(200)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.worker = 8;
    let store = Arc::new(MemoryStore::new());

    let summary = seek(config, store.clone()).await.unwrap();
    assert_eq!(summary.seeded, 200);
    assert_eq!(summary.fetched, 200);
    assert_eq!(summary.saved, 200);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 200);
    assert!(seen.values().all(|count| *count == 1));

    let stored: Vec<u32> = store
        .list_records("steam")
        .unwrap()
        .into_iter()
        .map(|(_, record)| record.id)
        .collect();
    assert_eq!(stored, (1..=200).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_cancel_during_retry_sleep_returns_promptly() {
    let server = MockServer::start().await;
    mount_app_list(&server, &[(1, "A"), (2, "B"), (3, "C")]).await;

    Mock::given(method("GET"))
        .and(path(PATH_APP_DETAILS))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config.retry_interval = Duration::from_secs(3600);
    config.retry_count = 0;
    config.grace_period = Duration::from_millis(500);

    let cancel = CancellationToken::new();
    let seeker = SteamSeeker::start(&cancel, config, Arc::new(MemoryStore::new()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let start = Instant::now();
    cancel.cancel();
    cancel.cancel();

    let summary = seeker.wait_until_done().await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(summary.workers_finished, 4);
    assert_eq!(summary.fetched, 0);
}

#[tokio::test]
async fn test_sink_failure_fails_the_run() {
    let server = MockServer::start().await;
    mount_app_list(&server, &[(5, "E")]).await;

    Mock::given(method("GET"))
        .and(path(PATH_APP_DETAILS))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_body("5", "E")))
        .mount(&server)
        .await;

    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
    });
    let result = seek(test_config(&server), store).await;

    assert!(matches!(
        result,
        Err(SeekerError::Storage(StorageError::Backend(_)))
    ));
}

async fn assert_stalled_sink_times_out() {
    let server = MockServer::start().await;
    mount_app_list(&server, &[(1, "A")]).await;
    mount_detail(&server, "1", "A").await;

    let mut config = test_config(&server);
    config.grace_period = Duration::from_millis(100);
    let store = Arc::new(SlowStore::new(Duration::from_secs(2), false));
    let writing = store.writing.clone();

    let cancel = CancellationToken::new();
    let seeker = SteamSeeker::start(&cancel, config, store).await.unwrap();

    writing.notified().await;
    let start = Instant::now();
    cancel.cancel();

    let result = seeker.wait_until_done().await;
    assert!(start.elapsed() < Duration::from_secs(1));
    match result {
        Err(SeekerError::QuitTimeout { platform, total, .. }) => {
            assert_eq!(platform, "steam");
            assert_eq!(total, 4);
        }
        other => panic!("expected a quit timeout, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stalled_sink_times_out_after_grace_period() {
    assert_stalled_sink_times_out().await;
}

// A single runtime thread only reaches the grace timer if record writes run
// off the async workers.
#[tokio::test]
async fn test_stalled_sink_does_not_block_the_runtime() {
    assert_stalled_sink_times_out().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sink_failure_while_draining_fails_the_run() {
    let server = MockServer::start().await;
    mount_app_list(&server, &[(1, "A")]).await;
    mount_detail(&server, "1", "A").await;

    let store = Arc::new(SlowStore::new(Duration::from_millis(200), true));
    let writing = store.writing.clone();

    let cancel = CancellationToken::new();
    let seeker = SteamSeeker::start(&cancel, test_config(&server), store)
        .await
        .unwrap();

    writing.notified().await;
    cancel.cancel();

    let result = seeker.wait_until_done().await;
    assert!(matches!(
        result,
        Err(SeekerError::Storage(StorageError::Backend(_)))
    ));
}

#[tokio::test]
async fn test_catalog_failure_fails_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PATH_GET_APP_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"applist\":"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let result =
        SteamSeeker::start(&CancellationToken::new(), test_config(&server), store.clone()).await;

    assert!(matches!(result, Err(SeekerError::CatalogParse(_))));
    assert!(store.get_catalog("steam").unwrap().is_empty());
}
