//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full listing-to-record cycle end-to-end.

use airport_harvest::config::{
    default_gateways, Config, CrawlerConfig, DirectoryConfig, EnvelopeKind, GatewayEntry,
    OutputConfig, UserAgentConfig,
};
use airport_harvest::crawler::{
    build_http_client, Coordinator, FetchClient, FetchError, GatewayRotator, GatewayTemplate,
    RetrySettings,
};
use airport_harvest::output::CrawlObserver;
use airport_harvest::state::{ActiveFlag, CancelHandle, CrawlState, Record};
use airport_harvest::storage::{
    open_store, KeyValueStore, MemoryStore, ResumableStore, SqliteStore, RESULTS_KEY,
};
use airport_harvest::HarvestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING_PATH: &str = "/countries/US/airports.html";

/// Creates a fast test configuration that fetches targets directly
fn create_test_config(db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            entry_url: None,
            concurrency: 5,
            max_retries: 3,
            request_timeout_ms: 2_000,
            backoff_base_ms: 0,
            politeness_min_ms: 0,
            politeness_max_ms: 0,
            page_delay_ms: 0,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        directory: DirectoryConfig::default(),
        output: OutputConfig {
            database_path: db_path.to_string(),
            json_path: "./test_airports.json".to_string(),
            csv_path: "./test_airports.csv".to_string(),
        },
        gateways: vec![GatewayEntry {
            template: "{raw}".to_string(),
            envelope: EnvelopeKind::Raw,
        }],
    }
}

fn memory_coordinator() -> Coordinator<MemoryStore> {
    Coordinator::new(
        &create_test_config(":memory:"),
        ResumableStore::new(MemoryStore::new()),
    )
    .expect("Failed to create coordinator")
}

fn listing_page(identifiers: &[&str], next: Option<&str>) -> String {
    let mut html = String::from("<html><head><title>Airports in the United States</title></head><body><table>");
    for identifier in identifiers {
        html.push_str(&format!(
            r#"<tr><td><a href="/airports/{0}/">{0}</a></td></tr>"#,
            identifier
        ));
    }
    html.push_str("</table>");
    if let Some(next) = next {
        html.push_str(&format!(r#"<a rel="next" href="{}">Next page</a>"#, next));
    }
    html.push_str("</body></html>");
    html
}

fn detail_page(identifier: &str, name: &str) -> String {
    format!(
        r#"<html><head>
        <script type="application/ld+json">{{"@type":"Airport","name":"{name}","icaoCode":"{identifier}",
          "description":"Small airport in Washington","geo":{{"latitude":47.5,"longitude":-122.3}}}}</script>
        </head><body>
        <h1>{name} ({identifier})</h1>
        <dl><dt>Location</dt><dd>Seattle, Washington</dd>
            <dt>Field elevation</dt><dd>433 ft</dd></dl>
        </body></html>"#
    )
}

async fn mount_listing(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, identifier: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/airports/{}/", identifier)))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(identifier, name)))
        .mount(server)
        .await;
}

fn identifiers(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.identifier.as_str()).collect()
}

/// Observer that remembers what it was told
#[derive(Clone, Default)]
struct RecordingObserver {
    records: Arc<Mutex<Vec<String>>>,
    exports: Arc<AtomicUsize>,
}

impl CrawlObserver for RecordingObserver {
    fn on_record(&self, record: &Record) {
        self.records.lock().unwrap().push(record.identifier.clone());
    }

    fn on_export_ready(&self, count: usize) {
        self.exports.store(count, Ordering::SeqCst);
    }
}

/// Observer that cancels the session once it has seen a record
struct CancelOnFirstRecord {
    handle: CancelHandle,
}

impl CrawlObserver for CancelOnFirstRecord {
    fn on_record(&self, _record: &Record) {
        self.handle.cancel();
    }
}

#[tokio::test]
async fn test_two_page_listing_completes() {
    let server = MockServer::start().await;

    mount_listing(
        &server,
        LISTING_PATH,
        listing_page(&["KAAA", "KBBB", "KCCC"], Some("/countries/US/airports-2.html")),
    )
    .await;
    // Second page repeats a known record and ends pagination
    Mock::given(method("GET"))
        .and(path("/countries/US/airports-2.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["KAAA"], None)))
        .expect(1)
        .mount(&server)
        .await;
    mount_detail(&server, "KAAA", "Alpha Field").await;
    mount_detail(&server, "KBBB", "Bravo Field").await;
    mount_detail(&server, "KCCC", "Charlie Field").await;

    let observer = RecordingObserver::default();
    let mut coordinator = memory_coordinator().with_observer(Box::new(observer.clone()));

    let state = coordinator
        .start(&format!("{}{}", server.uri(), LISTING_PATH), 5)
        .await
        .expect("Start failed");

    assert_eq!(state, CrawlState::Complete);
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.pages_scanned, 2);
    assert_eq!(snapshot.details_scanned, 3);
    assert_eq!(snapshot.errors, 0);
    assert!(!snapshot.active);

    let records = coordinator.export_records();
    assert_eq!(identifiers(records), vec!["KAAA", "KBBB", "KCCC"]);
    assert_eq!(records[0].name, "Alpha Field");
    assert_eq!(records[0].category, "Small airport");
    assert_eq!(records[0].municipality, "Seattle");
    assert_eq!(records[0].region, "Washington");
    assert_eq!(records[0].elevation_ft, "433");
    assert_eq!(records[0].latitude, "47.5");
    assert_eq!(
        records[0].source_url,
        format!("{}/airports/KAAA/", server.uri())
    );

    assert_eq!(
        *observer.records.lock().unwrap(),
        vec!["KAAA".to_string(), "KBBB".to_string(), "KCCC".to_string()]
    );
    assert_eq!(observer.exports.load(Ordering::SeqCst), 3);

    // The result set was cached as it grew
    let cached = coordinator
        .store()
        .backend()
        .get(RESULTS_KEY)
        .unwrap()
        .expect("Results were not persisted");
    let cached: Vec<Record> = serde_json::from_str(&cached).unwrap();
    assert_eq!(cached, records);
}

#[tokio::test]
async fn test_structured_data_only_detail() {
    let server = MockServer::start().await;

    mount_listing(&server, LISTING_PATH, listing_page(&["ZZZZ"], None)).await;
    Mock::given(method("GET"))
        .and(path("/airports/ZZZZ/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><script type="application/ld+json">{"name":"Test Field","icaoCode":"ZZZZ"}</script></head><body></body></html>"#,
        ))
        .mount(&server)
        .await;

    let mut coordinator = memory_coordinator();
    coordinator
        .start(&format!("{}{}", server.uri(), LISTING_PATH), 5)
        .await
        .unwrap();

    let record = &coordinator.export_records()[0];
    assert_eq!(record.identifier, "ZZZZ");
    assert_eq!(record.name, "Test Field");
    assert_eq!(record.latitude, "");
    assert_eq!(record.longitude, "");
}

#[test]
fn test_corrupted_cache_is_purged() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    let mut backend = SqliteStore::new(&db_path).unwrap();
    backend.set(RESULTS_KEY, "[{\"identifier\":").unwrap();

    let mut store = ResumableStore::new(backend);
    assert!(store.reload().is_empty());
    assert_eq!(store.backend().get(RESULTS_KEY).unwrap(), None);

    // Reopening sees the purge too
    let reopened = SqliteStore::new(&db_path).unwrap();
    assert_eq!(reopened.get(RESULTS_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_exhausted_target_does_not_affect_siblings() {
    let server = MockServer::start().await;

    mount_listing(&server, LISTING_PATH, listing_page(&["KAAA", "KBAD", "KCCC"], None)).await;
    mount_detail(&server, "KAAA", "Alpha Field").await;
    mount_detail(&server, "KCCC", "Charlie Field").await;
    Mock::given(method("GET"))
        .and(path("/airports/KBAD/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let mut coordinator = memory_coordinator();
    let state = coordinator
        .start(&format!("{}{}", server.uri(), LISTING_PATH), 3)
        .await
        .unwrap();

    assert_eq!(state, CrawlState::Complete);
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.details_scanned, 2);
    assert_eq!(identifiers(coordinator.export_records()), vec!["KAAA", "KCCC"]);
}

#[tokio::test]
async fn test_cancellation_drains_current_chunk_only() {
    let server = MockServer::start().await;

    mount_listing(
        &server,
        LISTING_PATH,
        listing_page(&["KAAA", "KBBB", "KCCC", "KDDD"], Some("/countries/US/airports-2.html")),
    )
    .await;
    mount_detail(&server, "KAAA", "Alpha Field").await;
    mount_detail(&server, "KBBB", "Bravo Field").await;
    for identifier in ["KCCC", "KDDD"] {
        Mock::given(method("GET"))
            .and(path(format!("/airports/{}/", identifier)))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page(identifier, "Late")))
            .expect(0)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/countries/US/airports-2.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[], None)))
        .expect(0)
        .mount(&server)
        .await;

    let mut coordinator = memory_coordinator();
    let handle = coordinator.cancel_handle();
    coordinator.set_observer(Box::new(CancelOnFirstRecord { handle }));

    let state = coordinator
        .start(&format!("{}{}", server.uri(), LISTING_PATH), 2)
        .await
        .unwrap();

    assert_eq!(state, CrawlState::Aborted);
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.pages_scanned, 1);
    assert_eq!(snapshot.details_scanned, 2);
    assert_eq!(identifiers(coordinator.export_records()), vec!["KAAA", "KBBB"]);
}

#[tokio::test]
async fn test_results_independent_of_concurrency_width() {
    let server = MockServer::start().await;
    let codes = ["KAAA", "KBBB", "KCCC", "KDDD", "KEEE"];

    mount_listing(&server, LISTING_PATH, listing_page(&codes, None)).await;
    for code in codes {
        mount_detail(&server, code, &format!("{} Field", code)).await;
    }
    let entry = format!("{}{}", server.uri(), LISTING_PATH);

    let mut narrow = memory_coordinator();
    narrow.start(&entry, 1).await.unwrap();

    let mut wide = memory_coordinator();
    wide.start(&entry, 3).await.unwrap();

    assert_eq!(narrow.export_records().len(), 5);
    assert_eq!(narrow.export_records(), wide.export_records());
}

#[tokio::test]
async fn test_listing_failure_aborts_session() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut coordinator = memory_coordinator();
    let state = coordinator
        .start(&format!("{}{}", server.uri(), LISTING_PATH), 5)
        .await
        .unwrap();

    assert_eq!(state, CrawlState::Aborted);
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.pages_scanned, 0);
    assert_eq!(snapshot.errors, 0);
    assert!(!snapshot.active);
}

#[tokio::test]
async fn test_empty_entry_url_is_rejected() {
    let mut coordinator = memory_coordinator();
    let result = coordinator.start("", 5).await;

    assert!(matches!(result, Err(HarvestError::Validation(_))));
    assert_eq!(coordinator.snapshot().state, CrawlState::Idle);
}

#[tokio::test]
async fn test_session_resumes_from_sqlite_cache() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("harvest.db");

    mount_listing(&server, LISTING_PATH, listing_page(&["KAAA", "KBBB"], None)).await;
    mount_detail(&server, "KAAA", "Alpha Field").await;
    mount_detail(&server, "KBBB", "Bravo Field").await;

    let config = create_test_config(db_path.to_str().unwrap());
    {
        let mut coordinator = Coordinator::new(&config, open_store(&db_path).unwrap()).unwrap();
        coordinator
            .start(&format!("{}{}", server.uri(), LISTING_PATH), 2)
            .await
            .unwrap();
    }

    let observer = RecordingObserver::default();
    let mut coordinator = Coordinator::new(&config, open_store(&db_path).unwrap())
        .unwrap()
        .with_observer(Box::new(observer.clone()));

    assert_eq!(coordinator.restore_cached(), 2);
    assert_eq!(identifiers(coordinator.export_records()), vec!["KAAA", "KBBB"]);
    assert!(coordinator.session().seen().contains("KBBB"));
    assert_eq!(observer.records.lock().unwrap().len(), 2);
    assert_eq!(observer.exports.load(Ordering::SeqCst), 2);
}

fn fetch_client(templates: Vec<GatewayTemplate>, timeout: Duration, attempts: u32) -> FetchClient {
    fetch_client_with_backoff(templates, timeout, attempts, Duration::ZERO)
}

fn fetch_client_with_backoff(
    templates: Vec<GatewayTemplate>,
    timeout: Duration,
    attempts: u32,
    backoff_base: Duration,
) -> FetchClient {
    let config = create_test_config(":memory:");
    let http = build_http_client(&config.user_agent, timeout).unwrap();
    FetchClient::new(
        http,
        GatewayRotator::new(templates).unwrap(),
        RetrySettings {
            max_attempts: attempts,
            backoff_base,
        },
    )
}

#[tokio::test]
async fn test_gateway_rotation_and_json_envelope() {
    let server = MockServer::start().await;
    let target = "https://ourairports.com/airports/KSEA/?a=1&b=2";
    let content = detail_page("KSEA", "Seattle-Tacoma International Airport");

    Mock::given(method("GET"))
        .and(path("/gw1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gw2"))
        .and(query_param("target", target))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "contents": content.clone() })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = fetch_client(
        vec![
            GatewayTemplate::new(format!("{}/gw1?url={{url}}", server.uri()), EnvelopeKind::Raw),
            GatewayTemplate::new(
                format!("{}/gw2?target={{url}}", server.uri()),
                EnvelopeKind::JsonContents,
            ),
        ],
        Duration::from_secs(2),
        3,
    );

    // An inactive flag stops the fetch before any attempt
    let result = client.fetch(target, &ActiveFlag::new()).await;
    assert_eq!(result, Err(FetchError::Cancelled { attempts: 0 }));

    let body = client.fetch(target, &ActiveFlag::activated()).await;
    assert_eq!(body, Ok(content));
    assert_eq!(client.rotator().index(), 1);
    assert_eq!(client.gateway_label(), "GW-2");
}

#[tokio::test]
async fn test_timeouts_exhaust_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_page("KSLO", "Slow Field"))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = fetch_client(vec![GatewayTemplate::direct()], Duration::from_millis(100), 2);
    let result = client
        .fetch(&format!("{}/slow", server.uri()), &ActiveFlag::activated())
        .await;

    assert_eq!(
        result,
        Err(FetchError::Exhausted {
            attempts: 2,
            last_error: "Timeout".to_string(),
        })
    );
}

#[tokio::test]
async fn test_short_body_is_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Access denied"))
        .expect(3)
        .mount(&server)
        .await;

    let client = fetch_client(vec![GatewayTemplate::direct()], Duration::from_secs(2), 3);
    let result = client
        .fetch(&format!("{}/blocked", server.uri()), &ActiveFlag::activated())
        .await;

    match result {
        Err(FetchError::Exhausted { attempts, last_error }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("Empty"));
        }
        other => panic!("Expected exhausted fetch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_short_multibyte_body_is_rejected() {
    let server = MockServer::start().await;

    // 30 characters, 60 bytes
    Mock::given(method("GET"))
        .and(path("/accented"))
        .respond_with(ResponseTemplate::new(200).set_body_string("é".repeat(30)))
        .expect(1)
        .mount(&server)
        .await;

    let client = fetch_client(vec![GatewayTemplate::direct()], Duration::from_secs(2), 1);
    let result = client
        .fetch(&format!("{}/accented", server.uri()), &ActiveFlag::activated())
        .await;

    assert_eq!(
        result,
        Err(FetchError::Exhausted {
            attempts: 1,
            last_error: "Empty/invalid response (30 characters)".to_string(),
        })
    );
}

#[tokio::test]
async fn test_backoff_grows_linearly_without_trailing_sleep() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/unavailable"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = fetch_client_with_backoff(
        vec![GatewayTemplate::direct()],
        Duration::from_secs(2),
        3,
        Duration::from_millis(200),
    );

    let started = Instant::now();
    let result = client
        .fetch(&format!("{}/unavailable", server.uri()), &ActiveFlag::activated())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(
        result,
        Err(FetchError::Exhausted {
            attempts: 3,
            last_error: "HTTP 503".to_string(),
        })
    );
    // 200ms after the first attempt, 400ms after the second, none after the third
    assert!(elapsed >= Duration::from_millis(600), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1_200), "elapsed {:?}", elapsed);
}

#[test]
fn test_default_gateways_build_a_rotator() {
    let rotator = GatewayRotator::from_entries(&default_gateways()).unwrap();
    assert_eq!(rotator.len(), 3);
    assert_eq!(rotator.name(), "GW-1");
}
