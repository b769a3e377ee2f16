//! Integration tests for the ingestion pipeline
//!
//! These tests use wiremock to stand in for the listing sources and run
//! full fetch, extract and reconcile cycles against a real SQLite store.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wipe_ledger::config::{parse_config, resolve_credentials, Config, Credentials};
use wipe_ledger::model::{ServerRecord, PLACEHOLDER_NAME};
use wipe_ledger::output::collect_existing_names;
use wipe_ledger::pipeline::{run_source, run_sources};
use wipe_ledger::source::build_adapter;
use wipe_ledger::storage::{SqliteStore, Store};
use wipe_ledger::{ConfigError, LedgerError, RunReport, StopReason};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates an API source configuration pointing at the mock server
fn api_config(base_url: &str, database_path: &str, max_attempts: u32) -> Config {
    parse_config(&format!(
        r#"
[store]
database-path = "{database_path}"

[[source]]
name = "bm-api"
kind = "battlemetrics-api"
base-url = "{base_url}/servers"
page-size = 100
max-pages = 10
delay-min-ms = 0
delay-max-ms = 0
max-attempts = {max_attempts}
backoff-base-ms = 0
api-key-env = "BM_TEST_KEY"
"#
    ))
    .expect("valid API config")
}

/// Creates a Just-Wiped source configuration with a 60% rating gate
fn listing_config(base_url: &str) -> Config {
    parse_config(&format!(
        r#"
[store]
database-path = ":memory:"

[[source]]
name = "just-wiped"
kind = "just-wiped"
base-url = "{base_url}/rust_servers"
max-pages = 1
delay-min-ms = 0
delay-max-ms = 0
backoff-base-ms = 0
cache-bust = true
min-rating = 60
carries-wipe-instant = true
"#
    ))
    .expect("valid listing config")
}

fn api_server(id: u32) -> Value {
    json!({
        "type": "server",
        "id": id.to_string(),
        "attributes": {
            "id": id.to_string(),
            "name": format!("Server {} | Duo Weekly", id),
            "details": { "rust_last_wipe": "2024-01-04T18:00:00.000Z" }
        }
    })
}

fn api_page(first_id: u32, count: u32) -> Value {
    json!({ "data": (first_id..first_id + count).map(api_server).collect::<Vec<_>>() })
}

fn listing_entry(id: u32, name: &str, rating: u8) -> String {
    format!(
        r#"<div class="server">
             <a title="Open the server details page" href="/rust_servers/{id}">{name}</a>
             <div class="rating">{rating}%</div>
             <time class="timeago" datetime="2024-01-04T18:00:00Z">1 hour ago</time>
           </div>"#
    )
}

fn listing_page(entries: &[String]) -> String {
    format!("<html><body><main>{}</main></body></html>", entries.join("\n"))
}

async fn run_once(config: &Config, store: &mut SqliteStore) -> RunReport {
    let source = config.sources[0].clone();
    let mut adapter =
        build_adapter(source, &config.client, &Credentials::default()).expect("adapter builds");
    run_source(adapter.as_mut(), store, &CancellationToken::new()).await
}

#[tokio::test]
async fn test_api_pagination_stops_on_short_page() {
    let mock_server = MockServer::start().await;

    for (page, first_id, count) in [("1", 1, 100), ("2", 101, 100), ("3", 201, 40)] {
        Mock::given(method("GET"))
            .and(path("/servers"))
            .and(query_param("page[number]", page))
            .and(query_param("filter[game]", "rust"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_page(first_id, count)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("wipes.db");
    let config = api_config(&mock_server.uri(), db_path.to_str().unwrap(), 3);
    let credentials = resolve_credentials(&config, &[], |_| Some("secret".to_string())).unwrap();

    let reports = run_sources(&config, &credentials, &[], "hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.pages_processed, 3);
    assert_eq!(report.created, 240);
    assert_eq!(report.failures, 0);
    assert_eq!(report.stop_reason, Some(StopReason::ShortPage));

    let store = SqliteStore::new(&db_path).unwrap();
    assert_eq!(store.count_servers().unwrap(), 240);
    assert_eq!(store.count_schedule_entries().unwrap(), 240);
    let server = store.get(7).unwrap().unwrap();
    assert_eq!(server.max_group, Some(2));

    let runs = store.recent_runs(5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].source, "bm-api");
    assert_eq!(runs[0].config_hash, "hash");
    assert_eq!(runs[0].stop_reason, Some(StopReason::ShortPage));
}

#[tokio::test]
async fn test_rating_gate_discards_without_failure() {
    let mock_server = MockServer::start().await;
    let html = listing_page(&[
        listing_entry(101, "Alpha Quad Monthly", 80),
        listing_entry(102, "Bravo Solo", 55),
        listing_entry(103, "Charlie Trio", 60),
    ]);
    Mock::given(method("GET"))
        .and(path("/rust_servers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&mock_server)
        .await;

    let config = listing_config(&mock_server.uri());
    let mut store = SqliteStore::new_in_memory().unwrap();

    let report = run_once(&config, &mut store).await;

    assert_eq!(report.created, 2);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.discard_reasons.get("below_rating"), Some(&1));
    assert_eq!(report.failures, 0);
    assert!(store.get(102).unwrap().is_none());
    assert_eq!(store.get(101).unwrap().unwrap().max_group, Some(4));
    assert_eq!(store.get(103).unwrap().unwrap().max_group, Some(3));
}

#[tokio::test]
async fn test_repeat_run_skips_duplicate_slots() {
    let mock_server = MockServer::start().await;
    let html = listing_page(&[
        listing_entry(201, "Delta Duo", 90),
        listing_entry(202, "Echo", 90),
    ]);
    Mock::given(method("GET"))
        .and(path("/rust_servers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = listing_config(&mock_server.uri());
    let mut store = SqliteStore::new_in_memory().unwrap();

    let first = run_once(&config, &mut store).await;
    assert_eq!(first.created, 2);

    let second = run_once(&config, &mut store).await;
    assert_eq!(second.created, 0);
    assert_eq!(second.schedule_added, 0);
    assert_eq!(second.skipped_duplicate, 2);
    assert_eq!(store.count_schedule_entries().unwrap(), 2);

    let slots = store.list_schedule(201).unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].day_name, "Thursday");
    assert_eq!(slots[0].wipe_hour, "1pm est");

    assert_eq!(
        collect_existing_names(&[first, second]),
        vec!["Delta Duo", "Echo"]
    );
}

#[tokio::test]
async fn test_placeholder_record_is_repaired() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rust_servers"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[listing_entry(301, "Foxtrot Solo", 75)])),
        )
        .mount(&mock_server)
        .await;

    let config = listing_config(&mock_server.uri());
    let mut store = SqliteStore::new_in_memory().unwrap();
    store
        .create(&ServerRecord {
            server_id: 301,
            server_name: "Unknown Server".to_string(),
            max_group: None,
            wipe_time: None,
        })
        .unwrap();

    let report = run_once(&config, &mut store).await;

    assert_eq!(report.updated, 1);
    assert_eq!(report.created, 0);
    let repaired = store.get(301).unwrap().unwrap();
    assert_eq!(repaired.server_name, "Foxtrot Solo");
    assert_eq!(repaired.max_group, Some(1));
    assert!(repaired.wipe_time.is_some());
}

#[tokio::test]
async fn test_retry_exhaustion_stops_source() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = api_config(&mock_server.uri(), ":memory:", 2);
    let mut credentials = Credentials::default();
    credentials.insert("bm-api", "secret");
    let mut adapter =
        build_adapter(config.sources[0].clone(), &config.client, &credentials).unwrap();
    let mut store = SqliteStore::new_in_memory().unwrap();

    let report = run_source(adapter.as_mut(), &mut store, &CancellationToken::new()).await;

    assert_eq!(report.pages_processed, 0);
    assert_eq!(report.stop_reason, Some(StopReason::FetchFailed));
    assert_eq!(store.count_servers().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_credential_aborts_before_network() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_page(1, 1)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = api_config(&mock_server.uri(), ":memory:", 3);

    let resolved = resolve_credentials(&config, &[], |_| None);
    assert!(matches!(
        resolved,
        Err(ConfigError::MissingCredential { ref variable, .. }) if variable == "BM_TEST_KEY"
    ));

    let result = run_sources(
        &config,
        &Credentials::default(),
        &[],
        "hash",
        CancellationToken::new(),
    )
    .await;
    assert!(matches!(
        result,
        Err(LedgerError::Config(ConfigError::MissingCredential { .. }))
    ));
}

#[tokio::test]
async fn test_detail_placeholder_repaired_by_listing_run() {
    let details = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rust_servers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><a href="/rust_servers/401">Golf</a><a href="/rust_servers/map">Map</a></body></html>"#,
        ))
        .mount(&details)
        .await;
    Mock::given(method("GET"))
        .and(path("/rust_servers/401"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><span class=\"max-group\">2</span></body></html>",
        ))
        .expect(1)
        .mount(&details)
        .await;

    let details_config = parse_config(&format!(
        r#"
[store]
database-path = ":memory:"

[[source]]
name = "jw-details"
kind = "just-wiped-details"
base-url = "{}/rust_servers"
max-pages = 1
delay-min-ms = 0
delay-max-ms = 0
backoff-base-ms = 0
"#,
        details.uri()
    ))
    .expect("valid details config");

    let mut store = SqliteStore::new_in_memory().unwrap();
    let first = run_once(&details_config, &mut store).await;
    assert_eq!(first.created, 1);

    let placeholder = store.get(401).unwrap().unwrap();
    assert_eq!(placeholder.server_name, PLACEHOLDER_NAME);
    assert_eq!(placeholder.max_group, Some(2));
    assert_eq!(placeholder.wipe_time, None);

    let listing = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rust_servers"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[listing_entry(401, "Golf Trio", 88)])),
        )
        .mount(&listing)
        .await;

    let second = run_once(&listing_config(&listing.uri()), &mut store).await;
    assert_eq!(second.updated, 1);
    assert_eq!(second.created, 0);

    let repaired = store.get(401).unwrap().unwrap();
    assert_eq!(repaired.server_name, "Golf Trio");
    assert_eq!(repaired.max_group, Some(3));
    assert!(repaired.wipe_time.is_some());
}

#[tokio::test]
async fn test_listing_without_server_containers() {
    let mock_server = MockServer::start().await;
    let html = r#"<html><body><table>
        <tr>
          <td><a title="Open the server details page" href="/rust_servers/501">Hotel Duo</a></td>
          <td><span class="rating">77%</span></td>
          <td><time class="timeago" datetime="2024-01-04T18:00:00Z">1 hour ago</time></td>
        </tr>
    </table></body></html>"#;
    Mock::given(method("GET"))
        .and(path("/rust_servers"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&mock_server)
        .await;

    let config = listing_config(&mock_server.uri());
    let mut store = SqliteStore::new_in_memory().unwrap();
    let report = run_once(&config, &mut store).await;

    assert_eq!(report.created, 1);
    assert_eq!(report.malformed, 0);
    assert_eq!(report.stop_reason, Some(StopReason::MaxPages));
    let slots = store.list_schedule(501).unwrap();
    assert_eq!(slots[0].wipe_hour, "1pm est");
}
