//! Integration tests for the harvester
//!
//! These tests use wiremock to serve listing and photo pages and run the
//! full discovery and extraction cycle end-to-end.

use geo_harvest::config::{Config, CrawlerConfig, OutputConfig, RetryPolicy, SiteConfig, UserAgentConfig};
use geo_harvest::crawler::Coordinator;
use geo_harvest::output::load_statistics;
use geo_harvest::storage::{MemorySink, RecordSink, RunStatus, SqliteSink};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing every URL at the mock server
fn create_test_config(base_url: &str, seeds: &[&str], db_path: &str) -> Config {
    Config {
        seeds: seeds.iter().map(|s| format!("{}{}", base_url, s)).collect(),
        crawler: CrawlerConfig {
            worker_count: Some(2),
            max_attempts: 3,
            retry_policy: RetryPolicy::OnFetchFailure,
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            queue_capacity: 0,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
        },
        site: SiteConfig {
            base_url: base_url.to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
        ..Config::default()
    }
}

/// Listing page embedding the given `(pathAlias, id, title)` entries
fn listing_page(photos: &[(&str, &str, &str)]) -> String {
    let entries: Vec<String> = photos
        .iter()
        .map(|(owner, id, title)| {
            format!(
                r#"{{"_flickrModelRegistry":"photo-lite-models","pathAlias":"{}","id":"{}","title":"{}","description":"{} description"}}"#,
                owner, id, title, title
            )
        })
        .collect();

    format!(
        r#"<html><head><script class="modelExport">modelExport: {{"main":{{"search-photos-lite-models":[{{"photos":{{"_data":[{}],"fetchedStart":true,"fetchedEnd":false}}}}]}}}}</script></head><body></body></html>"#,
        entries.join(",")
    )
}

fn photo_page(latitude: &str, longitude: &str) -> String {
    format!(
        r#"<html><script>{{"_flickrModelRegistry":"photo-geo-models","hasGeo":true,"latitude":{},"longitude":{},"accuracy":16}}</script></html>"#,
        latitude, longitude
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_harvest_into_sqlite() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("flickr.db");

    mount_page(
        &mock_server,
        "/search/paris",
        listing_page(&[
            ("parismadrid", "2099310718", "Paris"),
            ("karen_od", "494682581", "Unreachable"),
            ("nogeo", "111", "Indoors"),
        ]),
    )
    .await;
    mount_page(
        &mock_server,
        "/photos/parismadrid/2099310718",
        photo_page("48.853187", "2.350301"),
    )
    .await;
    mount_page(
        &mock_server,
        "/photos/nogeo/111",
        "<html><body>no map here</body></html>".to_string(),
    )
    .await;

    // Fails on every attempt
    Mock::given(method("GET"))
        .and(path("/photos/karen_od/494682581"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &["/search/paris"], db_path.to_str().unwrap());
    let storage = Arc::new(SqliteSink::new(&db_path).unwrap());
    let sink: Arc<dyn RecordSink> = storage.clone();

    let summary = Coordinator::new(config, sink).unwrap().run().await.unwrap();

    assert_eq!(summary.seeds_visited, 1);
    assert_eq!(summary.items_discovered, 3);
    assert_eq!(summary.stats.records_emitted, 1);
    assert_eq!(summary.stats.geo_absent, 1);
    assert_eq!(summary.stats.geo_fetch_failures, 3);
    assert_eq!(summary.stats.retries_scheduled, 2);
    assert_eq!(summary.stats.items_abandoned, 1);
    assert_eq!(summary.stats.items_failed(), 2);
    assert!(!summary.cancelled);

    assert_eq!(storage.count_records().unwrap(), 1);
    let record = storage.get_record("2099310718").unwrap().unwrap();
    assert_eq!(record.owner, "parismadrid");
    assert_eq!(record.title, "Paris");
    assert_eq!(record.description, "Paris description");
    assert_eq!(record.url, format!("{}/photos/parismadrid/2099310718", base_url));
    assert_eq!(record.latitude(), 48.853187);
    assert_eq!(record.longitude(), 2.350301);

    assert!(storage.get_record("494682581").unwrap().is_none());
    assert!(storage.get_record("111").unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_photo_page_yields_no_record() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/search/karen",
        listing_page(&[("karen_od", "494682581", "Blue Mountains")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/photos/karen_od/494682581"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(&base_url, &["/search/karen"], "unused.db");
    config.crawler.retry_policy = RetryPolicy::Never;

    let sink = Arc::new(MemorySink::new());
    let summary = Coordinator::new(config, sink.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(sink.is_empty());
    assert_eq!(summary.stats.geo_fetch_failures, 1);
    assert_eq!(summary.stats.retries_scheduled, 0);
}

#[tokio::test]
async fn test_seed_without_photo_block_is_skipped() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/search/broken",
        "<html><body>Rate limited, try later</body></html>".to_string(),
    )
    .await;
    mount_page(
        &mock_server,
        "/search/sydney",
        listing_page(&[("katoomba", "42", "Three Sisters")]),
    )
    .await;
    mount_page(
        &mock_server,
        "/photos/katoomba/42",
        photo_page("-33.703937", "150.374755"),
    )
    .await;

    let config = create_test_config(&base_url, &["/search/broken", "/search/sydney"], "unused.db");
    let sink = Arc::new(MemorySink::new());
    let summary = Coordinator::new(config, sink.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.seeds_visited, 2);
    assert_eq!(summary.seeds_failed, 1);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_id, "42");
    assert_eq!(records[0].latitude(), -33.703937);
    assert_eq!(records[0].longitude(), 150.374755);
}

#[tokio::test]
async fn test_duplicate_seed_is_fetched_once() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/search/paris"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&[("parismadrid", "2099310718", "Paris")])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/photos/parismadrid/2099310718",
        photo_page("48.853187", "2.350301"),
    )
    .await;

    let config = create_test_config(&base_url, &["/search/paris", "/search/paris"], "unused.db");
    let sink = Arc::new(MemorySink::new());
    let summary = Coordinator::new(config, sink.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.seeds_total, 2);
    assert_eq!(summary.seeds_visited, 1);
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn test_requests_carry_user_agent() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/search/ua"))
        .and(header("user-agent", "TestBot/1.0.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&base_url, &["/search/ua"], "unused.db");
    let summary = Coordinator::new(config, Arc::new(MemorySink::new()))
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.seeds_failed, 0);
    assert_eq!(summary.items_discovered, 0);
}

#[tokio::test]
async fn test_run_is_tracked_in_database() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("runs.db");

    mount_page(
        &mock_server,
        "/search/paris",
        listing_page(&[("a", "1", "One"), ("b", "2", "Two")]),
    )
    .await;
    mount_page(&mock_server, "/photos/a/1", photo_page("10.5", "20.5")).await;
    mount_page(&mock_server, "/photos/b/2", photo_page("-10.5", "-20.5")).await;

    let config = create_test_config(&base_url, &["/search/paris"], db_path.to_str().unwrap());
    let storage = Arc::new(SqliteSink::new(Path::new(&db_path)).unwrap());
    let run_id = storage.begin_run("test-hash").unwrap();

    let summary = Coordinator::new(config, storage.clone())
        .unwrap()
        .run()
        .await
        .unwrap();
    storage
        .finish_run(run_id, summary.run_status(), &summary.run_totals())
        .unwrap();

    let stats = load_statistics(&storage).unwrap();
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.total_runs, 1);

    let run = stats.latest_run.unwrap();
    assert_eq!(run.id, run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.seeds_visited, 1);
    assert_eq!(run.items_discovered, 2);
    assert_eq!(run.records_emitted, 2);
    assert_eq!(run.items_failed, 0);
}
