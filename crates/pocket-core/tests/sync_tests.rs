//! End-to-end sync runs: mocked service, file-backed SQLite stores

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::fixtures::load_response_fixture;
use httpmock::Method::POST;
use httpmock::{Mock, MockServer};
use pocket_client::{ClientConfig, ClientError, Credentials, PocketClient};
use pocket_core::{
    BatchOutcome, ConfigError, FileConfig, NoProgress, RecordStore, SearchParams, SqliteDatabase,
    StoreTarget, SyncConfig, SyncError, SyncOptions, SyncOrchestrator,
};
use tempfile::TempDir;

const KEY: &str = "1234-abcd1234abcd1234abcd1234";
const TOKEN: &str = "5678defg-5678-defg-5678-defg56";

/// 2024-03-10T12:00:00Z; a 7 day window starts at 1709467200
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

struct Harness {
    _dir: TempDir,
    config: SyncConfig,
    db: SqliteDatabase,
    client: PocketClient,
}

fn harness(server: &MockServer, bootstrap: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let file = FileConfig {
        store: StoreTarget {
            database: dir.path().join("pocket.db"),
            ..Default::default()
        },
        api: ClientConfig {
            base_url: server.base_url(),
            ..Default::default()
        },
    };
    let config = SyncConfig::new(Credentials::new(KEY, TOKEN), file);
    let db = SqliteDatabase::open(&config.store.database).unwrap();
    if bootstrap {
        db.bootstrap(&config.store.items_table, &config.store.tags_table)
            .unwrap();
    }
    let client = PocketClient::new(&config.api).unwrap();
    Harness {
        _dir: dir,
        config,
        db,
        client,
    }
}

async fn mock_get<'a>(server: &'a MockServer, partial_body: &str, fixture: &str) -> Mock<'a> {
    let body = load_response_fixture(fixture);
    let partial_body = partial_body.to_string();
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v3/get").json_body_partial(partial_body);
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        })
        .await
}

fn tag_names(h: &Harness) -> Vec<String> {
    h.db.tags("tags")
        .unwrap()
        .all()
        .unwrap()
        .into_iter()
        .map(|t| t.tag)
        .collect()
}

#[tokio::test]
async fn full_sync_then_incremental_then_nothing_new() {
    let server = MockServer::start_async().await;
    let h = harness(&server, true);
    let items = h.db.items("items").unwrap();
    let tags = h.db.tags("tags").unwrap();
    let orchestrator = SyncOrchestrator::new(&h.config, &h.client, &items, &tags);

    // full
    let full = mock_get(&server, r#"{"count": 10000}"#, "get_three.json").await;
    let report = orchestrator
        .run_at(now(), &SyncOptions::full(), &mut NoProgress)
        .await
        .unwrap();
    full.assert_async().await;
    full.delete_async().await;

    assert_eq!(report.fetched, 3);
    assert_eq!(report.items, BatchOutcome::Inserted(3));
    assert_eq!(items.count().unwrap(), 3);
    assert_eq!(tag_names(&h), vec!["rust", "releases", "databases"]);

    let sqlite = items.get("1840042").unwrap().unwrap();
    assert_eq!(sqlite.extra.given_domain.as_deref(), Some("www.sqlite.org"));
    assert_eq!(
        sqlite.extra.tags,
        Some(vec!["databases".to_string(), "rust".to_string()])
    );
    assert_eq!(sqlite.payload["word_count"], "2410");

    let bare = items.get("990001").unwrap().unwrap();
    assert_eq!(bare.extra.given_domain, None);
    assert_eq!(bare.extra.tags, None);

    // incremental: one new item, one already stored
    let recent = mock_get(&server, r#"{"since": 1709467200}"#, "get_recent.json").await;
    let options = SyncOptions::incremental(7);
    let report = orchestrator
        .run_at(now(), &options, &mut NoProgress)
        .await
        .unwrap();
    assert_eq!(report.items, BatchOutcome::Inserted(1));
    assert_eq!(report.tags, BatchOutcome::Inserted(1));
    assert_eq!(items.count().unwrap(), 4);
    assert_eq!(tag_names(&h), vec!["rust", "releases", "databases", "async"]);

    // same window again
    let report = orchestrator
        .run_at(now(), &options, &mut NoProgress)
        .await
        .unwrap();
    recent.assert_hits_async(2).await;
    assert!(report.no_new_items());
    assert_eq!(report.tags, BatchOutcome::NothingNew);
    assert_eq!(items.count().unwrap(), 4);
    assert_eq!(tags.count().unwrap(), 4);
}

#[tokio::test]
async fn full_wipe_replaces_previous_contents() {
    let server = MockServer::start_async().await;
    let h = harness(&server, true);
    let items = h.db.items("items").unwrap();
    let tags = h.db.tags("tags").unwrap();
    let orchestrator = SyncOrchestrator::new(&h.config, &h.client, &items, &tags);

    let recent = mock_get(&server, r#"{"since": 1709467200}"#, "get_recent.json").await;
    orchestrator
        .run_at(now(), &SyncOptions::default(), &mut NoProgress)
        .await
        .unwrap();
    recent.delete_async().await;

    let _full = mock_get(&server, r#"{"count": 3}"#, "get_three.json").await;
    let options = SyncOptions::full().with_limit(3).with_wipe(true);
    let report = orchestrator
        .run_at(now(), &options, &mut NoProgress)
        .await
        .unwrap();

    assert!(report.wiped);
    assert_eq!(items.count().unwrap(), 3);
    assert!(items.get("3310571").unwrap().is_none());
    assert_eq!(tag_names(&h), vec!["rust", "releases", "databases"]);
}

#[tokio::test]
async fn search_over_synced_items() {
    let server = MockServer::start_async().await;
    let h = harness(&server, true);
    let items = h.db.items("items").unwrap();
    let tags = h.db.tags("tags").unwrap();
    let orchestrator = SyncOrchestrator::new(&h.config, &h.client, &items, &tags);

    let _full = mock_get(&server, r#"{"count": 10000}"#, "get_three.json").await;
    orchestrator
        .run_at(now(), &SyncOptions::full().with_wipe(true), &mut NoProgress)
        .await
        .unwrap();

    let found = items
        .search(&SearchParams::default().tag("rust").domain("sqlite"))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].item_id, "1840042");

    let found = items.search(&SearchParams::default().text("rust 1.0")).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].item_id, "2093848");
}

#[tokio::test]
async fn missing_tables_abort_before_request() {
    let server = MockServer::start_async().await;
    let h = harness(&server, false);
    let items = h.db.items("items").unwrap();
    let tags = h.db.tags("tags").unwrap();
    let orchestrator = SyncOrchestrator::new(&h.config, &h.client, &items, &tags);

    let mock = mock_get(&server, "{}", "get_three.json").await;
    let err = orchestrator
        .run_at(now(), &SyncOptions::full(), &mut NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Config(ConfigError::MissingStore(ref t)) if t == "items"));
    assert_eq!(err.exit_code(), 2);
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn rejected_credentials_leave_store_untouched() {
    let server = MockServer::start_async().await;
    let h = harness(&server, true);
    let items = h.db.items("items").unwrap();
    let tags = h.db.tags("tags").unwrap();
    let orchestrator = SyncOrchestrator::new(&h.config, &h.client, &items, &tags);

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v3/get");
            then.status(401).header("X-Error", "Invalid access token");
        })
        .await;

    let err = orchestrator
        .run_at(now(), &SyncOptions::default(), &mut NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Remote(ClientError::Auth { status: 401, .. })
    ));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(items.count().unwrap(), 0);
    assert_eq!(tags.count().unwrap(), 0);
}

#[tokio::test]
async fn empty_window_is_nothing_new() {
    let server = MockServer::start_async().await;
    let h = harness(&server, true);
    let items = h.db.items("items").unwrap();
    let tags = h.db.tags("tags").unwrap();
    let orchestrator = SyncOrchestrator::new(&h.config, &h.client, &items, &tags);

    let _empty = mock_get(&server, "{}", "get_empty.json").await;
    let report = orchestrator
        .run_at(now(), &SyncOptions::default(), &mut NoProgress)
        .await
        .unwrap();

    assert_eq!(report.fetched, 0);
    assert!(report.no_new_items());
}

#[tokio::test]
async fn refresh_tags_rebuilds_taxonomy() {
    let server = MockServer::start_async().await;
    let h = harness(&server, true);
    let items = h.db.items("items").unwrap();
    let tags = h.db.tags("tags").unwrap();
    tags.insert(&[pocket_core::Tag::new("stale", None)], &mut |_| {})
        .unwrap();
    let orchestrator = SyncOrchestrator::new(&h.config, &h.client, &items, &tags);

    let mock = mock_get(&server, r#"{"count": 20}"#, "get_three.json").await;
    let outcome = orchestrator
        .refresh_tags(20, Some("u1"), &mut NoProgress)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(outcome, BatchOutcome::Inserted(3));
    let stored = tags.all().unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.iter().all(|t| t.user_id.as_deref() == Some("u1")));
    assert_eq!(items.count().unwrap(), 0);
}
