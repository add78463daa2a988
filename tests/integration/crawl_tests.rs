//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the catalog/thread API and the
//! media hosts, and test full update runs end-to-end against a database in a
//! temporary directory.

use chan_archiver::config::{
    ApiConfig, BoardEntry, Config, OutputConfig, ScraperConfig, UserAgentConfig,
};
use chan_archiver::crawler::Coordinator;
use chan_archiver::storage::{RunStatus, Storage};
use chan_archiver::triggers::{RuleField, RuleOperator, TriggerRule};
use chan_archiver::{run_crawl, ArchiverError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration pointing every host at the mock server
fn create_test_config(server: &MockServer, dir: &TempDir, boards: Vec<BoardEntry>) -> Config {
    Config {
        scraper: ScraperConfig {
            workers: 2,
            api_wait: 0,
            file_wait: 0,
            connection_timeout: 5,
        },
        api: ApiConfig {
            api_url: server.uri(),
            image_url: format!("{}/img", server.uri()),
            thumbnail_url: format!("{}/thumb", server.uri()),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: dir.path().join("archive.db").display().to_string(),
            media_path: dir.path().join("media").display().to_string(),
        },
        boards,
    }
}

fn board(name: &str, replies_threshold: u32) -> BoardEntry {
    BoardEntry {
        name: name.to_string(),
        active: true,
        replies_threshold,
        store_threads_for: 48,
    }
}

/// Catalog with one page; each thread is `(number, replies, last reply time)`
fn catalog(threads: &[(i64, u32, i64)]) -> Value {
    let threads: Vec<Value> = threads
        .iter()
        .map(|(no, replies, last)| {
            json!({
                "no": no,
                "time": 100,
                "replies": replies,
                "last_replies": [{ "no": no + 1, "time": last }],
            })
        })
        .collect();
    json!([{ "page": 1, "threads": threads }])
}

/// Plain text post with its time derived from its number
fn post(no: i64) -> Value {
    json!({ "no": no, "time": no * 100, "name": "Anonymous", "com": format!("post {}", no) })
}

fn thread(posts: Vec<Value>) -> Value {
    json!({ "posts": posts })
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn stored_numbers(coordinator: &Coordinator, board: &str, number: i64) -> Vec<i64> {
    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let thread = storage.get_thread(board, number).unwrap().unwrap();
    let numbers = storage.post_numbers(thread.id).unwrap();
    numbers
}

#[tokio::test]
async fn test_threshold_launches_single_worker() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(&mock_server, "/g/catalog.json", catalog(&[(1, 30, 3100), (2, 5, 600)])).await;

    Mock::given(method("GET"))
        .and(path("/g/thread/1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(thread(vec![post(1), post(2)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/g/thread/2.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(thread(vec![post(2)])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server, &dir, vec![board("g", 20)]);
    let coordinator = Coordinator::new(config).unwrap();
    let run = coordinator.run_board("g", 4).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.processed_threads, 1);
    assert_eq!(run.downloaded_threads, 1);
    assert_eq!(run.added_posts, 2);
    assert_eq!(run.used_workers, 4);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    assert!(storage.get_thread("g", 2).unwrap().is_none());
}

#[tokio::test]
async fn test_remote_list_drives_additions_and_removals() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(&mock_server, "/g/catalog.json", catalog(&[(1, 2, 300)])).await;
    mount_json(
        &mock_server,
        "/g/thread/1.json",
        thread(vec![post(1), post(2), post(3)]),
    )
    .await;

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();

    let first = coordinator.run_board("g", 1).await.unwrap();
    assert_eq!(first.added_posts, 3);
    assert_eq!(stored_numbers(&coordinator, "g", 1), vec![1, 2, 3]);

    // Post 2 was deleted remotely and post 4 arrived
    mock_server.reset().await;
    mount_json(&mock_server, "/g/catalog.json", catalog(&[(1, 2, 400)])).await;
    mount_json(
        &mock_server,
        "/g/thread/1.json",
        thread(vec![post(1), post(3), post(4)]),
    )
    .await;

    let second = coordinator.run_board("g", 1).await.unwrap();
    assert_eq!(second.added_posts, 1);
    assert_eq!(second.removed_posts, 1);
    assert_eq!(stored_numbers(&coordinator, "g", 1), vec![1, 3, 4]);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let stored = storage.get_thread("g", 1).unwrap().unwrap();
    assert_eq!(stored.replies, 3);
}

#[tokio::test]
async fn test_unchanged_thread_is_not_downloaded_again() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Two replies, the last one at the time of post 3
    mount_json(&mock_server, "/g/catalog.json", catalog(&[(1, 2, 300)])).await;
    Mock::given(method("GET"))
        .and(path("/g/thread/1.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(thread(vec![post(1), post(2), post(3)])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();

    coordinator.run_board("g", 1).await.unwrap();
    let second = coordinator.run_board("g", 1).await.unwrap();

    assert_eq!(second.processed_threads, 1);
    assert_eq!(second.downloaded_threads, 0);
    assert_eq!(second.added_posts, 0);
}

#[tokio::test]
async fn test_attachments_are_downloaded_and_stored() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(&mock_server, "/g/catalog.json", catalog(&[(1, 0, 100)])).await;
    mount_json(
        &mock_server,
        "/g/thread/1.json",
        thread(vec![json!({
            "no": 1,
            "time": 100,
            "sub": "Wallpapers",
            "com": "first<br>second",
            "tim": 1234,
            "ext": ".png",
            "filename": "cat",
        })]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/img/g/1234.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"full image".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/thumb/g/1234s.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumbnail".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();
    let run = coordinator.run_board("g", 1).await.unwrap();

    assert_eq!(run.downloaded_images, 1);
    assert_eq!(run.downloaded_thumbnails, 1);

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let thread = storage.get_thread("g", 1).unwrap().unwrap();
    assert_eq!(thread.images, 1);

    let post = storage.get_post(thread.id, 1).unwrap().unwrap();
    assert_eq!(post.subject, "Wallpapers");
    assert_eq!(post.comment, "first\nsecond");

    let image = storage.get_image(post.id).unwrap().unwrap();
    assert_eq!(image.original_name, "cat");
    assert_eq!(
        std::fs::read(dir.path().join("media").join(&image.image)).unwrap(),
        b"full image"
    );
    assert_eq!(
        std::fs::read(dir.path().join("media").join(&image.thumbnail)).unwrap(),
        b"thumbnail"
    );
}

#[tokio::test]
async fn test_failed_attachment_stops_thread_without_partial_post() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(&mock_server, "/g/catalog.json", catalog(&[(1, 2, 300)])).await;
    mount_json(
        &mock_server,
        "/g/thread/1.json",
        thread(vec![
            post(1),
            json!({ "no": 2, "time": 200, "com": "pic", "tim": 99, "ext": ".jpg", "filename": "x" }),
            post(3),
        ]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/img/g/99.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/thumb/g/99s.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumb".to_vec()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();
    let run = coordinator.run_board("g", 1).await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.added_posts, 1);
    assert_eq!(run.downloaded_images, 1);
    assert_eq!(run.downloaded_thumbnails, 0);
    assert_eq!(stored_numbers(&coordinator, "g", 1), vec![1]);
    assert!(!dir.path().join("media/post_images/g/99.jpg").exists());
}

#[tokio::test]
async fn test_catalog_failure_marks_run_failed() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/g/catalog.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();
    let result = coordinator.run_board("g", 2).await;

    assert!(matches!(result, Err(ArchiverError::Catalog { .. })));

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();
    let runs = storage.recent_runs(1).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].finished_at.is_some());
}

#[tokio::test]
async fn test_unknown_board_is_rejected() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();

    let result = coordinator.run_board("v", 2).await;
    assert!(matches!(result, Err(ArchiverError::BoardNotFound(_))));
}

#[tokio::test]
async fn test_triggers_retain_and_tag_threads() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(&mock_server, "/g/catalog.json", catalog(&[(1, 1, 200), (10, 0, 100)])).await;
    mount_json(
        &mock_server,
        "/g/thread/1.json",
        thread(vec![
            post(1),
            json!({ "no": 2, "time": 200, "com": "please <b>ARCHIVE</b> me" }),
        ]),
    )
    .await;
    mount_json(&mock_server, "/g/thread/10.json", thread(vec![post(10)])).await;

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();

    let tag_id = {
        let storage = coordinator.storage();
        let mut storage = storage.lock().unwrap();
        let tag_id = storage.create_tag("keep").unwrap();
        storage
            .insert_trigger(
                &TriggerRule::new(RuleField::Comment, RuleOperator::Contains, "archive me")
                    .case_sensitive(false)
                    .retain()
                    .tag(tag_id),
            )
            .unwrap();
        tag_id
    };

    coordinator.run_board("g", 2).await.unwrap();

    let storage = coordinator.storage();
    let storage = storage.lock().unwrap();

    let matched = storage.get_thread("g", 1).unwrap().unwrap();
    assert!(matched.saved);
    assert!(matched.auto_saved);
    let links = storage.thread_tags(matched.id).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].tag_id, tag_id);
    assert!(links[0].automatically_added);

    let other = storage.get_thread("g", 10).unwrap().unwrap();
    assert!(!other.saved);
    assert!(storage.thread_tags(other.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_pool_processes_every_thread() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let threads: Vec<(i64, u32, i64)> = (1..=5).map(|n| (n * 10, 0, n * 1000)).collect();
    mount_json(&mock_server, "/g/catalog.json", catalog(&threads)).await;
    for (number, _, _) in &threads {
        Mock::given(method("GET"))
            .and(path(format!("/g/thread/{}.json", number)))
            .respond_with(ResponseTemplate::new(200).set_body_json(thread(vec![post(*number)])))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();
    let run = coordinator.run_board("g", 2).await.unwrap();

    assert_eq!(run.processed_threads, 5);
    assert_eq!(run.downloaded_threads, 5);
    assert_eq!(run.added_posts, 5);
}

/// Answers with a delayed thread body and records when each request arrived
struct SlowThread {
    body: Value,
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for SlowThread {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_json(self.body.clone())
            .set_delay(self.delay)
    }
}

/// Largest number of requests that were being answered at the same time
///
/// A request is in flight for at least `delay` after it arrives, so the
/// requests in flight at an arrival are those that arrived less than
/// `delay` before it.
fn peak_in_flight(arrivals: &[Instant], delay: Duration) -> usize {
    arrivals
        .iter()
        .map(|at| {
            arrivals
                .iter()
                .filter(|other| *other <= at && at.duration_since(**other) < delay)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_pool_never_exceeds_worker_count() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let delay = Duration::from_millis(200);
    let arrivals = Arc::new(Mutex::new(Vec::new()));

    let threads: Vec<(i64, u32, i64)> = (1..=6).map(|n| (n * 10, 0, n * 1000)).collect();
    mount_json(&mock_server, "/g/catalog.json", catalog(&threads)).await;
    for (number, _, _) in &threads {
        Mock::given(method("GET"))
            .and(path(format!("/g/thread/{}.json", number)))
            .respond_with(SlowThread {
                body: thread(vec![post(*number)]),
                delay,
                arrivals: Arc::clone(&arrivals),
            })
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let coordinator = Coordinator::new(config).unwrap();
    let run = coordinator.run_board("g", 2).await.unwrap();

    assert_eq!(run.processed_threads, 6);
    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 6);
    assert_eq!(peak_in_flight(&arrivals, delay), 2);
}

#[tokio::test]
async fn test_run_skips_inactive_boards() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(&mock_server, "/g/catalog.json", catalog(&[])).await;
    Mock::given(method("GET"))
        .and(path("/b/catalog.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalog(&[])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut inactive = board("b", 0);
    inactive.active = false;
    let config = create_test_config(&mock_server, &dir, vec![board("g", 0), inactive]);
    let coordinator = Coordinator::new(config).unwrap();

    let runs = coordinator.run().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].board, "g");
    assert_eq!(runs[0].processed_threads, 0);
}

#[tokio::test]
async fn test_run_crawl_updates_one_board() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(&mock_server, "/g/catalog.json", catalog(&[(7, 1, 100)])).await;
    mount_json(
        &mock_server,
        "/g/thread/7.json",
        thread(vec![post(7), post(8)]),
    )
    .await;

    let config = create_test_config(&mock_server, &dir, vec![board("g", 0)]);
    let run = run_crawl(config, "g", 1).await.unwrap();

    assert_eq!(run.board, "g");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.added_posts, 2);
}
