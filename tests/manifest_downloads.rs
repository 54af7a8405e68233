//! End-to-end tests: manifest on disk -> HTTP fetches against a mock server -> files on disk.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::time::Duration;

use manifest_dl::{Config, Downloader, Event, RetryConfig, filter, manifest};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(output_root: &Path, skip_existing: bool) -> Config {
    Config {
        output_root: output_root.to_path_buf(),
        skip_existing,
        concurrency: 4,
        retry: RetryConfig {
            base_delay: Duration::from_millis(5),
            ..RetryConfig::default()
        },
        ..Config::default()
    }
}

fn write_manifest(dir: &Path, name: &str, images: serde_json::Value) -> std::path::PathBuf {
    let manifest_path = dir.join(name);
    std::fs::write(&manifest_path, json!({ "images": images }).to_string()).unwrap();
    manifest_path
}

#[tokio::test]
async fn downloads_every_valid_record_in_a_manifest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image-a".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image-b".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let work = TempDir::new().unwrap();
    let out = work.path().join("out");
    let manifest_path = write_manifest(
        work.path(),
        "train.json",
        json!([
            { "filename": "a.jpg", "unsplash_url": format!("{}/a", server.uri()) },
            { "filename": "nested/b.jpg", "unsplash_url": format!("{}/b", server.uri()) },
            { "filename": "c.jpg" },
        ]),
    );

    let list = manifest::load_tasks(&[manifest_path], &out)
        .await
        .unwrap()
        .ensure_loaded()
        .unwrap();
    assert_eq!(list.tasks.len(), 2);
    assert_eq!(list.malformed, 1);

    let downloader = Downloader::new(fast_config(&out, false)).unwrap();
    let summary = downloader.run(list.tasks).await;

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.to_string(), "Summary: Success: 2 | Failed: 0");
    assert_eq!(std::fs::read(out.join("a.jpg")).unwrap(), b"image-a");
    assert_eq!(std::fs::read(out.join("nested/b.jpg")).unwrap(), b"image-b");
}

#[tokio::test]
async fn transient_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"finally".to_vec()))
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let downloader = Downloader::new(fast_config(out.path(), false)).unwrap();
    let mut events = downloader.subscribe();

    let task = manifest_dl::DownloadTask::new(
        format!("{}/flaky", server.uri()),
        out.path().join("flaky.jpg"),
        "inline",
    );
    let summary = downloader.run(vec![task]).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(std::fs::read(out.path().join("flaky.jpg")).unwrap(), b"finally");

    let mut retries = 0;
    while let Ok(event) = events.try_recv() {
        if let Event::Retrying { attempt, .. } = event {
            assert_eq!(attempt, 1);
            retries += 1;
        }
    }
    assert_eq!(retries, 1);
}

#[tokio::test]
async fn missing_image_fails_after_all_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let out = TempDir::new().unwrap();
    let downloader = Downloader::new(fast_config(out.path(), false)).unwrap();
    let mut events = downloader.subscribe();

    let url = format!("{}/gone", server.uri());
    let dest = out.path().join("gone.jpg");
    let summary = downloader
        .run(vec![manifest_dl::DownloadTask::new(url.clone(), dest.clone(), "inline")])
        .await;

    assert_eq!(summary.to_string(), "Summary: Success: 0 | Failed: 1");
    assert!(!dest.exists());

    let failure = std::iter::from_fn(|| events.try_recv().ok())
        .find_map(|event| match event {
            Event::TaskFailed {
                url: failed_url,
                attempts,
                error,
                ..
            } => Some((failed_url, attempts, error)),
            _ => None,
        })
        .expect("a TaskFailed event");
    assert_eq!(failure.0, url);
    assert_eq!(failure.1, 3);
    assert!(failure.2.contains("404"));
}

#[tokio::test]
async fn second_run_with_skip_existing_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/once"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"once".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let work = TempDir::new().unwrap();
    let out = work.path().join("out");
    let manifest_path = write_manifest(
        work.path(),
        "val.json",
        json!([{ "filename": "once.jpg", "unsplash_url": format!("{}/once", server.uri()) }]),
    );

    let config = fast_config(&out, true);
    for expected_skipped in [0, 1] {
        let list = manifest::load_tasks(std::slice::from_ref(&manifest_path), &out)
            .await
            .unwrap();
        let (pending, skipped) = filter::partition(list.tasks, config.skip_existing);
        assert_eq!(skipped, expected_skipped);

        let downloader = Downloader::new(config.clone()).unwrap();
        let summary = downloader.execute(pending, skipped).await;
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total, 1);
    }

    assert_eq!(std::fs::read(out.join("once.jpg")).unwrap(), b"once");
}

#[tokio::test]
async fn missing_manifests_are_reported_but_do_not_stop_loading() {
    let work = TempDir::new().unwrap();
    let present = write_manifest(
        work.path(),
        "test.json",
        json!([{ "filename": "x.jpg", "unsplash_url": "https://img.example.com/x" }]),
    );
    let absent = work.path().join("absent.json");

    let list = manifest::load_tasks(&[absent.clone(), present], work.path())
        .await
        .unwrap()
        .ensure_loaded()
        .unwrap();

    assert_eq!(list.missing, vec![absent]);
    assert_eq!(list.tasks.len(), 1);
}
