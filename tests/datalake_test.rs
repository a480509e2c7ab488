//! Integration tests for listing and mirrored downloads against a mock store

#[path = "common/mod.rs"]
mod common;

use common::*;
use lakex_cli::datalake::{download_all, list_objects, ContainerClient, ObjectFilter};
use lakex_cli::errors::AppError;
use lakex_cli::models::RemoteObjectRef;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> ContainerClient {
    let url = Url::parse(&format!("{}/container?sig=test-token", server.uri())).unwrap();
    ContainerClient::from_container_url(url, Duration::from_secs(5)).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_returns_prefix_matches_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/container"))
        .and(query_param("comp", "list"))
        .and(query_param("prefix", "a/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_xml(&["a/1.csv", "a/2.png"], None)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let objects = list_objects(&client, "a/", &ObjectFilter::default())
        .await
        .unwrap();

    let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["a/1.csv", "a/2.png"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_follows_continuation_marker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/container"))
        .and(query_param("comp", "list"))
        .and(query_param_is_missing("marker"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_xml(&["a/1.csv"], Some("page-2"))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/container"))
        .and(query_param("comp", "list"))
        .and(query_param("marker", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_xml(&["a/2.csv"], None)))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let objects = list_objects(&client, "a/", &ObjectFilter::default())
        .await
        .unwrap();

    let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["a/1.csv", "a/2.csv"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_auth_failure_is_list_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/container"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = list_objects(&client, "a/", &ObjectFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ListError(_)));
    assert!(err.to_string().contains("403"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_end_to_end_filtered_listing_and_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/container"))
        .and(query_param("comp", "list"))
        .and(query_param("prefix", "a/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(listing_xml(&["a/1.csv", "a/2.png"], None)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/container/a/1.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"id,score\n1,5\n".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let objects = list_objects(&client, "a/", &ObjectFilter::with_extension("csv"))
        .await
        .unwrap();
    let names: Vec<_> = objects.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["a/1.csv"]);

    let temp_dir = TempDir::new().unwrap();
    let report = download_all(&client, &objects, temp_dir.path(), 4)
        .await
        .unwrap();

    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(
        fs::read(temp_dir.path().join("a/1.csv")).unwrap(),
        b"id,score\n1,5\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_object_does_not_block_siblings() {
    let server = MockServer::start().await;
    for (name, body) in [("good/1.bin", "first"), ("good/3.bin", "third")] {
        Mock::given(method("GET"))
            .and(path(format!("/container/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.as_bytes().to_vec()))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/container/good/2.bin"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let objects = vec![
        RemoteObjectRef::new("good/1.bin"),
        RemoteObjectRef::new("good/2.bin"),
        RemoteObjectRef::new("good/3.bin"),
    ];

    let temp_dir = TempDir::new().unwrap();
    let report = download_all(&client, &objects, temp_dir.path(), 2)
        .await
        .unwrap();

    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.failed[0].name, "good/2.bin");
    assert!(report.failed[0].reason.contains("500"));

    assert_eq!(fs::read(temp_dir.path().join("good/1.bin")).unwrap(), b"first");
    assert_eq!(fs::read(temp_dir.path().join("good/3.bin")).unwrap(), b"third");
    assert!(!temp_dir.path().join("good/2.bin").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_listing_yields_empty_report() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/container"))
        .and(query_param("comp", "list"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_xml(&[], None)))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let objects = list_objects(&client, "empty/", &ObjectFilter::default())
        .await
        .unwrap();
    assert!(objects.is_empty());

    let temp_dir = TempDir::new().unwrap();
    let report = download_all(&client, &objects, temp_dir.path(), 4)
        .await
        .unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(report.succeeded, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_mirrors_nested_paths_and_overwrites() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/container/deep/nested/path/file.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let objects = vec![RemoteObjectRef::new("deep/nested/path/file.txt")];

    let temp_dir = TempDir::new().unwrap();
    let dest = temp_dir.path().join("deep/nested/path/file.txt");
    fs::create_dir_all(dest.parent().unwrap()).unwrap();
    fs::write(&dest, b"stale").unwrap();

    let report = download_all(&client, &objects, temp_dir.path(), 1)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(fs::read(&dest).unwrap(), b"fresh");
}
