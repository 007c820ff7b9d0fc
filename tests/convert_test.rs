//! Integration tests for `POST /convert`.

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{upload_form, TestHarness, ENGINE_FAIL, ENGINE_OK, ENGINE_SLOW};

#[tokio::test]
async fn convert_returns_attachment() {
    let harness = TestHarness::new(ENGINE_OK);
    let addr = harness.serve().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(upload_form("song.wav", b"RIFFDATA", Some("flac")))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"song.flac\""
    );
    assert_eq!(resp.headers()["content-type"], "audio/flac");
    assert!(resp.headers().contains_key("x-request-id"));

    let body = resp.bytes().await.unwrap();
    assert_eq!(&body[..], b"converted:RIFFDATA");

    assert!(
        harness.wait_for_empty_uploads(Duration::from_secs(5)).await,
        "leftover files: {:?}",
        harness.upload_files()
    );
}

#[tokio::test]
async fn format_defaults_to_mp3() {
    let harness = TestHarness::new(ENGINE_OK);
    let addr = harness.serve().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(upload_form("voice memo.m4a", b"AAAA", None))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"voice memo.mp3\""
    );
    assert_eq!(resp.headers()["content-type"], "audio/mpeg");
}

#[tokio::test]
async fn same_extension_does_not_clobber_input() {
    let harness = TestHarness::new(ENGINE_OK);
    let addr = harness.serve().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(upload_form("loop.mp3", b"ID3", Some("mp3")))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(&resp.bytes().await.unwrap()[..], b"converted:ID3");
}

#[tokio::test]
async fn missing_file_part_is_400() {
    let harness = TestHarness::new(ENGINE_OK);
    let addr = harness.serve().await;

    let form = reqwest::multipart::Form::new().text("format", "wav");
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "No file part");
    assert_eq!(json["code"], "input_missing");
}

#[tokio::test]
async fn malformed_format_is_400() {
    let harness = TestHarness::new(ENGINE_OK);
    let addr = harness.serve().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(upload_form("song.wav", b"RIFF", Some("mp3; rm -rf")))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert!(harness.wait_for_empty_uploads(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn engine_failure_is_500_and_cleans_up() {
    let harness = TestHarness::new(ENGINE_FAIL);
    let addr = harness.serve().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(upload_form("broken.wav", b"not audio", Some("ogg")))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Engine error [ffmpeg]: exited with code 1");
    assert!(json["request_id"].is_string());

    assert!(
        harness.wait_for_empty_uploads(Duration::from_secs(5)).await,
        "leftover files: {:?}",
        harness.upload_files()
    );
}

#[tokio::test]
async fn oversized_upload_is_413() {
    let harness = TestHarness::with_config(ENGINE_OK, |config| {
        config.server.max_upload_bytes = 1024;
    });
    let addr = harness.serve().await;

    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/convert"))
        .multipart(upload_form("big.wav", &vec![0u8; 4096], Some("mp3")))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 413);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "payload_too_large");
    assert!(harness.wait_for_empty_uploads(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn concurrent_uploads_are_isolated() {
    let harness = TestHarness::new(ENGINE_SLOW);
    let addr = harness.serve().await;
    let client = reqwest::Client::new();

    let send = |name: &'static str, data: &'static [u8]| {
        let client = client.clone();
        async move {
            let resp = client
                .post(format!("http://{addr}/convert"))
                .multipart(upload_form(name, data, Some("wav")))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
            resp.bytes().await.unwrap()
        }
    };

    let (a, b) = tokio::join!(send("same.mp3", b"first"), send("same.mp3", b"second"));
    assert_eq!(&a[..], b"converted:first");
    assert_eq!(&b[..], b"converted:second");

    assert!(harness.wait_for_empty_uploads(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn conversion_cap_serializes_engines() {
    let harness = TestHarness::with_config(ENGINE_SLOW, |config| {
        config.server.max_concurrent_conversions = Some(1);
    });
    let addr = harness.serve().await;
    let client = reqwest::Client::new();

    let started = tokio::time::Instant::now();
    let send = |data: &'static [u8]| {
        let client = client.clone();
        async move {
            client
                .post(format!("http://{addr}/convert"))
                .multipart(upload_form("a.wav", data, Some("mp3")))
                .send()
                .await
                .unwrap()
                .status()
        }
    };

    let (a, b) = tokio::join!(send(b"one"), send(b"two"));
    assert_eq!(a, 200);
    assert_eq!(b, 200);
    // Each engine run sleeps one second; with one slot they cannot overlap.
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test]
async fn health_and_tools() {
    let harness = TestHarness::new(ENGINE_OK);
    let addr = harness.serve().await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let tools: serde_json::Value = client
        .get(format!("http://{addr}/api/tools"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tools = tools.as_array().unwrap();
    assert!(tools.iter().any(|t| t["name"] == "ffmpeg" && t["available"] == true));
    assert!(tools.iter().any(|t| t["name"] == "ffprobe" && t["available"] == true));
}
