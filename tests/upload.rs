mod common;

use serde_json::json;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chatdesk::UploadFile;
use chatdesk::models::{BatchSummary, BatchUploadOptions, UploadOptions};
use common::{envelope, harness, logged_in};

fn text_file(name: &str) -> UploadFile {
    UploadFile::new(name, "text/plain", format!("contents of {name}").into_bytes())
}

#[tokio::test]
async fn test_batch_upload_continues_after_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file/upload"))
        .and(body_string_contains("filename=\"b.txt\""))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/file/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(200, json!({ "id": 1 }))))
        .mount(&server)
        .await;

    let h = harness(&server).await;
    let files = vec![text_file("a.txt"), text_file("b.txt"), text_file("c.txt")];

    let overall = Arc::new(Mutex::new(Vec::new()));
    let per_file = Arc::new(Mutex::new(BTreeSet::new()));
    let options = {
        let overall = overall.clone();
        let per_file = per_file.clone();
        BatchUploadOptions::default()
            .category("docs")
            .on_progress(move |p| overall.lock().unwrap().push(p))
            .on_file_progress(move |i, _| {
                per_file.lock().unwrap().insert(i);
            })
    };

    let batch = h.client.files().upload_multiple(&files, &options).await;

    assert!(!batch.success);
    assert_eq!(
        batch.summary,
        BatchSummary {
            total: 3,
            success: 2,
            failed: 1
        }
    );
    assert!(batch.results[0].is_success());
    assert_eq!(batch.results[1].error(), Some("Internal server error"));
    assert!(batch.results[2].is_success());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    let overall = overall.lock().unwrap();
    assert!(overall.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(overall.last(), Some(&100));
    assert_eq!(
        per_file.lock().unwrap().iter().copied().collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[tokio::test]
async fn test_upload_sends_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/file/upload"))
        .and(body_string_contains("name=\"category\""))
        .and(body_string_contains("name=\"metadata\""))
        .and(body_string_contains("{\"tag\":\"q3\"}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(0, json!({ "id": 5 }))))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server).await;
    let options = UploadOptions::default()
        .category("reports")
        .metadata(json!({ "tag": "q3" }));
    let result = h.client.files().upload(&text_file("r.txt"), &options).await;

    assert_eq!(result.data(), Some(&json!({ "id": 5 })));
    assert_eq!(result.message(), "File uploaded");
}

#[tokio::test]
async fn test_upload_validation_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(200, json!({}))))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server).await;

    let options = UploadOptions::default().allowed_types(vec!["image/png".to_string()]);
    let result = h.client.files().upload(&text_file("x.txt"), &options).await;
    assert_eq!(result.error(), Some("Unsupported file type"));
    assert_eq!(result.message(), "File upload failed");

    let big = UploadFile::new("big.png", "image/png", vec![0u8; 6 * 1024 * 1024]);
    let result = h.client.user().upload_avatar(&big).await;
    assert_eq!(result.error(), Some("File size cannot exceed 5MB"));

    let pdf = UploadFile::new("doc.pdf", "application/pdf", vec![1u8; 10]);
    let result = h.client.chat().upload_image(&pdf, "conv_1").await;
    assert_eq!(
        result.error(),
        Some("Unsupported file type, please upload a JPG, PNG, GIF or WebP image")
    );
}

#[tokio::test]
async fn test_avatar_url_merged_into_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/avatar"))
        .and(body_string_contains("name=\"avatar\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(
            200,
            json!({ "avatarUrl": "https://cdn.example.com/a.png" }),
        )))
        .mount(&server)
        .await;

    let h = logged_in(&server, "tok").await;
    let avatar = UploadFile::new("me.png", "image/png", vec![7u8; 64]);
    let result = h.client.user().upload_avatar(&avatar).await;
    assert!(result.is_success());

    let user = h.client.auth().current_user().await.unwrap();
    assert_eq!(user["avatar"], "https://cdn.example.com/a.png");
    assert_eq!(user["username"], "alice");
}

#[tokio::test]
async fn test_download_writes_default_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file/download/42"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(b"binary-data".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/download/43"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 404,
            "message": "File not found"
        })))
        .mount(&server)
        .await;

    let h = harness(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let result = h.client.files().download("42", dir.path(), None).await;
    let written = result.data().unwrap();
    assert_eq!(written, &dir.path().join("file_42"));
    assert_eq!(std::fs::read(written).unwrap(), b"binary-data");

    let named = h
        .client
        .files()
        .download("42", dir.path(), Some("report.bin"))
        .await;
    assert!(named.data().unwrap().ends_with("report.bin"));

    let missing = h.client.files().download("43", dir.path(), None).await;
    assert_eq!(missing.error(), Some("File not found"));
    assert_eq!(missing.message(), "File download failed");
    assert!(!dir.path().join("file_43").exists());
}

#[tokio::test]
async fn test_delete_multiple_and_check_exists() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/file/delete"))
        .and(body_partial_json(json!({ "fileIds": ["1", "2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(200, json!({ "deleted": 2 }))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file/check-exists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(200, json!({ "exists": true }))))
        .mount(&server)
        .await;

    let h = harness(&server).await;
    let deleted = h
        .client
        .files()
        .delete_multiple(&["1".to_string(), "2".to_string()])
        .await;
    assert_eq!(deleted.data(), Some(&json!({ "deleted": 2 })));

    let exists = h.client.files().check_exists("a.txt", "abc123").await;
    assert_eq!(exists.message(), "File already exists");
}
