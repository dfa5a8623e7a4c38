//! Upload session end-to-end tests.
//!
//! Drives the client stack against a real broker on a loopback port.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use common::{
    client_config, create_controller, drain, spawn_broker, spawn_router, wait_for_status,
    DEFAULT_TIMEOUT,
};
use filedeck::client::{ApiClient, HttpBroker, SignedLocation, SignedUrlBroker};
use filedeck::transfer::ProgressFn;
use filedeck::{
    session, BrokerError, CancelToken, FileDeckError, FileSource, HttpTransferExecutor,
    Notification, RegistryError, SessionError, TransferError, TransferExecutor, UploadOutcome,
    UploadStatus,
};

const MIB: usize = 1024 * 1024;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn recorder() -> (ProgressFn, Arc<Mutex<Vec<f64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let on_progress: ProgressFn = Arc::new(move |p: f64| sink.lock().unwrap().push(p));
    (on_progress, seen)
}

fn http_broker(base_url: &str) -> HttpBroker {
    let api = ApiClient::new(&client_config(base_url), session::from_token("")).unwrap();
    HttpBroker::new(api)
}

fn executor(base_url: &str) -> HttpTransferExecutor {
    HttpTransferExecutor::new(&client_config(base_url)).unwrap()
}

/// A location with the same URL, for replaying a used one.
fn replay(location: &SignedLocation) -> SignedLocation {
    SignedLocation::new(location.url().to_string())
}

/// Serve a router whose GET and PUT on `/stall` never answer.
async fn spawn_stalled_endpoint() -> String {
    let router = Router::new()
        .route(
            "/stall",
            put(|_body: axum::body::Bytes| std::future::pending::<StatusCode>())
                .get(|| std::future::pending::<StatusCode>()),
        )
        .layer(DefaultBodyLimit::disable());
    format!("{}/stall", spawn_router(router).await)
}

#[tokio::test]
async fn test_upload_ten_megabytes() {
    let broker = spawn_broker().await;
    let (controller, mut notifications) = create_controller(&broker.base_url);

    controller
        .select_file(FileSource::from_bytes("dataset.bin", payload(10 * MIB)))
        .unwrap();
    let outcome = tokio::time::timeout(DEFAULT_TIMEOUT, controller.start_transfer().unwrap())
        .await
        .expect("upload timed out");

    assert!(outcome.is_uploaded(), "unexpected outcome: {:?}", outcome);
    assert_eq!(controller.status(), UploadStatus::NoFileSelected);
    assert_eq!(controller.progress(), 0.0);
    assert_eq!(
        drain(&mut notifications),
        vec![Notification::Uploaded {
            name: "dataset.bin".to_string()
        }]
    );

    let files = controller.files();
    assert_eq!(files.len(), 1);
    assert!(files[0].key.ends_with("/dataset.bin"));
    assert_eq!(files[0].size, Some((10 * MIB) as u64));

    let (stored, meta) = broker.store.get(&files[0].key).await.unwrap();
    assert_eq!(stored.len(), 10 * MIB);
    assert_eq!(meta.content_type, "application/octet-stream");
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_100() {
    let broker = spawn_broker().await;
    let http_broker = http_broker(&broker.base_url);
    let executor = executor(&broker.base_url);

    let source = FileSource::from_bytes("photo.jpg", payload(MIB + 123));
    let location = http_broker
        .request_write_location(source.name(), source.mime_type())
        .await
        .unwrap();

    let (on_progress, seen) = recorder();
    executor
        .execute(&source, location, on_progress, &CancelToken::new())
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.len() > 1);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert!(seen.iter().all(|p| (0.0..=100.0).contains(p)));
    assert_eq!(*seen.last().unwrap(), 100.0);
}

#[tokio::test]
async fn test_cancel_immediately_after_start() {
    let broker = spawn_broker().await;
    let (controller, mut notifications) = create_controller(&broker.base_url);

    controller
        .select_file(FileSource::from_bytes("draft.docx", payload(MIB)))
        .unwrap();
    let transfer = controller.start_transfer().unwrap();
    assert!(controller.cancel_transfer());
    let outcome = transfer.await;

    assert!(outcome.is_cancelled());
    assert_eq!(controller.status(), UploadStatus::NoFileSelected);
    assert_eq!(
        drain(&mut notifications),
        vec![Notification::UploadCancelled {
            name: "draft.docx".to_string()
        }]
    );
    assert!(broker.store.list().await.unwrap().is_empty());
    assert!(controller.files().is_empty());
}

#[tokio::test]
async fn test_broker_failure() {
    let base_url = spawn_router(
        Router::new()
            .route(
                "/api/upload",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route("/api/files", get(|| async { Json(json!([])) })),
    )
    .await;
    let (controller, mut notifications) = create_controller(&base_url);
    let mut statuses = controller.subscribe();

    controller
        .select_file(FileSource::from_bytes("report.pdf", payload(1024)))
        .unwrap();
    let outcome = controller.start_transfer().unwrap().await;

    match outcome {
        UploadOutcome::Failed {
            error: FileDeckError::Broker(BrokerError::Unavailable(reason)),
            ..
        } => assert!(reason.contains("503"), "{reason}"),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!matches!(
        *statuses.borrow_and_update(),
        UploadStatus::Transferring { .. }
    ));
    assert_eq!(controller.status(), UploadStatus::NoFileSelected);

    let notifications = drain(&mut notifications);
    assert_eq!(notifications.len(), 1);
    assert!(matches!(
        &notifications[0],
        Notification::UploadFailed { name, .. } if name == "report.pdf"
    ));
}

#[tokio::test]
async fn test_registry_consistency() {
    let broker = spawn_broker().await;
    let (controller, mut notifications) = create_controller(&broker.base_url);

    controller
        .select_file(FileSource::from_bytes("report.pdf", b"%PDF-1.4".to_vec()))
        .unwrap();
    assert!(controller.start_transfer().unwrap().await.is_uploaded());

    let key = controller
        .files()
        .into_iter()
        .map(|f| f.key)
        .find(|k| k.ends_with("report.pdf"))
        .expect("uploaded object must be listed");
    assert_eq!(controller.refresh().await.len(), 1);

    controller.delete_file(&key).await.unwrap();
    assert!(controller.files().iter().all(|f| f.key != key));
    assert!(!broker.store.exists(&key).await);

    let notifications = drain(&mut notifications);
    assert_eq!(
        notifications.last(),
        Some(&Notification::Deleted { key: key.clone() })
    );
}

#[tokio::test]
async fn test_delete_unknown_key() {
    let broker = spawn_broker().await;
    let (controller, mut notifications) = create_controller(&broker.base_url);

    controller
        .select_file(FileSource::from_bytes("keep.txt", "keep"))
        .unwrap();
    controller.start_transfer().unwrap().await;
    drain(&mut notifications);
    let before = controller.files();

    let key = "0b5e7a3c-1d2f-4e6a-8b9c-0d1e2f3a4b5c/nope.txt";
    let result = controller.delete_file(key).await;

    assert!(matches!(result, Err(RegistryError::DeleteFailed { .. })));
    assert_eq!(controller.files(), before);
    assert_eq!(controller.refresh().await, before);
    assert!(matches!(
        drain(&mut notifications).as_slice(),
        [Notification::DeleteFailed { .. }]
    ));
}

#[tokio::test]
async fn test_delete_many_is_independent() {
    let broker = spawn_broker().await;
    let (controller, _notifications) = create_controller(&broker.base_url);

    for name in ["a.txt", "b.txt"] {
        controller
            .select_file(FileSource::from_bytes(name, name))
            .unwrap();
        controller.start_transfer().unwrap().await;
    }
    let mut keys: Vec<String> = controller.files().into_iter().map(|f| f.key).collect();
    keys.insert(1, "0b5e7a3c-1d2f-4e6a-8b9c-0d1e2f3a4b5c/missing.txt".to_string());

    let results = controller.delete_files(&keys).await;

    let order: Vec<&str> = results.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(order, keys.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(results[0].1.is_ok());
    assert!(results[1].1.is_err());
    assert!(results[2].1.is_ok());
    assert!(controller.files().is_empty());
}

#[tokio::test]
async fn test_download_roundtrip() {
    let broker = spawn_broker().await;
    let (controller, _notifications) = create_controller(&broker.base_url);
    let content = payload(300 * 1024);

    controller
        .select_file(FileSource::from_bytes("archive.zip", content.clone()))
        .unwrap();
    controller.start_transfer().unwrap().await;
    let key = controller.files()[0].key.clone();

    let location = controller.download_location(&key).await.unwrap();
    let executor = HttpTransferExecutor::new(&client_config(&broker.base_url)).unwrap();
    let fetched = executor
        .fetch(location, filedeck::transfer::ignore_progress(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(fetched.as_ref(), content.as_slice());
}

#[tokio::test]
async fn test_cancel_mid_transfer() {
    // The write location accepts the body but never answers.
    let stall_url = spawn_stalled_endpoint().await;
    let base_url = spawn_router(
        Router::new()
            .route(
                "/api/upload",
                post(move || {
                    let stall_url = stall_url.clone();
                    async move { Json(json!({ "signedUrl": stall_url })) }
                }),
            )
            .route("/api/files", get(|| async { Json(Value::Array(vec![])) })),
    )
    .await;

    let (controller, mut notifications) = create_controller(&base_url);
    controller
        .select_file(FileSource::from_bytes("video.mp4", payload(2 * MIB)))
        .unwrap();

    let running = controller.spawn_transfer().unwrap();
    wait_for_status(&controller, |s| s.progress() > 0.0).await;

    // Single flight while the transfer hangs.
    assert_eq!(
        controller.start_transfer().err(),
        Some(SessionError::TransferInProgress)
    );
    assert_eq!(
        controller
            .select_file(FileSource::from_bytes("other.txt", "x"))
            .unwrap_err(),
        SessionError::TransferInProgress
    );

    assert!(controller.cancel_transfer());
    let outcome = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("cancellation did not stop the transfer")
        .unwrap();

    assert!(outcome.is_cancelled());
    assert_eq!(controller.status(), UploadStatus::NoFileSelected);
    assert_eq!(
        drain(&mut notifications),
        vec![Notification::UploadCancelled {
            name: "video.mp4".to_string()
        }]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_right_after_spawn() {
    let broker = spawn_broker().await;
    let (controller, mut notifications) = create_controller(&broker.base_url);

    controller
        .select_file(FileSource::from_bytes("report.pdf", payload(4096)))
        .unwrap();
    let running = controller.spawn_transfer().unwrap();
    assert!(controller.cancel_transfer());

    let outcome = tokio::time::timeout(DEFAULT_TIMEOUT, running)
        .await
        .expect("transfer did not settle")
        .unwrap();

    assert!(outcome.is_cancelled(), "unexpected outcome: {:?}", outcome);
    assert!(broker.store.list().await.unwrap().is_empty());
    assert_eq!(
        drain(&mut notifications),
        vec![Notification::UploadCancelled {
            name: "report.pdf".to_string()
        }]
    );
}

#[tokio::test]
async fn test_reused_write_location_is_rejected() {
    let broker = spawn_broker().await;
    let http_broker = http_broker(&broker.base_url);
    let executor = executor(&broker.base_url);

    let source = FileSource::from_bytes("minutes.txt", "first draft");
    let location = http_broker
        .request_write_location(source.name(), source.mime_type())
        .await
        .unwrap();
    let again = replay(&location);

    executor
        .execute(&source, location, filedeck::transfer::ignore_progress(), &CancelToken::new())
        .await
        .unwrap();
    let result = executor
        .execute(&source, again, filedeck::transfer::ignore_progress(), &CancelToken::new())
        .await;

    assert_eq!(result, Err(TransferError::RemoteRejected(403)));
    assert_eq!(broker.store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_transfer_fails_the_upload() {
    let store_url = spawn_router(
        Router::new()
            .route(
                "/reject",
                put(|_body: axum::body::Bytes| async { StatusCode::FORBIDDEN }),
            )
            .layer(DefaultBodyLimit::disable()),
    )
    .await;
    let reject_url = format!("{store_url}/reject");
    let base_url = spawn_router(
        Router::new()
            .route(
                "/api/upload",
                post(move || {
                    let reject_url = reject_url.clone();
                    async move { Json(json!({ "signedUrl": reject_url })) }
                }),
            )
            .route("/api/files", get(|| async { Json(json!([])) })),
    )
    .await;
    let (controller, mut notifications) = create_controller(&base_url);

    controller
        .select_file(FileSource::from_bytes("report.pdf", payload(2048)))
        .unwrap();
    let outcome = controller.start_transfer().unwrap().await;

    assert!(matches!(
        outcome,
        UploadOutcome::Failed {
            error: FileDeckError::Transfer(TransferError::RemoteRejected(403)),
            ..
        }
    ));
    assert_eq!(controller.status(), UploadStatus::NoFileSelected);
    assert_eq!(
        drain(&mut notifications),
        vec![Notification::UploadFailed {
            name: "report.pdf".to_string(),
            reason: "remote rejected transfer with status 403".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_upload_empty_file() {
    let broker = spawn_broker().await;
    let http_broker = http_broker(&broker.base_url);
    let executor = executor(&broker.base_url);

    let source = FileSource::from_bytes("empty.txt", Vec::<u8>::new());
    let location = http_broker
        .request_write_location(source.name(), source.mime_type())
        .await
        .unwrap();
    let (on_progress, seen) = recorder();
    executor
        .execute(&source, location, on_progress, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![100.0]);

    let (controller, _notifications) = create_controller(&broker.base_url);
    controller
        .select_file(FileSource::from_bytes("blank.txt", Vec::<u8>::new()))
        .unwrap();
    let outcome = controller.start_transfer().unwrap().await;

    assert!(
        matches!(&outcome, UploadOutcome::Uploaded { name, size: 0 } if name == "blank.txt"),
        "unexpected outcome: {:?}",
        outcome
    );
    let files = controller.files();
    assert_eq!(files.len(), 2);
    let blank = files
        .iter()
        .find(|f| f.key.ends_with("/blank.txt"))
        .expect("empty upload must be listed");
    assert_eq!(blank.size, Some(0));
}

#[tokio::test]
async fn test_download_progress() {
    let broker = spawn_broker().await;
    let (controller, _notifications) = create_controller(&broker.base_url);

    controller
        .select_file(FileSource::from_bytes("archive.zip", payload(MIB)))
        .unwrap();
    controller.start_transfer().unwrap().await;
    let key = controller.files()[0].key.clone();

    let location = controller.download_location(&key).await.unwrap();
    let (on_progress, seen) = recorder();
    let fetched = executor(&broker.base_url)
        .fetch(location, on_progress, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(fetched.len(), MIB);
    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
    assert_eq!(*seen.last().unwrap(), 100.0);
}

#[tokio::test]
async fn test_reused_read_location_is_rejected() {
    let broker = spawn_broker().await;
    let (controller, _notifications) = create_controller(&broker.base_url);

    controller
        .select_file(FileSource::from_bytes("notes.txt", "agenda"))
        .unwrap();
    controller.start_transfer().unwrap().await;
    let key = controller.files()[0].key.clone();

    let location = controller.download_location(&key).await.unwrap();
    let again = replay(&location);
    let executor = executor(&broker.base_url);

    let first = executor
        .fetch(location, filedeck::transfer::ignore_progress(), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(first.as_ref(), b"agenda");

    let (on_progress, seen) = recorder();
    let second = executor.fetch(again, on_progress, &CancelToken::new()).await;
    assert_eq!(second, Err(TransferError::RemoteRejected(403)));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_download() {
    let stall_url = spawn_stalled_endpoint().await;
    let executor = executor(&stall_url);

    let cancelled = CancelToken::new();
    cancelled.cancel();
    let result = executor
        .fetch(
            SignedLocation::new(stall_url.clone()),
            filedeck::transfer::ignore_progress(),
            &cancelled,
        )
        .await;
    assert_eq!(result, Err(TransferError::Cancelled));

    let cancel = CancelToken::new();
    let canceller = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    });
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        executor.fetch(
            SignedLocation::new(stall_url),
            filedeck::transfer::ignore_progress(),
            &cancel,
        ),
    )
    .await
    .expect("cancellation did not stop the download");

    assert_eq!(result, Err(TransferError::Cancelled));
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_broker_success_without_signed_url() {
    let base_url = spawn_router(
        Router::new()
            .route("/api/upload", post(|| async { Json(json!({})) }))
            .route("/api/files", post(|| async { Json(json!({ "signedUrl": "" })) })),
    )
    .await;
    let http_broker = http_broker(&base_url);

    let write = http_broker
        .request_write_location("report.pdf", "application/pdf")
        .await;
    assert!(matches!(write, Err(BrokerError::Unavailable(_))), "{:?}", write);

    let read = http_broker.request_read_location("a/report.pdf").await;
    assert!(matches!(read, Err(BrokerError::Unavailable(_))), "{:?}", read);
}
