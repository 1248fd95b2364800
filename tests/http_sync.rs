use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use jute_sync::error::RetrySettings;
use jute_sync::{samples, Config, FailureCategory, Outcome, SyncController, SyncRequest, SyncStatus};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use url::Url;

type Seen = Arc<Mutex<Vec<SyncRequest>>>;

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}/", addr)
}

async fn recording_server(reply: &'static str) -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/",
            post(move |State(seen): State<Seen>, Json(request): Json<SyncRequest>| async move {
                seen.lock().unwrap().push(request);
                reply
            }),
        )
        .with_state(seen.clone());
    (spawn_server(app).await, seen)
}

fn config(endpoint: &str) -> Config {
    Config {
        endpoint: Url::parse(endpoint).unwrap(),
        debounce_ms: 50,
        request_timeout_secs: 5,
        ..Config::default()
    }
}

async fn wait_for_applied(rx: &mut broadcast::Receiver<SyncStatus>, seq: u64) {
    timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(SyncStatus::Applied { seq: applied }) = rx.recv().await {
                if applied == seq {
                    break;
                }
            }
        }
    })
    .await
    .expect("sync was not applied in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn initial_sync_applies_server_response() {
    let (endpoint, seen) = recording_server("ok: true").await;
    let controller =
        SyncController::with_http(&config(&endpoint), samples::DEFINITION, samples::DOCUMENT)
            .unwrap();
    let mut status = controller.subscribe_status();

    let listener = controller.start().unwrap();
    wait_for_applied(&mut status, 1).await;

    assert_eq!(controller.result().get_value(), "ok: true");
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[SyncRequest::new(samples::DEFINITION, samples::DOCUMENT)]
    );

    listener.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn edit_burst_posts_latest_contents_once() {
    let (endpoint, seen) = recording_server("ok: true").await;
    let controller = SyncController::with_http(&config(&endpoint), "d0", "s0").unwrap();
    let mut status = controller.subscribe_status();

    let listener = controller.start().unwrap();
    wait_for_applied(&mut status, 1).await;

    controller.definition().set_value("d1").unwrap();
    controller.document().set_value("s1").unwrap();
    controller.definition().set_value("d2").unwrap();
    wait_for_applied(&mut status, 2).await;

    // Nothing else may follow the burst
    sleep(Duration::from_millis(300)).await;
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1], SyncRequest::new("d2", "s1"));

    listener.abort();
}

#[tokio::test]
async fn non_success_status_is_surfaced() {
    let app = Router::new().route(
        "/",
        post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "unknown directive $lett") }),
    );
    let endpoint = spawn_server(app).await;
    let controller = SyncController::with_http(&config(&endpoint), "d", "s").unwrap();

    let outcome = controller.sync().await;

    match outcome {
        Outcome::Failed(failure) => {
            assert_eq!(failure.category, FailureCategory::Status);
            assert!(failure.message.contains("422"));
            assert!(failure.message.contains("unknown directive"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(controller.result().get_value(), "");
}

#[tokio::test]
async fn unreachable_server_is_network_failure() {
    let port = {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.local_addr().unwrap().port()
    };
    let controller =
        SyncController::with_http(&config(&format!("http://127.0.0.1:{}/", port)), "d", "s")
            .unwrap();

    let outcome = controller.sync().await;

    assert!(matches!(
        outcome,
        Outcome::Failed(ref failure) if failure.category == FailureCategory::Network
    ));
    assert_eq!(controller.result().get_value(), "");
}

#[tokio::test]
async fn dropped_connection_is_retried() {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/",
            post(|State(seen): State<Seen>, Json(request): Json<SyncRequest>| async move {
                seen.lock().unwrap().push(request);
                "ok: true"
            }),
        )
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Hang up on the first client without answering
        if let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
        let _ = axum::serve(listener, app).await;
    });

    let config = Config {
        retry: RetrySettings {
            max_attempts: 2,
            initial_delay_ms: 10,
            ..RetrySettings::default()
        },
        ..config(&format!("http://{}/", addr))
    };
    let controller = SyncController::with_http(&config, "d", "s").unwrap();

    let outcome = timeout(Duration::from_secs(5), controller.sync())
        .await
        .expect("sync did not finish in time");

    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(controller.result().get_value(), "ok: true");
    assert_eq!(seen.lock().unwrap().as_slice(), &[SyncRequest::new("d", "s")]);
}
