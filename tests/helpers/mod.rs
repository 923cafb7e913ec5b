//! Test helper utilities: a stub OCR engine and the gateway on ephemeral ports.
#![allow(dead_code)]

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use idcard_ocr::app_state::AppState;
use idcard_ocr::config::AppConfig;
use idcard_ocr::routes;
use reqwest::multipart;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

async fn serve(app: Router) -> (String, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: String,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

/// Stand-in for the remote OCR engine.
pub struct StubEngine {
    pub url: String,
    calls: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl StubEngine {
    pub async fn replying(status: StatusCode, body: &str) -> Self {
        Self::spawn(status, body, Duration::ZERO).await
    }

    pub async fn slow(body: &str, delay: Duration) -> Self {
        Self::spawn(StatusCode::OK, body, delay).await
    }

    async fn spawn(status: StatusCode, body: &str, delay: Duration) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = StubState {
            status,
            body: body.to_string(),
            delay,
            calls: Arc::clone(&calls),
        };
        let app = Router::new()
            .route("/ocr/thai-id/", post(recognize))
            .with_state(state);
        let (base, handle) = serve(app).await;

        Self {
            url: format!("{}/ocr/thai-id/", base),
            calls,
            handle,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for StubEngine {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn recognize(State(stub): State<StubState>, mut multipart: Multipart) -> (StatusCode, String) {
    stub.calls.fetch_add(1, Ordering::SeqCst);

    let mut file_fields = 0;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            file_fields += 1;
        }
    }
    if file_fields != 1 {
        return (StatusCode::UNPROCESSABLE_ENTITY, "expected one file field".into());
    }

    if !stub.delay.is_zero() {
        tokio::time::sleep(stub.delay).await;
    }
    (stub.status, stub.body.clone())
}

/// The gateway bound to an ephemeral port, same router as production.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(engine: &StubEngine) -> Self {
        Self::spawn_with(engine, AppConfig::default()).await
    }

    pub async fn spawn_with(engine: &StubEngine, config: AppConfig) -> Self {
        let config = AppConfig {
            engine_url: engine.url.clone(),
            engine_timeout_secs: 5,
            ..config
        };
        let state = AppState::new(config).expect("failed to build app state");
        let (base_url, handle) = serve(routes::router(state.clone())).await;
        Self {
            base_url,
            state,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// POST an image to `/upload`, returning status and JSON body.
pub async fn upload(
    client: &reqwest::Client,
    base_url: &str,
    bytes: Vec<u8>,
    mime: &str,
    query: &str,
) -> (reqwest::StatusCode, serde_json::Value) {
    let form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(bytes)
            .file_name("card.jpg")
            .mime_str(mime)
            .unwrap(),
    );

    let response = client
        .post(format!("{}/upload{}", base_url, query))
        .multipart(form)
        .send()
        .await
        .expect("upload request failed");
    let status = response.status();
    let body = response.json().await.expect("upload response was not JSON");
    (status, body)
}

pub async fn get_status(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
) -> (reqwest::StatusCode, serde_json::Value) {
    let response = client
        .get(format!("{}/status/{}", base_url, job_id))
        .send()
        .await
        .expect("status request failed");
    let status = response.status();
    let body = response.json().await.expect("status response was not JSON");
    (status, body)
}

/// Poll `/status` until the job leaves pending/processing.
pub async fn wait_until_finished(
    client: &reqwest::Client,
    base_url: &str,
    job_id: &str,
) -> serde_json::Value {
    for _ in 0..200 {
        let (_, body) = get_status(client, base_url, job_id).await;
        match body["status"].as_str() {
            Some("pending") | Some("processing") => {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            _ => return body,
        }
    }
    panic!("job {} did not finish in time", job_id);
}
