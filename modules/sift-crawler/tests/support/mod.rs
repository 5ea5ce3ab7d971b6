//! In-process ingestion backend: `/add`, `/upload_image` and a small media host.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;

pub const SECRET: &str = "test-secret";

#[derive(Debug, Clone)]
pub struct Upload {
    pub secret: Option<String>,
    pub field: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct SinkState {
    /// Bodies of accepted `/add` requests.
    pub submissions: Mutex<Vec<Value>>,
    pub uploads: Mutex<Vec<Upload>>,
    pub upload_attempts: AtomicUsize,
    /// Uploads answered with 500 before any succeeds.
    pub upload_failures_left: AtomicUsize,
}

impl SinkState {
    pub fn failing_uploads(n: usize) -> Arc<Self> {
        let state = Arc::new(Self::default());
        state.upload_failures_left.store(n, Ordering::SeqCst);
        state
    }

    /// Decoded `data` payloads of accepted submissions.
    pub fn records(&self) -> Vec<Value> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|body| serde_json::from_str(body["data"].as_str().unwrap()).unwrap())
            .collect()
    }
}

async fn add(State(state): State<Arc<SinkState>>, Json(body): Json<Value>) -> Response {
    if body["secret"] != SECRET {
        return (StatusCode::FORBIDDEN, "bad secret").into_response();
    }
    state.submissions.lock().unwrap().push(body);
    (StatusCode::OK, "ok").into_response()
}

async fn upload_image(
    State(state): State<Arc<SinkState>>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Response {
    state.upload_attempts.fetch_add(1, Ordering::SeqCst);
    if state
        .upload_failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable").into_response();
    }

    while let Some(field) = multipart.next_field().await.unwrap() {
        let upload = Upload {
            secret: query.get("secret").cloned(),
            field: field.name().unwrap_or_default().to_string(),
            filename: field.file_name().unwrap_or_default().to_string(),
            bytes: field.bytes().await.unwrap().to_vec(),
        };
        state.uploads.lock().unwrap().push(upload);
    }
    (StatusCode::OK, "stored").into_response()
}

async fn media(Path(file): Path<String>) -> Response {
    match file.as_str() {
        "moved" => Redirect::temporary("/media/final.webp").into_response(),
        "gone.png" => StatusCode::NOT_FOUND.into_response(),
        _ => ([(header::CONTENT_TYPE, "image/png")], format!("bytes of {file}")).into_response(),
    }
}

pub fn sink_router(state: Arc<SinkState>) -> Router {
    Router::new()
        .route("/add", post(add))
        .route("/upload_image", post(upload_image))
        .route("/media/{file}", get(media))
        .with_state(state)
}

pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub async fn spawn_sink(state: Arc<SinkState>) -> String {
    serve(sink_router(state)).await
}
