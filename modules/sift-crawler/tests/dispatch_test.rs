mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value as JsonValue};
use sift_crawler::{
    BackendKind, DispatchConfig, DispatchSummary, Dispatcher, Schema, SinkSettings,
};
use sift_extract::{LiveOptions, SchemaFieldMap, SemanticType};
use support::{serve, spawn_sink, SinkState, SECRET};

/// IDs 0..6: id 3 does not exist, id 5 has no title.
async fn project(Path(id): Path<u64>) -> Response {
    match id {
        3 => (StatusCode::NOT_FOUND, "no such project").into_response(),
        5 => Html("<html><body><img class=\"cover\" src=\"/media/5.png\"></body></html>")
            .into_response(),
        _ => Html(format!(
            "<html><body><h1>Project {id}</h1><img class=\"cover\" src=\"/media/{id}.png\"></body></html>"
        ))
        .into_response(),
    }
}

async fn spawn_site(media_base: &str) -> String {
    // Covers point at the sink's media host so rehosting has something to fetch.
    let media_base = media_base.to_string();
    let app = Router::new()
        .route("/projects/{id}", get(project))
        .route(
            "/media/{file}",
            get(move |Path(file): Path<String>| {
                let target = format!("{media_base}/media/{file}");
                async move { axum::response::Redirect::temporary(&target) }
            }),
        );
    serve(app).await
}

fn mini_schema() -> Schema {
    let fields = SchemaFieldMap::new("Mini")
        .field("url", SemanticType::url(), ".")
        .field("cover", SemanticType::link(), "img.cover")
        .field("title", SemanticType::text(), "h1");
    Schema {
        name: "Mini".to_string(),
        fields,
        media_field: Some("cover".to_string()),
    }
}

fn sink(base: &str) -> SinkSettings {
    SinkSettings {
        backend_url: base.to_string(),
        secret: SECRET.to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn config(site: &str) -> DispatchConfig {
    let mut config = DispatchConfig::new(site, 6, 2);
    config.navigate_timeout = Duration::from_secs(5);
    config.extract_timeout = Duration::from_secs(5);
    config
}

async fn dispatch(config: DispatchConfig, schema: Schema, sink: SinkSettings) -> DispatchSummary {
    let dispatcher = Dispatcher::new(config, schema, sink).unwrap();
    tokio::task::spawn_blocking(move || dispatcher.run())
        .await
        .unwrap()
}

fn record_titled<'a>(records: &'a [JsonValue], title: &str) -> &'a JsonValue {
    records
        .iter()
        .find(|r| r["Mini"]["title"] == title)
        .unwrap_or_else(|| panic!("no record titled {title}"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn crawl_extracts_rehosts_and_submits() {
    let state = Arc::new(SinkState::default());
    let sink_base = spawn_sink(state.clone()).await;
    let site = spawn_site(&sink_base).await;

    let summary = dispatch(config(&site), mini_schema(), sink(&sink_base)).await;

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].range, 0..3);
    assert_eq!(summary.reports[1].range, 3..6);
    assert_eq!(summary.succeeded(), 4);
    assert_eq!(summary.failed(), 2);
    assert_eq!(summary.fatal_workers(), 0);

    let records = state.records();
    assert_eq!(records.len(), 4);
    assert_eq!(
        record_titled(&records, "Project 1"),
        &json!({
            "Mini": {
                "url": format!("{site}/projects/1"),
                "cover": format!("{sink_base}/images/1.png"),
                "title": "Project 1"
            }
        })
    );

    let mut filenames: Vec<String> = state
        .uploads
        .lock()
        .unwrap()
        .iter()
        .map(|u| u.filename.clone())
        .collect();
    filenames.sort();
    assert_eq!(filenames, vec!["0.png", "1.png", "2.png", "4.png"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_rehost_keeps_original_reference() {
    let state = SinkState::failing_uploads(usize::MAX);
    let sink_base = spawn_sink(state.clone()).await;
    let site = spawn_site(&sink_base).await;

    let summary = dispatch(config(&site), mini_schema(), sink(&sink_base)).await;

    assert_eq!(summary.succeeded(), 4);
    let records = state.records();
    assert_eq!(
        record_titled(&records, "Project 2")["Mini"]["cover"],
        format!("{site}/media/2.png")
    );
    // Two attempts per rehosted item.
    assert_eq!(state.upload_attempts.load(Ordering::SeqCst), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rehost_can_be_disabled() {
    let state = Arc::new(SinkState::default());
    let sink_base = spawn_sink(state.clone()).await;
    let site = spawn_site(&sink_base).await;

    let mut config = config(&site);
    config.rehost = false;
    let summary = dispatch(config, mini_schema(), sink(&sink_base)).await;

    assert_eq!(summary.succeeded(), 4);
    assert_eq!(state.upload_attempts.load(Ordering::SeqCst), 0);
    assert_eq!(
        record_titled(&state.records(), "Project 0")["Mini"]["cover"],
        format!("{site}/media/0.png")
    );
}

#[tokio::test]
async fn invalid_schema_is_rejected_before_any_worker_starts() {
    let state = Arc::new(SinkState::default());
    let sink_base = spawn_sink(state.clone()).await;
    let site = spawn_site(&sink_base).await;

    let broken = Schema {
        name: "Broken".to_string(),
        fields: SchemaFieldMap::new("Broken").field("title", SemanticType::text(), "h1[["),
        media_field: None,
    };
    let err = Dispatcher::new(config(&site), broken, sink(&sink_base))
        .err()
        .unwrap();

    assert!(format!("{err:#}").contains("Broken"));
    assert!(state.submissions.lock().unwrap().is_empty());
}

/// Page 1 answers only after `delay`, every other page immediately.
async fn spawn_slow_site(delay: Duration) -> String {
    let app = Router::new().route(
        "/slow/{id}",
        get(move |Path(id): Path<u64>| async move {
            if id == 1 {
                tokio::time::sleep(delay).await;
            }
            Html(format!("<html><body><h1>P{id}</h1></body></html>"))
        }),
    );
    serve(app).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stuck_navigation_fails_only_that_id() {
    let state = Arc::new(SinkState::default());
    let sink_base = spawn_sink(state.clone()).await;
    let site = spawn_slow_site(Duration::from_secs(3)).await;

    let schema = Schema {
        name: "Mini".to_string(),
        fields: SchemaFieldMap::new("Mini").field("title", SemanticType::text(), "h1"),
        media_field: None,
    };
    let mut config = DispatchConfig::new(&site, 4, 1);
    config.url_template = format!("{site}/slow/{{id}}");
    config.navigate_timeout = Duration::from_secs(1);
    config.extract_timeout = Duration::from_secs(5);
    config.rehost = false;

    let summary = dispatch(config, schema, sink(&sink_base)).await;

    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 1);
    assert!(summary.reports[0].fatal.is_none());

    let titles: Vec<JsonValue> = state
        .records()
        .into_iter()
        .map(|r| r["Mini"]["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("P0"), json!("P2"), json!("P3")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backend_setup_failure_is_reported_per_worker() {
    let state = Arc::new(SinkState::default());
    let sink_base = spawn_sink(state.clone()).await;

    let mut config = config("http://127.0.0.1:1");
    config.backend = BackendKind::Live(LiveOptions {
        webdriver_url: "http://127.0.0.1:1".to_string(),
        command_timeout: Duration::from_secs(2),
        ..LiveOptions::default()
    });
    let summary = dispatch(config, mini_schema(), sink(&sink_base)).await;

    assert_eq!(summary.reports.len(), 2);
    for report in &summary.reports {
        assert_eq!(report.succeeded + report.failed, 0);
        assert!(report.fatal.as_deref().unwrap().contains("live backend"));
    }
}
