//! Fan an ID range out over a fixed pool of worker threads.
//!
//! Each worker owns one document backend and one ingest client, runs on its
//! own single-threaded runtime and walks its chunk strictly in order. Workers
//! share nothing mutable; the only shared values are the schema and config.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{ensure, Context};
use sift_extract::{
    DocumentBackend, ExtractError, Extractor, LiveBackend, LiveOptions, StaticBackend, Value,
};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::ingest::{IngestClient, SinkError};
use crate::schemas::Schema;

/// Placeholder replaced by the numeric ID in [`DispatchConfig::url_template`].
pub const ID_PLACEHOLDER: &str = "{id}";

/// Contiguous ranges of width `ceil(total / chunks)` covering `0..total`.
/// The last range is clamped and empty ranges are dropped.
pub fn chunk_ranges(total: u64, chunks: usize) -> Vec<Range<u64>> {
    if chunks == 0 || total == 0 {
        return Vec::new();
    }
    let size = total.div_ceil(chunks as u64);
    (0..chunks as u64)
        .map(|k| {
            let start = k.saturating_mul(size).min(total);
            let end = start.saturating_add(size).min(total);
            start..end
        })
        .filter(|r| !r.is_empty())
        .collect()
}

/// Which document backend each worker builds.
#[derive(Debug, Clone)]
pub enum BackendKind {
    Static,
    Live(LiveOptions),
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// IDs `0..max_id` are visited.
    pub max_id: u64,
    pub workers: usize,
    /// Document location with `{id}` in place of the ID.
    pub url_template: String,
    pub backend: BackendKind,
    pub navigate_timeout: Duration,
    pub extract_timeout: Duration,
    /// Rehost the schema's media field before submitting.
    pub rehost: bool,
}

impl DispatchConfig {
    /// Project pages under `site`, static backend, rehosting on.
    pub fn new(site: &str, max_id: u64, workers: usize) -> Self {
        Self {
            max_id,
            workers,
            url_template: format!("{}/projects/{ID_PLACEHOLDER}", site.trim_end_matches('/')),
            backend: BackendKind::Static,
            navigate_timeout: Duration::from_secs(20),
            extract_timeout: Duration::from_secs(20),
            rehost: true,
        }
    }

    pub fn location_for(&self, id: u64) -> String {
        self.url_template.replace(ID_PLACEHOLDER, &id.to_string())
    }
}

/// Where and how workers submit records.
#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub backend_url: String,
    pub secret: String,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("sink: {0}")]
    Sink(#[from] SinkError),
}

impl ItemError {
    fn is_fatal(&self) -> bool {
        matches!(self, ItemError::Extract(e) if e.is_fatal())
    }
}

/// Outcome of one worker's chunk.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub range: Range<u64>,
    pub succeeded: u64,
    pub failed: u64,
    /// Set when the worker could not start or stopped early.
    pub fatal: Option<String>,
}

impl WorkerReport {
    fn new(worker: usize, range: Range<u64>) -> Self {
        Self {
            worker,
            range,
            succeeded: 0,
            failed: 0,
            fatal: None,
        }
    }

    fn aborted(worker: usize, range: Range<u64>, reason: impl Into<String>) -> Self {
        Self {
            fatal: Some(reason.into()),
            ..Self::new(worker, range)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub reports: Vec<WorkerReport>,
}

impl DispatchSummary {
    pub fn succeeded(&self) -> u64 {
        self.reports.iter().map(|r| r.succeeded).sum()
    }

    pub fn failed(&self) -> u64 {
        self.reports.iter().map(|r| r.failed).sum()
    }

    pub fn fatal_workers(&self) -> usize {
        self.reports.iter().filter(|r| r.fatal.is_some()).count()
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} workers, {} succeeded, {} failed, {} stopped early",
            self.reports.len(),
            self.succeeded(),
            self.failed(),
            self.fatal_workers()
        )
    }
}

struct WorkerContext {
    config: DispatchConfig,
    schema: Schema,
    sink: SinkSettings,
}

pub struct Dispatcher {
    ctx: Arc<WorkerContext>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig, schema: Schema, sink: SinkSettings) -> anyhow::Result<Self> {
        ensure!(config.workers > 0, "at least one worker is required");
        ensure!(
            config.url_template.contains(ID_PLACEHOLDER),
            "url template `{}` has no {ID_PLACEHOLDER} placeholder",
            config.url_template
        );
        schema
            .validate()
            .with_context(|| format!("schema `{}` is invalid", schema.name))?;
        Ok(Self {
            ctx: Arc::new(WorkerContext { config, schema, sink }),
        })
    }

    /// Run every chunk to completion and collect the per-worker reports.
    /// A worker that fails to start or panics never affects its siblings.
    pub fn run(&self) -> DispatchSummary {
        let ranges = chunk_ranges(self.ctx.config.max_id, self.ctx.config.workers);
        info!(
            max_id = self.ctx.config.max_id,
            workers = ranges.len(),
            schema = self.ctx.schema.name.as_str(),
            "Dispatch starting"
        );

        let mut handles = Vec::with_capacity(ranges.len());
        for (worker, range) in ranges.into_iter().enumerate() {
            let ctx = Arc::clone(&self.ctx);
            let chunk = range.clone();
            let spawned = thread::Builder::new()
                .name(format!("sift-worker-{worker}"))
                .spawn(move || run_worker(worker, chunk, &ctx));
            handles.push((worker, range, spawned));
        }

        let mut summary = DispatchSummary::default();
        for (worker, range, spawned) in handles {
            let report = match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    WorkerReport::aborted(worker, range, "worker thread panicked")
                }),
                Err(e) => WorkerReport::aborted(worker, range, format!("spawn failed: {e}")),
            };
            log_report(&report);
            summary.reports.push(report);
        }

        info!(%summary, "Dispatch finished");
        summary
    }
}

fn log_report(report: &WorkerReport) {
    match &report.fatal {
        Some(reason) => error!(
            worker = report.worker,
            start = report.range.start,
            end = report.range.end,
            succeeded = report.succeeded,
            failed = report.failed,
            reason = reason.as_str(),
            "Worker stopped early"
        ),
        None => info!(
            worker = report.worker,
            start = report.range.start,
            end = report.range.end,
            succeeded = report.succeeded,
            failed = report.failed,
            "Worker finished"
        ),
    }
}

fn run_worker(worker: usize, range: Range<u64>, ctx: &WorkerContext) -> WorkerReport {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => return WorkerReport::aborted(worker, range, format!("runtime: {e}")),
    };
    runtime.block_on(process_chunk(worker, range, ctx))
}

async fn process_chunk(worker: usize, range: Range<u64>, ctx: &WorkerContext) -> WorkerReport {
    info!(worker, start = range.start, end = range.end, "Worker starting");

    let ingest = match IngestClient::new(&ctx.sink.backend_url, &ctx.sink.secret, ctx.sink.timeout) {
        Ok(client) => client,
        Err(e) => return WorkerReport::aborted(worker, range, format!("ingest client: {e}")),
    };

    match &ctx.config.backend {
        BackendKind::Static => match StaticBackend::new(ctx.config.navigate_timeout) {
            Ok(mut backend) => walk(&mut backend, &ingest, ctx, worker, range).await,
            Err(e) => WorkerReport::aborted(worker, range, format!("static backend: {e}")),
        },
        BackendKind::Live(options) => match LiveBackend::open(options.clone()).await {
            Ok(mut backend) => {
                let report = walk(&mut backend, &ingest, ctx, worker, range).await;
                if let Err(e) = backend.close().await {
                    warn!(worker, error = %e, "Failed to close browser session");
                }
                report
            }
            Err(e) => WorkerReport::aborted(worker, range, format!("live backend: {e}")),
        },
    }
}

async fn walk<B: DocumentBackend>(
    backend: &mut B,
    ingest: &IngestClient,
    ctx: &WorkerContext,
    worker: usize,
    range: Range<u64>,
) -> WorkerReport {
    let mut report = WorkerReport::new(worker, range.clone());

    for id in range {
        match process_id(backend, ingest, ctx, id).await {
            Ok(()) => {
                report.succeeded += 1;
                debug!(worker, id, "Item submitted");
            }
            Err(e) if e.is_fatal() => {
                report.failed += 1;
                report.fatal = Some(e.to_string());
                error!(worker, id, error = %e, "Schema error, stopping worker");
                break;
            }
            Err(e @ ItemError::Sink(_)) => {
                report.failed += 1;
                warn!(worker, id, error = %e, "Item lost at sink");
            }
            Err(e) => {
                report.failed += 1;
                debug!(worker, id, error = %e, "Item skipped");
            }
        }
    }

    report
}

async fn process_id<B: DocumentBackend>(
    backend: &mut B,
    ingest: &IngestClient,
    ctx: &WorkerContext,
    id: u64,
) -> Result<(), ItemError> {
    let config = &ctx.config;
    let location = config.location_for(id);

    timeout(config.navigate_timeout, backend.navigate(&location))
        .await
        .map_err(|_| ItemError::Timeout {
            stage: "navigate",
            after: config.navigate_timeout,
        })??;

    let extractor = Extractor::new(&*backend);
    let mut record = timeout(config.extract_timeout, extractor.extract(&ctx.schema.fields))
        .await
        .map_err(|_| ItemError::Timeout {
            stage: "extract",
            after: config.extract_timeout,
        })??;

    if config.rehost {
        if let Some(field) = &ctx.schema.media_field {
            let original = record.get(field).and_then(Value::as_text).map(str::to_string);
            if let Some(original) = original {
                match ingest.rehost(id, &original).await {
                    Ok(hosted) => record.set_field(field.as_str(), hosted),
                    Err(e) => {
                        warn!(id, url = original.as_str(), error = %e, "Rehost failed, keeping original")
                    }
                }
            }
        }
    }

    ingest.submit(&ctx.schema.name, &record).await?;
    Ok(())
}
