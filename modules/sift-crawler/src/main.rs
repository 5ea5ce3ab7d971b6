use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sift_extract::{DocumentBackend, Extractor, LiveBackend, LiveOptions, StaticBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sift_crawler::{
    schemas, write_cookies, BackendKind, CrawlConfig, DispatchConfig, Dispatcher, LiveConfig,
    SinkSettings,
};

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Schema-driven record extraction over a numbered page range")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk project IDs, extract each page and submit it to the backend
    Crawl {
        #[arg(long, default_value = "summer")]
        event: String,

        #[arg(long, default_value_t = 2025)]
        year: u16,

        /// Visit IDs 0..max_id
        #[arg(long, default_value_t = 16_000)]
        max_id: u64,

        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Use a WebDriver browser session instead of plain HTTP fetches
        #[arg(long)]
        live: bool,

        /// Submit media links as found instead of rehosting them
        #[arg(long)]
        no_rehost: bool,
    },

    /// Extract one page or local file and print the record as JSON
    Extract {
        /// URL or filesystem path
        location: String,

        #[arg(long, default_value = "summer")]
        event: String,

        #[arg(long, default_value_t = 2025)]
        year: u16,

        #[arg(long)]
        live: bool,
    },

    /// Open a location in a browser session and save its cookies
    Cookies {
        location: String,

        #[arg(long, default_value = "cookies.txt")]
        out: PathBuf,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sift=info".parse()?))
        .init();

    match Cli::parse().command {
        Commands::Crawl {
            event,
            year,
            max_id,
            workers,
            live,
            no_rehost,
        } => cmd_crawl(&event, year, max_id, workers, live, no_rehost),
        Commands::Extract {
            location,
            event,
            year,
            live,
        } => block_on(cmd_extract(&location, &event, year, live)),
        Commands::Cookies { location, out } => block_on(cmd_cookies(&location, &out)),
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(fut: F) -> Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")?
        .block_on(fut)
}

fn cmd_crawl(
    event: &str,
    year: u16,
    max_id: u64,
    workers: usize,
    live: bool,
    no_rehost: bool,
) -> Result<()> {
    let config = CrawlConfig::from_env()?;
    config.log_redacted();

    let schema = schemas::resolve(event, year)?;
    info!(schema = schema.name.as_str(), fields = schema.fields.len(), "Schema loaded");

    let mut dispatch = DispatchConfig::new(&config.site_url, max_id, workers);
    dispatch.navigate_timeout = config.navigate_timeout;
    dispatch.extract_timeout = config.navigate_timeout;
    dispatch.rehost = !no_rehost;
    if live {
        dispatch.backend = BackendKind::Live(live_options(&config.live()));
    }

    let sink = SinkSettings {
        backend_url: config.backend_url.clone(),
        secret: config.auth_secret.clone(),
        timeout: config.upload_timeout,
    };

    let summary = Dispatcher::new(dispatch, schema, sink)?.run();
    println!("{summary}");
    Ok(())
}

async fn cmd_extract(location: &str, event: &str, year: u16, live: bool) -> Result<()> {
    let schema = schemas::resolve(event, year)?;

    let record = if live {
        let config = LiveConfig::from_env()?;
        let mut backend = LiveBackend::open(live_options(&config)).await?;
        let result = async {
            open_location(&mut backend, location).await?;
            Ok::<_, anyhow::Error>(Extractor::new(&backend).extract(&schema.fields).await?)
        }
        .await;
        backend.close().await?;
        result?
    } else {
        let mut backend = StaticBackend::new(Duration::from_secs(20))?;
        open_location(&mut backend, location).await?;
        Extractor::new(&backend).extract(&schema.fields).await?
    };

    println!("{}", serde_json::to_string_pretty(&record.to_plain_value())?);
    Ok(())
}

async fn cmd_cookies(location: &str, out: &Path) -> Result<()> {
    let config = LiveConfig::from_env()?;
    let mut backend = LiveBackend::open(live_options(&config)).await?;
    let result = async {
        open_location(&mut backend, location).await?;
        write_cookies(&backend, out).await
    }
    .await;
    backend.close().await?;
    result.map(|_| ())
}

/// Navigate to a URL, or load a path that exists on disk.
async fn open_location<B: DocumentBackend>(backend: &mut B, location: &str) -> Result<()> {
    let path = Path::new(location);
    if path.exists() {
        backend
            .load_local(path)
            .await
            .with_context(|| format!("loading {location}"))
    } else {
        backend
            .navigate(location)
            .await
            .with_context(|| format!("navigating to {location}"))
    }
}

fn live_options(config: &LiveConfig) -> LiveOptions {
    LiveOptions {
        webdriver_url: config.webdriver_url.clone(),
        command_timeout: config.navigate_timeout,
        wait_timeout: config.navigate_timeout,
        ..LiveOptions::default()
    }
}
