use std::path::Path;

use anyhow::{Context, Result};
use sift_extract::{format_cookies, DocumentBackend};
use tracing::info;

/// Write the backend's session cookies to `path` as `name=value` lines.
/// Returns the number of cookies written.
pub async fn write_cookies<B: DocumentBackend>(backend: &B, path: &Path) -> Result<usize> {
    let cookies = backend.cookies().await.context("reading session cookies")?;
    tokio::fs::write(path, format_cookies(&cookies))
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    info!(path = %path.display(), count = cookies.len(), "Cookies written");
    Ok(cookies.len())
}
