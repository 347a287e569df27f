use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

/// Community-maintained README the job table lives in.
pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/SimplifyJobs/New-Grad-Positions/dev/README.md";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One blocking GET of the source document. Any failure here is fatal to
/// the run: connection error, timeout, or a non-2xx status.
pub fn fetch_document(url: &str) -> Result<String> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("building HTTP client")?;

    let response = client
        .get(url)
        .send()
        .with_context(|| format!("fetching {url}"))?
        .error_for_status()
        .with_context(|| format!("fetching {url}"))?;

    let body = response.text().context("reading response body")?;
    info!("Fetched {} bytes from {}", body.len(), url);
    Ok(body)
}
