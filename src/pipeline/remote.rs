//! Remote rendering engine: a hosted Kroki-compatible HTTP service.
//!
//! The service only ever returns PNG here, so blocks rendered remotely are
//! never stylized.

use crate::config::RenderConfig;
use crate::error::BlockError;
use crate::pipeline::encode::remote_url;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Fetch a PNG rendering of `source` and write it to `output`.
pub async fn render_remote(
    source: &str,
    output: &Path,
    config: &RenderConfig,
    index: usize,
) -> Result<(), BlockError> {
    let failed = |detail: String| BlockError::RemoteFailed { index, detail };
    let url = remote_url(&config.remote_endpoint, "png", source);
    debug!("Block {index}: GET {url}");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.render_timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(&url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {}s", config.render_timeout_secs))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    if bytes.is_empty() {
        return Err(failed("service returned an empty body".into()));
    }

    tokio::fs::write(output, &bytes)
        .await
        .map_err(|e| failed(format!("writing {}: {e}", output.display())))
}
