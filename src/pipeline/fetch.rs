//! Source image resolution: raw bytes, a local file, or a URL.
//!
//! Fetching is fail-soft: any failure logs a warning and yields `None`, and
//! the run continues image-less (the extraction stage emits its placeholder).
//! Source URLs are only ever downloaded from here and embedded as base64 —
//! a URL is never forwarded to an external model service, so private
//! loopback references remain private.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::PipelineConfig;

/// Where the problem image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProblemSource {
    /// Image bytes handed over directly (e.g. a multipart upload).
    Bytes(Vec<u8>),
    /// Path on the local filesystem.
    Path(PathBuf),
    /// HTTP(S) URL to download.
    Url(String),
}

/// `true` for loopback/unspecified-host URLs that only resolve locally.
pub fn is_private_reference(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(rest)
        .rsplit('@')
        .next()
        .unwrap_or(rest);
    let host = host.strip_prefix('[').unwrap_or(host);
    host == "localhost"
        || host.starts_with("localhost:")
        || host.starts_with("127.")
        || host.starts_with("::1")
        || host.starts_with("0.0.0.0")
}

/// Resolve a source to image bytes. `None` on any failure.
pub async fn fetch_source(source: &ProblemSource, config: &PipelineConfig) -> Option<Vec<u8>> {
    let bytes = match source {
        ProblemSource::Bytes(bytes) => {
            if bytes.is_empty() {
                warn!("source bytes are empty");
                return None;
            }
            bytes.clone()
        }
        ProblemSource::Path(path) => match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read source file");
                return None;
            }
        },
        ProblemSource::Url(url) => {
            if is_private_reference(url) {
                debug!(%url, "private reference, downloading locally for embedding");
            }
            download(url, config.download_timeout_secs).await?
        }
    };

    if crate::pipeline::encode::sniff_mime(&bytes).is_none() {
        warn!(len = bytes.len(), "source bytes lack a known image magic number");
    }
    debug!(len = bytes.len(), "source resolved");
    Some(bytes)
}

async fn download(url: &str, timeout_secs: u64) -> Option<Vec<u8>> {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "failed to construct download client");
            return None;
        }
    };

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(%url, error = %e, "image download failed");
            return None;
        }
    };
    if !response.status().is_success() {
        warn!(%url, status = %response.status(), "image download returned error status");
        return None;
    }
    match response.bytes().await {
        Ok(bytes) => Some(bytes.to_vec()),
        Err(e) => {
            warn!(%url, error = %e, "image download body read failed");
            None
        }
    }
}
