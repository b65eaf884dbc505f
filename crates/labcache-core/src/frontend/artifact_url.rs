//! Artifact URL helpers for the `CacheForDut` wiring.

use labcache_types::AssignError;
use url::Url;

fn invalid(url: &str, message: impl Into<String>) -> AssignError {
    AssignError::InvalidArtifactUrl { url: url.to_string(), message: message.into() }
}

/// Parse an artifact URL and derive its hash key, `host[:port]/path`.
///
/// `gs://chromeos-image-archive/board-release/R90/image.bin` becomes
/// `chromeos-image-archive/board-release/R90/image.bin`.
pub fn artifact_path(raw: &str) -> Result<String, AssignError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(invalid(raw, "empty URL"));
    }
    let url = Url::parse(raw).map_err(|e| invalid(raw, e.to_string()))?;
    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(|| invalid(raw, "missing host"))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}{}", host, port, url.path()),
        None => format!("{}{}", host, url.path()),
    })
}

/// `<backend>/download/<artifact path>`.
pub fn download_url(backend: &str, artifact_path: &str) -> Result<Url, AssignError> {
    let joined = format!("{}/download/{}", backend.trim_end_matches('/'), artifact_path);
    Url::parse(&joined).map_err(|e| invalid(&joined, e.to_string()))
}
