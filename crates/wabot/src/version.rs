//! Latest client protocol version lookup.

use crate::socket::ClientVersion;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use wabot_common::types::DEFAULT_CLIENT_VERSION;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a reqwest client with the required User-Agent header.
fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(format!("wabot/{}", env!("CARGO_PKG_VERSION")))
        .timeout(FETCH_TIMEOUT)
        .build()
}

/// Extracts `{"version": [major, minor, patch]}`.
fn parse_version(body: &Value) -> Option<ClientVersion> {
    let parts = body.get("version")?.as_array()?;
    if parts.len() != 3 {
        return None;
    }
    let mut version = [0u32; 3];
    for (slot, part) in version.iter_mut().zip(parts) {
        *slot = u32::try_from(part.as_u64()?).ok()?;
    }
    Some(version)
}

async fn fetch(url: &str) -> Result<ClientVersion, anyhow::Error> {
    let client = http_client()?;
    let body: Value = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    parse_version(&body).ok_or_else(|| anyhow::anyhow!("missing version triple in response"))
}

/// Fetches the latest client version from `url`, falling back to
/// [`DEFAULT_CLIENT_VERSION`] on any failure.
pub async fn fetch_latest_version(url: &str) -> ClientVersion {
    match fetch(url).await {
        Ok(version) => {
            debug!(?version, "fetched latest client version");
            version
        }
        Err(e) => {
            warn!(error = %e, "version fetch failed, using built-in default");
            DEFAULT_CLIENT_VERSION
        }
    }
}
