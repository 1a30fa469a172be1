//! Blocking HTTP plumbing shared by the backend client and artifact fetches.

use std::time::Duration;

use anyhow::{Context, Result};

pub fn client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("nodeops/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Body of a successful GET. Non-2xx statuses are errors.
pub fn get_bytes(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let resp = client(timeout)?
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("GET {url}"))?;
    let body = resp.bytes().with_context(|| format!("reading body of {url}"))?;
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_get_returns_body() {
        let url = testutil::serve_once(200, "{\"abi\": []}");
        let body = get_bytes(&format!("{url}/manager.json"), Duration::from_secs(5)).unwrap();
        assert_eq!(body, b"{\"abi\": []}");
    }

    #[test]
    fn test_get_rejects_error_status() {
        let url = testutil::serve_once(404, "not found");
        let err = get_bytes(&url, Duration::from_secs(5)).unwrap_err();
        assert!(format!("{err:#}").contains("404"), "{err:#}");
    }
}
