//! Client for the node's own backend API (served by the `api` container).
//!
//! Every endpoint answers with an envelope `{"status": "ok"|"error", "payload": ...}`.
//! Transport failures, non-JSON bodies and `error` envelopes all surface as
//! [`NodeError::BadApiResponse`].

use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use nodeops_core::error::NodeError;

use crate::http;

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    payload: Value,
}

/// Backend verdict on whether an update may proceed now.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateSafety {
    pub update_safe: bool,
    #[serde(default)]
    pub unsafe_reasons: Vec<String>,
}

pub struct BackendClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http::client(TIMEOUT)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn unwrap_envelope(url: &str, resp: reqwest::blocking::Response) -> Result<Value> {
        let status = resp.status();
        let text = resp.text().map_err(|e| bad_response(format!("{url}: {e}"), None))?;
        let envelope: Envelope = serde_json::from_str(&text)
            .map_err(|e| {
                bad_response(format!("{url} returned HTTP {status}, unparseable body: {e}"), None)
            })?;
        if envelope.status != "ok" || !status.is_success() {
            return Err(bad_response(
                format!("{url} returned HTTP {status} with status '{}'", envelope.status),
                Some(envelope.payload),
            ));
        }
        debug!(url, "backend response ok");
        Ok(envelope.payload)
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| bad_response(format!("{url}: {e}"), None))?;
        Self::unwrap_envelope(&url, resp)
    }

    pub fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| bad_response(format!("{url}: {e}"), None))?;
        Self::unwrap_envelope(&url, resp)
    }

    #[instrument(skip(self))]
    pub fn update_safety(&self) -> Result<UpdateSafety> {
        let payload = self.get("node/update-safe")?;
        serde_json::from_value(payload.clone())
            .map_err(|e| bad_response(format!("malformed update-safe payload: {e}"), Some(payload)))
    }

    /// Refuse with [`NodeError::UnsafeUpdate`] unless the backend says it is safe.
    pub fn require_update_safe(&self) -> Result<()> {
        let safety = self.update_safety()?;
        if !safety.update_safe {
            return Err(NodeError::UnsafeUpdate {
                reasons: safety.unsafe_reasons,
            }
            .into());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_maintenance(&self, on: bool) -> Result<()> {
        let path = if on {
            "node/maintenance-on"
        } else {
            "node/maintenance-off"
        };
        self.post(path, &serde_json::json!({}))?;
        Ok(())
    }

    pub fn node_info(&self) -> Result<Value> {
        self.get("node/info")
    }
}

fn bad_response(detail: String, payload: Option<Value>) -> anyhow::Error {
    NodeError::BadApiResponse { detail, payload }.into()
}
