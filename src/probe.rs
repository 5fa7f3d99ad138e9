use serde_json::Value;
use tracing::debug;

use crate::api::{FileApi, HealthReply};
use crate::config::normalize_base_url;

/// Reduces the backend's health endpoint to connected / disconnected.
pub struct ConnectivityProbe<'a, A: FileApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: FileApi + ?Sized> ConnectivityProbe<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Never fails: every error collapses to `false`. A blank URL is
    /// rejected without touching the network.
    pub fn check(&self, base_url: &str) -> bool {
        let base_url = normalize_base_url(base_url);
        if base_url.is_empty() {
            return false;
        }
        match self.api.health(base_url) {
            Ok(reply) => {
                let healthy = is_healthy(&reply);
                debug!(base_url, status = reply.status, healthy, "probe");
                healthy
            }
            Err(err) => {
                debug!(base_url, error = %err, "probe failed");
                false
            }
        }
    }
}

pub fn is_healthy(reply: &HealthReply) -> bool {
    (200..300).contains(&reply.status)
        && matches!(
            reply.body.as_ref().and_then(|body| body.get("ok")),
            Some(Value::Bool(true))
        )
}
