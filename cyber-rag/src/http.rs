//! JSON-over-HTTP plumbing shared by [`ChatClient`](crate::ChatClient) and
//! [`EmbeddingClient`](crate::EmbeddingClient).

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::{RagError, Result};

/// The default Ollama server address.
pub const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434";

/// Build a client whose requests give up after `timeout_secs`.
pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))
}

/// POST `body` as JSON to `url` and decode the JSON reply.
///
/// Failures are returned as a message; callers wrap it in the error variant
/// for their stage.
pub(crate) async fn post_json<B, R>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    api_key: Option<&str>,
    body: &B,
) -> std::result::Result<R, String>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().await.map_err(|e| {
        error!(provider, url, error = %e, "request failed");
        if e.is_timeout() {
            format!("request timed out: {e}")
        } else {
            format!("request failed: {e}")
        }
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body).unwrap_or(body);
        error!(provider, %status, "API error");
        return Err(format!("API returned {status}: {detail}"));
    }

    response.json().await.map_err(|e| {
        error!(provider, error = %e, "failed to parse response");
        format!("failed to parse response: {e}")
    })
}

/// Pull a human-readable message out of an Ollama or OpenAI-style error body.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(message) => Some(message.clone()),
        other => other.get("message").and_then(|m| m.as_str()).map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_detail_reads_both_shapes() {
        assert_eq!(error_detail(r#"{"error":"model not found"}"#).as_deref(), Some("model not found"));
        assert_eq!(
            error_detail(r#"{"error":{"message":"bad key","type":"auth"}}"#).as_deref(),
            Some("bad key")
        );
        assert_eq!(error_detail("plain text"), None);
    }
}
