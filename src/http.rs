//! Shared HTTP plumbing for the backend calls.

use crate::config::ApiConfig;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

/// Builds a client whose every request is bounded by the configured timeout.
pub(crate) fn build_client(config: &ApiConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("face-attendance/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Attaches the bearer token, when one is configured.
pub(crate) fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Reads a response body as JSON, keeping non-JSON bodies as a string value
/// so error statuses still carry their text.
pub(crate) async fn read_json(response: Response) -> reqwest::Result<(u16, Value)> {
    let status = response.status().as_u16();
    let bytes = response.bytes().await?;
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    Ok((status, body))
}
