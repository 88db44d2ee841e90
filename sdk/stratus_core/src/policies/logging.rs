//! Network trace logging with redaction.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::{StratusError, StratusResult};
use crate::pipeline::{self, blocking, PipelineRequest, PipelineResponse};

const REDACTED: &str = "REDACTED";

/// Header values logged verbatim; everything else is redacted.
pub const DEFAULT_ALLOWED_HEADERS: [&str; 15] = [
    "accept",
    "cache-control",
    "connection",
    "content-length",
    "content-type",
    "date",
    "etag",
    "expires",
    "last-modified",
    "pragma",
    "retry-after",
    "server",
    "transfer-encoding",
    "user-agent",
    "x-client-request-id",
];

/// Query parameter values logged verbatim; everything else is redacted.
pub const DEFAULT_ALLOWED_QUERY_PARAMS: [&str; 3] = ["api-version", "limit", "offset"];

/// Simple policy that emits `tracing` events for every request, response,
/// and failure.
///
/// Header and query-parameter values outside the allowlists are replaced
/// with `REDACTED` before logging; credentials and tokens never reach log
/// output at any log level.
#[derive(Debug, Clone)]
pub struct LoggingPolicy {
    allowed_headers: HashSet<String>,
    allowed_query_params: HashSet<String>,
}

impl Default for LoggingPolicy {
    fn default() -> Self {
        Self {
            allowed_headers: DEFAULT_ALLOWED_HEADERS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            allowed_query_params: DEFAULT_ALLOWED_QUERY_PARAMS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

impl LoggingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additionally log this header's value verbatim.
    pub fn allow_header(mut self, name: impl Into<String>) -> Self {
        self.allowed_headers.insert(name.into().to_ascii_lowercase());
        self
    }

    /// Additionally log this query parameter's value verbatim.
    pub fn allow_query_param(mut self, name: impl Into<String>) -> Self {
        self.allowed_query_params
            .insert(name.into().to_ascii_lowercase());
        self
    }

    fn format_headers(&self, headers: &HeaderMap) -> String {
        let mut parts: Vec<String> = headers
            .iter()
            .map(|(name, value)| {
                if self.allowed_headers.contains(name.as_str()) {
                    format!("{}: {}", name, value.to_str().unwrap_or(REDACTED))
                } else {
                    format!("{name}: {REDACTED}")
                }
            })
            .collect();
        parts.sort();
        parts.join("; ")
    }

    fn redacted_url(&self, url: &Url) -> String {
        if url.query().is_none() {
            return url.to_string();
        }
        let mut redacted = url.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                if self.allowed_query_params.contains(&key.to_ascii_lowercase()) {
                    (key.into_owned(), value.into_owned())
                } else {
                    (key.into_owned(), REDACTED.to_string())
                }
            })
            .collect();
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
        redacted.to_string()
    }

    fn log_request(&self, request: &PipelineRequest) {
        tracing::debug!(
            method = %request.request.method(),
            url = %self.redacted_url(request.request.url()),
            headers = %self.format_headers(request.request.headers()),
            "pipeline request"
        );
    }

    fn log_response(&self, response: &PipelineResponse) {
        tracing::debug!(
            status = response.response.status().as_u16(),
            headers = %self.format_headers(response.response.headers()),
            "pipeline response"
        );
    }

    fn log_exception(&self, request: &PipelineRequest, error: &StratusError) {
        tracing::warn!(
            method = %request.request.method(),
            url = %self.redacted_url(request.request.url()),
            error = %error,
            "pipeline request failed"
        );
    }
}

#[async_trait]
impl pipeline::Policy for LoggingPolicy {
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.log_request(request);
        Ok(())
    }

    async fn on_response(
        &self,
        _request: &mut PipelineRequest,
        response: &mut PipelineResponse,
    ) -> StratusResult<()> {
        self.log_response(response);
        Ok(())
    }

    async fn on_exception(&self, request: &mut PipelineRequest, error: &StratusError) {
        self.log_exception(request, error);
    }
}

impl blocking::Policy for LoggingPolicy {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.log_request(request);
        Ok(())
    }

    fn on_response(
        &self,
        _request: &mut PipelineRequest,
        response: &mut PipelineResponse,
    ) -> StratusResult<()> {
        self.log_response(response);
        Ok(())
    }

    fn on_exception(&self, request: &mut PipelineRequest, error: &StratusError) {
        self.log_exception(request, error);
    }
}
