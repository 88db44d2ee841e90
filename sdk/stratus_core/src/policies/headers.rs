//! Header-stamping policies: fixed headers, user agent, request id.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::error::StratusResult;
use crate::pipeline::{self, blocking, PipelineRequest};

/// Simple policy that applies a fixed set of headers to every request,
/// overwriting caller-set values for the same names.
#[derive(Debug, Clone, Default)]
pub struct HeadersPolicy {
    headers: HeaderMap,
}

impl HeadersPolicy {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Chaining form for building the header set.
    pub fn insert(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    fn apply(&self, request: &mut PipelineRequest) {
        for (name, value) in &self.headers {
            request
                .request
                .headers_mut()
                .insert(name.clone(), value.clone());
        }
    }
}

#[async_trait]
impl pipeline::Policy for HeadersPolicy {
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request);
        Ok(())
    }
}

impl blocking::Policy for HeadersPolicy {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request);
        Ok(())
    }
}

/// Environment variable appended to the user-agent string when set.
pub const USER_AGENT_ENV_VAR: &str = "STRATUS_HTTP_USER_AGENT";

/// Simple policy that sets the `User-Agent` header.
///
/// The value is `stratus-core/<crate version>`, optionally prefixed with
/// an application id, with the contents of [`USER_AGENT_ENV_VAR`]
/// appended when present in the environment (read once at construction).
/// A caller-set `User-Agent` is never overwritten.
#[derive(Debug, Clone)]
pub struct UserAgentPolicy {
    user_agent: HeaderValue,
}

impl UserAgentPolicy {
    pub fn new() -> Self {
        Self::with_application_id(None)
    }

    /// Prefix the user agent with an application identifier.
    pub fn with_application_id(application_id: Option<&str>) -> Self {
        let base = concat!("stratus-core/", env!("CARGO_PKG_VERSION"));
        let mut user_agent = match application_id {
            Some(id) => format!("{id} {base}"),
            None => base.to_string(),
        };
        if let Ok(extra) = std::env::var(USER_AGENT_ENV_VAR) {
            if !extra.is_empty() {
                user_agent.push(' ');
                user_agent.push_str(&extra);
            }
        }
        let user_agent = HeaderValue::from_str(&user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static("stratus-core"));
        Self { user_agent }
    }

    fn apply(&self, request: &mut PipelineRequest) {
        let headers = request.request.headers_mut();
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, self.user_agent.clone());
        }
    }

    pub fn user_agent(&self) -> &HeaderValue {
        &self.user_agent
    }
}

impl Default for UserAgentPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl pipeline::Policy for UserAgentPolicy {
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request);
        Ok(())
    }
}

impl blocking::Policy for UserAgentPolicy {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request);
        Ok(())
    }
}

/// Default header name for generated request ids.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-client-request-id";

/// Simple policy that ensures every request carries a client request id,
/// generating a random hex id when the caller did not set one.
#[derive(Debug, Clone)]
pub struct RequestIdPolicy {
    header: HeaderName,
}

impl Default for RequestIdPolicy {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER),
        }
    }
}

impl RequestIdPolicy {
    /// Use a custom header name for the id.
    pub fn with_header(header: HeaderName) -> Self {
        Self { header }
    }

    fn apply(&self, request: &mut PipelineRequest) {
        let headers = request.request.headers_mut();
        if headers.contains_key(&self.header) {
            return;
        }
        let id = format!("{:032x}", fastrand::u128(..));
        if let Ok(value) = HeaderValue::from_str(&id) {
            headers.insert(self.header.clone(), value);
        }
    }
}

#[async_trait]
impl pipeline::Policy for RequestIdPolicy {
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request);
        Ok(())
    }
}

impl blocking::Policy for RequestIdPolicy {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request);
        Ok(())
    }
}
