//! Credential header injection.
//!
//! Token *acquisition* lives outside the pipeline core; this policy only
//! attaches an already-resolved key to every outgoing request.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{StratusError, StratusResult};
use crate::pipeline::{self, blocking, PipelineRequest};

/// Simple policy that injects a pre-resolved credential header.
///
/// The key is held as a [`SecretString`] and never appears in `Debug`
/// output or error messages; the inserted header value is marked
/// sensitive so header-dumping code skips it too.
#[derive(Clone)]
pub struct ApiKeyPolicy {
    header: HeaderName,
    scheme: Option<&'static str>,
    key: SecretString,
}

impl ApiKeyPolicy {
    /// Send the key as `Authorization: Bearer <key>`.
    pub fn bearer(key: impl Into<String>) -> Self {
        Self {
            header: AUTHORIZATION,
            scheme: Some("Bearer"),
            key: SecretString::from(key.into()),
        }
    }

    /// Send the key verbatim under a custom header.
    pub fn header(header: HeaderName, key: impl Into<String>) -> Self {
        Self {
            header,
            scheme: None,
            key: SecretString::from(key.into()),
        }
    }

    fn apply(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        let rendered = match self.scheme {
            Some(scheme) => format!("{} {}", scheme, self.key.expose_secret()),
            None => self.key.expose_secret().to_string(),
        };
        let mut value = HeaderValue::from_str(&rendered)
            .map_err(|_| StratusError::policy("ApiKeyPolicy", "credential is not a valid header value"))?;
        value.set_sensitive(true);
        request
            .request
            .headers_mut()
            .insert(self.header.clone(), value);
        Ok(())
    }
}

impl fmt::Debug for ApiKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyPolicy")
            .field("header", &self.header)
            .field("key", &"****")
            .finish()
    }
}

#[async_trait]
impl pipeline::Policy for ApiKeyPolicy {
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request)
    }
}

impl blocking::Policy for ApiKeyPolicy {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request)
    }
}
