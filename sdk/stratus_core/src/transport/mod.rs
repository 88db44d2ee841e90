//! Transport abstraction and the `reqwest`-backed defaults.
//!
//! A transport performs the network I/O for exactly one request. The
//! pipeline owns a single transport instance for its lifetime and never
//! calls it directly: the terminal chain node does, after stripping
//! pipeline-internal options from the bag.
//!
//! Transports must not follow redirects themselves: redirect handling
//! belongs to the redirect policy, which has to observe the 3xx responses
//! to raise the cross-domain signal.

pub mod blocking;

use std::any::Any;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect;

use crate::error::StratusResult;
use crate::options::{keys, OptionBag};
use crate::request::Request;
use crate::response::RawResponse;

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Flavor-agnostic view of a transport.
///
/// The per-call [`Context`](crate::pipeline::Context) carries the
/// transport as `Arc<dyn AnyTransport>` so the same envelope types serve
/// both the async and the blocking chain; `as_any` is the escape hatch
/// for policies that need the concrete type.
pub trait AnyTransport: Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
}

impl<T> AnyTransport for T
where
    T: Any + Send + Sync + fmt::Debug,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An async transport.
///
/// `open`/`close` bracket the transport's connection resources and are
/// driven by the pipeline's scope handling; both default to no-ops for
/// transports without explicit lifecycle.
#[async_trait]
pub trait Transport: AnyTransport {
    async fn open(&self) -> StratusResult<()> {
        Ok(())
    }

    async fn close(&self) -> StratusResult<()> {
        Ok(())
    }

    /// Send one request and produce the buffered response.
    ///
    /// `options` has already been sanitized: only wire-level keys such as
    /// [`keys::TIMEOUT`] remain.
    async fn send(&self, request: &Request, options: &OptionBag) -> StratusResult<RawResponse>;
}

/// The default async transport, wrapping [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing client.
    ///
    /// The client should be configured with
    /// `redirect(redirect::Policy::none())`; see the module docs.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a transport with default timeouts and redirects disabled.
    pub fn build_default() -> StratusResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_READ_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request, options: &OptionBag) -> StratusResult<RawResponse> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .body(request.body().clone());

        if let Some(timeout) = options.duration(keys::TIMEOUT) {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(RawResponse::new(status, headers, body))
    }
}
