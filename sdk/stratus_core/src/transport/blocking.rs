//! Blocking transport trait and the `reqwest::blocking` default.

use reqwest::redirect;

use super::{AnyTransport, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use crate::error::StratusResult;
use crate::options::{keys, OptionBag};
use crate::request::Request;
use crate::response::RawResponse;

/// A blocking transport. The synchronous twin of
/// [`Transport`](super::Transport).
pub trait Transport: AnyTransport {
    fn open(&self) -> StratusResult<()> {
        Ok(())
    }

    fn close(&self) -> StratusResult<()> {
        Ok(())
    }

    /// Send one request and produce the buffered response.
    fn send(&self, request: &Request, options: &OptionBag) -> StratusResult<RawResponse>;
}

/// The default blocking transport, wrapping [`reqwest::blocking::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Wrap an existing client. The client should have redirects disabled;
    /// see the [module docs](crate::transport).
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    /// Build a transport with default timeouts and redirects disabled.
    pub fn build_default() -> StratusResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_READ_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self::new(client))
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &Request, options: &OptionBag) -> StratusResult<RawResponse> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().clone())
            .headers(request.headers().clone())
            .body(request.body().to_vec());

        if let Some(timeout) = options.duration(keys::TIMEOUT) {
            builder = builder.timeout(timeout);
        }

        let response = builder.send()?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes()?;
        Ok(RawResponse::new(status, headers, body))
    }
}
