//! Redirect following.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, LOCATION};
use reqwest::{Method, StatusCode};

use crate::error::{StratusError, StratusResult};
use crate::options::keys;
use crate::pipeline::{self, blocking, PipelineRequest, PipelineResponse};

/// Chaining policy that follows HTTP redirects.
///
/// Follows 301/302/303/307/308 responses carrying a `Location` header,
/// resolving relative targets against the current URL. 301/302/303
/// rewrite non-GET/HEAD requests to a bodyless GET, as browsers and the
/// original clients do. When the target host differs from the current
/// one, the `insecure_domain_change` context option is set before
/// re-sending so the sensitive-header cleanup policy (placed nearer the
/// transport) can strip credentials.
///
/// Responses that are not redirects, or redirects without a `Location`
/// header, are returned unchanged. Exceeding `max_redirects` while the
/// server keeps redirecting fails the call with
/// [`StratusError::TooManyRedirects`].
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    pub max_redirects: u32,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self { max_redirects: 30 }
    }
}

impl RedirectPolicy {
    pub fn new(max_redirects: u32) -> Self {
        Self { max_redirects }
    }

    /// Rewrite `request` toward the redirect target. Returns `Ok(false)`
    /// when the response is not a followable redirect.
    fn apply_redirect(
        &self,
        request: &mut PipelineRequest,
        response: &PipelineResponse,
        redirects: u32,
    ) -> StratusResult<bool> {
        let status = response.response.status();
        if !is_redirect_status(status) {
            return Ok(false);
        }
        let Some(location) = response.response.headers().get(LOCATION) else {
            return Ok(false);
        };
        if redirects >= self.max_redirects {
            return Err(StratusError::TooManyRedirects(self.max_redirects));
        }

        let location = location
            .to_str()
            .map_err(|err| StratusError::policy("RedirectPolicy", err.to_string()))?;
        let target = request.request.url().join(location)?;

        if authority(&target) != authority(request.request.url()) {
            request
                .context
                .options_mut()
                .insert(keys::INSECURE_DOMAIN_CHANGE, true);
            tracing::debug!(host = ?target.host_str(), "redirect crosses domains");
        }

        if rewrites_to_get(status) && *request.request.method() != Method::GET
            && *request.request.method() != Method::HEAD
        {
            request.request.set_method(Method::GET);
            request.request.set_body(Bytes::new());
            request.request.headers_mut().remove(CONTENT_LENGTH);
        }

        tracing::debug!(status = status.as_u16(), target = %target, "following redirect");
        request.request.set_url(target);
        Ok(true)
    }
}

/// Host plus effective port - the authority compared to decide whether a
/// redirect left the original domain.
fn authority(url: &url::Url) -> (Option<&str>, Option<u16>) {
    (url.host_str(), url.port_or_known_default())
}

fn is_redirect_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn rewrites_to_get(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303)
}

#[async_trait]
impl pipeline::ChainPolicy for RedirectPolicy {
    async fn send<'a>(
        &self,
        request: &mut PipelineRequest,
        next: pipeline::Next<'a>,
    ) -> StratusResult<PipelineResponse> {
        let mut redirects = 0;
        loop {
            let response = next.send(request).await?;
            if !self.apply_redirect(request, &response, redirects)? {
                return Ok(response);
            }
            redirects += 1;
        }
    }
}

impl blocking::ChainPolicy for RedirectPolicy {
    fn send(
        &self,
        request: &mut PipelineRequest,
        next: blocking::Next<'_>,
    ) -> StratusResult<PipelineResponse> {
        let mut redirects = 0;
        loop {
            let response = next.send(request)?;
            if !self.apply_redirect(request, &response, redirects)? {
                return Ok(response);
            }
            redirects += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionBag;
    use crate::pipeline::{Pipeline, PolicyEntry};
    use crate::policies::SensitiveHeaderCleanupPolicy;
    use crate::request::Request;
    use crate::response::RawResponse;
    use crate::test_utils::MockTransport;
    use reqwest::header::{HeaderMap, AUTHORIZATION};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn redirect_to(status: u16, location: &str) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, location.parse().unwrap());
        RawResponse::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            Bytes::new(),
        )
    }

    fn ok() -> RawResponse {
        RawResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new())
    }

    #[tokio::test]
    async fn follows_absolute_location() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            redirect_to(302, "https://api.example.com/moved"),
            ok(),
        ]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![PolicyEntry::Chaining(Arc::new(RedirectPolicy::default()))],
        );

        let response = pipeline
            .run(
                Request::get("https://api.example.com/old").unwrap(),
                OptionBag::new(),
            )
            .await
            .expect("should succeed");

        assert_eq!(response.response.status().as_u16(), 200);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 2);
        let seen = transport.seen_requests.lock().unwrap();
        assert_eq!(seen[1].url().path(), "/moved");
    }

    #[tokio::test]
    async fn resolves_relative_location() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            redirect_to(301, "/v2/things"),
            ok(),
        ]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![PolicyEntry::Chaining(Arc::new(RedirectPolicy::default()))],
        );

        pipeline
            .run(
                Request::get("https://api.example.com/v1/things").unwrap(),
                OptionBag::new(),
            )
            .await
            .expect("should succeed");

        let seen = transport.seen_requests.lock().unwrap();
        assert_eq!(seen[1].url().as_str(), "https://api.example.com/v2/things");
    }

    #[tokio::test]
    async fn see_other_rewrites_post_to_bodyless_get() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            redirect_to(303, "https://api.example.com/result"),
            ok(),
        ]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![PolicyEntry::Chaining(Arc::new(RedirectPolicy::default()))],
        );

        let mut request = Request::post("https://api.example.com/submit").unwrap();
        request.set_body("payload");

        pipeline
            .run(request, OptionBag::new())
            .await
            .expect("should succeed");

        let seen = transport.seen_requests.lock().unwrap();
        assert_eq!(seen[1].method(), Method::GET);
        assert!(seen[1].body().is_empty());
    }

    #[tokio::test]
    async fn temporary_redirect_preserves_method_and_body() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            redirect_to(307, "https://api.example.com/retry"),
            ok(),
        ]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![PolicyEntry::Chaining(Arc::new(RedirectPolicy::default()))],
        );

        let mut request = Request::post("https://api.example.com/submit").unwrap();
        request.set_body("payload");

        pipeline
            .run(request, OptionBag::new())
            .await
            .expect("should succeed");

        let seen = transport.seen_requests.lock().unwrap();
        assert_eq!(seen[1].method(), Method::POST);
        assert_eq!(&seen[1].body()[..], b"payload");
    }

    #[tokio::test]
    async fn exceeding_max_redirects_is_an_error() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            redirect_to(302, "https://api.example.com/a"),
            redirect_to(302, "https://api.example.com/b"),
            redirect_to(302, "https://api.example.com/c"),
        ]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![PolicyEntry::Chaining(Arc::new(RedirectPolicy::new(1)))],
        );

        let result = pipeline
            .run(
                Request::get("https://api.example.com/start").unwrap(),
                OptionBag::new(),
            )
            .await;

        assert!(matches!(result, Err(StratusError::TooManyRedirects(1))));
        assert_eq!(transport.sends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn redirect_without_location_is_returned_as_is() {
        let transport = Arc::new(MockTransport::with_responses(vec![RawResponse::new(
            StatusCode::MOVED_PERMANENTLY,
            HeaderMap::new(),
            Bytes::new(),
        )]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![PolicyEntry::Chaining(Arc::new(RedirectPolicy::default()))],
        );

        let response = pipeline
            .run(
                Request::get("https://api.example.com/x").unwrap(),
                OptionBag::new(),
            )
            .await
            .expect("should return the 301 itself");

        assert_eq!(response.response.status().as_u16(), 301);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cross_domain_redirect_triggers_sensitive_header_cleanup() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            redirect_to(302, "https://evil.example.net/steal"),
            ok(),
        ]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![
                PolicyEntry::Chaining(Arc::new(RedirectPolicy::default())),
                PolicyEntry::Simple(Arc::new(SensitiveHeaderCleanupPolicy::default())),
            ],
        );

        let mut request = Request::get("https://api.example.com/x").unwrap();
        request.insert_header("authorization", "Bearer secret").unwrap();

        pipeline
            .run(request, OptionBag::new())
            .await
            .expect("should succeed");

        let seen = transport.seen_requests.lock().unwrap();
        assert!(seen[0].headers().contains_key(AUTHORIZATION));
        assert!(!seen[1].headers().contains_key(AUTHORIZATION));
    }

    #[tokio::test]
    async fn same_domain_redirect_keeps_credentials() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            redirect_to(302, "https://api.example.com/moved"),
            ok(),
        ]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![
                PolicyEntry::Chaining(Arc::new(RedirectPolicy::default())),
                PolicyEntry::Simple(Arc::new(SensitiveHeaderCleanupPolicy::default())),
            ],
        );

        let mut request = Request::get("https://api.example.com/x").unwrap();
        request.insert_header("authorization", "Bearer secret").unwrap();

        pipeline
            .run(request, OptionBag::new())
            .await
            .expect("should succeed");

        let seen = transport.seen_requests.lock().unwrap();
        assert!(seen[1].headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn blocking_flavor_follows_redirects() {
        use crate::pipeline::blocking::{Pipeline, PolicyEntry};

        let transport = Arc::new(MockTransport::with_responses(vec![
            redirect_to(302, "https://api.example.com/moved"),
            ok(),
        ]));
        let pipeline = Pipeline::new(
            transport.clone(),
            vec![PolicyEntry::Chaining(Arc::new(RedirectPolicy::default()))],
        );

        let response = pipeline
            .run(
                Request::get("https://api.example.com/old").unwrap(),
                OptionBag::new(),
            )
            .expect("should succeed");

        assert_eq!(response.response.status().as_u16(), 200);
        assert_eq!(transport.sends.load(Ordering::SeqCst), 2);
    }
}
