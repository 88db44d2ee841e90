//! Credential cleanup after cross-domain redirects.

use async_trait::async_trait;
use reqwest::header::HeaderName;

use crate::error::StratusResult;
use crate::options::keys;
use crate::pipeline::{self, blocking, PipelineRequest};

/// Header names stripped by default after a cross-domain redirect.
pub const DEFAULT_SENSITIVE_HEADERS: [&str; 4] = [
    "authorization",
    "proxy-authorization",
    "cookie",
    "x-api-key",
];

/// Simple policy that strips credential-bearing headers once a redirect
/// has crossed to a different host.
///
/// The redirect policy signals the crossing by setting the
/// `insecure_domain_change` context option; this policy must therefore
/// sit *after* the redirect policy in the list (nearest the transport) so
/// its `on_request` hook runs again on the re-sent request.
#[derive(Debug, Clone)]
pub struct SensitiveHeaderCleanupPolicy {
    blocked_headers: Vec<HeaderName>,
}

impl Default for SensitiveHeaderCleanupPolicy {
    fn default() -> Self {
        Self {
            blocked_headers: DEFAULT_SENSITIVE_HEADERS
                .iter()
                .map(|name| HeaderName::from_static(name))
                .collect(),
        }
    }
}

impl SensitiveHeaderCleanupPolicy {
    /// Use a custom blocked-header list instead of
    /// [`DEFAULT_SENSITIVE_HEADERS`].
    pub fn new(blocked_headers: Vec<HeaderName>) -> Self {
        Self { blocked_headers }
    }

    fn apply(&self, request: &mut PipelineRequest) {
        if !request.context.options().flag(keys::INSECURE_DOMAIN_CHANGE) {
            return;
        }
        for header in &self.blocked_headers {
            if request.request.headers_mut().remove(header).is_some() {
                tracing::debug!(header = %header, "removed sensitive header after cross-domain redirect");
            }
        }
    }
}

#[async_trait]
impl pipeline::Policy for SensitiveHeaderCleanupPolicy {
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request);
        Ok(())
    }
}

impl blocking::Policy for SensitiveHeaderCleanupPolicy {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionBag;
    use crate::pipeline::Context;
    use crate::request::Request;

    fn request_with_credentials(options: OptionBag) -> PipelineRequest {
        let mut request = Request::get("https://api.example.com/x").unwrap();
        request.insert_header("authorization", "Bearer secret").unwrap();
        request.insert_header("cookie", "session=1").unwrap();
        request.insert_header("accept", "application/json").unwrap();
        PipelineRequest {
            request,
            context: Context::new(options),
        }
    }

    #[test]
    fn strips_blocked_headers_when_flag_is_set() {
        let options = OptionBag::new().with(keys::INSECURE_DOMAIN_CHANGE, true);
        let mut pipeline_request = request_with_credentials(options);

        SensitiveHeaderCleanupPolicy::default().apply(&mut pipeline_request);

        let headers = pipeline_request.request.headers();
        assert!(!headers.contains_key("authorization"));
        assert!(!headers.contains_key("cookie"));
        assert!(headers.contains_key("accept"));
    }

    #[test]
    fn leaves_headers_alone_without_the_flag() {
        let mut pipeline_request = request_with_credentials(OptionBag::new());

        SensitiveHeaderCleanupPolicy::default().apply(&mut pipeline_request);

        let headers = pipeline_request.request.headers();
        assert!(headers.contains_key("authorization"));
        assert!(headers.contains_key("cookie"));
    }

    #[test]
    fn custom_blocked_list_is_honored() {
        let options = OptionBag::new().with(keys::INSECURE_DOMAIN_CHANGE, true);
        let mut pipeline_request = request_with_credentials(options);

        let policy =
            SensitiveHeaderCleanupPolicy::new(vec![HeaderName::from_static("cookie")]);
        policy.apply(&mut pipeline_request);

        let headers = pipeline_request.request.headers();
        assert!(headers.contains_key("authorization"));
        assert!(!headers.contains_key("cookie"));
    }
}
