//! Distributed tracing context propagation.

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

use crate::error::StratusResult;
use crate::options::TracingOptions;
use crate::pipeline::{self, blocking, PipelineRequest, PipelineResponse};

/// The W3C trace-context header injected into outgoing requests.
pub const TRACEPARENT: &str = "traceparent";

/// Simple policy that propagates a W3C `traceparent` header and records
/// span events for each attempt.
///
/// Per-call behavior is controlled through the `tracing_options` option
/// (see [`TracingOptions`]): a disabled set suppresses injection, and its
/// attributes are recorded on the emitted events. The option itself never
/// reaches the transport; the transport runner strips it.
#[derive(Debug, Clone, Default)]
pub struct DistributedTracingPolicy;

impl DistributedTracingPolicy {
    pub fn new() -> Self {
        Self
    }

    fn apply_request(&self, request: &mut PipelineRequest) {
        let tracing_options = request
            .context
            .options()
            .tracing_options()
            .cloned()
            .unwrap_or_default();
        if !tracing_options.enabled {
            return;
        }

        let header = HeaderName::from_static(TRACEPARENT);
        if request.request.headers().contains_key(&header) {
            return;
        }

        // Nonzero ids per the W3C trace-context format.
        let trace_id = fastrand::u128(1..);
        let span_id = fastrand::u64(1..);
        let rendered = format!("00-{trace_id:032x}-{span_id:016x}-01");
        if let Ok(value) = HeaderValue::from_str(&rendered) {
            request.request.headers_mut().insert(header, value);
        }

        tracing::debug!(
            traceparent = %rendered,
            attributes = ?tracing_options.attributes,
            method = %request.request.method(),
            "client span started"
        );
    }

    fn apply_response(&self, request: &PipelineRequest, response: &PipelineResponse) {
        let traceparent = request
            .request
            .headers()
            .get(TRACEPARENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        tracing::debug!(
            traceparent,
            status = response.response.status().as_u16(),
            "client span completed"
        );
    }
}

#[async_trait]
impl pipeline::Policy for DistributedTracingPolicy {
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply_request(request);
        Ok(())
    }

    async fn on_response(
        &self,
        request: &mut PipelineRequest,
        response: &mut PipelineResponse,
    ) -> StratusResult<()> {
        self.apply_response(request, response);
        Ok(())
    }
}

impl blocking::Policy for DistributedTracingPolicy {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        self.apply_request(request);
        Ok(())
    }

    fn on_response(
        &self,
        request: &mut PipelineRequest,
        response: &mut PipelineResponse,
    ) -> StratusResult<()> {
        self.apply_response(request, response);
        Ok(())
    }
}
