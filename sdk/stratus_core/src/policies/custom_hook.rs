//! Caller-supplied request/response callbacks.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StratusResult;
use crate::pipeline::{self, blocking, PipelineRequest, PipelineResponse};

/// Callback observing the request immediately before it continues down
/// the chain.
pub type RequestHook = Arc<dyn Fn(&PipelineRequest) + Send + Sync>;

/// Callback observing the response on its way back up the chain.
pub type ResponseHook = Arc<dyn Fn(&PipelineRequest, &PipelineResponse) + Send + Sync>;

/// Simple policy that invokes caller-supplied hooks around the send.
///
/// Hooks are fixed at construction and observe only; mutation and flow
/// control belong to real policies.
#[derive(Clone, Default)]
pub struct CustomHookPolicy {
    request_hook: Option<RequestHook>,
    response_hook: Option<ResponseHook>,
}

impl CustomHookPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook invoked before the send.
    pub fn request_hook(mut self, hook: impl Fn(&PipelineRequest) + Send + Sync + 'static) -> Self {
        self.request_hook = Some(Arc::new(hook));
        self
    }

    /// Set the hook invoked after a successful send.
    pub fn response_hook(
        mut self,
        hook: impl Fn(&PipelineRequest, &PipelineResponse) + Send + Sync + 'static,
    ) -> Self {
        self.response_hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for CustomHookPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomHookPolicy")
            .field("request_hook", &self.request_hook.is_some())
            .field("response_hook", &self.response_hook.is_some())
            .finish()
    }
}

#[async_trait]
impl pipeline::Policy for CustomHookPolicy {
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        if let Some(hook) = &self.request_hook {
            hook(request);
        }
        Ok(())
    }

    async fn on_response(
        &self,
        request: &mut PipelineRequest,
        response: &mut PipelineResponse,
    ) -> StratusResult<()> {
        if let Some(hook) = &self.response_hook {
            hook(request, response);
        }
        Ok(())
    }
}

impl blocking::Policy for CustomHookPolicy {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        if let Some(hook) = &self.request_hook {
            hook(request);
        }
        Ok(())
    }

    fn on_response(
        &self,
        request: &mut PipelineRequest,
        response: &mut PipelineResponse,
    ) -> StratusResult<()> {
        if let Some(hook) = &self.response_hook {
            hook(request, response);
        }
        Ok(())
    }
}
