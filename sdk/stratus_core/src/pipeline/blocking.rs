//! Blocking flavor of the pipeline.
//!
//! Same chain shape and ordering guarantees as the async flavor, with
//! plain call-stack recursion instead of futures, and an RAII scope
//! ([`PipelineGuard`]) instead of explicit `open`/`close` pairing.

use std::ops::Deref;
use std::sync::Arc;

use super::{Context, PipelineRequest, PipelineResponse};
use crate::error::{StratusError, StratusResult};
use crate::multipart;
use crate::options::{sanitize_transport_options, OptionBag};
use crate::request::Request;
use crate::transport::{blocking::Transport, AnyTransport};

/// A policy that observes and mutates without controlling progression.
/// The blocking twin of [`Policy`](super::Policy); identical hook
/// ordering guarantees.
pub trait Policy: Send + Sync {
    fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        let _ = request;
        Ok(())
    }

    fn on_response(
        &self,
        request: &mut PipelineRequest,
        response: &mut PipelineResponse,
    ) -> StratusResult<()> {
        let _ = (request, response);
        Ok(())
    }

    fn on_exception(&self, request: &mut PipelineRequest, error: &StratusError) {
        let _ = (request, error);
    }
}

/// A policy with full control over calling onward; the blocking twin of
/// [`ChainPolicy`](super::ChainPolicy).
pub trait ChainPolicy: Send + Sync {
    fn send(&self, request: &mut PipelineRequest, next: Next<'_>)
        -> StratusResult<PipelineResponse>;
}

/// One entry in the ordered policy list.
pub enum PolicyEntry {
    Simple(Arc<dyn Policy>),
    Chaining(Arc<dyn ChainPolicy>),
}

impl PolicyEntry {
    pub fn simple(policy: impl Policy + 'static) -> Self {
        Self::Simple(Arc::new(policy))
    }

    pub fn chaining(policy: impl ChainPolicy + 'static) -> Self {
        Self::Chaining(Arc::new(policy))
    }
}

/// The rest of the chain, as seen from one policy.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    node: &'a NextNode,
}

impl Next<'_> {
    /// Send the request through the remaining links.
    pub fn send(&self, request: &mut PipelineRequest) -> StratusResult<PipelineResponse> {
        match self.node {
            NextNode::Policy(node) => node.policy.send(request, Next { node: &node.next }),
            NextNode::Transport(runner) => runner.send(request),
        }
    }
}

enum NextNode {
    Policy(Box<ChainNode>),
    Transport(TransportRunner),
}

struct ChainNode {
    policy: Arc<dyn ChainPolicy>,
    next: NextNode,
}

/// Adapter that lets a simple [`Policy`] participate in the chain.
struct PolicyRunner {
    policy: Arc<dyn Policy>,
}

impl ChainPolicy for PolicyRunner {
    fn send(
        &self,
        request: &mut PipelineRequest,
        next: Next<'_>,
    ) -> StratusResult<PipelineResponse> {
        self.policy.on_request(request)?;
        match next.send(request) {
            Ok(mut response) => {
                self.policy.on_response(request, &mut response)?;
                Ok(response)
            }
            Err(error) => {
                self.policy.on_exception(request, &error);
                Err(error)
            }
        }
    }
}

/// Terminal link: sanitizes the option bag and invokes the transport.
struct TransportRunner {
    transport: Arc<dyn Transport>,
}

impl TransportRunner {
    fn send(&self, request: &mut PipelineRequest) -> StratusResult<PipelineResponse> {
        sanitize_transport_options(request.context.options_mut());
        let raw = self
            .transport
            .send(&request.request, request.context.options())?;
        Ok(PipelineResponse {
            request: request.request.clone(),
            response: raw,
            context: request.context.clone(),
        })
    }
}

/// The assembled blocking chain plus its transport.
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    head: NextNode,
}

impl Pipeline {
    /// Assemble a pipeline from a transport and an ordered policy list.
    /// See [`Pipeline::new`](super::Pipeline::new) for the chain-building
    /// rules; they are identical here.
    pub fn new(transport: Arc<dyn Transport>, policies: Vec<PolicyEntry>) -> Self {
        let mut head = NextNode::Transport(TransportRunner {
            transport: transport.clone(),
        });
        for entry in policies.into_iter().rev() {
            let policy: Arc<dyn ChainPolicy> = match entry {
                PolicyEntry::Simple(policy) => Arc::new(PolicyRunner { policy }),
                PolicyEntry::Chaining(policy) => policy,
            };
            head = NextNode::Policy(Box::new(ChainNode { policy, next: head }));
        }
        Self { transport, head }
    }

    /// Create a new builder for configuring a `Pipeline`.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Open the transport and return a scope that closes it on drop.
    ///
    /// The guard derefs to the pipeline, so `run` can be called on it
    /// directly. Dropping the guard closes the transport on every exit
    /// path, including panics and early `?` returns; use
    /// [`PipelineGuard::close`] to observe a close failure instead of
    /// having it logged.
    pub fn open(&self) -> StratusResult<PipelineGuard<'_>> {
        self.transport.open()?;
        Ok(PipelineGuard {
            pipeline: self,
            closed: false,
        })
    }

    /// Send one request through the chain.
    pub fn run(&self, mut request: Request, options: OptionBag) -> StratusResult<PipelineResponse> {
        multipart::prepare(&mut request)?;

        let transport: Arc<dyn AnyTransport> = self.transport.clone();
        let context = Context::with_transport(transport, options);
        let mut pipeline_request = PipelineRequest { request, context };
        Next { node: &self.head }.send(&mut pipeline_request)
    }
}

/// Builder for constructing a blocking [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    transport: Option<Arc<dyn Transport>>,
    policies: Vec<PolicyEntry>,
}

impl PipelineBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policies.push(PolicyEntry::Simple(policy));
        self
    }

    pub fn chaining(mut self, policy: Arc<dyn ChainPolicy>) -> Self {
        self.policies.push(PolicyEntry::Chaining(policy));
        self
    }

    /// Build the `Pipeline`.
    ///
    /// # Errors
    ///
    /// Returns an error if no transport was provided.
    pub fn build(self) -> StratusResult<Pipeline> {
        let transport = self.transport.ok_or_else(|| {
            StratusError::MissingConfig(
                "transport is required. Set it via PipelineBuilder::transport.".into(),
            )
        })?;
        Ok(Pipeline::new(transport, self.policies))
    }
}

/// An open pipeline scope; closes the transport when dropped.
pub struct PipelineGuard<'a> {
    pipeline: &'a Pipeline,
    closed: bool,
}

impl PipelineGuard<'_> {
    /// Close the transport now, surfacing any close failure.
    pub fn close(mut self) -> StratusResult<()> {
        self.closed = true;
        self.pipeline.transport.close()
    }
}

impl Deref for PipelineGuard<'_> {
    type Target = Pipeline;

    fn deref(&self) -> &Pipeline {
        self.pipeline
    }
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(error) = self.pipeline.transport.close() {
            tracing::warn!(error = %error, "failed to close transport");
        }
    }
}
