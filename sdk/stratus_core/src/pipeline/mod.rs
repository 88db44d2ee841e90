//! The policy pipeline: chain assembly and the `run` entry point.
//!
//! A [`Pipeline`] owns a transport and an ordered list of policies. At
//! construction the policies are linked into a singly linked chain whose
//! terminal node invokes the transport; `run` threads one request down
//! the chain and its response back up. Pre-send hooks fire in list order,
//! post-send hooks in reverse order (the LIFO unwind of the call stack) -
//! policies near the transport see the response first.
//!
//! Two policy shapes exist:
//!
//! - [`Policy`]: observes and mutates the request/response but never
//!   controls progression. The pipeline wraps each one in an internal
//!   runner so it can sit in the chain.
//! - [`ChainPolicy`]: receives an explicit [`Next`] handle and may call
//!   onward zero, one, or many times - the basis for retry and redirect
//!   behavior.
//!
//! The blocking flavor of all of this lives in [`blocking`].

pub mod blocking;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{StratusError, StratusResult};
use crate::multipart;
use crate::options::{sanitize_transport_options, OptionBag};
use crate::request::Request;
use crate::response::RawResponse;
use crate::transport::{AnyTransport, Transport};

/// Per-call state: the option bag plus a back-reference to the transport
/// in use.
///
/// Created fresh for every `run` invocation and never shared across
/// concurrent calls. Multipart preparation contexts carry no transport.
#[derive(Debug, Clone)]
pub struct Context {
    transport: Option<Arc<dyn AnyTransport>>,
    options: OptionBag,
}

impl Context {
    /// Create a context with no transport back-reference.
    pub fn new(options: OptionBag) -> Self {
        Self {
            transport: None,
            options,
        }
    }

    pub(crate) fn with_transport(transport: Arc<dyn AnyTransport>, options: OptionBag) -> Self {
        Self {
            transport: Some(transport),
            options,
        }
    }

    pub fn options(&self) -> &OptionBag {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut OptionBag {
        &mut self.options
    }

    /// The transport this call runs against, when one is attached.
    pub fn transport(&self) -> Option<&Arc<dyn AnyTransport>> {
        self.transport.as_ref()
    }
}

/// A request paired with its per-call context; the unit passed down the
/// chain.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub request: Request,
    pub context: Context,
}

/// The envelope produced by the terminal node and handed back up the
/// chain: the request as it was sent, the raw transport response, and the
/// per-call context.
#[derive(Debug, Clone)]
pub struct PipelineResponse {
    pub request: Request,
    pub response: RawResponse,
    pub context: Context,
}

/// A policy that observes and mutates without controlling progression.
///
/// For one send, `on_request` fires exactly once, then exactly one of
/// `on_response` or `on_exception` fires - never both. An error from
/// `on_request` aborts the call before any network I/O. `on_exception`
/// cannot suppress the error: the chain re-returns the original failure
/// after the hook completes.
///
/// Hooks may suspend; ordering guarantees are identical to the blocking
/// flavor.
#[async_trait]
pub trait Policy: Send + Sync {
    /// Inspect or mutate the request before it is sent.
    async fn on_request(&self, request: &mut PipelineRequest) -> StratusResult<()> {
        let _ = request;
        Ok(())
    }

    /// Inspect or mutate the response after a successful send.
    async fn on_response(
        &self,
        request: &mut PipelineRequest,
        response: &mut PipelineResponse,
    ) -> StratusResult<()> {
        let _ = (request, response);
        Ok(())
    }

    /// Observe a downstream failure. The error keeps propagating after
    /// this hook returns.
    async fn on_exception(&self, request: &mut PipelineRequest, error: &StratusError) {
        let _ = (request, error);
    }
}

/// A policy with full control over calling onward.
///
/// Implementations may invoke `next` zero, one, or many times. When all
/// attempts are exhausted the policy surfaces the last failure; it never
/// synthesizes a response.
#[async_trait]
pub trait ChainPolicy: Send + Sync {
    async fn send<'a>(
        &self,
        request: &mut PipelineRequest,
        next: Next<'a>,
    ) -> StratusResult<PipelineResponse>;
}

/// One entry in the ordered policy list handed to the pipeline.
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
///
/// Copyable so retrying policies can call [`send`](Next::send) repeatedly.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    node: &'a NextNode,
}

impl Next<'_> {
    /// Send the request through the remaining links.
    pub async fn send(&self, request: &mut PipelineRequest) -> StratusResult<PipelineResponse> {
        match self.node {
            NextNode::Policy(node) => {
                node.policy.send(request, Next { node: &node.next }).await
            }
            NextNode::Transport(runner) => runner.send(request).await,
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

#[async_trait]
impl ChainPolicy for PolicyRunner {
    async fn send<'a>(
        &self,
        request: &mut PipelineRequest,
        next: Next<'a>,
    ) -> StratusResult<PipelineResponse> {
        self.policy.on_request(request).await?;
        match next.send(request).await {
            Ok(mut response) => {
                self.policy.on_response(request, &mut response).await?;
                Ok(response)
            }
            Err(error) => {
                self.policy.on_exception(request, &error).await;
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
    async fn send(&self, request: &mut PipelineRequest) -> StratusResult<PipelineResponse> {
        sanitize_transport_options(request.context.options_mut());
        let raw = self
            .transport
            .send(&request.request, request.context.options())
            .await?;
        Ok(PipelineResponse {
            request: request.request.clone(),
            response: raw,
            context: request.context.clone(),
        })
    }
}

/// The assembled chain plus its transport.
///
/// Construct once per client and reuse: the chain and transport are
/// immutable after construction and safe for concurrent `run` calls.
/// Everything call-specific is freshly allocated per call.
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    head: NextNode,
}

impl Pipeline {
    /// Assemble a pipeline from a transport and an ordered policy list.
    ///
    /// Simple policies are wrapped in the runner adapter; chaining
    /// policies are linked as-is; the last node links to the transport
    /// runner. An empty list is legal - `run` then sends straight to the
    /// transport.
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

    /// Open the transport's connection resources.
    ///
    /// Rust has no async `Drop`, so the async pipeline's scope is
    /// explicit: pair every `open` with a [`close`](Self::close) on all
    /// exit paths. The blocking flavor offers an RAII guard instead.
    pub async fn open(&self) -> StratusResult<()> {
        self.transport.open().await
    }

    /// Release the transport's connection resources.
    pub async fn close(&self) -> StratusResult<()> {
        self.transport.close().await
    }

    /// Send one request through the chain.
    ///
    /// Returns the response for any HTTP status; an `Err` is a
    /// transport-level or policy failure.
    #[tracing::instrument(
        name = "stratus::pipeline::run",
        skip(self, request, options),
        fields(method = %request.method(), url = %request.url())
    )]
    pub async fn run(
        &self,
        mut request: Request,
        options: OptionBag,
    ) -> StratusResult<PipelineResponse> {
        multipart::prepare_async(&mut request).await?;

        let transport: Arc<dyn AnyTransport> = self.transport.clone();
        let context = Context::with_transport(transport, options);
        let mut pipeline_request = PipelineRequest { request, context };

        let result = Next { node: &self.head }.send(&mut pipeline_request).await;
        match &result {
            Ok(response) => {
                tracing::debug!(status = response.response.status().as_u16(), "pipeline run complete");
            }
            Err(error) => {
                tracing::debug!(error = %error, "pipeline run failed");
            }
        }
        result
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    transport: Option<Arc<dyn Transport>>,
    policies: Vec<PolicyEntry>,
}

impl PipelineBuilder {
    /// Set the transport the pipeline sends through.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Append a simple policy to the chain.
    pub fn policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policies.push(PolicyEntry::Simple(policy));
        self
    }

    /// Append a chaining policy to the chain.
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
