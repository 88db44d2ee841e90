//! The standard policy set.
//!
//! Every policy here implements both the async and the blocking traits,
//! so one policy value serves either pipeline flavor. A typical client
//! assembles, in order:
//!
//! 1. [`DistributedTracingPolicy`]
//! 2. [`LoggingPolicy`]
//! 3. [`RetryPolicy`] (chaining)
//! 4. [`ApiKeyPolicy`]
//! 5. [`RedirectPolicy`] (chaining)
//! 6. [`CustomHookPolicy`]
//! 7. [`SensitiveHeaderCleanupPolicy`] - nearest the transport, so it
//!    sees the cross-domain signal on re-sent requests
//!
//! plus [`UserAgentPolicy`], [`RequestIdPolicy`], and [`HeadersPolicy`]
//! wherever header stamping is wanted.

mod auth;
mod custom_hook;
mod headers;
mod logging;
mod redirect;
mod retry;
mod sensitive_headers;
mod tracing;

pub use self::auth::ApiKeyPolicy;
pub use self::custom_hook::{CustomHookPolicy, RequestHook, ResponseHook};
pub use self::headers::{
    HeadersPolicy, RequestIdPolicy, UserAgentPolicy, DEFAULT_REQUEST_ID_HEADER,
    USER_AGENT_ENV_VAR,
};
pub use self::logging::{LoggingPolicy, DEFAULT_ALLOWED_HEADERS, DEFAULT_ALLOWED_QUERY_PARAMS};
pub use self::redirect::RedirectPolicy;
pub use self::retry::{is_retriable_error, is_retriable_status, RetryPolicy};
pub use self::sensitive_headers::{SensitiveHeaderCleanupPolicy, DEFAULT_SENSITIVE_HEADERS};
pub use self::tracing::{DistributedTracingPolicy, TRACEPARENT};
