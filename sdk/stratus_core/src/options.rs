//! Per-call options threaded through the pipeline.
//!
//! Every [`run`](crate::pipeline::Pipeline::run) call takes an [`OptionBag`]:
//! a string-keyed map of typed values. Policies read and write entries
//! during a call; the transport runner strips the pipeline-internal keys
//! (see [`sanitize_transport_options`]) before the bag reaches the
//! transport, which only understands wire-level options such as
//! [`keys::TIMEOUT`].

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Option keys recognized by the pipeline and its standard policies.
pub mod keys {
    /// Per-call timeout (`Duration`), honored by the transports.
    pub const TIMEOUT: &str = "timeout";

    /// Set by the redirect policy when a redirect crossed to a different
    /// host; consumed by the sensitive-header cleanup policy. Never
    /// reaches the transport.
    pub const INSECURE_DOMAIN_CHANGE: &str = "insecure_domain_change";

    /// Requests continuous-access-evaluation behavior from credential
    /// policies. Never reaches the transport.
    pub const ENABLE_CAE: &str = "enable_cae";

    /// Per-call [`TracingOptions`](super::TracingOptions) consumed by the
    /// distributed tracing policy. Never reaches the transport.
    pub const TRACING_OPTIONS: &str = "tracing_options";
}

/// The option keys removed from the bag before the transport send.
pub const TRANSPORT_INTERNAL_KEYS: [&str; 3] = [
    keys::INSECURE_DOMAIN_CHANGE,
    keys::ENABLE_CAE,
    keys::TRACING_OPTIONS,
];

/// Remove the pipeline-internal keys from `options`.
///
/// The transports do not understand these keys, so the transport runner
/// calls this immediately before delegating. Policies that consume them
/// must do so earlier in the chain.
pub fn sanitize_transport_options(options: &mut OptionBag) {
    for key in TRANSPORT_INTERNAL_KEYS {
        options.remove(key);
    }
}

/// A typed per-call option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    U64(u64),
    Duration(Duration),
    Str(String),
    Json(serde_json::Value),
    Tracing(TracingOptions),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_tracing(&self) -> Option<&TracingOptions> {
        match self {
            Self::Tracing(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<Duration> for OptionValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<serde_json::Value> for OptionValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<TracingOptions> for OptionValue {
    fn from(value: TracingOptions) -> Self {
        Self::Tracing(value)
    }
}

/// Options consumed by tracing policies, set under
/// [`keys::TRACING_OPTIONS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracingOptions {
    /// Whether client spans should be produced for this call.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Extra attributes attached to the client span.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            attributes: BTreeMap::new(),
        }
    }
}

/// A bag of per-call options.
///
/// Modeled as a small ordered map so option sets stay cheap to clone per
/// call and deterministic to log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionBag {
    values: BTreeMap<Cow<'static, str>, OptionValue>,
}

impl OptionBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Insert an option, returning the previous value for the key.
    pub fn insert(
        &mut self,
        key: impl Into<Cow<'static, str>>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Chaining form of [`insert`](Self::insert) for building option sets.
    pub fn with(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// `true` when the key holds `Bool(true)`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    pub fn duration(&self, key: &str) -> Option<Duration> {
        self.get(key).and_then(OptionValue::as_duration)
    }

    /// The per-call tracing options, if any were supplied.
    pub fn tracing_options(&self) -> Option<&TracingOptions> {
        self.get(keys::TRACING_OPTIONS).and_then(OptionValue::as_tracing)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(key, value)| (key.as_ref(), value))
    }
}
