//! Multipart sub-request bundles.
//!
//! A request may carry a bundle of independent sub-requests. Before the
//! main chain runs, the pipeline *prepares* the bundle: every sub-policy's
//! `on_request` hook is applied to every part (concurrently, under a
//! bounded worker count), nested bundles are prepared recursively, and the
//! parts are then serialized into a composite `multipart/mixed` body on
//! the parent request. This is a distinct pre-processing phase, not part
//! of the per-request chain.
//!
//! Preparation hooks are sans-IO header/body mutation, so the bundle
//! carries blocking simple policies and both pipeline flavors run them
//! inline.

use std::fmt;
use std::sync::Arc;

use bytes::BytesMut;
use futures::stream::{self, TryStreamExt};
use reqwest::header::{HeaderValue, CONTENT_TYPE};

use crate::error::{StratusError, StratusResult};
use crate::pipeline::blocking;
use crate::pipeline::{Context, PipelineRequest};
use crate::request::Request;

/// Default bound on concurrent sub-request preparation workers.
///
/// Raise it per bundle via [`MultipartMixed::concurrency`] when preparing
/// many parts.
pub const DEFAULT_MULTIPART_CONCURRENCY: usize = 4;

/// A bundle of sub-requests attached to a composite request.
#[derive(Clone)]
pub struct MultipartMixed {
    parts: Vec<Request>,
    policies: Vec<Arc<dyn blocking::Policy>>,
    options: crate::options::OptionBag,
    concurrency: usize,
}

impl MultipartMixed {
    pub fn new(parts: Vec<Request>) -> Self {
        Self {
            parts,
            policies: Vec::new(),
            options: crate::options::OptionBag::new(),
            concurrency: DEFAULT_MULTIPART_CONCURRENCY,
        }
    }

    /// Append a policy whose `on_request` hook runs against every part.
    pub fn policy(mut self, policy: Arc<dyn blocking::Policy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Options for the per-part preparation contexts.
    pub fn options(mut self, options: crate::options::OptionBag) -> Self {
        self.options = options;
        self
    }

    /// Bound the number of concurrent preparation workers (minimum 1).
    pub fn concurrency(mut self, bound: usize) -> Self {
        self.concurrency = bound.max(1);
        self
    }

    pub fn parts(&self) -> &[Request] {
        &self.parts
    }
}

impl fmt::Debug for MultipartMixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartMixed")
            .field("parts", &self.parts.len())
            .field("policies", &self.policies.len())
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

/// Prepare and serialize `request`'s bundle, if it has one (blocking).
pub(crate) fn prepare(request: &mut Request) -> StratusResult<()> {
    let Some(mut bundle) = request.take_multipart() else {
        return Ok(());
    };
    prepare_parts(&mut bundle)?;
    serialize(request, &bundle)
}

/// Prepare and serialize `request`'s bundle, if it has one (async flavor).
pub(crate) async fn prepare_async(request: &mut Request) -> StratusResult<()> {
    let Some(mut bundle) = request.take_multipart() else {
        return Ok(());
    };
    prepare_parts_async(&mut bundle).await?;
    serialize(request, &bundle)
}

/// Apply every sub-policy's `on_request` to one part, recursing into a
/// nested bundle first so the part's composite body exists before the
/// outer hooks see it.
fn prepare_part(
    part: &mut Request,
    policies: &[Arc<dyn blocking::Policy>],
    options: &crate::options::OptionBag,
) -> StratusResult<()> {
    if part.multipart().is_some() {
        prepare(part)?;
    }

    // Preparation contexts carry no transport: nothing is sent here.
    let context = Context::new(options.clone());
    let mut pipeline_request = PipelineRequest {
        request: part.clone(),
        context,
    };
    for policy in policies {
        policy.on_request(&mut pipeline_request)?;
    }
    *part = pipeline_request.request;
    Ok(())
}

fn prepare_parts(bundle: &mut MultipartMixed) -> StratusResult<()> {
    if bundle.parts.is_empty() {
        return Ok(());
    }

    let MultipartMixed {
        parts,
        policies,
        options,
        concurrency,
    } = &mut *bundle;
    let policies = policies.as_slice();
    let options = &*options;

    let workers = (*concurrency).min(parts.len()).max(1);
    let chunk_len = parts.len().div_ceil(workers);

    std::thread::scope(|scope| {
        let handles: Vec<_> = parts
            .chunks_mut(chunk_len)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter_mut()
                        .try_for_each(|part| prepare_part(part, policies, options))
                })
            })
            .collect();

        for handle in handles {
            handle
                .join()
                .map_err(|_| StratusError::multipart("preparation worker panicked"))??;
        }
        Ok(())
    })
}

async fn prepare_parts_async(bundle: &mut MultipartMixed) -> StratusResult<()> {
    if bundle.parts.is_empty() {
        return Ok(());
    }

    let MultipartMixed {
        parts,
        policies,
        options,
        concurrency,
    } = &mut *bundle;
    let policies = policies.as_slice();
    let options = &*options;
    let limit = (*concurrency).max(1);

    stream::iter(parts.iter_mut().map(Ok::<_, StratusError>))
        .try_for_each_concurrent(Some(limit), |part| async move {
            prepare_part(part, policies, options)
        })
        .await
}

/// Serialize the prepared parts into a `multipart/mixed` body on the
/// composite request and set its content type.
fn serialize(request: &mut Request, bundle: &MultipartMixed) -> StratusResult<()> {
    let boundary = format!("batch_{:032x}", fastrand::u128(..));
    let mut body = BytesMut::new();

    for (index, part) in bundle.parts.iter().enumerate() {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/http\r\n");
        body.extend_from_slice(b"Content-Transfer-Encoding: binary\r\n");
        body.extend_from_slice(format!("Content-ID: {index}\r\n\r\n").as_bytes());

        body.extend_from_slice(
            format!("{} {} HTTP/1.1\r\n", part.method(), part.url()).as_bytes(),
        );
        for (name, value) in part.headers() {
            body.extend_from_slice(name.as_str().as_bytes());
            body.extend_from_slice(b": ");
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.body());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let content_type = HeaderValue::from_str(&format!("multipart/mixed; boundary={boundary}"))
        .map_err(|err| StratusError::multipart(err.to_string()))?;
    request.headers_mut().insert(CONTENT_TYPE, content_type);
    request.set_body(body.freeze());
    Ok(())
}
