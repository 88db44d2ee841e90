#![doc = include_str!("../README.md")]

pub mod error;
pub mod multipart;
pub mod options;
pub mod pipeline;
pub mod policies;
pub mod request;
pub mod response;
pub mod transport;

pub use error::{StratusError, StratusResult};
pub use options::{OptionBag, OptionValue, TracingOptions};
pub use pipeline::{Context, Pipeline, PipelineRequest, PipelineResponse};
pub use request::Request;
pub use response::RawResponse;

/// Test utilities shared across modules.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    use crate::error::{StratusError, StratusResult};
    use crate::options::OptionBag;
    use crate::pipeline::{self, blocking, PipelineRequest, PipelineResponse};
    use crate::request::Request;
    use crate::response::RawResponse;
    use crate::transport::{blocking::Transport as BlockingTransport, Transport};

    /// In-memory transport with scripted responses and atomic counters.
    ///
    /// The first `fail_times` sends fail with a transport error; after
    /// that, scripted responses are consumed in order and a plain 200 is
    /// produced once they run out.
    #[derive(Debug, Default)]
    pub(crate) struct MockTransport {
        pub sends: AtomicU32,
        pub opens: AtomicU32,
        pub closes: AtomicU32,
        fail_times: u32,
        responses: Mutex<Vec<RawResponse>>,
        pub seen_options: Mutex<Vec<OptionBag>>,
        pub seen_requests: Mutex<Vec<Request>>,
        events: Option<Arc<Mutex<Vec<String>>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(times: u32) -> Self {
            Self {
                fail_times: times,
                ..Self::default()
            }
        }

        pub fn with_responses(responses: Vec<RawResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                ..Self::default()
            }
        }

        /// Record a `transport:send` event into a shared log.
        pub fn with_events(mut self, events: Arc<Mutex<Vec<String>>>) -> Self {
            self.events = Some(events);
            self
        }

        fn do_send(&self, request: &Request, options: &OptionBag) -> StratusResult<RawResponse> {
            let attempt = self.sends.fetch_add(1, Ordering::SeqCst);
            self.seen_requests.lock().unwrap().push(request.clone());
            self.seen_options.lock().unwrap().push(options.clone());
            if let Some(events) = &self.events {
                events.lock().unwrap().push("transport:send".to_string());
            }
            if attempt < self.fail_times {
                return Err(StratusError::transport("connection reset by peer"));
            }
            let mut scripted = self.responses.lock().unwrap();
            if scripted.is_empty() {
                Ok(RawResponse::new(StatusCode::OK, HeaderMap::new(), Bytes::new()))
            } else {
                Ok(scripted.remove(0))
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(&self) -> StratusResult<()> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) -> StratusResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&self, request: &Request, options: &OptionBag) -> StratusResult<RawResponse> {
            self.do_send(request, options)
        }
    }

    impl BlockingTransport for MockTransport {
        fn open(&self) -> StratusResult<()> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self) -> StratusResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn send(&self, request: &Request, options: &OptionBag) -> StratusResult<RawResponse> {
            self.do_send(request, options)
        }
    }

    /// Pushes labeled hook events into a shared log.
    #[derive(Debug)]
    pub(crate) struct RecordingPolicy {
        label: &'static str,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingPolicy {
        pub fn new(label: &'static str, events: Arc<Mutex<Vec<String>>>) -> Self {
            Self { label, events }
        }

        fn record(&self, hook: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, hook));
        }
    }

    #[async_trait]
    impl pipeline::Policy for RecordingPolicy {
        async fn on_request(&self, _request: &mut PipelineRequest) -> StratusResult<()> {
            self.record("request");
            Ok(())
        }

        async fn on_response(
            &self,
            _request: &mut PipelineRequest,
            _response: &mut PipelineResponse,
        ) -> StratusResult<()> {
            self.record("response");
            Ok(())
        }

        async fn on_exception(&self, _request: &mut PipelineRequest, _error: &StratusError) {
            self.record("exception");
        }
    }

    impl blocking::Policy for RecordingPolicy {
        fn on_request(&self, _request: &mut PipelineRequest) -> StratusResult<()> {
            self.record("request");
            Ok(())
        }

        fn on_response(
            &self,
            _request: &mut PipelineRequest,
            _response: &mut PipelineResponse,
        ) -> StratusResult<()> {
            self.record("response");
            Ok(())
        }

        fn on_exception(&self, _request: &mut PipelineRequest, _error: &StratusError) {
            self.record("exception");
        }
    }

    /// Fails every `on_request` with a policy error.
    #[derive(Debug)]
    pub(crate) struct FailingPolicy;

    #[async_trait]
    impl pipeline::Policy for FailingPolicy {
        async fn on_request(&self, _request: &mut PipelineRequest) -> StratusResult<()> {
            Err(StratusError::policy("FailingPolicy", "refused pre-send"))
        }
    }

    impl blocking::Policy for FailingPolicy {
        fn on_request(&self, _request: &mut PipelineRequest) -> StratusResult<()> {
            Err(StratusError::policy("FailingPolicy", "refused pre-send"))
        }
    }
}
