//! The outbound HTTP request type.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

use crate::error::StratusResult;
use crate::multipart::MultipartMixed;

/// An outbound HTTP request.
///
/// Owned by the caller until handed to [`run`](crate::pipeline::Pipeline::run);
/// policies may mutate it during pre-send processing (header injection,
/// URL rewriting for redirects). Cloning is cheap: the body is [`Bytes`].
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
    multipart: Option<MultipartMixed>,
}

impl Request {
    /// Create a request with an empty body and no headers.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            multipart: None,
        }
    }

    /// Create a GET request from a URL string.
    pub fn get(url: impl AsRef<str>) -> StratusResult<Self> {
        Ok(Self::new(Method::GET, Url::parse(url.as_ref())?))
    }

    /// Create a POST request from a URL string.
    pub fn post(url: impl AsRef<str>) -> StratusResult<Self> {
        Ok(Self::new(Method::POST, Url::parse(url.as_ref())?))
    }

    /// Create a PUT request from a URL string.
    pub fn put(url: impl AsRef<str>) -> StratusResult<Self> {
        Ok(Self::new(Method::PUT, Url::parse(url.as_ref())?))
    }

    /// Create a DELETE request from a URL string.
    pub fn delete(url: impl AsRef<str>) -> StratusResult<Self> {
        Ok(Self::new(Method::DELETE, Url::parse(url.as_ref())?))
    }

    /// Create a HEAD request from a URL string.
    pub fn head(url: impl AsRef<str>) -> StratusResult<Self> {
        Ok(Self::new(Method::HEAD, Url::parse(url.as_ref())?))
    }

    /// Create a PATCH request from a URL string.
    pub fn patch(url: impl AsRef<str>) -> StratusResult<Self> {
        Ok(Self::new(Method::PATCH, Url::parse(url.as_ref())?))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Insert a header, parsing the name and value from strings.
    pub fn insert_header(
        &mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> StratusResult<()> {
        let name = HeaderName::from_bytes(name.as_ref().as_bytes())?;
        let value = HeaderValue::from_str(value.as_ref())?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Serialize `payload` as the JSON body and set the content type.
    pub fn set_json<T: serde::Serialize>(&mut self, payload: &T) -> StratusResult<()> {
        self.body = Bytes::from(serde_json::to_vec(payload)?);
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(())
    }

    /// Attach a multipart sub-request bundle.
    ///
    /// The pipeline prepares and serializes the bundle into this request's
    /// body at the start of `run`; see [`crate::multipart`].
    pub fn set_multipart_mixed(&mut self, multipart: MultipartMixed) {
        self.multipart = Some(multipart);
    }

    pub fn multipart(&self) -> Option<&MultipartMixed> {
        self.multipart.as_ref()
    }

    pub(crate) fn take_multipart(&mut self) -> Option<MultipartMixed> {
        self.multipart.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_parses_url() {
        let request = Request::get("https://api.example.com/v1/things?limit=5").expect("valid url");
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url().path(), "/v1/things");
        assert_eq!(request.url().query(), Some("limit=5"));
        assert!(request.body().is_empty());
    }

    #[test]
    fn invalid_url_is_an_error() {
        let result = Request::get("not a url");
        assert!(matches!(result, Err(crate::StratusError::Url(_))));
    }

    #[test]
    fn insert_header_parses_strings() {
        let mut request = Request::get("https://api.example.com/").expect("valid url");
        request
            .insert_header("x-client-request-id", "abc123")
            .expect("valid header");
        assert_eq!(
            request.headers().get("x-client-request-id").unwrap(),
            "abc123"
        );
    }

    #[test]
    fn insert_header_rejects_invalid_value() {
        let mut request = Request::get("https://api.example.com/").expect("valid url");
        let result = request.insert_header("x-bad", "line\nbreak");
        assert!(matches!(result, Err(crate::StratusError::Header(_))));
    }

    #[test]
    fn set_json_sets_body_and_content_type() {
        let mut request = Request::post("https://api.example.com/v1/things").expect("valid url");
        request
            .set_json(&serde_json::json!({"name": "thing-1"}))
            .expect("serializable");

        assert_eq!(
            request.headers().get(reqwest::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body: serde_json::Value = serde_json::from_slice(request.body()).unwrap();
        assert_eq!(body["name"], "thing-1");
    }
}
