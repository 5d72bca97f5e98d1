//! Building responses.

use std::{fmt, io};
use hyper::{Body, StatusCode};
use hyper::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use hyper::http::response::Builder;


//------------ ResponseSink --------------------------------------------------

/// The response a handler is writing.
///
/// A handler has full control over status code, headers, and body. If it
/// doesn’t touch the sink at all, the client receives a `200 OK` with an
/// empty body.
///
/// The sink implements `io::Write`, which appends to the body.
#[derive(Debug)]
pub struct ResponseSink {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseSink {
    /// Creates a new, empty `200 OK` response.
    pub fn new() -> Self {
        ResponseSink {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the status code.
    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Returns the headers written so far.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a mutable reference to the headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Sets a header, replacing any previous values.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `value` aren’t valid in a header. As these are
    /// provided by test code, this is considered a bug in the test.
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        let name = HeaderName::from_bytes(name.as_bytes()).unwrap_or_else(
            |_| panic!("invalid header name {:?}", name)
        );
        let value = HeaderValue::from_str(value).unwrap_or_else(
            |_| panic!("invalid value for header {}: {:?}", name, value)
        );
        self.headers.insert(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(&mut self, content_type: ContentType) -> &mut Self {
        self.headers.insert(
            CONTENT_TYPE, HeaderValue::from_static(content_type.0)
        );
        self
    }

    /// Returns the body written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Appends data to the body.
    pub fn write_body(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.body.extend_from_slice(data.as_ref());
        self
    }

    /// Replaces the body.
    pub fn set_body(&mut self, data: impl Into<Vec<u8>>) -> &mut Self {
        self.body = data.into();
        self
    }

    /// Creates the response for a request that couldn’t be processed.
    ///
    /// The status code is `500 Internal Server Error` and the body is the
    /// error message.
    pub(super) fn internal_error(message: impl fmt::Display) -> Self {
        let mut res = Self::new();
        res.set_status(StatusCode::INTERNAL_SERVER_ERROR)
            .content_type(ContentType::TEXT)
            .write_body(message.to_string());
        res
    }

    /// Converts the response into a hyper response.
    pub(super) fn into_hyper(self) -> hyper::Response<Body> {
        let mut builder = Builder::new().status(self.status);
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        builder.body(
            self.body.into()
        ).expect("broken HTTP response builder")
    }
}


//--- Default

impl Default for ResponseSink {
    fn default() -> Self {
        Self::new()
    }
}


//--- Write

impl io::Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}


//------------ ContentType ---------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct ContentType(&'static str);

impl ContentType {
    pub const JSON: ContentType = ContentType("application/json");
    pub const TEXT: ContentType = ContentType("text/plain;charset=utf-8");
    pub const XML: ContentType = ContentType("application/xml");

    pub const fn external(value: &'static str) -> Self {
        ContentType(value)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::io::Write;
    use super::*;

    #[test]
    fn untouched_sink() {
        let res = ResponseSink::default().into_hyper();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().is_empty());
    }

    #[test]
    fn written_sink() {
        let mut sink = ResponseSink::new();
        sink.set_status(StatusCode::CREATED)
            .content_type(ContentType::JSON)
            .set_header("X-Request-Id", "42")
            .write_body("{\"id\":");
        write!(sink, "{}}}", 42).unwrap();
        assert_eq!(sink.body(), b"{\"id\":42}");

        let res = sink.into_hyper();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(
            res.headers().get("content-type").unwrap(), "application/json"
        );
        assert_eq!(res.headers().get("x-request-id").unwrap(), "42");
    }

    #[test]
    fn replace_body_and_headers() {
        let mut sink = ResponseSink::new();
        sink.write_body("draft").set_body("<done/>")
            .content_type(ContentType::XML);
        sink.headers_mut().insert(
            hyper::header::CACHE_CONTROL,
            hyper::header::HeaderValue::from_static("no-store")
        );
        assert_eq!(sink.body(), b"<done/>");
        assert_eq!(sink.headers().len(), 2);

        let res = sink.into_hyper();
        assert_eq!(
            res.headers().get("content-type").unwrap(), "application/xml"
        );
        assert_eq!(res.headers().get("cache-control").unwrap(), "no-store");
    }

    #[test]
    fn external_content_type() {
        const CSV: ContentType = ContentType::external("text/csv");
        let mut sink = ResponseSink::new();
        sink.content_type(CSV).content_type(CSV);
        let res = sink.into_hyper();
        assert_eq!(res.headers().get_all("content-type").iter().count(), 1);
        assert_eq!(res.headers().get("content-type").unwrap(), "text/csv");
    }

    #[test]
    fn internal_error() {
        let sink = ResponseSink::internal_error("broken body");
        assert_eq!(sink.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(sink.body(), b"broken body");
    }

    #[test]
    #[should_panic]
    fn bad_header_name() {
        ResponseSink::new().set_header("bad header", "value");
    }
}
