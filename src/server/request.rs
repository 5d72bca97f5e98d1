//! Request handling.

use std::str;
use bytes::Bytes;
use hyper::{Body, Method, Uri, Version};
use hyper::header::HeaderMap;
use hyper::http::request::Parts;


//------------ Request -------------------------------------------------------

/// An inbound request as seen by a handler.
///
/// The body has already been read in full by the time a handler sees the
/// request.
#[derive(Debug)]
pub struct Request {
    head: Parts,
    body: Bytes,
}

impl Request {
    /// Creates a request from a hyper request by collecting its body.
    pub(super) async fn from_hyper(
        req: hyper::Request<Body>
    ) -> Result<Self, hyper::Error> {
        let (head, body) = req.into_parts();
        let body = hyper::body::to_bytes(body).await?;
        Ok(Request { head, body })
    }

    /// Returns the method of the request.
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// Returns the URI of the request.
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// Returns the path of the request’s URI.
    ///
    /// This is what handlers are registered under.
    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    /// Returns the query part of the URI, if there is one.
    pub fn query(&self) -> Option<&str> {
        self.head.uri.query()
    }

    /// Returns the HTTP version of the request.
    pub fn version(&self) -> Version {
        self.head.version
    }

    /// Returns the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Returns the value of a header if it is present and valid text.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns the body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        str::from_utf8(&self.body).ok()
    }
}


//--- From

impl From<hyper::Request<Bytes>> for Request {
    fn from(req: hyper::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Request { head, body }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accessors() {
        let req = Request::from(
            hyper::Request::builder()
                .method(Method::POST)
                .uri("http://127.0.0.1:8080/foo/bar?baz=1")
                .header("Content-Type", "text/plain")
                .body(Bytes::from_static(b"hello"))
                .unwrap()
        );
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/foo/bar");
        assert_eq!(req.query(), Some("baz=1"));
        assert_eq!(req.header_str("content-type"), Some("text/plain"));
        assert_eq!(req.header_str("accept"), None);
        assert_eq!(req.body_str(), Some("hello"));
    }

    #[test]
    fn binary_body() {
        let req = Request::from(
            hyper::Request::builder()
                .uri("/")
                .body(Bytes::from_static(b"\xff\xfe"))
                .unwrap()
        );
        assert_eq!(req.body().len(), 2);
        assert_eq!(req.body_str(), None);
    }
}
