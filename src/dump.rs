//! Human readable dumps of HTTP messages.
//!
//! The server side dumps incoming requests, the client side of a test can
//! dump the responses it receives. Each dump is printed to stdout between
//! a pair of begin and end markers. Server markers are green and client
//! markers are blue if the terminal supports colours; the labels differ
//! either way.

use std::fmt::Write as _;
use bytes::Bytes;
use console::style;
use hyper::{HeaderMap, Response, StatusCode, Version};
use crate::server::Request;


//------------ Server Side ---------------------------------------------------

/// Renders a request received by the mock server including its markers.
///
/// The body is only included if `print_body` is `true`.
pub fn render_server_request(req: &Request, print_body: bool) -> String {
    let mut dump = String::new();
    let target = match req.uri().path_and_query() {
        Some(target) => target.as_str(),
        None => "/",
    };
    let _ = write!(
        dump, "{} {} {}\r\n",
        req.method(), target, version_str(req.version())
    );
    write_head(&mut dump, req.headers());
    if print_body {
        dump.push_str(&String::from_utf8_lossy(req.body()));
    }
    bracket(
        &dump,
        style("server.request.begin").green(),
        style("server.request.end").green(),
    )
}

/// Dumps a request received by the mock server to stdout.
pub fn dump_server_request(req: &Request, print_body: bool) {
    println!("{}", render_server_request(req, print_body));
}


//------------ Client Side ---------------------------------------------------

/// Renders a response received by the client side of a test.
///
/// The body is only included if `print_body` is `true`.
pub fn render_client_response<B: AsRef<[u8]>>(
    res: &Response<B>, print_body: bool
) -> String {
    let mut dump = String::new();
    let _ = write!(
        dump, "{} {}\r\n",
        version_str(res.version()), status_str(res.status())
    );
    write_head(&mut dump, res.headers());
    if print_body {
        dump.push_str(&String::from_utf8_lossy(res.body().as_ref()));
    }
    bracket(
        &dump,
        style("client.response.begin").blue(),
        style("client.response.end").blue(),
    )
}

/// Dumps a response received by the client side of a test to stdout.
pub fn dump_client_response<B: AsRef<[u8]>>(
    res: &Response<B>, print_body: bool
) {
    println!("{}", render_client_response(res, print_body));
}

/// Dumps a response received through a blocking reqwest client.
///
/// Since this needs to read the body, the response is consumed. It is
/// returned with the body read into memory so the test can continue to
/// inspect it.
pub fn dump_reqwest_response(
    res: reqwest::blocking::Response, print_body: bool
) -> Result<Response<Bytes>, reqwest::Error> {
    let mut builder = Response::builder()
        .status(res.status())
        .version(res.version());
    if let Some(headers) = builder.headers_mut() {
        *headers = res.headers().clone();
    }
    let body = res.bytes()?;
    let res = builder.body(body).expect("broken HTTP response builder");
    dump_client_response(&res, print_body);
    Ok(res)
}


//------------ Helpers -------------------------------------------------------

fn bracket(
    dump: &str, begin: impl std::fmt::Display, end: impl std::fmt::Display
) -> String {
    format!("[{}]\n{}\n[{}]", begin, dump, end)
}

fn write_head(dump: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        let _ = write!(
            dump, "{}: {}\r\n",
            name, String::from_utf8_lossy(value.as_bytes())
        );
    }
    dump.push_str("\r\n");
}

/// Returns the version as it appears on the wire, e.g., `HTTP/1.1`.
fn version_str(version: Version) -> String {
    format!("{:?}", version)
}

fn status_str(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_str(), reason),
        None => status.as_str().into(),
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use hyper::Method;
    use super::*;

    fn request() -> Request {
        Request::from(
            hyper::Request::builder()
                .method(Method::POST)
                .uri("/items?kind=new")
                .header("Host", "127.0.0.1:1234")
                .body(Bytes::from_static(b"secret-body"))
                .unwrap()
        )
    }

    #[test]
    fn server_request_with_body() {
        let dump = render_server_request(&request(), true);
        assert!(dump.contains("server.request.begin"));
        assert!(dump.contains("server.request.end"));
        assert!(dump.contains("POST /items?kind=new HTTP/1.1\r\n"));
        assert!(dump.contains("host: 127.0.0.1:1234\r\n"));
        assert!(dump.contains("secret-body"));
        assert!(
            dump.find("server.request.begin").unwrap()
                < dump.find("server.request.end").unwrap()
        );
    }

    #[test]
    fn server_request_without_body() {
        let dump = render_server_request(&request(), false);
        assert!(dump.contains("POST /items?kind=new HTTP/1.1\r\n"));
        assert!(!dump.contains("secret-body"));
    }

    #[test]
    fn client_response() {
        let res = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header("Content-Type", "text/plain")
            .body("nothing here")
            .unwrap();
        let dump = render_client_response(&res, true);
        assert!(dump.contains("client.response.begin"));
        assert!(dump.contains("client.response.end"));
        assert!(dump.contains("HTTP/1.1 404 Not Found\r\n"));
        assert!(dump.contains("content-type: text/plain\r\n"));
        assert!(dump.contains("nothing here"));
        assert!(!dump.contains("server.request"));

        let dump = render_client_response(&res, false);
        assert!(!dump.contains("nothing here"));
    }
}
