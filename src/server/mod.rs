//! The mock HTTP server.
//!
//! A [`MockServer`] listens on an ephemeral port on localhost and answers
//! requests with handlers registered by the test. Handlers are looked up
//! by method and exact path. Only GET, POST, and PUT are supported.
//!
//! Problems are reported as test failures rather than HTTP errors: a
//! request for a path without a handler is a non-fatal failure and gets an
//! empty `200 OK`, a request with any other method is a fatal failure and
//! its connection is dropped without a response. By default, failures are
//! collected in a [`FailureLog`] and the server panics when it is dropped
//! while the log still contains failures, thus failing the test.
//!
//! ```no_run
//! use httpstub::server::{MockServer, Request, ResponseSink};
//!
//! let server = MockServer::new(false, false);
//! server.get("/health", |res: &mut ResponseSink, _: &Request| {
//!     res.write_body("ok");
//! });
//! let body = reqwest::blocking::get(server.url_for("/health"))
//!     .unwrap().text().unwrap();
//! assert_eq!(body, "ok");
//! ```

pub use self::dispatch::{Handler, HandlerMethod};
pub use self::metrics::ServerMetrics;
pub use self::report::{Failure, FailureLog, FailureReporter};
pub use self::request::Request;
pub use self::response::{ContentType, ResponseSink};

mod dispatch;
mod listener;
mod metrics;
mod report;
mod request;
mod response;

use std::thread;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use log::{error, info};
use tokio::runtime;
use tokio::sync::oneshot;
use crate::config::Config;
use crate::utils::net::bind_ephemeral;
use self::dispatch::State;


/// How long to wait for connections to finish when closing the server.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// The number of runtime threads serving connections.
const WORKER_THREADS: usize = 2;


//------------ MockServer ----------------------------------------------------

/// A programmable HTTP server standing in for a remote dependency.
pub struct MockServer {
    /// The address the server is listening on.
    addr: SocketAddr,

    /// The base URL of the server, without a trailing slash.
    base_url: String,

    /// The state shared with the request handling tasks.
    state: Arc<State>,

    /// The default failure reporter if no other reporter was given.
    failures: Option<Arc<FailureLog>>,

    /// The serving thread if the server hasn’t been closed yet.
    running: Option<Running>,
}

/// The parts needed to stop a running server.
struct Running {
    shutdown: oneshot::Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl MockServer {
    /// Starts a new server.
    ///
    /// If `dump_requests` is `true`, every incoming request is dumped to
    /// stdout, including the body if `dump_body` is `true` as well.
    /// Failures are collected in a [`FailureLog`].
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started. A test can’t do anything
    /// sensible without its mock server.
    pub fn new(dump_requests: bool, dump_body: bool) -> Self {
        let failures = Arc::new(FailureLog::default());
        let mut res = Self::start(
            dump_requests, dump_body, failures.clone()
        );
        res.failures = Some(failures);
        res
    }

    /// Starts a new server using the dump settings from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.dump_requests, config.dump_body)
    }

    /// Starts a new server reporting failures to `reporter`.
    ///
    /// The server will not check for failures when dropped, this is left
    /// to the reporter.
    pub fn with_reporter(
        dump_requests: bool,
        dump_body: bool,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self::start(dump_requests, dump_body, reporter)
    }

    fn start(
        dump_requests: bool,
        dump_body: bool,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        let sock = match bind_ephemeral() {
            Ok(sock) => sock,
            Err(_) => panic!("mock server failed to bind to localhost"),
        };
        let addr = match sock.local_addr() {
            Ok(addr) => addr,
            Err(err) => panic!("mock server has no local address: {}", err),
        };
        let runtime = match runtime::Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .thread_name("httpstub-worker")
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => panic!("mock server failed to create runtime: {}", err),
        };
        let state = Arc::new(State::new(dump_requests, dump_body, reporter));
        let (tx, rx) = oneshot::channel();
        let thread = {
            let state = state.clone();
            thread::Builder::new().name("httpstub-server".into()).spawn(
                move || {
                    runtime.block_on(listener::serve(sock, state, rx));
                    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
                }
            )
        };
        let thread = match thread {
            Ok(thread) => thread,
            Err(err) => panic!("mock server failed to spawn thread: {}", err),
        };
        info!("mock server listening on {}", addr);
        MockServer {
            addr,
            base_url: format!("http://{}", addr),
            state,
            failures: None,
            running: Some(Running { shutdown: tx, thread }),
        }
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the base URL of the server.
    ///
    /// This is of the form `http://127.0.0.1:<port>` without a trailing
    /// slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the URL for the given path.
    ///
    /// The path is simply appended to the base URL, so it should start
    /// with a slash.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Registers a handler for the given method and path.
    ///
    /// A handler previously registered for the same method and path is
    /// replaced. Handlers can be registered while the server is serving.
    pub fn register(
        &self,
        method: HandlerMethod,
        path: impl Into<String>,
        handler: impl Handler,
    ) {
        self.state.register(method, path.into(), Arc::new(handler))
    }

    /// Registers a handler for GET requests to `path`.
    pub fn get<F>(&self, path: impl Into<String>, handler: F)
    where F: Fn(&mut ResponseSink, &Request) + Send + Sync + 'static {
        self.register(HandlerMethod::Get, path, handler)
    }

    /// Registers a handler for POST requests to `path`.
    pub fn post<F>(&self, path: impl Into<String>, handler: F)
    where F: Fn(&mut ResponseSink, &Request) + Send + Sync + 'static {
        self.register(HandlerMethod::Post, path, handler)
    }

    /// Registers a handler for PUT requests to `path`.
    pub fn put<F>(&self, path: impl Into<String>, handler: F)
    where F: Fn(&mut ResponseSink, &Request) + Send + Sync + 'static {
        self.register(HandlerMethod::Put, path, handler)
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.state.handler_count()
    }

    /// Returns the server’s counters.
    pub fn metrics(&self) -> &ServerMetrics {
        self.state.metrics()
    }

    /// Returns the number of requests the server has received.
    pub fn request_count(&self) -> u64 {
        self.state.metrics().requests()
    }

    /// Returns a copy of the failures recorded so far.
    ///
    /// If the server was created with a custom reporter, this is always
    /// empty.
    pub fn failures(&self) -> Vec<Failure> {
        match self.failures.as_ref() {
            Some(failures) => failures.failures(),
            None => Vec::new(),
        }
    }

    /// Removes and returns the failures recorded so far.
    ///
    /// Use this when a test expects failures to happen.
    pub fn take_failures(&self) -> Vec<Failure> {
        match self.failures.as_ref() {
            Some(failures) => failures.take(),
            None => Vec::new(),
        }
    }

    /// Panics if any failures have been recorded.
    pub fn verify(&self) {
        if let Some(failures) = self.failures.as_ref() {
            failures.verify()
        }
    }

    /// Stops the server.
    ///
    /// Once this returns, the listening socket is closed and new
    /// connections are refused. Calling it again does nothing.
    pub fn close(&mut self) {
        let running = match self.running.take() {
            Some(running) => running,
            None => return
        };
        // The receiver only goes away if the serving thread has ended
        // already, so a failed send can be ignored.
        let _ = running.shutdown.send(());
        if running.thread.join().is_err() {
            error!("mock server on {}: serving thread panicked", self.addr);
        }
        info!("mock server on {} closed: {}", self.addr, self.metrics());
    }
}


//--- Drop

impl Drop for MockServer {
    fn drop(&mut self) {
        self.close();
        if !thread::panicking() {
            self.verify()
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use std::io::{Read, Write};
    use std::net::{Shutdown, TcpStream};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use hyper::StatusCode;
    use reqwest::blocking::Client;
    use super::*;

    fn client() -> Client {
        Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<(bool, String)>>);

    impl FailureReporter for Collect {
        fn report_non_fatal(&self, message: &str) {
            self.0.lock().unwrap().push((false, message.into()))
        }

        fn report_fatal(&self, message: &str) {
            self.0.lock().unwrap().push((true, message.into()))
        }
    }

    #[test]
    fn url_for() {
        let server = MockServer::new(false, false);
        let port = server.addr().port();
        assert_eq!(
            server.base_url(), format!("http://127.0.0.1:{}", port)
        );
        assert_eq!(
            server.url_for("/foo?bar=1"),
            format!("http://127.0.0.1:{}/foo?bar=1", port)
        );
        assert_eq!(server.url_for(""), server.base_url());
    }

    #[test]
    fn get_invokes_handler_once() {
        let server = MockServer::new(false, false);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        server.get("/foo", move |res: &mut ResponseSink, req: &Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(req.query(), Some("x=1"));
            res.content_type(ContentType::TEXT).write_body("foo");
        });

        let res = client().get(server.url_for("/foo?x=1")).send().unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("content-type").unwrap(),
            "text/plain;charset=utf-8"
        );
        assert_eq!(res.text().unwrap(), "foo");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.request_count(), 1);
        server.verify();
    }

    #[test]
    fn unregistered_path_is_non_fatal() {
        let server = MockServer::new(false, false);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        server.get("/foo", move |_: &mut ResponseSink, _: &Request| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let res = client().get(server.url_for("/bar")).send().unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().unwrap(), "");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            server.take_failures(),
            vec![Failure {
                fatal: false,
                message: "could not find GET handler for: /bar".into(),
            }]
        );
    }

    #[test]
    fn unsupported_method_is_fatal() {
        let server = MockServer::new(false, false);
        server.get("/foo", |_: &mut ResponseSink, _: &Request| { });

        let res = client().delete(server.url_for("/foo")).send();
        assert!(res.is_err());
        assert_eq!(
            server.take_failures(),
            vec![Failure {
                fatal: true,
                message: "http method not found: DELETE".into(),
            }]
        );
    }

    #[test]
    fn post_and_put() {
        let server = MockServer::new(true, true);
        server.post("/items", |res: &mut ResponseSink, req: &Request| {
            res.set_status(StatusCode::CREATED)
                .set_header("Location", "/items/1")
                .write_body(req.body().clone());
        });
        server.put("/items/1", |res: &mut ResponseSink, req: &Request| {
            res.set_status(StatusCode::NO_CONTENT);
            assert_eq!(req.body_str(), Some("updated"));
        });
        assert_eq!(server.handler_count(), 2);

        let client = client();
        let res = client.post(server.url_for("/items"))
            .body("created").send().unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers().get("location").unwrap(), "/items/1");
        assert_eq!(res.text().unwrap(), "created");

        let res = client.put(server.url_for("/items/1"))
            .body("updated").send().unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        // Same path, other method.
        let res = client.get(server.url_for("/items")).send().unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(server.take_failures().len(), 1);
    }

    #[test]
    fn last_registration_wins() {
        let server = MockServer::new(false, false);
        server.get("/v", |res: &mut ResponseSink, _: &Request| {
            res.write_body("one");
        });
        server.get("/v", |res: &mut ResponseSink, _: &Request| {
            res.write_body("two");
        });
        assert_eq!(server.handler_count(), 1);
        let res = client().get(server.url_for("/v")).send().unwrap();
        assert_eq!(res.text().unwrap(), "two");
    }

    #[test]
    fn register_while_serving() {
        let server = Arc::new(MockServer::new(false, false));
        let client = client();
        let res = client.get(server.url_for("/late")).send().unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(server.take_failures().len(), 1);

        let registrar = server.clone();
        thread::spawn(move || {
            registrar.get("/late", |res: &mut ResponseSink, _: &Request| {
                res.set_status(StatusCode::ACCEPTED);
            });
        }).join().unwrap();

        let res = client.get(server.url_for("/late")).send().unwrap();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn dump_client_side() {
        let server = MockServer::new(false, false);
        server.get("/dump", |res: &mut ResponseSink, _: &Request| {
            res.write_body("dumped");
        });
        let res = client().get(server.url_for("/dump")).send().unwrap();
        let res = crate::dump::dump_reqwest_response(res, true).unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"dumped");
    }

    #[test]
    fn custom_reporter() {
        let collect = Arc::new(Collect::default());
        let server = MockServer::with_reporter(
            false, false, collect.clone()
        );
        let _ = client().get(server.url_for("/missing")).send().unwrap();
        assert!(client().patch(server.url_for("/missing")).send().is_err());
        assert_eq!(
            *collect.0.lock().unwrap(),
            vec![
                (false, "could not find GET handler for: /missing".into()),
                (true, "http method not found: PATCH".into()),
            ]
        );
        assert!(server.failures().is_empty());
    }

    #[test]
    fn close_releases_listener() {
        let mut server = MockServer::new(false, false);
        server.get("/", |_: &mut ResponseSink, _: &Request| { });
        let addr = server.addr();
        assert!(TcpStream::connect(addr).is_ok());
        server.close();
        assert!(TcpStream::connect(addr).is_err());
        server.close();
    }

    #[test]
    fn connection_metrics() {
        let mut server = MockServer::new(false, false);
        server.get("/count", |res: &mut ResponseSink, _: &Request| {
            res.write_body("counted");
        });
        let client = client();
        for _ in 0..3 {
            let res = client.get(server.url_for("/count")).send().unwrap();
            assert_eq!(res.text().unwrap(), "counted");
        }
        let metrics = server.metrics();
        assert_eq!(metrics.requests(), 3);
        assert!(metrics.conn_open() >= 1);
        assert!(metrics.conn_open() <= 3);
        assert!(metrics.bytes_read() > 0);
        assert!(metrics.bytes_written() > 0);

        server.close();
        let metrics = server.metrics();
        assert_eq!(metrics.conn_close(), metrics.conn_open());
        assert_eq!(metrics.conn_current(), 0);
    }

    #[test]
    fn truncated_body_is_not_dispatched() {
        let server = MockServer::new(true, true);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        server.post("/echo", move |_: &mut ResponseSink, _: &Request| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut sock = TcpStream::connect(server.addr()).unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        sock.write_all(
            b"POST /echo HTTP/1.1\r\n\
              Host: localhost\r\n\
              Content-Length: 100\r\n\
              \r\n\
              short"
        ).unwrap();
        sock.shutdown(Shutdown::Write).unwrap();
        let mut response = Vec::new();
        let _ = sock.read_to_end(&mut response);
        let response = String::from_utf8_lossy(&response);

        // The connection may be gone before the response is written.
        if !response.is_empty() {
            assert!(response.starts_with("HTTP/1.1 500"), "{}", response);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(server.take_failures().is_empty());
    }

    #[test]
    #[should_panic(expected = "could not find GET handler for: /nope")]
    fn drop_with_failures_panics() {
        let server = MockServer::new(false, false);
        let _ = client().get(server.url_for("/nope")).send();
    }
}
