//! Rules on how to dispatch a request.

use std::{error, fmt};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use hyper::{Body, Method};
use log::{debug, warn};
use crate::dump;
use super::metrics::ServerMetrics;
use super::report::FailureReporter;
use super::request::Request;
use super::response::ResponseSink;


//------------ HandlerMethod -------------------------------------------------

/// The HTTP methods handlers can be registered for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HandlerMethod {
    Get,
    Post,
    Put,
}

impl HandlerMethod {
    /// Returns the handler method for an HTTP method if it is supported.
    pub fn from_method(method: &Method) -> Option<Self> {
        if *method == Method::GET {
            Some(HandlerMethod::Get)
        }
        else if *method == Method::POST {
            Some(HandlerMethod::Post)
        }
        else if *method == Method::PUT {
            Some(HandlerMethod::Put)
        }
        else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandlerMethod::Get => "GET",
            HandlerMethod::Post => "POST",
            HandlerMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HandlerMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


//------------ Handler -------------------------------------------------------

/// Produces the response for a registered method and path.
///
/// Handlers are called on a blocking worker thread, one call per request.
/// Any closure taking a response sink and a request is a handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, response: &mut ResponseSink, request: &Request);
}

impl<F> Handler for F
where F: Fn(&mut ResponseSink, &Request) + Send + Sync + 'static {
    fn handle(&self, response: &mut ResponseSink, request: &Request) {
        (self)(response, request)
    }
}


//------------ Registry ------------------------------------------------------

/// The registered handlers, keyed by method and exact path.
#[derive(Default)]
struct Registry {
    handlers: RwLock<HashMap<(HandlerMethod, String), Arc<dyn Handler>>>,
}

impl Registry {
    /// Adds a handler, replacing an earlier one for the same key.
    fn insert(
        &self, method: HandlerMethod, path: String, handler: Arc<dyn Handler>
    ) {
        let replaced = self.handlers.write().expect(
            "acquiring a poisoned rwlock"
        ).insert((method, path.clone()), handler);
        if replaced.is_some() {
            debug!("replaced {} handler for {}", method, path);
        }
    }

    /// Returns the handler for the given method and path.
    fn get(
        &self, method: HandlerMethod, path: &str
    ) -> Option<Arc<dyn Handler>> {
        self.handlers.read().expect(
            "acquiring a poisoned rwlock"
        ).get(&(method, path.to_string())).cloned()
    }

    fn len(&self) -> usize {
        self.handlers.read().expect("acquiring a poisoned rwlock").len()
    }
}


//------------ State ---------------------------------------------------------

/// Everything a request needs to be dispatched.
pub struct State {
    registry: Registry,
    reporter: Arc<dyn FailureReporter>,
    metrics: Arc<ServerMetrics>,
    dump_requests: bool,
    dump_body: bool,
}

impl State {
    pub fn new(
        dump_requests: bool,
        dump_body: bool,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        State {
            registry: Default::default(),
            reporter,
            metrics: Default::default(),
            dump_requests,
            dump_body,
        }
    }

    pub fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.metrics
    }

    pub fn register(
        &self, method: HandlerMethod, path: String, handler: Arc<dyn Handler>
    ) {
        self.registry.insert(method, path, handler)
    }

    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    /// Processes a single request.
    ///
    /// Returns an error if the connection should be dropped without
    /// sending a response.
    pub async fn handle_request(
        &self, req: hyper::Request<Body>
    ) -> Result<hyper::Response<Body>, Aborted> {
        self.metrics.inc_requests();
        let req = match Request::from_hyper(req).await {
            Ok(req) => req,
            Err(err) => {
                warn!("mock server: failed to read request: {}", err);
                return Ok(ResponseSink::internal_error(err).into_hyper())
            }
        };
        if self.dump_requests {
            dump::dump_server_request(&req, self.dump_body);
        }

        let method = match HandlerMethod::from_method(req.method()) {
            Some(method) => method,
            None => {
                let message = format!(
                    "http method not found: {}", req.method()
                );
                self.reporter.report_fatal(&message);
                return Err(Aborted(message))
            }
        };
        let handler = match self.registry.get(method, req.path()) {
            Some(handler) => handler,
            None => {
                self.reporter.report_non_fatal(&format!(
                    "could not find {} handler for: {}", method, req.path()
                ));
                return Ok(ResponseSink::new().into_hyper())
            }
        };

        debug!("mock server: dispatching {} {}", method, req.path());
        let path = req.path().to_string();
        let res = tokio::task::spawn_blocking(move || {
            let mut response = ResponseSink::new();
            handler.handle(&mut response, &req);
            response
        }).await;
        match res {
            Ok(response) => Ok(response.into_hyper()),
            Err(err) => {
                let message = format!(
                    "{} handler for {} failed: {}", method, path, err
                );
                self.reporter.report_fatal(&message);
                Err(Aborted(message))
            }
        }
    }
}


//------------ Aborted -------------------------------------------------------

/// Dispatch was stopped and the connection should be dropped.
#[derive(Clone, Debug)]
pub struct Aborted(String);

impl fmt::Display for Aborted {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl error::Error for Aborted { }


//============ Tests =========================================================
