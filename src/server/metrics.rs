//! Counters kept by the mock server.
//!
//! Tests can use them to check how a client under test talks to the
//! server, e.g., whether it reuses connections.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};


//------------ ServerMetrics -------------------------------------------------

/// Traffic seen by a mock server since it was started.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    conn_open: AtomicU64,
    conn_close: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    requests: AtomicU64,
}

impl ServerMetrics {
    /// Returns the number of connections accepted.
    pub fn conn_open(&self) -> u64 {
        self.conn_open.load(Ordering::Relaxed)
    }

    /// Returns the number of connections that have been closed.
    pub fn conn_close(&self) -> u64 {
        self.conn_close.load(Ordering::Relaxed)
    }

    /// Returns the number of connections currently open.
    pub fn conn_current(&self) -> u64 {
        self.conn_open().saturating_sub(self.conn_close())
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of requests received, dispatched or not.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub(super) fn inc_conn_open(&self) {
        self.conn_open.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_conn_close(&self) {
        self.conn_close.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn inc_bytes_read(&self, count: u64) {
        self.bytes_read.fetch_add(count, Ordering::Relaxed);
    }

    pub(super) fn inc_bytes_written(&self, count: u64) {
        self.bytes_written.fetch_add(count, Ordering::Relaxed);
    }

    pub(super) fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}


//--- Display

impl fmt::Display for ServerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f,
            "{} connection(s), {} request(s), \
             {} byte(s) read, {} byte(s) written",
            self.conn_open(), self.requests(),
            self.bytes_read(), self.bytes_written()
        )
    }
}


//============ Tests =========================================================
