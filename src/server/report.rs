//! Reporting test failures detected by the server.
//!
//! The mock server runs on its own threads, so it can’t fail the test that
//! owns it directly. Instead, it reports what went wrong to a
//! [`FailureReporter`]. The default reporter, [`FailureLog`], keeps the
//! failures until the test collects them; the server checks the log when
//! it is dropped.

use std::fmt;
use log::error;
use std::sync::Mutex;


//------------ FailureReporter -----------------------------------------------

/// Something that receives the failures detected while serving requests.
pub trait FailureReporter: Send + Sync + 'static {
    /// Reports a failure after which the test may continue.
    fn report_non_fatal(&self, message: &str);

    /// Reports a failure that should end the test.
    fn report_fatal(&self, message: &str);
}


//------------ Failure -------------------------------------------------------

/// A single recorded failure.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Failure {
    /// Whether the failure should have ended the test.
    pub fatal: bool,

    /// What went wrong.
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.fatal {
            write!(f, "fatal: {}", self.message)
        }
        else {
            f.write_str(&self.message)
        }
    }
}


//------------ FailureLog ----------------------------------------------------

/// A reporter that keeps all failures in memory.
#[derive(Debug, Default)]
pub struct FailureLog {
    failures: Mutex<Vec<Failure>>,
}

impl FailureLog {
    fn push(&self, fatal: bool, message: &str) {
        error!("mock server: {}", message);
        self.failures.lock().expect("acquiring a poisoned mutex").push(
            Failure { fatal, message: message.into() }
        );
    }

    /// Returns a copy of the failures recorded so far.
    pub fn failures(&self) -> Vec<Failure> {
        self.failures.lock().expect("acquiring a poisoned mutex").clone()
    }

    /// Removes and returns all recorded failures.
    pub fn take(&self) -> Vec<Failure> {
        std::mem::take(
            &mut *self.failures.lock().expect("acquiring a poisoned mutex")
        )
    }

    /// Returns whether any failures have been recorded.
    pub fn is_empty(&self) -> bool {
        self.failures.lock().expect("acquiring a poisoned mutex").is_empty()
    }

    /// Panics if any failures have been recorded.
    ///
    /// The failures are removed before panicking, so a second call will
    /// succeed.
    pub fn verify(&self) {
        let failures = self.take();
        if failures.is_empty() {
            return
        }
        let mut message = format!(
            "mock server recorded {} failure(s):", failures.len()
        );
        for failure in &failures {
            message.push_str("\n  ");
            message.push_str(&failure.to_string());
        }
        panic!("{}", message)
    }
}

impl FailureReporter for FailureLog {
    fn report_non_fatal(&self, message: &str) {
        self.push(false, message)
    }

    fn report_fatal(&self, message: &str) {
        self.push(true, message)
    }
}


//============ Tests =========================================================
