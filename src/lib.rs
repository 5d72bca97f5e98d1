//! Test doubles for code that talks HTTP.
//!
//! This crate provides two things for integration tests. The
//! [`MockServer`] is a programmable HTTP server running in the test
//! process that answers requests with handlers registered per method and
//! path. The [`wait_for_reachable`] function blocks until a set of network
//! endpoints accept TCP connections, which is handy when tests depend on
//! services started elsewhere.
//!
//! The command line tool via `main.rs` is only a very tiny frontend for
//! the poller.

pub use self::config::Config;
pub use self::error::{ExitError, Failed};
pub use self::operation::Operation;
pub use self::server::{MockServer, Request, ResponseSink};
pub use self::wait::{Poller, Target, WaitError, wait_for_reachable};

pub mod config;
pub mod dump;
pub mod error;
pub mod log;
pub mod operation;
pub mod server;
pub mod utils;
pub mod wait;
