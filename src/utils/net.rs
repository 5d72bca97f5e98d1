//! Utility functions related to networking.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdListener};
use log::error;
use crate::error::Failed;


/// Binds a nonblocking listener to an ephemeral port on localhost.
///
/// The operating system picks the port, so tests can run in parallel
/// without stepping on each other. Use `local_addr` on the result to learn
/// where it ended up.
pub fn bind_ephemeral() -> Result<StdListener, Failed> {
    bind(&SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
}

/// Binds a nonblocking listener to the given address.
pub fn bind(addr: &SocketAddr) -> Result<StdListener, Failed> {
    let listener = match StdListener::bind(addr) {
        Ok(listener) => listener,
        Err(err) => {
            error!("Fatal error listening on {}: {}", addr, err);
            return Err(Failed);
        }
    };
    if let Err(err) = listener.set_nonblocking(true) {
        error!("Fatal: error switching {} to nonblocking: {}", addr, err);
        return Err(Failed);
    }
    Ok(listener)
}


//============ Tests =========================================================
