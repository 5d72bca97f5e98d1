//! The HTTP listener.

use std::io;
use std::convert::Infallible;
use std::net::TcpListener as StdListener;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use futures::ready;
use hyper::Server;
use hyper::server::accept::Accept;
use hyper::service::{make_service_fn, service_fn};
use log::{debug, error};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use super::dispatch::State;
use super::metrics::ServerMetrics;


//------------ serve ---------------------------------------------------------

/// Serves requests on `listener` until `shutdown` fires.
///
/// The listener must already be in nonblocking mode. When the future
/// resolves, the listening socket has been closed. Connections that are
/// still open are left to the runtime, which should be shut down next.
pub async fn serve(
    listener: StdListener,
    state: Arc<State>,
    shutdown: oneshot::Receiver<()>,
) {
    let make_service = make_service_fn(|_conn| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                async move {
                    state.handle_request(req).await
                }
            }))
        }
    });
    let listener = CountingListener {
        sock: match TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(err) => {
                error!("mock server: cannot use listener: {}", err);
                return
            }
        },
        metrics: state.metrics().clone(),
    };
    let server = Server::builder(listener).http1_only(true).serve(
        make_service
    );
    tokio::select! {
        res = server => {
            if let Err(err) = res {
                error!("HTTP server error: {}", err);
            }
        }
        _ = shutdown => {
            debug!("mock server shutting down");
        }
    }
}


//------------ Counting Sockets ----------------------------------------------

/// A listener that records accepted connections in the server metrics.
struct CountingListener {
    sock: TcpListener,
    metrics: Arc<ServerMetrics>,
}

impl Accept for CountingListener {
    type Conn = CountingStream;
    type Error = io::Error;

    fn poll_accept(
        self: Pin<&mut Self>,
        cx: &mut Context
    ) -> Poll<Option<Result<Self::Conn, Self::Error>>> {
        let (sock, addr) = ready!(self.sock.poll_accept(cx))?;
        debug!("mock server: connection from {}", addr);
        Poll::Ready(Some(Ok(CountingStream::new(sock, self.metrics.clone()))))
    }
}


/// A connection that records traffic in the server metrics.
///
/// The connection counts as closed once the stream is dropped.
struct CountingStream {
    sock: TcpStream,
    metrics: Arc<ServerMetrics>,
}

impl CountingStream {
    fn new(sock: TcpStream, metrics: Arc<ServerMetrics>) -> Self {
        metrics.inc_conn_open();
        CountingStream { sock, metrics }
    }
}

impl AsyncRead for CountingStream {
    fn poll_read(
        mut self: Pin<&mut Self>, cx: &mut Context, buf: &mut ReadBuf
    ) -> Poll<Result<(), io::Error>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.sock).poll_read(cx, buf))?;
        self.metrics.inc_bytes_read((buf.filled().len() - before) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for CountingStream {
    fn poll_write(
        mut self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]
    ) -> Poll<Result<usize, io::Error>> {
        let written = ready!(Pin::new(&mut self.sock).poll_write(cx, buf))?;
        self.metrics.inc_bytes_written(written as u64);
        Poll::Ready(Ok(written))
    }

    fn poll_flush(
        mut self: Pin<&mut Self>, cx: &mut Context
    ) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.sock).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>, cx: &mut Context
    ) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.sock).poll_shutdown(cx)
    }
}

impl Drop for CountingStream {
    fn drop(&mut self) {
        self.metrics.inc_conn_close()
    }
}
