//! Waiting for network endpoints to become reachable.
//!
//! Test suites that talk to external services, e.g., databases started in
//! containers, need to wait until those services accept connections. The
//! [`Poller`] does this by trying to open a TCP connection to every target
//! once per interval until all targets accept a connection in the same
//! round or the maximum number of rounds has been used up.

use std::{error, fmt, panic, thread};
use std::str::FromStr;
use std::time::Duration;
use hyper::Uri;
use log::{debug, info};
use tokio::net::TcpStream;
use tokio::runtime;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use crate::config::Config;


/// The shortest interval between rounds we allow.
///
/// Tokio refuses to create an interval with a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// The shortest timeout for a single connection attempt we allow.
///
/// A zero timeout would expire before any connection could complete.
const MIN_DIAL_TIMEOUT: Duration = Duration::from_millis(1);


//------------ wait_for_reachable --------------------------------------------

/// Waits until all targets are reachable using the default settings.
///
/// Each target is a URL from which the host and port are taken. If the URL
/// has no port, the default port of the scheme is used. A round of
/// connection attempts happens once a second, the first one a second after
/// the call. At most `max_attempts` rounds are made.
///
/// Returns `WaitError::MalformedTarget` without attempting any connection
/// if a target can’t be parsed and `WaitError::ReachabilityTimeout` if the
/// rounds are exhausted.
///
/// This blocks the current thread. Within an asynchronous runtime, other
/// tasks on that thread are stalled while waiting, so prefer
/// [`Poller::wait`] there.
pub fn wait_for_reachable<S: AsRef<str>>(
    targets: &[S], max_attempts: u64
) -> Result<(), WaitError> {
    Poller::default().wait_for_reachable(targets, max_attempts)
}


//------------ Target --------------------------------------------------------

/// A network endpoint to wait for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Target {
    /// The original string.
    raw: String,

    /// The scheme of the URL, if there was one.
    scheme: Option<String>,

    /// The host name or address without any IPv6 brackets.
    host: String,

    /// The port to connect to.
    port: u16,
}

impl Target {
    /// Parses a target from a URL.
    pub fn parse(raw: &str) -> Result<Self, WaitError> {
        let uri = Uri::from_str(raw).map_err(|err| {
            WaitError::malformed(raw, err)
        })?;
        let host = match uri.host() {
            Some(host) if !host.is_empty() => {
                host.trim_start_matches('[').trim_end_matches(']')
            }
            _ => return Err(WaitError::malformed(raw, "missing host"))
        };
        let scheme = uri.scheme_str().map(str::to_ascii_lowercase);
        let port = match uri.port_u16() {
            Some(port) => port,
            None => match scheme.as_deref().and_then(default_port) {
                Some(port) => port,
                None => {
                    return Err(WaitError::malformed(raw, "missing port"))
                }
            }
        };
        Ok(Target {
            raw: raw.into(),
            scheme,
            host: host.into(),
            port,
        })
    }

    /// Returns the string the target was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Tries to connect to the target once.
    ///
    /// A successful connection is closed right away. Any error, including
    /// running into `dial_timeout`, means the target is unreachable.
    pub async fn is_reachable(&self, dial_timeout: Duration) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match timeout(dial_timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!("{} not reachable: {}", self, err);
                false
            }
            Err(_) => {
                debug!("{} not reachable: connection timed out", self);
                false
            }
        }
    }
}


//--- FromStr and Display

impl FromStr for Target {
    type Err = WaitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        }
        else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Returns the default port for a URL scheme.
fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None
    }
}

/// Parses all targets, failing on the first malformed one.
///
/// The returned targets are in the same order as the input.
pub fn parse_targets<S: AsRef<str>>(
    targets: &[S]
) -> Result<Vec<Target>, WaitError> {
    targets.iter().map(|target| Target::parse(target.as_ref())).collect()
}


//------------ Poller --------------------------------------------------------

/// Waits for a set of targets to become reachable.
#[derive(Clone, Debug)]
pub struct Poller {
    /// The time between two rounds.
    interval: Duration,

    /// The timeout for a single connection attempt.
    dial_timeout: Duration,
}

impl Poller {
    /// Creates a poller with a one second interval and dial timeout.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Creates a poller with the interval and timeout from `config`.
    pub fn from_config(config: &Config) -> Self {
        Poller {
            interval: config.poll_interval.max(MIN_INTERVAL),
            dial_timeout: config.dial_timeout.max(MIN_DIAL_TIMEOUT),
        }
    }

    /// Changes the interval between rounds.
    ///
    /// Intervals shorter than a millisecond are raised to one millisecond.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Changes the timeout for a single connection attempt.
    ///
    /// Timeouts shorter than a millisecond are raised to one millisecond.
    pub fn dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout.max(MIN_DIAL_TIMEOUT);
        self
    }

    /// Parses the targets and waits for them, blocking the current thread.
    ///
    /// If the current thread is already running a Tokio runtime, polling
    /// happens on a separate thread with a runtime of its own.
    ///
    /// # Panics
    ///
    /// Panics if the runtime for polling cannot be created.
    pub fn wait_for_reachable<S: AsRef<str>>(
        &self, targets: &[S], max_attempts: u64
    ) -> Result<(), WaitError> {
        let targets = parse_targets(targets)?;
        if runtime::Handle::try_current().is_err() {
            return self.block_on_wait(&targets, max_attempts)
        }
        thread::scope(|scope| {
            let poll = thread::Builder::new()
                .name("httpstub-poller".into())
                .spawn_scoped(scope, || {
                    self.block_on_wait(&targets, max_attempts)
                });
            let poll = match poll {
                Ok(poll) => poll,
                Err(err) => panic!("failed to spawn poller thread: {}", err),
            };
            match poll.join() {
                Ok(res) => res,
                Err(err) => panic::resume_unwind(err),
            }
        })
    }

    /// Runs [`wait`][Self::wait] on a new current-thread runtime.
    fn block_on_wait(
        &self, targets: &[Target], max_attempts: u64
    ) -> Result<(), WaitError> {
        let runtime = match runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => panic!("failed to create runtime: {}", err),
        };
        runtime.block_on(self.wait(targets, max_attempts))
    }

    /// Waits until all targets are reachable in the same round.
    ///
    /// The first round happens one interval after the call. Before each
    /// round, the number of rounds done is checked against `max_attempts`
    /// so no more than that many rounds happen.
    pub async fn wait(
        &self, targets: &[Target], max_attempts: u64
    ) -> Result<(), WaitError> {
        let mut ticker = interval_at(
            Instant::now() + self.interval, self.interval
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts = 0;
        loop {
            ticker.tick().await;
            if attempts >= max_attempts {
                info!(
                    "giving up on {} target(s) after {} attempt(s)",
                    targets.len(), attempts
                );
                return Err(WaitError::ReachabilityTimeout { attempts })
            }
            attempts += 1;
            let reachable = self.round(targets).await;
            debug!(
                "attempt {}: {} of {} target(s) reachable",
                attempts, reachable, targets.len()
            );
            if reachable == targets.len() {
                info!(
                    "all {} target(s) reachable after {} attempt(s)",
                    targets.len(), attempts
                );
                return Ok(())
            }
        }
    }

    /// Tries to connect to every target once.
    ///
    /// Targets are dialed one after another. Returns the number of targets
    /// that accepted the connection.
    pub async fn round(&self, targets: &[Target]) -> usize {
        let mut reachable = 0;
        for target in targets {
            if target.is_reachable(self.dial_timeout).await {
                reachable += 1;
            }
        }
        reachable
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}


//------------ WaitError -----------------------------------------------------

/// Waiting for targets has failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WaitError {
    /// A target could not be parsed.
    ///
    /// No connection attempts have been made.
    MalformedTarget {
        target: String,
        reason: String,
    },

    /// Not all targets were reachable within the allowed attempts.
    ReachabilityTimeout {
        attempts: u64,
    },
}

impl WaitError {
    fn malformed(target: &str, reason: impl fmt::Display) -> Self {
        WaitError::MalformedTarget {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            WaitError::MalformedTarget { ref target, ref reason } => {
                write!(f, "invalid target '{}': {}", target, reason)
            }
            WaitError::ReachabilityTimeout { attempts } => {
                write!(
                    f, "could not wait for targets: \
                        still unreachable after {} attempt(s)",
                    attempts
                )
            }
        }
    }
}

impl error::Error for WaitError { }


//============ Tests =========================================================
