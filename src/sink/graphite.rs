//! Reliable delivery of rendered windows to a graphite/carbon collector.

use constants;
use sink::{Connect, Link, Sink};
use std::cmp;
use std::io;
use std::mem;
use std::time::Duration;
use time::{backoff, Clock};

/// Where the forwarder's single connection stands.
#[derive(Debug)]
enum State<L> {
    /// No connection. Leaving this state blocks until one is made.
    Disconnected,
    /// Connected and idle between chunks. The connection's age is checked
    /// against the recycle interval on the way to `Sending`.
    Connected { link: L, established: f64 },
    /// Cleared to push the next chunk.
    Sending { link: L, established: f64 },
}

/// Forwards payloads over one persistent connection.
///
/// Each payload is delivered completely before `forward` returns: partial
/// sends advance through the payload, a failed send drops the connection
/// and the unsent remainder goes out again on a fresh one. Connecting
/// retries forever with backoff. A connection older than the recycle
/// interval is replaced before it is used again. The connection is kept
/// open between payloads.
///
/// A send that fails after the peer already took some of its bytes is
/// retried whole, so such bytes may arrive twice. A send that stalls, the
/// link reporting `WouldBlock` or `TimedOut`, is a failure like any other.
pub struct Forwarder<C, K>
where
    C: Connect,
{
    connector: C,
    clock: K,
    recycle: f64,
    state: State<C::Link>,
    delay: Duration,
    failures: u64,
}

impl<C, K> Forwarder<C, K>
where
    C: Connect,
    K: Clock,
{
    /// Create a disconnected forwarder. No connection is attempted until
    /// the first payload.
    pub fn new(connector: C, clock: K, recycle: Duration) -> Forwarder<C, K> {
        Forwarder {
            connector: connector,
            clock: clock,
            recycle: recycle.as_secs_f64(),
            state: State::Disconnected,
            delay: constants::BACKOFF_INITIAL,
            failures: 0,
        }
    }

    /// Whether a connection is currently held.
    pub fn is_connected(&self) -> bool {
        match self.state {
            State::Disconnected => false,
            State::Connected { .. } | State::Sending { .. } => true,
        }
    }

    /// Block until a connection is made. Failures are logged and retried
    /// after the current backoff delay.
    fn connect(&mut self) -> (C::Link, f64) {
        loop {
            match self.connector.connect() {
                Ok(link) => {
                    info!("Connected to graphite at {}", self.connector);
                    self.delay = constants::BACKOFF_INITIAL;
                    self.failures = 0;
                    return (link, self.clock.now());
                }
                Err(e) => {
                    self.failures = self.failures.saturating_add(1);
                    error!(
                        "Error connecting to graphite at {} ({}), attempt {}, wait {:?}",
                        self.connector, e, self.failures, self.delay
                    );
                    self.clock.sleep(self.delay);
                    self.delay = backoff(self.delay);
                }
            }
        }
    }

    /// Deliver all of `payload`, stamped `timestamp` for logging.
    pub fn forward(&mut self, timestamp: f64, payload: &[u8]) {
        let mut offset = 0;
        while offset < payload.len() {
            let state = mem::replace(&mut self.state, State::Disconnected);
            self.state = match state {
                State::Disconnected => {
                    let (link, established) = self.connect();
                    State::Connected {
                        link: link,
                        established: established,
                    }
                }
                State::Connected { link, established } => {
                    if self.clock.now() - established > self.recycle {
                        info!("Recycling graphite connection to {}", self.connector);
                        State::Disconnected
                    } else {
                        State::Sending {
                            link: link,
                            established: established,
                        }
                    }
                }
                State::Sending {
                    mut link,
                    established,
                } => {
                    let end = cmp::min(offset + constants::SEND_CHUNK, payload.len());
                    match link.send(&payload[offset..end]) {
                        Ok(0) => {
                            error!(
                                "Error sending data for {}: connection accepted no bytes",
                                timestamp
                            );
                            State::Disconnected
                        }
                        Ok(sent) => {
                            offset += sent;
                            State::Connected {
                                link: link,
                                established: established,
                            }
                        }
                        Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                            State::Connected {
                                link: link,
                                established: established,
                            }
                        }
                        Err(ref e)
                            if e.kind() == io::ErrorKind::WouldBlock
                                || e.kind() == io::ErrorKind::TimedOut =>
                        {
                            error!(
                                "Error sending data for {}: peer stopped reading, reconnecting",
                                timestamp
                            );
                            State::Disconnected
                        }
                        Err(e) => {
                            error!("Error sending data for {}: {}", timestamp, e);
                            State::Disconnected
                        }
                    }
                }
            };
        }
    }
}

impl<C, K> Sink for Forwarder<C, K>
where
    C: Connect,
    K: Clock,
{
    fn deliver(&mut self, timestamp: f64, payload: &[u8]) {
        self.forward(timestamp, payload)
    }
}
