//! Where rendered flush windows go.
//!
//! A `Sink` takes one rendered window at a time. The graphite forwarder is
//! the only production sink; it speaks to the network through the `Connect`
//! and `Link` seam so the transport can be swapped out under test.

use constants;
use std::fmt;
use std::io;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub mod graphite;

pub use self::graphite::Forwarder;

/// A consumer of rendered flush windows.
pub trait Sink {
    /// Deliver the payload of the window stamped `timestamp`. Returns once
    /// the sink is done with the payload.
    fn deliver(&mut self, timestamp: f64, payload: &[u8]);
}

/// An established byte stream. Dropping it closes it.
pub trait Link {
    /// Send some prefix of `buf`, returning how many bytes were accepted.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// A factory of `Link`s to a single destination.
pub trait Connect: fmt::Display {
    /// The link type produced.
    type Link: Link;

    /// Make one connection attempt.
    fn connect(&mut self) -> io::Result<Self::Link>;
}

impl Link for TcpStream {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }
}

/// Connects to a TCP destination by host name and port.
///
/// The host is resolved again on every attempt so a destination whose
/// address rotates is followed. Each resolved address gets one try with a
/// bounded timeout; the attempt fails only if all of them do.
///
/// Streams are handed out with a write timeout. A peer that stops reading
/// fills the send buffer, and the blocked send then fails with `WouldBlock`
/// or `TimedOut` instead of parking the caller forever.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
    write_timeout: Duration,
}

impl TcpConnector {
    /// Create a connector using `constants::CONNECT_TIMEOUT` for connects
    /// and `write_timeout` for every send on the resulting stream.
    /// `write_timeout` must not be zero.
    pub fn new<S>(host: S, port: u16, write_timeout: Duration) -> TcpConnector
    where
        S: Into<String>,
    {
        TcpConnector {
            host: host.into(),
            port: port,
            timeout: constants::CONNECT_TIMEOUT,
            write_timeout: write_timeout,
        }
    }
}

impl fmt::Display for TcpConnector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Connect for TcpConnector {
    type Link = TcpStream;

    fn connect(&mut self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(
                        "Unable to connect to {} using addr {} with error {}",
                        self.host, addr, e
                    );
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses resolved for {}", self.host),
            )
        }))
    }
}
