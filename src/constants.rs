//! Library level constants
use mio;
use std::time::Duration;

/// MIO token used to distinguish system events
/// from other event sources.
///
/// Note - It is assumed that sources will not hold
/// more than 2048 addressable sockets, 0 indexed.
pub const SYSTEM: mio::Token = mio::Token(2048);

/// Largest statsd datagram sluice will read. Anything longer is truncated
/// by the kernel.
pub const MAX_DATAGRAM: usize = 65_536;

/// The most bytes handed to a single send call on the forwarding connection.
pub const SEND_CHUNK: usize = 4_096;

/// Per-address timeout for a single connect attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay after the first failed connect.
pub const BACKOFF_INITIAL: Duration = Duration::from_secs(1);

/// Growth of the connect delay per consecutive failure.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Ceiling of the connect delay.
pub const BACKOFF_MAX: Duration = Duration::from_secs(60);
