//! The two activities of a running sluice: ingesting statsd and flushing
//! windows downstream.

use mio;
use std::io;

mod flush;
mod statsd;

pub use self::flush::Flusher;
pub use self::statsd::{Statsd, StatsdConfig};

/// A long-running producer driven by a `thread::ThreadHandle`.
pub trait Source {
    /// Run until the `constants::SYSTEM` token on `poll` becomes readable,
    /// then return `Ok`. An error means the source stopped on its own and
    /// will produce nothing more.
    fn run(&mut self, poll: mio::Poll) -> io::Result<()>;
}
