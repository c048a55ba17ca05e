use constants;
use metric::Sample;
use mio;
use protocols::statsd::parse_statsd;
use source::Source;
use std::io;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use window::Window;

/// Configuration for the statsd source.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsdConfig {
    /// The host for the statsd protocol to bind to.
    pub host: String,
    /// The port for the statsd source to listen on.
    pub port: u16,
}

impl Default for StatsdConfig {
    fn default() -> StatsdConfig {
        StatsdConfig {
            host: "127.0.0.1".to_string(),
            port: 8125,
        }
    }
}

/// The statsd source
///
/// Receives statsd datagrams and applies them to the live `Window`, one
/// lock acquisition per datagram. Datagram boundaries mean nothing beyond
/// batching; malformed lines are dropped quietly.
pub struct Statsd {
    window: Arc<Window>,
    sockets: Vec<mio::net::UdpSocket>,
    port: u16,
}

impl Statsd {
    /// Bind one UDP socket per address `config.host` resolves to.
    pub fn bind(window: Arc<Window>, config: &StatsdConfig) -> io::Result<Statsd> {
        let mut sockets = Vec::new();
        for addr in (config.host.as_str(), config.port).to_socket_addrs()? {
            sockets.push(mio::net::UdpSocket::bind(&addr)?);
        }
        if sockets.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses resolved for {}", config.host),
            ));
        }
        Ok(Statsd {
            window: window,
            sockets: sockets,
            port: config.port,
        })
    }

    /// The addresses actually bound, useful when binding port 0.
    pub fn local_addrs(&self) -> io::Result<Vec<::std::net::SocketAddr>> {
        self.sockets.iter().map(|s| s.local_addr()).collect()
    }
}

/// Read every datagram waiting behind `recv`. The sockets are registered
/// edge-triggered, so only `WouldBlock` ends the loop: stopping earlier
/// would strand queued packets until the next one arrives.
fn drain<F>(mut recv: F, window: &Window, buf: &mut [u8], res: &mut Vec<Sample>)
where
    F: FnMut(&mut [u8]) -> io::Result<usize>,
{
    loop {
        match recv(buf) {
            Ok(len) => {
                if parse_statsd(&buf[..len], res) > 0 {
                    window.apply(res.drain(..));
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => error!("Could not read UDP socket with error {:?}", e),
        }
    }
}

impl Source for Statsd {
    fn run(&mut self, poll: mio::Poll) -> io::Result<()> {
        for (i, socket) in self.sockets.iter().enumerate() {
            if let Err(e) = poll.register(
                socket,
                mio::Token(i),
                mio::Ready::readable(),
                mio::PollOpt::edge(),
            ) {
                error!("Unable to register statsd socket: {}", e);
                return Err(e);
            }
        }
        info!("statsd server started on *:{}", self.port);

        let mut buf = vec![0; constants::MAX_DATAGRAM];
        let mut res = Vec::new();
        let mut events = mio::Events::with_capacity(1024);
        loop {
            if let Err(e) = poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!("Failed during poll {:?}", e);
                return Err(e);
            }
            for event in events.iter() {
                match event.token() {
                    constants::SYSTEM => return Ok(()),
                    mio::Token(i) => if let Some(socket) = self.sockets.get(i) {
                        drain(
                            |buf| socket.recv_from(buf).map(|(len, _)| len),
                            &self.window,
                            &mut buf,
                            &mut res,
                        );
                    },
                }
            }
        }
    }
}
