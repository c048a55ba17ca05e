//! Mio enabled threading library.

use constants;
use mio;
use std::io;
use std::thread;

/// Mio enabled thread state.
pub struct ThreadHandle {
    /// JoinHandle for the executing thread.
    pub handle: thread::JoinHandle<()>,

    /// Readiness signal used to notify the given thread when an event is ready
    /// to be consumed on the SYSTEM channel.
    readiness: mio::SetReadiness,
}

impl ThreadHandle {
    /// Join the given Thread, blocking until it exits.
    pub fn join(self) {
        if self.handle.join().is_err() {
            error!("Child thread panicked before shutdown");
        }
    }

    /// Gracefully shutdown the given Thread, blocking until it exits.
    ///
    /// Note - It is the responsibility of the developer to ensure
    /// that thread logic polls for events occurring on the SYSTEM token.
    pub fn shutdown(self) {
        if let Err(e) = self.readiness.set_readiness(mio::Ready::readable()) {
            error!("Failed to notify child thread of shutdown: {}", e);
            return;
        }
        self.join();
    }
}

/// Spawns a new thread executing the provided closure.
///
/// The closure receives a `mio::Poll` which already has the shutdown
/// registration on `constants::SYSTEM`. Once that token becomes readable the
/// closure is expected to return.
pub fn spawn<F>(f: F) -> io::Result<ThreadHandle>
where
    F: Send + 'static + FnOnce(mio::Poll) -> (),
{
    let poller = mio::Poll::new()?;
    let (registration, readiness) = mio::Registration::new2();
    poller.register(
        &registration,
        constants::SYSTEM,
        mio::Ready::readable(),
        mio::PollOpt::edge(),
    )?;

    Ok(ThreadHandle {
        readiness: readiness,
        handle: thread::spawn(move || {
            // the registration must outlive the poll loop
            let _registration = registration;
            f(poller);
        }),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn shutdown_reaches_the_poll_loop() {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let handle = spawn(move |poll| {
            let mut events = mio::Events::with_capacity(8);
            loop {
                poll.poll(&mut events, None).unwrap();
                for event in events.iter() {
                    if event.token() == constants::SYSTEM {
                        flag.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            }
        }).unwrap();
        handle.shutdown();
        assert!(stopped.load(Ordering::SeqCst));
    }
}
