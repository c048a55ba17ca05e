//! The live flush window, shared between ingestion and flushing.
//!
//! `Window` owns the one mutable `Buckets` in a running sluice. Samples go
//! in through `apply`/`ingest`, retired windows come out through `swap`, and
//! both take the same lock. A sample racing a swap lands in exactly one of
//! the two windows. The live `Buckets` is never handed out by reference.

use buckets::Buckets;
use metric::Sample;
use protocols::statsd::parse_statsd;
use std::sync::{Mutex, MutexGuard};

/// Lock-guarded owner of the live `Buckets`.
#[derive(Debug, Default)]
pub struct Window {
    live: Mutex<Buckets>,
}

impl Window {
    /// Create a window with empty buckets.
    pub fn new() -> Window {
        Window::default()
    }

    // Ingestion must keep going even if a holder of the lock panicked, so a
    // poisoned lock is simply reclaimed.
    fn lock(&self) -> MutexGuard<Buckets> {
        match self.live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply a batch of samples under a single lock acquisition.
    pub fn apply<I>(&self, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut live = self.lock();
        for sample in samples {
            live.add(sample);
        }
    }

    /// Parse a statsd packet and apply every valid line of it. Returns the
    /// number of samples applied.
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice::window::Window;
    ///
    /// let window = Window::new();
    /// assert_eq!(window.ingest(b"a:1|c\nnonsense\nb:2|ms"), 2);
    /// ```
    pub fn ingest(&self, packet: &[u8]) -> usize {
        let mut res = Vec::new();
        let applied = parse_statsd(packet, &mut res);
        if applied > 0 {
            self.apply(res);
        }
        applied
    }

    /// Retire the live buckets, replacing them with a successor that keeps
    /// only the gauges. The retired buckets are returned for flushing.
    pub fn swap(&self) -> Buckets {
        self.lock().rotate()
    }
}
