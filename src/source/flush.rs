use protocols::graphite::Graphite;
use sink::Sink;
use std::sync::Arc;
use window::Window;

/// The flush path. See `Flusher::run` for more details.
///
/// On every tick the live window is swapped out, rendered and handed to the
/// sink. Only the swap holds the window lock; rendering and delivery happen
/// outside it, so a stalled sink never stalls ingestion.
pub struct Flusher<S> {
    window: Arc<Window>,
    graphite: Graphite,
    sink: S,
    payload: Vec<u8>,
}

impl<S> Flusher<S>
where
    S: Sink,
{
    /// Create a new Flusher. This will not produce a new thread, that must
    /// be managed by the end-user.
    pub fn new(window: Arc<Window>, graphite: Graphite, sink: S) -> Flusher<S> {
        Flusher {
            window: window,
            graphite: graphite,
            sink: sink,
            payload: Vec::with_capacity(8_192),
        }
    }

    /// Retire the live window and deliver it stamped `timestamp`. An empty
    /// window is skipped without touching the sink. Returns the payload size.
    pub fn flush(&mut self, timestamp: f64) -> usize {
        let retired = self.window.swap();
        self.payload.clear();
        self.graphite
            .render_into(&retired, timestamp, &mut self.payload);
        drop(retired);
        if self.payload.is_empty() {
            trace!("Nothing to flush for {}", timestamp);
            return 0;
        }

        debug!("Start flush for {}", timestamp);
        self.sink.deliver(timestamp, &self.payload);
        debug!(
            "End flush for {}, payload: {} bytes",
            timestamp,
            self.payload.len()
        );
        self.payload.len()
    }

    /// Flush once per tick, forever or until `ticks` runs dry. Each window is
    /// delivered completely before the next tick is awaited.
    pub fn run<I>(&mut self, ticks: I)
    where
        I: IntoIterator<Item = f64>,
    {
        for timestamp in ticks {
            self.flush(timestamp);
        }
    }

    /// The sink being flushed into.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}
