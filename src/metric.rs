//! The sample type produced by the statsd parser and consumed by `Buckets`.
//!
//! A `Sample` is one accepted line of statsd input. Names and set members are
//! kept as raw bytes: nothing in sluice interprets them, they are emitted
//! downstream exactly as they arrived.

/// The kind-specific payload of a `Sample`.
///
/// Adding a new metric kind means adding a variant here and extending the
/// exhaustive matches in `protocols::statsd` and `buckets::Buckets::add`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `c`: summed into a per-window counter, rate compensated.
    Counter(f64),
    /// `ms`: a single timing, in milliseconds as sent on the wire.
    Timer(f64),
    /// `g`: a gauge level. When `delta` is set the value adjusts the
    /// previous level rather than replacing it.
    Gauge {
        /// The parsed value, sign included.
        value: f64,
        /// Whether the literal began with an explicit `+` or `-`.
        delta: bool,
    },
    /// `s`: a set member, verbatim.
    Set(Vec<u8>),
}

/// A validated statsd sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The metric name, byte-for-byte as received.
    pub name: Vec<u8>,
    /// Kind and value of the sample.
    pub value: Value,
    /// The sampling rate, always strictly positive. It may be infinite.
    pub rate: f64,
}

impl Sample {
    /// Create a sample with a sampling rate of 1.
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice::metric::{Sample, Value};
    ///
    /// let s = Sample::new("foo", Value::Counter(1.0));
    /// assert_eq!(s.rate, 1.0);
    /// assert_eq!(s.name, b"foo".to_vec());
    /// ```
    pub fn new<S>(name: S, value: Value) -> Sample
    where
        S: Into<Vec<u8>>,
    {
        Sample {
            name: name.into(),
            value: value,
            rate: 1.0,
        }
    }

    /// Set the sampling rate of the sample.
    pub fn rate(mut self, rate: f64) -> Sample {
        self.rate = rate;
        self
    }
}
