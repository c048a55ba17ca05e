//! The wire protocols sluice speaks: statsd in, graphite plaintext out.

pub mod graphite;
pub mod statsd;
