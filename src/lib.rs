//! Sluice is a statsd aggregation server. It receives counters, timers,
//! gauges and sets over UDP, aggregates them into fixed flush windows and
//! forwards each window to a graphite/carbon collector over TCP.
//!
//! Ingestion and flushing run side by side. They share exactly one thing,
//! the live `window::Window`, and contend for it only for the instant it
//! takes to swap a full window for an empty one. A slow or unreachable
//! collector delays delivery but never stalls ingestion.
//!
//! Delivery is at-most-once per window: a window held in memory when the
//! process stops is lost.
#![allow(unknown_lints)]
#![deny(trivial_numeric_casts, missing_docs, unstable_features, unused_import_braces)]
extern crate chrono;
extern crate clap;
extern crate indexmap;
extern crate mio;
extern crate serde;
extern crate toml;
extern crate url;

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
extern crate tempdir;

pub mod buckets;
pub mod config;
pub mod constants;
pub mod metric;
pub mod protocols;
pub mod sink;
pub mod source;
pub mod stats;
pub mod thread;
pub mod time;
pub mod window;
