#![allow(unknown_lints)]

extern crate chan_signal;
extern crate chrono;
extern crate fern;
extern crate sluice;

#[macro_use]
extern crate log;

use chrono::Utc;
use sluice::protocols::graphite::Graphite;
use sluice::sink::{Forwarder, TcpConnector};
use sluice::source::{Flusher, Source, Statsd};
use sluice::time::{SystemClock, Ticker};
use sluice::window::Window;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    let args = match sluice::config::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("sluice: {}", e);
            process::exit(1);
        }
    };

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let signal =
        chan_signal::notify(&[chan_signal::Signal::INT, chan_signal::Signal::TERM]);

    let logging = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                record.module_path().unwrap_or("?"),
                record.line().unwrap_or(0),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply();
    if let Err(e) = logging {
        eprintln!("sluice: could not set up logging: {}", e);
        process::exit(1);
    }

    info!("sluice - {}", args.version);

    // Ingestion and flushing share only the live window. The flush thread
    // owns the graphite connection outright.
    let window = Arc::new(Window::new());

    let mut statsd = match Statsd::bind(Arc::clone(&window), &args.statsd) {
        Ok(statsd) => statsd,
        Err(e) => {
            error!(
                "Unable to bind statsd on {}:{} with error {}",
                args.statsd.host, args.statsd.port, e
            );
            process::exit(1);
        }
    };

    let graphite = Graphite::new(args.prefix.clone(), args.percentiles.clone());
    let recycle = Duration::from_secs(args.recycle);
    // A send blocked on a peer that stopped reading gives up after one
    // recycle interval, the longest an established connection may live.
    let connector = TcpConnector::new(args.graphite.host.clone(), args.graphite.port, recycle);
    let forwarder = Forwarder::new(connector, SystemClock, recycle);
    let mut flusher = Flusher::new(Arc::clone(&window), graphite, forwarder);
    let interval = Duration::from_secs(args.flush_interval);
    // Detached: the flush thread may be parked in a connect retry when a
    // signal arrives, and its connection closes with the process.
    let _flush = thread::spawn(move || {
        flusher.run(Ticker::new(SystemClock, interval));
    });

    // The source only returns Ok once asked to shut down. Stopping on its own
    // leaves a daemon that flushes but never ingests, so take the process
    // down with it.
    let source = match sluice::thread::spawn(move |poll| {
        if let Err(e) = statsd.run(poll) {
            error!("statsd source stopped with error {}, exiting", e);
            process::exit(1);
        }
    }) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Unable to start statsd source: {}", e);
            process::exit(1);
        }
    };

    match signal.recv() {
        Some(sig) => info!("Received {:?}, shutting down", sig),
        None => info!("Signal channel closed, shutting down"),
    }
    source.shutdown();
    info!("sluice shut down");
}
