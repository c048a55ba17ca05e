//! Provides the CLI option parser
//!
//! Used to parse the argv/config file into a struct that
//! the server can consume and use as configuration data. The resulting
//! `Args` is built once at startup and never changes afterwards.

use clap::{App, Arg, ArgMatches};
use source::StatsdConfig;
use std::error;
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::{Path, PathBuf};
use toml;
use url::Url;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

const DEFAULT_LISTEN_HOST: &'static str = "127.0.0.1";
const DEFAULT_LISTEN_PORT: u16 = 8125;
const DEFAULT_GRAPHITE_PORT: u16 = 2003;

fn default_version() -> String {
    VERSION.unwrap_or("unknown").to_string()
}

/// Errors in the command line or configuration file.
#[derive(Debug)]
pub enum Error {
    /// A `host[:port]` value that could not be understood.
    Address(String),
    /// A `:port` value given where there is no default host to fill in.
    HostRequired(String),
    /// A percentile list holding something other than integers in 0..=100.
    Percentiles(String),
    /// An interval that must be a positive number of seconds.
    Interval(&'static str, String),
    /// No graphite destination was configured.
    MissingGraphite,
    /// The configuration file could not be read.
    Io(PathBuf, io::Error),
    /// The configuration file is not valid.
    Toml(PathBuf, toml::de::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Address(ref s) => write!(f, "invalid address {:?}, expected host[:port]", s),
            Error::HostRequired(ref s) => write!(f, "host required in {:?}", s),
            Error::Percentiles(ref s) => write!(
                f,
                "invalid percentiles {:?}, expected integers 0 to 100 separated by commas",
                s
            ),
            Error::Interval(name, ref s) => {
                write!(f, "invalid {} {:?}, expected a positive number of seconds", name, s)
            }
            Error::MissingGraphite => write!(f, "no graphite destination given, see -g"),
            Error::Io(ref path, ref e) => {
                write!(f, "could not read {}: {}", path.display(), e)
            }
            Error::Toml(ref path, ref e) => {
                write!(f, "could not parse {}: {}", path.display(), e)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(_, ref e) => Some(e),
            Error::Toml(_, ref e) => Some(e),
            _ => None,
        }
    }
}

/// Where flushed windows are sent.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphiteConfig {
    /// Destination host name or address.
    pub host: String,
    /// Destination port.
    pub port: u16,
}

/// Big configuration struct for the sluice executable
///
/// This struct is what we construct from parsing the command line and the
/// optional configuration file. Please see documentation on `parse_args` in
/// this module for more details.
#[derive(Debug, Clone, PartialEq)]
pub struct Args {
    /// Where the statsd source listens.
    pub statsd: StatsdConfig,
    /// The graphite destination.
    pub graphite: GraphiteConfig,
    /// Seconds between flushes.
    pub flush_interval: u64,
    /// Prepended to every emitted name. Empty, or ending in exactly one `.`.
    pub prefix: String,
    /// Percentiles reported for every timer, in output order.
    pub percentiles: Vec<u32>,
    /// Seconds after which the graphite connection is replaced.
    pub recycle: u64,
    /// The verbosity setting of sluice. The higher the value the more chatty
    /// sluice gets.
    pub verbose: u64,
    /// sluice version string. This is set automatically.
    pub version: String,
}

/// The graphite destination as written in a configuration file: either
/// `"host:port"` or a `{ host, port }` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum Destination {
    Addr(String),
    Table { host: String, port: Option<u16> },
}

/// The on-disk configuration. Every key is optional; command line flags
/// take precedence over anything set here.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileConfig {
    listen: Option<String>,
    graphite: Option<Destination>,
    flush_interval: Option<u64>,
    percentiles: Option<Vec<u32>>,
    prefix: Option<String>,
    recycle: Option<u64>,
}

/// Parse a `host[:port]` value.
///
/// A missing port is `default_port`. A value of the form `:port` takes
/// `default_host`, and is an error if there is none.
///
/// # Examples
///
/// ```
/// use sluice::config::host_port;
///
/// assert_eq!(host_port("boo", 2003, None).unwrap(), ("boo".to_string(), 2003));
/// assert_eq!(host_port("boo:42", 2003, None).unwrap(), ("boo".to_string(), 42));
/// assert_eq!(
///     host_port(":8080", 2003, Some("boo")).unwrap(),
///     ("boo".to_string(), 8080)
/// );
/// assert!(host_port(":8080", 2003, None).is_err());
/// ```
pub fn host_port(
    text: &str,
    default_port: u16,
    default_host: Option<&str>,
) -> Result<(String, u16), Error> {
    let full = if text.starts_with(':') {
        match default_host {
            Some(host) => format!("{}{}", host, text),
            None => return Err(Error::HostRequired(text.to_string())),
        }
    } else {
        text.to_string()
    };
    let url = Url::parse(&format!("tmp://{}", full))
        .map_err(|_| Error::Address(text.to_string()))?;
    let host = match url.host_str() {
        Some(h) if !h.is_empty() => h.trim_start_matches('[').trim_end_matches(']'),
        _ => return Err(Error::Address(text.to_string())),
    };
    Ok((host.to_string(), url.port().unwrap_or(default_port)))
}

/// Parse a comma separated list of integer percentiles. Empty items are
/// skipped, so a trailing comma is harmless.
///
/// # Examples
///
/// ```
/// use sluice::config::parse_percentiles;
///
/// assert_eq!(parse_percentiles("10,20,").unwrap(), vec![10, 20]);
/// assert!(parse_percentiles("20,boo").is_err());
/// ```
pub fn parse_percentiles(text: &str) -> Result<Vec<u32>, Error> {
    let ps = text.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>())
        .collect::<Result<Vec<u32>, _>>()
        .map_err(|_| Error::Percentiles(text.to_string()))?;
    check_percentiles(ps, text)
}

fn check_percentiles(ps: Vec<u32>, text: &str) -> Result<Vec<u32>, Error> {
    if ps.iter().any(|&p| p > 100) {
        return Err(Error::Percentiles(text.to_string()));
    }
    Ok(ps)
}

/// Strip any trailing separators and append exactly one. An empty prefix
/// stays empty.
///
/// # Examples
///
/// ```
/// use sluice::config::normalize_prefix;
///
/// assert_eq!(normalize_prefix("stats"), "stats.");
/// assert_eq!(normalize_prefix("stats.."), "stats.");
/// assert_eq!(normalize_prefix(""), "");
/// ```
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}.", trimmed)
    }
}

fn positive(name: &'static str, value: u64) -> Result<u64, Error> {
    if value == 0 {
        Err(Error::Interval(name, value.to_string()))
    } else {
        Ok(value)
    }
}

fn parse_seconds(name: &'static str, text: &str) -> Result<u64, Error> {
    match text.parse::<u64>() {
        Ok(v) => positive(name, v),
        Err(_) => Err(Error::Interval(name, text.to_string())),
    }
}

fn app<'a, 'b>() -> App<'a, 'b> {
    App::new("sluice")
        .version(VERSION.unwrap_or("unknown"))
        .about("statsd aggregation, flushed to graphite")
        .arg(
            Arg::with_name("config-file")
                .long("config")
                .short("C")
                .value_name("config")
                .help("An optional TOML config file. Flags override its values.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("listen")
                .short("l")
                .value_name("host[:port]")
                .help("Listen for statsd on host:port, default is 127.0.0.1:8125.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("graphite")
                .short("g")
                .value_name("host[:port]")
                .help("Graphite host:port for sending metrics, default port is 2003.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("flush-interval")
                .short("f")
                .value_name("seconds")
                .help("Flush interval, default is 60 seconds.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("percentiles")
                .long("percentiles")
                .value_name("p1,p2,...")
                .help("Timer percentiles as csv, default is 50,75,95,99.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("prefix")
                .long("prefix")
                .short("p")
                .value_name("prefix")
                .help("Prefix to all metrics.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("recycle")
                .long("recycle")
                .value_name("seconds")
                .help("Reconnect to graphite after this many seconds, default is 300.")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Turn on verbose output."),
        )
}

/// Parse the sluice configuration arguments
///
/// This function will read the environment arguments and construct an
/// `Args`. Flags may be supplemented by a TOML file given with `--config`;
/// see `parse_config_file`.
pub fn parse_args() -> Result<Args, Error> {
    parse_args_from(::std::env::args_os())
}

/// As `parse_args`, reading from an explicit argument list whose first
/// element is the program name.
pub fn parse_args_from<I, T>(argv: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = app().get_matches_from(argv);
    let file = match matches.value_of("config-file") {
        Some(path) => load_config_file(Path::new(path))?,
        None => FileConfig::default(),
    };
    merge(&matches, file)
}

fn load_config_file(path: &Path) -> Result<FileConfig, Error> {
    let mut buffer = String::new();
    File::open(path)
        .and_then(|mut fp| fp.read_to_string(&mut buffer))
        .map_err(|e| Error::Io(path.to_path_buf(), e))?;
    parse_config_file(&buffer).map_err(|e| Error::Toml(path.to_path_buf(), e))
}

/// Parse the sluice configuration file.
///
/// Recognised keys mirror the long flags:
///
/// ```toml
/// listen = "0.0.0.0:8125"
/// graphite = "carbon.example.com:2003"   # or { host = "...", port = 2003 }
/// flush-interval = 10
/// percentiles = [50, 90, 99]
/// prefix = "stats"
/// recycle = 300
/// ```
fn parse_config_file(buffer: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(buffer)
}

fn merge(matches: &ArgMatches, file: FileConfig) -> Result<Args, Error> {
    let listen = matches
        .value_of("listen")
        .map(|s| s.to_string())
        .or(file.listen);
    let (host, port) = match listen {
        Some(text) => host_port(&text, DEFAULT_LISTEN_PORT, Some(DEFAULT_LISTEN_HOST))?,
        None => (DEFAULT_LISTEN_HOST.to_string(), DEFAULT_LISTEN_PORT),
    };

    let graphite = match matches.value_of("graphite") {
        Some(text) => Some(Destination::Addr(text.to_string())),
        None => file.graphite,
    };
    let graphite = match graphite {
        Some(Destination::Addr(text)) => {
            let (host, port) = host_port(&text, DEFAULT_GRAPHITE_PORT, None)?;
            GraphiteConfig {
                host: host,
                port: port,
            }
        }
        Some(Destination::Table { host, port }) => {
            if host.is_empty() {
                return Err(Error::Address(host));
            }
            GraphiteConfig {
                host: host,
                port: port.unwrap_or(DEFAULT_GRAPHITE_PORT),
            }
        }
        None => return Err(Error::MissingGraphite),
    };

    let flush_interval = match matches.value_of("flush-interval") {
        Some(text) => parse_seconds("flush interval", text)?,
        None => positive("flush interval", file.flush_interval.unwrap_or(60))?,
    };

    let recycle = match matches.value_of("recycle") {
        Some(text) => parse_seconds("recycle interval", text)?,
        None => positive("recycle interval", file.recycle.unwrap_or(300))?,
    };

    let percentiles = match matches.value_of("percentiles") {
        Some(text) => parse_percentiles(text)?,
        None => match file.percentiles {
            Some(ps) => {
                let text = format!("{:?}", ps);
                check_percentiles(ps, &text)?
            }
            None => vec![50, 75, 95, 99],
        },
    };

    let prefix = matches
        .value_of("prefix")
        .map(|s| s.to_string())
        .or(file.prefix)
        .unwrap_or_default();

    Ok(Args {
        statsd: StatsdConfig {
            host: host,
            port: port,
        },
        graphite: graphite,
        flush_interval: flush_interval,
        prefix: normalize_prefix(&prefix),
        percentiles: percentiles,
        recycle: recycle,
        verbose: matches.occurrences_of("verbose"),
        version: default_version(),
    })
}
