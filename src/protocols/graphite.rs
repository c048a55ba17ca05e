//! Graphite plaintext protocol rendering.

use buckets::Buckets;
use std::io::Write;

/// Renders retired `Buckets` into the graphite plaintext protocol.
///
/// Every point becomes one `<prefix><name> <value> <timestamp>\n` line. The
/// prefix and percentiles are fixed for the life of the formatter.
#[derive(Debug, Clone)]
pub struct Graphite {
    prefix: Vec<u8>,
    percentiles: Vec<u32>,
}

/// Write `value` in its shortest round-trip form. Plain decimal notation is
/// used for ordinary magnitudes, exponent notation for the extremes where
/// decimal would run to hundreds of digits.
#[inline]
pub fn fmt_value(value: f64, buf: &mut Vec<u8>) {
    let abs = value.abs();
    // writing into a Vec does not fail
    let _ = if abs == 0.0 || !abs.is_finite() || (abs >= 1e-5 && abs < 1e16) {
        write!(buf, "{}", value)
    } else {
        write!(buf, "{:e}", value)
    };
}

impl Graphite {
    /// Create a formatter. `prefix` is emitted verbatim in front of every
    /// name; normalising its separator is the job of configuration.
    pub fn new<S>(prefix: S, percentiles: Vec<u32>) -> Graphite
    where
        S: Into<Vec<u8>>,
    {
        Graphite {
            prefix: prefix.into(),
            percentiles: percentiles,
        }
    }

    /// Render `buckets` stamped with `timestamp`, truncated to whole seconds.
    /// Buckets with nothing to report render to an empty payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice::buckets::Buckets;
    /// use sluice::protocols::graphite::Graphite;
    ///
    /// let mut bkt = Buckets::default();
    /// bkt.add_counter(b"boo", 1.0, 1.0);
    /// bkt.add_counter(b"boo", 1.0, 0.1);
    ///
    /// let graphite = Graphite::new("", vec![50]);
    /// assert_eq!(graphite.render(&bkt, 101.7), b"boo.count 11 101\n".to_vec());
    /// ```
    pub fn render(&self, buckets: &Buckets, timestamp: f64) -> Vec<u8> {
        let mut payload = Vec::with_capacity(8_192);
        self.render_into(buckets, timestamp, &mut payload);
        payload
    }

    /// As `render`, appending onto an existing buffer.
    pub fn render_into(&self, buckets: &Buckets, timestamp: f64, payload: &mut Vec<u8>) {
        let ts = format!("{}", timestamp.trunc() as i64);
        for point in buckets.extract(&self.percentiles) {
            payload.extend_from_slice(&self.prefix);
            point.write_name(payload);
            payload.push(b' ');
            fmt_value(point.value, payload);
            payload.push(b' ');
            payload.extend_from_slice(ts.as_bytes());
            payload.push(b'\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use window::Window;

    fn value_str(v: f64) -> String {
        let mut buf = Vec::new();
        fmt_value(v, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_to_graphite() {
        let window = Window::new();
        window.ingest(b"boo:1|c\nboo:1|c|@0.1\n");
        let bkt = window.swap();
        assert_eq!(
            Graphite::new("", vec![50]).render(&bkt, 101.0),
            b"boo.count 11 101\n".to_vec()
        );
    }

    #[test]
    fn test_prefix_applies_to_every_line() {
        let window = Window::new();
        window.ingest(b"c:1|c\ng:2.5|g\ns:x|s");
        let bkt = window.swap();
        let out = Graphite::new("stats.", vec![]).render(&bkt, 7.0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "stats.c.count 1 7\nstats.g 2.5 7\nstats.s 1 7\n"
        );
    }

    #[test]
    fn test_timer_lines() {
        let window = Window::new();
        window.ingest(b"t:1|ms\nt:2|ms\nt:3|ms\nt:4|ms");
        let bkt = window.swap();
        let out = String::from_utf8(Graphite::new("", vec![0, 100]).render(&bkt, 1.0)).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "t.count 4 1");
        assert_eq!(lines[1], "t.upper 0.004 1");
        assert_eq!(lines[2], "t.lower 0.001 1");
        assert!(lines[3].starts_with("t.mean 0.002"));
        assert!(lines[4].starts_with("t.stdev 0.00111"));
        assert_eq!(lines[5], "t.p0 0.001 1");
        assert_eq!(lines[6], "t.p100 0.004 1");
    }

    #[test]
    fn test_empty_buckets_render_nothing() {
        let bkt = Buckets::default();
        assert!(Graphite::new("p.", vec![50]).render(&bkt, 1.0).is_empty());
    }

    #[test]
    fn test_value_formatting() {
        assert_eq!(value_str(11.0), "11");
        assert_eq!(value_str(-7.0), "-7");
        assert_eq!(value_str(0.0), "0");
        assert_eq!(value_str(0.0025), "0.0025");
        assert_eq!(value_str(1234567.0), "1234567");
        assert_eq!(value_str(1e-7), "1e-7");
        assert_eq!(value_str(2.5e20), "2.5e20");
    }

    #[test]
    fn test_timestamp_truncates() {
        let mut bkt = Buckets::default();
        bkt.add_gauge(b"g", 1.0, false, 1.0);
        let out = Graphite::new("", vec![]).render(&bkt, 1_500_000_000.999);
        assert_eq!(out, b"g 1 1500000000\n".to_vec());
    }
}
