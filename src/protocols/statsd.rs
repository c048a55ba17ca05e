//! Statsd line protocol parsing.

use metric::{Sample, Value};
use std::str;

/// Parse a finite-or-infinite float out of raw bytes. NaN is refused: it has
/// no place in a sorted timer list and no meaningful sum.
#[inline]
fn parse_f64(bytes: &[u8]) -> Option<f64> {
    let s = str::from_utf8(bytes).ok()?;
    match s.parse::<f64>() {
        Ok(f) if !f.is_nan() => Some(f),
        _ => None,
    }
}

/// A rate is `@` and a strictly positive float. `@inf` is accepted: the
/// sample then contributes nothing to sums and counts.
#[inline]
fn parse_rate(segment: &[u8]) -> Option<f64> {
    match segment.split_first() {
        Some((&b'@', rest)) => match parse_f64(rest) {
            Some(rate) if rate > 0.0 => Some(rate),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a single statsd line, without its line terminator.
///
/// Valid lines are:
///
/// - `<name>:<value>|<type>`
/// - `<name>:<value>|<type>|@<sample_rate>`
///
/// where type is one of `c`, `ms`, `g` or `s`. Anything else is `None`.
/// Rejection is not an error, it simply means the line carries no sample.
///
/// # Examples
///
/// ```
/// use sluice::metric::Value;
/// use sluice::protocols::statsd::parse_line;
///
/// let s = parse_line(b"foo:+2|g|@0.5").unwrap();
/// assert_eq!(s.name, b"foo".to_vec());
/// assert_eq!(s.value, Value::Gauge { value: 2.0, delta: true });
/// assert_eq!(s.rate, 0.5);
///
/// assert!(parse_line(b"foo:1").is_none());
/// ```
pub fn parse_line(line: &[u8]) -> Option<Sample> {
    let colon = line.iter().position(|&b| b == b':')?;
    let name = &line[..colon];

    let mut segments = line[colon + 1..].split(|&b| b == b'|');
    let raw = segments.next()?;
    let kind = segments.next()?;
    let rate = match segments.next() {
        None => 1.0,
        Some(segment) => parse_rate(segment)?,
    };
    if segments.next().is_some() {
        return None;
    }

    let value = match kind {
        b"c" => Value::Counter(parse_f64(raw)?),
        b"ms" => Value::Timer(parse_f64(raw)?),
        b"g" => {
            let value = parse_f64(raw)?;
            let delta = match raw.first() {
                Some(&b'+') | Some(&b'-') => true,
                _ => false,
            };
            Value::Gauge {
                value: value,
                delta: delta,
            }
        }
        b"s" => Value::Set(raw.to_vec()),
        _ => return None,
    };

    Some(Sample {
        name: name.to_vec(),
        value: value,
        rate: rate,
    })
}

/// Iterate the lines of a statsd packet.
///
/// Lines are separated by `\n`; a trailing `\r` is dropped so CRLF senders
/// are understood. Empty lines are skipped.
pub fn lines<'a>(packet: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    packet
        .split(|&b| b == b'\n')
        .map(|line| match line.split_last() {
            Some((&b'\r', head)) => head,
            _ => line,
        })
        .filter(|line| !line.is_empty())
}

/// Parse every line of a statsd packet into `res`.
///
/// Multiple metrics can be sent in a single UDP packet separated by
/// newlines. Each line stands alone: a malformed line is skipped without
/// disturbing its siblings. Returns the number of samples appended to
/// `res`.
pub fn parse_statsd(packet: &[u8], res: &mut Vec<Sample>) -> usize {
    let before = res.len();
    for line in lines(packet) {
        match parse_line(line) {
            Some(sample) => res.push(sample),
            None => trace!("dropping malformed line: {:?}", String::from_utf8_lossy(line)),
        }
    }
    res.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};

    #[test]
    fn test_parse_counter() {
        let s = parse_line(b"boo:1|c").unwrap();
        assert_eq!(s, Sample::new("boo", Value::Counter(1.0)));

        let s = parse_line(b"boo:1|c|@0.1").unwrap();
        assert_eq!(s, Sample::new("boo", Value::Counter(1.0)).rate(0.1));
    }

    #[test]
    fn test_parse_infinite_rate() {
        let s = parse_line(b"boo:1|c|@inf").unwrap();
        assert_eq!(s.rate, ::std::f64::INFINITY);
        assert!(parse_line(b"boo:1|c|@-inf").is_none());
    }

    #[test]
    fn test_parse_timer() {
        let s = parse_line(b"a.b.c:3.5|ms").unwrap();
        assert_eq!(s, Sample::new("a.b.c", Value::Timer(3.5)));
    }

    #[test]
    fn test_parse_gauge_delta_flag() {
        assert_eq!(
            parse_line(b"g:1|g").unwrap().value,
            Value::Gauge {
                value: 1.0,
                delta: false,
            }
        );
        assert_eq!(
            parse_line(b"g:+2|g").unwrap().value,
            Value::Gauge {
                value: 2.0,
                delta: true,
            }
        );
        assert_eq!(
            parse_line(b"g:-1|g|@0.1").unwrap().value,
            Value::Gauge {
                value: -1.0,
                delta: true,
            }
        );
    }

    #[test]
    fn test_parse_set_keeps_raw_member() {
        let s = parse_line(b"users:not-a-number|s").unwrap();
        assert_eq!(s.value, Value::Set(b"not-a-number".to_vec()));

        let s = parse_line(b"users:|s").unwrap();
        assert_eq!(s.value, Value::Set(Vec::new()));
    }

    #[test]
    fn test_parse_name_is_verbatim() {
        let s = parse_line(b"Foo.BAR-baz_1:1|c").unwrap();
        assert_eq!(s.name, b"Foo.BAR-baz_1".to_vec());

        let s = parse_line(b":1|c").unwrap();
        assert!(s.name.is_empty());
    }

    #[test]
    fn test_parse_value_may_hold_colon_after_the_first() {
        let s = parse_line(b"a:b:1|s").unwrap();
        assert_eq!(s.name, b"a".to_vec());
        assert_eq!(s.value, Value::Set(b"b:1".to_vec()));
    }

    #[test]
    fn test_reject_malformed() {
        assert!(parse_line(b"boo").is_none());
        assert!(parse_line(b"boo:1|c|@boo").is_none());
        assert!(parse_line(b"boo:1").is_none());
        assert!(parse_line(b"boo:1|c|@|b").is_none());
        assert!(parse_line(b"boo:foo|c").is_none());
        assert!(parse_line(b"boo:1|h").is_none());
        assert!(parse_line(b"boo:1|c|0.1").is_none());
        assert!(parse_line(b"boo:1|c|@0").is_none());
        assert!(parse_line(b"boo:1|c|@-1").is_none());
        assert!(parse_line(b"boo:nan|ms").is_none());
        assert!(parse_line(b"boo:|g").is_none());
    }

    #[test]
    fn test_parse_statsd_skips_bad_siblings() {
        let mut res = Vec::new();
        let packet = b"a:1|c\nbroken\nb:2|ms\r\n\nc:x|c\nd:1|s\n";
        assert_eq!(parse_statsd(packet, &mut res), 3);
        assert_eq!(res[0].name, b"a".to_vec());
        assert_eq!(res[1].name, b"b".to_vec());
        assert_eq!(res[1].value, Value::Timer(2.0));
        assert_eq!(res[2].name, b"d".to_vec());
    }

    #[test]
    fn test_parse_statsd_appends() {
        let mut res = vec![Sample::new("x", Value::Counter(1.0))];
        assert_eq!(parse_statsd(b"y:1|c", &mut res), 1);
        assert_eq!(res.len(), 2);
    }

    #[test]
    fn test_lines_without_colon_never_parse() {
        fn inner(line: Vec<u8>) -> TestResult {
            if line.contains(&b':') {
                return TestResult::discard();
            }
            TestResult::from_bool(parse_line(&line).is_none())
        }
        QuickCheck::new()
            .tests(1000)
            .max_tests(10000)
            .quickcheck(inner as fn(Vec<u8>) -> TestResult);
    }

    #[test]
    fn test_counter_values_survive_parse() {
        fn inner(val: f64, rate: u8) -> TestResult {
            if val.is_nan() || rate == 0 {
                return TestResult::discard();
            }
            let rate = f64::from(rate) / 255.0;
            let line = format!("counter:{}|c|@{}", val, rate);
            match parse_line(line.as_bytes()) {
                Some(s) => TestResult::from_bool(
                    s.value == Value::Counter(val) && s.rate == rate,
                ),
                None => TestResult::failed(),
            }
        }
        QuickCheck::new()
            .tests(1000)
            .max_tests(10000)
            .quickcheck(inner as fn(f64, u8) -> TestResult);
    }
}
