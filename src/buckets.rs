//! Buckets are the primary internal storage type.
//!
//! One `Buckets` holds everything received during a single flush window:
//! counters, timers, gauges and sets, each keyed by raw metric name. Keys
//! enumerate in the order they were first seen so output is stable from
//! window to window.
//!
//! Counters, timers and sets are window scoped. Gauges are levels, not
//! activity, and carry over: see `swap`.

use indexmap::IndexMap;
use metric::{Sample, Value};
use stats;
use std::collections::HashSet;
use std::io::Write;
use std::mem;

/// Buckets stores all samples until they are flushed.
#[derive(Debug, Clone, Default)]
pub struct Buckets {
    counters: IndexMap<Vec<u8>, f64>,
    timers: IndexMap<Vec<u8>, Vec<f64>>,
    timer_counts: IndexMap<Vec<u8>, f64>,
    gauges: IndexMap<Vec<u8>, f64>,
    sets: IndexMap<Vec<u8>, HashSet<Vec<u8>>>,
}

/// Split a retiring `Buckets` into a fresh live one and the retired one.
///
/// The fresh `Buckets` starts with a copy of the retiring gauges and nothing
/// else. No I/O happens here; callers sharing a `Buckets` between threads
/// must perform the swap under the same lock that guards `add`.
///
/// # Examples
///
/// ```
/// use sluice::buckets::{self, Buckets};
/// use sluice::metric::{Sample, Value};
///
/// let mut bkt = Buckets::default();
/// bkt.add(Sample::new("hits", Value::Counter(1.0)));
/// bkt.add(Sample::new("level", Value::Gauge { value: 3.0, delta: false }));
///
/// let (live, retired) = buckets::swap(bkt);
/// assert!(live.counters().is_empty());
/// assert_eq!(live.gauges(), retired.gauges());
/// ```
pub fn swap(current: Buckets) -> (Buckets, Buckets) {
    let live = Buckets::with_gauges(current.gauges.clone());
    (live, current)
}

impl Buckets {
    /// Create a `Buckets` seeded with the given gauge levels.
    pub fn with_gauges(gauges: IndexMap<Vec<u8>, f64>) -> Buckets {
        Buckets {
            gauges: gauges,
            ..Default::default()
        }
    }

    /// In-place form of `swap`: replace `self` with its successor and return
    /// the retired window.
    pub fn rotate(&mut self) -> Buckets {
        let (live, retired) = swap(mem::replace(self, Buckets::default()));
        *self = live;
        retired
    }

    /// Adds a sample to the bucket storage.
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice::buckets::Buckets;
    /// use sluice::protocols::statsd::parse_line;
    ///
    /// let mut bucket = Buckets::default();
    /// bucket.add(parse_line(b"foo:1|c|@0.5").unwrap());
    /// assert_eq!(bucket.counters()[&b"foo".to_vec()], 2.0);
    /// ```
    pub fn add(&mut self, sample: Sample) {
        let rate = sample.rate;
        match sample.value {
            Value::Counter(v) => self.add_counter(&sample.name, v, rate),
            Value::Timer(v) => self.add_timer(&sample.name, v, rate),
            Value::Gauge { value, delta } => self.add_gauge(&sample.name, value, delta, rate),
            Value::Set(member) => self.add_set(&sample.name, member, rate),
        }
    }

    /// `counters[name] += value / rate`
    pub fn add_counter(&mut self, name: &[u8], value: f64, rate: f64) {
        let inc = value / rate;
        if let Some(v) = self.counters.get_mut(name) {
            *v += inc;
            return;
        }
        self.counters.insert(name.to_vec(), inc);
    }

    /// Record a timing given in milliseconds. The value is stored in seconds
    /// and the list for `name` stays sorted ascending. The sample count is
    /// rate compensated independently of the list length.
    pub fn add_timer(&mut self, name: &[u8], millis: f64, rate: f64) {
        debug_assert!(!millis.is_nan());
        let secs = millis / 1000.0;
        let inc = 1.0 / rate;
        if let Some(vs) = self.timers.get_mut(name) {
            let idx = vs.partition_point(|&x| x <= secs);
            vs.insert(idx, secs);
            if let Some(c) = self.timer_counts.get_mut(name) {
                *c += inc;
            }
            return;
        }
        self.timers.insert(name.to_vec(), vec![secs]);
        self.timer_counts.insert(name.to_vec(), inc);
    }

    /// Set or adjust a gauge level.
    ///
    /// An absolute update overwrites and ignores `rate`. A delta update adds
    /// `value / rate` to an existing level; against an unknown name it is
    /// dropped, there being no level to adjust.
    pub fn add_gauge(&mut self, name: &[u8], value: f64, delta: bool, rate: f64) {
        if delta {
            if let Some(v) = self.gauges.get_mut(name) {
                *v += value / rate;
            }
            return;
        }
        if let Some(v) = self.gauges.get_mut(name) {
            *v = value;
            return;
        }
        self.gauges.insert(name.to_vec(), value);
    }

    /// Add `member` to the set for `name`. Set cardinality is not scaled by
    /// the sampling rate.
    pub fn add_set(&mut self, name: &[u8], member: Vec<u8>, _rate: f64) {
        if let Some(set) = self.sets.get_mut(name) {
            set.insert(member);
            return;
        }
        let mut set = HashSet::new();
        set.insert(member);
        self.sets.insert(name.to_vec(), set);
    }

    /// Accumulated, rate compensated counters.
    pub fn counters(&self) -> &IndexMap<Vec<u8>, f64> {
        &self.counters
    }

    /// Sorted timer samples, in seconds.
    pub fn timers(&self) -> &IndexMap<Vec<u8>, Vec<f64>> {
        &self.timers
    }

    /// Rate compensated timer sample counts.
    pub fn timer_counts(&self) -> &IndexMap<Vec<u8>, f64> {
        &self.timer_counts
    }

    /// Current gauge levels.
    pub fn gauges(&self) -> &IndexMap<Vec<u8>, f64> {
        &self.gauges
    }

    /// Distinct set members.
    pub fn sets(&self) -> &IndexMap<Vec<u8>, HashSet<Vec<u8>>> {
        &self.sets
    }

    /// True when `extract` would yield nothing.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.timers.is_empty() && self.gauges.is_empty()
            && self.sets.is_empty()
    }

    /// Flatten the buckets into `Point`s.
    ///
    /// Points come out in a fixed order: counters (`.count`), timer counts
    /// (`.count`), timer summaries (`.upper`, `.lower`, `.mean`, `.stdev` and
    /// one `.pN` per entry of `percentiles`, in that order), gauges and
    /// finally set cardinalities. Within a section names keep their
    /// first-seen order. The iterator is lazy; timer statistics are computed
    /// as it reaches them.
    pub fn extract<'a>(&'a self, percentiles: &'a [u32]) -> impl Iterator<Item = Point<'a>> + 'a {
        let counters = self.counters
            .iter()
            .map(|(k, v)| Point::new(k, Stat::Count, *v));
        let timer_counts = self.timer_counts
            .iter()
            .map(|(k, v)| Point::new(k, Stat::Count, *v));
        let timers = self.timers
            .iter()
            .flat_map(move |(k, vs)| Summary::new(k, vs, percentiles));
        let gauges = self.gauges
            .iter()
            .map(|(k, v)| Point::new(k, Stat::Bare, *v));
        let sets = self.sets
            .iter()
            .map(|(k, set)| Point::new(k, Stat::Bare, set.len() as f64));
        counters
            .chain(timer_counts)
            .chain(timers)
            .chain(gauges)
            .chain(sets)
    }
}

/// The statistic a `Point` carries, and so the suffix of its name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stat {
    /// No suffix: gauges and sets.
    Bare,
    /// `.count`
    Count,
    /// `.upper`, the largest timer sample.
    Upper,
    /// `.lower`, the smallest timer sample.
    Lower,
    /// `.mean`
    Mean,
    /// `.stdev`, population standard deviation.
    Stdev,
    /// `.pN`
    Percentile(u32),
}

/// One emitted `(name, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point<'a> {
    /// The metric name the point derives from.
    pub name: &'a [u8],
    /// Which statistic of that metric this is.
    pub stat: Stat,
    /// The value.
    pub value: f64,
}

impl<'a> Point<'a> {
    fn new(name: &'a [u8], stat: Stat, value: f64) -> Point<'a> {
        Point {
            name: name,
            stat: stat,
            value: value,
        }
    }

    /// Write the derived name, suffix included, onto `buf`.
    pub fn write_name(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.name);
        match self.stat {
            Stat::Bare => {}
            Stat::Count => buf.extend_from_slice(b".count"),
            Stat::Upper => buf.extend_from_slice(b".upper"),
            Stat::Lower => buf.extend_from_slice(b".lower"),
            Stat::Mean => buf.extend_from_slice(b".mean"),
            Stat::Stdev => buf.extend_from_slice(b".stdev"),
            Stat::Percentile(p) => {
                // writing into a Vec does not fail
                let _ = write!(buf, ".p{}", p);
            }
        }
    }

    /// The derived name as an owned byte string.
    pub fn full_name(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.name.len() + 8);
        self.write_name(&mut buf);
        buf
    }
}

/// Lazily emits the summary points of one timer.
struct Summary<'a> {
    name: &'a [u8],
    samples: &'a [f64],
    percentiles: &'a [u32],
    mean: Option<f64>,
    idx: usize,
}

impl<'a> Summary<'a> {
    fn new(name: &'a [u8], samples: &'a [f64], percentiles: &'a [u32]) -> Summary<'a> {
        Summary {
            name: name,
            samples: samples,
            percentiles: percentiles,
            mean: None,
            idx: 0,
        }
    }

    fn mean(&mut self) -> f64 {
        match self.mean {
            Some(m) => m,
            None => {
                let m = stats::mean(self.samples);
                self.mean = Some(m);
                m
            }
        }
    }
}

impl<'a> Iterator for Summary<'a> {
    type Item = Point<'a>;

    fn next(&mut self) -> Option<Point<'a>> {
        if self.samples.is_empty() {
            return None;
        }
        let idx = self.idx;
        self.idx += 1;
        let (stat, value) = match idx {
            0 => (Stat::Upper, self.samples[self.samples.len() - 1]),
            1 => (Stat::Lower, self.samples[0]),
            2 => (Stat::Mean, self.mean()),
            3 => {
                let m = self.mean();
                (Stat::Stdev, stats::pstdev(self.samples, m))
            }
            n => match self.percentiles.get(n - 4) {
                Some(&p) => (
                    Stat::Percentile(p),
                    stats::percentile(self.samples, f64::from(p)),
                ),
                None => return None,
            },
        };
        Some(Point::new(self.name, stat, value))
    }
}
