//! Clocks, the flush ticker and retry backoff.

use chrono::Utc;
use constants;
use std::cmp;
use std::thread;
use std::time::Duration;

/// Source of wall-clock time and of sleeping.
///
/// The flush path only ever reads time and waits through a `Clock`, which
/// lets tests drive it with a simulated one.
pub trait Clock {
    /// Seconds since the Unix epoch.
    fn now(&self) -> f64;
    /// Suspend the calling thread for `dur`.
    fn sleep(&self, dur: Duration);
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        let now = Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1_000_000_000.0
    }

    fn sleep(&self, dur: Duration) {
        thread::sleep(dur)
    }
}

impl<'a, C> Clock for &'a C
where
    C: Clock + ?Sized,
{
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn sleep(&self, dur: Duration) {
        (**self).sleep(dur)
    }
}

/// Drift-free fixed interval ticks.
///
/// Each tick is the previous logical tick plus the interval, never the time
/// the thread actually woke. If the consumer falls behind, the next tick is
/// yielded immediately rather than skipped, so ticks are evenly spaced and
/// never repeat.
#[derive(Debug)]
pub struct Ticker<C> {
    clock: C,
    interval: f64,
    next_tick: f64,
}

impl<C> Ticker<C>
where
    C: Clock,
{
    /// Start ticking from the clock's present. The first tick lands one
    /// `interval` from now.
    pub fn new(clock: C, interval: Duration) -> Ticker<C> {
        let next_tick = clock.now();
        Ticker {
            clock: clock,
            interval: interval.as_secs_f64(),
            next_tick: next_tick,
        }
    }
}

impl<C> Iterator for Ticker<C>
where
    C: Clock,
{
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        self.next_tick += self.interval;
        let to_sleep = self.next_tick - self.clock.now();
        if to_sleep > 0.0 {
            self.clock.sleep(Duration::from_secs_f64(to_sleep));
        }
        Some(self.next_tick)
    }
}

/// The delay to wait after a failed attempt that itself waited `delay`:
/// one and a half times longer, capped at `constants::BACKOFF_MAX`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use sluice::time::backoff;
///
/// assert_eq!(backoff(Duration::from_secs(2)), Duration::from_secs(3));
/// assert_eq!(backoff(Duration::from_secs(50)), Duration::from_secs(60));
/// ```
pub fn backoff(delay: Duration) -> Duration {
    cmp::min(delay.mul_f64(constants::BACKOFF_MULTIPLIER), constants::BACKOFF_MAX)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};
    use std::cell::Cell;
    use std::rc::Rc;

    /// A simulated clock. Sleeping advances it instantly; `advance` stands in
    /// for time spent working.
    #[derive(Debug, Clone)]
    pub struct MockClock {
        now: Rc<Cell<f64>>,
        slept: Rc<Cell<f64>>,
    }

    impl MockClock {
        pub fn new(start: f64) -> MockClock {
            MockClock {
                now: Rc::new(Cell::new(start)),
                slept: Rc::new(Cell::new(0.0)),
            }
        }

        pub fn advance(&self, secs: f64) {
            self.now.set(self.now.get() + secs);
        }

        pub fn slept(&self) -> f64 {
            self.slept.get()
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> f64 {
            self.now.get()
        }

        fn sleep(&self, dur: Duration) {
            let secs = dur.as_secs_f64();
            self.slept.set(self.slept.get() + secs);
            self.advance(secs);
        }
    }

    #[test]
    fn ticks_are_evenly_spaced() {
        let clock = MockClock::new(1000.0);
        let ticks: Vec<f64> = Ticker::new(clock.clone(), Duration::from_secs(10))
            .take(4)
            .collect();
        assert_eq!(ticks, vec![1010.0, 1020.0, 1030.0, 1040.0]);
    }

    #[test]
    fn slow_iteration_does_not_skip_ticks() {
        let clock = MockClock::new(0.0);
        let mut ticker = Ticker::new(clock.clone(), Duration::from_secs(10));
        assert_eq!(ticker.next(), Some(10.0));
        // flush took three whole intervals
        clock.advance(30.0);
        let before = clock.slept();
        assert_eq!(ticker.next(), Some(20.0));
        assert_eq!(ticker.next(), Some(30.0));
        assert_eq!(clock.slept(), before);
        assert_eq!(ticker.next(), Some(40.0));
        assert_eq!(ticker.next(), Some(50.0));
        assert!(clock.slept() > before);
    }

    #[test]
    fn tick_spacing_ignores_jitter() {
        fn inner(delays: Vec<u8>) -> TestResult {
            let clock = MockClock::new(500.0);
            let mut ticker = Ticker::new(clock.clone(), Duration::from_secs(5));
            let mut prev = match ticker.next() {
                Some(t) => t,
                None => return TestResult::failed(),
            };
            for d in delays {
                clock.advance(f64::from(d) / 10.0);
                let t = match ticker.next() {
                    Some(t) => t,
                    None => return TestResult::failed(),
                };
                if t - prev != 5.0 {
                    return TestResult::failed();
                }
                prev = t;
            }
            TestResult::passed()
        }
        QuickCheck::new()
            .tests(200)
            .quickcheck(inner as fn(Vec<u8>) -> TestResult);
    }

    #[test]
    fn backoff_grows_then_caps() {
        let mut delay = constants::BACKOFF_INITIAL;
        let mut seen = vec![delay];
        for _ in 0..20 {
            delay = backoff(delay);
            seen.push(delay);
        }
        assert_eq!(seen[1], Duration::from_millis(1_500));
        assert_eq!(seen[2], Duration::from_millis(2_250));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), constants::BACKOFF_MAX);
    }
}
