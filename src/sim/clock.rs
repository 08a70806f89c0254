use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;

/// Source of the local time each tick is simulated at.
pub trait Clock {
    /// Returns the time for the next tick.
    fn now(&mut self) -> DateTime<Tz>;
}

/// Wall-clock time in the site's zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// A simulated clock that advances a fixed step per reading.
///
/// # Examples
///
/// ```
/// use chrono::{TimeDelta, TimeZone};
/// use helios_sim::sim::clock::{Clock, SteppedClock};
///
/// let start = chrono_tz::UTC.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
/// let mut clock = SteppedClock::new(start, TimeDelta::minutes(15));
///
/// assert_eq!(clock.now(), start);
/// assert_eq!(clock.now(), start + TimeDelta::minutes(15));
/// ```
#[derive(Debug, Clone)]
pub struct SteppedClock {
    next: DateTime<Tz>,
    step: TimeDelta,
}

impl SteppedClock {
    pub fn new(start: DateTime<Tz>, step: TimeDelta) -> Self {
        Self { next: start, step }
    }

    /// The time the next call to [`Clock::now`] will return.
    pub fn peek(&self) -> DateTime<Tz> {
        self.next
    }
}

impl Clock for SteppedClock {
    fn now(&mut self) -> DateTime<Tz> {
        let current = self.next;
        self.next = current + self.step;
        current
    }
}
