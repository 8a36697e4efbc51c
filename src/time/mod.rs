//! Microsecond-precision timestamps and the [`Clock`] capability.
//!
//! `DateTime` is a 64-bit microsecond counter with total ordering, wide
//! enough to span 12754 B.C. to 16472 A.D.
//! Time is never read from a global; every subsystem that needs "now"
//! takes a [`Clock`].

pub mod sync;
pub mod zone;

use std::fmt;
use std::ops::{Add, Sub};
use std::time::{SystemTime, UNIX_EPOCH};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{PointError, Result};
pub use zone::Zone;

/// Microseconds since the Unix epoch (1970-01-01T00:00:00Z). Signed, so
/// dates before the epoch are representable; `i64` microseconds covers a
/// range far wider than the documented 12754 B.C. to 16472 A.D. span.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct DateTime(i64);

/// A signed microsecond duration, used for arithmetic on [`DateTime`] and
/// for filter/sync periods.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct ElapsedTime(i64);

impl DateTime {
    pub const EPOCH: DateTime = DateTime(0);

    pub const fn from_micros(micros: i64) -> Self {
        DateTime(micros)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    pub fn from_millis(millis: i64) -> Self {
        DateTime(millis.saturating_mul(1_000))
    }

    pub fn to_millis(self) -> i64 {
        self.0.div_euclid(1_000)
    }

    /// The smallest representable instant strictly after `self`.
    pub fn after(self) -> Self {
        DateTime(self.0.saturating_add(1))
    }

    /// The largest representable instant strictly before `self`.
    pub fn before(self) -> Self {
        DateTime(self.0.saturating_sub(1))
    }

    /// Floors `self` to midnight in the given zone.
    pub fn midnight(self, zone: &Zone) -> Self {
        let offset = zone.offset_at(self);
        let local = self.0 + offset.whole_seconds() as i64 * 1_000_000;
        let floored = local.div_euclid(86_400_000_000);
        DateTime(floored * 86_400_000_000 - offset.whole_seconds() as i64 * 1_000_000)
    }

    /// Parses an ISO-8601 string with microseconds and a zone offset.
    pub fn from_string(s: &str) -> Result<Self> {
        let odt = OffsetDateTime::parse(s, &Rfc3339)
            .map_err(|e| PointError::FormatError(format!("bad datetime {s:?}: {e}")))?;
        Self::from_offset_date_time(odt)
    }

    /// Renders an ISO-8601 string with microseconds at the given zone
    /// offset.
    pub fn to_string_at(self, zone: &Zone) -> String {
        let offset = zone.offset_at(self);
        let odt = self.to_offset_date_time(offset);
        odt.format(&Rfc3339)
            .unwrap_or_else(|_| "<unrepresentable>".to_string())
    }

    pub fn to_offset_date_time(self, offset: time::UtcOffset) -> OffsetDateTime {
        let micros = self.0;
        let secs = micros.div_euclid(1_000_000);
        let rem_micros = micros.rem_euclid(1_000_000);
        OffsetDateTime::UNIX_EPOCH
            .saturating_add(time::Duration::seconds(secs))
            .saturating_add(time::Duration::microseconds(rem_micros))
            .to_offset(offset)
    }

    fn from_offset_date_time(odt: OffsetDateTime) -> Result<Self> {
        let unix_odt = odt.to_offset(time::UtcOffset::UTC);
        let secs = unix_odt.unix_timestamp();
        let micros = unix_odt.microsecond() as i64;
        Ok(DateTime(
            secs.saturating_mul(1_000_000).saturating_add(micros),
        ))
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateTime({})", self.0)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_at(&Zone::utc()))
    }
}

impl Add<ElapsedTime> for DateTime {
    type Output = DateTime;
    fn add(self, rhs: ElapsedTime) -> DateTime {
        DateTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub<ElapsedTime> for DateTime {
    type Output = DateTime;
    fn sub(self, rhs: ElapsedTime) -> DateTime {
        DateTime(self.0.saturating_sub(rhs.0))
    }
}

impl Sub<DateTime> for DateTime {
    type Output = ElapsedTime;
    fn sub(self, rhs: DateTime) -> ElapsedTime {
        ElapsedTime(self.0.saturating_sub(rhs.0))
    }
}

impl ElapsedTime {
    pub const ZERO: ElapsedTime = ElapsedTime(0);

    pub const fn from_micros(micros: i64) -> Self {
        ElapsedTime(micros)
    }

    pub const fn from_millis(millis: i64) -> Self {
        ElapsedTime(millis * 1_000)
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        ElapsedTime(seconds * 1_000_000)
    }

    pub const fn micros(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Self {
        ElapsedTime(self.0.abs())
    }
}

/// Capability for obtaining the current instant. Production code uses
/// [`SystemClock`]; tests inject [`SimClock`] to pin and advance time
/// instead of relying on a global mutable clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime;
}

/// Reads the current wall-clock time from the OS.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        DateTime(now.as_micros() as i64)
    }
}

/// A controllable clock for tests: starts at a fixed instant and only
/// advances when told to.
#[derive(Debug)]
pub struct SimClock(parking_lot::Mutex<DateTime>);

impl SimClock {
    pub fn new(start: DateTime) -> Self {
        SimClock(parking_lot::Mutex::new(start))
    }

    pub fn set(&self, at: DateTime) {
        *self.0.lock() = at;
    }

    pub fn advance(&self, by: ElapsedTime) {
        let mut guard = self.0.lock();
        *guard = *guard + by;
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime {
        *self.0.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_roundtrip() {
        let a = DateTime::from_micros(1_000_000);
        let b = a + ElapsedTime::from_seconds(61);
        assert_eq!(b - a, ElapsedTime::from_seconds(61));
    }

    #[test]
    fn before_after_bracket_self() {
        let t = DateTime::from_micros(42);
        assert!(t.before() < t);
        assert!(t.after() > t);
        assert_eq!(t.before().after(), t);
    }

    #[test]
    fn sim_clock_advances_only_when_told() {
        let clock = SimClock::new(DateTime::from_micros(0));
        assert_eq!(clock.now(), DateTime::from_micros(0));
        clock.advance(ElapsedTime::from_millis(5));
        assert_eq!(clock.now(), DateTime::from_micros(5_000));
    }

    #[test]
    fn string_roundtrip_utc() {
        let dt = DateTime::from_micros(1_700_000_000_123_456);
        let s = dt.to_string_at(&Zone::utc());
        let parsed = DateTime::from_string(&s).unwrap();
        assert_eq!(parsed, dt);
    }
}
