//! Restartable iterators over scheduled stamps.
//!
//! `Sync::next_stamp`/`prev_stamp` are pure functions of a reference stamp;
//! there is no cursor state to restart, which is what makes a `Sync`
//! restartable across process crashes.

use time::Weekday as TimeWeekday;

use crate::error::{PointError, Result};

use super::zone::Zone;
use super::{DateTime, ElapsedTime};

/// A schedule of instants. `next_stamp`/`prev_stamp` find the adjacent
/// scheduled stamp relative to an arbitrary reference stamp.
pub trait Sync: Send + Sync {
    /// Smallest scheduled stamp `> s` (or `>= s` when `strict` is false and
    /// `s` itself is on schedule).
    fn next_stamp(&self, s: DateTime, strict: bool) -> Result<DateTime>;

    /// Largest scheduled stamp `< s` (or `<= s` when `strict` is false and
    /// `s` itself is on schedule).
    fn prev_stamp(&self, s: DateTime, strict: bool) -> Result<DateTime>;
}

/// A fixed-period schedule: stamps at `offset + k * period` for integer `k`.
#[derive(Clone, Copy, Debug)]
pub struct ElapsedSync {
    period: ElapsedTime,
    offset: ElapsedTime,
}

impl ElapsedSync {
    pub fn new(period: ElapsedTime, offset: ElapsedTime) -> Result<Self> {
        if period.micros() <= 0 {
            return Err(PointError::BadParameter(
                "ElapsedSync period must be positive".into(),
            ));
        }
        Ok(ElapsedSync { period, offset })
    }

    fn floor_index(&self, s: DateTime) -> (i64, DateTime) {
        let rel = (s - DateTime::EPOCH).micros() - self.offset.micros();
        let period = self.period.micros();
        let k = rel.div_euclid(period);
        let base = DateTime::EPOCH + self.offset + ElapsedTime::from_micros(k * period);
        (k, base)
    }
}

impl Sync for ElapsedSync {
    fn next_stamp(&self, s: DateTime, strict: bool) -> Result<DateTime> {
        let (_, base) = self.floor_index(s);
        if base == s {
            if strict {
                Ok(base + self.period)
            } else {
                Ok(base)
            }
        } else {
            Ok(base + self.period)
        }
    }

    fn prev_stamp(&self, s: DateTime, strict: bool) -> Result<DateTime> {
        let (_, base) = self.floor_index(s);
        if base == s && strict {
            Ok(base - self.period)
        } else {
            Ok(base)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Field {
    Any,
    Values(Vec<u8>),
}

impl Field {
    fn parse(token: &str) -> Result<Self> {
        if token == "*" {
            return Ok(Field::Any);
        }
        let mut values = Vec::new();
        for part in token.split(',') {
            let v: u8 = part
                .trim()
                .parse()
                .map_err(|_| PointError::BadParameter(format!("bad cron field {token:?}")))?;
            values.push(v);
        }
        values.sort_unstable();
        values.dedup();
        Ok(Field::Values(values))
    }

    fn matches(&self, value: u8) -> bool {
        match self {
            Field::Any => true,
            Field::Values(v) => v.binary_search(&value).is_ok(),
        }
    }
}

/// A cron-style schedule evaluated against wall-clock fields in `zone`.
///
/// Accepts either a single field (interpreted as `minute`, the rest
/// wildcards — e.g. `"0"` for "top of every hour") or the standard five
/// whitespace-separated fields `minute hour day-of-month month
/// day-of-week`, each `*` or a comma-separated list of integers.
pub struct CrontabSync {
    minute: Field,
    hour: Field,
    dom: Field,
    month: Field,
    dow: Field,
    zone: Zone,
}

const SEARCH_HORIZON_MINUTES: i64 = 6_000_000; // roughly 11 years

impl CrontabSync {
    pub fn parse(expr: &str, zone: Zone) -> Result<Self> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        let (minute, hour, dom, month, dow) = match tokens.as_slice() {
            [minute] => (
                Field::parse(minute)?,
                Field::Any,
                Field::Any,
                Field::Any,
                Field::Any,
            ),
            [minute, hour, dom, month, dow] => (
                Field::parse(minute)?,
                Field::parse(hour)?,
                Field::parse(dom)?,
                Field::parse(month)?,
                Field::parse(dow)?,
            ),
            _ => {
                return Err(PointError::BadParameter(format!(
                    "cron expression must have 1 or 5 fields: {expr:?}"
                )))
            }
        };
        Ok(CrontabSync {
            minute,
            hour,
            dom,
            month,
            dow,
            zone,
        })
    }

    fn matches(&self, utc: DateTime) -> bool {
        let offset = self.zone.offset_at(utc);
        let odt = utc.to_offset_date_time(offset);
        if odt.second() != 0 || odt.microsecond() != 0 {
            return false;
        }
        let weekday_num = match odt.weekday() {
            TimeWeekday::Sunday => 0,
            TimeWeekday::Monday => 1,
            TimeWeekday::Tuesday => 2,
            TimeWeekday::Wednesday => 3,
            TimeWeekday::Thursday => 4,
            TimeWeekday::Friday => 5,
            TimeWeekday::Saturday => 6,
        };
        self.minute.matches(odt.minute())
            && self.hour.matches(odt.hour())
            && self.dom.matches(odt.day())
            && self.month.matches(odt.month() as u8)
            && self.dow.matches(weekday_num)
    }

    fn minute_floor(s: DateTime) -> DateTime {
        let micros = s.micros();
        DateTime::from_micros(micros.div_euclid(60_000_000) * 60_000_000)
    }
}

impl Sync for CrontabSync {
    fn next_stamp(&self, s: DateTime, strict: bool) -> Result<DateTime> {
        let mut candidate = Self::minute_floor(s);
        if candidate < s {
            candidate = candidate + ElapsedTime::from_seconds(60);
        }
        for _ in 0..SEARCH_HORIZON_MINUTES {
            if self.matches(candidate) {
                if candidate > s || (candidate == s && !strict) {
                    return Ok(candidate);
                }
            }
            candidate = candidate + ElapsedTime::from_seconds(60);
        }
        Err(PointError::NotFound(
            "no scheduled stamp within search horizon".into(),
        ))
    }

    fn prev_stamp(&self, s: DateTime, strict: bool) -> Result<DateTime> {
        let mut candidate = Self::minute_floor(s);
        for _ in 0..SEARCH_HORIZON_MINUTES {
            if self.matches(candidate) {
                if candidate < s || (candidate == s && !strict) {
                    return Ok(candidate);
                }
            }
            candidate = candidate - ElapsedTime::from_seconds(60);
        }
        Err(PointError::NotFound(
            "no scheduled stamp within search horizon".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_sync_hourly() {
        let sync = ElapsedSync::new(ElapsedTime::from_seconds(3600), ElapsedTime::ZERO).unwrap();
        let s = DateTime::from_micros(3_700 * 1_000_000);
        let next = sync.next_stamp(s, true).unwrap();
        assert_eq!(next, DateTime::from_micros(7_200 * 1_000_000));
        let prev = sync.prev_stamp(s, true).unwrap();
        assert_eq!(prev, DateTime::from_micros(3_600 * 1_000_000));
    }

    #[test]
    fn elapsed_sync_adjacency_property() {
        let sync = ElapsedSync::new(ElapsedTime::from_seconds(900), ElapsedTime::ZERO).unwrap();
        for raw in [0i64, 37, 900, 901, 1799, -50] {
            let t = DateTime::from_micros(raw * 1_000_000);
            let next = sync.next_stamp(t, false).unwrap();
            let back = sync.prev_stamp(next, false).unwrap();
            assert!(back <= t);
            let prev = sync.prev_stamp(t, false).unwrap();
            let fwd = sync.next_stamp(prev, false).unwrap();
            assert!(fwd >= t);
        }
    }

    #[test]
    fn montreal_fall_dst_scenario_s3() {
        let zone = Zone::america_montreal();
        let sync = CrontabSync::parse("0", zone).unwrap();
        let start = DateTime::from_string("2005-10-29T23:00:00-04:00").unwrap();

        let mut stamps = Vec::new();
        let mut cur = sync.next_stamp(start, true).unwrap();
        for _ in 0..5 {
            stamps.push(cur);
            cur = sync.next_stamp(cur, true).unwrap();
        }

        let expected = [
            DateTime::from_string("2005-10-30T00:00:00-04:00").unwrap(),
            DateTime::from_string("2005-10-30T01:00:00-04:00").unwrap(),
            DateTime::from_string("2005-10-30T01:00:00-05:00").unwrap(),
            DateTime::from_string("2005-10-30T02:00:00-05:00").unwrap(),
            DateTime::from_string("2005-10-30T03:00:00-05:00").unwrap(),
        ];
        assert_eq!(stamps, expected);

        // Reverse iteration from the last stamp retraces the same sequence.
        let mut back = stamps[stamps.len() - 1];
        let mut reversed = vec![back];
        for _ in 0..4 {
            back = sync.prev_stamp(back, true).unwrap();
            reversed.push(back);
        }
        reversed.reverse();
        assert_eq!(reversed, stamps);
    }
}
