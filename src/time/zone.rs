//! Timezone offsets, including the minimal DST transition model required
//! by `CrontabSync`.
//!
//! No IANA tz-database crate is present in the dependency stack, so
//! zones are either a fixed UTC offset or a
//! two-offset (standard/daylight) rule with US/Canada-style transition
//! dates. This is enough to reproduce the documented America/Montreal
//! fall-back/spring-forward behavior without vendoring a tz database.

use time::{Month, UtcOffset, Weekday};

use super::{DateTime, ElapsedTime};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ZoneKind {
    Fixed(UtcOffset),
    UsCanadaEastern,
}

/// A named timezone: either a fixed offset, or a standard/daylight pair
/// with a transition rule.
#[derive(Clone, Copy, Debug)]
pub struct Zone {
    kind: ZoneKind,
}

impl Zone {
    pub fn utc() -> Self {
        Zone {
            kind: ZoneKind::Fixed(UtcOffset::UTC),
        }
    }

    pub fn fixed(offset: UtcOffset) -> Self {
        Zone {
            kind: ZoneKind::Fixed(offset),
        }
    }

    /// America/Montreal follows the same daylight-saving transition dates
    /// as the rest of North American Eastern time.
    pub fn america_montreal() -> Self {
        Zone {
            kind: ZoneKind::UsCanadaEastern,
        }
    }

    /// The offset in force at the given UTC instant.
    pub fn offset_at(&self, utc: DateTime) -> UtcOffset {
        match self.kind {
            ZoneKind::Fixed(o) => o,
            ZoneKind::UsCanadaEastern => {
                if is_us_eastern_dst(utc) {
                    UtcOffset::from_hms(-4, 0, 0).unwrap()
                } else {
                    UtcOffset::from_hms(-5, 0, 0).unwrap()
                }
            }
        }
    }

    /// Offsets this zone can be in, ordered so that converting a naive
    /// local timestamp through each in turn yields ascending UTC instants.
    /// For a DST zone that is `[daylight, standard]`: the daylight offset
    /// is less negative (further east), so subtracting it from a naive
    /// local value yields an earlier UTC instant than subtracting the
    /// standard offset.
    fn candidate_offsets(&self) -> Vec<UtcOffset> {
        match self.kind {
            ZoneKind::Fixed(o) => vec![o],
            ZoneKind::UsCanadaEastern => vec![
                UtcOffset::from_hms(-4, 0, 0).unwrap(),
                UtcOffset::from_hms(-5, 0, 0).unwrap(),
            ],
        }
    }

    /// Maps a "naive" local wall-clock value (a [`DateTime`] whose integer
    /// value is to be interpreted as that many microseconds past the epoch
    /// *as if the zone were UTC*) to the actual UTC instant(s) that display
    /// as that wall clock in this zone.
    ///
    /// Returns zero instants for a wall-clock value inside a
    /// spring-forward gap, one for an unambiguous value, and two — earlier
    /// UTC instant first — for a value inside a fall-back overlap.
    pub fn local_to_utc_instants(&self, naive: DateTime) -> Vec<DateTime> {
        let mut out = Vec::new();
        for offset in self.candidate_offsets() {
            let candidate = naive - ElapsedTime::from_seconds(offset.whole_seconds() as i64);
            if self.offset_at(candidate) == offset {
                out.push(candidate);
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

/// True if `utc` falls within US/Canada Eastern daylight saving time,
/// using the 2007+ rule (DST from the second Sunday of March to the first
/// Sunday of November) for years 2007 and later, and the pre-2007 rule
/// (first Sunday of April to last Sunday of October) for earlier years.
fn is_us_eastern_dst(utc: DateTime) -> bool {
    let odt = utc.to_offset_date_time(UtcOffset::UTC);
    let year = odt.year();

    let (start, end) = if year >= 2007 {
        (
            nth_sunday_2am_local(year, Month::March, 2, UtcOffset::from_hms(-5, 0, 0).unwrap()),
            nth_sunday_2am_local(
                year,
                Month::November,
                1,
                UtcOffset::from_hms(-4, 0, 0).unwrap(),
            ),
        )
    } else {
        (
            nth_sunday_2am_local(year, Month::April, 1, UtcOffset::from_hms(-5, 0, 0).unwrap()),
            last_sunday_2am_local(year, Month::October, UtcOffset::from_hms(-4, 0, 0).unwrap()),
        )
    };

    utc >= start && utc < end
}

/// UTC instant of 02:00 local (at the given pre-transition offset) on the
/// `n`th Sunday of `month` in `year`.
fn nth_sunday_2am_local(year: i32, month: Month, n: u8, local_offset: UtcOffset) -> DateTime {
    let date = nth_weekday(year, month, Weekday::Sunday, n);
    let local_micros = date_to_micros(date) + 2 * 3_600_000_000;
    DateTime::from_micros(local_micros) - ElapsedTime::from_seconds(local_offset.whole_seconds() as i64)
}

fn last_sunday_2am_local(year: i32, month: Month, local_offset: UtcOffset) -> DateTime {
    let date = last_weekday(year, month, Weekday::Sunday);
    let local_micros = date_to_micros(date) + 2 * 3_600_000_000;
    DateTime::from_micros(local_micros) - ElapsedTime::from_seconds(local_offset.whole_seconds() as i64)
}

fn date_to_micros(date: time::Date) -> i64 {
    let odt = date.with_hms(0, 0, 0).unwrap().assume_utc();
    odt.unix_timestamp() * 1_000_000
}

fn nth_weekday(year: i32, month: Month, weekday: Weekday, n: u8) -> time::Date {
    let first = time::Date::from_calendar_date(year, month, 1).unwrap();
    let offset = (7 + weekday.number_days_from_sunday() as i64
        - first.weekday().number_days_from_sunday() as i64)
        % 7;
    let day = 1 + offset + 7 * (n as i64 - 1);
    time::Date::from_calendar_date(year, month, day as u8).unwrap()
}

fn last_weekday(year: i32, month: Month, weekday: Weekday) -> time::Date {
    let next_month_first = if month == Month::December {
        time::Date::from_calendar_date(year + 1, Month::January, 1).unwrap()
    } else {
        time::Date::from_calendar_date(year, month.next(), 1).unwrap()
    };
    let last_day = next_month_first.previous_day().unwrap();
    let back = (7 + last_day.weekday().number_days_from_sunday() as i64
        - weekday.number_days_from_sunday() as i64)
        % 7;
    last_day - time::Duration::days(back)
}
