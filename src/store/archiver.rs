//! Archiver policies: when a value that has
//! landed in the snapshot moves into the durable archive, and how long it
//! stays there once it has.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::model::{PointId, VersionedValue};
use crate::time::sync::Sync as SyncTrait;
use crate::time::{DateTime, ElapsedTime};

/// Per-point retention: how many rows to keep, how old a row may get, or
/// both. `None` in either field means that dimension is unbounded.
#[derive(Clone, Copy, Debug, Default)]
pub struct Retention {
    pub max_rows: Option<usize>,
    pub max_age: Option<ElapsedTime>,
}

/// Where an archiver stages values between a snapshot write and the
/// moment they become durably archived, and how it retires rows once
/// they age out of its retention policy.
pub trait Archiver: Send + Sync {
    /// Called on every snapshot write. Returns the values that should be
    /// committed to the archive now, if any.
    fn on_update(&self, versioned: VersionedValue) -> Vec<VersionedValue>;

    /// Called periodically to flush whatever a scheduled archiver is
    /// holding whose due time has passed.
    fn flush_due(&self, now: DateTime) -> Vec<VersionedValue>;

    /// Retention policy in force for `point`. The default archiver never
    /// retires anything on its own.
    fn retention(&self, _point: PointId) -> Retention {
        Retention::default()
    }

    /// Given every stamp currently archived for `point`, the stamp that
    /// must never be retired regardless of age or count (the point's
    /// current snapshot row, to preserve the snapshot-equals-newest-row
    /// invariant), and the current time, returns the stamps retention
    /// demands be removed.
    fn rows_to_retire(
        &self,
        point: PointId,
        mut stamps: Vec<DateTime>,
        keep: DateTime,
        now: DateTime,
    ) -> Vec<DateTime> {
        let retention = self.retention(point);
        if retention.max_rows.is_none() && retention.max_age.is_none() {
            return Vec::new();
        }
        stamps.sort();
        let mut doomed: HashSet<DateTime> = HashSet::new();
        if let Some(max_rows) = retention.max_rows {
            if stamps.len() > max_rows {
                doomed.extend(stamps[..stamps.len() - max_rows].iter().copied());
            }
        }
        if let Some(max_age) = retention.max_age {
            let cutoff = now - max_age;
            doomed.extend(stamps.iter().copied().filter(|stamp| *stamp < cutoff));
        }
        doomed.remove(&keep);
        let mut out: Vec<DateTime> = doomed.into_iter().collect();
        out.sort();
        out
    }
}

/// Archives every update immediately.
#[derive(Default)]
pub struct JitArchiver {
    retentions: Mutex<HashMap<PointId, Retention>>,
}

impl JitArchiver {
    pub fn new() -> Self {
        JitArchiver::default()
    }

    /// Installs the retention policy that governs `point` from now on.
    pub fn set_retention(&self, point: PointId, retention: Retention) {
        self.retentions.lock().insert(point, retention);
    }
}

impl Archiver for JitArchiver {
    fn on_update(&self, versioned: VersionedValue) -> Vec<VersionedValue> {
        vec![versioned]
    }

    fn flush_due(&self, _now: DateTime) -> Vec<VersionedValue> {
        Vec::new()
    }

    fn retention(&self, point: PointId) -> Retention {
        self.retentions.lock().get(&point).copied().unwrap_or_default()
    }
}

/// Buffers updates in an in-memory side table (the "attic") keyed by
/// point, archiving only the latest value per point when `sync` next
/// fires. Trades archive granularity for write amplification under
/// bursty updates.
pub struct ScheduledArchiver {
    sync: Box<dyn SyncTrait>,
    attic: Mutex<HashMap<PointId, VersionedValue>>,
    next_due: Mutex<Option<DateTime>>,
    retentions: Mutex<HashMap<PointId, Retention>>,
}

impl ScheduledArchiver {
    pub fn new(sync: Box<dyn SyncTrait>) -> Self {
        ScheduledArchiver {
            sync,
            attic: Mutex::new(HashMap::new()),
            next_due: Mutex::new(None),
            retentions: Mutex::new(HashMap::new()),
        }
    }

    /// Installs the retention policy that governs `point` from now on.
    pub fn set_retention(&self, point: PointId, retention: Retention) {
        self.retentions.lock().insert(point, retention);
    }
}

impl Archiver for ScheduledArchiver {
    fn on_update(&self, versioned: VersionedValue) -> Vec<VersionedValue> {
        self.attic
            .lock()
            .insert(versioned.point_value.point, versioned);
        Vec::new()
    }

    fn flush_due(&self, now: DateTime) -> Vec<VersionedValue> {
        let mut next_due = self.next_due.lock();
        let due = match *next_due {
            Some(due) => due,
            None => match self.sync.next_stamp(now, false) {
                Ok(due) => due,
                Err(_) => return Vec::new(),
            },
        };
        if now < due {
            *next_due = Some(due);
            return Vec::new();
        }
        *next_due = self.sync.next_stamp(now, true).ok();
        let mut attic = self.attic.lock();
        attic.drain().map(|(_, v)| v).collect()
    }

    fn retention(&self, point: PointId) -> Retention {
        self.retentions.lock().get(&point).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointValue;
    use crate::time::sync::ElapsedSync;
    use crate::time::ElapsedTime;
    use crate::value::Value;

    fn vv(point: u128, version: u64, stamp: i64) -> VersionedValue {
        VersionedValue {
            point_value: PointValue::new(PointId(point), DateTime::from_micros(stamp), Value::Int64(stamp)),
            version,
        }
    }

    #[test]
    fn jit_archives_immediately() {
        let archiver = JitArchiver::new();
        let out = archiver.on_update(vv(1, 1, 0));
        assert_eq!(out.len(), 1);
        assert!(archiver.flush_due(DateTime::from_micros(0)).is_empty());
    }

    #[test]
    fn unconfigured_retention_never_retires_anything() {
        let archiver = JitArchiver::new();
        let stamps = vec![DateTime::from_micros(0), DateTime::from_micros(1)];
        let doomed = archiver.rows_to_retire(PointId(1), stamps, DateTime::from_micros(1), DateTime::from_micros(1));
        assert!(doomed.is_empty());
    }

    #[test]
    fn max_rows_retires_the_oldest_excess_and_never_the_kept_stamp() {
        let archiver = JitArchiver::new();
        archiver.set_retention(
            PointId(1),
            Retention {
                max_rows: Some(3),
                max_age: None,
            },
        );
        let stamps = vec![
            DateTime::from_micros(1),
            DateTime::from_micros(2),
            DateTime::from_micros(3),
            DateTime::from_micros(4),
        ];
        let doomed = archiver.rows_to_retire(PointId(1), stamps, DateTime::from_micros(4), DateTime::from_micros(4));
        assert_eq!(doomed, vec![DateTime::from_micros(1)]);
    }

    #[test]
    fn max_rows_never_retires_the_kept_stamp_even_under_pathological_limits() {
        let archiver = JitArchiver::new();
        archiver.set_retention(
            PointId(1),
            Retention {
                max_rows: Some(0),
                max_age: None,
            },
        );
        let stamps = vec![DateTime::from_micros(1), DateTime::from_micros(2)];
        let doomed = archiver.rows_to_retire(PointId(1), stamps, DateTime::from_micros(2), DateTime::from_micros(2));
        assert_eq!(doomed, vec![DateTime::from_micros(1)]);
    }

    #[test]
    fn max_age_retires_stamps_older_than_the_cutoff() {
        let archiver = JitArchiver::new();
        archiver.set_retention(
            PointId(1),
            Retention {
                max_rows: None,
                max_age: Some(ElapsedTime::from_seconds(10)),
            },
        );
        let stamps = vec![
            DateTime::from_micros(0),
            DateTime::from_micros(9_000_000),
            DateTime::from_micros(11_000_000),
        ];
        let now = DateTime::from_micros(11_000_000);
        let doomed = archiver.rows_to_retire(PointId(1), stamps, now, now);
        assert_eq!(doomed, vec![DateTime::from_micros(0)]);
    }

    #[test]
    fn scheduled_holds_until_sync_fires() {
        let sync = ElapsedSync::new(ElapsedTime::from_seconds(60), ElapsedTime::ZERO).unwrap();
        let archiver = ScheduledArchiver::new(Box::new(sync));
        assert!(archiver.on_update(vv(1, 1, 0)).is_empty());
        assert!(archiver
            .flush_due(DateTime::from_micros(30_000_000))
            .is_empty());
        let flushed = archiver.flush_due(DateTime::from_micros(60_000_000));
        assert_eq!(flushed.len(), 1);
    }

    #[test]
    fn scheduled_collapses_bursts_to_latest_per_point() {
        let sync = ElapsedSync::new(ElapsedTime::from_seconds(60), ElapsedTime::ZERO).unwrap();
        let archiver = ScheduledArchiver::new(Box::new(sync));
        archiver.on_update(vv(1, 1, 0));
        archiver.on_update(vv(1, 2, 1));
        let flushed = archiver.flush_due(DateTime::from_micros(60_000_000));
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].version, 2);
    }
}
