//! The archive table: full point-value history, keyed by `(point, stamp)`,
//! with a secondary index on `(point, version)` for version-order pull
//! scans.

use std::collections::BTreeMap;

use crate::model::{PointId, VersionedValue};
use crate::time::DateTime;

#[derive(Default)]
pub struct Archive {
    rows: BTreeMap<(PointId, DateTime), VersionedValue>,
    by_version: BTreeMap<(PointId, u64), DateTime>,
}

impl Archive {
    pub fn new() -> Self {
        Archive::default()
    }

    /// Inserts or overwrites the entry at `(point, stamp)`, returning the
    /// value it replaced, if any.
    pub fn put(&mut self, versioned: VersionedValue) -> Option<VersionedValue> {
        let point = versioned.point_value.point;
        let stamp = versioned.point_value.stamp;
        self.by_version.insert((point, versioned.version), stamp);
        let replaced = self.rows.insert((point, stamp), versioned);
        if let Some(replaced) = &replaced {
            self.by_version.remove(&(point, replaced.version));
        }
        replaced
    }

    pub fn get(&self, point: PointId, stamp: DateTime) -> Option<&VersionedValue> {
        self.rows.get(&(point, stamp))
    }

    /// Entries for `point` with stamp in `[from, to]`, in stamp order.
    pub fn range(
        &self,
        point: PointId,
        from: DateTime,
        to: DateTime,
    ) -> impl DoubleEndedIterator<Item = &VersionedValue> {
        self.rows.range((point, from)..=(point, to)).map(|(_, v)| v)
    }

    /// Entries for `point` with version `>= from_version`, in version
    /// order — the traversal a pull cursor walks instead of stamp order.
    pub fn pull(&self, point: PointId, from_version: u64) -> impl Iterator<Item = &VersionedValue> + '_ {
        self.by_version
            .range((point, from_version)..=(point, u64::MAX))
            .filter_map(move |(_, stamp)| self.rows.get(&(point, *stamp)))
    }

    pub fn latest(&self, point: PointId) -> Option<&VersionedValue> {
        self.rows
            .range((point, DateTime::from_micros(i64::MIN))..=(point, DateTime::from_micros(i64::MAX)))
            .next_back()
            .map(|(_, v)| v)
    }

    /// Every stamp currently archived for `point`, unordered.
    pub fn stamps(&self, point: PointId) -> Vec<DateTime> {
        self.rows
            .range((point, DateTime::from_micros(i64::MIN))..=(point, DateTime::from_micros(i64::MAX)))
            .map(|((_, stamp), _)| *stamp)
            .collect()
    }

    /// Removes the named stamps for `point`. Returns the number actually
    /// present and removed.
    pub fn remove_stamps(&mut self, point: PointId, stamps: &[DateTime]) -> u64 {
        let mut removed = 0u64;
        for stamp in stamps {
            if let Some(old) = self.rows.remove(&(point, *stamp)) {
                self.by_version.remove(&(point, old.version));
                removed += 1;
            }
        }
        removed
    }

    /// Removes every entry for `point` with stamp `< before`, unconditionally
    /// — including the point's current latest entry, if its stamp falls in
    /// range. Callers that must preserve the live value (the archiver's own
    /// retention sweep) are expected to exclude its stamp before calling
    /// this; a user-invoked purge is not. Returns the number of rows
    /// removed.
    pub fn purge_before(&mut self, point: PointId, before: DateTime) -> u64 {
        let doomed: Vec<(PointId, DateTime)> = self
            .rows
            .range((point, DateTime::from_micros(i64::MIN))..(point, before))
            .map(|(k, _)| *k)
            .collect();
        let n = doomed.len() as u64;
        for key in doomed {
            if let Some(old) = self.rows.remove(&key) {
                self.by_version.remove(&(key.0, old.version));
            }
        }
        n
    }

    pub fn count(&self, point: PointId) -> usize {
        self.rows
            .range((point, DateTime::from_micros(i64::MIN))..=(point, DateTime::from_micros(i64::MAX)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointValue;
    use crate::value::Value;

    fn vv(point: u128, stamp: i64, version: u64) -> VersionedValue {
        VersionedValue {
            point_value: PointValue::new(PointId(point), DateTime::from_micros(stamp), Value::Int64(stamp)),
            version,
        }
    }

    #[test]
    fn range_is_scoped_to_point_and_stamp_window() {
        let mut archive = Archive::new();
        archive.put(vv(1, 0, 1));
        archive.put(vv(1, 10, 2));
        archive.put(vv(2, 5, 3));
        let rows: Vec<_> = archive
            .range(PointId(1), DateTime::from_micros(0), DateTime::from_micros(9))
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version, 1);
    }

    #[test]
    fn purge_before_removes_everything_in_range_including_the_latest() {
        let mut archive = Archive::new();
        archive.put(vv(1, 0, 1));
        archive.put(vv(1, 10, 2));
        let removed = archive.purge_before(PointId(1), DateTime::from_micros(100));
        assert_eq!(removed, 2);
        assert!(archive.get(PointId(1), DateTime::from_micros(0)).is_none());
        assert!(archive.get(PointId(1), DateTime::from_micros(10)).is_none());
    }

    #[test]
    fn latest_returns_the_newest_stamp() {
        let mut archive = Archive::new();
        archive.put(vv(1, 0, 1));
        archive.put(vv(1, 10, 2));
        assert_eq!(archive.latest(PointId(1)).unwrap().version, 2);
    }

    #[test]
    fn pull_iterates_in_version_order_per_point() {
        let mut archive = Archive::new();
        archive.put(vv(1, 10, 3));
        archive.put(vv(1, 0, 1));
        archive.put(vv(2, 5, 2));
        archive.put(vv(1, 5, 4));
        let pulled: Vec<u64> = archive.pull(PointId(1), 0).map(|v| v.version).collect();
        assert_eq!(pulled, vec![1, 3, 4]);
    }

    #[test]
    fn pull_honours_the_from_version_floor() {
        let mut archive = Archive::new();
        archive.put(vv(1, 0, 1));
        archive.put(vv(1, 5, 2));
        archive.put(vv(1, 10, 3));
        let pulled: Vec<u64> = archive.pull(PointId(1), 2).map(|v| v.version).collect();
        assert_eq!(pulled, vec![2, 3]);
    }

    #[test]
    fn stamps_and_remove_stamps_round_trip() {
        let mut archive = Archive::new();
        archive.put(vv(1, 0, 1));
        archive.put(vv(1, 5, 2));
        archive.put(vv(1, 10, 3));
        let mut stamps = archive.stamps(PointId(1));
        stamps.sort();
        assert_eq!(
            stamps,
            vec![
                DateTime::from_micros(0),
                DateTime::from_micros(5),
                DateTime::from_micros(10)
            ]
        );
        let removed = archive.remove_stamps(PointId(1), &[DateTime::from_micros(0), DateTime::from_micros(5)]);
        assert_eq!(removed, 2);
        assert_eq!(archive.count(PointId(1)), 1);
        assert_eq!(archive.pull(PointId(1), 0).count(), 1);
    }
}
