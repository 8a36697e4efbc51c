//! A query against the archive and the cursor it returns.
//!
//! A query is either stamp-ordered (the default `range` mode, bounded by
//! `from`/`to`) or pull-mode: version-ordered, bounded below by
//! `from_version`, used by a listener that wants every row in the exact
//! order the store committed them rather than in timestamp order.

use crate::model::{PointId, VersionedValue};
use crate::time::DateTime;

#[derive(Clone, Debug)]
pub struct StoreValuesQuery {
    pub point: PointId,
    pub from: DateTime,
    pub to: DateTime,
    pub limit: Option<usize>,
    pub pull: bool,
    pub from_version: u64,
}

impl StoreValuesQuery {
    pub fn new(point: PointId, from: DateTime, to: DateTime) -> Self {
        StoreValuesQuery {
            point,
            from,
            to,
            limit: None,
            pull: false,
            from_version: 0,
        }
    }

    /// A version-ordered pull cursor over every row archived for `point`
    /// with version `>= from_version`. Stamp bounds do not apply in this
    /// mode.
    pub fn pull(point: PointId, from_version: u64) -> Self {
        StoreValuesQuery {
            point,
            from: DateTime::from_micros(i64::MIN),
            to: DateTime::from_micros(i64::MAX),
            limit: None,
            pull: true,
            from_version,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A materialized, chronologically ordered result set. The store copies
/// rows out from under its lock rather than handing back a borrowed
/// iterator, so a cursor can be held across processing calls without
/// contending with concurrent writers.
pub struct StoreValues {
    rows: std::vec::IntoIter<VersionedValue>,
}

impl StoreValues {
    pub(crate) fn new(mut rows: Vec<VersionedValue>, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        StoreValues {
            rows: rows.into_iter(),
        }
    }
}

impl Iterator for StoreValues {
    type Item = VersionedValue;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}
