//! The snapshot table: O(1) lookup of each point's most recent version.
//! The snapshot for a point equals the archive's newest non-tombstone
//! entry for that point: both tables are updated under the same write
//! lock in [`super::TheStore::update`], and a tombstone that lands on the
//! current latest stamp pushes the snapshot back to the prior-in-time
//! row instead of surfacing the tombstone itself as a live value.

use std::collections::HashMap;

use crate::model::{PointId, VersionedValue};

#[derive(Default)]
pub struct Snapshot {
    rows: HashMap<PointId, VersionedValue>,
}

impl Snapshot {
    pub fn new() -> Self {
        Snapshot::default()
    }

    /// Records `versioned` as current for its point, unless a
    /// later-stamped value is already on file (out-of-order replay during
    /// WAL recovery).
    pub fn put(&mut self, versioned: VersionedValue) {
        self.rows
            .entry(versioned.point_value.point)
            .and_modify(|existing| {
                if versioned.point_value.stamp >= existing.point_value.stamp {
                    *existing = versioned.clone();
                }
            })
            .or_insert(versioned);
    }

    pub fn get(&self, point: PointId) -> Option<&VersionedValue> {
        self.rows.get(&point)
    }

    pub fn remove(&mut self, point: PointId) {
        self.rows.remove(&point);
    }
}
