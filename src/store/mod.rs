//! `TheStore`: the versioned point-value table. Every
//! update is assigned a strictly increasing version, durably
//! logged before it is visible, written into
//! the current-value snapshot and (per the configured [`Archiver`])
//! into the full-history archive, and then fanned out to registered
//! notifier queues.

pub mod archive;
pub mod archiver;
pub mod cursor;
pub mod snapshot;
pub mod wal;

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{PointId, PointValue, VersionedValue};
use crate::queue::Queue;
use crate::time::DateTime;

pub use archiver::{Archiver, JitArchiver, Retention, ScheduledArchiver};
pub use cursor::{StoreValues, StoreValuesQuery};

struct Tables {
    archive: archive::Archive,
    snapshot: snapshot::Snapshot,
}

pub struct TheStore {
    tables: RwLock<Tables>,
    archiver: Box<dyn Archiver>,
    wal: Option<RwLock<wal::StoreWal>>,
    next_version: AtomicU64,
    notifiers: RwLock<Vec<Arc<dyn Queue>>>,
}

impl TheStore {
    /// Opens a durable store rooted at `path`, replaying `<path>.wal` to
    /// reconstruct the snapshot, archive, and version counter.
    pub fn open(path: &Path, archiver: Box<dyn Archiver>) -> Result<Self> {
        let mut archive = archive::Archive::new();
        let mut snapshot = snapshot::Snapshot::new();
        let mut max_version = 0u64;

        let wal_path = wal::wal_path(path);
        let mut store_wal = wal::StoreWal::open(&wal_path)?;
        let applied = store_wal.replay(|versioned| {
            max_version = max_version.max(versioned.version);
            snapshot.put(versioned.clone());
            archive.put(versioned);
            Ok(())
        })?;
        info!(applied, "replayed store WAL");

        Ok(TheStore {
            tables: RwLock::new(Tables { archive, snapshot }),
            archiver,
            wal: Some(RwLock::new(store_wal)),
            next_version: AtomicU64::new(max_version + 1),
            notifiers: RwLock::new(Vec::new()),
        })
    }

    /// An unlogged store for tests and ephemeral processing pipelines.
    pub fn in_memory(archiver: Box<dyn Archiver>) -> Self {
        TheStore {
            tables: RwLock::new(Tables {
                archive: archive::Archive::new(),
                snapshot: snapshot::Snapshot::new(),
            }),
            archiver,
            wal: None,
            next_version: AtomicU64::new(1),
            notifiers: RwLock::new(Vec::new()),
        }
    }

    pub fn register_notifier(&self, queue: Arc<dyn Queue>) {
        self.notifiers.write().push(queue);
    }

    /// Writes `value`, assigning it the next version. A tombstone request
    /// (`PointValue::is_tombstone_request`) still consumes a version and
    /// is durably recorded, so a reader that saw the prior value and one
    /// that saw the tombstone never disagree about which is newer; if it
    /// tombstones the point's current latest stamp, the snapshot falls
    /// back to the prior-in-time archive row (or is removed, if there is
    /// none). After archiving, any rows the configured [`Archiver`]'s
    /// retention policy now condemns for this point are retired in the
    /// same transaction.
    pub fn update(&self, value: PointValue) -> Result<VersionedValue> {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let is_tombstone = value.is_tombstone_request();
        let point = value.point;
        let stamp = value.stamp;
        let versioned = VersionedValue {
            point_value: value,
            version,
        };

        if let Some(wal) = &self.wal {
            let mut guard = wal.write();
            guard.append(&versioned)?;
            guard.sync()?;
        }

        {
            let mut tables = self.tables.write();
            let current_stamp = tables.snapshot.get(point).map(|v| v.point_value.stamp);

            if is_tombstone {
                for archived in self.archiver.on_update(versioned.clone()) {
                    tables.archive.put(archived);
                }
                if current_stamp == Some(stamp) {
                    let prior = tables
                        .archive
                        .range(point, DateTime::from_micros(i64::MIN), stamp.before())
                        .next_back()
                        .cloned();
                    match prior {
                        Some(prior) => tables.snapshot.put(prior),
                        None => tables.snapshot.remove(point),
                    }
                }
            } else {
                tables.snapshot.put(versioned.clone());
                for archived in self.archiver.on_update(versioned.clone()) {
                    tables.archive.put(archived);
                }
            }

            let keep = tables
                .snapshot
                .get(point)
                .map(|v| v.point_value.stamp)
                .unwrap_or(stamp);
            let stamps = tables.archive.stamps(point);
            let doomed = self.archiver.rows_to_retire(point, stamps, keep, stamp);
            if !doomed.is_empty() {
                tables.archive.remove_stamps(point, &doomed);
            }
        }

        for notifier in self.notifiers.read().iter() {
            if let Err(err) = notifier.send(versioned.clone()) {
                warn!(error = %err, "notifier queue rejected update");
            }
        }

        Ok(versioned)
    }

    /// Flushes whatever a scheduled archiver is holding whose due time
    /// has passed, then retires whatever that archiver's retention policy
    /// now condemns for each point just flushed. A no-op for archivers
    /// (like [`JitArchiver`]) that never buffer.
    pub fn flush_archiver(&self, now: DateTime) {
        let due = self.archiver.flush_due(now);
        if due.is_empty() {
            return;
        }
        let mut tables = self.tables.write();
        let mut touched: HashSet<PointId> = HashSet::new();
        for versioned in due {
            touched.insert(versioned.point_value.point);
            tables.archive.put(versioned);
        }
        for point in touched {
            let keep = tables
                .snapshot
                .get(point)
                .map(|v| v.point_value.stamp)
                .unwrap_or(now);
            let stamps = tables.archive.stamps(point);
            let doomed = self.archiver.rows_to_retire(point, stamps, keep, now);
            if !doomed.is_empty() {
                tables.archive.remove_stamps(point, &doomed);
            }
        }
    }

    pub fn latest(&self, point: PointId) -> Option<VersionedValue> {
        self.tables.read().snapshot.get(point).cloned()
    }

    /// Runs `query` against the archive: stamp-ordered by default, or
    /// version-ordered when `query.pull` is set.
    pub fn query(&self, query: StoreValuesQuery) -> StoreValues {
        let tables = self.tables.read();
        let rows: Vec<VersionedValue> = if query.pull {
            tables.archive.pull(query.point, query.from_version).cloned().collect()
        } else {
            tables.archive.range(query.point, query.from, query.to).cloned().collect()
        };
        StoreValues::new(rows, query.limit)
    }

    /// Removes archive entries for `point` with stamp `< before`. If the
    /// purged interval intersects the point's current snapshot stamp, the
    /// snapshot entry is removed too — a purge is an explicit, user-invoked
    /// deletion, and unlike the archiver's own retention sweep it is not
    /// required to keep a live value around. Returns the number of
    /// archive rows removed.
    pub fn purge(&self, point: PointId, before: DateTime) -> Result<u64> {
        let mut tables = self.tables.write();
        let removed = tables.archive.purge_before(point, before);
        let intersects_snapshot = tables
            .snapshot
            .get(point)
            .map(|v| v.point_value.stamp < before)
            .unwrap_or(false);
        if intersects_snapshot {
            tables.snapshot.remove(point);
        }
        Ok(removed)
    }

    pub fn count(&self, point: PointId) -> usize {
        self.tables.read().archive.count(point)
    }
}
