//! The batch processor: walks a [`Metadata`] arena in
//! dependency order, evaluates each relation's [`behavior::Behavior`]
//! against its input point's latest value, runs anything that triggers
//! through the relation's [`transform::Transform`], and commits results
//! to [`crate::store::TheStore`] as it goes so that later points in the
//! same pass see their inputs' freshly committed values.

pub mod behavior;
pub mod transform;

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::error::Result;
use crate::model::{Metadata, PointHandle, PointId, PointValue, RelationHandle};
use crate::store::TheStore;
use crate::time::sync::Sync as ScheduleSync;
use crate::time::DateTime;

use behavior::Behavior;
use transform::Transform;

/// One point value newly committed to the store during a batch pass,
/// kept so downstream points in the same pass can be evaluated against
/// it without a round trip through the store.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultValue {
    pub point: PointId,
    pub value: PointValue,
}

/// Per-point input values carried through a single [`Processor::run_batch`]
/// call: freshly observed values plus anything produced earlier in the
/// same pass, backed by an LRU so a processor with many points bounds its
/// working set instead of holding the whole graph's latest values.
pub struct BatchValuesCache {
    cache: LruCache<PointId, PointValue>,
}

impl BatchValuesCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        BatchValuesCache {
            cache: LruCache::new(capacity),
        }
    }

    pub fn put(&mut self, value: PointValue) {
        self.cache.put(value.point, value);
    }

    pub fn get(&mut self, point: PointId) -> Option<PointValue> {
        self.cache.get(&point).cloned()
    }
}

/// A set of newly observed input values, plus the instant the batch is
/// running at (used to decide which relations' sync schedules have
/// ticked).
pub struct Batch {
    pub now: DateTime,
    pub inputs: Vec<PointValue>,
}

/// Walks the metadata graph in topological order, holding one
/// [`Behavior`] and (optionally) one [`Transform`] per relation.
pub struct Processor {
    metadata: Metadata,
    order: Vec<PointHandle>,
    behaviors: HashMap<RelationHandle, Box<dyn Behavior>>,
    transforms: HashMap<RelationHandle, Box<dyn Transform>>,
    due_cache: HashMap<RelationHandle, Box<dyn ScheduleSync>>,
}

impl Processor {
    /// `behaviors`/`transforms` are supplied by the caller (typically
    /// built from each relation's `BehaviorKind`/`params` at startup);
    /// a relation with no entry in `transforms` passes its behavior's
    /// output straight to the store untransformed.
    pub fn new(
        metadata: Metadata,
        behaviors: HashMap<RelationHandle, Box<dyn Behavior>>,
        transforms: HashMap<RelationHandle, Box<dyn Transform>>,
    ) -> Result<Self> {
        let order = metadata.topo_order()?;
        let mut due_cache = HashMap::new();
        for (handle, relation) in metadata_relations(&metadata) {
            if let Some(spec) = &relation.sync {
                due_cache.insert(handle, spec.to_sync()?);
            }
        }
        Ok(Processor {
            metadata,
            order,
            behaviors,
            transforms,
            due_cache,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Runs one batch pass: each point in topological order collects the
    /// input values selected for it, evaluates every incoming relation's
    /// behavior, transforms what triggers, and commits the result to
    /// `store` before moving to the point's dependents.
    pub fn run_batch(
        &mut self,
        batch: Batch,
        store: &TheStore,
        cache: &mut BatchValuesCache,
    ) -> Result<Vec<ResultValue>> {
        for input in batch.inputs {
            cache.put(input);
        }

        let mut results = Vec::new();
        for &handle in &self.order {
            let point = self.metadata.point(handle)?;
            let point_id = point.id;
            let relation_handles = point.inputs.clone();

            for relation_handle in relation_handles {
                let relation = self.metadata.relation(relation_handle)?.clone();
                let input_point = self.metadata.point(relation.input)?.id;

                let input_value = cache
                    .get(input_point)
                    .or_else(|| store.latest(input_point).map(|v| v.point_value));

                let due = match self.due_cache.get(&relation_handle) {
                    Some(sync) => is_due(sync.as_ref(), batch.now)?,
                    None => None,
                };

                if input_value.is_none() && due.is_none() {
                    continue;
                }

                let behavior = self
                    .behaviors
                    .get_mut(&relation_handle)
                    .expect("every relation must have a registered behavior");
                let triggered = behavior.evaluate(input_value, due);
                if triggered.is_empty() {
                    continue;
                }

                let emitted = match self.transforms.get_mut(&relation_handle) {
                    Some(transform) => transform.apply(point_id, &triggered),
                    None => triggered
                        .into_iter()
                        .map(|mut v| {
                            v.point = point_id;
                            v
                        })
                        .collect(),
                };

                for value in emitted {
                    let versioned = store.update(value.clone())?;
                    debug!(point = %point_id, version = versioned.version, "committed batch result");
                    cache.put(value.clone());
                    results.push(ResultValue {
                        point: point_id,
                        value,
                    });
                }
            }
        }

        Ok(results)
    }
}

fn metadata_relations(metadata: &Metadata) -> Vec<(RelationHandle, crate::model::PointRelation)> {
    let mut out = Vec::new();
    for (_, point) in metadata.points() {
        for &handle in &point.inputs {
            if let Ok(relation) = metadata.relation(handle) {
                out.push((handle, relation.clone()));
            }
        }
    }
    out
}

/// The tick's own stamp if `now` lands on `sync`'s schedule, `None`
/// otherwise.
fn is_due(sync: &dyn ScheduleSync, now: DateTime) -> Result<Option<DateTime>> {
    let prev = sync.prev_stamp(now, false)?;
    Ok(if prev == now { Some(now) } else { None })
}
