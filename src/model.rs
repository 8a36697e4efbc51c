//! Points, relations, and point values, plus the metadata
//! arena that owns them.
//!
//! Points and relations are stored in `Vec`s and referenced by stable
//! integer handles rather than owning references, the same way a
//! storage engine addresses pages by a `PageId` instead of Rust
//! references across its storage substructures.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use crate::error::{PointError, Result};
use crate::time::sync::{CrontabSync, ElapsedSync, Sync};
use crate::time::zone::Zone;
use crate::time::{DateTime, ElapsedTime};
use crate::value::{Params, Value};

/// 128-bit point identity, big-endian on the wire and on disk.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PointId(pub u128);

impl PointId {
    pub fn from_be_bytes(bytes: [u8; 16]) -> Self {
        PointId(u128::from_be_bytes(bytes))
    }

    pub fn to_be_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    pub fn nil() -> Self {
        PointId(0)
    }
}

impl fmt::Debug for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_be_bytes();
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl FromStr for PointId {
    type Err = PointError;

    fn from_str(s: &str) -> Result<Self> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return Err(PointError::BadParameter(format!("bad point uuid {s:?}")));
        }
        let mut bytes = [0u8; 16];
        for i in 0..16 {
            bytes[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| PointError::BadParameter(format!("bad point uuid {s:?}")))?;
        }
        Ok(PointId::from_be_bytes(bytes))
    }
}

/// `(point_uuid, stamp, state, value)`.
#[derive(Clone, Debug, PartialEq)]
pub struct PointValue {
    pub point: PointId,
    pub stamp: DateTime,
    pub state: Option<Vec<u8>>,
    pub value: Value,
}

impl PointValue {
    pub fn new(point: PointId, stamp: DateTime, value: Value) -> Self {
        PointValue {
            point,
            stamp,
            state: None,
            value,
        }
    }

    /// A delete is represented as a tombstone: null state and null value at
    /// an existing stamp.
    pub fn is_tombstone_request(&self) -> bool {
        self.state.is_none() && self.value.is_null()
    }
}

/// A [`PointValue`] plus the monotonic version assigned by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedValue {
    pub point_value: PointValue,
    pub version: u64,
}

/// Stable handle into a [`Metadata`] arena's point table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PointHandle(pub u32);

/// Stable handle into a [`Metadata`] arena's relation table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct RelationHandle(pub u32);

/// Unit/type coercion metadata attached to a point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Content {
    pub unit: Option<String>,
    pub type_name: Option<String>,
}

/// The behavior a relation uses to decide triggering, stamp selection, and
/// input selection. The concrete state machine lives in
/// [`crate::processor::behavior`]; this tag is what metadata records and
/// validates.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BehaviorKind {
    NeverTriggers,
    AlwaysTriggers,
    Synchronized,
    StepFiltered,
    DeadbandFiltered,
    Resynchronized,
    Replicator,
}

/// A zone reference light enough to store in metadata and reconstruct a
/// [`Zone`] from.
#[derive(Clone, Debug, PartialEq)]
pub enum ZoneSpec {
    Utc,
    FixedOffsetSeconds(i32),
    AmericaMontreal,
}

impl ZoneSpec {
    pub fn to_zone(&self) -> Result<Zone> {
        match self {
            ZoneSpec::Utc => Ok(Zone::utc()),
            ZoneSpec::FixedOffsetSeconds(secs) => {
                let offset = time::UtcOffset::from_whole_seconds(*secs)
                    .map_err(|e| PointError::BadParameter(e.to_string()))?;
                Ok(Zone::fixed(offset))
            }
            ZoneSpec::AmericaMontreal => Ok(Zone::america_montreal()),
        }
    }
}

/// A schedule specification light enough to store in metadata.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncSpec {
    Elapsed {
        period: ElapsedTime,
        offset: ElapsedTime,
    },
    Crontab {
        expr: String,
        zone: ZoneSpec,
    },
}

impl SyncSpec {
    pub fn to_sync(&self) -> Result<Box<dyn Sync>> {
        match self {
            SyncSpec::Elapsed { period, offset } => {
                Ok(Box::new(ElapsedSync::new(*period, *offset)?))
            }
            SyncSpec::Crontab { expr, zone } => {
                Ok(Box::new(CrontabSync::parse(expr, zone.to_zone()?)?))
            }
        }
    }
}

/// A directed input -> result edge. Immutable after metadata freeze.
#[derive(Clone, Debug, PartialEq)]
pub struct PointRelation {
    pub input: PointHandle,
    pub result: PointHandle,
    pub params: Params,
    pub behavior: BehaviorKind,
    pub sync: Option<SyncSpec>,
}

/// A named, uniquely identified source/consumer of values.
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub name: String,
    pub content: Content,
    pub origin: Option<String>,
    pub store: Option<String>,
    pub transform: Option<String>,
    pub params: Params,
    pub inputs: Vec<RelationHandle>,
    pub results: Vec<RelationHandle>,
}

impl Point {
    pub fn new(id: PointId, name: impl Into<String>) -> Self {
        Point {
            id,
            name: name.into(),
            content: Content::default(),
            origin: None,
            store: None,
            transform: None,
            params: Params::new(),
            inputs: Vec::new(),
            results: Vec::new(),
        }
    }
}

/// Arena of points and relations, addressed by stable handles. Points are
/// immutable once the owning metadata set is frozen via [`Metadata::validate`].
#[derive(Default)]
pub struct Metadata {
    points: Vec<Point>,
    relations: Vec<PointRelation>,
    by_name: HashMap<String, PointHandle>,
    by_uuid: HashMap<PointId, PointHandle>,
}

impl Metadata {
    pub fn new() -> Self {
        Metadata::default()
    }

    pub fn add_point(&mut self, point: Point) -> Result<PointHandle> {
        let key = point.name.to_ascii_lowercase();
        if self.by_name.contains_key(&key) {
            return Err(PointError::BadParameter(format!(
                "duplicate point name {:?}",
                point.name
            )));
        }
        if self.by_uuid.contains_key(&point.id) {
            return Err(PointError::BadParameter(format!(
                "duplicate point uuid {}",
                point.id
            )));
        }
        let handle = PointHandle(self.points.len() as u32);
        self.by_name.insert(key, handle);
        self.by_uuid.insert(point.id, handle);
        self.points.push(point);
        Ok(handle)
    }

    pub fn add_relation(
        &mut self,
        input: PointHandle,
        result: PointHandle,
        params: Params,
        behavior: BehaviorKind,
        sync: Option<SyncSpec>,
    ) -> Result<RelationHandle> {
        let relation = PointRelation {
            input,
            result,
            params,
            behavior,
            sync,
        };
        let handle = RelationHandle(self.relations.len() as u32);
        self.relations.push(relation);
        self.point_mut(input)?.results.push(handle);
        self.point_mut(result)?.inputs.push(handle);
        Ok(handle)
    }

    pub fn point(&self, handle: PointHandle) -> Result<&Point> {
        self.points
            .get(handle.0 as usize)
            .ok_or_else(|| PointError::NotFound(format!("point handle {handle:?}")))
    }

    fn point_mut(&mut self, handle: PointHandle) -> Result<&mut Point> {
        self.points
            .get_mut(handle.0 as usize)
            .ok_or_else(|| PointError::NotFound(format!("point handle {handle:?}")))
    }

    pub fn relation(&self, handle: RelationHandle) -> Result<&PointRelation> {
        self.relations
            .get(handle.0 as usize)
            .ok_or_else(|| PointError::NotFound(format!("relation handle {handle:?}")))
    }

    pub fn handle_by_name(&self, name: &str) -> Option<PointHandle> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn handle_by_uuid(&self, id: PointId) -> Option<PointHandle> {
        self.by_uuid.get(&id).copied()
    }

    pub fn points(&self) -> impl Iterator<Item = (PointHandle, &Point)> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (PointHandle(i as u32), p))
    }

    /// Validates the DAG invariant (cycles are metadata errors, not
    /// tolerated) and the self-filtering rule: a point
    /// whose sole input is itself under a filtered behavior may not also
    /// feed any other result.
    pub fn validate(&self) -> Result<()> {
        self.check_acyclic()?;
        self.check_self_filter_exclusivity()?;
        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        let n = self.points.len();
        let mut indegree = vec![0u32; n];
        for relation in &self.relations {
            indegree[relation.result.0 as usize] += 1;
        }
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut visited = 0usize;
        while let Some(idx) = queue.pop_front() {
            visited += 1;
            let handle = PointHandle(idx as u32);
            for rel_handle in &self.points[idx].results {
                let rel = self.relation(*rel_handle)?;
                debug_assert_eq!(rel.input, handle);
                let result_idx = rel.result.0 as usize;
                indegree[result_idx] -= 1;
                if indegree[result_idx] == 0 {
                    queue.push_back(result_idx);
                }
            }
        }
        if visited != n {
            return Err(PointError::BadParameter(
                "point relation graph contains a cycle".into(),
            ));
        }
        Ok(())
    }

    fn check_self_filter_exclusivity(&self) -> Result<()> {
        for relation in &self.relations {
            let is_filtered = matches!(
                relation.behavior,
                BehaviorKind::StepFiltered | BehaviorKind::DeadbandFiltered
            );
            if is_filtered && relation.input == relation.result {
                let point = self.point(relation.input)?;
                let other_dependents = point
                    .results
                    .iter()
                    .filter(|h| **h != self_relation_handle(self, relation))
                    .count();
                if other_dependents > 0 {
                    return Err(PointError::BadParameter(format!(
                        "point {} self-filters under {:?} but also feeds other results",
                        point.name, relation.behavior
                    )));
                }
            }
        }
        Ok(())
    }

    /// Topological order over points by the relation graph, required so
    /// batch result emission matches dependency order.
    pub fn topo_order(&self) -> Result<Vec<PointHandle>> {
        let n = self.points.len();
        let mut indegree = vec![0u32; n];
        for relation in &self.relations {
            indegree[relation.result.0 as usize] += 1;
        }
        let mut queue: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        let mut seen = HashSet::with_capacity(n);
        while let Some(idx) = queue.pop_front() {
            if !seen.insert(idx) {
                continue;
            }
            order.push(PointHandle(idx as u32));
            for rel_handle in &self.points[idx].results {
                let rel = self.relation(*rel_handle)?;
                let result_idx = rel.result.0 as usize;
                indegree[result_idx] -= 1;
                if indegree[result_idx] == 0 {
                    queue.push_back(result_idx);
                }
            }
        }
        if order.len() != n {
            return Err(PointError::BadParameter(
                "point relation graph contains a cycle".into(),
            ));
        }
        Ok(order)
    }
}

fn self_relation_handle(metadata: &Metadata, relation: &PointRelation) -> RelationHandle {
    metadata
        .points
        .get(relation.input.0 as usize)
        .and_then(|p| {
            p.results.iter().find(|h| {
                metadata
                    .relation(**h)
                    .map(|r| r.input == relation.input && r.result == relation.result)
                    .unwrap_or(false)
            })
        })
        .copied()
        .unwrap_or(RelationHandle(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_point(m: &mut Metadata, name: &str, id: u128) -> PointHandle {
        m.add_point(Point::new(PointId(id), name)).unwrap()
    }

    #[test]
    fn point_id_display_roundtrip() {
        let id = PointId(0x0123456789abcdef0123456789abcdefu128);
        let s = id.to_string();
        let parsed: PointId = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut m = Metadata::new();
        let a = make_point(&mut m, "a", 1);
        let b = make_point(&mut m, "b", 2);
        m.add_relation(a, b, Params::new(), BehaviorKind::AlwaysTriggers, None)
            .unwrap();
        m.add_relation(b, a, Params::new(), BehaviorKind::AlwaysTriggers, None)
            .unwrap();
        assert!(m.validate().is_err());
    }

    #[test]
    fn self_filter_with_other_dependent_is_rejected() {
        let mut m = Metadata::new();
        let q = make_point(&mut m, "q", 1);
        let other = make_point(&mut m, "other", 2);
        m.add_relation(
            q,
            q,
            Params::new(),
            BehaviorKind::StepFiltered,
            None,
        )
        .unwrap();
        m.add_relation(q, other, Params::new(), BehaviorKind::AlwaysTriggers, None)
            .unwrap();
        assert!(m.validate().is_err());
    }

    #[test]
    fn self_filter_without_other_dependents_is_accepted() {
        let mut m = Metadata::new();
        let q = make_point(&mut m, "q", 1);
        m.add_relation(q, q, Params::new(), BehaviorKind::StepFiltered, None)
            .unwrap();
        assert!(m.validate().is_ok());
    }

    #[test]
    fn topo_order_respects_dependencies() {
        let mut m = Metadata::new();
        let a = make_point(&mut m, "a", 1);
        let b = make_point(&mut m, "b", 2);
        let c = make_point(&mut m, "c", 3);
        m.add_relation(a, b, Params::new(), BehaviorKind::AlwaysTriggers, None)
            .unwrap();
        m.add_relation(b, c, Params::new(), BehaviorKind::AlwaysTriggers, None)
            .unwrap();
        let order = m.topo_order().unwrap();
        let pos = |h: PointHandle| order.iter().position(|x| *x == h).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }
}
