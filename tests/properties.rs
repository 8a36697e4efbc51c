//! Quantified invariants exercised end to end
//! against the public crate surface.

use pointflow::filters::deadband::DeadbandFilter;
use pointflow::filters::Filter;
use pointflow::model::{PointId, PointValue};
use pointflow::queue::durable::DurableQueue;
use pointflow::queue::Queue;
use pointflow::store::{JitArchiver, StoreValuesQuery, TheStore};
use pointflow::time::sync::{CrontabSync, Sync as ScheduleSync};
use pointflow::time::zone::Zone;
use pointflow::time::{DateTime, ElapsedTime};
use pointflow::value::Value;

fn pv(point: PointId, t: i64, v: f64) -> PointValue {
    PointValue::new(point, DateTime::from_micros(t), Value::Double(v))
}

#[test]
fn p1_pull_query_versions_strictly_increase_with_no_gaps() {
    let store = TheStore::in_memory(Box::new(JitArchiver::new()));
    let point = PointId(1);
    let mut versions = Vec::new();
    for i in 0..200 {
        versions.push(store.update(pv(point, i, i as f64)).unwrap().version);
    }

    let pulled: Vec<u64> = store
        .query(StoreValuesQuery::pull(point, 0))
        .map(|v| v.version)
        .collect();
    assert_eq!(pulled, versions);
    for w in pulled.windows(2) {
        assert_eq!(w[1], w[0] + 1);
    }
}

#[test]
fn p2_snapshot_equals_archive_row_with_the_maximum_stamp() {
    let store = TheStore::in_memory(Box::new(JitArchiver::new()));
    let point = PointId(2);
    let stamps = [5, 1, 9, 3, 7];
    for &stamp in &stamps {
        store.update(pv(point, stamp, stamp as f64)).unwrap();
    }
    let archived: Vec<_> = store
        .query(StoreValuesQuery::new(
            point,
            DateTime::from_micros(i64::MIN),
            DateTime::from_micros(i64::MAX),
        ))
        .collect();
    let max_stamp_row = archived
        .iter()
        .max_by_key(|v| v.point_value.stamp)
        .expect("at least one row");
    let snapshot = store.latest(point).expect("snapshot present");
    assert_eq!(snapshot.point_value.stamp, max_stamp_row.point_value.stamp);
    assert_eq!(snapshot.point_value.value, max_stamp_row.point_value.value);
}

#[test]
fn p3_filter_reset_idempotence() {
    let mut f = DeadbandFilter::new(ElapsedTime::from_seconds(60), None, 1.0, 0.0);
    let v = pv(PointId(1), 0, 10.0);
    let first_pass = f.filter(Some(v.clone()));
    assert_eq!(first_pass, vec![v.clone()]);
    f.reset();
    let second_pass = f.filter(Some(v.clone()));
    assert_eq!(second_pass, vec![v]);
}

#[test]
fn p4_crontab_sync_adjacency() {
    let sync = CrontabSync::parse("0", Zone::utc()).unwrap();
    for raw_minutes in [7, 60, 61, 119, 1439] {
        let reference = DateTime::from_micros(raw_minutes * 60 * 1_000_000);

        let next = sync.next_stamp(reference, false).unwrap();
        let back = sync.prev_stamp(next, false).unwrap();
        assert!(back <= reference);

        let prev = sync.prev_stamp(reference, false).unwrap();
        let forward = sync.next_stamp(prev, false).unwrap();
        assert!(forward >= reference);
    }
}

#[test]
fn p5_committed_notices_are_retired_and_results_stay_visible() {
    let store = TheStore::in_memory(Box::new(JitArchiver::new()));
    let queue = DurableQueue::in_memory();
    let point = PointId(3);

    let versioned = store.update(pv(point, 0, 11.0)).unwrap();
    queue.send(versioned).unwrap();

    let delivered = queue.receive(1, 0).expect("message available").pop().expect("one message");
    queue.commit(delivered.version).unwrap();

    assert!(queue.is_empty());
    assert_eq!(
        store.latest(point).unwrap().point_value.value,
        Value::Double(11.0)
    );
}

#[test]
fn p5_uncommitted_notices_are_redelivered_after_rollback() {
    let store = TheStore::in_memory(Box::new(JitArchiver::new()));
    let queue = DurableQueue::in_memory();
    let point = PointId(4);

    let versioned = store.update(pv(point, 0, 5.0)).unwrap();
    queue.send(versioned).unwrap();

    let first_delivery = queue.receive(1, 0).expect("message available");
    queue.rollback();

    assert_eq!(queue.len(), 1);
    let redelivered = queue.receive(1, 0).expect("message redelivered");
    assert_eq!(redelivered, first_delivery);
}
