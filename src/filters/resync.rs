//! Resynchronizer: zero-order-hold resampling of a point's last known
//! value onto an external schedule, consumed by the `Resynchronized`
//! behavior and the resynchronizer transform. Unlike [`super::Filter`], a
//! resynchronizer must be told when the schedule ticks, so it exposes
//! `observe`/`resample` directly rather than the single `filter` entry
//! point.

use crate::model::PointValue;
use crate::time::DateTime;

#[derive(Default)]
pub struct Resynchronizer {
    last: Option<PointValue>,
}

impl Resynchronizer {
    pub fn new() -> Self {
        Resynchronizer::default()
    }

    /// Records a newly observed input value without emitting anything.
    pub fn observe(&mut self, input: PointValue) {
        self.last = Some(input);
    }

    /// Called when the schedule ticks at `stamp`: returns the last
    /// observed value re-stamped at `stamp`, or `None` if nothing has
    /// ever been observed.
    pub fn resample(&self, stamp: DateTime) -> Option<PointValue> {
        self.last.as_ref().map(|v| {
            let mut out = v.clone();
            out.stamp = stamp;
            out
        })
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
