//! Per-relation triggering policy: decides, given a
//! newly observed input value and whether the relation's schedule has
//! ticked, whether (and with what point value) the relation's transform
//! should run this batch. Maps one-to-one onto [`crate::model::BehaviorKind`].

use crate::filters::deadband::DeadbandFilter;
use crate::filters::resync::Resynchronizer;
use crate::filters::step::StepFilter;
use crate::filters::Filter;
use crate::model::PointValue;
use crate::time::DateTime;

/// `due` carries the schedule tick's own stamp when the batch's `now`
/// lands on the relation's `sync` schedule, `None` otherwise. Relations
/// without a `sync` never receive a tick.
pub trait Behavior: Send {
    fn evaluate(&mut self, input: Option<PointValue>, due: Option<DateTime>) -> Vec<PointValue>;
    fn reset(&mut self);
}

/// Never runs its transform.
#[derive(Default)]
pub struct NeverTriggers;

impl Behavior for NeverTriggers {
    fn evaluate(&mut self, _input: Option<PointValue>, _due: Option<DateTime>) -> Vec<PointValue> {
        Vec::new()
    }

    fn reset(&mut self) {}
}

/// Runs the transform on every observed input value.
#[derive(Default)]
pub struct AlwaysTriggers;

impl Behavior for AlwaysTriggers {
    fn evaluate(&mut self, input: Option<PointValue>, _due: Option<DateTime>) -> Vec<PointValue> {
        input.into_iter().collect()
    }

    fn reset(&mut self) {}
}

/// Forwards the observed value as-is, bypassing whatever transform the
/// relation names — mirrors a point's value onto another point's
/// identity without recomputing it.
#[derive(Default)]
pub struct Replicator;

impl Behavior for Replicator {
    fn evaluate(&mut self, input: Option<PointValue>, _due: Option<DateTime>) -> Vec<PointValue> {
        input.into_iter().collect()
    }

    fn reset(&mut self) {}
}

/// Buffers the latest observed input and only emits it when the
/// relation's sync schedule ticks, carrying the input's original stamp.
#[derive(Default)]
pub struct Synchronized {
    last: Option<PointValue>,
}

impl Behavior for Synchronized {
    fn evaluate(&mut self, input: Option<PointValue>, due: Option<DateTime>) -> Vec<PointValue> {
        if let Some(v) = input {
            self.last = Some(v);
        }
        if due.is_some() {
            self.last.clone().into_iter().collect()
        } else {
            Vec::new()
        }
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

/// Buffers the latest observed input and, on each sync tick, emits it
/// re-stamped at the tick (zero-order hold) rather than at its original
/// stamp — contrast with [`Synchronized`].
#[derive(Default)]
pub struct Resynchronized {
    resync: Resynchronizer,
}

impl Behavior for Resynchronized {
    fn evaluate(&mut self, input: Option<PointValue>, due: Option<DateTime>) -> Vec<PointValue> {
        if let Some(v) = input {
            self.resync.observe(v);
        }
        match due {
            Some(stamp) => self.resync.resample(stamp).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.resync.reset();
    }
}

/// Runs the transform only on input values that survive a [`StepFilter`].
pub struct StepFiltered(pub StepFilter);

impl Behavior for StepFiltered {
    fn evaluate(&mut self, input: Option<PointValue>, _due: Option<DateTime>) -> Vec<PointValue> {
        self.0.filter(input)
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

/// Runs the transform only on input values that survive a
/// [`DeadbandFilter`].
pub struct DeadbandFiltered(pub DeadbandFilter);

impl Behavior for DeadbandFiltered {
    fn evaluate(&mut self, input: Option<PointValue>, _due: Option<DateTime>) -> Vec<PointValue> {
        self.0.filter(input)
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}
