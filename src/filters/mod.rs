//! Value filters: single-point-in, zero-or-more-points-out
//! transducers with reset. Not reentrant; hold at most O(1) buffered state.

pub mod deadband;
pub mod interpolator;
pub mod resync;
pub mod step;

use crate::model::PointValue;

/// Contract shared by every ingress filter.
pub trait Filter: Send {
    /// `None` flushes any held value. Returns zero or more point values in
    /// chronological order.
    fn filter(&mut self, input: Option<PointValue>) -> Vec<PointValue>;

    /// Clears all buffered state: `reset(); filter(v)` passes `v`
    /// exactly as a fresh filter would.
    fn reset(&mut self);
}

/// Floors a stamp to the given unit, if one is configured. Used by
/// `DeadbandFilter`/`StepFilter`'s `stamp_trim_unit`.
pub(crate) fn trim_stamp(
    stamp: crate::time::DateTime,
    unit: Option<crate::time::ElapsedTime>,
) -> crate::time::DateTime {
    match unit {
        None => stamp,
        Some(unit) if unit.micros() <= 0 => stamp,
        Some(unit) => {
            let floored = stamp.micros().div_euclid(unit.micros()) * unit.micros();
            crate::time::DateTime::from_micros(floored)
        }
    }
}
