//! Step filter.

use crate::model::PointValue;
use crate::time::ElapsedTime;

use super::{trim_stamp, Filter};

/// Passes values that cross a step boundary even when they would
/// otherwise fall inside the deadband; suppresses everything else inside
/// the deadband. Disabled (passes everything) when `step_size <= 0`.
pub struct StepFilter {
    time_limit: ElapsedTime,
    stamp_trim_unit: Option<ElapsedTime>,
    deadband_gap: f64,
    deadband_ratio: f64,
    step_size: f64,
    ceiling_gap: f64,
    floor_gap: f64,
    prev: Option<PointValue>,
}

impl StepFilter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time_limit: ElapsedTime,
        stamp_trim_unit: Option<ElapsedTime>,
        deadband_gap: f64,
        deadband_ratio: f64,
        step_size: f64,
        ceiling_gap: f64,
        floor_gap: f64,
    ) -> Self {
        StepFilter {
            time_limit,
            stamp_trim_unit,
            deadband_gap,
            deadband_ratio,
            step_size,
            ceiling_gap,
            floor_gap,
            prev: None,
        }
    }

    fn is_disabled(&self) -> bool {
        self.step_size <= 0.0
    }

    /// True when `new` has moved far enough from the step multiple
    /// nearest `prev` to count as a step change rather than noise around
    /// the same step.
    fn crosses_step_boundary(&self, prev: f64, new: f64) -> bool {
        let nearest_multiple = (prev / self.step_size).round() * self.step_size;
        let distance = (new - nearest_multiple).abs();
        let gap = if new >= nearest_multiple {
            self.ceiling_gap
        } else {
            self.floor_gap
        };
        distance > gap
    }

    fn in_deadband(&self, prev: &PointValue, new: &PointValue) -> bool {
        let (Some(p), Some(n)) = (prev.value.as_f64(), new.value.as_f64()) else {
            return false;
        };
        let within_time = (new.stamp - prev.stamp) <= self.time_limit;
        let threshold = self.deadband_gap.max(p.abs() * self.deadband_ratio);
        within_time && (n - p).abs() < threshold
    }
}

impl Filter for StepFilter {
    fn filter(&mut self, input: Option<PointValue>) -> Vec<PointValue> {
        let Some(mut new) = input else {
            return Vec::new();
        };
        if self.is_disabled() {
            return vec![new];
        }
        new.stamp = trim_stamp(new.stamp, self.stamp_trim_unit);

        match &self.prev {
            None => {
                self.prev = Some(new.clone());
                vec![new]
            }
            Some(prev) => {
                let crosses = match (prev.value.as_f64(), new.value.as_f64()) {
                    (Some(p), Some(n)) => self.crosses_step_boundary(p, n),
                    _ => true,
                };
                let suppress = self.in_deadband(prev, &new) && !crosses;
                if suppress {
                    Vec::new()
                } else {
                    self.prev = Some(new.clone());
                    vec![new]
                }
            }
        }
    }

    fn reset(&mut self) {
        self.prev = None;
    }
}
