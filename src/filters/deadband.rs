//! Deadband suppression.

use crate::model::PointValue;
use crate::time::ElapsedTime;

use super::{trim_stamp, Filter};

/// Emits the first value; thereafter suppresses a new value when both the
/// time limit and the magnitude gap hold.
pub struct DeadbandFilter {
    time_limit: ElapsedTime,
    stamp_trim_unit: Option<ElapsedTime>,
    gap: f64,
    ratio: f64,
    prev: Option<PointValue>,
}

impl DeadbandFilter {
    pub fn new(
        time_limit: ElapsedTime,
        stamp_trim_unit: Option<ElapsedTime>,
        gap: f64,
        ratio: f64,
    ) -> Self {
        DeadbandFilter {
            time_limit,
            stamp_trim_unit,
            gap,
            ratio,
            prev: None,
        }
    }

    fn suppresses(&self, prev: &PointValue, new: &PointValue) -> bool {
        let (Some(p), Some(n)) = (prev.value.as_f64(), new.value.as_f64()) else {
            return false;
        };
        let within_time = (new.stamp - prev.stamp) <= self.time_limit;
        let threshold = self.gap.max(p.abs() * self.ratio);
        within_time && (n - p).abs() < threshold
    }
}

impl Filter for DeadbandFilter {
    fn filter(&mut self, input: Option<PointValue>) -> Vec<PointValue> {
        let Some(mut new) = input else {
            return Vec::new();
        };
        new.stamp = trim_stamp(new.stamp, self.stamp_trim_unit);

        match &self.prev {
            None => {
                self.prev = Some(new.clone());
                vec![new]
            }
            Some(prev) if self.suppresses(prev, &new) => Vec::new(),
            Some(_) => {
                self.prev = Some(new.clone());
                vec![new]
            }
        }
    }

    fn reset(&mut self) {
        self.prev = None;
    }
}
