//! Interpolator filter: drops a midpoint that lies on the
//! line between its neighbours within a deadband, collapsing runs of
//! collinear samples to their endpoints.

use crate::model::PointValue;
use crate::time::ElapsedTime;

use super::{trim_stamp, Filter};

/// Holds the last *emitted* point (`anchor`) and one buffered candidate
/// (`pending`) that has not yet been proven non-collinear.
pub struct InterpolatorFilter {
    time_limit: ElapsedTime,
    stamp_trim_unit: Option<ElapsedTime>,
    gap: f64,
    ratio: f64,
    anchor: Option<PointValue>,
    pending: Option<PointValue>,
}

impl InterpolatorFilter {
    pub fn new(
        time_limit: ElapsedTime,
        stamp_trim_unit: Option<ElapsedTime>,
        gap: f64,
        ratio: f64,
    ) -> Self {
        InterpolatorFilter {
            time_limit,
            stamp_trim_unit,
            gap,
            ratio,
            anchor: None,
            pending: None,
        }
    }

    fn gap_exceeded(&self, a: &PointValue, b: &PointValue) -> bool {
        (b.stamp - a.stamp) > self.time_limit
    }

    /// True when `mid` lies within deadband of the line from `anchor` to
    /// `next` at `mid`'s timestamp.
    fn on_line(&self, anchor: &PointValue, mid: &PointValue, next: &PointValue) -> bool {
        let (Some(a), Some(m), Some(n)) = (
            anchor.value.as_f64(),
            mid.value.as_f64(),
            next.value.as_f64(),
        ) else {
            return false;
        };
        let t_a = anchor.stamp.micros() as f64;
        let t_m = mid.stamp.micros() as f64;
        let t_n = next.stamp.micros() as f64;
        if t_n == t_a {
            return (m - a).abs() < self.gap.max(a.abs() * self.ratio);
        }
        let expected = a + (n - a) * ((t_m - t_a) / (t_n - t_a));
        let threshold = self.gap.max(expected.abs() * self.ratio);
        (m - expected).abs() < threshold
    }

    fn flush_pending(&mut self) -> Vec<PointValue> {
        match self.pending.take() {
            Some(p) => {
                self.anchor = Some(p.clone());
                vec![p]
            }
            None => Vec::new(),
        }
    }
}

impl Filter for InterpolatorFilter {
    fn filter(&mut self, input: Option<PointValue>) -> Vec<PointValue> {
        let Some(mut new) = input else {
            return self.flush_pending();
        };
        new.stamp = trim_stamp(new.stamp, self.stamp_trim_unit);

        let anchor = match &self.anchor {
            None => {
                self.anchor = Some(new.clone());
                return vec![new];
            }
            Some(a) => a.clone(),
        };

        if self.gap_exceeded(&anchor, &new) {
            let mut out = self.flush_pending();
            self.anchor = Some(new.clone());
            out.push(new);
            return out;
        }

        match self.pending.take() {
            None => {
                self.pending = Some(new);
                Vec::new()
            }
            Some(mid) => {
                if self.gap_exceeded(&mid, &new) {
                    // Break the run: the buffered midpoint stands on its own.
                    self.anchor = Some(mid.clone());
                    self.pending = Some(new);
                    vec![mid]
                } else if self.on_line(&anchor, &mid, &new) {
                    self.pending = Some(new);
                    Vec::new()
                } else {
                    self.anchor = Some(mid.clone());
                    self.pending = Some(new);
                    vec![mid]
                }
            }
        }
    }

    fn reset(&mut self) {
        self.anchor = None;
        self.pending = None;
    }
}
