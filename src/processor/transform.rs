//! Per-relation value transforms: given the point
//! value(s) a relation's [`super::behavior::Behavior`] selected to run,
//! produces the point value(s) committed to the result point.

use crate::filters::resync::Resynchronizer;
use crate::filters::step::StepFilter;
use crate::filters::Filter;
use crate::model::{PointId, PointValue};
use crate::value::Value;

pub trait Transform: Send {
    /// `inputs` are the point values selected for this tick; `result` is
    /// the point the transform writes to. Returns zero or more point
    /// values to commit.
    fn apply(&mut self, result: PointId, inputs: &[PointValue]) -> Vec<PointValue>;

    fn reset(&mut self) {}
}

/// Retags each input value onto the result point unchanged.
#[derive(Default)]
pub struct NullTransform;

impl Transform for NullTransform {
    fn apply(&mut self, result: PointId, inputs: &[PointValue]) -> Vec<PointValue> {
        inputs
            .iter()
            .cloned()
            .map(|mut v| {
                v.point = result;
                v
            })
            .collect()
    }
}

/// Extracts one field of a `Tuple`/`Dict` input value, by position or by
/// key, and retags it onto the result point. A value that does not match
/// the configured shape extracts as `Value::Null`.
pub struct SplitterTransform {
    pub index: Option<usize>,
    pub key: Option<String>,
}

impl Transform for SplitterTransform {
    fn apply(&mut self, result: PointId, inputs: &[PointValue]) -> Vec<PointValue> {
        inputs
            .iter()
            .map(|input| {
                let extracted = match (&input.value, self.index, &self.key) {
                    (Value::Tuple(items), Some(i), _) => {
                        items.get(i).cloned().unwrap_or(Value::Null)
                    }
                    (Value::Dict(entries), _, Some(k)) => entries
                        .iter()
                        .find(|(key, _)| key == k)
                        .map(|(_, v)| v.clone())
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                PointValue {
                    point: result,
                    stamp: input.stamp,
                    state: input.state.clone(),
                    value: extracted,
                }
            })
            .collect()
    }
}

/// Applies a [`StepFilter`] to the transform's own output series,
/// independent of whatever gated the relation's triggering upstream.
pub struct StepFilterTransform(pub StepFilter);

impl Transform for StepFilterTransform {
    fn apply(&mut self, result: PointId, inputs: &[PointValue]) -> Vec<PointValue> {
        inputs
            .iter()
            .flat_map(|input| {
                let mut retagged = input.clone();
                retagged.point = result;
                self.0.filter(Some(retagged))
            })
            .collect()
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

/// Holds the latest non-null input and, on a tick marker (an input whose
/// value is `Value::Null`, carrying the tick's stamp), emits the held
/// value re-stamped there.
pub struct ResynchronizerTransform(pub Resynchronizer);

impl Transform for ResynchronizerTransform {
    fn apply(&mut self, result: PointId, inputs: &[PointValue]) -> Vec<PointValue> {
        let mut out = Vec::new();
        for input in inputs {
            if input.value.is_null() {
                if let Some(mut resampled) = self.0.resample(input.stamp) {
                    resampled.point = result;
                    out.push(resampled);
                }
            } else {
                self.0.observe(input.clone());
            }
        }
        out
    }

    fn reset(&mut self) {
        self.0.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::DateTime;

    fn pv(point: u128, t: i64, v: Value) -> PointValue {
        PointValue::new(PointId(point), DateTime::from_micros(t), v)
    }

    #[test]
    fn null_transform_retags_point_identity() {
        let mut t = NullTransform;
        let out = t.apply(PointId(9), &[pv(1, 0, Value::Int64(1))]);
        assert_eq!(out[0].point, PointId(9));
    }

    #[test]
    fn splitter_extracts_tuple_field_by_index() {
        let mut t = SplitterTransform {
            index: Some(1),
            key: None,
        };
        let input = pv(1, 0, Value::Tuple(vec![Value::Int64(10), Value::Int64(20)]));
        let out = t.apply(PointId(9), &[input]);
        assert_eq!(out[0].value, Value::Int64(20));
    }

    #[test]
    fn splitter_extracts_dict_field_by_key() {
        let mut t = SplitterTransform {
            index: None,
            key: Some("b".into()),
        };
        let input = pv(
            1,
            0,
            Value::Dict(vec![
                ("a".into(), Value::Int64(1)),
                ("b".into(), Value::Int64(2)),
            ]),
        );
        let out = t.apply(PointId(9), &[input]);
        assert_eq!(out[0].value, Value::Int64(2));
    }

    #[test]
    fn resynchronizer_transform_emits_only_on_tick_marker() {
        let mut t = ResynchronizerTransform(Resynchronizer::new());
        assert!(t.apply(PointId(9), &[pv(1, 0, Value::Double(3.0))]).is_empty());
        let out = t.apply(PointId(9), &[pv(1, 100, Value::Null)]);
        assert_eq!(out[0].value, Value::Double(3.0));
        assert_eq!(out[0].stamp, DateTime::from_micros(100));
    }
}
