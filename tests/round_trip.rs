//! Round-trip laws for value encoding and filter determinism.

use pointflow::filters::deadband::DeadbandFilter;
use pointflow::filters::interpolator::InterpolatorFilter;
use pointflow::filters::step::StepFilter;
use pointflow::filters::Filter;
use pointflow::model::{PointId, PointValue, VersionedValue};
use pointflow::time::{DateTime, ElapsedTime};
use pointflow::value::{BigRational, Complex, Envelope, Rational, Value};
use pointflow::wire;

fn roundtrip_value(value: Value) {
    let versioned = VersionedValue {
        point_value: PointValue::new(PointId(0x42), DateTime::from_micros(9_000), value.clone()),
        version: 1,
    };
    let mut buf = Vec::new();
    wire::encode_versioned(&versioned, &mut buf);
    let (decoded, consumed) = wire::decode_versioned(&buf).unwrap();
    assert_eq!(consumed, buf.len());
    assert_eq!(decoded.point_value.value, value);
}

#[test]
fn r1_point_value_embedding_every_value_kind_round_trips() {
    roundtrip_value(Value::Tuple(vec![
        Value::Int64(1),
        Value::Rational(Rational::new(3, 4)),
        Value::Null,
    ]));
    roundtrip_value(Value::Dict(vec![
        ("a".into(), Value::Double(1.5)),
        (
            "b".into(),
            Value::BigRational(BigRational {
                numerator: vec![1, 0, 0],
                denominator: vec![3],
            }),
        ),
    ]));
    roundtrip_value(Value::Complex(Complex { re: 1.0, im: -2.5 }));
    roundtrip_value(Value::Encrypted(
        Box::new(Value::Tuple(vec![Value::Int64(7), Value::Boolean(true)])),
        Envelope {
            algorithm: "aes-256-gcm".into(),
            payload: vec![1, 2, 3, 4, 5],
        },
    ));
    roundtrip_value(Value::Signed(
        Box::new(Value::Dict(vec![("x".into(), Value::String("y".into()))])),
        Envelope {
            algorithm: "ed25519".into(),
            payload: vec![9, 9, 9],
        },
    ));
}

#[test]
fn r1_versioned_value_with_state_round_trips_through_the_wire_frame() {
    let versioned = VersionedValue {
        point_value: PointValue {
            point: PointId(0xABCDEF),
            stamp: DateTime::from_micros(-42),
            state: Some(vec![0xde, 0xad, 0xbe, 0xef]),
            value: Value::Tuple(vec![Value::Int64(-1), Value::String("state".into())]),
        },
        version: 77,
    };
    let mut buf = Vec::new();
    wire::encode_versioned(&versioned, &mut buf);
    let (decoded, _) = wire::decode_versioned(&buf).unwrap();
    assert_eq!(decoded, versioned);
}

fn pv(t: i64, v: f64) -> PointValue {
    PointValue::new(PointId(1), DateTime::from_micros(t), Value::Double(v))
}

#[test]
fn r2_deadband_filter_is_pass_stable_across_two_identically_configured_runs() {
    let sequence = [pv(0, 10.0), pv(30_000_000, 10.5), pv(61_000_000, 20.0)];

    let mut first = DeadbandFilter::new(ElapsedTime::from_seconds(60), None, 1.0, 0.0);
    let first_run: Vec<_> = sequence
        .iter()
        .flat_map(|v| first.filter(Some(v.clone())))
        .collect();

    let mut second = DeadbandFilter::new(ElapsedTime::from_seconds(60), None, 1.0, 0.0);
    let second_run: Vec<_> = sequence
        .iter()
        .flat_map(|v| second.filter(Some(v.clone())))
        .collect();

    assert_eq!(first_run, second_run);
}

#[test]
fn r2_step_filter_is_pass_stable_across_two_identically_configured_runs() {
    let sequence = [pv(0, 2.0), pv(1_000_000, 2.1), pv(2_000_000, 9.5)];

    let make = || {
        StepFilter::new(
            ElapsedTime::from_seconds(60),
            None,
            1.0,
            0.0,
            10.0,
            4.0,
            4.0,
        )
    };

    let mut first = make();
    let first_run: Vec<_> = sequence
        .iter()
        .flat_map(|v| first.filter(Some(v.clone())))
        .collect();

    let mut second = make();
    let second_run: Vec<_> = sequence
        .iter()
        .flat_map(|v| second.filter(Some(v.clone())))
        .collect();

    assert_eq!(first_run, second_run);
}

#[test]
fn r2_interpolator_filter_is_pass_stable_across_two_identically_configured_runs() {
    let sequence = [pv(0, 0.0), pv(10, 5.0), pv(20, 10.0), pv(30, 100.0)];

    let make = || InterpolatorFilter::new(ElapsedTime::from_seconds(60), None, 0.1, 0.0);

    let mut first = make();
    let first_run: Vec<_> = sequence
        .iter()
        .flat_map(|v| first.filter(Some(v.clone())))
        .collect();

    let mut second = make();
    let second_run: Vec<_> = sequence
        .iter()
        .flat_map(|v| second.filter(Some(v.clone())))
        .collect();

    assert_eq!(first_run, second_run);
}
