//! On-the-wire point-value framing: the byte layout shared
//! by the store's write-ahead log and the notifier queues' durable logs.
//! Wraps [`crate::value::codec`]'s tagged value encoding with the point
//! identity, timestamp, version, and optional state envelope.
//!
//! Layout: `[point u128 be][stamp i64 le][version u64 le][state_len u32
//! le, 0xFFFFFFFF for "no state"][state bytes][tagged value]`.

use crate::error::{PointError, Result};
use crate::model::{PointId, PointValue, VersionedValue};
use crate::time::DateTime;
use crate::value::codec;

const NO_STATE: u32 = u32::MAX;

/// Appends the wire encoding of `versioned` to `out`.
pub fn encode_versioned(versioned: &VersionedValue, out: &mut Vec<u8>) {
    out.extend_from_slice(&versioned.point_value.point.to_be_bytes());
    out.extend_from_slice(&versioned.point_value.stamp.micros().to_le_bytes());
    out.extend_from_slice(&versioned.version.to_le_bytes());
    match &versioned.point_value.state {
        Some(state) => {
            out.extend_from_slice(&(state.len() as u32).to_le_bytes());
            out.extend_from_slice(state);
        }
        None => out.extend_from_slice(&NO_STATE.to_le_bytes()),
    }
    codec::encode(&versioned.point_value.value, out);
}

/// Inverse of [`encode_versioned`]. Returns the decoded value and the
/// number of bytes of `buf` it consumed.
pub fn decode_versioned(buf: &[u8]) -> Result<(VersionedValue, usize)> {
    const FIXED_PREFIX: usize = 16 + 8 + 8 + 4;
    if buf.len() < FIXED_PREFIX {
        return Err(PointError::FormatError(
            "point value frame too short".into(),
        ));
    }
    let point = PointId::from_be_bytes(buf[0..16].try_into().unwrap());
    let stamp = DateTime::from_micros(i64::from_le_bytes(buf[16..24].try_into().unwrap()));
    let version = u64::from_le_bytes(buf[24..32].try_into().unwrap());
    let state_len = u32::from_le_bytes(buf[32..36].try_into().unwrap());
    let mut pos = 36usize;
    let state = if state_len == NO_STATE {
        None
    } else {
        let end = pos
            .checked_add(state_len as usize)
            .ok_or_else(|| PointError::FormatError("point value state length overflow".into()))?;
        let bytes = buf
            .get(pos..end)
            .ok_or_else(|| PointError::FormatError("point value state truncated".into()))?
            .to_vec();
        pos = end;
        Some(bytes)
    };
    let (value, consumed) = codec::decode(&buf[pos..])?;
    let point_value = PointValue {
        point,
        stamp,
        state,
        value,
    };
    Ok((
        VersionedValue {
            point_value,
            version,
        },
        pos + consumed,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn roundtrip_with_state() {
        let versioned = VersionedValue {
            point_value: PointValue {
                point: PointId::from_be_bytes([7; 16]),
                stamp: DateTime::from_micros(123_456),
                state: Some(vec![1, 2, 3]),
                value: Value::Double(2.5),
            },
            version: 9,
        };
        let mut buf = Vec::new();
        encode_versioned(&versioned, &mut buf);
        let (decoded, consumed) = decode_versioned(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, versioned);
    }

    #[test]
    fn roundtrip_without_state() {
        let versioned = VersionedValue {
            point_value: PointValue::new(PointId::nil(), DateTime::from_micros(0), Value::Null),
            version: 1,
        };
        let mut buf = Vec::new();
        encode_versioned(&versioned, &mut buf);
        let (decoded, _) = decode_versioned(&buf).unwrap();
        assert_eq!(decoded, versioned);
    }
}
