//! Self-describing tagged binary encoding for [`Value`].
//!
//! The tag table is append-only: existing tags never change meaning, and a
//! decoder only needs to know the tags that existed when it shipped to
//! read data written by a newer encoder for every case it recognizes.

use crate::error::{PointError, Result};

use super::{BigRational, Complex, Envelope, Rational, Value};

const TAG_NULL: u8 = 0;
const TAG_INT64: u8 = 1;
const TAG_DOUBLE: u8 = 2;
const TAG_BOOLEAN: u8 = 3;
const TAG_DECIMAL: u8 = 4;
const TAG_RATIONAL: u8 = 5;
const TAG_BIG_RATIONAL: u8 = 6;
const TAG_COMPLEX: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_BYTES: u8 = 9;
const TAG_TUPLE: u8 = 10;
const TAG_DICT: u8 = 11;
const TAG_ENCRYPTED: u8 = 12;
const TAG_SIGNED: u8 = 13;

pub fn encode(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Int64(v) => {
            out.push(TAG_INT64);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Double(v) => {
            out.push(TAG_DOUBLE);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Value::Boolean(v) => {
            out.push(TAG_BOOLEAN);
            out.push(if *v { 1 } else { 0 });
        }
        Value::Decimal { unscaled, scale } => {
            out.push(TAG_DECIMAL);
            out.extend_from_slice(&unscaled.to_be_bytes());
            out.extend_from_slice(&scale.to_be_bytes());
        }
        Value::Rational(r) => {
            out.push(TAG_RATIONAL);
            out.extend_from_slice(&r.numerator.to_be_bytes());
            out.extend_from_slice(&r.denominator.to_be_bytes());
        }
        Value::BigRational(r) => {
            out.push(TAG_BIG_RATIONAL);
            write_blob(out, &r.numerator);
            write_blob(out, &r.denominator);
        }
        Value::Complex(c) => {
            out.push(TAG_COMPLEX);
            out.extend_from_slice(&c.re.to_bits().to_be_bytes());
            out.extend_from_slice(&c.im.to_bits().to_be_bytes());
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            write_blob(out, s.as_bytes());
        }
        Value::Bytes(b) => {
            out.push(TAG_BYTES);
            write_blob(out, b);
        }
        Value::Tuple(items) => {
            out.push(TAG_TUPLE);
            out.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                encode(item, out);
            }
        }
        Value::Dict(entries) => {
            out.push(TAG_DICT);
            out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
            for (key, val) in entries {
                write_blob(out, key.as_bytes());
                encode(val, out);
            }
        }
        Value::Encrypted(inner, env) => {
            out.push(TAG_ENCRYPTED);
            write_envelope(out, env);
            encode(inner, out);
        }
        Value::Signed(inner, env) => {
            out.push(TAG_SIGNED);
            write_envelope(out, env);
            encode(inner, out);
        }
    }
}

fn write_blob(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn write_envelope(out: &mut Vec<u8>, env: &Envelope) {
    write_blob(out, env.algorithm.as_bytes());
    write_blob(out, &env.payload);
}

pub fn decode(buf: &[u8]) -> Result<(Value, usize)> {
    let mut r = Reader { buf, pos: 0 };
    let value = decode_one(&mut r)?;
    Ok((value, r.pos))
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(PointError::FormatError("value buffer truncated".into()));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn tag(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        let bits = u64::from_be_bytes(self.take(8)?.try_into().unwrap());
        Ok(f64::from_bits(bits))
    }

    fn blob(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> Result<String> {
        let bytes = self.blob()?;
        String::from_utf8(bytes).map_err(|e| PointError::FormatError(e.to_string()))
    }

    fn envelope(&mut self) -> Result<Envelope> {
        let algorithm = self.string()?;
        let payload = self.blob()?;
        Ok(Envelope { algorithm, payload })
    }
}

fn decode_one(r: &mut Reader<'_>) -> Result<Value> {
    let tag = r.tag()?;
    let value = match tag {
        TAG_NULL => Value::Null,
        TAG_INT64 => Value::Int64(r.i64()?),
        TAG_DOUBLE => Value::Double(r.f64()?),
        TAG_BOOLEAN => Value::Boolean(r.take(1)?[0] != 0),
        TAG_DECIMAL => {
            let unscaled = r.i64()?;
            let scale = r.u32()?;
            Value::Decimal { unscaled, scale }
        }
        TAG_RATIONAL => {
            let numerator = r.i64()?;
            let denominator = r.i64()?;
            Value::Rational(Rational {
                numerator,
                denominator,
            })
        }
        TAG_BIG_RATIONAL => {
            let numerator = r.blob()?;
            let denominator = r.blob()?;
            Value::BigRational(BigRational {
                numerator,
                denominator,
            })
        }
        TAG_COMPLEX => {
            let re = r.f64()?;
            let im = r.f64()?;
            Value::Complex(Complex { re, im })
        }
        TAG_STRING => Value::String(r.string()?),
        TAG_BYTES => Value::Bytes(r.blob()?),
        TAG_TUPLE => {
            let count = r.u32()? as usize;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_one(r)?);
            }
            Value::Tuple(items)
        }
        TAG_DICT => {
            let count = r.u32()? as usize;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let key = r.string()?;
                let val = decode_one(r)?;
                entries.push((key, val));
            }
            Value::Dict(entries)
        }
        TAG_ENCRYPTED => {
            let env = r.envelope()?;
            let inner = decode_one(r)?;
            Value::Encrypted(Box::new(inner), env)
        }
        TAG_SIGNED => {
            let env = r.envelope()?;
            let inner = decode_one(r)?;
            Value::Signed(Box::new(inner), env)
        }
        other => return Err(PointError::FormatError(format!("unknown value tag {other}"))),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let mut buf = Vec::new();
        encode(&v, &mut buf);
        let (decoded, consumed) = decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, v);
    }

    #[test]
    fn roundtrip_all_scalar_kinds() {
        roundtrip(Value::Null);
        roundtrip(Value::Int64(-42));
        roundtrip(Value::Double(3.5));
        roundtrip(Value::Boolean(true));
        roundtrip(Value::Decimal {
            unscaled: 12345,
            scale: 2,
        });
        roundtrip(Value::Rational(Rational::new(3, 4)));
        roundtrip(Value::BigRational(BigRational {
            numerator: vec![1, 2, 3],
            denominator: vec![4],
        }));
        roundtrip(Value::Complex(Complex { re: 1.0, im: -2.0 }));
        roundtrip(Value::String("hello".into()));
        roundtrip(Value::Bytes(vec![9, 8, 7]));
    }

    #[test]
    fn roundtrip_nested_tuple_and_dict() {
        roundtrip(Value::Tuple(vec![
            Value::Int64(1),
            Value::String("x".into()),
            Value::Tuple(vec![Value::Null]),
        ]));
        roundtrip(Value::Dict(vec![
            ("a".into(), Value::Int64(1)),
            ("b".into(), Value::Boolean(false)),
        ]));
    }

    #[test]
    fn roundtrip_envelopes() {
        roundtrip(Value::Encrypted(
            Box::new(Value::Int64(7)),
            Envelope {
                algorithm: "aes-256-gcm".into(),
                payload: vec![1, 2, 3, 4],
            },
        ));
        roundtrip(Value::Signed(
            Box::new(Value::String("payload".into())),
            Envelope {
                algorithm: "ed25519".into(),
                payload: vec![5, 6],
            },
        ));
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let err = decode(&[255]).unwrap_err();
        assert!(matches!(err, PointError::FormatError(_)));
    }
}
