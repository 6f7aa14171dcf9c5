//! Hand-written CBOR <-> JSON bridge (spec §4.6, §8 invariant 4).
//!
//! Written directly over `bytes::{Buf, BufMut}` rather than adopting a
//! generic CBOR `Value` crate, because the spec pins exact wire conventions
//! a generic mapping wouldn't expose: minimal integer width, the
//! `n = -1 - encoded` negative-integer convention, the narrowest
//! round-tripping float width, and definite-length writes that still accept
//! indefinite-length (chunked) strings on read. Grounded on
//! `original_source/src/cbor_tools.cpp` and `cbor_json.cpp`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CborError {
    #[error("unexpected end of CBOR input")]
    UnexpectedEof,
    #[error("unsupported CBOR major type {0}")]
    UnsupportedMajorType(u8),
    #[error("float value has no JSON representation")]
    NonFiniteFloat,
    #[error("map key must be a string, got: {0:?}")]
    NonStringKey(Value),
    #[error("JSON number out of CBOR-representable range: {0}")]
    NumberOutOfRange(Number),
    #[error("invalid utf-8 in CBOR text string")]
    InvalidUtf8,
}

const MT_UNSIGNED: u8 = 0;
const MT_NEGATIVE: u8 = 1;
const MT_BYTES: u8 = 2;
const MT_TEXT: u8 = 3;
const MT_ARRAY: u8 = 4;
const MT_MAP: u8 = 5;
const MT_SIMPLE: u8 = 7;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;
const SIMPLE_F16: u8 = 25;
const SIMPLE_F32: u8 = 26;
const SIMPLE_F64: u8 = 27;
const SIMPLE_BREAK: u8 = 31;

/// Serializes `value` to CBOR bytes.
pub fn json_to_cbor(value: &Value) -> Bytes {
    let mut buf = BytesMut::new();
    write_value(&mut buf, value);
    buf.freeze()
}

/// Parses a CBOR byte sequence back into a `serde_json::Value`.
pub fn cbor_to_json(mut data: &[u8]) -> Result<Value, CborError> {
    let value = read_value(&mut data)?;
    Ok(value)
}

fn write_head(buf: &mut BytesMut, major: u8, arg: u64) {
    let major_bits = major << 5;
    match arg {
        0..=23 => buf.put_u8(major_bits | arg as u8),
        24..=0xFF => {
            buf.put_u8(major_bits | 24);
            buf.put_u8(arg as u8);
        }
        0x100..=0xFFFF => {
            buf.put_u8(major_bits | 25);
            buf.put_u16(arg as u16);
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.put_u8(major_bits | 26);
            buf.put_u32(arg as u32);
        }
        _ => {
            buf.put_u8(major_bits | 27);
            buf.put_u64(arg);
        }
    }
}

fn write_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Null => buf.put_u8((MT_SIMPLE << 5) | SIMPLE_NULL),
        Value::Bool(false) => buf.put_u8((MT_SIMPLE << 5) | SIMPLE_FALSE),
        Value::Bool(true) => buf.put_u8((MT_SIMPLE << 5) | SIMPLE_TRUE),
        Value::Number(n) => write_number(buf, n),
        Value::String(s) => {
            write_head(buf, MT_TEXT, s.len() as u64);
            buf.put_slice(s.as_bytes());
        }
        Value::Array(items) => {
            write_head(buf, MT_ARRAY, items.len() as u64);
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Object(map) => {
            write_head(buf, MT_MAP, map.len() as u64);
            for (k, v) in map {
                write_head(buf, MT_TEXT, k.len() as u64);
                buf.put_slice(k.as_bytes());
                write_value(buf, v);
            }
        }
    }
}

fn write_number(buf: &mut BytesMut, n: &Number) {
    if let Some(u) = n.as_u64() {
        write_head(buf, MT_UNSIGNED, u);
        return;
    }
    if let Some(i) = n.as_i64() {
        if i >= 0 {
            write_head(buf, MT_UNSIGNED, i as u64);
        } else {
            // CBOR negative-integer convention: n = -1 - encoded
            let encoded = (-1i64 - i) as u64;
            write_head(buf, MT_NEGATIVE, encoded);
        }
        return;
    }
    let f = n.as_f64().expect("serde_json::Number is always one of u64/i64/f64");
    write_float(buf, f);
}

fn write_float(buf: &mut BytesMut, f: f64) {
    // Prefer the narrowest width that round-trips exactly.
    let as_f32 = f as f32;
    if as_f32 as f64 == f {
        buf.put_u8((MT_SIMPLE << 5) | SIMPLE_F32);
        buf.put_f32(as_f32);
    } else {
        buf.put_u8((MT_SIMPLE << 5) | SIMPLE_F64);
        buf.put_f64(f);
    }
}

fn read_u8(data: &mut &[u8]) -> Result<u8, CborError> {
    if data.is_empty() {
        return Err(CborError::UnexpectedEof);
    }
    let b = data[0];
    data.advance(1);
    Ok(b)
}

fn read_arg(data: &mut &[u8], info: u8) -> Result<u64, CborError> {
    match info {
        0..=23 => Ok(info as u64),
        24 => {
            if data.remaining() < 1 {
                return Err(CborError::UnexpectedEof);
            }
            Ok(data.get_u8() as u64)
        }
        25 => {
            if data.remaining() < 2 {
                return Err(CborError::UnexpectedEof);
            }
            Ok(data.get_u16() as u64)
        }
        26 => {
            if data.remaining() < 4 {
                return Err(CborError::UnexpectedEof);
            }
            Ok(data.get_u32() as u64)
        }
        27 => {
            if data.remaining() < 8 {
                return Err(CborError::UnexpectedEof);
            }
            Ok(data.get_u64())
        }
        31 => Ok(u64::MAX), // sentinel: indefinite length, caller must special-case `info == 31`
        _ => Err(CborError::UnsupportedMajorType(info)),
    }
}

fn read_value(data: &mut &[u8]) -> Result<Value, CborError> {
    let head = read_u8(data)?;
    let major = head >> 5;
    let info = head & 0x1F;

    match major {
        MT_UNSIGNED => {
            let v = read_arg(data, info)?;
            Ok(Value::Number(v.into()))
        }
        MT_NEGATIVE => {
            let encoded = read_arg(data, info)?;
            let value: i128 = -1 - encoded as i128;
            let clamped = i64::try_from(value).unwrap_or(i64::MIN);
            Ok(Value::Number(Number::from(clamped)))
        }
        MT_BYTES => {
            let bytes = read_bytes_or_text(data, info, false)?;
            // JSON has no byte-string primitive; base64 is the lossless
            // bridge, matching how encoded-frame payloads already travel as
            // base64 JSON strings elsewhere in this workspace.
            Ok(Value::String(crate::base64_encode(&bytes)))
        }
        MT_TEXT => {
            let bytes = read_bytes_or_text(data, info, true)?;
            Ok(Value::String(
                String::from_utf8(bytes).map_err(|_| CborError::InvalidUtf8)?,
            ))
        }
        MT_ARRAY => {
            if info == 31 {
                let mut items = Vec::new();
                loop {
                    if peek_is_break(data)? {
                        data.advance(1);
                        break;
                    }
                    items.push(read_value(data)?);
                }
                Ok(Value::Array(items))
            } else {
                let len = read_arg(data, info)?;
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(read_value(data)?);
                }
                Ok(Value::Array(items))
            }
        }
        MT_MAP => {
            let mut map = Map::new();
            if info == 31 {
                loop {
                    if peek_is_break(data)? {
                        data.advance(1);
                        break;
                    }
                    let key = read_value(data)?;
                    let value = read_value(data)?;
                    insert_key(&mut map, key, value)?;
                }
            } else {
                let len = read_arg(data, info)?;
                for _ in 0..len {
                    let key = read_value(data)?;
                    let value = read_value(data)?;
                    insert_key(&mut map, key, value)?;
                }
            }
            Ok(Value::Object(map))
        }
        MT_SIMPLE => match info {
            SIMPLE_FALSE => Ok(Value::Bool(false)),
            SIMPLE_TRUE => Ok(Value::Bool(true)),
            SIMPLE_NULL => Ok(Value::Null),
            SIMPLE_F16 => {
                // half-precision: widen via f32 bit-twiddling, good enough
                // since we never emit f16 ourselves.
                if data.remaining() < 2 {
                    return Err(CborError::UnexpectedEof);
                }
                let bits = data.get_u16();
                Ok(Value::from(half_to_f64(bits)))
            }
            SIMPLE_F32 => {
                if data.remaining() < 4 {
                    return Err(CborError::UnexpectedEof);
                }
                let f = data.get_f32();
                Number::from_f64(f as f64)
                    .map(Value::Number)
                    .ok_or(CborError::NonFiniteFloat)
            }
            SIMPLE_F64 => {
                if data.remaining() < 8 {
                    return Err(CborError::UnexpectedEof);
                }
                let f = data.get_f64();
                Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or(CborError::NonFiniteFloat)
            }
            other => Err(CborError::UnsupportedMajorType(other)),
        },
        other => Err(CborError::UnsupportedMajorType(other)),
    }
}

fn insert_key(map: &mut Map<String, Value>, key: Value, value: Value) -> Result<(), CborError> {
    match key {
        Value::String(s) => {
            map.insert(s, value);
            Ok(())
        }
        other => Err(CborError::NonStringKey(other)),
    }
}

fn peek_is_break(data: &[u8]) -> Result<bool, CborError> {
    let b = *data.first().ok_or(CborError::UnexpectedEof)?;
    Ok((b >> 5) == MT_SIMPLE && (b & 0x1F) == SIMPLE_BREAK)
}

/// Reads a definite- or indefinite-length byte/text string starting right
/// after the head byte has already been split into `major`/`info`.
fn read_bytes_or_text(data: &mut &[u8], info: u8, is_text: bool) -> Result<Vec<u8>, CborError> {
    if info == 31 {
        let mut out = Vec::new();
        loop {
            if peek_is_break(data)? {
                data.advance(1);
                break;
            }
            let chunk_head = read_u8(data)?;
            let chunk_major = chunk_head >> 5;
            let expected = if is_text { MT_TEXT } else { MT_BYTES };
            if chunk_major != expected {
                return Err(CborError::UnsupportedMajorType(chunk_head));
            }
            let chunk_info = chunk_head & 0x1F;
            let len = read_arg(data, chunk_info)? as usize;
            if data.remaining() < len {
                return Err(CborError::UnexpectedEof);
            }
            out.extend_from_slice(&data[..len]);
            data.advance(len);
        }
        Ok(out)
    } else {
        let len = read_arg(data, info)? as usize;
        if data.remaining() < len {
            return Err(CborError::UnexpectedEof);
        }
        let out = data[..len].to_vec();
        data.advance(len);
        Ok(out)
    }
}

fn half_to_f64(bits: u16) -> f64 {
    let sign = (bits >> 15) & 1;
    let exponent = (bits >> 10) & 0x1F;
    let fraction = bits & 0x3FF;
    let value = if exponent == 0 {
        (fraction as f64) * 2f64.powi(-24)
    } else if exponent == 0x1F {
        if fraction == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else {
        (1.0 + fraction as f64 / 1024.0) * 2f64.powi(exponent as i32 - 15)
    };
    if sign == 1 {
        -value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_scalars() {
        for value in [json!(null), json!(true), json!(false), json!("hello")] {
            assert_eq!(value, cbor_to_json(&json_to_cbor(&value)).unwrap());
        }
    }

    #[test]
    fn round_trips_small_and_large_unsigned() {
        for n in [0u64, 23, 24, 255, 256, 65535, 65536, u32::MAX as u64, u64::MAX] {
            let value = json!(n);
            assert_eq!(value, cbor_to_json(&json_to_cbor(&value)).unwrap());
        }
    }

    #[test]
    fn round_trips_negative_integers() {
        for n in [-1i64, -24, -25, -256, -257, -65536, i32::MIN as i64] {
            let value = json!(n);
            assert_eq!(value, cbor_to_json(&json_to_cbor(&value)).unwrap());
        }
    }

    #[test]
    fn negative_encoding_matches_cbor_convention() {
        // n = -1 encodes as major type 1, argument 0 -> single byte 0x20.
        assert_eq!(Bytes::from_static(&[0x20]), json_to_cbor(&json!(-1)));
        // n = -10 -> argument 9 -> 0x29.
        assert_eq!(Bytes::from_static(&[0x29]), json_to_cbor(&json!(-10)));
    }

    #[test]
    fn round_trips_floats_with_narrowest_width() {
        let half = json!(1.5);
        let cbor = json_to_cbor(&half);
        // 1.5 is exactly representable in f32, so it must use the 5-byte f32 form.
        assert_eq!(5, cbor.len());
        assert_eq!(half, cbor_to_json(&cbor).unwrap());

        let needs_f64 = json!(0.1f64);
        let cbor64 = json_to_cbor(&needs_f64);
        assert_eq!(9, cbor64.len());
        assert_eq!(needs_f64, cbor_to_json(&cbor64).unwrap());
    }

    #[test]
    fn round_trips_arrays_and_objects() {
        let value = json!({
            "codecName": "vp9",
            "chunks": [1, 2, 3],
            "nested": {"a": true, "b": null},
        });
        assert_eq!(value, cbor_to_json(&json_to_cbor(&value)).unwrap());
    }

    #[test]
    fn decodes_indefinite_length_text_string() {
        // Indefinite text string (0x7f) containing two definite chunks "hel" (0x63) and "lo" (0x62), then break (0xff).
        let mut bytes = vec![0x7f, 0x63];
        bytes.extend_from_slice(b"hel");
        bytes.push(0x62);
        bytes.extend_from_slice(b"lo");
        bytes.push(0xff);
        assert_eq!(json!("hello"), cbor_to_json(&bytes).unwrap());
    }

    #[test]
    fn decodes_indefinite_length_array() {
        // Indefinite array (0x9f) with two uints (1, 2), then break (0xff).
        let bytes = vec![0x9f, 0x01, 0x02, 0xff];
        assert_eq!(json!([1, 2]), cbor_to_json(&bytes).unwrap());
    }
}
