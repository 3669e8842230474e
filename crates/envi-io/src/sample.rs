//! Conversion between raw sample bytes and `f64`.

use hsi_common::DataType;
use num_traits::{NumCast, ToPrimitive};

use crate::error::{EnviError, EnviResult};

/// Decode `out.len()` samples from `bytes`.
pub(crate) fn decode(bytes: &[u8], data_type: DataType, big_endian: bool, out: &mut [f64]) {
    let size = data_type.size();
    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(size)) {
        *value = match data_type {
            DataType::U8 => chunk[0] as f64,
            DataType::I16 => from_bytes::<2, i16>(chunk, big_endian, i16::from_le_bytes, i16::from_be_bytes),
            DataType::U16 => from_bytes::<2, u16>(chunk, big_endian, u16::from_le_bytes, u16::from_be_bytes),
            DataType::I32 => from_bytes::<4, i32>(chunk, big_endian, i32::from_le_bytes, i32::from_be_bytes),
            DataType::F32 => from_bytes::<4, f32>(chunk, big_endian, f32::from_le_bytes, f32::from_be_bytes),
            DataType::F64 => from_bytes::<8, f64>(chunk, big_endian, f64::from_le_bytes, f64::from_be_bytes),
        };
    }
}

fn from_bytes<const N: usize, T: ToPrimitive>(
    chunk: &[u8],
    big_endian: bool,
    le: fn([u8; N]) -> T,
    be: fn([u8; N]) -> T,
) -> f64 {
    let mut raw = [0u8; N];
    raw.copy_from_slice(&chunk[..N]);
    let value = if big_endian { be(raw) } else { le(raw) };
    value.to_f64().unwrap_or(f64::NAN)
}

/// Encode `values` as little-endian samples, appending to `out`.
///
/// Integer types round to nearest; NaN or out-of-range values are rejected.
pub(crate) fn encode(values: &[f64], data_type: DataType, out: &mut Vec<u8>) -> EnviResult<()> {
    out.reserve(values.len() * data_type.size());
    for &v in values {
        match data_type {
            DataType::U8 => out.push(cast::<u8>(v, data_type)?),
            DataType::I16 => out.extend_from_slice(&cast::<i16>(v, data_type)?.to_le_bytes()),
            DataType::U16 => out.extend_from_slice(&cast::<u16>(v, data_type)?.to_le_bytes()),
            DataType::I32 => out.extend_from_slice(&cast::<i32>(v, data_type)?.to_le_bytes()),
            DataType::F32 => out.extend_from_slice(&(v as f32).to_le_bytes()),
            DataType::F64 => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
    Ok(())
}

fn cast<T: NumCast>(value: f64, data_type: DataType) -> EnviResult<T> {
    <T as NumCast>::from(value.round()).ok_or_else(|| EnviError::Unrepresentable {
        value,
        data_type: format!("{:?}", data_type),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_roundtrip() {
        let values = [-9999.0, 0.0, 1.4, 32767.0];
        let mut bytes = Vec::new();
        encode(&values, DataType::I16, &mut bytes).unwrap();
        assert_eq!(bytes.len(), 8);

        let mut decoded = [0.0; 4];
        decode(&bytes, DataType::I16, false, &mut decoded);
        assert_eq!(decoded, [-9999.0, 0.0, 1.0, 32767.0]);
    }

    #[test]
    fn test_big_endian_decode() {
        let bytes = 1.5f32.to_be_bytes();
        let mut decoded = [0.0; 1];
        decode(&bytes, DataType::F32, true, &mut decoded);
        assert_eq!(decoded[0], 1.5);
    }

    #[test]
    fn test_rejects_unrepresentable() {
        let mut bytes = Vec::new();
        assert!(encode(&[f64::NAN], DataType::U16, &mut bytes).is_err());
        assert!(encode(&[-1.0], DataType::U8, &mut bytes).is_err());
        assert!(encode(&[f64::NAN], DataType::F32, &mut bytes).is_ok());
    }
}
