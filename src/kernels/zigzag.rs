//! This module contains the pure, stateless kernels for Zig-zag encoding and decoding.
//!
//! Numeric streams are unsigned, so the kernel reinterprets each element as a
//! two's complement value of the same width and maps it so that small
//! magnitudes of either sign become small unsigned values.

use num_traits::{PrimInt, Unsigned};

use crate::error::ZstrongError;
use crate::utils::{safe_bytes_to_typed_slice, typed_slice_to_bytes};

//==================================================================================
// 1. Generic Core Logic (The "Engine")
//==================================================================================

/// Maps the two's complement value stored in `n` to its zig-zag code.
pub fn encode_val<T: PrimInt + Unsigned>(n: T) -> T {
    let bits = std::mem::size_of::<T>() * 8;
    let negative = (n >> (bits - 1)) & T::one() == T::one();
    let sign_mask = if negative { T::max_value() } else { T::zero() };
    (n << 1) ^ sign_mask
}

/// Inverse of [`encode_val`].
pub fn decode_val<T: PrimInt + Unsigned>(n: T) -> T {
    let half = n >> 1;
    if n & T::one() == T::one() {
        !half
    } else {
        half
    }
}

//==================================================================================
// 2. Public API
//==================================================================================

pub fn encode<T>(input_slice: &[T], output_buf: &mut Vec<u8>) -> Result<(), ZstrongError>
where
    T: PrimInt + Unsigned + bytemuck::Pod,
{
    let encoded: Vec<T> = input_slice.iter().map(|&v| encode_val(v)).collect();
    output_buf.clear();
    output_buf.extend_from_slice(&typed_slice_to_bytes(&encoded));
    Ok(())
}

pub fn decode<T>(input_bytes: &[u8], output_buf: &mut Vec<u8>) -> Result<(), ZstrongError>
where
    T: PrimInt + Unsigned + bytemuck::Pod,
{
    let encoded = safe_bytes_to_typed_slice::<T>(input_bytes)?;
    let decoded: Vec<T> = encoded.iter().map(|&v| decode_val(v)).collect();
    output_buf.clear();
    output_buf.extend_from_slice(&typed_slice_to_bytes(&decoded));
    Ok(())
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_magnitudes_map_to_small_codes() {
        // 0, -1, 1, -2, 2 stored as u8 two's complement.
        let values: Vec<u8> = vec![0, 0xFF, 1, 0xFE, 2];
        let codes: Vec<u8> = values.iter().map(|&v| encode_val(v)).collect();
        assert_eq!(codes, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_roundtrip_extremes_u64() {
        let original: Vec<u64> = vec![0, 1, u64::MAX, 1 << 63, (1 << 63) - 1];
        let mut encoded = Vec::new();
        encode(&original, &mut encoded).unwrap();
        let mut decoded = Vec::new();
        decode::<u64>(&encoded, &mut decoded).unwrap();
        assert_eq!(decoded, typed_slice_to_bytes(&original));
    }
}
