//! This module contains the pure, stateless, and performant kernels for performing
//! delta encoding and decoding on unsigned integer streams.
//!
//! The core algorithms are implemented **in-place** with wrapping arithmetic, so
//! any input round-trips, including decreasing sequences.

use num_traits::{PrimInt, WrappingAdd, WrappingSub};

use crate::error::ZstrongError;
use crate::utils::{safe_bytes_to_typed_slice, typed_slice_to_bytes};

//==================================================================================
// 1. Generic Core Logic (The "Engine" - In-Place & Performant)
//==================================================================================

/// Computes `data[i] = data[i] - data[i - order]` in place.
fn encode_slice_inplace<T>(data: &mut [T], order: usize)
where
    T: PrimInt + WrappingSub,
{
    if data.len() <= order {
        return;
    }
    // Iterate backwards to use original values for calculation
    for i in (order..data.len()).rev() {
        data[i] = data[i].wrapping_sub(&data[i - order]);
    }
}

/// Reconstructs `data[i] = data[i] + data[i - order]` in place.
fn decode_slice_inplace<T>(data: &mut [T], order: usize)
where
    T: PrimInt + WrappingAdd,
{
    if data.len() <= order {
        return;
    }
    for i in order..data.len() {
        data[i] = data[i].wrapping_add(&data[i - order]);
    }
}

fn check_order(order: usize) -> Result<(), ZstrongError> {
    if order == 0 {
        return Err(ZstrongError::InvalidParameter(
            "delta order must be at least 1".to_string(),
        ));
    }
    Ok(())
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Delta-encodes `input_slice`, writing little-endian bytes to `output_buf`.
pub fn encode<T>(input_slice: &[T], output_buf: &mut Vec<u8>, order: usize) -> Result<(), ZstrongError>
where
    T: PrimInt + WrappingSub + bytemuck::Pod,
{
    check_order(order)?;
    let mut data_vec = input_slice.to_vec();
    encode_slice_inplace(&mut data_vec, order);
    output_buf.clear();
    output_buf.extend_from_slice(&typed_slice_to_bytes(&data_vec));
    Ok(())
}

/// Reverses [`encode`] on a little-endian byte buffer of `T` elements.
pub fn decode<T>(input_bytes: &[u8], output_buf: &mut Vec<u8>, order: usize) -> Result<(), ZstrongError>
where
    T: PrimInt + WrappingAdd + bytemuck::Pod,
{
    check_order(order)?;
    let mut data_vec = safe_bytes_to_typed_slice::<T>(input_bytes)?.into_owned();
    decode_slice_inplace(&mut data_vec, order);
    output_buf.clear();
    output_buf.extend_from_slice(&typed_slice_to_bytes(&data_vec));
    Ok(())
}
