//! This module contains the pure, stateless, and performant kernels for performing
//! fixed-width bit-packing and unpacking.
//!
//! Values are packed LSB-first into a byte buffer with no padding between them.
//! A bit width of zero is legal and means every value is zero; the packed form
//! is then empty.

use bitvec::prelude::*;

use crate::error::ZstrongError;

//==================================================================================
// 1. Generic Core Logic (The "Engine")
//==================================================================================

fn encode_slice(data: &[u64], bit_width: u8) -> Result<BitVec<u8, Lsb0>, ZstrongError> {
    if bit_width > 64 {
        return Err(ZstrongError::BitpackEncodeError(0, bit_width));
    }

    let max_val = if bit_width >= 64 { u64::MAX } else { (1u64 << bit_width) - 1 };
    let mut bit_vec = BitVec::<u8, Lsb0>::with_capacity(data.len() * bit_width as usize);

    for &val in data {
        if val > max_val {
            return Err(ZstrongError::BitpackEncodeError(val, bit_width));
        }
        bit_vec.extend_from_bitslice(&val.view_bits::<Lsb0>()[..bit_width as usize]);
    }

    Ok(bit_vec)
}

fn decode_slice(bits: &BitSlice<u8, Lsb0>, bit_width: u8, num_values: usize) -> Result<Vec<u64>, ZstrongError> {
    if bit_width > 64 {
        return Err(ZstrongError::BitpackDecodeError);
    }
    if bit_width == 0 {
        return Ok(vec![0; num_values]);
    }
    let needed = num_values
        .checked_mul(bit_width as usize)
        .ok_or(ZstrongError::BitpackDecodeError)?;
    if bits.len() < needed {
        return Err(ZstrongError::BitpackDecodeError);
    }

    let mut decoded = Vec::with_capacity(num_values);
    for chunk in bits.chunks(bit_width as usize).take(num_values) {
        let mut container = 0u64;
        for (i, bit) in chunk.iter().by_vals().enumerate() {
            if bit {
                container |= 1 << i;
            }
        }
        decoded.push(container);
    }
    Ok(decoded)
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Number of bits needed to represent the largest value in `values`.
pub fn required_bit_width(values: &[u64]) -> u8 {
    let max = values.iter().copied().max().unwrap_or(0);
    (64 - max.leading_zeros()) as u8
}

pub fn encode(input_slice: &[u64], output_buf: &mut Vec<u8>, bit_width: u8) -> Result<(), ZstrongError> {
    output_buf.clear();
    let bit_vec = encode_slice(input_slice, bit_width)?;
    output_buf.extend_from_slice(bit_vec.as_raw_slice());
    Ok(())
}

pub fn decode(input_bytes: &[u8], bit_width: u8, num_values: usize) -> Result<Vec<u64>, ZstrongError> {
    let bits = BitSlice::<u8, Lsb0>::from_slice(input_bytes);
    decode_slice(bits, bit_width, num_values)
}
