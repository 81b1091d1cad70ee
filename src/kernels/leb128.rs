//! This module contains the pure, stateless, and performant kernels for performing
//! LEB128 (Little-Endian Base 128) variable-length integer encoding and decoding.
//!
//! Besides backing the container's varint fields and codec headers, the slice
//! API is used to store variable-field lengths compactly. It is fully panic-free.

use num_traits::{PrimInt, Unsigned};
use std::io::Cursor;

use crate::error::ZstrongError;

//==================================================================================
// 1. Public API for Single-Value Operations
//==================================================================================

/// Encodes a single unsigned integer into a LEB128 byte sequence, writing to a buffer.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>) -> Result<(), ZstrongError>
where
    T: PrimInt + Unsigned,
{
    let zero = T::zero();
    let seven_bit_mask = T::from(0x7F).ok_or_else(|| {
        ZstrongError::Leb128DecodeError("Failed to create 7-bit mask for type".to_string())
    })?;

    let mut current_value = value;
    loop {
        let low = (current_value & seven_bit_mask).to_u8().ok_or_else(|| {
            ZstrongError::Leb128DecodeError("Failed to convert generic integer to u8".to_string())
        })?;
        current_value = current_value >> 7;
        if current_value != zero {
            buffer.push(low | 0x80);
        } else {
            buffer.push(low);
            break;
        }
    }
    Ok(())
}

/// Decodes a single unsigned integer from a LEB128 byte stream cursor.
pub fn decode_one<T>(cursor: &mut Cursor<&[u8]>) -> Result<T, ZstrongError>
where
    T: PrimInt + Unsigned,
{
    let mut result = T::zero();
    let mut shift = 0;
    let total_bits = std::mem::size_of::<T>() * 8;

    loop {
        let pos = cursor.position() as usize;
        let byte = *cursor.get_ref().get(pos).ok_or_else(|| {
            ZstrongError::Leb128DecodeError("Unexpected end of buffer".to_string())
        })?;
        cursor.set_position((pos + 1) as u64);

        if shift >= total_bits {
            return Err(ZstrongError::Leb128DecodeError(
                "Integer overflow during decoding".to_string(),
            ));
        }

        let payload = T::from(byte & 0x7F).ok_or_else(|| {
            ZstrongError::Leb128DecodeError("Failed to create 7-bit payload from byte".to_string())
        })?;

        // Bits of the final group that do not fit the type are an overflow.
        if shift + 7 > total_bits && ((byte & 0x7F) >> (total_bits - shift)) > 0 {
            return Err(ZstrongError::Leb128DecodeError(
                "Integer overflow during decoding".to_string(),
            ));
        }

        result = result | (payload << shift);

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
    }
}

/// Encodes a signed value with zigzag mapping followed by LEB128.
pub fn encode_signed(value: i64, buffer: &mut Vec<u8>) -> Result<(), ZstrongError> {
    let mapped = ((value << 1) ^ (value >> 63)) as u64;
    encode_one(mapped, buffer)
}

pub fn decode_signed(cursor: &mut Cursor<&[u8]>) -> Result<i64, ZstrongError> {
    let raw: u64 = decode_one(cursor)?;
    Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
}

//==================================================================================
// 2. Public API for Slice Operations
//==================================================================================

/// Encodes an entire slice, appending to `output_buf`.
pub fn encode<T>(input_slice: &[T], output_buf: &mut Vec<u8>) -> Result<(), ZstrongError>
where
    T: PrimInt + Unsigned,
{
    for &val in input_slice {
        encode_one(val, output_buf)?;
    }
    Ok(())
}

/// Decodes exactly `num_values` integers; the input must be fully consumed.
pub fn decode<T>(input_bytes: &[u8], num_values: usize) -> Result<Vec<T>, ZstrongError>
where
    T: PrimInt + Unsigned,
{
    // Every value takes at least one byte, so this bounds the allocation.
    if num_values > input_bytes.len() {
        return Err(ZstrongError::Leb128DecodeError(format!(
            "{} values cannot fit in {} bytes",
            num_values,
            input_bytes.len()
        )));
    }
    let mut values = Vec::with_capacity(num_values);
    let mut cursor = Cursor::new(input_bytes);

    for _ in 0..num_values {
        values.push(decode_one::<T>(&mut cursor)?);
    }

    if (cursor.position() as usize) != input_bytes.len() {
        return Err(ZstrongError::Leb128DecodeError(
            "Did not consume entire input buffer. Trailing bytes detected.".to_string(),
        ));
    }

    Ok(values)
}
