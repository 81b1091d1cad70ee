//! This module contains the pure, stateless, and performant kernels for performing
//! Zstandard compression and decompression.
//!
//! It backs the `zstd` backend codec, the usual terminal step of a graph. This
//! module is a safe, panic-free wrapper around the `zstd` crate.

use std::io::Write;
use zstd::stream::{Decoder, Encoder};

use crate::error::ZstrongError;

//==================================================================================
// 1. Core Logic (The "Engine")
//==================================================================================

/// Compresses a byte slice using the Zstandard algorithm, writing to an output buffer.
fn compress_slice(
    input_bytes: &[u8],
    output_buf: &mut Vec<u8>,
    level: i32,
) -> Result<(), ZstrongError> {
    let mut encoder =
        Encoder::new(output_buf, level).map_err(|e| ZstrongError::ZstdError(e.to_string()))?;
    encoder
        .write_all(input_bytes)
        .map_err(|e| ZstrongError::ZstdError(e.to_string()))?;

    // `finish` is essential to finalize the Zstd frame.
    encoder
        .finish()
        .map_err(|e| ZstrongError::ZstdError(e.to_string()))?;
    Ok(())
}

/// Decompresses a Zstandard-compressed byte slice, writing to an output buffer.
fn decompress_slice(input_bytes: &[u8], output_buf: &mut Vec<u8>) -> Result<(), ZstrongError> {
    let mut decoder =
        Decoder::new(input_bytes).map_err(|e| ZstrongError::ZstdError(e.to_string()))?;
    std::io::copy(&mut decoder, output_buf).map_err(|e| ZstrongError::ZstdError(e.to_string()))?;
    Ok(())
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Compresses `input_bytes` into a fresh buffer. Empty input yields empty output.
pub fn encode(input_bytes: &[u8], level: i32) -> Result<Vec<u8>, ZstrongError> {
    let mut output_buf = Vec::new();
    if input_bytes.is_empty() {
        return Ok(output_buf);
    }
    compress_slice(input_bytes, &mut output_buf, level)?;
    Ok(output_buf)
}

pub fn decode(input_bytes: &[u8]) -> Result<Vec<u8>, ZstrongError> {
    let mut output_buf = Vec::new();
    if input_bytes.is_empty() {
        return Ok(output_buf);
    }
    decompress_slice(input_bytes, &mut output_buf)?;
    Ok(output_buf)
}
