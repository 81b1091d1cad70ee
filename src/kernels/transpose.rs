//! This module contains the pure, stateless kernel for transposing fixed-width
//! records into byte planes.
//!
//! Byte `i` of every record is gathered into plane `i`, so slowly varying high
//! bytes end up adjacent to each other where a backend compressor can exploit
//! them. The width is a runtime value, which lets the same kernel serve numeric
//! and fixed-field streams of any record size.

use crate::error::ZstrongError;

//==================================================================================
// 1. Core Logic
//==================================================================================

/// Rewrites `width`-byte records into `width` planes of `len / width` bytes each.
pub fn encode(input_bytes: &[u8], width: usize, output_buf: &mut Vec<u8>) -> Result<(), ZstrongError> {
    if width == 0 {
        return Err(ZstrongError::InvalidParameter("transpose width must be positive".to_string()));
    }
    if input_bytes.len() % width != 0 {
        return Err(ZstrongError::BufferMismatch(input_bytes.len(), width));
    }
    output_buf.clear();
    if width == 1 {
        output_buf.extend_from_slice(input_bytes);
        return Ok(());
    }

    let num_elements = input_bytes.len() / width;
    output_buf.resize(input_bytes.len(), 0);
    for (j, record) in input_bytes.chunks_exact(width).enumerate() {
        for (i, &byte) in record.iter().enumerate() {
            output_buf[i * num_elements + j] = byte;
        }
    }
    Ok(())
}

/// Reverses [`encode`].
pub fn decode(input_bytes: &[u8], width: usize, output_buf: &mut Vec<u8>) -> Result<(), ZstrongError> {
    if width == 0 {
        return Err(ZstrongError::InvalidParameter("transpose width must be positive".to_string()));
    }
    if input_bytes.len() % width != 0 {
        return Err(ZstrongError::BufferMismatch(input_bytes.len(), width));
    }
    output_buf.clear();
    if width == 1 {
        output_buf.extend_from_slice(input_bytes);
        return Ok(());
    }

    let num_elements = input_bytes.len() / width;
    output_buf.resize(input_bytes.len(), 0);
    for (i, plane) in input_bytes.chunks_exact(num_elements.max(1)).enumerate().take(width) {
        for (j, &byte) in plane.iter().enumerate() {
            output_buf[j * width + i] = byte;
        }
    }
    Ok(())
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planes_layout() {
        let records = vec![0x01, 0xA1, 0x02, 0xA2, 0x03, 0xA3];
        let mut planes = Vec::new();
        encode(&records, 2, &mut planes).unwrap();
        assert_eq!(planes, vec![0x01, 0x02, 0x03, 0xA1, 0xA2, 0xA3]);

        let mut restored = Vec::new();
        decode(&planes, 2, &mut restored).unwrap();
        assert_eq!(restored, records);
    }

    #[test]
    fn test_odd_width_and_empty() {
        let records: Vec<u8> = (0..15).collect();
        let mut planes = Vec::new();
        encode(&records, 3, &mut planes).unwrap();
        let mut restored = Vec::new();
        decode(&planes, 3, &mut restored).unwrap();
        assert_eq!(restored, records);

        encode(&[], 4, &mut planes).unwrap();
        assert!(planes.is_empty());
        decode(&[], 4, &mut restored).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_ragged_input_rejected() {
        let mut out = Vec::new();
        assert!(matches!(
            encode(&[1, 2, 3], 2, &mut out),
            Err(ZstrongError::BufferMismatch(3, 2))
        ));
    }
}
