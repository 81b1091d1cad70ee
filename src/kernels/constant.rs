//! Detection and expansion of constant streams.

use crate::error::ZstrongError;

/// Returns the repeated element if `bytes` is a non-empty run of one `width`-byte element.
pub fn detect(bytes: &[u8], width: usize) -> Option<&[u8]> {
    if width == 0 || bytes.is_empty() || bytes.len() % width != 0 {
        return None;
    }
    let first = &bytes[..width];
    if bytes.chunks_exact(width).all(|chunk| chunk == first) {
        Some(first)
    } else {
        None
    }
}

/// Repeats `element` `count` times.
pub fn expand(element: &[u8], count: usize) -> Result<Vec<u8>, ZstrongError> {
    let total = element.len().checked_mul(count).ok_or_else(|| {
        ZstrongError::InvalidParameter(format!(
            "constant expansion of {} x {} bytes overflows",
            count,
            element.len()
        ))
    })?;
    let mut out = Vec::with_capacity(total);
    for _ in 0..count {
        out.extend_from_slice(element);
    }
    Ok(out)
}
