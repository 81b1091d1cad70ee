//! Byte/typed-slice helpers shared by the kernels, the stream views and the codecs.

use std::borrow::Cow;

use crate::error::ZstrongError;

//==================================================================================
// 1. Byte <-> Typed Slice Conversion
//==================================================================================

/// Views a little-endian byte buffer as a slice of `T`.
///
/// Borrows when the buffer happens to be aligned for `T`, otherwise copies the
/// elements out with unaligned reads. Stream buffers are plain `Vec<u8>`, so
/// both cases occur in practice.
///
/// # Errors
/// Returns `ZstrongError::BufferMismatch` if the byte length is not a multiple
/// of the size of `T`.
pub fn safe_bytes_to_typed_slice<T>(bytes: &[u8]) -> Result<Cow<'_, [T]>, ZstrongError>
where
    T: bytemuck::Pod,
{
    let size = std::mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(ZstrongError::BufferMismatch(bytes.len(), size));
    }
    match bytemuck::try_cast_slice(bytes) {
        Ok(slice) => Ok(Cow::Borrowed(slice)),
        Err(_) => Ok(Cow::Owned(
            bytes
                .chunks_exact(size)
                .map(bytemuck::pod_read_unaligned::<T>)
                .collect(),
        )),
    }
}

/// Converts a slice of plain-old-data values into an owned little-endian byte vector.
pub fn typed_slice_to_bytes<T: bytemuck::Pod>(data: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}

/// Widens every element of a numeric byte buffer of the given width to `u64`.
pub fn widen_to_u64(bytes: &[u8], width: usize) -> Result<Vec<u64>, ZstrongError> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(ZstrongError::InvalidParameter(format!(
            "unsupported numeric width {}",
            width
        )));
    }
    if bytes.len() % width != 0 {
        return Err(ZstrongError::BufferMismatch(bytes.len(), width));
    }
    Ok(bytes
        .chunks_exact(width)
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw[..width].copy_from_slice(chunk);
            u64::from_le_bytes(raw)
        })
        .collect())
}

/// Narrows `u64` values to little-endian elements of `width` bytes.
pub fn narrow_from_u64(values: &[u64], width: usize) -> Result<Vec<u8>, ZstrongError> {
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(ZstrongError::InvalidParameter(format!(
            "unsupported numeric width {}",
            width
        )));
    }
    let limit = if width == 8 { u64::MAX } else { (1u64 << (width * 8)) - 1 };
    let mut out = Vec::with_capacity(values.len() * width);
    for &v in values {
        if v > limit {
            return Err(ZstrongError::InvalidParameter(format!(
                "value {} does not fit in {} bytes",
                v, width
            )));
        }
        out.extend_from_slice(&v.to_le_bytes()[..width]);
    }
    Ok(out)
}

/// Smallest numeric width (1, 2, 4 or 8 bytes) able to hold `max_value`.
pub fn min_width_for(max_value: u64) -> usize {
    if max_value <= u8::MAX as u64 {
        1
    } else if max_value <= u16::MAX as u64 {
        2
    } else if max_value <= u32::MAX as u64 {
        4
    } else {
        8
    }
}

//==================================================================================
// 2. Width Dispatch
//==================================================================================

/// Runs `$body` with `$T` bound to the unsigned integer type of the given byte width.
///
/// `$body` must evaluate to a `Result<_, ZstrongError>`.
macro_rules! dispatch_by_width {
    ($width:expr, $T:ident => $body:expr) => {
        match $width {
            1 => {
                type $T = u8;
                $body
            }
            2 => {
                type $T = u16;
                $body
            }
            4 => {
                type $T = u32;
                $body
            }
            8 => {
                type $T = u64;
                $body
            }
            w => Err($crate::error::ZstrongError::InvalidParameter(format!(
                "unsupported numeric width {}",
                w
            ))),
        }
    };
}
pub(crate) use dispatch_by_width;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unaligned_view_falls_back_to_copy() {
        let values: Vec<u32> = vec![1, 2, 0xDEADBEEF];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&typed_slice_to_bytes(&values));
        let view = safe_bytes_to_typed_slice::<u32>(&bytes[1..]).unwrap();
        assert_eq!(&*view, values.as_slice());
    }

    #[test]
    fn test_view_rejects_ragged_length() {
        let result = safe_bytes_to_typed_slice::<u16>(&[1, 2, 3]);
        assert!(matches!(result, Err(ZstrongError::BufferMismatch(3, 2))));
    }

    #[test]
    fn test_widen_and_narrow() {
        let bytes = typed_slice_to_bytes(&[1u16, 300, 65535]);
        let wide = widen_to_u64(&bytes, 2).unwrap();
        assert_eq!(wide, vec![1, 300, 65535]);
        assert_eq!(narrow_from_u64(&wide, 2).unwrap(), bytes);
        assert!(narrow_from_u64(&[256], 1).is_err());
    }

    #[test]
    fn test_min_width_for() {
        assert_eq!(min_width_for(0), 1);
        assert_eq!(min_width_for(255), 1);
        assert_eq!(min_width_for(256), 2);
        assert_eq!(min_width_for(u32::MAX as u64 + 1), 8);
    }
}
