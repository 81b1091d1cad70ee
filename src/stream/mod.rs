//! Typed, immutable streams and the writer used to produce them.
//!
//! A `Stream` is the unit of data flowing along graph edges. Once sealed, its
//! content never changes; ownership moves from producer to consumer.

mod writer;

pub use writer::StreamWriter;

use std::borrow::Cow;

use crate::error::ZstrongError;
use crate::types::StreamKind;
use crate::utils::{safe_bytes_to_typed_slice, typed_slice_to_bytes, widen_to_u64};

/// Unsigned little-endian integer types a numeric stream may hold.
pub trait NumericElement: bytemuck::Pod + num_traits::PrimInt + num_traits::Unsigned {}

impl NumericElement for u8 {}
impl NumericElement for u16 {}
impl NumericElement for u32 {}
impl NumericElement for u64 {}

//==================================================================================
// 1. Stream
//==================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    kind: StreamKind,
    element_width: usize,
    num_elements: usize,
    data: Vec<u8>,
    field_lengths: Option<Vec<u32>>,
}

impl Stream {
    //----------------------------------------------------------------------
    // Constructors. Each one enforces the invariants of its kind.
    //----------------------------------------------------------------------

    pub fn serial(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            kind: StreamKind::Serial,
            element_width: 1,
            num_elements: data.len(),
            data,
            field_lengths: None,
        }
    }

    pub fn numeric<T: NumericElement>(values: &[T]) -> Self {
        Self {
            kind: StreamKind::Numeric,
            element_width: std::mem::size_of::<T>(),
            num_elements: values.len(),
            data: typed_slice_to_bytes(values),
            field_lengths: None,
        }
    }

    /// Builds a numeric stream from raw little-endian bytes.
    pub fn numeric_from_bytes(data: Vec<u8>, width: usize) -> Result<Self, ZstrongError> {
        Self::fixed_width(StreamKind::Numeric, data, width)
    }

    pub fn fixed_field(data: Vec<u8>, width: usize) -> Result<Self, ZstrongError> {
        Self::fixed_width(StreamKind::FixedField, data, width)
    }

    /// Builds a stream of any fixed-width kind (everything except `VariableField`).
    pub fn fixed_width(kind: StreamKind, data: Vec<u8>, width: usize) -> Result<Self, ZstrongError> {
        if kind == StreamKind::VariableField {
            return Err(ZstrongError::type_mismatch(
                "fixed-width stream constructor",
                "serial|fixed_field|numeric",
                kind,
            ));
        }
        kind.validate_width(width)?;
        if data.len() % width != 0 {
            return Err(ZstrongError::BufferMismatch(data.len(), width));
        }
        Ok(Self {
            kind,
            element_width: width,
            num_elements: data.len() / width,
            data,
            field_lengths: None,
        })
    }

    /// Builds a variable-field stream. The lengths must sum to the content size.
    pub fn variable_field(data: Vec<u8>, field_lengths: Vec<u32>) -> Result<Self, ZstrongError> {
        let total: u64 = field_lengths.iter().map(|&l| l as u64).sum();
        if total != data.len() as u64 {
            return Err(ZstrongError::InvalidParameter(format!(
                "field lengths sum to {} but content holds {} bytes",
                total,
                data.len()
            )));
        }
        Ok(Self {
            kind: StreamKind::VariableField,
            element_width: 0,
            num_elements: field_lengths.len(),
            data,
            field_lengths: Some(field_lengths),
        })
    }

    /// Builds a variable-field stream from individual records.
    pub fn from_fields<I, F>(fields: I) -> Result<Self, ZstrongError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        let mut data = Vec::new();
        let mut lengths = Vec::new();
        for field in fields {
            let field = field.as_ref();
            let len = u32::try_from(field.len()).map_err(|_| {
                ZstrongError::InvalidParameter("field longer than u32::MAX bytes".to_string())
            })?;
            lengths.push(len);
            data.extend_from_slice(field);
        }
        Self::variable_field(data, lengths)
    }

    /// An empty stream of the given kind and width.
    pub fn empty(kind: StreamKind, width: usize) -> Result<Self, ZstrongError> {
        match kind {
            StreamKind::VariableField => Self::variable_field(Vec::new(), Vec::new()),
            _ => Self::fixed_width(kind, Vec::new(), width),
        }
    }

    //----------------------------------------------------------------------
    // Accessors
    //----------------------------------------------------------------------

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn element_width(&self) -> usize {
        self.element_width
    }

    /// Number of elements (bytes, records, integers or fields depending on kind).
    pub fn len(&self) -> usize {
        self.num_elements
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    /// Size of the content buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// The raw content buffer regardless of kind.
    pub fn content(&self) -> &[u8] {
        &self.data
    }

    pub fn into_parts(self) -> (Vec<u8>, Option<Vec<u32>>) {
        (self.data, self.field_lengths)
    }

    fn expect_kind(&self, kind: StreamKind, view: &str) -> Result<(), ZstrongError> {
        if self.kind != kind {
            return Err(ZstrongError::type_mismatch(view, kind, self.kind));
        }
        Ok(())
    }

    /// Fails with `TypeMismatch` unless the stream is of `kind`.
    pub fn require_kind(&self, kind: StreamKind) -> Result<(), ZstrongError> {
        self.expect_kind(kind, "stream kind check")
    }

    //----------------------------------------------------------------------
    // Typed views
    //----------------------------------------------------------------------

    pub fn as_serial(&self) -> Result<&[u8], ZstrongError> {
        self.expect_kind(StreamKind::Serial, "serial view")?;
        Ok(&self.data)
    }

    /// Numeric view as `T`. The requested type must match the stream's width.
    pub fn as_numeric<T: NumericElement>(&self) -> Result<Cow<'_, [T]>, ZstrongError> {
        self.expect_kind(StreamKind::Numeric, "numeric view")?;
        if std::mem::size_of::<T>() != self.element_width {
            return Err(ZstrongError::type_mismatch(
                "numeric view",
                format!("width {}", self.element_width),
                format!("width {}", std::mem::size_of::<T>()),
            ));
        }
        safe_bytes_to_typed_slice::<T>(&self.data)
    }

    /// Numeric view widened to `u64`, whatever the stored width.
    pub fn numeric_values(&self) -> Result<Vec<u64>, ZstrongError> {
        self.expect_kind(StreamKind::Numeric, "numeric view")?;
        widen_to_u64(&self.data, self.element_width)
    }

    /// Fixed-field records in order.
    pub fn fixed_fields(&self) -> Result<std::slice::ChunksExact<'_, u8>, ZstrongError> {
        self.expect_kind(StreamKind::FixedField, "fixed-field view")?;
        Ok(self.data.chunks_exact(self.element_width))
    }

    pub fn field_lengths(&self) -> Result<&[u32], ZstrongError> {
        self.expect_kind(StreamKind::VariableField, "variable-field view")?;
        Ok(self.field_lengths.as_deref().unwrap_or(&[]))
    }

    /// Variable-field records in order.
    pub fn variable_fields(&self) -> Result<Vec<&[u8]>, ZstrongError> {
        let lengths = self.field_lengths()?;
        let mut fields = Vec::with_capacity(lengths.len());
        let mut offset = 0usize;
        for &len in lengths {
            let end = offset + len as usize;
            fields.push(&self.data[offset..end]);
            offset = end;
        }
        Ok(fields)
    }

    /// Returns the single repeated element if every element is identical.
    ///
    /// Empty streams and variable-field streams are never constant.
    pub fn constant_element(&self) -> Option<&[u8]> {
        if self.kind == StreamKind::VariableField || self.is_empty() {
            return None;
        }
        crate::kernels::constant::detect(&self.data, self.element_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_view_round_trip() {
        let stream = Stream::numeric(&[5u32, 6, 7]);
        assert_eq!(stream.kind(), StreamKind::Numeric);
        assert_eq!(stream.element_width(), 4);
        assert_eq!(stream.len(), 3);
        assert_eq!(&*stream.as_numeric::<u32>().unwrap(), &[5, 6, 7]);
        assert_eq!(stream.numeric_values().unwrap(), vec![5, 6, 7]);
    }

    #[test]
    fn test_wrong_view_is_type_mismatch() {
        let stream = Stream::serial(b"abc".to_vec());
        assert!(matches!(
            stream.as_numeric::<u8>(),
            Err(ZstrongError::TypeMismatch { .. })
        ));
        let numeric = Stream::numeric(&[1u16]);
        assert!(matches!(
            numeric.as_numeric::<u32>(),
            Err(ZstrongError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_variable_field_lengths_must_cover_content() {
        assert!(Stream::variable_field(b"abcd".to_vec(), vec![1, 2]).is_err());
        let stream = Stream::from_fields(["ab", "", "cde"]).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.byte_len(), 5);
        let fields = stream.variable_fields().unwrap();
        assert_eq!(fields, vec![&b"ab"[..], &b""[..], &b"cde"[..]]);
    }

    #[test]
    fn test_fixed_field_rejects_ragged_content() {
        assert!(matches!(
            Stream::fixed_field(vec![0; 7], 3),
            Err(ZstrongError::BufferMismatch(7, 3))
        ));
        let stream = Stream::fixed_field(vec![1, 2, 3, 4, 5, 6], 3).unwrap();
        assert_eq!(stream.len(), 2);
        assert_eq!(stream.fixed_fields().unwrap().next().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_constant_element_detection() {
        let constant = Stream::numeric(&[9u16; 10]);
        assert_eq!(constant.constant_element(), Some(&9u16.to_le_bytes()[..]));
        let varied = Stream::numeric(&[9u16, 10]);
        assert_eq!(varied.constant_element(), None);
        assert_eq!(Stream::serial(Vec::new()).constant_element(), None);
    }
}
