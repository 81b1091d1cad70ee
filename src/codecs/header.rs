//! Small helpers for writing and reading codec headers.
//!
//! Headers are opaque to the engine; built-in codecs encode their few fields as
//! LEB128 varints and raw bytes through these helpers.

use std::io::Cursor;

use crate::error::ZstrongError;
use crate::kernels::leb128;
use crate::types::StreamKind;

#[derive(Debug, Default)]
pub struct HeaderWriter {
    buf: Vec<u8>,
}

impl HeaderWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn varint(mut self, value: u64) -> Result<Self, ZstrongError> {
        leb128::encode_one(value, &mut self.buf)?;
        Ok(self)
    }

    pub fn byte(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.buf.extend_from_slice(value);
        self
    }

    /// Writes a stream kind tag followed by its element width.
    pub fn kind(self, kind: StreamKind, width: usize) -> Result<Self, ZstrongError> {
        self.byte(kind.tag()).varint(width as u64)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub struct HeaderReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> HeaderReader<'a> {
    pub fn new(header: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(header),
        }
    }

    pub fn varint(&mut self) -> Result<u64, ZstrongError> {
        leb128::decode_one(&mut self.cursor)
    }

    pub fn usize(&mut self) -> Result<usize, ZstrongError> {
        let v = self.varint()?;
        usize::try_from(v).map_err(|_| ZstrongError::InvalidParameter(format!("header value {} overflows usize", v)))
    }

    pub fn byte(&mut self) -> Result<u8, ZstrongError> {
        let pos = self.cursor.position() as usize;
        let b = *self
            .cursor
            .get_ref()
            .get(pos)
            .ok_or_else(|| ZstrongError::InvalidParameter("truncated codec header".to_string()))?;
        self.cursor.set_position(pos as u64 + 1);
        Ok(b)
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ZstrongError> {
        let pos = self.cursor.position() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        let slice = pos
            .checked_add(len)
            .and_then(|end| data.get(pos..end))
            .ok_or_else(|| ZstrongError::InvalidParameter("truncated codec header".to_string()))?;
        self.cursor.set_position((pos + len) as u64);
        Ok(slice)
    }

    pub fn kind(&mut self) -> Result<(StreamKind, usize), ZstrongError> {
        let kind = StreamKind::from_tag(self.byte()?)?;
        let width = self.usize()?;
        kind.validate_width(width)?;
        Ok((kind, width))
    }

    /// Fails if any header bytes remain unread.
    pub fn finish(self) -> Result<(), ZstrongError> {
        if (self.cursor.position() as usize) != self.cursor.get_ref().len() {
            return Err(ZstrongError::InvalidParameter(
                "trailing bytes in codec header".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = HeaderWriter::new()
            .kind(StreamKind::Numeric, 4)
            .unwrap()
            .varint(300)
            .unwrap()
            .bytes(b"xy")
            .finish();
        let mut reader = HeaderReader::new(&header);
        assert_eq!(reader.kind().unwrap(), (StreamKind::Numeric, 4));
        assert_eq!(reader.varint().unwrap(), 300);
        assert_eq!(reader.bytes(2).unwrap(), b"xy");
        reader.finish().unwrap();
    }

    #[test]
    fn test_truncated_and_trailing() {
        let mut reader = HeaderReader::new(&[1]);
        assert!(reader.bytes(2).is_err());
        let mut reader = HeaderReader::new(&[5, 6]);
        reader.byte().unwrap();
        assert!(reader.finish().is_err());
    }
}
