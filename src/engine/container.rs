//! Defines the self-describing wire format of a compressed container.
//! This module is the single source of truth for serialization, deserialization,
//! and metadata peeking of a container.
//!
//! Layout (integers little-endian, `varint` = LEB128):
//!
//! ```text
//! u32      magic = 0xD7B1A5C0 + format_version
//! varint   nb_global_params, then (u8 key, zigzag varint value) pairs
//! varint   nb_inputs, then per input: u8 kind tag, varint element width
//! varint   nb_transforms, then per transform record:
//!            varint codec id, varint nb_inputs, varint stream index * nb_inputs,
//!            varint nb_fixed_outputs, varint nb_variable_outputs,
//!            varint header_len, header bytes
//! varint   nb_stored, then per stored stream:
//!            varint stream index, u8 kind tag, varint element width,
//!            varint nb_elements, varint lengths_len, varint data_len
//! payload  for each stored stream: LEB128 field lengths (variable-field only), then data
//! ```
//!
//! Top-level inputs are streams `0..nb_inputs`; every transform record
//! allocates its outputs consecutively, in record order.

use std::io::{Cursor, Read};

use crate::config::{MAX_FORMAT_VERSION, MIN_FORMAT_VERSION};
use crate::error::ZstrongError;
use crate::kernels::leb128;
use crate::stream::{Stream, StreamWriter};
use crate::types::{CodecId, StreamKind};

//==================================================================================
// Format Constants
//==================================================================================

/// Magic number of format version 0; the stored magic adds the version.
pub const MAGIC_BASE: u32 = 0xD7B1_A5C0;
/// Global param key carrying the explicit compression level, when one was set.
pub const GLOBAL_PARAM_COMPRESSION_LEVEL: u8 = 1;
/// The smallest container: magic plus four empty counts.
const MIN_CONTAINER_SIZE: usize = 8;

//==================================================================================
// Public Structs
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub kind: StreamKind,
    pub element_width: usize,
}

impl StreamInfo {
    pub fn of(stream: &Stream) -> Self {
        Self {
            kind: stream.kind(),
            element_width: stream.element_width(),
        }
    }
}

/// One codec invocation of the encode trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRecord {
    pub codec: CodecId,
    /// Stream indices consumed, in codec input order.
    pub inputs: Vec<usize>,
    pub nb_fixed_outputs: usize,
    pub nb_variable_outputs: usize,
    pub header: Vec<u8>,
}

impl TransformRecord {
    pub fn nb_outputs(&self) -> usize {
        self.nb_fixed_outputs + self.nb_variable_outputs
    }
}

/// A stream that reached a store node, with its index in the trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredStream {
    pub index: usize,
    pub stream: Stream,
}

/// A fully parsed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedContainer {
    pub format_version: u32,
    pub global_params: Vec<(u8, i64)>,
    pub inputs: Vec<StreamInfo>,
    pub transforms: Vec<TransformRecord>,
    pub stored: Vec<StoredStream>,
}

/// Metadata returned by [`peek_info`] without materializing any stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerInfo {
    pub format_version: u32,
    pub nb_inputs: usize,
    pub nb_transforms: usize,
    pub nb_stored: usize,
    /// Bytes before the payload section.
    pub header_size: usize,
    pub payload_size: usize,
}

/// Layout of a stored stream as described in the header.
struct StoredEntry {
    index: usize,
    kind: StreamKind,
    element_width: usize,
    nb_elements: usize,
    lengths_len: usize,
    data_len: usize,
}

struct ParsedHeader {
    format_version: u32,
    global_params: Vec<(u8, i64)>,
    inputs: Vec<StreamInfo>,
    transforms: Vec<TransformRecord>,
    stored: Vec<StoredEntry>,
    header_size: usize,
}

//==================================================================================
// Core Implementation
//==================================================================================

impl CompressedContainer {
    /// Total number of streams in the trace: inputs plus every transform output.
    pub fn num_streams(&self) -> usize {
        self.inputs.len() + self.transforms.iter().map(TransformRecord::nb_outputs).sum::<usize>()
    }

    /// Serializes the container into its canonical byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ZstrongError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC_BASE.wrapping_add(self.format_version).to_le_bytes());

        write_varint(&mut buf, self.global_params.len())?;
        for &(key, value) in &self.global_params {
            buf.push(key);
            leb128::encode_signed(value, &mut buf)?;
        }

        write_varint(&mut buf, self.inputs.len())?;
        for info in &self.inputs {
            buf.push(info.kind.tag());
            write_varint(&mut buf, info.element_width)?;
        }

        write_varint(&mut buf, self.transforms.len())?;
        for record in &self.transforms {
            leb128::encode_one(record.codec.0 as u64, &mut buf)?;
            write_varint(&mut buf, record.inputs.len())?;
            for &index in &record.inputs {
                write_varint(&mut buf, index)?;
            }
            write_varint(&mut buf, record.nb_fixed_outputs)?;
            write_varint(&mut buf, record.nb_variable_outputs)?;
            write_varint(&mut buf, record.header.len())?;
            buf.extend_from_slice(&record.header);
        }

        // Field lengths are LEB128-coded once here and reused for the payload.
        let mut encoded_lengths = Vec::with_capacity(self.stored.len());
        write_varint(&mut buf, self.stored.len())?;
        for stored in &self.stored {
            let stream = &stored.stream;
            let mut lengths = Vec::new();
            if stream.kind() == StreamKind::VariableField {
                leb128::encode(stream.field_lengths()?, &mut lengths)?;
            }
            write_varint(&mut buf, stored.index)?;
            buf.push(stream.kind().tag());
            write_varint(&mut buf, stream.element_width())?;
            write_varint(&mut buf, stream.len())?;
            write_varint(&mut buf, lengths.len())?;
            write_varint(&mut buf, stream.byte_len())?;
            encoded_lengths.push(lengths);
        }

        for (stored, lengths) in self.stored.iter().zip(&encoded_lengths) {
            buf.extend_from_slice(lengths);
            buf.extend_from_slice(stored.stream.content());
        }
        Ok(buf)
    }

    /// Parses a full container, payload included.
    ///
    /// # Errors
    /// `UnsupportedVersion` if the version is outside `MIN_FORMAT_VERSION..=max_version`,
    /// `FrameFormatError` for anything malformed.
    pub fn from_bytes(bytes: &[u8], max_version: u32) -> Result<Self, ZstrongError> {
        let header = parse_header(bytes, max_version)?;
        let mut cursor = Cursor::new(bytes);
        cursor.set_position(header.header_size as u64);

        let mut stored = Vec::with_capacity(header.stored.len());
        for entry in &header.stored {
            let lengths_bytes = read_exact(&mut cursor, entry.lengths_len)?;
            let data = read_exact(&mut cursor, entry.data_len)?.to_vec();
            let stream = materialize(entry, lengths_bytes, data)?;
            stored.push(StoredStream {
                index: entry.index,
                stream,
            });
        }

        if (cursor.position() as usize) != bytes.len() {
            return Err(ZstrongError::FrameFormatError(format!(
                "{} trailing bytes after the payload",
                bytes.len() - cursor.position() as usize
            )));
        }

        Ok(Self {
            format_version: header.format_version,
            global_params: header.global_params,
            inputs: header.inputs,
            transforms: header.transforms,
            stored,
        })
    }
}

/// Reads the format version without parsing anything else.
pub fn read_version(bytes: &[u8]) -> Result<u32, ZstrongError> {
    let magic_bytes: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ZstrongError::FrameFormatError("container shorter than its magic number".to_string()))?;
    let version = u32::from_le_bytes(magic_bytes).wrapping_sub(MAGIC_BASE);
    if version > 0xFF {
        return Err(ZstrongError::FrameFormatError("invalid container magic number".to_string()));
    }
    Ok(version)
}

/// Parses the header to report sizes and counts, accepting every supported version.
pub fn peek_info(bytes: &[u8]) -> Result<ContainerInfo, ZstrongError> {
    let header = parse_header(bytes, MAX_FORMAT_VERSION)?;
    let payload_size = bytes.len() - header.header_size;
    let declared: usize = header.stored.iter().map(|e| e.lengths_len + e.data_len).sum();
    if declared != payload_size {
        return Err(ZstrongError::FrameFormatError(format!(
            "header declares {} payload bytes but {} are present",
            declared, payload_size
        )));
    }
    Ok(ContainerInfo {
        format_version: header.format_version,
        nb_inputs: header.inputs.len(),
        nb_transforms: header.transforms.len(),
        nb_stored: header.stored.len(),
        header_size: header.header_size,
        payload_size,
    })
}

//==================================================================================
// Private Helpers
//==================================================================================

fn parse_header(bytes: &[u8], max_version: u32) -> Result<ParsedHeader, ZstrongError> {
    if bytes.len() < MIN_CONTAINER_SIZE {
        return Err(ZstrongError::FrameFormatError(format!(
            "Container is too small to be valid. Minimum size: {}, got: {}",
            MIN_CONTAINER_SIZE,
            bytes.len()
        )));
    }
    let format_version = read_version(bytes)?;
    if format_version < MIN_FORMAT_VERSION || format_version > max_version {
        return Err(ZstrongError::UnsupportedVersion {
            version: format_version,
            min: MIN_FORMAT_VERSION,
            max: max_version,
        });
    }

    let mut cursor = Cursor::new(bytes);
    cursor.set_position(4);

    let nb_params = read_count(&mut cursor)?;
    let mut global_params = Vec::with_capacity(nb_params);
    for _ in 0..nb_params {
        let key = read_byte(&mut cursor)?;
        let value = leb128::decode_signed(&mut cursor).map_err(frame_err)?;
        global_params.push((key, value));
    }

    let nb_inputs = read_count(&mut cursor)?;
    let mut inputs = Vec::with_capacity(nb_inputs);
    for _ in 0..nb_inputs {
        let (kind, element_width) = read_kind(&mut cursor)?;
        inputs.push(StreamInfo { kind, element_width });
    }

    let nb_transforms = read_count(&mut cursor)?;
    let mut transforms = Vec::with_capacity(nb_transforms);
    for _ in 0..nb_transforms {
        let codec = read_varint(&mut cursor)?;
        let codec = u32::try_from(codec)
            .map_err(|_| ZstrongError::FrameFormatError(format!("codec id {} out of range", codec)))?;
        let nb_record_inputs = read_count(&mut cursor)?;
        let mut record_inputs = Vec::with_capacity(nb_record_inputs);
        for _ in 0..nb_record_inputs {
            record_inputs.push(read_usize(&mut cursor)?);
        }
        let nb_fixed_outputs = read_usize(&mut cursor)?;
        let nb_variable_outputs = read_usize(&mut cursor)?;
        let header_len = read_usize(&mut cursor)?;
        let header = read_exact(&mut cursor, header_len)?.to_vec();
        transforms.push(TransformRecord {
            codec: CodecId(codec),
            inputs: record_inputs,
            nb_fixed_outputs,
            nb_variable_outputs,
            header,
        });
    }

    let nb_stored = read_count(&mut cursor)?;
    let mut stored = Vec::with_capacity(nb_stored);
    for _ in 0..nb_stored {
        let index = read_usize(&mut cursor)?;
        let (kind, element_width) = read_kind(&mut cursor)?;
        stored.push(StoredEntry {
            index,
            kind,
            element_width,
            nb_elements: read_usize(&mut cursor)?,
            lengths_len: read_usize(&mut cursor)?,
            data_len: read_usize(&mut cursor)?,
        });
    }

    Ok(ParsedHeader {
        format_version,
        global_params,
        inputs,
        transforms,
        stored,
        header_size: cursor.position() as usize,
    })
}

/// Rebuilds a stored stream through a [`StreamWriter`], so a payload that does
/// not hold the declared element count is rejected with `IncompleteOutput`.
fn materialize(entry: &StoredEntry, lengths_bytes: &[u8], data: Vec<u8>) -> Result<Stream, ZstrongError> {
    let mut writer = StreamWriter::new(entry.kind, entry.element_width).map_err(frame_err)?;
    if entry.kind == StreamKind::VariableField {
        let lengths = leb128::decode::<u32>(lengths_bytes, entry.nb_elements).map_err(frame_err)?;
        writer.set_field_lengths(lengths)?;
    } else if entry.lengths_len != 0 {
        return Err(ZstrongError::FrameFormatError(format!(
            "{} stream {} carries field lengths",
            entry.kind, entry.index
        )));
    }
    *writer.buffer_mut() = data;
    writer.commit(entry.nb_elements);

    writer.seal().map_err(|e| match e {
        ZstrongError::IncompleteOutput(msg) => {
            ZstrongError::IncompleteOutput(format!("stored stream {}: {}", entry.index, msg))
        }
        other => frame_err(other),
    })
}

fn frame_err(e: ZstrongError) -> ZstrongError {
    match e {
        ZstrongError::FrameFormatError(_) => e,
        other => ZstrongError::FrameFormatError(other.to_string()),
    }
}

fn write_varint(buf: &mut Vec<u8>, value: usize) -> Result<(), ZstrongError> {
    leb128::encode_one(value as u64, buf)
}

fn read_varint(cursor: &mut Cursor<&[u8]>) -> Result<u64, ZstrongError> {
    leb128::decode_one(cursor).map_err(frame_err)
}

fn read_usize(cursor: &mut Cursor<&[u8]>) -> Result<usize, ZstrongError> {
    let value = read_varint(cursor)?;
    usize::try_from(value).map_err(|_| ZstrongError::FrameFormatError(format!("value {} overflows usize", value)))
}

/// Reads an element count; every counted item takes at least one byte, which
/// bounds the count by what is left of the buffer.
fn read_count(cursor: &mut Cursor<&[u8]>) -> Result<usize, ZstrongError> {
    let count = read_usize(cursor)?;
    let remaining = cursor.get_ref().len().saturating_sub(cursor.position() as usize);
    if count > remaining {
        return Err(ZstrongError::FrameFormatError(format!(
            "count {} exceeds the {} bytes left in the container",
            count, remaining
        )));
    }
    Ok(count)
}

fn read_byte(cursor: &mut Cursor<&[u8]>) -> Result<u8, ZstrongError> {
    let mut b = [0u8; 1];
    cursor
        .read_exact(&mut b)
        .map_err(|e| ZstrongError::FrameFormatError(e.to_string()))?;
    Ok(b[0])
}

fn read_kind(cursor: &mut Cursor<&[u8]>) -> Result<(StreamKind, usize), ZstrongError> {
    let kind = StreamKind::from_tag(read_byte(cursor)?)?;
    let width = read_usize(cursor)?;
    kind.validate_width(width).map_err(frame_err)?;
    Ok((kind, width))
}

fn read_exact<'a>(cursor: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], ZstrongError> {
    let pos = cursor.position() as usize;
    let bytes: &'a [u8] = *cursor.get_ref();
    let slice = pos
        .checked_add(len)
        .and_then(|end| bytes.get(pos..end))
        .ok_or_else(|| ZstrongError::FrameFormatError(format!("truncated container: needed {} more bytes", len)))?;
    cursor.set_position((pos + len) as u64);
    Ok(slice)
}
