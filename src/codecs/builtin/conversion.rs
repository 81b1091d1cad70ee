//! Conversion codecs: reinterpret a stream as another kind without touching its bytes.
//!
//! These are the adapters that let serial input reach numeric codecs (and
//! back). Only the kind and width change; the content buffer moves through
//! untouched, so the header carries whatever width the decoder cannot infer.

use crate::codecs::builtin::ids;
use crate::codecs::header::{HeaderReader, HeaderWriter};
use crate::codecs::{expect_fixed, single_input, Codec, CodecDescriptor, CodecParams, Encoded};
use crate::error::ZstrongError;
use crate::stream::Stream;
use crate::types::{StreamKind, TypeMask};
use crate::utils::narrow_from_u64;

fn read_width(header: &[u8]) -> Result<usize, ZstrongError> {
    let mut reader = HeaderReader::new(header);
    let width = reader.usize()?;
    reader.finish()?;
    Ok(width)
}

fn width_header(width: usize) -> Result<Vec<u8>, ZstrongError> {
    Ok(HeaderWriter::new().varint(width as u64)?.finish())
}

//==================================================================================
// Serial <-> FixedField
//==================================================================================

/// `convert_serial_to_struct`: serial bytes to records of int param 0 bytes.
pub struct SerialToStructCodec {
    desc: CodecDescriptor,
}

impl SerialToStructCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::CONVERT_SERIAL_TO_STRUCT.0, "convert_serial_to_struct")
                .inputs([TypeMask::SERIAL])
                .outputs([StreamKind::FixedField]),
        }
    }
}

impl Default for SerialToStructCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SerialToStructCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let width = params.required_positive(0, "struct width")?;
        let (data, _) = single_input(inputs, &self.desc.name)?.into_parts();
        Ok(Encoded::new(vec![Stream::fixed_field(data, width)?]))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, _header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let stream = single_input(fixed, &self.desc.name)?;
        stream.require_kind(StreamKind::FixedField)?;
        Ok(vec![Stream::serial(stream.into_parts().0)])
    }
}

/// `convert_struct_to_serial`: drops the record structure of a fixed-field stream.
pub struct StructToSerialCodec {
    desc: CodecDescriptor,
}

impl StructToSerialCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::CONVERT_STRUCT_TO_SERIAL.0, "convert_struct_to_serial")
                .inputs([TypeMask::FIXED_FIELD])
                .outputs([StreamKind::Serial]),
        }
    }
}

impl Default for StructToSerialCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for StructToSerialCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let header = width_header(input.element_width())?;
        Ok(Encoded::with_header(vec![Stream::serial(input.into_parts().0)], header))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let width = read_width(header)?;
        let stream = single_input(fixed, &self.desc.name)?;
        stream.require_kind(StreamKind::Serial)?;
        Ok(vec![Stream::fixed_field(stream.into_parts().0, width)?])
    }
}

//==================================================================================
// FixedField / Serial <-> Numeric
//==================================================================================

/// `convert_struct_to_num_le`: reads 1, 2, 4 or 8 byte records as little-endian integers.
pub struct StructToNumCodec {
    desc: CodecDescriptor,
}

impl StructToNumCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::CONVERT_STRUCT_TO_NUM_LE.0, "convert_struct_to_num_le")
                .inputs([TypeMask::FIXED_FIELD])
                .outputs([StreamKind::Numeric]),
        }
    }
}

impl Default for StructToNumCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for StructToNumCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let width = input.element_width();
        Ok(Encoded::new(vec![Stream::numeric_from_bytes(input.into_parts().0, width)?]))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, _header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let stream = single_input(fixed, &self.desc.name)?;
        let width = stream.element_width();
        stream.require_kind(StreamKind::Numeric)?;
        Ok(vec![Stream::fixed_field(stream.into_parts().0, width)?])
    }
}

/// `convert_serial_to_num_le`: reads serial bytes as integers of int param 0 bytes.
pub struct SerialToNumCodec {
    desc: CodecDescriptor,
}

impl SerialToNumCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::CONVERT_SERIAL_TO_NUM_LE.0, "convert_serial_to_num_le")
                .inputs([TypeMask::SERIAL])
                .outputs([StreamKind::Numeric]),
        }
    }
}

impl Default for SerialToNumCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SerialToNumCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let width = params.required_positive(0, "integer width")?;
        let (data, _) = single_input(inputs, &self.desc.name)?.into_parts();
        Ok(Encoded::new(vec![Stream::numeric_from_bytes(data, width)?]))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, _header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let stream = single_input(fixed, &self.desc.name)?;
        stream.require_kind(StreamKind::Numeric)?;
        Ok(vec![Stream::serial(stream.into_parts().0)])
    }
}

/// `convert_num_to_serial_le`: writes integers out as their little-endian bytes.
pub struct NumToSerialCodec {
    desc: CodecDescriptor,
}

impl NumToSerialCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::CONVERT_NUM_TO_SERIAL_LE.0, "convert_num_to_serial_le")
                .inputs([TypeMask::NUMERIC])
                .outputs([StreamKind::Serial]),
        }
    }
}

impl Default for NumToSerialCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for NumToSerialCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let header = width_header(input.element_width())?;
        Ok(Encoded::with_header(vec![Stream::serial(input.into_parts().0)], header))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let width = read_width(header)?;
        let stream = single_input(fixed, &self.desc.name)?;
        stream.require_kind(StreamKind::Serial)?;
        Ok(vec![Stream::numeric_from_bytes(stream.into_parts().0, width)?])
    }
}

//==================================================================================
// VariableField -> (content, lengths)
//==================================================================================

/// `separate_string_components`: splits variable-size records into their
/// concatenated content and a numeric stream of 32-bit lengths.
pub struct SeparateStringComponentsCodec {
    desc: CodecDescriptor,
}

impl SeparateStringComponentsCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::SEPARATE_STRING_COMPONENTS.0, "separate_string_components")
                .inputs([TypeMask::VARIABLE_FIELD])
                .outputs([StreamKind::Serial, StreamKind::Numeric]),
        }
    }
}

impl Default for SeparateStringComponentsCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SeparateStringComponentsCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let lengths: Vec<u64> = input.field_lengths()?.iter().map(|&l| l as u64).collect();
        let (content, _) = input.into_parts();
        let lengths = Stream::numeric_from_bytes(narrow_from_u64(&lengths, 4)?, 4)?;
        Ok(Encoded::new(vec![Stream::serial(content), lengths]))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, _header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 2, &self.desc.name)?;
        let mut fixed = fixed.into_iter();
        let (content, lengths) = match (fixed.next(), fixed.next()) {
            (Some(c), Some(l)) => (c, l),
            _ => return Err(ZstrongError::InternalError("missing string components".to_string())),
        };
        content.as_serial()?;
        let lengths: Vec<u32> = lengths
            .numeric_values()?
            .into_iter()
            .map(|l| u32::try_from(l).map_err(|_| ZstrongError::InvalidParameter(format!("field length {} overflows u32", l))))
            .collect::<Result<_, _>>()?;
        Ok(vec![Stream::variable_field(content.into_parts().0, lengths)?])
    }
}
