//! Layout codecs: reorganize where bytes live without changing their values.

use crate::codecs::builtin::ids;
use crate::codecs::header::{HeaderReader, HeaderWriter};
use crate::codecs::{expect_fixed, single_input, Codec, CodecDescriptor, CodecParams, Encoded};
use crate::error::ZstrongError;
use crate::kernels::transpose;
use crate::stream::Stream;
use crate::types::{StreamKind, TypeMask};

//==================================================================================
// 1. Transpose
//==================================================================================

/// `transpose`: regroups records into byte planes (all first bytes, then all
/// second bytes, ...).
pub struct TransposeCodec {
    desc: CodecDescriptor,
}

impl TransposeCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::TRANSPOSE.0, "transpose")
                .inputs([TypeMask::NUMERIC | TypeMask::FIXED_FIELD])
                .outputs([StreamKind::Serial]),
        }
    }
}

impl Default for TransposeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for TransposeCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let width = input.element_width();
        let mut planes = Vec::with_capacity(input.byte_len());
        transpose::encode(input.content(), width, &mut planes)?;
        let header = HeaderWriter::new().kind(input.kind(), width)?.finish();
        Ok(Encoded::with_header(vec![Stream::serial(planes)], header))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let mut reader = HeaderReader::new(header);
        let (kind, width) = reader.kind()?;
        reader.finish()?;

        let stream = single_input(fixed, &self.desc.name)?;
        let mut records = Vec::with_capacity(stream.byte_len());
        transpose::decode(stream.as_serial()?, width, &mut records)?;
        Ok(vec![Stream::fixed_width(kind, records, width)?])
    }
}

//==================================================================================
// 2. SplitN
//==================================================================================

/// `splitn`: cuts a stream into consecutive segments of int param 0 elements
/// (the last one may be shorter). Every segment becomes a variable output of
/// the input's kind.
pub struct SplitNCodec {
    desc: CodecDescriptor,
}

impl SplitNCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::SPLIT_N.0, "splitn")
                .inputs([TypeMask::FIXED_WIDTH])
                .variable_outputs(TypeMask::FIXED_WIDTH),
        }
    }
}

impl Default for SplitNCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for SplitNCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let segment = params.required_positive(0, "segment length")?;
        let input = single_input(inputs, &self.desc.name)?;
        let (kind, width) = (input.kind(), input.element_width());
        let segment_bytes = segment.checked_mul(width).ok_or_else(|| {
            ZstrongError::InvalidParameter(format!("segment length {} overflows", segment))
        })?;

        let outputs = input
            .content()
            .chunks(segment_bytes)
            .map(|chunk| Stream::fixed_width(kind, chunk.to_vec(), width))
            .collect::<Result<Vec<_>, _>>()?;
        let header = HeaderWriter::new().kind(kind, width)?.finish();
        Ok(Encoded::with_header(outputs, header))
    }

    fn decode(&self, fixed: Vec<Stream>, variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 0, &self.desc.name)?;
        let mut reader = HeaderReader::new(header);
        let (kind, width) = reader.kind()?;
        reader.finish()?;

        let mut content = Vec::with_capacity(variable.iter().map(Stream::byte_len).sum());
        for segment in &variable {
            if segment.kind() != kind || segment.element_width() != width {
                return Err(ZstrongError::type_mismatch(
                    "splitn segment",
                    format!("{} of width {}", kind, width),
                    format!("{} of width {}", segment.kind(), segment.element_width()),
                ));
            }
            content.extend_from_slice(segment.content());
        }
        Ok(vec![Stream::fixed_width(kind, content, width)?])
    }
}

//==================================================================================
// 3. SplitByStruct
//==================================================================================

/// `split_by_struct`: separates each member of a record into its own
/// fixed-field stream. String param 0 lists the member sizes, e.g. `"4,2,2"`,
/// which must add up to the record width.
pub struct SplitByStructCodec {
    desc: CodecDescriptor,
}

impl SplitByStructCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::SPLIT_BY_STRUCT.0, "split_by_struct")
                .inputs([TypeMask::FIXED_FIELD])
                .variable_outputs(TypeMask::FIXED_FIELD)
                .min_format_version(3),
        }
    }
}

impl Default for SplitByStructCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_field_sizes(spec: &str) -> Result<Vec<usize>, ZstrongError> {
    spec.split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| ZstrongError::InvalidParameter(format!("invalid field size '{}'", part)))
        })
        .collect()
}

impl Codec for SplitByStructCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let spec = params.local.string(0).ok_or_else(|| {
            ZstrongError::InvalidParameter("split_by_struct needs string param 0 (field sizes)".to_string())
        })?;
        let sizes = parse_field_sizes(spec)?;
        let input = single_input(inputs, &self.desc.name)?;
        let width = input.element_width();
        if sizes.iter().sum::<usize>() != width {
            return Err(ZstrongError::InvalidParameter(format!(
                "field sizes {:?} do not add up to record width {}",
                sizes, width
            )));
        }

        let mut columns: Vec<Vec<u8>> = sizes
            .iter()
            .map(|size| Vec::with_capacity(size * input.len()))
            .collect();
        for record in input.fixed_fields()? {
            let mut offset = 0;
            for (column, &size) in columns.iter_mut().zip(&sizes) {
                column.extend_from_slice(&record[offset..offset + size]);
                offset += size;
            }
        }

        let outputs = columns
            .into_iter()
            .zip(&sizes)
            .map(|(column, &size)| Stream::fixed_field(column, size))
            .collect::<Result<Vec<_>, _>>()?;
        let mut header = HeaderWriter::new().varint(sizes.len() as u64)?;
        for &size in &sizes {
            header = header.varint(size as u64)?;
        }
        Ok(Encoded::with_header(outputs, header.finish()))
    }

    fn decode(&self, fixed: Vec<Stream>, variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 0, &self.desc.name)?;
        let mut reader = HeaderReader::new(header);
        let nb_fields = reader.usize()?;
        if nb_fields != variable.len() {
            return Err(ZstrongError::InvalidParameter(format!(
                "header lists {} fields but {} streams were provided",
                nb_fields,
                variable.len()
            )));
        }
        let mut sizes = Vec::with_capacity(nb_fields);
        for _ in 0..nb_fields {
            sizes.push(reader.usize()?);
        }
        reader.finish()?;

        let count = variable.first().map(Stream::len).unwrap_or(0);
        for (column, &size) in variable.iter().zip(&sizes) {
            column.require_kind(StreamKind::FixedField)?;
            if column.element_width() != size || column.len() != count {
                return Err(ZstrongError::InvalidParameter(
                    "split_by_struct columns disagree on shape".to_string(),
                ));
            }
        }

        let width: usize = sizes.iter().sum();
        let mut records = Vec::with_capacity(width * count);
        for row in 0..count {
            for (column, &size) in variable.iter().zip(&sizes) {
                records.extend_from_slice(&column.content()[row * size..(row + 1) * size]);
            }
        }
        Ok(vec![Stream::fixed_field(records, width)?])
    }
}
