//! Backend codecs: the ones that actually shrink bytes.
//!
//! `zstd` and `entropy` collapse a stream into a serial blob; `constant`
//! swallows its input entirely and keeps the repeated value in the header.

use crate::codecs::builtin::ids;
use crate::codecs::header::{HeaderReader, HeaderWriter};
use crate::codecs::{expect_fixed, single_input, Codec, CodecDescriptor, CodecParams, Encoded};
use crate::error::ZstrongError;
use crate::kernels::{ans, constant, zstd};
use crate::stream::Stream;
use crate::types::{StreamKind, TypeMask};

//==================================================================================
// 1. Zstd
//==================================================================================

/// `zstd`: compresses the content of any fixed-width stream. Int param 0
/// overrides the level derived from the global parameters.
pub struct ZstdCodec {
    desc: CodecDescriptor,
}

impl ZstdCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::ZSTD.0, "zstd")
                .inputs([TypeMask::FIXED_WIDTH])
                .outputs([StreamKind::Serial]),
        }
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for ZstdCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let level = match params.local.int(0) {
            Some(level) => i32::try_from(level)
                .map_err(|_| ZstrongError::InvalidParameter(format!("zstd level {} out of range", level)))?,
            None => params.global.zstd_level(),
        };
        let input = single_input(inputs, &self.desc.name)?;
        let compressed = zstd::encode(input.content(), level)?;
        let header = HeaderWriter::new().kind(input.kind(), input.element_width())?.finish();
        Ok(Encoded::with_header(vec![Stream::serial(compressed)], header))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let mut reader = HeaderReader::new(header);
        let (kind, width) = reader.kind()?;
        reader.finish()?;

        let stream = single_input(fixed, &self.desc.name)?;
        let content = zstd::decode(stream.as_serial()?)?;
        Ok(vec![Stream::fixed_width(kind, content, width)?])
    }
}

//==================================================================================
// 2. Entropy
//==================================================================================

/// `entropy`: order-0 rANS over serial bytes.
pub struct EntropyCodec {
    desc: CodecDescriptor,
}

impl EntropyCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::ENTROPY.0, "entropy")
                .inputs([TypeMask::SERIAL])
                .outputs([StreamKind::Serial])
                .min_format_version(2),
        }
    }
}

impl Default for EntropyCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for EntropyCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let mut coded = Vec::with_capacity(input.byte_len() / 2 + 16);
        ans::encode(input.as_serial()?, &mut coded)?;
        Ok(Encoded::new(vec![Stream::serial(coded)]))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, _header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let stream = single_input(fixed, &self.desc.name)?;
        Ok(vec![Stream::serial(ans::decode(stream.as_serial()?)?)])
    }
}

//==================================================================================
// 3. Constant
//==================================================================================

/// `constant`: consumes a stream whose elements are all equal. The header
/// holds the kind, the element count and the value; there are no outputs.
pub struct ConstantCodec {
    desc: CodecDescriptor,
}

impl ConstantCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::CONSTANT.0, "constant")
                .inputs([TypeMask::FIXED_WIDTH]),
        }
    }
}

impl Default for ConstantCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for ConstantCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let value: &[u8] = if input.is_empty() {
            &[]
        } else {
            input.constant_element().ok_or_else(|| {
                ZstrongError::InvalidParameter(format!(
                    "constant codec received a non-constant {} stream",
                    input.kind()
                ))
            })?
        };

        let header = HeaderWriter::new()
            .kind(input.kind(), input.element_width())?
            .varint(input.len() as u64)?
            .bytes(value)
            .finish();
        Ok(Encoded::with_header(Vec::new(), header))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 0, &self.desc.name)?;
        let mut reader = HeaderReader::new(header);
        let (kind, width) = reader.kind()?;
        let count = reader.usize()?;
        let value = if count == 0 { &[][..] } else { reader.bytes(width)? };
        reader.finish()?;

        Ok(vec![Stream::fixed_width(kind, constant::expand(value, count)?, width)?])
    }
}
