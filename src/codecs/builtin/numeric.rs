//! Codecs over numeric streams: delta, zigzag, bitpack and tokenize.

use crate::codecs::builtin::ids;
use crate::codecs::header::{HeaderReader, HeaderWriter};
use crate::codecs::{expect_fixed, single_input, Codec, CodecDescriptor, CodecParams, Encoded};
use crate::error::ZstrongError;
use crate::kernels::{bitpack, delta, tokenize, zigzag};
use crate::stream::Stream;
use crate::types::{StreamKind, TypeMask};
use crate::utils::{dispatch_by_width, min_width_for, narrow_from_u64};

//==================================================================================
// 1. Delta
//==================================================================================

/// `delta_int`: replaces each value by its difference from the value `order`
/// positions earlier (int param 0, default 1). Arithmetic wraps.
pub struct DeltaCodec {
    desc: CodecDescriptor,
}

impl DeltaCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::DELTA_INT.0, "delta_int")
                .inputs([TypeMask::NUMERIC])
                .outputs([StreamKind::Numeric]),
        }
    }
}

impl Default for DeltaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for DeltaCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let order = params.local.int(0).unwrap_or(1);
        let order = usize::try_from(order)
            .ok()
            .filter(|o| *o > 0)
            .ok_or_else(|| ZstrongError::InvalidParameter(format!("delta order must be positive, got {}", order)))?;

        let width = input.element_width();
        let mut out = Vec::with_capacity(input.byte_len());
        dispatch_by_width!(width, T => {
            let values = input.as_numeric::<T>()?;
            delta::encode(&values, &mut out, order)
        })?;

        let header = HeaderWriter::new().varint(order as u64)?.finish();
        Ok(Encoded::with_header(vec![Stream::numeric_from_bytes(out, width)?], header))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let mut reader = HeaderReader::new(header);
        let order = reader.usize()?;
        reader.finish()?;

        let stream = single_input(fixed, &self.desc.name)?;
        let width = stream.element_width();
        let mut out = Vec::with_capacity(stream.byte_len());
        dispatch_by_width!(width, T => delta::decode::<T>(stream.content(), &mut out, order))?;
        Ok(vec![Stream::numeric_from_bytes(out, width)?])
    }
}

//==================================================================================
// 2. Zigzag
//==================================================================================

/// `zigzag`: maps two's complement values to unsigned codes so that small
/// magnitudes of either sign stay small.
pub struct ZigzagCodec {
    desc: CodecDescriptor,
}

impl ZigzagCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::ZIGZAG.0, "zigzag")
                .inputs([TypeMask::NUMERIC])
                .outputs([StreamKind::Numeric]),
        }
    }
}

impl Default for ZigzagCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for ZigzagCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let width = input.element_width();
        let mut out = Vec::with_capacity(input.byte_len());
        dispatch_by_width!(width, T => {
            let values = input.as_numeric::<T>()?;
            zigzag::encode(&values, &mut out)
        })?;
        Ok(Encoded::new(vec![Stream::numeric_from_bytes(out, width)?]))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, _header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let stream = single_input(fixed, &self.desc.name)?;
        let width = stream.element_width();
        let mut out = Vec::with_capacity(stream.byte_len());
        dispatch_by_width!(width, T => zigzag::decode::<T>(stream.content(), &mut out))?;
        Ok(vec![Stream::numeric_from_bytes(out, width)?])
    }
}

//==================================================================================
// 3. Bitpack
//==================================================================================

/// `bitpack_int`: packs values at the smallest bit width that holds the maximum.
pub struct BitpackCodec {
    desc: CodecDescriptor,
}

impl BitpackCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::BITPACK_INT.0, "bitpack_int")
                .inputs([TypeMask::NUMERIC])
                .outputs([StreamKind::Serial]),
        }
    }
}

impl Default for BitpackCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for BitpackCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, _params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let values = input.numeric_values()?;
        let bit_width = bitpack::required_bit_width(&values);
        let mut packed = Vec::new();
        bitpack::encode(&values, &mut packed, bit_width)?;

        let header = HeaderWriter::new()
            .varint(input.element_width() as u64)?
            .byte(bit_width)
            .varint(values.len() as u64)?
            .finish();
        Ok(Encoded::with_header(vec![Stream::serial(packed)], header))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 1, &self.desc.name)?;
        let mut reader = HeaderReader::new(header);
        let width = reader.usize()?;
        let bit_width = reader.byte()?;
        let count = reader.usize()?;
        reader.finish()?;

        if bit_width as usize > width * 8 {
            return Err(ZstrongError::BitpackDecodeError);
        }
        let stream = single_input(fixed, &self.desc.name)?;
        let values = bitpack::decode(stream.as_serial()?, bit_width, count)?;
        Ok(vec![Stream::numeric_from_bytes(narrow_from_u64(&values, width)?, width)?])
    }
}

//==================================================================================
// 4. Tokenize
//==================================================================================

/// `tokenize_numeric`: splits a numeric stream into an alphabet of distinct
/// values and a stream of indices. Int param 0 sorts the alphabet (default on).
pub struct TokenizeCodec {
    desc: CodecDescriptor,
}

impl TokenizeCodec {
    pub fn new() -> Self {
        Self {
            desc: CodecDescriptor::new(ids::TOKENIZE_NUMERIC.0, "tokenize_numeric")
                .inputs([TypeMask::NUMERIC])
                .outputs([StreamKind::Numeric, StreamKind::Numeric]),
        }
    }
}

impl Default for TokenizeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for TokenizeCodec {
    fn descriptor(&self) -> &CodecDescriptor {
        &self.desc
    }

    fn encode(&self, inputs: Vec<Stream>, params: &CodecParams<'_>) -> Result<Encoded, ZstrongError> {
        let input = single_input(inputs, &self.desc.name)?;
        let sort = params.local.int(0).unwrap_or(1) != 0;
        let width = input.element_width();
        let values = input.numeric_values()?;
        let (alphabet, indices) = tokenize::encode(&values, sort);

        let index_width = min_width_for(alphabet.len().saturating_sub(1) as u64);
        let alphabet = Stream::numeric_from_bytes(narrow_from_u64(&alphabet, width)?, width)?;
        let indices = Stream::numeric_from_bytes(narrow_from_u64(&indices, index_width)?, index_width)?;
        Ok(Encoded::new(vec![alphabet, indices]))
    }

    fn decode(&self, fixed: Vec<Stream>, _variable: Vec<Stream>, _header: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        expect_fixed(&fixed, 2, &self.desc.name)?;
        let width = fixed[0].element_width();
        let alphabet = fixed[0].numeric_values()?;
        let indices = fixed[1].numeric_values()?;
        let values = tokenize::decode(&alphabet, &indices)?;
        Ok(vec![Stream::numeric_from_bytes(narrow_from_u64(&values, width)?, width)?])
    }
}
