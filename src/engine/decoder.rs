//! The decompressor: replays a container's trace backwards.
//!
//! Stored streams are put back into their slots, then every recorded codec
//! invocation is undone from last to first. A record's outputs are always
//! complete by the time it is replayed, because any record consuming them was
//! recorded later and has already been undone.

use std::sync::Arc;

use crate::codecs::{Codec, CodecRegistry};
use crate::config::{MAX_FORMAT_VERSION, MIN_FORMAT_VERSION};
use crate::engine::container::{CompressedContainer, StreamInfo};
use crate::error::ZstrongError;
use crate::stream::Stream;
use crate::types::{CodecId, StreamKind};

/// Decodes containers. Holds its own codec registry, independent of any compressor.
#[derive(Clone, Debug)]
pub struct Decompressor {
    codecs: CodecRegistry,
    max_format_version: u32,
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompressor {
    pub fn new() -> Self {
        Self {
            codecs: CodecRegistry::with_builtins(),
            max_format_version: MAX_FORMAT_VERSION,
        }
    }

    /// Refuses containers newer than `version`.
    pub fn with_max_format_version(mut self, version: u32) -> Result<Self, ZstrongError> {
        if !(MIN_FORMAT_VERSION..=MAX_FORMAT_VERSION).contains(&version) {
            return Err(ZstrongError::UnsupportedVersion {
                version,
                min: MIN_FORMAT_VERSION,
                max: MAX_FORMAT_VERSION,
            });
        }
        self.max_format_version = version;
        Ok(self)
    }

    /// Registers a custom codec. It must match the one used to compress.
    pub fn register_custom_codec(&mut self, codec: Arc<dyn Codec>) -> Result<CodecId, ZstrongError> {
        self.codecs.register_custom(codec)
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn decompress(&self, bytes: &[u8]) -> Result<Vec<Stream>, ZstrongError> {
        let container = CompressedContainer::from_bytes(bytes, self.max_format_version)?;
        let outputs = self.replay(container)?;
        log::debug!("Decompressed {} bytes into {} stream(s)", bytes.len(), outputs.len());
        Ok(outputs)
    }

    /// Decompresses a container holding exactly one serial stream.
    pub fn decompress_serial(&self, bytes: &[u8]) -> Result<Vec<u8>, ZstrongError> {
        let mut outputs = self.decompress(bytes)?;
        if outputs.len() != 1 {
            return Err(ZstrongError::InvalidParameter(format!(
                "expected a single serial stream, the container holds {}",
                outputs.len()
            )));
        }
        let stream = outputs.remove(0);
        stream.require_kind(StreamKind::Serial)?;
        Ok(stream.into_parts().0)
    }

    /// Rebuilds the top-level inputs of an already parsed container.
    pub fn replay(&self, container: CompressedContainer) -> Result<Vec<Stream>, ZstrongError> {
        // Resolve every codec before doing any work.
        let codecs = container
            .transforms
            .iter()
            .map(|record| self.codecs.require(record.codec).map(Arc::clone))
            .collect::<Result<Vec<_>, _>>()?;
        for (record, codec) in container.transforms.iter().zip(&codecs) {
            let desc = codec.descriptor();
            if desc.min_format_version > container.format_version {
                return Err(ZstrongError::FrameFormatError(format!(
                    "codec '{}' cannot appear in a version {} container",
                    desc.name, container.format_version
                )));
            }
            if record.inputs.len() != desc.input_types.len() {
                return Err(ZstrongError::ConservationViolation {
                    codec: record.codec.0,
                    expected: desc.input_types.len(),
                    found: record.inputs.len(),
                });
            }
            if record.nb_fixed_outputs != desc.fixed_output_types.len()
                || (desc.variable_outputs.is_none() && record.nb_variable_outputs != 0)
            {
                return Err(ZstrongError::ConservationViolation {
                    codec: record.codec.0,
                    expected: desc.fixed_output_types.len(),
                    found: record.nb_outputs(),
                });
            }
        }

        // Every stream is consumed exactly once: as a codec input or by being stored.
        let nb_inputs = container.inputs.len();
        let total = container
            .transforms
            .iter()
            .try_fold(nb_inputs, |acc, r| acc.checked_add(r.nb_outputs()))
            .ok_or_else(|| ZstrongError::FrameFormatError("stream count overflows".to_string()))?;
        let consumed: usize =
            container.transforms.iter().map(|r| r.inputs.len()).sum::<usize>() + container.stored.len();
        if consumed != total {
            return Err(ZstrongError::FrameFormatError(format!(
                "trace declares {} streams but accounts for {}",
                total, consumed
            )));
        }

        let mut slots: Vec<Option<Stream>> = (0..total).map(|_| None).collect();
        for stored in container.stored {
            let slot = slots.get_mut(stored.index).ok_or_else(|| {
                ZstrongError::FrameFormatError(format!("stored stream index {} out of range", stored.index))
            })?;
            if slot.replace(stored.stream).is_some() {
                return Err(ZstrongError::FrameFormatError(format!(
                    "stream {} is stored twice",
                    stored.index
                )));
            }
        }

        let mut output_starts = Vec::with_capacity(container.transforms.len());
        let mut next = nb_inputs;
        for record in &container.transforms {
            output_starts.push(next);
            next += record.nb_outputs();
        }

        for ((record, codec), &start) in container.transforms.iter().zip(&codecs).zip(&output_starts).rev() {
            let desc = codec.descriptor();
            let mut fixed = Vec::with_capacity(record.nb_fixed_outputs);
            let mut variable = Vec::with_capacity(record.nb_variable_outputs);
            for index in start..start + record.nb_outputs() {
                let stream = slots[index].take().ok_or_else(|| {
                    ZstrongError::FrameFormatError(format!("stream {} is missing from the trace", index))
                })?;
                if index < start + record.nb_fixed_outputs {
                    fixed.push(stream);
                } else {
                    variable.push(stream);
                }
            }

            let decoded = codec
                .decode(fixed, variable, &record.header)
                .map_err(|source| ZstrongError::CodecDecodeFailure {
                    codec: record.codec.0,
                    source: Box::new(source),
                })?;
            if decoded.len() != record.inputs.len() {
                return Err(ZstrongError::ConservationViolation {
                    codec: record.codec.0,
                    expected: record.inputs.len(),
                    found: decoded.len(),
                });
            }

            for ((&index, stream), mask) in record.inputs.iter().zip(decoded).zip(&desc.input_types) {
                if index >= start {
                    return Err(ZstrongError::FrameFormatError(format!(
                        "codec {} consumes stream {} before it exists",
                        record.codec, index
                    )));
                }
                if !mask.contains(stream.kind()) {
                    return Err(ZstrongError::type_mismatch(
                        format!("decoded input of codec '{}'", desc.name),
                        mask,
                        stream.kind(),
                    ));
                }
                if slots[index].replace(stream).is_some() {
                    return Err(ZstrongError::FrameFormatError(format!(
                        "stream {} is produced twice",
                        index
                    )));
                }
            }
        }

        let mut outputs = Vec::with_capacity(nb_inputs);
        for (index, info) in container.inputs.iter().enumerate() {
            let stream = slots[index]
                .take()
                .ok_or_else(|| ZstrongError::FrameFormatError(format!("input {} was not reconstructed", index)))?;
            if StreamInfo::of(&stream) != *info {
                return Err(ZstrongError::FrameFormatError(format!(
                    "input {} decoded as {} of width {}, expected {} of width {}",
                    index,
                    stream.kind(),
                    stream.element_width(),
                    info.kind,
                    info.element_width
                )));
            }
            outputs.push(stream);
        }
        Ok(outputs)
    }
}
