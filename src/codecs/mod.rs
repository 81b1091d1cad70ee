//! Codecs: reversible stream transforms with a declared type signature.
//!
//! A codec consumes a fixed number of typed input streams and produces a fixed
//! list of typed outputs, optionally followed by any number of "variable"
//! outputs of one declared kind, plus an opaque header. Its decoder must
//! rebuild the exact inputs from those outputs and that header alone.
//!
//! Built-in codecs live in [`builtin`]; callers may add their own through
//! [`CodecRegistry::register_custom`] with ids from [`CodecId::FIRST_CUSTOM`] up.

pub mod builtin;
pub mod header;
pub mod registry;

pub use registry::CodecRegistry;

use crate::config::{GlobalParams, MIN_FORMAT_VERSION};
use crate::error::ZstrongError;
use crate::graph::LocalParams;
use crate::stream::{Stream, StreamWriter};
use crate::types::{CodecId, StreamKind, TypeMask};

//==================================================================================
// 1. Descriptor
//==================================================================================

/// The declared identity and type signature of a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    pub id: CodecId,
    pub name: String,
    /// Accepted kinds for each input, in order.
    pub input_types: Vec<TypeMask>,
    /// Kinds of the fixed outputs, in order.
    pub fixed_output_types: Vec<StreamKind>,
    /// Accepted kinds of variable outputs, if the codec produces any.
    pub variable_outputs: Option<TypeMask>,
    /// Oldest container format version able to carry this codec.
    pub min_format_version: u32,
}

impl CodecDescriptor {
    /// A single-input codec with no outputs yet declared.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: CodecId(id),
            name: name.into(),
            input_types: Vec::new(),
            fixed_output_types: Vec::new(),
            variable_outputs: None,
            min_format_version: MIN_FORMAT_VERSION,
        }
    }

    pub fn inputs(mut self, types: impl IntoIterator<Item = TypeMask>) -> Self {
        self.input_types = types.into_iter().collect();
        self
    }

    pub fn outputs(mut self, kinds: impl IntoIterator<Item = StreamKind>) -> Self {
        self.fixed_output_types = kinds.into_iter().collect();
        self
    }

    pub fn variable_outputs(mut self, mask: TypeMask) -> Self {
        self.variable_outputs = Some(mask);
        self
    }

    pub fn min_format_version(mut self, version: u32) -> Self {
        self.min_format_version = version;
        self
    }

    pub fn has_variable_outputs(&self) -> bool {
        self.variable_outputs.is_some()
    }

    /// Number of successor graphs a static graph over this codec must declare:
    /// one per fixed output, plus one shared by all variable outputs.
    pub fn num_successors(&self) -> usize {
        self.fixed_output_types.len() + usize::from(self.has_variable_outputs())
    }

    /// Kinds a given successor slot may receive.
    pub fn successor_mask(&self, slot: usize) -> Option<TypeMask> {
        if let Some(kind) = self.fixed_output_types.get(slot) {
            return Some(kind.mask());
        }
        if slot == self.fixed_output_types.len() {
            return self.variable_outputs;
        }
        None
    }
}

//==================================================================================
// 2. Codec Contract
//==================================================================================

/// Parameters visible to a codec during encoding.
#[derive(Debug, Clone, Copy)]
pub struct CodecParams<'a> {
    pub local: &'a LocalParams,
    pub global: &'a GlobalParams,
}

impl<'a> CodecParams<'a> {
    pub fn new(local: &'a LocalParams, global: &'a GlobalParams) -> Self {
        Self { local, global }
    }

    /// Reads an integer parameter that must be present and positive.
    pub fn required_positive(&self, key: i32, what: &str) -> Result<usize, ZstrongError> {
        let value = self.local.int(key).ok_or_else(|| {
            ZstrongError::InvalidParameter(format!("missing int param {} ({})", key, what))
        })?;
        usize::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| ZstrongError::InvalidParameter(format!("{} must be positive, got {}", what, value)))
    }
}

/// The result of encoding: fixed outputs first, then variable outputs, plus a header.
///
/// Outputs are held as [`StreamWriter`]s and sealed by the engine, so a codec
/// that writes a stream incrementally hands over the writer and an output whose
/// committed count disagrees with its content is rejected with `IncompleteOutput`.
/// Finished streams enter as already-committed writers.
#[derive(Debug, Clone, Default)]
pub struct Encoded {
    pub outputs: Vec<StreamWriter>,
    pub header: Vec<u8>,
}

impl Encoded {
    pub fn new(outputs: Vec<Stream>) -> Self {
        Self::with_header(outputs, Vec::new())
    }

    pub fn with_header(outputs: Vec<Stream>, header: Vec<u8>) -> Self {
        Self {
            outputs: outputs.into_iter().map(StreamWriter::from).collect(),
            header,
        }
    }

    pub fn from_writers(outputs: Vec<StreamWriter>, header: Vec<u8>) -> Self {
        Self { outputs, header }
    }

    /// Seals every output in order.
    pub fn seal(self) -> Result<(Vec<Stream>, Vec<u8>), ZstrongError> {
        let outputs = self
            .outputs
            .into_iter()
            .map(StreamWriter::seal)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((outputs, self.header))
    }
}

/// A reversible transform over typed streams.
///
/// Implementations must be deterministic: the same inputs and parameters must
/// produce the same outputs and header.
pub trait Codec: Send + Sync {
    fn descriptor(&self) -> &CodecDescriptor;

    /// Transforms `inputs` (already type-checked against the descriptor).
    fn encode(&self, inputs: Vec<Stream>, params: &CodecParams<'_>) -> Result<Encoded, ZstrongError>;

    /// Rebuilds the inputs, in order, from the recorded outputs and header.
    fn decode(
        &self,
        fixed: Vec<Stream>,
        variable: Vec<Stream>,
        header: &[u8],
    ) -> Result<Vec<Stream>, ZstrongError>;
}

/// Pops exactly one input of the expected arity, used by single-input codecs.
pub(crate) fn single_input(mut inputs: Vec<Stream>, codec: &str) -> Result<Stream, ZstrongError> {
    if inputs.len() != 1 {
        return Err(ZstrongError::InvalidParameter(format!(
            "{} takes exactly one input, got {}",
            codec,
            inputs.len()
        )));
    }
    inputs
        .pop()
        .ok_or_else(|| ZstrongError::InternalError("input vanished".to_string()))
}

/// Checks the decoder received exactly the fixed outputs it needs.
pub(crate) fn expect_fixed(fixed: &[Stream], expected: usize, codec: &str) -> Result<(), ZstrongError> {
    if fixed.len() != expected {
        return Err(ZstrongError::InvalidParameter(format!(
            "{} decoder expects {} fixed streams, got {}",
            codec,
            expected,
            fixed.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_slots() {
        let desc = CodecDescriptor::new(70, "split_like")
            .inputs([TypeMask::SERIAL])
            .outputs([StreamKind::Numeric])
            .variable_outputs(TypeMask::SERIAL);
        assert_eq!(desc.num_successors(), 2);
        assert_eq!(desc.successor_mask(0), Some(TypeMask::NUMERIC));
        assert_eq!(desc.successor_mask(1), Some(TypeMask::SERIAL));
        assert_eq!(desc.successor_mask(2), None);
    }

    #[test]
    fn test_required_positive() {
        let local = LocalParams::new().with_int(0, 4).with_int(1, -2);
        let global = GlobalParams::default();
        let params = CodecParams::new(&local, &global);
        assert_eq!(params.required_positive(0, "width").unwrap(), 4);
        assert!(params.required_positive(1, "width").is_err());
        assert!(params.required_positive(2, "width").is_err());
    }
}
