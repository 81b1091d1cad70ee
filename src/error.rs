//! This module defines the single, unified error type for the entire zstrong engine.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

use crate::graph::GraphId;

#[derive(Error, Debug)]
pub enum ZstrongError {
    // =========================================================================
    // === Engine Errors (graph construction, execution, container replay)
    // =========================================================================
    /// A stream's kind does not match what its consumer expects.
    #[error("Type mismatch at {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    /// A stream writer was sealed before its content was fully committed.
    #[error("Incomplete output: {0}")]
    IncompleteOutput(String),

    /// A codec id, selector name or graph name collides with an existing registration.
    #[error("Identifier conflict: {0}")]
    IdConflict(String),

    #[error("Selector at node {node} chose successor {choice}, but only {available} are declared")]
    InvalidChoice {
        node: GraphId,
        choice: usize,
        available: usize,
    },

    #[error("Codec {codec} failed to encode at node {node}: {source}")]
    CodecEncodeFailure {
        node: GraphId,
        codec: u32,
        #[source]
        source: Box<ZstrongError>,
    },

    #[error("Codec {codec} failed to decode: {source}")]
    CodecDecodeFailure {
        codec: u32,
        #[source]
        source: Box<ZstrongError>,
    },

    /// The container references a codec this decompressor has no registration for.
    #[error("Unknown codec id {id}")]
    UnknownCodec { id: u32 },

    #[error("Unsupported format version {version} (supported range: {min}..={max})")]
    UnsupportedVersion { version: u32, min: u32, max: u32 },

    /// The number of streams exchanged with a codec differs from what it declared or recorded.
    #[error("Stream conservation violated by codec {codec}: expected {expected} streams, got {found}")]
    ConservationViolation {
        codec: u32,
        expected: usize,
        found: usize,
    },

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A serialized compressor references custom components that are not registered.
    #[error("Unmet dependencies: {0}")]
    UnmetDependencies(String),

    #[error("Container serialization/deserialization failed: {0}")]
    FrameFormatError(String),

    /// Free-form failure raised by a caller-supplied codec, selector or function graph.
    #[error("{0}")]
    Custom(String),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while reading descriptors or documents.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Byte slice casting error: {0}")]
    PodCast(String), // bytemuck::PodCastError doesn't impl Error

    // =========================================================================
    // === Kernel Errors
    // =========================================================================
    #[error("Buffer length mismatch: expected a multiple of {1}, got {0}")]
    BufferMismatch(usize, usize),

    #[error("LEB128 decoding error: {0}")]
    Leb128DecodeError(String),

    #[error("Bitpack decoding failed due to truncated buffer or data corruption")]
    BitpackDecodeError,

    #[error("Bitpack encoding error: value {0} exceeds bit width {1}")]
    BitpackEncodeError(u64, u8),

    #[error("Entropy coding failed: {0}")]
    EntropyError(String),

    #[error("Zstd operation failed: {0}")]
    ZstdError(String),
}

impl ZstrongError {
    /// Shorthand used by stream views and the engine when a kind check fails.
    pub(crate) fn type_mismatch(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        ZstrongError::TypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl From<bytemuck::PodCastError> for ZstrongError {
    fn from(err: bytemuck::PodCastError) -> Self {
        ZstrongError::PodCast(err.to_string())
    }
}
