//! Execution: the encode session, function graphs, the container format and
//! the decompressor that replays it.

pub mod container;
mod decoder;
mod encoder;
mod function;

pub use container::{
    peek_info, read_version, CompressedContainer, ContainerInfo, StoredStream, StreamInfo, TransformRecord,
};
pub use decoder::Decompressor;
pub use function::{Edge, FunctionGraph, FunctionGraphDescription, GraphCtx};

pub(crate) use encoder::Session;

#[cfg(test)]
mod engine_tests;
