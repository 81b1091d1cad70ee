//! This file is the root of the `zstrong` crate: a graph-based compression
//! engine for typed streams.
//!
//! A [`Compressor`] holds codecs, selectors and function graphs, and an arena
//! of graphs built from them. Compressing runs the starting graph over the
//! input streams and writes a self-describing container: the trace of codec
//! invocations plus the streams that reached a store node. A [`Decompressor`]
//! needs nothing but that container (and any custom codecs) to replay the
//! trace backwards.
//!
//! ```
//! use zstrong::{Compressor, Decompressor, Stream};
//!
//! let values: Vec<u32> = (0..1000).collect();
//! let compressed = Compressor::new().compress(vec![Stream::numeric(&values)]).unwrap();
//! let restored = Decompressor::new().decompress(&compressed).unwrap();
//! assert_eq!(restored, vec![Stream::numeric(&values)]);
//! ```

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod benchmark;
pub mod codecs;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod kernels;
pub mod profiles;
pub mod selector;
pub mod stream;
pub mod trainer;
pub mod types;

mod utils;

#[doc(hidden)]
pub use log as __log;

//==================================================================================
// 2. Re-exports
//==================================================================================
pub use codecs::{Codec, CodecDescriptor, CodecParams, CodecRegistry, Encoded};
pub use config::{CompressionProfile, GlobalParams, TrainStrategy, TrainerConfig, MAX_FORMAT_VERSION, MIN_FORMAT_VERSION};
pub use engine::{peek_info, ContainerInfo, Decompressor, Edge, FunctionGraph, FunctionGraphDescription, GraphCtx};
pub use error::ZstrongError;
pub use graph::{standard, Compressor, GraphDocument, GraphId, LocalParams};
pub use observability::enable_verbose_logging;
pub use selector::{Selector, SelectorDescription, SelectorState};
pub use stream::{Stream, StreamWriter};
pub use trainer::{TrainResult, Trainer};
pub use types::{CodecId, StreamKind, TypeMask};
