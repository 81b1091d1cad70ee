//! This module defines the core, strongly-typed stream descriptions used
//! throughout the graph engine.
//!
//! It includes the canonical `StreamKind` enum, the `TypeMask` bit set codecs
//! use to declare which kinds they accept, and the `CodecId` newtype.

pub mod codec_id;
pub mod stream_kind;

// Re-export the main types for easier access.
pub use codec_id::CodecId;
pub use stream_kind::{StreamKind, TypeMask};
