//! This module contains the pure, stateless compute kernels behind the built-in codecs.
//!
//! Kernels know nothing about streams, graphs or containers. They operate on
//! slices and byte buffers and report failures as `ZstrongError`; the codec
//! layer (`crate::codecs`) adapts them to typed streams and headers.

pub mod ans;
pub mod bitpack;
pub mod constant;
pub mod delta;
pub mod leb128;
pub mod tokenize;
pub mod transpose;
pub mod zigzag;
pub mod zstd;
