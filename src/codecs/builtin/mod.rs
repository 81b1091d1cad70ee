//! The built-in codec set.
//!
//! Each codec adapts one kernel from `crate::kernels` to the typed-stream
//! contract: it checks parameters, runs the kernel and writes whatever its
//! decoder needs into the header.

mod backend;
mod conversion;
mod layout;
mod numeric;

pub use backend::{ConstantCodec, EntropyCodec, ZstdCodec};
pub use conversion::{
    NumToSerialCodec, SeparateStringComponentsCodec, SerialToNumCodec, SerialToStructCodec,
    StructToNumCodec, StructToSerialCodec,
};
pub use layout::{SplitByStructCodec, SplitNCodec, TransposeCodec};
pub use numeric::{BitpackCodec, DeltaCodec, TokenizeCodec, ZigzagCodec};

use std::sync::Arc;

use crate::codecs::Codec;

/// Stable ids of the built-in codecs. These values appear in containers.
pub mod ids {
    use crate::types::CodecId;

    pub const DELTA_INT: CodecId = CodecId(1);
    pub const TRANSPOSE: CodecId = CodecId(2);
    pub const ZIGZAG: CodecId = CodecId(3);
    pub const CONVERT_SERIAL_TO_STRUCT: CodecId = CodecId(5);
    pub const CONVERT_STRUCT_TO_SERIAL: CodecId = CodecId(6);
    pub const CONVERT_STRUCT_TO_NUM_LE: CodecId = CodecId(7);
    pub const CONVERT_SERIAL_TO_NUM_LE: CodecId = CodecId(9);
    pub const CONVERT_NUM_TO_SERIAL_LE: CodecId = CodecId(10);
    pub const SEPARATE_STRING_COMPONENTS: CodecId = CodecId(12);
    pub const ZSTD: CodecId = CodecId(22);
    pub const BITPACK_INT: CodecId = CodecId(28);
    pub const TOKENIZE_NUMERIC: CodecId = CodecId(37);
    pub const SPLIT_N: CodecId = CodecId(40);
    pub const SPLIT_BY_STRUCT: CodecId = CodecId(41);
    pub const CONSTANT: CodecId = CodecId(45);
    pub const ENTROPY: CodecId = CodecId(49);
}

/// Every built-in codec, in id order.
pub fn all() -> Vec<Arc<dyn Codec>> {
    vec![
        Arc::new(DeltaCodec::new()),
        Arc::new(TransposeCodec::new()),
        Arc::new(ZigzagCodec::new()),
        Arc::new(SerialToStructCodec::new()),
        Arc::new(StructToSerialCodec::new()),
        Arc::new(StructToNumCodec::new()),
        Arc::new(SerialToNumCodec::new()),
        Arc::new(NumToSerialCodec::new()),
        Arc::new(SeparateStringComponentsCodec::new()),
        Arc::new(ZstdCodec::new()),
        Arc::new(BitpackCodec::new()),
        Arc::new(TokenizeCodec::new()),
        Arc::new(SplitNCodec::new()),
        Arc::new(SplitByStructCodec::new()),
        Arc::new(ConstantCodec::new()),
        Arc::new(EntropyCodec::new()),
    ]
}
