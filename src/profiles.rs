//! Named, ready-made compressors for files of bytes.
//!
//! Every profile compresses a single serial stream. The little-endian
//! profiles reinterpret the file as integers of a given width when its length
//! allows it, and fall back to plain zstd otherwise. `numeric` leaves the
//! width open: it carries a brute-force decision point, which makes it the
//! profile to hand to the trainer.

use std::sync::Arc;

use crate::codecs::builtin::ids;
use crate::engine::{Edge, FunctionGraph, FunctionGraphDescription, GraphCtx};
use crate::error::ZstrongError;
use crate::graph::{standard, Compressor, GraphDocument, GraphId, LocalParams};
use crate::selector::builtin::BRUTE_FORCE;
use crate::types::TypeMask;

pub const STORE: &str = "store";
pub const SERIAL: &str = "serial";
pub const LE_U16: &str = "le-u16";
pub const LE_U32: &str = "le-u32";
pub const LE_U64: &str = "le-u64";
pub const NUMERIC: &str = "numeric";

/// Every profile name, in the order they are listed to users.
pub const PROFILES: [&str; 6] = [STORE, SERIAL, LE_U16, LE_U32, LE_U64, NUMERIC];

//==================================================================================
// 1. Serial-as-numeric function graph
//==================================================================================

/// Name under which [`SerialAsNumeric`] is registered.
pub const SERIAL_AS_NUMERIC: &str = "serial_as_numeric";

/// Reads int param 0 as an element width. If the input length is a positive
/// multiple of it, the bytes are converted to little-endian integers and sent
/// to custom graph 0; otherwise the input goes to custom graph 1 untouched.
#[derive(Debug, Default)]
pub struct SerialAsNumeric;

impl FunctionGraph for SerialAsNumeric {
    fn description(&self) -> FunctionGraphDescription {
        FunctionGraphDescription::new(SERIAL_AS_NUMERIC, [TypeMask::SERIAL])
    }

    fn run(&self, ctx: &mut GraphCtx<'_, '_>, inputs: Vec<Edge>) -> Result<(), ZstrongError> {
        let (numeric, fallback) = match ctx.custom_graphs() {
            [numeric, fallback] => (*numeric, *fallback),
            other => {
                return Err(ZstrongError::InvalidGraph(format!(
                    "{} needs 2 custom graphs (numeric, fallback), got {}",
                    SERIAL_AS_NUMERIC,
                    other.len()
                )))
            }
        };
        let width = match ctx.local_params().int(0) {
            Some(w @ (1 | 2 | 4 | 8)) => w as usize,
            other => {
                return Err(ZstrongError::InvalidParameter(format!(
                    "{} needs int param 0 in {{1, 2, 4, 8}}, got {:?}",
                    SERIAL_AS_NUMERIC, other
                )))
            }
        };

        for edge in inputs {
            let len = ctx.stream(edge)?.len();
            if len > 0 && len % width == 0 {
                let converted = ctx.run_codec(
                    ids::CONVERT_SERIAL_TO_NUM_LE,
                    &[edge],
                    LocalParams::new().with_int(0, width as i64),
                )?;
                for output in converted {
                    ctx.set_destination(output, numeric)?;
                }
            } else {
                ctx.set_destination(edge, fallback)?;
            }
        }
        Ok(())
    }
}

//==================================================================================
// 2. Profiles
//==================================================================================

/// A fresh compressor with the components every profile relies on.
/// Trained descriptors produced from a profile load into this.
pub fn base_compressor() -> Result<Compressor, ZstrongError> {
    let mut compressor = Compressor::new();
    compressor.register_function_graph(Arc::new(SerialAsNumeric))?;
    Ok(compressor)
}

/// Builds the compressor for profile `name`.
pub fn build_profile(name: &str) -> Result<Compressor, ZstrongError> {
    let mut compressor = base_compressor()?;
    let start = match name {
        STORE => standard::STORE,
        SERIAL => standard::ZSTD,
        LE_U16 => little_endian(&mut compressor, 2)?,
        LE_U32 => little_endian(&mut compressor, 4)?,
        LE_U64 => little_endian(&mut compressor, 8)?,
        NUMERIC => {
            let mut candidates = vec![standard::ZSTD];
            for width in [2, 4, 8] {
                candidates.push(little_endian(&mut compressor, width)?);
            }
            compressor.build_selector_graph(BRUTE_FORCE, &candidates, LocalParams::new())?
        }
        other => {
            return Err(ZstrongError::InvalidParameter(format!(
                "unknown profile '{}', expected one of: {}",
                other,
                PROFILES.join(", ")
            )))
        }
    };
    compressor.select_starting_graph(start)?;
    log::debug!("Built profile '{}' with starting graph {}", name, start);
    Ok(compressor)
}

/// Integers of `width` bytes: delta or not, then the generic compress selector.
fn little_endian(compressor: &mut Compressor, width: i64) -> Result<GraphId, ZstrongError> {
    let delta = compressor.build_static_graph(ids::DELTA_INT, &[standard::COMPRESS], LocalParams::new())?;
    let backend = compressor.build_selector_graph(BRUTE_FORCE, &[standard::COMPRESS, delta], LocalParams::new())?;
    compressor.build_function_graph(
        SERIAL_AS_NUMERIC,
        &[backend, standard::ZSTD],
        LocalParams::new().with_int(0, width),
    )
}

/// Loads a compressor from a file's content: a serialized descriptor, or
/// failing that, a graph document whose root becomes the starting graph.
pub fn load_compressor(bytes: &[u8]) -> Result<Compressor, ZstrongError> {
    let mut compressor = base_compressor()?;
    match compressor.deserialize(bytes) {
        Ok(()) => Ok(compressor),
        Err(ZstrongError::SerdeJson(descriptor_err)) => {
            let document: GraphDocument = serde_json::from_slice(bytes).map_err(|document_err| {
                ZstrongError::InvalidParameter(format!(
                    "neither a compressor descriptor ({}) nor a graph document ({})",
                    descriptor_err, document_err
                ))
            })?;
            let root = compressor.build_from_document(&document)?;
            compressor.select_starting_graph(root)?;
            Ok(compressor)
        }
        Err(e) => Err(e),
    }
}
