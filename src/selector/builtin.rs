//! Selectors every compressor registers at construction.

use crate::error::ZstrongError;
use crate::graph::GraphId;
use crate::selector::{Selector, SelectorDescription, SelectorState};
use crate::stream::Stream;
use crate::types::{StreamKind, TypeMask};

pub const COMPRESS: &str = "compress";
pub const FIXED_CHOICE: &str = "fixed_choice";
pub const BRUTE_FORCE: &str = "brute_force";

//==================================================================================
// 1. Generic compress
//==================================================================================

/// Picks a backend from the shape of the stream. Expects its successors in the
/// order `[constant, zstd, bitpack, string]`, the layout of the standard
/// `COMPRESS` graph:
/// - variable-field streams go to `string`;
/// - non-empty constant streams go to `constant`;
/// - numeric streams go to whichever of `zstd` and `bitpack` is smaller;
/// - everything else goes to `zstd`.
#[derive(Debug, Default)]
pub struct CompressSelector;

impl CompressSelector {
    const CONSTANT: usize = 0;
    const ZSTD: usize = 1;
    const BITPACK: usize = 2;
    const STRING: usize = 3;
    const NUM_SUCCESSORS: usize = 4;
}

impl Selector for CompressSelector {
    fn description(&self) -> SelectorDescription {
        SelectorDescription::new(COMPRESS, TypeMask::ANY)
    }

    fn select(
        &self,
        state: &SelectorState<'_>,
        input: &Stream,
        successors: &[GraphId],
    ) -> Result<usize, ZstrongError> {
        if successors.len() != Self::NUM_SUCCESSORS {
            return Err(ZstrongError::InvalidParameter(format!(
                "selector '{}' at node {} needs {} successors [constant, zstd, bitpack, string] but has {}",
                COMPRESS,
                state.node(),
                Self::NUM_SUCCESSORS,
                successors.len()
            )));
        }
        if input.kind() == StreamKind::VariableField {
            return Ok(Self::STRING);
        }
        if input.constant_element().is_some() {
            return Ok(Self::CONSTANT);
        }
        if input.kind() == StreamKind::Numeric && !input.is_empty() {
            let zstd = state.try_successor(Self::ZSTD, input)?;
            let bitpack = state.try_successor(Self::BITPACK, input)?;
            if bitpack.size < zstd.size {
                return Ok(Self::BITPACK);
            }
        }
        Ok(Self::ZSTD)
    }
}

//==================================================================================
// 2. Fixed choice
//==================================================================================

/// Always returns int param 0. This is how trained decisions are baked into a compressor.
#[derive(Debug, Default)]
pub struct FixedChoiceSelector;

impl Selector for FixedChoiceSelector {
    fn description(&self) -> SelectorDescription {
        SelectorDescription::new(FIXED_CHOICE, TypeMask::ANY)
    }

    fn select(
        &self,
        state: &SelectorState<'_>,
        _input: &Stream,
        _successors: &[GraphId],
    ) -> Result<usize, ZstrongError> {
        let choice = state.local_params().int(0).ok_or_else(|| {
            ZstrongError::InvalidParameter("fixed_choice needs int param 0 (successor index)".to_string())
        })?;
        usize::try_from(choice)
            .map_err(|_| ZstrongError::InvalidParameter(format!("negative successor index {}", choice)))
    }
}

//==================================================================================
// 3. Brute force
//==================================================================================

/// Trial-compresses the stream through every successor and keeps the smallest.
/// Ties go to the lower index. Successors that fail are skipped.
#[derive(Debug, Default)]
pub struct BruteForceSelector;

impl Selector for BruteForceSelector {
    fn description(&self) -> SelectorDescription {
        SelectorDescription::new(BRUTE_FORCE, TypeMask::ANY)
    }

    fn select(
        &self,
        state: &SelectorState<'_>,
        input: &Stream,
        successors: &[GraphId],
    ) -> Result<usize, ZstrongError> {
        let mut best: Option<(usize, usize)> = None;
        for index in 0..successors.len() {
            match state.try_successor(index, input) {
                Ok(trial) => {
                    if best.map_or(true, |(_, size)| trial.size < size) {
                        best = Some((index, trial.size));
                    }
                }
                Err(e) => log::debug!("brute_force: successor {} rejected the input: {}", successors[index], e),
            }
        }
        best.map(|(index, _)| index).ok_or_else(|| {
            ZstrongError::InvalidGraph(format!(
                "no successor of selector node {} could compress a {} stream",
                state.node(),
                input.kind()
            ))
        })
    }
}
