//! Selectors: encode-time decision points that pick one successor per stream.
//!
//! A selector sees the input stream and its node's local params and returns an
//! index into the node's successor list. Only the encoder runs selectors; the
//! container records the path that was taken, so the decoder never needs them.

pub mod builtin;
pub mod ml;
pub mod training;

pub use builtin::{BruteForceSelector, CompressSelector, FixedChoiceSelector};
pub use ml::{Classifier, FeatureGenerator, Features, GbtModel, MlSelector, StatsFeatureGenerator};
pub use training::{Target, TrainingSample, TrainingSelector};

use std::time::{Duration, Instant};

use crate::config::GlobalParams;
use crate::error::ZstrongError;
use crate::graph::{Compressor, GraphId, LocalParams};
use crate::stream::Stream;
use crate::types::TypeMask;

/// Name and accepted input kinds of a selector. Names are unique per compressor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorDescription {
    pub name: String,
    pub input_mask: TypeMask,
}

impl SelectorDescription {
    pub fn new(name: impl Into<String>, input_mask: TypeMask) -> Self {
        Self {
            name: name.into(),
            input_mask,
        }
    }
}

/// A successor-choosing strategy.
///
/// `select` must depend only on `input` and the node's local params so that
/// the same compressor makes the same decisions in every process.
pub trait Selector: Send + Sync {
    fn description(&self) -> SelectorDescription;

    fn select(
        &self,
        state: &SelectorState<'_>,
        input: &Stream,
        successors: &[GraphId],
    ) -> Result<usize, ZstrongError>;
}

/// Size and wall-clock cost of compressing a stream through one successor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    /// Bytes of the container the trial would have produced.
    pub size: usize,
    pub elapsed: Duration,
}

/// What a selector may inspect besides the stream itself.
pub struct SelectorState<'a> {
    compressor: &'a Compressor,
    node: GraphId,
    params: &'a LocalParams,
    successors: &'a [GraphId],
    depth: usize,
    trial: bool,
}

impl<'a> SelectorState<'a> {
    pub(crate) fn new(
        compressor: &'a Compressor,
        node: GraphId,
        params: &'a LocalParams,
        successors: &'a [GraphId],
        depth: usize,
    ) -> Self {
        Self {
            compressor,
            node,
            params,
            successors,
            depth,
            trial: false,
        }
    }

    pub(crate) fn with_trial(mut self, trial: bool) -> Self {
        self.trial = trial;
        self
    }

    pub fn node(&self) -> GraphId {
        self.node
    }

    pub fn local_params(&self) -> &LocalParams {
        self.params
    }

    pub fn global_params(&self) -> &GlobalParams {
        self.compressor.params()
    }

    /// True while the selector runs inside another selector's `try_successor`,
    /// whose output is thrown away.
    pub fn in_trial(&self) -> bool {
        self.trial
    }

    /// Compresses a copy of `input` through successor `index` in a throwaway
    /// session. The real output is not affected.
    pub fn try_successor(&self, index: usize, input: &Stream) -> Result<TrialOutcome, ZstrongError> {
        let graph = *self.successors.get(index).ok_or(ZstrongError::InvalidChoice {
            node: self.node,
            choice: index,
            available: self.successors.len(),
        })?;
        let start = Instant::now();
        let compressed = self
            .compressor
            .compress_from(graph, vec![input.clone()], self.depth + 1, true)?;
        Ok(TrialOutcome {
            size: compressed.len(),
            elapsed: start.elapsed(),
        })
    }
}
