//! A selector wrapper that records what every successor would have cost.
//!
//! The records feed offline model training (see `ml`). They are a side
//! channel: the wrapped selector still makes the real decision. Only the real
//! compression path is recorded, never the trial sessions of an enclosing
//! selector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ZstrongError;
use crate::graph::GraphId;
use crate::selector::ml::FeatureGenerator;
use crate::selector::{Selector, SelectorDescription, SelectorState};
use crate::stream::Stream;

/// Measured cost of one successor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Target {
    pub size: u64,
    /// Compression time in seconds.
    pub ctime: f64,
}

/// One observation: the input's features and the cost per successor label.
///
/// Labels are successor indices rendered as strings, matching the class labels
/// an `MlSelector` expects.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TrainingSample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Vec<u8>>,
    pub features: BTreeMap<String, f64>,
    pub targets: BTreeMap<String, Target>,
}

impl TrainingSample {
    /// The cheapest label by size, if any successor succeeded.
    pub fn best_label(&self) -> Option<&str> {
        self.targets
            .iter()
            .min_by_key(|(_, target)| target.size)
            .map(|(label, _)| label.as_str())
    }
}

pub struct TrainingSelector {
    inner: Arc<dyn Selector>,
    features: Arc<dyn FeatureGenerator>,
    keep_raw_data: bool,
    log: Mutex<Vec<TrainingSample>>,
}

impl TrainingSelector {
    pub fn new(inner: Arc<dyn Selector>, features: Arc<dyn FeatureGenerator>) -> Self {
        Self {
            inner,
            features,
            keep_raw_data: false,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Also stores a copy of every input's content in the samples.
    pub fn with_raw_data(mut self) -> Self {
        self.keep_raw_data = true;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<TrainingSample>>, ZstrongError> {
        self.log
            .lock()
            .map_err(|_| ZstrongError::InternalError("training log mutex poisoned".to_string()))
    }

    pub fn samples(&self) -> Result<Vec<TrainingSample>, ZstrongError> {
        Ok(self.lock()?.clone())
    }

    /// Drains the log.
    pub fn take_samples(&self) -> Result<Vec<TrainingSample>, ZstrongError> {
        Ok(std::mem::take(&mut *self.lock()?))
    }

    pub fn export_json(&self) -> Result<String, ZstrongError> {
        Ok(serde_json::to_string_pretty(&*self.lock()?)?)
    }
}

impl Selector for TrainingSelector {
    /// Same identity as the wrapped selector, so it can stand in for it.
    fn description(&self) -> SelectorDescription {
        self.inner.description()
    }

    fn select(
        &self,
        state: &SelectorState<'_>,
        input: &Stream,
        successors: &[GraphId],
    ) -> Result<usize, ZstrongError> {
        // Trial sessions of an enclosing selector would log inputs that never
        // reach the real output.
        if state.in_trial() {
            return self.inner.select(state, input, successors);
        }

        let mut targets = BTreeMap::new();
        for index in 0..successors.len() {
            match state.try_successor(index, input) {
                Ok(trial) => {
                    targets.insert(
                        index.to_string(),
                        Target {
                            size: trial.size as u64,
                            ctime: trial.elapsed.as_secs_f64(),
                        },
                    );
                }
                Err(e) => log::debug!("training: successor {} failed: {}", successors[index], e),
            }
        }

        let sample = TrainingSample {
            raw_data: self.keep_raw_data.then(|| input.content().to_vec()),
            features: self.features.features(input)?,
            targets,
        };
        self.lock()?.push(sample);

        self.inner.select(state, input, successors)
    }
}
