//! The cost oracle: compresses the corpus with a given set of fixed choices.
//!
//! Every combination is measured at most once. Sizes are deterministic, times
//! are not, so caching also keeps the ranking of a combination stable for the
//! whole run.

use hashbrown::HashMap;
use std::time::{Duration, Instant};

use crate::error::ZstrongError;
use crate::graph::{Compressor, DecisionPoint};
use crate::stream::Stream;

/// The measured cost of one combination of choices over the whole corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// One successor index per decision point, in `Compressor::decision_points` order.
    pub choices: Vec<usize>,
    pub total_size: u64,
    pub total_time: Duration,
    pub sample_sizes: Vec<u64>,
    pub sample_times: Vec<Duration>,
}

impl Evaluation {
    /// Bytes plus `time_weight` bytes per microsecond of compression time.
    pub fn score(&self, time_weight: f64) -> f64 {
        cost(self.total_size, self.total_time, time_weight)
    }

    pub fn sample_score(&self, sample: usize, time_weight: f64) -> f64 {
        match (self.sample_sizes.get(sample), self.sample_times.get(sample)) {
            (Some(&size), Some(&time)) => cost(size, time, time_weight),
            _ => f64::INFINITY,
        }
    }

    fn dominates(&self, other: &Evaluation) -> bool {
        self.total_size <= other.total_size
            && self.total_time <= other.total_time
            && (self.total_size < other.total_size || self.total_time < other.total_time)
    }
}

fn cost(size: u64, time: Duration, time_weight: f64) -> f64 {
    size as f64 + time_weight * time.as_secs_f64() * 1e6
}

pub(crate) struct Evaluator<'a> {
    base: &'a Compressor,
    points: Vec<DecisionPoint>,
    corpus: &'a [Vec<Stream>],
    time_weight: f64,
    /// `None` marks a combination that failed on at least one sample.
    cache: HashMap<Vec<usize>, Option<Evaluation>>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(base: &'a Compressor, corpus: &'a [Vec<Stream>], time_weight: f64) -> Self {
        Self {
            base,
            points: base.decision_points(),
            corpus,
            time_weight,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn points(&self) -> &[DecisionPoint] {
        &self.points
    }

    pub(crate) fn num_samples(&self) -> usize {
        self.corpus.len()
    }

    pub(crate) fn time_weight(&self) -> f64 {
        self.time_weight
    }

    /// Total number of combinations, or `None` if it overflows.
    pub(crate) fn search_space(&self) -> Option<usize> {
        self.points
            .iter()
            .try_fold(1usize, |acc, point| acc.checked_mul(point.num_successors))
    }

    /// A copy of the base compressor with every decision point fixed.
    pub(crate) fn fixed(&self, choices: &[usize]) -> Result<Compressor, ZstrongError> {
        if choices.len() != self.points.len() {
            return Err(ZstrongError::InternalError(format!(
                "{} choices for {} decision points",
                choices.len(),
                self.points.len()
            )));
        }
        let mut compressor = self.base.clone();
        for (point, &choice) in self.points.iter().zip(choices) {
            compressor.fix_selector_choice(point.graph, choice)?;
        }
        Ok(compressor)
    }

    /// Measures `choices`, returning `None` if some sample fails to compress.
    pub(crate) fn evaluate(&mut self, choices: &[usize]) -> Result<Option<Evaluation>, ZstrongError> {
        if let Some(hit) = self.cache.get(choices) {
            return Ok(hit.clone());
        }
        let compressor = self.fixed(choices)?;

        let mut sample_sizes = Vec::with_capacity(self.corpus.len());
        let mut sample_times = Vec::with_capacity(self.corpus.len());
        let mut feasible = true;
        for (i, sample) in self.corpus.iter().enumerate() {
            let start = Instant::now();
            match compressor.compress(sample.clone()) {
                Ok(bytes) => {
                    sample_times.push(start.elapsed());
                    sample_sizes.push(bytes.len() as u64);
                }
                Err(e) => {
                    log::debug!("Choices {:?} fail on sample {}: {}", choices, i, e);
                    feasible = false;
                    break;
                }
            }
        }

        let evaluation = feasible.then(|| Evaluation {
            choices: choices.to_vec(),
            total_size: sample_sizes.iter().sum(),
            total_time: sample_times.iter().sum(),
            sample_sizes,
            sample_times,
        });
        if let Some(e) = &evaluation {
            log_metric!(
                "event" = "train_eval",
                "choices" = format!("{:?}", choices),
                "size" = e.total_size,
                "time_us" = e.total_time.as_micros()
            );
        }
        self.cache.insert(choices.to_vec(), evaluation.clone());
        Ok(evaluation)
    }

    pub(crate) fn evaluated(&self) -> usize {
        self.cache.len()
    }

    /// The non-dominated evaluations over (total size, total time), by size.
    pub(crate) fn frontier(&self) -> Vec<Evaluation> {
        let feasible: Vec<&Evaluation> = self.cache.values().flatten().collect();
        let mut frontier: Vec<Evaluation> = feasible
            .iter()
            .filter(|candidate| !feasible.iter().any(|other| other.dominates(candidate)))
            .map(|e| (*e).clone())
            .collect();
        frontier.sort_by(|a, b| {
            a.total_size
                .cmp(&b.total_size)
                .then(a.total_time.cmp(&b.total_time))
                .then(a.choices.cmp(&b.choices))
        });
        frontier
    }
}
