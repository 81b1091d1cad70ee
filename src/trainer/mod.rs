//! Offline training: turning selector decision points into fixed choices.
//!
//! The trainer treats the encoder as a cost oracle. For a compressor whose
//! graphs contain selector nodes, it searches combinations of successor
//! choices over a corpus, then returns a copy of the compressor in which every
//! such node is a `fixed_choice` selector. Whatever the strategy finds is
//! polished by one more coordinate-descent pass, so the result is never worse
//! than changing any single decision on its own.

mod evaluator;
mod strategies;

pub use evaluator::Evaluation;

use std::time::Instant;

use crate::config::TrainerConfig;
use crate::error::ZstrongError;
use crate::graph::{Compressor, DecisionPoint};
use crate::stream::Stream;
use evaluator::Evaluator;
use strategies::{coordinate_descent, strategy_for};

/// What training produced.
#[derive(Debug, Clone)]
pub struct TrainResult {
    /// The input compressor with every decision point fixed.
    pub compressor: Compressor,
    pub decision_points: Vec<DecisionPoint>,
    /// Cost of the chosen combination.
    pub best: Evaluation,
    /// Non-dominated (size, time) combinations among everything measured.
    pub frontier: Vec<Evaluation>,
    /// Number of distinct combinations measured.
    pub evaluated: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Trains `compressor` on `corpus`, each sample being the inputs of one `compress` call.
    ///
    /// # Errors
    /// `InvalidParameter` for an empty corpus or a negative time weight;
    /// `InvalidGraph` if no combination of choices compresses every sample.
    pub fn train(&self, compressor: &Compressor, corpus: &[Vec<Stream>]) -> Result<TrainResult, ZstrongError> {
        if corpus.is_empty() {
            return Err(ZstrongError::InvalidParameter("training needs at least one sample".to_string()));
        }
        if !(self.config.time_weight >= 0.0) {
            return Err(ZstrongError::InvalidParameter(format!(
                "time weight must be a non-negative number, got {}",
                self.config.time_weight
            )));
        }
        let started = Instant::now();
        let mut evaluator = Evaluator::new(compressor, corpus, self.config.time_weight);
        log::info!(
            "Training {} decision point(s) on {} sample(s) with the {} strategy",
            evaluator.points().len(),
            corpus.len(),
            self.config.strategy.as_str()
        );

        let strategy = strategy_for(self.config.strategy, self.config.max_candidates);
        let found = strategy.search(&mut evaluator)?;
        let weight = self.config.time_weight;
        let choices = coordinate_descent(&mut evaluator, found, &|e: &Evaluation| e.score(weight))?;

        let best = evaluator.evaluate(&choices)?.ok_or_else(|| {
            ZstrongError::InvalidGraph("no combination of choices compresses every sample".to_string())
        })?;
        let trained = evaluator.fixed(&choices)?;

        log::info!(
            "Training finished in {:?}: {} combination(s) measured, best {:?} at {} bytes",
            started.elapsed(),
            evaluator.evaluated(),
            best.choices,
            best.total_size
        );
        Ok(TrainResult {
            compressor: trained,
            decision_points: evaluator.points().to_vec(),
            best,
            frontier: evaluator.frontier(),
            evaluated: evaluator.evaluated(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::builtin::ids;
    use crate::config::TrainStrategy;
    use crate::engine::Decompressor;
    use crate::graph::{standard, LocalParams};
    use crate::selector::builtin::BRUTE_FORCE;

    // ================================================================================
    // Test Helpers
    // ================================================================================

    /// A compressor with one brute-force decision over four very different backends.
    fn trainable() -> Compressor {
        let mut compressor = Compressor::new();
        let delta = compressor
            .build_static_graph(ids::DELTA_INT, &[standard::BITPACK], LocalParams::new())
            .unwrap();
        let choose = compressor
            .build_selector_graph(
                BRUTE_FORCE,
                &[standard::STORE, standard::ZSTD, standard::BITPACK, delta],
                LocalParams::new(),
            )
            .unwrap();
        compressor.select_starting_graph(choose).unwrap();
        compressor
    }

    fn corpus() -> Vec<Vec<Stream>> {
        (1..4u32)
            .map(|step| {
                let values: Vec<u32> = (0..1000).map(|i| i * step).collect();
                vec![Stream::numeric(&values)]
            })
            .collect()
    }

    fn train_with(strategy: TrainStrategy) -> TrainResult {
        let config = TrainerConfig {
            strategy,
            ..Default::default()
        };
        Trainer::new(config).train(&trainable(), &corpus()).unwrap()
    }

    fn fixed_choice_size(choice: usize) -> u64 {
        let mut compressor = trainable();
        let graph = compressor.decision_points()[0].graph;
        compressor.fix_selector_choice(graph, choice).unwrap();
        corpus()
            .into_iter()
            .map(|sample| compressor.compress(sample).unwrap().len() as u64)
            .sum()
    }

    // ================================================================================
    // Tests
    // ================================================================================

    #[test]
    fn test_every_strategy_beats_every_fixed_choice() {
        let floor = (0..4).map(fixed_choice_size).min().unwrap();
        for strategy in [
            TrainStrategy::Greedy,
            TrainStrategy::FullSplit,
            TrainStrategy::BottomUp,
            TrainStrategy::Pareto,
        ] {
            let result = train_with(strategy);
            assert_eq!(result.best.total_size, floor, "{:?}", strategy);
            assert!(result.compressor.decision_points().is_empty());
            assert!(!result.frontier.is_empty());
            assert!(result.evaluated >= 1);
        }
    }

    #[test]
    fn test_trained_compressor_round_trips_and_serializes() {
        let result = train_with(TrainStrategy::Greedy);
        // Delta then bitpack wins on slowly increasing counters.
        assert_eq!(result.best.choices, vec![3]);

        let bytes = result.compressor.serialize().unwrap();
        let mut reloaded = Compressor::new();
        reloaded.deserialize(&bytes).unwrap();
        for sample in corpus() {
            let compressed = reloaded.compress(sample.clone()).unwrap();
            assert_eq!(compressed, result.compressor.compress(sample.clone()).unwrap());
            assert_eq!(Decompressor::new().decompress(&compressed).unwrap(), sample);
        }
    }

    #[test]
    fn test_full_split_falls_back_when_space_is_too_large() {
        let config = TrainerConfig {
            strategy: TrainStrategy::FullSplit,
            max_candidates: 2,
            ..Default::default()
        };
        let result = Trainer::new(config).train(&trainable(), &corpus()).unwrap();
        assert_eq!(result.best.choices, vec![3]);
    }

    #[test]
    fn test_no_decision_points_returns_a_copy() {
        let result = Trainer::default().train(&Compressor::new(), &corpus()).unwrap();
        assert!(result.best.choices.is_empty());
        assert_eq!(result.evaluated, 1);
    }

    #[test]
    fn test_rejects_empty_corpus() {
        assert!(matches!(
            Trainer::default().train(&trainable(), &[]),
            Err(ZstrongError::InvalidParameter(_))
        ));
    }
}
