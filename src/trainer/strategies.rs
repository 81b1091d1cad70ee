use crate::config::TrainStrategy;
use crate::error::ZstrongError;
use crate::trainer::evaluator::{Evaluation, Evaluator};

/// A way of searching the space of choice combinations.
pub(crate) trait SearchStrategy {
    /// Returns one successor index per decision point.
    fn search(&self, evaluator: &mut Evaluator<'_>) -> Result<Vec<usize>, ZstrongError>;
}

pub(crate) fn strategy_for(strategy: TrainStrategy, max_candidates: usize) -> Box<dyn SearchStrategy> {
    match strategy {
        TrainStrategy::Greedy => Box::new(GreedyStrategy),
        TrainStrategy::FullSplit => Box::new(FullSplitStrategy { max_candidates }),
        TrainStrategy::BottomUp => Box::new(BottomUpStrategy),
        TrainStrategy::Pareto => Box::new(ParetoStrategy { max_candidates }),
    }
}

/// One pass over the decision points, moving each to its best option while
/// the others stay put. A move is only taken if it strictly lowers `score`.
pub(crate) fn coordinate_descent(
    evaluator: &mut Evaluator<'_>,
    start: Vec<usize>,
    score: &dyn Fn(&Evaluation) -> f64,
) -> Result<Vec<usize>, ZstrongError> {
    let mut current = start;
    let mut current_score = evaluator
        .evaluate(&current)?
        .map_or(f64::INFINITY, |e| score(&e));
    for point in 0..evaluator.points().len() {
        let options = evaluator.points()[point].num_successors;
        for option in 0..options {
            if option == current[point] {
                continue;
            }
            let mut candidate = current.clone();
            candidate[point] = option;
            if let Some(e) = evaluator.evaluate(&candidate)? {
                let candidate_score = score(&e);
                if candidate_score < current_score {
                    current = candidate;
                    current_score = candidate_score;
                }
            }
        }
    }
    Ok(current)
}

/// Every combination in odometer order, or `None` if there are more than `limit`.
fn all_combinations(evaluator: &Evaluator<'_>, limit: usize) -> Option<Vec<Vec<usize>>> {
    let total = evaluator.search_space()?;
    if total > limit {
        return None;
    }
    let radices: Vec<usize> = evaluator.points().iter().map(|p| p.num_successors).collect();
    let mut combinations = Vec::with_capacity(total);
    let mut current = vec![0usize; radices.len()];
    for _ in 0..total {
        combinations.push(current.clone());
        for (digit, &radix) in current.iter_mut().zip(&radices) {
            *digit += 1;
            if *digit < radix {
                break;
            }
            *digit = 0;
        }
    }
    Some(combinations)
}

//==================================================================================
// --- Strategy 1: Greedy ---
//==================================================================================

pub(crate) struct GreedyStrategy;

impl SearchStrategy for GreedyStrategy {
    fn search(&self, evaluator: &mut Evaluator<'_>) -> Result<Vec<usize>, ZstrongError> {
        let weight = evaluator.time_weight();
        let start = vec![0; evaluator.points().len()];
        coordinate_descent(evaluator, start, &|e: &Evaluation| e.score(weight))
    }
}

//==================================================================================
// --- Strategy 2: Full Split ---
//==================================================================================

pub(crate) struct FullSplitStrategy {
    max_candidates: usize,
}

impl SearchStrategy for FullSplitStrategy {
    fn search(&self, evaluator: &mut Evaluator<'_>) -> Result<Vec<usize>, ZstrongError> {
        let Some(combinations) = all_combinations(evaluator, self.max_candidates) else {
            log::warn!(
                "Search space exceeds {} candidates, falling back to greedy search",
                self.max_candidates
            );
            return GreedyStrategy.search(evaluator);
        };
        let weight = evaluator.time_weight();
        let mut best: Option<Evaluation> = None;
        for choices in combinations {
            if let Some(e) = evaluator.evaluate(&choices)? {
                if best.as_ref().map_or(true, |b| e.score(weight) < b.score(weight)) {
                    best = Some(e);
                }
            }
        }
        Ok(best
            .map(|e| e.choices)
            .unwrap_or_else(|| vec![0; evaluator.points().len()]))
    }
}

//==================================================================================
// --- Strategy 3: Bottom Up ---
//==================================================================================

/// Finds the best choices for each sample on its own, then merges the
/// per-sample clusters pairwise, always taking the merge that costs least,
/// until a single cluster (and a single set of choices) remains.
pub(crate) struct BottomUpStrategy;

struct Cluster {
    samples: Vec<usize>,
    choices: Vec<usize>,
}

impl BottomUpStrategy {
    fn cost(evaluator: &mut Evaluator<'_>, choices: &[usize], samples: &[usize]) -> Result<f64, ZstrongError> {
        let weight = evaluator.time_weight();
        Ok(match evaluator.evaluate(choices)? {
            Some(e) => samples.iter().map(|&s| e.sample_score(s, weight)).sum(),
            None => f64::INFINITY,
        })
    }
}

impl SearchStrategy for BottomUpStrategy {
    fn search(&self, evaluator: &mut Evaluator<'_>) -> Result<Vec<usize>, ZstrongError> {
        let weight = evaluator.time_weight();
        let nb_points = evaluator.points().len();

        let mut clusters = Vec::with_capacity(evaluator.num_samples());
        for sample in 0..evaluator.num_samples() {
            let choices = coordinate_descent(evaluator, vec![0; nb_points], &|e: &Evaluation| {
                e.sample_score(sample, weight)
            })?;
            clusters.push(Cluster {
                samples: vec![sample],
                choices,
            });
        }

        while clusters.len() > 1 {
            // (a, b, merged choices, cost increase)
            let mut best: Option<(usize, usize, Vec<usize>, f64)> = None;
            for a in 0..clusters.len() {
                for b in a + 1..clusters.len() {
                    let union: Vec<usize> = clusters[a].samples.iter().chain(&clusters[b].samples).copied().collect();
                    let separate = Self::cost(evaluator, &clusters[a].choices, &clusters[a].samples)?
                        + Self::cost(evaluator, &clusters[b].choices, &clusters[b].samples)?;
                    let with_a = Self::cost(evaluator, &clusters[a].choices, &union)?;
                    let with_b = Self::cost(evaluator, &clusters[b].choices, &union)?;
                    let (choices, merged) = if with_b < with_a {
                        (clusters[b].choices.clone(), with_b)
                    } else {
                        (clusters[a].choices.clone(), with_a)
                    };
                    let increase = merged - separate;
                    let better = match &best {
                        None => true,
                        Some((_, _, _, current)) => increase < *current,
                    };
                    if better {
                        best = Some((a, b, choices, increase));
                    }
                }
            }
            let Some((a, b, choices, increase)) = best else {
                break;
            };
            let absorbed = clusters.remove(b);
            clusters[a].samples.extend(absorbed.samples);
            clusters[a].choices = choices;
            log::debug!(
                "Merged clusters into {} samples with choices {:?} (+{:.0})",
                clusters[a].samples.len(),
                clusters[a].choices,
                increase
            );
        }

        Ok(clusters
            .pop()
            .map(|cluster| cluster.choices)
            .unwrap_or_else(|| vec![0; nb_points]))
    }
}

//==================================================================================
// --- Strategy 4: Pareto ---
//==================================================================================

/// Explores the space (exhaustively when small enough, greedily otherwise) and
/// picks from the size/time frontier by the configured time weight.
pub(crate) struct ParetoStrategy {
    max_candidates: usize,
}

impl SearchStrategy for ParetoStrategy {
    fn search(&self, evaluator: &mut Evaluator<'_>) -> Result<Vec<usize>, ZstrongError> {
        match all_combinations(evaluator, self.max_candidates) {
            Some(combinations) => {
                for choices in combinations {
                    evaluator.evaluate(&choices)?;
                }
            }
            None => {
                GreedyStrategy.search(evaluator)?;
            }
        }
        let weight = evaluator.time_weight();
        let frontier = evaluator.frontier();
        log::debug!("Pareto frontier holds {} candidate(s)", frontier.len());
        Ok(frontier
            .into_iter()
            .min_by(|a, b| a.score(weight).total_cmp(&b.score(weight)))
            .map(|e| e.choices)
            .unwrap_or_else(|| vec![0; evaluator.points().len()]))
    }
}
