//! Model-driven selection: features in, successor index out.
//!
//! An `MlSelector` pairs a `FeatureGenerator` with a `Classifier`. Class `i`
//! of the classifier selects successor `i`. `GbtModel` evaluates gradient
//! boosted tree forests exported from XGBoost-style boosters; training such a
//! model happens elsewhere, from the samples a `TrainingSelector` records.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ZstrongError;
use crate::graph::GraphId;
use crate::selector::{Selector, SelectorDescription, SelectorState};
use crate::stream::Stream;
use crate::types::{StreamKind, TypeMask};

/// Named feature values. Missing names evaluate as "missing" in a model.
pub type Features = BTreeMap<String, f64>;

pub trait FeatureGenerator: Send + Sync {
    fn features(&self, input: &Stream) -> Result<Features, ZstrongError>;
}

pub trait Classifier: Send + Sync {
    fn num_classes(&self) -> usize;
    fn classify(&self, features: &Features) -> Result<usize, ZstrongError>;
}

//==================================================================================
// 1. Feature generation
//==================================================================================

/// Size, cardinality and moment features.
///
/// Every stream gets `nbElts`, `eltWidth` and `cardinality`. Numeric streams
/// additionally get `range_size`, `mean`, `variance`, `stddev`, `skewness`
/// and `kurtosis`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatsFeatureGenerator;

impl FeatureGenerator for StatsFeatureGenerator {
    fn features(&self, input: &Stream) -> Result<Features, ZstrongError> {
        let mut features = Features::new();
        features.insert("nbElts".to_string(), input.len() as f64);
        features.insert("eltWidth".to_string(), input.element_width() as f64);

        let cardinality = match input.kind() {
            StreamKind::Numeric => {
                let values = input.numeric_values()?;
                add_numeric_features(&values, &mut features);
                let distinct = values.iter().collect::<HashSet<_>>().len();
                distinct
            }
            StreamKind::Serial => input.content().iter().collect::<HashSet<_>>().len(),
            StreamKind::FixedField => input.fixed_fields()?.collect::<HashSet<_>>().len(),
            StreamKind::VariableField => input.variable_fields()?.into_iter().collect::<HashSet<_>>().len(),
        };
        features.insert("cardinality".to_string(), cardinality as f64);
        Ok(features)
    }
}

fn add_numeric_features(values: &[u64], features: &mut Features) {
    let (min, max) = values
        .iter()
        .fold((u64::MAX, 0u64), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range_size = if values.is_empty() { 0 } else { max - min };
    features.insert("range_size".to_string(), range_size as f64);

    let n = values.len() as f64;
    let (mut mean, mut variance, mut skewness, mut kurtosis) = (0.0, 0.0, 0.0, 0.0);
    if !values.is_empty() {
        mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for &v in values {
            let d = v as f64 - mean;
            m2 += d * d;
            m3 += d * d * d;
            m4 += d * d * d * d;
        }
        variance = m2 / n;
        if variance > 0.0 {
            skewness = (m3 / n) / variance.powf(1.5);
            kurtosis = (m4 / n) / (variance * variance) - 3.0;
        }
    }
    features.insert("mean".to_string(), mean);
    features.insert("variance".to_string(), variance);
    features.insert("stddev".to_string(), variance.sqrt());
    features.insert("skewness".to_string(), skewness);
    features.insert("kurtosis".to_string(), kurtosis);
}

//==================================================================================
// 2. Gradient boosted trees
//==================================================================================

/// One tree in struct-of-arrays form. Node 0 is the root; a node with
/// `featureIdx == -1` is a leaf whose `value` is the tree's output. Internal
/// nodes go left when the feature is below `value`, right otherwise, and
/// follow `defaultLeft` when the feature is missing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GbtTree {
    pub feature_idx: Vec<i64>,
    pub value: Vec<f64>,
    pub left_child_idx: Vec<i64>,
    pub right_child_idx: Vec<i64>,
    pub default_left: Vec<u8>,
}

impl GbtTree {
    fn validate(&self, nb_features: usize) -> Result<(), ZstrongError> {
        let n = self.feature_idx.len();
        if n == 0
            || self.value.len() != n
            || self.left_child_idx.len() != n
            || self.right_child_idx.len() != n
            || self.default_left.len() != n
        {
            return Err(ZstrongError::InvalidParameter(
                "GBT tree arrays must be non-empty and of equal length".to_string(),
            ));
        }
        for node in 0..n {
            if self.feature_idx[node] == -1 {
                continue;
            }
            if self.feature_idx[node] < 0 || self.feature_idx[node] as usize >= nb_features {
                return Err(ZstrongError::InvalidParameter(format!(
                    "GBT node {} uses unknown feature {}",
                    node, self.feature_idx[node]
                )));
            }
            // Children strictly after their parent rules out cycles.
            for child in [self.left_child_idx[node], self.right_child_idx[node]] {
                if child <= node as i64 || child as usize >= n {
                    return Err(ZstrongError::InvalidParameter(format!(
                        "GBT node {} has invalid child {}",
                        node, child
                    )));
                }
            }
        }
        Ok(())
    }

    /// Assumes `validate` passed.
    fn evaluate(&self, features: &[f64]) -> f64 {
        let mut node = 0usize;
        loop {
            let feature = self.feature_idx[node];
            if feature == -1 {
                return self.value[node];
            }
            let x = features[feature as usize];
            let go_left = if x.is_nan() {
                self.default_left[node] != 0
            } else {
                x < self.value[node]
            };
            let next = if go_left {
                self.left_child_idx[node]
            } else {
                self.right_child_idx[node]
            };
            node = next as usize;
        }
    }
}

/// A forest per class, or a single forest for binary classification
/// (class 1 when the summed score reaches 0.5).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GbtModel {
    pub class_labels: Vec<String>,
    pub feature_labels: Vec<String>,
    pub predictor: Vec<Vec<GbtTree>>,
}

impl GbtModel {
    pub fn from_json(json: &str) -> Result<Self, ZstrongError> {
        let model: GbtModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ZstrongError> {
        let forests = self.predictor.len();
        let expected_labels = if forests <= 1 { 2 } else { forests };
        if forests == 2 || self.class_labels.len() != expected_labels {
            return Err(ZstrongError::InvalidParameter(format!(
                "GBT model with {} forests cannot label {} classes",
                forests,
                self.class_labels.len()
            )));
        }
        for tree in self.predictor.iter().flatten() {
            tree.validate(self.feature_labels.len())?;
        }
        Ok(())
    }

    pub fn label(&self, class: usize) -> Option<&str> {
        self.class_labels.get(class).map(String::as_str)
    }

    fn predict(&self, features: &[f64]) -> usize {
        let scores: Vec<f64> = self
            .predictor
            .iter()
            .map(|forest| forest.iter().map(|tree| tree.evaluate(features)).sum())
            .collect();
        match scores.as_slice() {
            [] => 0,
            [score] => usize::from(*score >= 0.5),
            _ => scores
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, &s)| if s > best.1 { (i, s) } else { best })
                .0,
        }
    }
}

impl Classifier for GbtModel {
    fn num_classes(&self) -> usize {
        self.class_labels.len()
    }

    fn classify(&self, features: &Features) -> Result<usize, ZstrongError> {
        let ordered: Vec<f64> = self
            .feature_labels
            .iter()
            .map(|label| features.get(label).copied().unwrap_or(f64::NAN))
            .collect();
        Ok(self.predict(&ordered))
    }
}

//==================================================================================
// 3. Selector
//==================================================================================

pub struct MlSelector {
    name: String,
    input_mask: TypeMask,
    features: Arc<dyn FeatureGenerator>,
    classifier: Arc<dyn Classifier>,
}

impl MlSelector {
    pub fn new(
        name: impl Into<String>,
        input_mask: TypeMask,
        features: Arc<dyn FeatureGenerator>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            name: name.into(),
            input_mask,
            features,
            classifier,
        }
    }
}

impl Selector for MlSelector {
    fn description(&self) -> SelectorDescription {
        SelectorDescription::new(self.name.clone(), self.input_mask)
    }

    fn select(
        &self,
        state: &SelectorState<'_>,
        input: &Stream,
        successors: &[GraphId],
    ) -> Result<usize, ZstrongError> {
        if self.classifier.num_classes() != successors.len() {
            return Err(ZstrongError::InvalidParameter(format!(
                "selector '{}' classifies into {} classes but node {} has {} successors",
                self.name,
                self.classifier.num_classes(),
                state.node(),
                successors.len()
            )));
        }
        let features = self.features.features(input)?;
        self.classifier.classify(&features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: i64, threshold: f64, left: f64, right: f64) -> GbtTree {
        GbtTree {
            feature_idx: vec![feature, -1, -1],
            value: vec![threshold, left, right],
            left_child_idx: vec![1, 0, 0],
            right_child_idx: vec![2, 0, 0],
            default_left: vec![1, 0, 0],
        }
    }

    #[test]
    fn test_binary_model_thresholds_at_half() {
        let model = GbtModel {
            class_labels: vec!["0".into(), "1".into()],
            feature_labels: vec!["nbElts".into()],
            predictor: vec![vec![stump(0, 100.0, 0.1, 0.9)]],
        };
        model.validate().unwrap();
        let mut features = Features::new();
        features.insert("nbElts".into(), 10.0);
        assert_eq!(model.classify(&features).unwrap(), 0);
        features.insert("nbElts".into(), 1000.0);
        assert_eq!(model.classify(&features).unwrap(), 1);
        // Missing feature follows defaultLeft.
        assert_eq!(model.classify(&Features::new()).unwrap(), 0);
    }

    #[test]
    fn test_multiclass_argmax() {
        let model = GbtModel {
            class_labels: vec!["a".into(), "b".into(), "c".into()],
            feature_labels: vec!["x".into()],
            predictor: vec![
                vec![stump(0, 5.0, 1.0, 0.0)],
                vec![stump(0, 5.0, 0.0, 0.5)],
                vec![stump(0, 50.0, 0.0, 2.0)],
            ],
        };
        model.validate().unwrap();
        let at = |x: f64| {
            let mut f = Features::new();
            f.insert("x".into(), x);
            model.classify(&f).unwrap()
        };
        assert_eq!(at(1.0), 0);
        assert_eq!(at(10.0), 1);
        assert_eq!(at(100.0), 2);
        assert_eq!(model.label(2), Some("c"));
    }

    #[test]
    fn test_model_json_uses_camel_case() {
        let json = r#"{
            "classLabels": ["0", "1"],
            "featureLabels": ["cardinality"],
            "predictor": [[{
                "featureIdx": [0, -1, -1],
                "value": [3.5, 0.0, 1.0],
                "leftChildIdx": [1, -1, -1],
                "rightChildIdx": [2, -1, -1],
                "defaultLeft": [1, 0, 0]
            }]]
        }"#;
        let model = GbtModel::from_json(json).unwrap();
        let mut f = Features::new();
        f.insert("cardinality".into(), 7.0);
        assert_eq!(model.classify(&f).unwrap(), 1);
    }

    #[test]
    fn test_cyclic_tree_is_rejected() {
        let mut tree = stump(0, 1.0, 0.0, 1.0);
        tree.left_child_idx[0] = 0;
        let model = GbtModel {
            class_labels: vec!["0".into(), "1".into()],
            feature_labels: vec!["x".into()],
            predictor: vec![vec![tree]],
        };
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_stats_features() {
        let stream = Stream::numeric(&[1u32, 1, 2, 10]);
        let features = StatsFeatureGenerator.features(&stream).unwrap();
        assert_eq!(features["nbElts"], 4.0);
        assert_eq!(features["eltWidth"], 4.0);
        assert_eq!(features["cardinality"], 3.0);
        assert_eq!(features["range_size"], 9.0);
        assert_eq!(features["mean"], 3.5);

        let strings = Stream::from_fields(["a", "b", "a"]).unwrap();
        let features = StatsFeatureGenerator.features(&strings).unwrap();
        assert_eq!(features["cardinality"], 2.0);
        assert!(!features.contains_key("mean"));
    }
}
