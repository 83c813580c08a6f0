//! Native tree-ensemble models (random forest, gradient boosting).
//!
//! Exported by the training pipeline as JSON:
//!
//! ```json
//! {
//!   "n_features": 22,
//!   "output": "logit_sum",
//!   "base_score": -0.4,
//!   "trees": [{"nodes": [
//!     {"feature": 17, "threshold": 0.8, "left": 1, "right": 2, "value": 0.02},
//!     {"value": -0.3},
//!     {"value": 0.9}
//!   ]}],
//!   "feature_importances": [0.01, ...]
//! }
//! ```
//!
//! A split sends `x[feature] <= threshold` left. Split nodes carry the mean
//! output of the samples that reached them, which the path attribution needs.

use crate::error::{ServingError, ServingResult};
use crate::models::explain::ExplainError;
use crate::models::model::{Attribution, ChurnModel, ModelCapabilities};
use serde::Deserialize;
use std::path::Path;

/// How per-tree outputs combine into a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleOutput {
    /// Leaves hold P(churn); the ensemble averages them (random forest).
    ProbabilityMean,
    /// Leaves hold log-odds increments summed onto `base_score` (boosting).
    LogitSum,
    /// Unbounded regression output; no probability available.
    RawScore,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawNode")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        value: f64,
    },
    Leaf {
        value: f64,
    },
}

/// Node as written in the file. A split names all four split keys, a leaf
/// names none of them.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode {
    feature: Option<usize>,
    threshold: Option<f64>,
    left: Option<usize>,
    right: Option<usize>,
    value: f64,
}

impl TryFrom<RawNode> for TreeNode {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        match (raw.feature, raw.threshold, raw.left, raw.right) {
            (Some(feature), Some(threshold), Some(left), Some(right)) => Ok(TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                value: raw.value,
            }),
            (None, None, None, None) => Ok(TreeNode::Leaf { value: raw.value }),
            _ => Err(
                "split node needs all of feature, threshold, left and right".to_string(),
            ),
        }
    }
}

impl TreeNode {
    fn value(&self) -> f64 {
        match self {
            TreeNode::Split { value, .. } | TreeNode::Leaf { value } => *value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Follow `features` from the root to a leaf, calling `on_step(parent, child)`
    /// for every edge taken. Returns the leaf value.
    fn descend(&self, features: &[f64], mut on_step: impl FnMut(&TreeNode, &TreeNode)) -> f64 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let next = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                    on_step(node, &self.nodes[next]);
                    idx = next;
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct EnsembleFile {
    n_features: usize,
    output: EnsembleOutput,
    #[serde(default)]
    base_score: f64,
    trees: Vec<Tree>,
    #[serde(default)]
    feature_importances: Option<Vec<f64>>,
}

/// Loaded tree ensemble
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    name: String,
    n_features: usize,
    output: EnsembleOutput,
    base_score: f64,
    trees: Vec<Tree>,
    importances: Vec<f64>,
}

impl TreeEnsemble {
    /// Load and validate an ensemble file.
    pub fn load<P: AsRef<Path>>(name: &str, path: P) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| e.to_string())?;
        Self::from_json(name, &raw)
    }

    pub fn from_json(name: &str, raw: &str) -> Result<Self, String> {
        let file: EnsembleFile = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        validate(&file)?;

        let importances = match file.feature_importances {
            Some(importances) => importances,
            None => split_frequency(&file.trees, file.n_features),
        };

        Ok(Self {
            name: name.to_string(),
            n_features: file.n_features,
            output: file.output,
            base_score: file.base_score,
            trees: file.trees,
            importances,
        })
    }

    pub fn output(&self) -> EnsembleOutput {
        self.output
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn check_input(&self, features: &[f64]) -> ServingResult<()> {
        if features.len() != self.n_features {
            return Err(ServingError::FeatureMismatch(format!(
                "model {} expects {} features, got {}",
                self.name,
                self.n_features,
                features.len()
            )));
        }
        Ok(())
    }

    fn leaf_sum(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .map(|tree| tree.descend(features, |_, _| {}))
            .sum()
    }
}

impl ChurnModel for TreeEnsemble {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ModelCapabilities {
        let scores_probability = self.output != EnsembleOutput::RawScore;
        ModelCapabilities {
            probability: scores_probability,
            feature_importances: true,
            attribution: scores_probability,
        }
    }

    fn predict_proba(&self, features: &[f64]) -> ServingResult<f64> {
        self.check_input(features)?;
        match self.output {
            EnsembleOutput::ProbabilityMean => {
                let mean = self.leaf_sum(features) / self.trees.len() as f64;
                Ok(mean.clamp(0.0, 1.0))
            }
            EnsembleOutput::LogitSum => Ok(sigmoid(self.base_score + self.leaf_sum(features))),
            EnsembleOutput::RawScore => Err(ServingError::Inference(format!(
                "model {} has no probability output",
                self.name
            ))),
        }
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        Some(self.importances.clone())
    }

    /// Path decomposition: every split on the decision path credits its
    /// feature with the change in node value it caused. Contributions plus the
    /// root values add up to the raw ensemble output.
    fn attribution(&self, features: &[f64]) -> Result<Attribution, ExplainError> {
        if features.len() != self.n_features {
            return Err(ExplainError::LengthMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        let mut contributions = vec![0.0; self.n_features];
        for tree in &self.trees {
            tree.descend(features, |parent, child| {
                if let TreeNode::Split { feature, .. } = parent {
                    contributions[*feature] += child.value() - parent.value();
                }
            });
        }

        match self.output {
            EnsembleOutput::ProbabilityMean => {
                let n_trees = self.trees.len() as f64;
                let positive: Vec<f64> = contributions.iter().map(|c| c / n_trees).collect();
                let negative = positive.iter().map(|c| -c).collect();
                Ok(Attribution::PerClass(vec![negative, positive]))
            }
            EnsembleOutput::LogitSum => Ok(Attribution::Single(contributions)),
            EnsembleOutput::RawScore => Err(ExplainError::Unsupported),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn validate(file: &EnsembleFile) -> Result<(), String> {
    if file.n_features == 0 {
        return Err("ensemble declares zero features".to_string());
    }
    if file.trees.is_empty() {
        return Err("ensemble has no trees".to_string());
    }
    if !file.base_score.is_finite() {
        return Err("base_score is not finite".to_string());
    }
    for (t, tree) in file.trees.iter().enumerate() {
        if tree.nodes.is_empty() {
            return Err(format!("tree {t} has no nodes"));
        }
        for (i, node) in tree.nodes.iter().enumerate() {
            if !node.value().is_finite() {
                return Err(format!("tree {t} node {i} has a non-finite value"));
            }
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } = node
            {
                if *feature >= file.n_features {
                    return Err(format!(
                        "tree {t} node {i} splits on feature {feature}, only {} declared",
                        file.n_features
                    ));
                }
                if threshold.is_nan() {
                    return Err(format!("tree {t} node {i} has a NaN threshold"));
                }
                // children must come later so every descent terminates
                for child in [*left, *right] {
                    if child <= i || child >= tree.nodes.len() {
                        return Err(format!(
                            "tree {t} node {i} has invalid child index {child}"
                        ));
                    }
                }
            }
        }
    }
    if let Some(importances) = &file.feature_importances {
        if importances.len() != file.n_features {
            return Err(format!(
                "{} feature importances for {} features",
                importances.len(),
                file.n_features
            ));
        }
    }
    Ok(())
}

/// Normalized split counts, used when the export carries no importances.
fn split_frequency(trees: &[Tree], n_features: usize) -> Vec<f64> {
    let mut counts = vec![0.0; n_features];
    for node in trees.iter().flat_map(|t| &t.nodes) {
        if let TreeNode::Split { feature, .. } = node {
            counts[*feature] += 1.0;
        }
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        counts.iter_mut().for_each(|c| *c /= total);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOREST: &str = r#"{
        "n_features": 2,
        "output": "probability_mean",
        "trees": [
            {"nodes": [
                {"feature": 0, "threshold": 0.0, "left": 1, "right": 2, "value": 0.5},
                {"value": 0.2},
                {"value": 0.8}
            ]},
            {"nodes": [
                {"feature": 1, "threshold": 1.5, "left": 1, "right": 2, "value": 0.4},
                {"value": 0.1},
                {"feature": 0, "threshold": 2.0, "left": 3, "right": 4, "value": 0.7},
                {"value": 0.6},
                {"value": 1.0}
            ]}
        ]
    }"#;

    const BOOSTED: &str = r#"{
        "n_features": 2,
        "output": "logit_sum",
        "base_score": -0.5,
        "trees": [
            {"nodes": [
                {"feature": 1, "threshold": 10.0, "left": 1, "right": 2, "value": 0.1},
                {"value": -0.4},
                {"value": 1.2}
            ]}
        ],
        "feature_importances": [0.25, 0.75]
    }"#;

    #[test]
    fn test_forest_probability_is_mean_of_leaves() {
        let forest = TreeEnsemble::from_json("random_forest", FOREST).unwrap();
        // tree 1 -> 0.8, tree 2 -> right then right -> 1.0
        let p = forest.predict_proba(&[3.0, 2.0]).unwrap();
        assert!((p - 0.9).abs() < 1e-12);
        // tree 1 -> 0.2, tree 2 -> 0.1
        let p = forest.predict_proba(&[-1.0, 0.0]).unwrap();
        assert!((p - 0.15).abs() < 1e-12);
        assert_eq!(forest.predict(&[3.0, 2.0]).unwrap(), 1);
    }

    #[test]
    fn test_boosted_probability_is_sigmoid_of_margin() {
        let model = TreeEnsemble::from_json("gradient_boosting", BOOSTED).unwrap();
        let p = model.predict_proba(&[0.0, 20.0]).unwrap();
        assert!((p - sigmoid(0.7)).abs() < 1e-12);
        assert_eq!(model.feature_importances(), Some(vec![0.25, 0.75]));
    }

    #[test]
    fn test_forest_attribution_adds_up() {
        let forest = TreeEnsemble::from_json("random_forest", FOREST).unwrap();
        let x = [3.0, 2.0];
        let positive = forest
            .attribution(&x)
            .unwrap()
            .into_positive_class()
            .unwrap();
        let bias = (0.5 + 0.4) / 2.0;
        let total: f64 = bias + positive.iter().sum::<f64>();
        assert!((total - forest.predict_proba(&x).unwrap()).abs() < 1e-12);
        // feature 0: (0.8-0.5) + (1.0-0.7) = 0.6 over two trees
        assert!((positive[0] - 0.3).abs() < 1e-12);
        assert!((positive[1] - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_forest_attribution_has_one_vector_per_class() {
        let forest = TreeEnsemble::from_json("random_forest", FOREST).unwrap();
        match forest.attribution(&[3.0, 2.0]).unwrap() {
            Attribution::PerClass(per_class) => {
                assert_eq!(per_class.len(), 2);
                assert_eq!(per_class[0][0], -per_class[1][0]);
            }
            other => panic!("expected per-class attribution, got {other:?}"),
        }
    }

    #[test]
    fn test_boosted_attribution_in_margin_space() {
        let model = TreeEnsemble::from_json("gradient_boosting", BOOSTED).unwrap();
        match model.attribution(&[0.0, 20.0]).unwrap() {
            Attribution::Single(values) => {
                assert_eq!(values[0], 0.0);
                assert!((values[1] - 1.1).abs() < 1e-12);
            }
            other => panic!("expected single attribution, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_score_has_no_probability() {
        let raw = BOOSTED.replace("logit_sum", "raw_score");
        let model = TreeEnsemble::from_json("regressor", &raw).unwrap();
        assert!(!model.capabilities().probability);
        assert!(model.predict_proba(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_wrong_input_length() {
        let model = TreeEnsemble::from_json("gradient_boosting", BOOSTED).unwrap();
        assert!(matches!(
            model.predict_proba(&[1.0]),
            Err(ServingError::FeatureMismatch(_))
        ));
        assert!(matches!(
            model.attribution(&[1.0, 2.0, 3.0]),
            Err(ExplainError::LengthMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_validation_rejects_malformed_trees() {
        let backwards = r#"{"n_features": 1, "output": "logit_sum", "trees": [{"nodes": [
            {"feature": 0, "threshold": 0.0, "left": 0, "right": 1, "value": 0.0},
            {"value": 1.0}
        ]}]}"#;
        assert!(TreeEnsemble::from_json("m", backwards)
            .unwrap_err()
            .contains("invalid child index 0"));

        let bad_feature = BOOSTED.replace(r#""feature": 1"#, r#""feature": 5"#);
        assert!(TreeEnsemble::from_json("m", &bad_feature).is_err());

        let no_trees = r#"{"n_features": 2, "output": "logit_sum", "trees": []}"#;
        assert!(TreeEnsemble::from_json("m", no_trees).is_err());

        let bad_importances = BOOSTED.replace("[0.25, 0.75]", "[1.0]");
        assert!(TreeEnsemble::from_json("m", &bad_importances).is_err());

        assert!(TreeEnsemble::from_json("m", "{").is_err());
    }

    #[test]
    fn test_misspelled_split_is_not_read_as_leaf() {
        let typo = BOOSTED.replace(r#""left": 1"#, r#""lft": 1"#);
        let err = TreeEnsemble::from_json("m", &typo).unwrap_err();
        assert!(err.contains("lft"), "{err}");

        let partial = BOOSTED.replace(r#", "right": 2"#, "");
        let err = TreeEnsemble::from_json("m", &partial).unwrap_err();
        assert!(err.contains("split node needs"), "{err}");

        let leaf_with_extra = BOOSTED.replace(r#"{"value": 1.2}"#, r#"{"value": 1.2, "left": 0}"#);
        assert!(TreeEnsemble::from_json("m", &leaf_with_extra).is_err());
    }

    #[test]
    fn test_importances_default_to_split_frequency() {
        let forest = TreeEnsemble::from_json("random_forest", FOREST).unwrap();
        let importances = forest.feature_importances().unwrap();
        assert!((importances[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((importances[1] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(forest.tree_count(), 2);
    }
}
