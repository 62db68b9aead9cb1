//! Random forest of gini decision trees

use super::classifier::{check_shapes, Classifier};
use crate::error::{PipelineError, Result};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Strategy for features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            Self::Sqrt => (n_features as f64).sqrt().round() as usize,
            Self::Log2 => (n_features as f64).log2().round() as usize,
            Self::All => n_features,
            Self::Fixed(n) => *n,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 250,
            max_depth: None,
            min_samples_split: 2,
            max_features: MaxFeatures::Sqrt,
            seed: 42,
        }
    }
}

/// Tree nodes live in a flat arena so persisted models stay shallow JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn distribution(&self, row: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { distribution } => return distribution,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row.get(*feature).copied().unwrap_or(0.0) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [usize],
    n_classes: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: usize,
    importances: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn class_counts(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &i in indices {
            counts[self.labels[i]] += 1.0;
        }
        counts
    }

    /// Grows the subtree for `indices` into `tree`; returns its root position
    fn build(&mut self, tree: &mut DecisionTree, indices: &[usize], depth: usize, rng: &mut StdRng) -> usize {
        let counts = self.class_counts(indices);
        let n = indices.len() as f64;
        let impurity = gini(&counts, n);

        let should_stop = indices.len() < self.min_samples_split
            || impurity <= 0.0
            || self.max_depth.map_or(false, |d| depth >= d);

        let split = if should_stop {
            None
        } else {
            self.best_split(indices, impurity, rng)
        };

        let position = tree.nodes.len();
        match split {
            Some((feature, threshold, gain)) => {
                self.importances[feature] += n * gain;
                let (left, right): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.features[i][feature] <= threshold);

                tree.nodes.push(TreeNode::Leaf {
                    distribution: Vec::new(),
                });
                let left = self.build(tree, &left, depth + 1, rng);
                let right = self.build(tree, &right, depth + 1, rng);
                tree.nodes[position] = TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                };
            }
            None => tree.nodes.push(TreeNode::Leaf {
                distribution: counts.iter().map(|c| c / n).collect(),
            }),
        }
        position
    }

    /// Best (feature, threshold, impurity decrease) over a random feature subset.
    ///
    /// Features constant within the node do not count towards `max_features`.
    fn best_split(&self, indices: &[usize], parent_impurity: f64, rng: &mut StdRng) -> Option<(usize, f64, f64)> {
        let n_features = self.features.first().map_or(0, |row| row.len());
        let mut candidates: Vec<usize> = (0..n_features).collect();
        candidates.shuffle(rng);

        let n = indices.len() as f64;
        let total = self.class_counts(indices);
        let mut best: Option<(usize, f64, f64)> = None;
        let mut visited = 0;

        for feature in candidates {
            if visited >= self.max_features {
                break;
            }
            let mut sorted: Vec<usize> = indices.to_vec();
            sorted.sort_by(|&a, &b| self.features[a][feature].total_cmp(&self.features[b][feature]));
            let first = self.features[sorted[0]][feature];
            let last = self.features[sorted[sorted.len() - 1]][feature];
            if first == last {
                continue;
            }
            visited += 1;

            let mut left = vec![0.0; self.n_classes];
            for position in 0..sorted.len() - 1 {
                let row = sorted[position];
                left[self.labels[row]] += 1.0;

                let value = self.features[row][feature];
                let next = self.features[sorted[position + 1]][feature];
                if value == next {
                    continue;
                }

                let left_n = (position + 1) as f64;
                let right_n = n - left_n;
                let right: Vec<f64> = total.iter().zip(left.iter()).map(|(t, l)| t - l).collect();
                let weighted = (left_n * gini(&left, left_n) + right_n * gini(&right, right_n)) / n;
                let gain = parent_impurity - weighted;

                if gain > best.map_or(0.0, |b| b.2) {
                    best = Some((feature, (value + next) / 2.0, gain));
                }
            }
        }

        best
    }
}

fn gini(counts: &[f64], n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / n).powi(2)).sum::<f64>()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
    importances: Vec<f64>,
}

impl Classifier for RandomForestClassifier {
    type Params = ForestParams;

    fn from_params(params: &ForestParams) -> Self {
        Self {
            params: params.clone(),
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
            importances: Vec::new(),
        }
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[usize], n_classes: usize) -> Result<()> {
        check_shapes(features, labels, n_classes)?;
        if self.params.n_estimators == 0 {
            return Err(PipelineError::Model("n_estimators must be positive".to_string()));
        }

        let n_samples = features.len();
        let n_features = features[0].len();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
            let mut builder = TreeBuilder {
                features,
                labels,
                n_classes,
                max_depth: self.params.max_depth,
                min_samples_split: self.params.min_samples_split.max(2),
                max_features: self.params.max_features.resolve(n_features),
                importances: vec![0.0; n_features],
            };
            let mut tree = DecisionTree::default();
            builder.build(&mut tree, &bootstrap, 0, &mut rng);
            trees.push(tree);

            let tree_total: f64 = builder.importances.iter().sum();
            if tree_total > 0.0 {
                for (total, imp) in importances.iter_mut().zip(builder.importances) {
                    *total += imp / tree_total;
                }
            }
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|imp| *imp /= total);
        }

        debug!(
            "Fitted {} trees on {} rows x {} features",
            trees.len(),
            n_samples,
            n_features
        );
        self.trees = trees;
        self.n_classes = n_classes;
        self.n_features = n_features;
        self.importances = importances;
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if self.trees.is_empty() {
            return Err(PipelineError::Model("Model has not been fitted".to_string()));
        }
        if let Some(row) = features.iter().find(|row| row.len() != self.n_features) {
            return Err(PipelineError::Model(format!(
                "Expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let n_trees = self.trees.len() as f64;
        Ok(features
            .iter()
            .map(|row| {
                let mut probabilities = vec![0.0; self.n_classes];
                for tree in &self.trees {
                    for (p, leaf) in probabilities.iter_mut().zip(tree.distribution(row)) {
                        *p += leaf;
                    }
                }
                probabilities.iter_mut().for_each(|p| *p /= n_trees);
                probabilities
            })
            .collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        Some(self.importances.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let class = i % 3;
            features.push(vec![class as f64 * 10.0 + (i as f64 * 0.1), 5.0]);
            labels.push(class);
        }
        (features, labels)
    }

    fn params() -> ForestParams {
        ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_learns_separable_classes() {
        let (features, labels) = separable();
        let mut forest = RandomForestClassifier::from_params(&params());
        forest.fit(&features, &labels, 3).unwrap();

        let predicted = forest.predict(&[vec![1.0, 5.0], vec![11.0, 5.0], vec![22.0, 5.0]]).unwrap();
        assert_eq!(predicted, vec![0, 1, 2]);

        let probabilities = forest.predict_proba(&[vec![11.0, 5.0]]).unwrap();
        assert!((probabilities[0].iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_importances_ignore_constant_feature() {
        let (features, labels) = separable();
        let mut forest = RandomForestClassifier::from_params(&params());
        forest.fit(&features, &labels, 3).unwrap();

        let importances = forest.feature_importances().unwrap();
        assert_eq!(importances[1], 0.0);
        assert!((importances[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_fit_is_reproducible() {
        let (features, labels) = separable();
        let mut a = RandomForestClassifier::from_params(&params());
        let mut b = RandomForestClassifier::from_params(&params());
        a.fit(&features, &labels, 3).unwrap();
        b.fit(&features, &labels, 3).unwrap();
        let row = vec![vec![9.5, 5.0]];
        assert_eq!(a.predict_proba(&row).unwrap(), b.predict_proba(&row).unwrap());
    }

    #[test]
    fn test_unfitted_or_misshaped_input_fails() {
        let forest = RandomForestClassifier::from_params(&params());
        assert!(forest.predict_proba(&[vec![1.0, 2.0]]).is_err());

        let (features, labels) = separable();
        let mut forest = RandomForestClassifier::from_params(&params());
        forest.fit(&features, &labels, 3).unwrap();
        assert!(forest.predict_proba(&[vec![1.0]]).is_err());
    }
}
