use anyhow::{bail, Result};
use rayon::prelude::*;

use crate::math::Array2;
use crate::models::classifier_trait::{check_training_input, unique_classes, ClassifierModel};

/// Added to distances before inverting them for weighted votes.
const DISTANCE_EPS: f32 = 1e-6;

/// k-nearest neighbours classifier on euclidean distance.
///
/// Fitting only stores the training set, so a full refit after every label
/// is cheap; prediction cost grows with the training set instead.
pub struct KNNClassifier {
    k: usize,
    distance_weighted: bool,
    x: Option<Array2<f32>>,
    y: Vec<i32>,
    classes: Vec<i32>,
}

impl KNNClassifier {
    pub fn new(k: usize, distance_weighted: bool) -> Self {
        KNNClassifier {
            k: k.max(1),
            distance_weighted,
            x: None,
            y: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Per-class vote weights for one query row.
    fn votes(&self, train: &Array2<f32>, row: &[f32]) -> Vec<f32> {
        let mut neighbours: Vec<(f32, usize)> = train
            .rows()
            .enumerate()
            .map(|(i, t)| (squared_distance(t, row), i))
            .collect();
        let k = self.k.min(neighbours.len());
        // Equal distances resolve to the earlier training sample.
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut votes = vec![0.0f32; self.classes.len()];
        for &(dist, i) in &neighbours[..k] {
            let weight = if self.distance_weighted {
                1.0 / (dist.sqrt() + DISTANCE_EPS)
            } else {
                1.0
            };
            if let Ok(c) = self.classes.binary_search(&self.y[i]) {
                votes[c] += weight;
            }
        }

        let total: f32 = votes.iter().sum();
        if total > 0.0 {
            votes.iter_mut().for_each(|v| *v /= total);
        }
        votes
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl ClassifierModel for KNNClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()> {
        check_training_input(x, y)?;
        self.classes = unique_classes(y);
        self.y = y.to_vec();
        self.x = Some(x.clone());
        log::trace!(
            "knn fitted on {} samples, {} classes",
            x.nrows(),
            self.classes.len()
        );
        Ok(())
    }

    fn classes(&self) -> &[i32] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        let Some(train) = self.x.as_ref() else {
            bail!("knn model has not been fitted");
        };
        if x.is_empty() {
            return Ok(Array2::with_width(self.classes.len()));
        }
        if x.ncols() != train.ncols() {
            bail!(
                "expected samples with {} features, got {}",
                train.ncols(),
                x.ncols()
            );
        }

        let data: Vec<f32> = x
            .as_slice()
            .par_chunks_exact(x.ncols())
            .flat_map_iter(|row| self.votes(train, row))
            .collect();

        Ok(Array2::from_shape_vec((x.nrows(), self.classes.len()), data)?)
    }

    fn fresh(&self) -> Box<dyn ClassifierModel> {
        Box::new(KNNClassifier::new(self.k, self.distance_weighted))
    }

    fn name(&self) -> &str {
        "knn"
    }
}
