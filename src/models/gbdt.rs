use anyhow::{bail, Result};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use rayon::prelude::*;

use crate::config::{ModelConfig, ModelType};
use crate::math::Array2;
use crate::models::classifier_trait::{check_training_input, unique_classes, ClassifierModel};

/// Loss functions the gbdt trainer accepts.
const SUPPORTED_LOSSES: [&str; 3] = ["SquaredError", "LogLikelyhood", "LAD"];

/// Gradient Boosting Decision Tree (GBDT) classifier.
///
/// Multi-class problems are handled one-vs-rest: one booster per class is
/// trained on `+1` for that class and `-1` for every other class, and the
/// per-class outputs are normalised into a probability row. Boosters are
/// trained in parallel.
pub struct GBDTClassifier {
    params: ModelConfig,
    classes: Vec<i32>,
    boosters: Vec<GBDT>,
}

impl GBDTClassifier {
    pub fn new(params: ModelConfig) -> Self {
        GBDTClassifier {
            params,
            classes: Vec::new(),
            boosters: Vec::new(),
        }
    }

    fn booster_config(&self, feature_size: usize) -> Result<Config> {
        match &self.params.model_type {
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                debug,
                training_optimization_level,
                loss_type,
            } => {
                if !SUPPORTED_LOSSES.contains(&loss_type.as_str()) {
                    bail!(
                        "unsupported gbdt loss '{}', expected one of {:?}",
                        loss_type,
                        SUPPORTED_LOSSES
                    );
                }
                let mut config = Config::new();

                config.set_feature_size(feature_size);
                config.set_shrinkage(self.params.learning_rate);
                config.set_max_depth(*max_depth);
                config.set_iterations(*num_boost_round as usize);
                config.set_debug(*debug);
                config.set_training_optimization_level(*training_optimization_level);
                config.set_loss(loss_type);
                Ok(config)
            }
            other => bail!("Expected ModelType::GBDT params, got {:?}", other),
        }
    }
}

fn to_data_vec(x: &Array2<f32>, labels: impl Fn(usize) -> f32) -> DataVec {
    let mut data = DataVec::with_capacity(x.nrows());
    for (i, row) in x.rows().enumerate() {
        data.push(Data::new_training_data(row.to_vec(), 1.0, labels(i), None));
    }
    data
}

impl ClassifierModel for GBDTClassifier {
    fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()> {
        check_training_input(x, y)?;
        let config = self.booster_config(x.ncols())?;
        let classes = unique_classes(y);

        // A single class needs no booster: every prediction is that class.
        let boosters = if classes.len() < 2 {
            Vec::new()
        } else {
            classes
                .par_iter()
                .map(|&class| {
                    let mut train_x =
                        to_data_vec(x, |i| if y[i] == class { 1.0 } else { -1.0 });
                    let mut gbdt = GBDT::new(&config);
                    gbdt.fit(&mut train_x);
                    gbdt
                })
                .collect()
        };

        log::debug!(
            "gbdt fitted {} one-vs-rest boosters on {} samples",
            boosters.len(),
            x.nrows()
        );
        self.classes = classes;
        self.boosters = boosters;
        Ok(())
    }

    fn classes(&self) -> &[i32] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>> {
        if self.classes.is_empty() {
            bail!("gbdt model has not been fitted");
        }
        let n_classes = self.classes.len();
        if x.is_empty() {
            return Ok(Array2::with_width(n_classes));
        }
        if self.boosters.is_empty() {
            return Ok(Array2::from_shape_vec((x.nrows(), 1), vec![1.0; x.nrows()])?);
        }

        let test_x = to_data_vec(x, |_| 0.0);
        let per_class: Vec<Vec<f32>> = self
            .boosters
            .par_iter()
            .map(|gbdt| gbdt.predict(&test_x))
            .collect();

        let mut data = Vec::with_capacity(x.nrows() * n_classes);
        for row in 0..x.nrows() {
            let start = data.len();
            data.extend(per_class.iter().map(|preds| {
                let p = preds[row];
                if p.is_finite() {
                    p.clamp(0.0, 1.0)
                } else {
                    0.0
                }
            }));
            let total: f32 = data[start..].iter().sum();
            if total > 0.0 {
                data[start..].iter_mut().for_each(|p| *p /= total);
            } else {
                data[start..].fill(1.0 / n_classes as f32);
            }
        }

        Ok(Array2::from_shape_vec((x.nrows(), n_classes), data)?)
    }

    fn fresh(&self) -> Box<dyn ClassifierModel> {
        Box::new(GBDTClassifier::new(self.params.clone()))
    }

    fn name(&self) -> &str {
        "gbdt"
    }
}
