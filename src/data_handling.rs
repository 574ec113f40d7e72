//! Labelled datasets and the preparation of a session's inputs.
//!
//! This module defines `Dataset` and the helpers that turn one labelled
//! dataset into a held-out evaluation set, a random labelled seed set and an
//! unlabeled pool whose true labels are kept aside for simulated oracles.
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{LearnerConfig, SyntheticConfig};
use crate::math::{Array2, ShapeError};
use crate::pool::Sample;
use crate::session::{LabelSpace, SessionParams};

/// Feature matrix plus one label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub x: Array2<f32>,
    pub y: Vec<i32>,
}

impl Dataset {
    pub fn new(x: Array2<f32>, y: Vec<i32>) -> Result<Self> {
        if x.nrows() != y.len() {
            bail!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            );
        }
        Ok(Dataset { x, y })
    }

    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R], y: Vec<i32>) -> Result<Self> {
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        Self::new(Array2::from_rows(width, rows)?, y)
    }

    pub fn empty(width: usize) -> Self {
        Dataset {
            x: Array2::with_width(width),
            y: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn width(&self) -> usize {
        self.x.ncols()
    }

    pub fn push(&mut self, features: &[f32], label: i32) -> Result<(), ShapeError> {
        self.x.push_row(features)?;
        self.y.push(label);
        Ok(())
    }

    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select_rows(indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
        }
    }

    pub fn samples(&self) -> Vec<Sample> {
        self.x.rows().map(Sample::from).collect()
    }

    /// Number of rows per label, ordered by label.
    pub fn class_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.y {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    pub fn log_summary(&self, name: &str) {
        log::info!(
            "{}: {} samples, {} features, class counts {:?}",
            name,
            self.len(),
            self.width(),
            self.class_counts()
        );
    }
}

/// Read a labelled CSV file: feature columns first, integer label last.
pub fn read_labeled_csv<P: AsRef<Path>>(path: P, has_headers: bool) -> Result<Dataset> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(has_headers)
        .delimiter(b',')
        .from_path(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let mut data = Vec::new();
    let mut labels = Vec::new();
    let mut width = None;

    for (row, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row + 1))?;
        if record.len() < 2 {
            bail!(
                "row {} has {} columns; need at least one feature and a label",
                row + 1,
                record.len()
            );
        }
        let n_features = record.len() - 1;
        match width {
            None => width = Some(n_features),
            Some(w) if w != n_features => {
                bail!("row {} has {} features, expected {}", row + 1, n_features, w)
            }
            _ => {}
        }

        for (col, field) in record.iter().take(n_features).enumerate() {
            let value = field
                .trim()
                .parse::<f32>()
                .with_context(|| format!("Invalid feature value '{}' in row {}", field, row + 1))?;
            if !value.is_finite() {
                bail!(
                    "Non-finite feature value '{}' in row {}, column {}",
                    field,
                    row + 1,
                    col + 1
                );
            }
            data.push(value);
        }
        let label_field = record.get(n_features).unwrap_or_default().trim();
        let label = label_field
            .parse::<f32>()
            .ok()
            .filter(|v| v.fract() == 0.0)
            .map(|v| v as i32)
            .with_context(|| format!("Invalid label '{}' in row {}", label_field, row + 1))?;
        labels.push(label);
    }

    let Some(width) = width else {
        bail!("dataset {} contains no rows", path.display());
    };
    log::debug!(
        "Loaded {} rows with {} features from {}",
        labels.len(),
        width,
        path.display()
    );
    Dataset::new(Array2::from_shape_vec((labels.len(), width), data)?, labels)
}

/// Blobs of uniformly jittered points around random class centres in `[0, 16)`.
pub fn synthetic_blobs<R: Rng>(params: &SyntheticConfig, rng: &mut R) -> Result<Dataset> {
    if params.n_classes == 0 || params.samples_per_class == 0 || params.n_features == 0 {
        bail!("synthetic dataset needs at least one class, sample and feature");
    }
    let spread = params.spread.abs();
    let centres: Vec<Vec<f32>> = (0..params.n_classes)
        .map(|_| (0..params.n_features).map(|_| rng.gen_range(0.0..16.0)).collect())
        .collect();

    let n = params.n_classes * params.samples_per_class;
    let mut data = Vec::with_capacity(n * params.n_features);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..params.samples_per_class {
        for (class, centre) in centres.iter().enumerate() {
            for &c in centre {
                let jitter = if spread > 0.0 {
                    rng.gen_range(-spread..spread)
                } else {
                    0.0
                };
                data.push(c + jitter);
            }
            labels.push(class as i32);
        }
    }
    Dataset::new(Array2::from_shape_vec((n, params.n_features), data)?, labels)
}

/// Shuffle and split off `test_fraction` of the rows as a held-out set.
///
/// Both halves keep at least one row when the dataset has two or more.
pub fn train_test_split<R: Rng>(
    data: &Dataset,
    test_fraction: f32,
    rng: &mut R,
) -> Result<(Dataset, Dataset)> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        bail!("test_fraction must be in (0, 1), got {}", test_fraction);
    }
    if data.len() < 2 {
        bail!("need at least two samples to split, got {}", data.len());
    }
    let mut indices: Vec<usize> = (0..data.len()).collect();
    indices.shuffle(rng);

    let n_test = ((data.len() as f32 * test_fraction).round() as usize).clamp(1, data.len() - 1);
    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((data.select(train_idx), data.select(test_idx)))
}

/// Draw `n_initial` random rows as the labelled seed set; the remaining rows,
/// in their original order, form the pool.
pub fn draw_seed<R: Rng>(data: &Dataset, n_initial: usize, rng: &mut R) -> (Dataset, Dataset) {
    let n_initial = n_initial.min(data.len());
    let all: Vec<usize> = (0..data.len()).collect();
    let mut seed_idx: Vec<usize> = all.choose_multiple(rng, n_initial).cloned().collect();
    seed_idx.sort_unstable();

    let mut is_seed = vec![false; data.len()];
    for &i in &seed_idx {
        is_seed[i] = true;
    }
    let pool_idx: Vec<usize> = all.into_iter().filter(|&i| !is_seed[i]).collect();
    (data.select(&seed_idx), data.select(&pool_idx))
}

/// A dataset prepared for one session.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub seed: Dataset,
    /// Pool samples with their withheld true labels.
    pub pool: Dataset,
    pub eval: Dataset,
}

impl PreparedData {
    /// Session parameters for this data. The pool's true labels are returned
    /// separately, indexed by [`crate::pool::SampleId`].
    pub fn into_session_params(self, config: &LearnerConfig) -> (SessionParams, Vec<i32>) {
        let params = SessionParams {
            pool: self.pool.samples(),
            seed: self.seed,
            eval: self.eval,
            label_space: LabelSpace::new(config.label_space.iter().copied()),
            budget: config.budget,
            strategy: config.strategy,
        };
        (params, self.pool.y)
    }
}

/// Split `data` into evaluation set, seed set and pool using the config's
/// `test_fraction`, `n_initial` and `random_seed`.
pub fn prepare(data: &Dataset, config: &LearnerConfig) -> Result<PreparedData> {
    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let (train, eval) = train_test_split(data, config.test_fraction, &mut rng)?;
    let (seed, pool) = draw_seed(&train, config.n_initial, &mut rng);
    if seed.is_empty() {
        bail!("n_initial must be at least 1");
    }

    seed.log_summary("Seed set");
    pool.log_summary("Pool");
    eval.log_summary("Evaluation set");
    Ok(PreparedData { seed, pool, eval })
}
