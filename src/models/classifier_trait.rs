use anyhow::{bail, Result};

use crate::math::Array2;

/// The classifier capability consumed by the active learning session.
///
/// Labels are plain `i32` class values. `predict_proba` returns one row per
/// sample and one column per entry of [`ClassifierModel::classes`], in that
/// order, each row summing to one.
pub trait ClassifierModel: Send {
    /// Fit the model from scratch on `x` / `y`, discarding any previous fit.
    fn fit(&mut self, x: &Array2<f32>, y: &[i32]) -> Result<()>;

    /// Class values seen by the last fit, sorted ascending.
    fn classes(&self) -> &[i32];

    /// Class membership probabilities, shape `(x.nrows(), classes().len())`.
    fn predict_proba(&self, x: &Array2<f32>) -> Result<Array2<f32>>;

    /// Most probable class per sample. Ties go to the smaller class value.
    fn predict(&self, x: &Array2<f32>) -> Result<Vec<i32>> {
        let proba = self.predict_proba(x)?;
        let classes = self.classes();
        Ok(proba
            .rows()
            .map(|row| classes[argmax(row).unwrap_or(0)])
            .collect())
    }

    /// Mean accuracy of `predict(x)` against `y`, in `[0, 1]`.
    fn score(&self, x: &Array2<f32>, y: &[i32]) -> Result<f32> {
        if x.nrows() != y.len() {
            bail!(
                "cannot score {} samples against {} labels",
                x.nrows(),
                y.len()
            );
        }
        if y.is_empty() {
            bail!("cannot score an empty evaluation set");
        }
        let predicted = self.predict(x)?;
        Ok(accuracy(&predicted, y))
    }

    /// A new, unfitted model with the same hyper-parameters.
    fn fresh(&self) -> Box<dyn ClassifierModel>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}

/// Fraction of positions where `predicted` and `truth` agree.
pub fn accuracy(predicted: &[i32], truth: &[i32]) -> f32 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .zip(truth)
        .filter(|(p, t)| p == t)
        .count();
    hits as f32 / truth.len() as f32
}

/// Index of the largest value, first one on ties. Non-finite values are skipped.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Sorted, de-duplicated class values of a label vector.
pub fn unique_classes(y: &[i32]) -> Vec<i32> {
    let mut classes = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// Shared preconditions of every `fit` implementation.
pub(crate) fn check_training_input(x: &Array2<f32>, y: &[i32]) -> Result<()> {
    if x.nrows() != y.len() {
        bail!(
            "feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        );
    }
    if x.nrows() == 0 {
        bail!("cannot fit on an empty training set");
    }
    if x.ncols() == 0 {
        bail!("cannot fit on zero-width samples");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argmax_prefers_first_on_ties_and_skips_nan() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[f32::NAN, 0.1]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn accuracy_counts_matches() {
        assert_eq!(accuracy(&[1, 2, 3, 4], &[1, 2, 0, 0]), 0.5);
        assert_eq!(unique_classes(&[3, 1, 3, 2, 1]), vec![1, 2, 3]);
    }
}
