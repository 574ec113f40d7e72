//! Query strategies: rank pool samples by how informative a label would be.
//!
//! Every strategy scores each row of the classifier's `predict_proba` output
//! and picks the highest score; only the scoring function differs. Ties go to
//! the lowest pool index so that a query is reproducible.
use crate::config::StrategyKind;
use crate::error::{Result, SessionError};
use crate::math::Array2;
use crate::models::ClassifierModel;

pub trait QueryStrategy: Send + Sync {
    /// Informativeness of one probability row; larger is more informative.
    fn informativeness(&self, proba: &[f32]) -> f32;

    fn name(&self) -> &str;

    /// Pool index of the most informative sample.
    ///
    /// Does not mutate the model or the pool. Fails with
    /// [`SessionError::EmptyPool`] when `pool` has no rows.
    fn select(&self, model: &dyn ClassifierModel, pool: &Array2<f32>) -> Result<usize> {
        if pool.is_empty() {
            return Err(SessionError::EmptyPool);
        }
        let proba = model.predict_proba(pool).map_err(SessionError::model)?;
        if proba.nrows() != pool.nrows() {
            return Err(SessionError::Model(format!(
                "predict_proba returned {} rows for {} samples",
                proba.nrows(),
                pool.nrows()
            )));
        }
        let scores: Vec<f32> = proba.rows().map(|row| self.informativeness(row)).collect();
        Ok(select_max(&scores))
    }
}

/// Index of the highest finite score, lowest index on ties. Falls back to 0
/// when no score is finite.
pub fn select_max(scores: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_finite() && s > best_score {
            best = i;
            best_score = s;
        }
    }
    best
}

/// Least confidence: `1 - max p`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UncertaintySampling;

impl QueryStrategy for UncertaintySampling {
    fn informativeness(&self, proba: &[f32]) -> f32 {
        let top = proba.iter().copied().fold(0.0f32, f32::max);
        1.0 - top
    }

    fn name(&self) -> &str {
        "uncertainty"
    }
}

/// Smallest gap between the two most probable classes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarginSampling;

impl QueryStrategy for MarginSampling {
    fn informativeness(&self, proba: &[f32]) -> f32 {
        let (mut first, mut second) = (0.0f32, 0.0f32);
        for &p in proba {
            if p > first {
                second = first;
                first = p;
            } else if p > second {
                second = p;
            }
        }
        1.0 - (first - second)
    }

    fn name(&self) -> &str {
        "margin"
    }
}

/// Shannon entropy of the predicted distribution, in nats.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntropySampling;

impl QueryStrategy for EntropySampling {
    fn informativeness(&self, proba: &[f32]) -> f32 {
        proba
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum()
    }

    fn name(&self) -> &str {
        "entropy"
    }
}

pub fn build_strategy(kind: StrategyKind) -> Box<dyn QueryStrategy> {
    match kind {
        StrategyKind::Uncertainty => Box::new(UncertaintySampling),
        StrategyKind::Margin => Box::new(MarginSampling),
        StrategyKind::Entropy => Box::new(EntropySampling),
    }
}
