//! The active learning session: a query → label → teach state machine.
//!
//! ```text
//!            query()               teach(label)
//!   Ready ───────────▶ AwaitingLabel ───────────▶ Ready
//!     │                                  │
//!     │ empty pool / budget 0            │ budget reached / pool empty
//!     ▼                                  ▼
//!  Finished ◀────────────────────────────┘
//! ```
//!
//! `teach` is all-or-nothing. The refit happens on a fresh classifier over the
//! whole accumulated training set and the session is only touched once fit
//! and scoring have both succeeded.
use std::collections::BTreeSet;
use std::fmt;

use chrono::Utc;
use serde::Serialize;

use crate::config::StrategyKind;
use crate::data_handling::Dataset;
use crate::error::{Result, SessionError};
use crate::history::{AccuracyHistory, LabelEvent, LabelHistory};
use crate::models::ClassifierModel;
use crate::pool::{Pool, Sample, SampleId};
use crate::strategy::{build_strategy, QueryStrategy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No pending query; budget and pool remain.
    Ready,
    /// A query was issued and its label has not been taught yet.
    AwaitingLabel,
    /// Budget exhausted or pool empty. Terminal.
    Finished,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Ready => "ready",
            SessionState::AwaitingLabel => "awaiting label",
            SessionState::Finished => "finished",
        })
    }
}

/// The finite set of labels the oracle may answer with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LabelSpace(BTreeSet<i32>);

impl LabelSpace {
    pub fn new<I: IntoIterator<Item = i32>>(labels: I) -> Self {
        LabelSpace(labels.into_iter().collect())
    }

    pub fn contains(&self, label: i32) -> bool {
        self.0.contains(&label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }

    fn check(&self, label: i32) -> Result<()> {
        if self.contains(label) {
            Ok(())
        } else {
            Err(SessionError::InvalidLabel { label })
        }
    }
}

impl fmt::Display for LabelSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.0.iter().map(|l| l.to_string()).collect();
        write!(f, "{{{}}}", labels.join(", "))
    }
}

/// Everything a session is constructed from.
#[derive(Clone, Debug)]
pub struct SessionParams {
    /// Labelled samples the classifier is first fitted on.
    pub seed: Dataset,
    /// Unlabeled samples available for querying.
    pub pool: Vec<Sample>,
    /// Held-out evaluation set; never mutated.
    pub eval: Dataset,
    pub label_space: LabelSpace,
    /// Maximum number of queries.
    pub budget: usize,
    pub strategy: StrategyKind,
}

/// A query handed to the oracle; also the session's record of the pending one.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Query {
    /// Position in the pool, valid until the next teach.
    pub index: usize,
    pub sample_id: SampleId,
    pub sample: Sample,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TeachOutcome {
    /// Accuracy of the refitted model on the evaluation set.
    pub accuracy: f32,
    pub state: SessionState,
    pub queries_completed: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub queries_completed: usize,
    pub budget: usize,
    pub pool_size: usize,
}

pub struct Session {
    model: Box<dyn ClassifierModel>,
    strategy: Box<dyn QueryStrategy>,
    pool: Pool,
    training: Dataset,
    eval: Dataset,
    label_space: LabelSpace,
    budget: usize,
    queries_completed: usize,
    pending: Option<Query>,
    state: SessionState,
    accuracy: AccuracyHistory,
    labels: LabelHistory,
}

impl Session {
    /// Validate `params`, fit `model` on the seed set and record the baseline
    /// accuracy. The strategy is built from `params.strategy`.
    pub fn new(params: SessionParams, model: Box<dyn ClassifierModel>) -> Result<Self> {
        let strategy = build_strategy(params.strategy);
        Self::with_strategy(params, model, strategy)
    }

    /// Like [`Session::new`] with a caller-supplied strategy; `params.strategy`
    /// is ignored.
    pub fn with_strategy(
        params: SessionParams,
        mut model: Box<dyn ClassifierModel>,
        strategy: Box<dyn QueryStrategy>,
    ) -> Result<Self> {
        validate(&params)?;

        model
            .fit(&params.seed.x, &params.seed.y)
            .map_err(SessionError::model)?;
        let baseline = model
            .score(&params.eval.x, &params.eval.y)
            .map_err(SessionError::model)?;

        let state = if params.budget == 0 {
            SessionState::Finished
        } else {
            SessionState::Ready
        };

        log::info!(
            "Session started: {} seed samples, {} pool samples, {} eval samples, budget {}, {} sampling, {} model, baseline accuracy {:.4}",
            params.seed.len(),
            params.pool.len(),
            params.eval.len(),
            params.budget,
            strategy.name(),
            model.name(),
            baseline
        );

        Ok(Session {
            model,
            strategy,
            pool: Pool::new(params.pool),
            training: params.seed,
            eval: params.eval,
            label_space: params.label_space,
            budget: params.budget,
            queries_completed: 0,
            pending: None,
            state,
            accuracy: AccuracyHistory::with_baseline(baseline),
            labels: LabelHistory::default(),
        })
    }

    /// Pick the most informative pool sample and wait for its label.
    ///
    /// Only valid in [`SessionState::Ready`]. An empty pool finishes the
    /// session and reports [`SessionError::EmptyPool`].
    pub fn query(&mut self) -> Result<Query> {
        if self.state != SessionState::Ready {
            return Err(SessionError::InvalidState {
                operation: "query",
                state: self.state,
            });
        }
        if self.pool.is_empty() {
            log::info!("Pool exhausted after {} queries", self.queries_completed);
            self.state = SessionState::Finished;
            return Err(SessionError::EmptyPool);
        }

        let index = self
            .strategy
            .select(self.model.as_ref(), &self.pool.to_matrix()?)?;
        let entry = self.pool.get(index)?;
        let query = Query {
            index,
            sample_id: entry.id,
            sample: entry.sample.clone(),
        };

        log::debug!(
            "Query {}/{}: pool index {} (sample {})",
            self.queries_completed + 1,
            self.budget,
            index,
            entry.id
        );
        self.pending = Some(query.clone());
        self.state = SessionState::AwaitingLabel;
        Ok(query)
    }

    /// Label the pending query.
    pub fn teach(&mut self, label: i32) -> Result<TeachOutcome> {
        self.commit_label(None, label)
    }

    /// Label `query`, which must be the pending query.
    ///
    /// Positions are reused after every removal, so the answer is matched on
    /// the sample id as well as the index. An answer to any other query is
    /// rejected as stale.
    pub fn teach_at(&mut self, query: &Query, label: i32) -> Result<TeachOutcome> {
        self.commit_label(Some(query), label)
    }

    fn commit_label(&mut self, answered: Option<&Query>, label: i32) -> Result<TeachOutcome> {
        let pending = match (&self.pending, self.state) {
            (Some(pending), SessionState::AwaitingLabel) => pending.clone(),
            (_, state) => {
                return Err(SessionError::InvalidState {
                    operation: "teach",
                    state,
                })
            }
        };
        if let Some(answered) = answered {
            if answered.sample_id != pending.sample_id || answered.index != pending.index {
                log::warn!(
                    "Rejected label for sample {} at pool index {}; pending query is sample {} at index {}",
                    answered.sample_id,
                    answered.index,
                    pending.sample_id,
                    pending.index
                );
                return Err(SessionError::InvalidState {
                    operation: "teach a stale query",
                    state: self.state,
                });
            }
        }
        self.label_space.check(label)?;

        let mut training = self.training.clone();
        training
            .push(&pending.sample, label)
            .map_err(|e| SessionError::Model(e.to_string()))?;

        let mut model = self.model.fresh();
        model
            .fit(&training.x, &training.y)
            .map_err(SessionError::model)?;
        let accuracy = model
            .score(&self.eval.x, &self.eval.y)
            .map_err(SessionError::model)?;

        // Commit. The pool removal is the only fallible step and goes first.
        self.pool.remove(pending.index)?;
        self.training = training;
        self.model = model;
        self.accuracy.push(accuracy);
        self.queries_completed += 1;
        self.labels.push(LabelEvent {
            step: self.queries_completed,
            sample_id: pending.sample_id,
            sample: pending.sample,
            label,
            accuracy,
            labeled_at: Utc::now(),
        });
        self.pending = None;
        self.state = if self.queries_completed >= self.budget || self.pool.is_empty() {
            SessionState::Finished
        } else {
            SessionState::Ready
        };

        log::info!(
            "Taught label {} for sample {} ({}/{}), accuracy {:.4}, {} left in pool",
            label,
            pending.sample_id,
            self.queries_completed,
            self.budget,
            accuracy,
            self.pool.size()
        );
        if self.state == SessionState::Finished {
            log::info!("Session finished after {} queries", self.queries_completed);
        }

        Ok(TeachOutcome {
            accuracy,
            state: self.state,
            queries_completed: self.queries_completed,
        })
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            queries_completed: self.queries_completed,
            budget: self.budget,
            pool_size: self.pool.size(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Baseline first, then one entry per completed teach.
    pub fn accuracy_history(&self) -> &[f32] {
        self.accuracy.as_slice()
    }

    pub fn latest_accuracy(&self) -> f32 {
        self.accuracy.latest().unwrap_or_default()
    }

    /// The last `limit` label events, oldest first.
    pub fn history(&self, limit: usize) -> &[LabelEvent] {
        self.labels.recent(limit)
    }

    pub fn label_events(&self) -> &LabelHistory {
        &self.labels
    }

    pub fn pending(&self) -> Option<&Query> {
        self.pending.as_ref()
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    pub fn training_set_size(&self) -> usize {
        self.training.len()
    }

    pub fn label_space(&self) -> &LabelSpace {
        &self.label_space
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }
}

fn validate(params: &SessionParams) -> Result<()> {
    let invalid = |msg: String| -> Result<()> { Err(SessionError::InvalidConfig(msg)) };

    if params.label_space.is_empty() {
        return invalid("label space is empty".to_string());
    }
    if params.seed.is_empty() {
        return invalid("seed training set is empty".to_string());
    }
    if params.eval.is_empty() {
        return invalid("evaluation set is empty".to_string());
    }
    for (name, set) in [("seed", &params.seed), ("evaluation", &params.eval)] {
        if let Some(&label) = set.y.iter().find(|&&l| !params.label_space.contains(l)) {
            return invalid(format!(
                "{} set contains label {} outside {}",
                name, label, params.label_space
            ));
        }
    }

    let width = params.seed.width();
    if params.eval.width() != width {
        return invalid(format!(
            "evaluation samples have {} features, seed samples have {}",
            params.eval.width(),
            width
        ));
    }
    if let Some((i, sample)) = params
        .pool
        .iter()
        .enumerate()
        .find(|(_, s)| s.len() != width)
    {
        return invalid(format!(
            "pool sample {} has {} features, expected {}",
            i,
            sample.len(),
            width
        ));
    }

    // Tree and distance models cannot order NaN or infinite features.
    for (name, set) in [("seed", &params.seed), ("evaluation", &params.eval)] {
        if let Some(row) = set.x.rows().position(|r| r.iter().any(|v| !v.is_finite())) {
            return invalid(format!("{} sample {} has a non-finite feature", name, row));
        }
    }
    if let Some(i) = params
        .pool
        .iter()
        .position(|s| s.iter().any(|v| !v.is_finite()))
    {
        return invalid(format!("pool sample {} has a non-finite feature", i));
    }
    Ok(())
}
