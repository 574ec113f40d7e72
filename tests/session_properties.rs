//! Integration tests for the session state machine and its invariants.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::bail;

use active_learner::config::{ModelConfig, StrategyKind};
use active_learner::data_handling::Dataset;
use active_learner::error::SessionError;
use active_learner::math::Array2;
use active_learner::models::knn::KNNClassifier;
use active_learner::models::{build_model, ClassifierModel};
use active_learner::pool::Sample;
use active_learner::session::{LabelSpace, Session, SessionParams, SessionState};

/// Uniform probabilities over the seen classes; fitting can be made to fail.
struct UniformModel {
    classes: Vec<i32>,
    fail: Arc<AtomicBool>,
}

impl UniformModel {
    fn boxed(fail: Arc<AtomicBool>) -> Box<dyn ClassifierModel> {
        Box::new(UniformModel {
            classes: Vec::new(),
            fail,
        })
    }
}

impl ClassifierModel for UniformModel {
    fn fit(&mut self, _x: &Array2<f32>, y: &[i32]) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("injected fit failure");
        }
        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;
        Ok(())
    }

    fn classes(&self) -> &[i32] {
        &self.classes
    }

    fn predict_proba(&self, x: &Array2<f32>) -> anyhow::Result<Array2<f32>> {
        let k = self.classes.len();
        let p = 1.0 / k as f32;
        Ok(Array2::from_shape_vec((x.nrows(), k), vec![p; x.nrows() * k])?)
    }

    fn fresh(&self) -> Box<dyn ClassifierModel> {
        UniformModel::boxed(self.fail.clone())
    }
}

fn params(pool: usize, budget: usize, labels: &[i32]) -> SessionParams {
    let seed = Dataset::from_rows(
        &[vec![0.0, 0.0], vec![1.0, 1.0], vec![10.0, 10.0], vec![11.0, 11.0]],
        vec![0, 0, 1, 1],
    )
    .unwrap();
    let eval = Dataset::from_rows(
        &[vec![0.5, 0.5], vec![10.5, 10.5], vec![2.0, 2.0], vec![9.0, 9.0]],
        vec![0, 1, 0, 1],
    )
    .unwrap();
    SessionParams {
        seed,
        pool: (0..pool)
            .map(|i| Sample::new(vec![i as f32, (i * 2) as f32]))
            .collect(),
        eval,
        label_space: LabelSpace::new(labels.iter().copied()),
        budget,
        strategy: StrategyKind::Uncertainty,
    }
}

fn knn_session(pool: usize, budget: usize) -> Session {
    Session::new(params(pool, budget, &[0, 1]), Box::new(KNNClassifier::new(3, false))).unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn budget_three_pool_five_scenario() {
    let mut session = knn_session(5, 3);
    assert_eq!(session.status().state, SessionState::Ready);

    let q = session.query().unwrap();
    assert!(q.index < 5);
    session.teach(1).unwrap();
    let status = session.status();
    assert_eq!(session.accuracy_history().len(), 2);
    assert_eq!(status.pool_size, 4);
    assert_eq!(status.state, SessionState::Ready);

    for _ in 0..2 {
        session.query().unwrap();
        session.teach(1).unwrap();
    }
    let status = session.status();
    assert_eq!(status.state, SessionState::Finished);
    assert_eq!(status.pool_size, 2);
    assert_eq!(status.queries_completed, 3);
    assert_eq!(session.accuracy_history().len(), 4);

    assert!(matches!(
        session.query(),
        Err(SessionError::InvalidState {
            state: SessionState::Finished,
            ..
        })
    ));
}

#[test]
fn empty_pool_at_construction_finishes_on_first_query() {
    let mut session = knn_session(0, 3);
    assert_eq!(session.query().unwrap_err(), SessionError::EmptyPool);
    assert_eq!(session.status().state, SessionState::Finished);
    assert_eq!(session.accuracy_history().len(), 1);
}

#[test]
fn pool_exhaustion_finishes_before_budget() {
    let mut session = knn_session(2, 10);
    session.query().unwrap();
    session.teach(0).unwrap();
    assert_eq!(session.status().state, SessionState::Ready);
    session.query().unwrap();
    let outcome = session.teach(1).unwrap();
    assert_eq!(outcome.state, SessionState::Finished);
    assert_eq!(session.status().pool_size, 0);
}

#[test]
fn history_returns_last_five_of_seven_in_order() {
    let mut session = knn_session(10, 10);
    let mut taught = Vec::new();
    for step in 0..7 {
        let q = session.query().unwrap();
        let label = step % 2;
        session.teach(label).unwrap();
        taught.push((q.sample, label));
    }

    let recent = session.history(5);
    assert_eq!(recent.len(), 5);
    for (event, (sample, label)) in recent.iter().zip(&taught[2..]) {
        assert_eq!(&event.sample, sample);
        assert_eq!(event.label, *label);
    }
    let steps: Vec<usize> = recent.iter().map(|e| e.step).collect();
    assert_eq!(steps, vec![3, 4, 5, 6, 7]);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn accuracy_history_tracks_completed_teaches() {
    let mut session = knn_session(8, 6);
    for _ in 0..6 {
        let before = session.status().pool_size;
        session.query().unwrap();
        session.teach(0).unwrap();
        let status = session.status();
        assert_eq!(status.pool_size, before - 1);
        assert_eq!(session.accuracy_history().len(), status.queries_completed + 1);
    }
}

#[test]
fn teach_without_query_fails_and_changes_nothing() {
    let mut session = knn_session(4, 3);
    let before = (
        session.status(),
        session.training_set_size(),
        session.accuracy_history().len(),
    );
    assert!(matches!(
        session.teach(0),
        Err(SessionError::InvalidState {
            state: SessionState::Ready,
            ..
        })
    ));
    let after = (
        session.status(),
        session.training_set_size(),
        session.accuracy_history().len(),
    );
    assert_eq!(before, after);
}

#[test]
fn teaching_twice_for_one_query_fails() {
    let mut session = knn_session(4, 3);
    session.query().unwrap();
    session.teach(1).unwrap();
    let pool = session.status().pool_size;
    let training = session.training_set_size();

    assert!(matches!(
        session.teach(1),
        Err(SessionError::InvalidState { .. })
    ));
    assert_eq!(session.status().pool_size, pool);
    assert_eq!(session.training_set_size(), training);
    assert_eq!(session.accuracy_history().len(), 2);
}

#[test]
fn query_while_awaiting_label_fails() {
    let mut session = knn_session(4, 3);
    let q = session.query().unwrap();
    assert!(matches!(
        session.query(),
        Err(SessionError::InvalidState {
            state: SessionState::AwaitingLabel,
            ..
        })
    ));
    assert_eq!(session.pending(), Some(&q));
}

#[test]
fn invalid_label_keeps_query_pending() {
    let mut session = knn_session(4, 3);
    let q = session.query().unwrap();

    assert_eq!(
        session.teach(5).unwrap_err(),
        SessionError::InvalidLabel { label: 5 }
    );
    assert_eq!(session.status().state, SessionState::AwaitingLabel);
    assert_eq!(session.status().pool_size, 4);
    assert_eq!(session.training_set_size(), 4);
    assert_eq!(session.accuracy_history().len(), 1);
    assert!(session.history(5).is_empty());

    session.teach(1).unwrap();
    assert_eq!(session.history(1)[0].sample_id, q.sample_id);
    assert_eq!(session.status().pool_size, 3);
}

#[test]
fn taught_sample_leaves_pool_and_others_keep_order() {
    let mut session = knn_session(5, 5);
    let q = session.query().unwrap();
    session.teach(0).unwrap();

    // Every remaining query must refer to a different sample id.
    let mut seen = vec![q.sample_id];
    while session.status().state == SessionState::Ready {
        let next = session.query().unwrap();
        assert!(!seen.contains(&next.sample_id));
        seen.push(next.sample_id);
        session.teach(1).unwrap();
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

// ---------------------------------------------------------------------------
// Failure atomicity
// ---------------------------------------------------------------------------

#[test]
fn classifier_failure_during_teach_rolls_back() {
    let fail = Arc::new(AtomicBool::new(false));
    let mut session =
        Session::new(params(4, 3, &[0, 1]), UniformModel::boxed(fail.clone())).unwrap();
    let q = session.query().unwrap();
    // Uniform probabilities tie everywhere; the lowest index wins.
    assert_eq!(q.index, 0);

    fail.store(true, Ordering::SeqCst);
    assert!(matches!(session.teach(1), Err(SessionError::Model(_))));
    assert_eq!(session.status().state, SessionState::AwaitingLabel);
    assert_eq!(session.status().pool_size, 4);
    assert_eq!(session.training_set_size(), 4);
    assert_eq!(session.accuracy_history().len(), 1);

    fail.store(false, Ordering::SeqCst);
    session.teach(1).unwrap();
    assert_eq!(session.status().pool_size, 3);
    assert_eq!(session.training_set_size(), 5);
}

#[test]
fn construction_fails_when_seed_fit_fails() {
    let fail = Arc::new(AtomicBool::new(true));
    assert!(matches!(
        Session::new(params(4, 3, &[0, 1]), UniformModel::boxed(fail)),
        Err(SessionError::Model(_))
    ));
}

#[test]
fn non_finite_pool_sample_is_rejected_before_any_fit() {
    let mut p = params(3, 3, &[0, 1]);
    p.pool.push(Sample::new(vec![f32::NAN, 1.0]));
    let result = Session::new(p, build_model(ModelConfig::default()));
    match result {
        Err(SessionError::InvalidConfig(msg)) => assert!(msg.contains("pool sample 3")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("session accepted a NaN feature"),
    }
}

#[test]
fn construction_rejects_empty_seed_and_eval() {
    let mut p = params(4, 3, &[0, 1]);
    p.seed = Dataset::empty(2);
    assert!(matches!(
        Session::new(p, Box::new(KNNClassifier::new(1, false))),
        Err(SessionError::InvalidConfig(_))
    ));

    let mut p = params(4, 3, &[0, 1]);
    p.eval = Dataset::empty(2);
    assert!(matches!(
        Session::new(p, Box::new(KNNClassifier::new(1, false))),
        Err(SessionError::InvalidConfig(_))
    ));
}
