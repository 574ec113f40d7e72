//! Concurrent callers on one shared session.

use std::sync::{Arc, Barrier};
use std::thread;

use active_learner::config::StrategyKind;
use active_learner::data_handling::Dataset;
use active_learner::error::SessionError;
use active_learner::models::knn::KNNClassifier;
use active_learner::pool::Sample;
use active_learner::session::{LabelSpace, Session, SessionParams, SessionState};
use active_learner::shared::SharedSession;

fn shared(pool: usize, budget: usize) -> Arc<SharedSession> {
    let params = SessionParams {
        seed: Dataset::from_rows(&[vec![0.0, 0.0], vec![9.0, 9.0]], vec![0, 1]).unwrap(),
        pool: (0..pool)
            .map(|i| Sample::new(vec![i as f32 * 0.5, 9.0 - i as f32 * 0.5]))
            .collect(),
        eval: Dataset::from_rows(&[vec![1.0, 1.0], vec![8.0, 8.0]], vec![0, 1]).unwrap(),
        label_space: LabelSpace::new([0, 1]),
        budget,
        strategy: StrategyKind::Uncertainty,
    };
    let session = Session::new(params, Box::new(KNNClassifier::new(1, false))).unwrap();
    Arc::new(SharedSession::new(session))
}

// ---------------------------------------------------------------------------
// Racing mutations
// ---------------------------------------------------------------------------

#[test]
fn only_one_of_many_racing_teaches_is_applied() {
    let session = shared(6, 4);
    let query = session.query().unwrap();

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let session = session.clone();
            let barrier = barrier.clone();
            let query = query.clone();
            thread::spawn(move || {
                barrier.wait();
                session.teach_at(&query, (t % 2) as i32)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let applied = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(applied, 1);
    for err in results.into_iter().filter_map(|r| r.err()) {
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    let status = session.status();
    assert_eq!(status.pool_size, 5);
    assert_eq!(status.queries_completed, 1);
    assert_eq!(session.accuracy_history().len(), 2);
    assert_eq!(session.history(10).len(), 1);
}

#[test]
fn only_one_of_many_racing_queries_is_issued() {
    let session = shared(6, 4);
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let session = session.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                session.query()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let issued: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(issued.len(), 1);
    assert_eq!(session.pending().as_ref(), Some(issued[0]));
    assert_eq!(session.status().state, SessionState::AwaitingLabel);
}

#[test]
fn duplicate_answer_after_next_query_is_rejected() {
    let session = shared(4, 4);
    let first = session.query().unwrap();
    session.teach_at(&first, 1).unwrap();
    let second = session.query().unwrap();
    // Nearest-neighbour confidence is 1 everywhere, so both queries sit at index 0.
    assert_eq!(first.index, second.index);
    assert_ne!(first.sample_id, second.sample_id);

    assert!(matches!(
        session.teach_at(&first, 1),
        Err(SessionError::InvalidState { .. })
    ));
    assert_eq!(session.pending(), Some(second.clone()));
    assert_eq!(session.status().pool_size, 3);
    assert_eq!(session.history(10).len(), 1);

    session.teach_at(&second, 0).unwrap();
    let labelled: Vec<_> = session.history(10).iter().map(|e| e.sample_id).collect();
    assert_eq!(labelled, vec![first.sample_id, second.sample_id]);
}

// ---------------------------------------------------------------------------
// Readers alongside a writer
// ---------------------------------------------------------------------------

#[test]
fn readers_always_see_consistent_snapshots() {
    let budget = 5;
    let session = shared(8, budget);

    let reader = {
        let session = session.clone();
        thread::spawn(move || {
            for _ in 0..500 {
                let snap = session.snapshot();
                assert_eq!(snap.accuracy.len(), snap.status.queries_completed + 1);
                assert_eq!(snap.events.len(), snap.status.queries_completed);
                assert_eq!(snap.status.pool_size + snap.status.queries_completed, 8);
                assert!(snap.status.queries_completed <= budget);
            }
        })
    };

    while session.status().state != SessionState::Finished {
        let q = session.query().unwrap();
        session.teach_at(&q, 1).unwrap();
    }
    reader.join().unwrap();

    let snap = session.snapshot();
    assert_eq!(snap.status.queries_completed, budget);
    assert_eq!(snap.recent_events(3).len(), 3);
    assert_eq!(snap.recent_events(3)[2].step, budget);
}
