//! The labelling loop: query, ask the oracle, teach, repeat.
use anyhow::Result;
use serde::Serialize;

use crate::error::SessionError;
use crate::oracle::{Oracle, OracleAnswer};
use crate::session::{SessionState, TeachOutcome};
use crate::shared::SharedSession;

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub queries_completed: usize,
    pub final_state: SessionState,
    pub accuracy: Vec<f32>,
    /// The oracle quit before the session finished.
    pub stopped_early: bool,
}

impl RunSummary {
    fn from_session(session: &SharedSession, stopped_early: bool) -> Self {
        let snapshot = session.snapshot();
        RunSummary {
            queries_completed: snapshot.status.queries_completed,
            final_state: snapshot.status.state,
            accuracy: snapshot.accuracy.to_vec(),
            stopped_early,
        }
    }
}

/// Drive `session` until it finishes or the oracle quits.
///
/// Rejected labels are reported back to the oracle and the same query is
/// asked again; they are never resubmitted automatically. `on_step` runs
/// after every successful teach.
pub fn run_session<O, F>(session: &SharedSession, oracle: &mut O, mut on_step: F) -> Result<RunSummary>
where
    O: Oracle + ?Sized,
    F: FnMut(&TeachOutcome, &SharedSession),
{
    let label_space = session.with_session(|s| s.label_space().clone());

    loop {
        // A query left open by an earlier run is answered before a new one is issued.
        let query = match session.pending() {
            Some(pending) => pending,
            None => match session.query() {
                Ok(query) => query,
                Err(SessionError::EmptyPool) => {
                    log::info!("No more data to query.");
                    break;
                }
                Err(SessionError::InvalidState {
                    state: SessionState::Finished,
                    ..
                }) => break,
                Err(e) => return Err(e.into()),
            },
        };

        loop {
            match oracle.ask(&query, &label_space)? {
                OracleAnswer::Quit => {
                    log::info!("Oracle stopped the session");
                    return Ok(RunSummary::from_session(session, true));
                }
                OracleAnswer::Label(label) => match session.teach_at(&query, label) {
                    Ok(outcome) => {
                        on_step(&outcome, session);
                        break;
                    }
                    Err(e @ SessionError::InvalidLabel { .. }) => oracle.rejected(&query, &e),
                    Err(e) => return Err(e.into()),
                },
            }
        }
    }

    log::info!("Reached the end of the session.");
    Ok(RunSummary::from_session(session, false))
}
