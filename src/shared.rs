//! A session handle for concurrent, stateless callers.
//!
//! All mutating calls go through one `Mutex`, so two callers can never both
//! consume the same pending query or overwrite each other's query. After
//! every mutating call, while the lock is still held, an immutable
//! [`SessionSnapshot`] is published. Read-only calls return that snapshot
//! without touching the session lock; a snapshot always describes a single
//! instant.
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::Serialize;

use crate::error::Result;
use crate::history::LabelEvent;
use crate::session::{Query, Session, SessionStatus, TeachOutcome};

/// Read-only view of a session at one instant.
///
/// The histories are shared slices; snapshots taken between two teaches
/// point at the same allocation.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub accuracy: Arc<[f32]>,
    pub events: Arc<[LabelEvent]>,
}

impl SessionSnapshot {
    fn capture(session: &Session) -> Self {
        SessionSnapshot {
            status: session.status(),
            accuracy: session.accuracy_history().into(),
            events: session.label_events().as_slice().into(),
        }
    }

    /// Like `capture`, but keeps `previous`'s histories when no teach has
    /// happened since. Histories are append-only, so equal lengths mean equal
    /// contents.
    fn refresh(session: &Session, previous: &SessionSnapshot) -> Self {
        if previous.events.len() == session.label_events().len()
            && previous.accuracy.len() == session.accuracy_history().len()
        {
            SessionSnapshot {
                status: session.status(),
                accuracy: previous.accuracy.clone(),
                events: previous.events.clone(),
            }
        } else {
            Self::capture(session)
        }
    }

    /// The last `limit` label events, oldest first.
    pub fn recent_events(&self, limit: usize) -> &[LabelEvent] {
        &self.events[self.events.len().saturating_sub(limit)..]
    }
}

pub struct SharedSession {
    session: Mutex<Session>,
    snapshot: RwLock<Arc<SessionSnapshot>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        let snapshot = Arc::new(SessionSnapshot::capture(&session));
        SharedSession {
            session: Mutex::new(session),
            snapshot: RwLock::new(snapshot),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        // Session methods commit only after their last fallible step, so a
        // guard poisoned by a panicking caller still holds a consistent session.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, session: &Session) {
        // Only the session lock holder publishes, so `previous` cannot go stale.
        let previous = self.snapshot();
        let snapshot = Arc::new(SessionSnapshot::refresh(session, &previous));
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }

    pub fn query(&self) -> Result<Query> {
        let mut session = self.lock();
        let result = session.query();
        self.publish(&session);
        result
    }

    pub fn teach(&self, label: i32) -> Result<TeachOutcome> {
        let mut session = self.lock();
        let result = session.teach(label);
        if result.is_ok() {
            self.publish(&session);
        }
        result
    }

    pub fn teach_at(&self, query: &Query, label: i32) -> Result<TeachOutcome> {
        let mut session = self.lock();
        let result = session.teach_at(query, label);
        if result.is_ok() {
            self.publish(&session);
        }
        result
    }

    /// The query currently awaiting a label, if any.
    pub fn pending(&self) -> Option<Query> {
        self.lock().pending().cloned()
    }

    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot().status
    }

    pub fn accuracy_history(&self) -> Vec<f32> {
        self.snapshot().accuracy.to_vec()
    }

    pub fn history(&self, limit: usize) -> Vec<LabelEvent> {
        self.snapshot().recent_events(limit).to_vec()
    }

    /// Run `f` with exclusive access to the session.
    pub fn with_session<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        f(&self.lock())
    }
}
