//! Append-only metrics of a session: accuracy after every step and the
//! label events that produced them.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pool::{Sample, SampleId};

/// Accuracy on the evaluation set, oldest first. Entry 0 is the seed model.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AccuracyHistory {
    scores: Vec<f32>,
}

impl AccuracyHistory {
    pub fn with_baseline(baseline: f32) -> Self {
        AccuracyHistory {
            scores: vec![baseline],
        }
    }

    pub fn push(&mut self, score: f32) {
        self.scores.push(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.scores
    }

    pub fn latest(&self) -> Option<f32> {
        self.scores.last().copied()
    }

    pub fn baseline(&self) -> Option<f32> {
        self.scores.first().copied()
    }

    /// The last `n` scores, oldest first.
    pub fn recent(&self, n: usize) -> &[f32] {
        tail(&self.scores, n)
    }
}

/// One completed teach step.
#[derive(Clone, Debug, Serialize)]
pub struct LabelEvent {
    /// 1-based number of the teach step.
    pub step: usize,
    pub sample_id: SampleId,
    pub sample: Sample,
    pub label: i32,
    /// Accuracy of the model refitted with this label.
    pub accuracy: f32,
    pub labeled_at: DateTime<Utc>,
}

/// Label events in the order they were taught.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LabelHistory {
    events: Vec<LabelEvent>,
}

impl LabelHistory {
    pub fn push(&mut self, event: LabelEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn as_slice(&self) -> &[LabelEvent] {
        &self.events
    }

    /// The last `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> &[LabelEvent] {
        tail(&self.events, limit)
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
