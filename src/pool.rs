//! The shrinking set of unlabeled samples.
//!
//! Entries are addressed by position. Removing an entry shifts every later
//! entry down by one, so a position is only meaningful until the next
//! removal. Each entry also carries the [`SampleId`] it was created with,
//! which never changes and is only used for auditing.
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::{Result, SessionError};
use crate::math::Array2;

/// An immutable feature vector. Cloning shares the underlying buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample(Arc<[f32]>);

impl Sample {
    pub fn new(features: Vec<f32>) -> Self {
        Sample(features.into())
    }

    pub fn features(&self) -> &[f32] {
        &self.0
    }
}

impl Deref for Sample {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl AsRef<[f32]> for Sample {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for Sample {
    fn from(features: Vec<f32>) -> Self {
        Sample::new(features)
    }
}

impl From<&[f32]> for Sample {
    fn from(features: &[f32]) -> Self {
        Sample(features.into())
    }
}

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Stable identity of a pool sample: its position in the initial pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SampleId(pub usize);

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PoolEntry {
    pub id: SampleId,
    pub sample: Sample,
}

/// Ordered unlabeled samples with contiguous positional indices.
///
/// Not synchronised; the owning session serialises access.
#[derive(Clone, Debug, Default)]
pub struct Pool {
    entries: Vec<PoolEntry>,
}

impl Pool {
    /// Create a pool; sample ids are assigned from the input order.
    pub fn new<I, S>(samples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Sample>,
    {
        let entries = samples
            .into_iter()
            .enumerate()
            .map(|(i, s)| PoolEntry {
                id: SampleId(i),
                sample: s.into(),
            })
            .collect();
        Pool { entries }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&PoolEntry> {
        self.entries.get(index).ok_or(SessionError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    /// Remove the entry at `index`, preserving the order of the rest.
    pub fn remove(&mut self, index: usize) -> Result<PoolEntry> {
        if index >= self.entries.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoolEntry> + '_ {
        self.entries.iter()
    }

    /// Width of the samples, or `None` for an empty pool.
    pub fn width(&self) -> Option<usize> {
        self.entries.first().map(|e| e.sample.len())
    }

    /// The current pool as one feature batch, row `i` being index `i`.
    ///
    /// Fails with [`SessionError::InvalidConfig`] when the samples do not all
    /// have the same width.
    pub fn to_matrix(&self) -> Result<Array2<f32>> {
        let width = self.width().unwrap_or(0);
        let mut data = Vec::with_capacity(self.entries.len() * width);
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.sample.len() != width {
                return Err(SessionError::InvalidConfig(format!(
                    "pool index {} (sample {}) has {} features, expected {}",
                    index,
                    entry.id,
                    entry.sample.len(),
                    width
                )));
            }
            data.extend_from_slice(&entry.sample);
        }
        Array2::from_shape_vec((self.entries.len(), width), data)
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))
    }
}
