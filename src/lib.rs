//! active-learner: pool-based active learning sessions.
//!
//! A classifier is fitted on a small labelled seed set, then a [`session::Session`]
//! repeatedly asks an oracle for the label of the most informative pool sample,
//! refits on everything labelled so far and records the accuracy on a held-out
//! evaluation set.
//!
//! The crate is split into small modules: the classifier capability and its
//! implementations (`models`), query strategies (`strategy`), the pool
//! (`pool`), the metrics recorder (`history`), the session state machine
//! (`session`) and its thread-safe handle (`shared`). Data loading, oracles,
//! the labelling loop and HTML reporting are thin collaborators used by the
//! `active-learner` binary.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod history;
pub mod math;
pub mod models;
pub mod oracle;
pub mod pool;
pub mod report;
pub mod runner;
pub mod session;
pub mod shared;
pub mod strategy;
