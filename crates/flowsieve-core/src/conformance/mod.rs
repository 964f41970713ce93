//! # Conformance
//!
//! Aligns the traces of a log against a filtered DFG.
//!
//! An alignment pairs every log step with a model step. A step present on
//! both sides is synchronous; a step only in the log is a log move; a step
//! only in the model is a model move. The cost counts the non-synchronous
//! moves.

mod aligner;

pub use aligner::DfgAligner;

use crate::assembler::FilteredDfg;
use crate::ProjectedTrace;
use serde::{Deserialize, Serialize};

/// One step of an alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentMove {
    /// Log activity, absent for model moves.
    pub log: Option<String>,
    /// Model activity, absent for log moves.
    pub model: Option<String>,
}

impl AlignmentMove {
    #[must_use]
    pub fn synchronous(activity: impl Into<String>) -> Self {
        let activity = activity.into();
        Self {
            log: Some(activity.clone()),
            model: Some(activity),
        }
    }

    #[must_use]
    pub fn log_only(activity: impl Into<String>) -> Self {
        Self {
            log: Some(activity.into()),
            model: None,
        }
    }

    #[must_use]
    pub fn model_only(activity: impl Into<String>) -> Self {
        Self {
            log: None,
            model: Some(activity.into()),
        }
    }

    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        self.log.is_some() && self.log == self.model
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    pub moves: Vec<AlignmentMove>,
    pub cost: u64,
}

/// The alignment of one trace variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAlignment {
    pub activities: Vec<String>,
    pub count: u64,
    /// `None` when the model admits no alignment.
    pub alignment: Option<Alignment>,
}

/// Computes optimal alignments against a DFG.
pub trait AlignmentEngine: Send + Sync {
    /// Align `activities` against `model`, or `None` if no alignment exists.
    fn align(&self, model: &FilteredDfg, activities: &[String]) -> Option<Alignment>;
}

/// Align every trace variant against `model`.
pub fn align_traces<E: AlignmentEngine + ?Sized>(
    engine: &E,
    model: &FilteredDfg,
    traces: &[ProjectedTrace],
) -> Vec<TraceAlignment> {
    traces
        .iter()
        .map(|trace| TraceAlignment {
            activities: trace.activities.clone(),
            count: trace.count,
            alignment: engine.align(model, &trace.activities),
        })
        .collect()
}
