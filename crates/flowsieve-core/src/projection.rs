//! # Log Projection
//!
//! The interface to the object-centric event log.
//!
//! A projection flattens the log onto one object type: every object of that
//! type becomes a case holding the events it takes part in. Parsing OCEL
//! files is the implementor's business; the engine only sees cases and the
//! trace variants grouped from them.

use crate::{FlowError, ObjectType, ProjectedCase, ProjectedTrace};
use std::collections::BTreeMap;

/// Source of single-object-type views of an OCEL log.
pub trait LogProjection: Send + Sync {
    /// Object types present in the log, in deterministic order.
    fn object_types(&self, ocel: &str) -> Result<Vec<ObjectType>, FlowError>;

    /// Every case of `object_type`.
    fn project_cases(&self, ocel: &str, object_type: &str) -> Result<Vec<ProjectedCase>, FlowError>;

    /// Trace variants of `object_type`, with per-step event ids.
    fn project_traces(
        &self,
        ocel: &str,
        object_type: &str,
    ) -> Result<Vec<ProjectedTrace>, FlowError> {
        Ok(variants_from_cases(&self.project_cases(ocel, object_type)?))
    }
}

/// Group cases into trace variants.
///
/// Variants appear in first-seen order. Each step collects the event ids of
/// every case following the variant. Cases without events are skipped.
#[must_use]
pub fn variants_from_cases(cases: &[ProjectedCase]) -> Vec<ProjectedTrace> {
    let mut variants: Vec<ProjectedTrace> = Vec::new();
    let mut index: BTreeMap<Vec<&str>, usize> = BTreeMap::new();

    for case in cases.iter().filter(|c| !c.events.is_empty()) {
        let key: Vec<&str> = case.activities().collect();
        let idx = match index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = variants.len();
                variants.push(
                    ProjectedTrace::new(key.iter().copied(), 0)
                        .with_event_ids(vec![Vec::new(); key.len()]),
                );
                index.insert(key, idx);
                idx
            }
        };

        let variant = &mut variants[idx];
        variant.count = variant.count.saturating_add(1);
        if let Some(steps) = variant.event_ids.as_mut() {
            for (step, event) in steps.iter_mut().zip(&case.events) {
                step.push(event.event_id);
            }
        }
    }

    variants
}

// =============================================================================
// IN-MEMORY PROJECTION
// =============================================================================

/// A projection over logs held in memory, keyed by log name.
///
/// Used by tests and by callers that already hold projected cases.
#[derive(Debug, Clone, Default)]
pub struct MemoryProjection {
    logs: BTreeMap<String, BTreeMap<ObjectType, Vec<ProjectedCase>>>,
}

impl MemoryProjection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the cases of one object type under `ocel`.
    pub fn insert(
        &mut self,
        ocel: impl Into<String>,
        object_type: impl Into<ObjectType>,
        cases: Vec<ProjectedCase>,
    ) {
        self.logs
            .entry(ocel.into())
            .or_default()
            .insert(object_type.into(), cases);
    }

    fn log(&self, ocel: &str) -> Result<&BTreeMap<ObjectType, Vec<ProjectedCase>>, FlowError> {
        self.logs
            .get(ocel)
            .ok_or_else(|| FlowError::NotFound(format!("log '{}'", ocel)))
    }
}

impl LogProjection for MemoryProjection {
    fn object_types(&self, ocel: &str) -> Result<Vec<ObjectType>, FlowError> {
        Ok(self.log(ocel)?.keys().cloned().collect())
    }

    fn project_cases(
        &self,
        ocel: &str,
        object_type: &str,
    ) -> Result<Vec<ProjectedCase>, FlowError> {
        self.log(ocel)?
            .get(object_type)
            .cloned()
            .ok_or_else(|| {
                FlowError::NotFound(format!("object type '{}' in log '{}'", object_type, ocel))
            })
    }
}
