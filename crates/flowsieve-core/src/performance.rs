//! # Performance Metrics
//!
//! Waiting times between directly following activities, measured on the
//! parts of each case that agree with the model.
//!
//! Every case is replayed along the alignment of its trace variant:
//! synchronous moves contribute the time since the previous synchronous
//! event, log moves are skipped, and a model move breaks the chain (the
//! event the model expects never happened, so there is no time to measure
//! across it).

use crate::conformance::{Alignment, TraceAlignment};
use crate::{FlowError, ProjectedCase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Duration statistics of one edge, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDurations {
    pub count: u64,
    pub min: i64,
    pub max: i64,
    /// Saturates at `i64::MAX`.
    pub sum: i64,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; 0 for a single observation.
    pub stdev: f64,
}

impl EdgeDurations {
    /// Summarize a non-empty list of durations.
    #[allow(clippy::float_arithmetic)]
    fn from_samples(mut samples: Vec<i64>) -> Option<Self> {
        samples.sort_unstable();
        let count = samples.len();
        let min = *samples.first()?;
        let max = *samples.last()?;
        let sum = samples.iter().fold(0i64, |acc, &s| acc.saturating_add(s));
        let mean = sum as f64 / count as f64;
        let median = if count % 2 == 1 {
            samples[count / 2] as f64
        } else {
            (samples[count / 2 - 1] as f64 + samples[count / 2] as f64) / 2.0
        };
        let stdev = if count > 1 {
            let squares: f64 = samples
                .iter()
                .map(|&s| {
                    let delta = s as f64 - mean;
                    delta * delta
                })
                .sum();
            (squares / (count - 1) as f64).sqrt()
        } else {
            0.0
        };

        Some(Self {
            count: count as u64,
            min,
            max,
            sum,
            mean,
            median,
            stdev,
        })
    }
}

/// Durations per edge, keyed `source -> target -> stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub edges: BTreeMap<String, BTreeMap<String, EdgeDurations>>,
}

impl PerformanceMetrics {
    #[must_use]
    pub fn edge(&self, source: &str, target: &str) -> Option<&EdgeDurations> {
        self.edges.get(source)?.get(target)
    }
}

/// Aggregates case timings along alignments.
pub trait PerformanceEngine: Send + Sync {
    fn measure(
        &self,
        cases: &[ProjectedCase],
        alignments: &[TraceAlignment],
    ) -> Result<PerformanceMetrics, FlowError>;
}

/// Edge waiting times over synchronous moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDurationEngine;

impl EdgeDurationEngine {
    fn replay(
        case: &ProjectedCase,
        alignment: &Alignment,
        samples: &mut BTreeMap<(String, String), Vec<i64>>,
    ) -> Result<(), FlowError> {
        let mut position = 0usize;
        let mut previous: Option<usize> = None;

        for step in &alignment.moves {
            match (&step.log, &step.model) {
                (Some(_), Some(_)) => {
                    let event = case.events.get(position).ok_or_else(|| {
                        FlowError::invalid(format!(
                            "alignment is longer than case '{}'",
                            case.object_id
                        ))
                    })?;
                    if let Some(prev) = previous.and_then(|p| case.events.get(p)) {
                        samples
                            .entry((prev.activity.clone(), event.activity.clone()))
                            .or_default()
                            .push(event.timestamp.saturating_sub(prev.timestamp));
                    }
                    previous = Some(position);
                    position += 1;
                }
                (Some(_), None) => position += 1,
                (None, _) => previous = None,
            }
        }
        Ok(())
    }
}

impl PerformanceEngine for EdgeDurationEngine {
    fn measure(
        &self,
        cases: &[ProjectedCase],
        alignments: &[TraceAlignment],
    ) -> Result<PerformanceMetrics, FlowError> {
        let by_variant: BTreeMap<&[String], &Alignment> = alignments
            .iter()
            .filter_map(|a| Some((a.activities.as_slice(), a.alignment.as_ref()?)))
            .collect();

        let mut samples: BTreeMap<(String, String), Vec<i64>> = BTreeMap::new();
        for case in cases {
            let activities: Vec<String> = case.activities().map(str::to_string).collect();
            let Some(alignment) = by_variant.get(activities.as_slice()) else {
                continue;
            };
            Self::replay(case, alignment, &mut samples)?;
        }

        let mut metrics = PerformanceMetrics::default();
        for ((source, target), durations) in samples {
            if let Some(stats) = EdgeDurations::from_samples(durations) {
                metrics.edges.entry(source).or_default().insert(target, stats);
            }
        }
        Ok(metrics)
    }
}
