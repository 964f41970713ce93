//! # Count Series
//!
//! Step functions mapping a filter threshold to a retained instance count.
//!
//! A `CountSeries` is a list of `CountSeparator`s sorted ascending by upper
//! bound. For a query threshold `t` the count in force is the count of the
//! first separator whose bound is strictly greater than `t`. The last
//! separator always carries `SENTINEL_UPPER_BOUND` and the unfiltered total.
//!
//! On the wire a separator is the pair `[upper_bound, count]` and a series is
//! a plain array of pairs.

use crate::FlowError;
use crate::primitives::SENTINEL_UPPER_BOUND;
use serde::{Deserialize, Serialize};

// =============================================================================
// COUNT SEPARATOR
// =============================================================================

/// One breakpoint of a count series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, u64)", into = "(f64, u64)")]
pub struct CountSeparator {
    /// Exclusive upper bound of the threshold range this count applies to.
    pub upper_bound: f64,
    /// Instances retained within that range.
    pub instance_count: u64,
}

impl CountSeparator {
    #[must_use]
    pub const fn new(upper_bound: f64, instance_count: u64) -> Self {
        Self {
            upper_bound,
            instance_count,
        }
    }
}

impl From<(f64, u64)> for CountSeparator {
    fn from((upper_bound, instance_count): (f64, u64)) -> Self {
        Self::new(upper_bound, instance_count)
    }
}

impl From<CountSeparator> for (f64, u64) {
    fn from(separator: CountSeparator) -> Self {
        (separator.upper_bound, separator.instance_count)
    }
}

// =============================================================================
// COUNT SERIES
// =============================================================================

/// A sorted step function over thresholds.
///
/// Never empty: the sentinel separator is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountSeries(Vec<CountSeparator>);

impl CountSeries {
    /// A series that holds `total` at every threshold.
    #[must_use]
    pub fn unfiltered(total: u64) -> Self {
        Self(vec![CountSeparator::new(SENTINEL_UPPER_BOUND, total)])
    }

    /// Build a series from separators, validating order and the sentinel.
    ///
    /// Redundant separators (equal count to their right neighbour) are
    /// collapsed.
    pub fn from_separators(separators: Vec<CountSeparator>) -> Result<Self, FlowError> {
        let Some(last) = separators.last() else {
            return Err(FlowError::invalid("count series must not be empty"));
        };
        if last.upper_bound != SENTINEL_UPPER_BOUND {
            return Err(FlowError::invalid(format!(
                "count series must end at {}, found {}",
                SENTINEL_UPPER_BOUND, last.upper_bound
            )));
        }
        if separators
            .windows(2)
            .any(|pair| pair[0].upper_bound >= pair[1].upper_bound)
        {
            return Err(FlowError::invalid(
                "count series bounds must be strictly ascending",
            ));
        }

        let mut series = Self(separators);
        series.collapse();
        Ok(series)
    }

    /// Prepend a separator below the current lowest bound.
    ///
    /// A separator at the current lowest bound overwrites its count; a
    /// separator repeating the current lowest count is redundant and dropped.
    pub fn prepend(&mut self, threshold: f64, instance_count: u64) {
        if let Some(front) = self.0.first_mut() {
            if front.upper_bound == threshold {
                front.instance_count = instance_count;
                return;
            }
            if front.instance_count == instance_count {
                return;
            }
        }
        self.0.insert(0, CountSeparator::new(threshold, instance_count));
    }

    /// The count in force at `threshold`.
    #[must_use]
    pub fn count_at(&self, threshold: f64) -> u64 {
        self.0
            .iter()
            .find(|separator| separator.upper_bound > threshold)
            .or_else(|| self.0.last())
            .map_or(0, |separator| separator.instance_count)
    }

    /// The unfiltered total held by the sentinel separator.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.last().map_or(0, |separator| separator.instance_count)
    }

    /// Whether the entity retains any instance at `threshold`.
    #[must_use]
    pub fn is_visible_at(&self, threshold: f64) -> bool {
        self.count_at(threshold) > 0
    }

    /// Every bound except the sentinel, ascending.
    pub fn breakpoints(&self) -> impl Iterator<Item = f64> + '_ {
        self.0
            .iter()
            .map(|separator| separator.upper_bound)
            .filter(|bound| *bound < SENTINEL_UPPER_BOUND)
    }

    /// Whether counts never decrease as the threshold grows.
    #[must_use]
    pub fn is_monotone(&self) -> bool {
        self.0
            .windows(2)
            .all(|pair| pair[0].instance_count <= pair[1].instance_count)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[CountSeparator] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &CountSeparator> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn collapse(&mut self) {
        let mut collapsed: Vec<CountSeparator> = Vec::with_capacity(self.0.len());
        for separator in self.0.iter().rev() {
            match collapsed.last() {
                Some(upper) if upper.instance_count == separator.instance_count => {}
                _ => collapsed.push(*separator),
            }
        }
        collapsed.reverse();
        self.0 = collapsed;
    }
}

// =============================================================================
// TESTS
// =============================================================================
