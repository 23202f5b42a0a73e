//! Synthetic progress estimation.
//!
//! The backend's `progress` field is frequently absent or stuck at a low
//! value while a task is genuinely running. The estimator produces a
//! smoothly increasing percentage for display, asymptotically approaching
//! a ceiling it never claims to pass. It carries no correctness contract
//! beyond "never exceeds 100, never decreases" — the real completion
//! signal is the presence of a result image.

// ---------------------------------------------------------------------------
// Estimator constants
// ---------------------------------------------------------------------------

/// Estimate shown immediately after submission.
pub const INITIAL_ESTIMATE: f64 = 10.0;

/// Value the estimate approaches but never reaches.
pub const ESTIMATE_CEILING: f64 = 95.0;

/// Fraction of the remaining gap to the ceiling consumed per tick.
pub const ESTIMATE_STEP: f64 = 0.05;

/// The estimate stops advancing once it reaches this value.
pub const ESTIMATE_HOLD: f64 = 90.0;

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Running synthetic-progress estimate for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEstimator {
    estimate: f64,
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self {
            estimate: INITIAL_ESTIMATE,
        }
    }
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw estimate (for inspection; the displayed value goes
    /// through [`display`](Self::display)).
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Advance the estimate by one poll tick:
    /// `next = current + (ceiling − current) × step`, while below the
    /// hold threshold. Past the hold threshold the estimate is frozen.
    pub fn tick(&mut self) {
        if self.estimate < ESTIMATE_HOLD {
            self.estimate += (ESTIMATE_CEILING - self.estimate) * ESTIMATE_STEP;
        }
    }

    /// Percentage to display given the backend-reported progress, if any.
    ///
    /// The estimate is a floor: a genuinely higher backend value always
    /// wins. Clamped to 100.
    pub fn display(&self, reported: Option<u8>) -> u8 {
        let floored = self.estimate.floor() as u8;
        floored.max(reported.unwrap_or(0)).min(100)
    }

    #[cfg(test)]
    pub(crate) fn from_estimate(estimate: f64) -> Self {
        Self { estimate }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
