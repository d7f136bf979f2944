//! Client-side upload progress estimate.
//!
//! ureq gives no byte-level upload progress, so the percentage advances on a
//! timer and holds below 100 until the response has been accepted.

use std::time::Duration;

/// Interval between progress ticks while an upload is outstanding.
pub const PROGRESS_TICK: Duration = Duration::from_millis(500);

const STEP: u8 = 10;
const CEILING: u8 = 90;
const COMPLETE: u8 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ProgressEstimator {
    percent: u8,
}

impl ProgressEstimator {
    /// Advance one tick. Returns the new value, or `None` once the ceiling is held.
    pub(crate) fn tick(&mut self) -> Option<u8> {
        if self.percent >= CEILING {
            return None;
        }
        self.percent = self.percent.saturating_add(STEP).min(CEILING);
        Some(self.percent)
    }

    pub(crate) fn complete(&mut self) -> u8 {
        self.percent = COMPLETE;
        self.percent
    }
}
