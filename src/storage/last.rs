//! Last-two-points cache used for "latest value" and rate queries.

use crate::storage::{SearchError, Value};

/// One accepted observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: i64,
    pub value: Value,
}

/// The two most recent accepted observations of one series.
///
/// Slots are written round-robin at `index % 2`. A slot is `None` until its
/// first write, so a genuine timestamp of zero is never mistaken for a gap.
#[derive(Debug, Clone, Default)]
pub struct LastPair {
    slots: [Option<Sample>; 2],
    index: usize,
}

impl LastPair {
    /// Record an observation if it is strictly newer than the latest one.
    ///
    /// # Parameters
    ///
    /// - `timestamp` - Observation time
    /// - `value` - Observed value
    ///
    /// # Returns
    ///
    /// Returns `true` if the observation was accepted.
    pub fn push(&mut self, timestamp: i64, value: &Value) -> bool {
        if let Some(latest) = self.latest() {
            if timestamp <= latest.timestamp {
                return false;
            }
        }
        self.slots[self.index % 2] = Some(Sample { timestamp, value: value.clone() });
        self.index += 1;
        true
    }

    /// The most recently accepted observation.
    pub fn latest(&self) -> Option<&Sample> {
        self.slots[(self.index + 1) % 2].as_ref()
    }

    /// The observation accepted just before [`Self::latest`].
    pub fn previous(&self) -> Option<&Sample> {
        self.slots[self.index % 2].as_ref()
    }

    /// The latest value, or with `diff` the rate `(v1 - v0) / (t1 - t0)`
    /// between the previous and latest observations.
    pub fn value(&self, diff: bool) -> Result<f64, SearchError> {
        let latest = self.latest().ok_or(SearchError::InsufficientData)?;
        if !diff {
            return latest.value.as_f64().ok_or(SearchError::NotNumeric);
        }

        let previous = self.previous().ok_or(SearchError::InsufficientData)?;
        let (Some(v1), Some(v0)) = (latest.value.as_f64(), previous.value.as_f64()) else {
            return Err(SearchError::NotNumeric);
        };
        // push() only accepts strictly increasing timestamps, so dt > 0.
        // Widen before subtracting; the i64 gap can overflow.
        let dt = latest.timestamp as f64 - previous.timestamp as f64;
        Ok((v1 - v0) / dt)
    }
}
