//! Time-keeping alarms

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

/// Wakes the chip once the given wall-clock time has elapsed.
///
/// Stored as whole milliseconds so the value can be retained across deep
/// sleep with a stable encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DurationAlarm {
    millis: u64,
}

impl DurationAlarm {
    pub const fn new(duration: Duration) -> Self {
        Self {
            millis: duration.as_millis(),
        }
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self { millis }
    }

    pub const fn millis(&self) -> u64 {
        self.millis
    }

    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.millis)
    }
}

impl From<Duration> for DurationAlarm {
    fn from(value: Duration) -> Self {
        Self::new(value)
    }
}
