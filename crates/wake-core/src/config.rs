//! Sleep controller configuration

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepConfig {
    /// Enter deep sleep automatically when the program exits cleanly
    pub deep_sleep_on_exit: bool,
    /// Pattern flashed after the program exits with an error
    pub error_signal: ErrorSignal,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            deep_sleep_on_exit: true,
            error_signal: ErrorSignal::default(),
        }
    }
}

/// Status LED pattern repeated forever after an abnormal exit.
///
/// One period is `flashes` on/off pulses followed by a pause.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorSignal {
    pub flashes: u8,
    pub on_ms: u32,
    pub off_ms: u32,
    pub pause_ms: u32,
}

impl ErrorSignal {
    /// Length of one full period in milliseconds
    pub const fn period_ms(&self) -> u64 {
        self.flashes as u64 * (self.on_ms as u64 + self.off_ms as u64) + self.pause_ms as u64
    }
}

impl Default for ErrorSignal {
    fn default() -> Self {
        Self {
            flashes: 3,
            on_ms: 100,
            off_ms: 100,
            pause_ms: 5000,
        }
    }
}
