//! Error types for alarm arming and sleep control

use thiserror_no_std::Error;

use crate::registry::SleepMode;
use crate::reset::ResetReason;

/// Reasons an alarm set cannot be armed for a sleep request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidAlarm {
    /// A sleep with no wake sources would never end.
    #[error("no alarms given to wake from sleep")]
    Empty,
    #[error("more than {max} alarms given")]
    TooMany { max: usize },
    #[error("pin {pin} cannot wake the chip from {mode} sleep")]
    UnsupportedPin { pin: u8, mode: SleepMode },
    #[error("pin {pin} is armed for both edges")]
    ConflictingEdges { pin: u8 },
}

/// Failures reported by the platform while entering or leaving a low-power mode.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    #[error("wake source for pin {0} could not be configured")]
    WakeSource(u8),
    #[error("chip refused to enter low-power mode")]
    SleepRejected,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainedStateError {
    #[error("retained state does not fit in {0} bytes")]
    TooLarge(usize),
}

/// Top-level error for sleep controller operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeError {
    #[error("invalid alarm: {0}")]
    InvalidAlarm(InvalidAlarm),
    #[error("reset reason already set to {0}")]
    AlreadySet(ResetReason),
    #[error("hardware error: {0}")]
    Hardware(HardwareError),
    #[error("retained state error: {0}")]
    Retained(RetainedStateError),
    #[error("controller is powering down for deep sleep")]
    ShuttingDown,
}

impl From<InvalidAlarm> for WakeError {
    fn from(value: InvalidAlarm) -> Self {
        Self::InvalidAlarm(value)
    }
}

impl From<HardwareError> for WakeError {
    fn from(value: HardwareError) -> Self {
        Self::Hardware(value)
    }
}

impl From<RetainedStateError> for WakeError {
    fn from(value: RetainedStateError) -> Self {
        Self::Retained(value)
    }
}
