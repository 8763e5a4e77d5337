//! Reset reason tracking
//!
//! The reason is recorded once per boot, as early as the platform can
//! determine it, and is read-only afterwards. Recording the same reason
//! again is accepted; recording a different one is rejected with
//! [`WakeError::AlreadySet`] and the stored value is kept.

use core::fmt;

use crate::error::WakeError;

/// Why the current boot cycle began
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Power was applied
    PowerOn,
    /// An armed alarm ended a deep sleep
    AlarmWake,
    /// A watchdog timer expired
    Watchdog,
    /// Software requested a reset
    Software,
    /// Supply voltage dropped too low
    Brownout,
    /// The reset pin was asserted
    ExternalPin,
    /// The previous run panicked
    Panic,
    Unknown,
}

impl ResetReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PowerOn => "power on",
            Self::AlarmWake => "alarm wake",
            Self::Watchdog => "watchdog",
            Self::Software => "software",
            Self::Brownout => "brownout",
            Self::ExternalPin => "external pin",
            Self::Panic => "panic",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResetReasonTracker {
    reason: Option<ResetReason>,
}

impl ResetReasonTracker {
    pub const fn new() -> Self {
        Self { reason: None }
    }

    pub fn set_reason(&mut self, reason: ResetReason) -> Result<(), WakeError> {
        match self.reason {
            None => {
                self.reason = Some(reason);
                Ok(())
            }
            Some(current) if current == reason => Ok(()),
            Some(current) => Err(WakeError::AlreadySet(current)),
        }
    }

    /// Recorded reason, or [`ResetReason::Unknown`] before one was recorded.
    pub fn get_reason(&self) -> ResetReason {
        self.reason.unwrap_or(ResetReason::Unknown)
    }

    pub fn is_set(&self) -> bool {
        self.reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_reads_unknown() {
        let tracker = ResetReasonTracker::new();
        assert!(!tracker.is_set());
        assert_eq!(tracker.get_reason(), ResetReason::Unknown);
    }

    #[test]
    fn test_same_reason_twice_is_accepted() {
        let mut tracker = ResetReasonTracker::new();
        tracker.set_reason(ResetReason::PowerOn).unwrap();
        assert_eq!(tracker.set_reason(ResetReason::PowerOn), Ok(()));
        assert_eq!(tracker.get_reason(), ResetReason::PowerOn);
    }

    #[test]
    fn test_different_reason_is_rejected() {
        let mut tracker = ResetReasonTracker::new();
        tracker.set_reason(ResetReason::AlarmWake).unwrap();

        let result = tracker.set_reason(ResetReason::Watchdog);

        assert_eq!(result, Err(WakeError::AlreadySet(ResetReason::AlarmWake)));
        assert_eq!(tracker.get_reason(), ResetReason::AlarmWake);
    }
}
