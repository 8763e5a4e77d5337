//! Alarm registry: what wakes the next sleep, and what woke the last one

use core::fmt;

use crate::alarm::{Alarm, AlarmSet};
use crate::error::InvalidAlarm;

/// Level of sleep a set of alarms is armed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepMode {
    /// CPU and RAM stay powered, execution resumes in place
    Light,
    /// Nearly everything is powered down, the program restarts on wake
    Deep,
}

impl SleepMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Deep => "deep",
        }
    }
}

impl fmt::Display for SleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hardware constraints on which alarms can be armed together.
///
/// Implemented by the platform and handed to [`AlarmRegistry::arm`].
pub trait AlarmPolicy {
    fn check(&self, mode: SleepMode, alarms: &AlarmSet) -> Result<(), InvalidAlarm>;
}

/// Policy that accepts every combination of alarms.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyCombination;

impl AlarmPolicy for AnyCombination {
    fn check(&self, _mode: SleepMode, _alarms: &AlarmSet) -> Result<(), InvalidAlarm> {
        Ok(())
    }
}

/// Typed storage for the armed alarms and the last wake alarm.
///
/// The armed set is replaced on every [`arm`](Self::arm) call and consumed
/// with [`take_armed`](Self::take_armed) when a sleep begins. It is never
/// merged across requests.
#[derive(Debug, Clone, Default)]
pub struct AlarmRegistry {
    armed: AlarmSet,
    last_wake: Option<Alarm>,
}

impl AlarmRegistry {
    pub const fn new() -> Self {
        Self {
            armed: AlarmSet::new(),
            last_wake: None,
        }
    }

    /// Replace the armed set with `alarms`.
    ///
    /// Fails if the set is empty or `policy` rejects the combination. The
    /// previously armed set is left in place on failure.
    pub fn arm(
        &mut self,
        alarms: &[Alarm],
        mode: SleepMode,
        policy: &impl AlarmPolicy,
    ) -> Result<(), InvalidAlarm> {
        let set = AlarmSet::from_alarms(alarms)?;
        if set.is_empty() {
            return Err(InvalidAlarm::Empty);
        }
        policy.check(mode, &set)?;
        self.armed = set;
        Ok(())
    }

    pub fn armed(&self) -> &AlarmSet {
        &self.armed
    }

    /// Consume the armed set, leaving the registry with nothing armed.
    pub fn take_armed(&mut self) -> AlarmSet {
        core::mem::take(&mut self.armed)
    }

    /// Alarm that caused the most recent wake, if any
    pub fn last_wake(&self) -> Option<&Alarm> {
        self.last_wake.as_ref()
    }

    pub fn set_last_wake(&mut self, alarm: Alarm) {
        self.last_wake = Some(alarm);
    }
}

#[cfg(test)]
mod tests {
    use embassy_time::Duration;

    use super::*;
    use crate::alarm::Edge;

    /// Rejects pin alarms in deep sleep.
    struct NoDeepPins;

    impl AlarmPolicy for NoDeepPins {
        fn check(&self, mode: SleepMode, alarms: &AlarmSet) -> Result<(), InvalidAlarm> {
            match (mode, alarms.pin_alarms().next()) {
                (SleepMode::Deep, Some(alarm)) => Err(InvalidAlarm::UnsupportedPin {
                    pin: alarm.pin(),
                    mode,
                }),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_arm_replaces_previous_set() {
        let mut registry = AlarmRegistry::new();
        let first = Alarm::after(Duration::from_millis(10));
        let second = Alarm::on_edge(2, Edge::Rising);

        registry.arm(&[first], SleepMode::Light, &AnyCombination).unwrap();
        registry.arm(&[second], SleepMode::Light, &AnyCombination).unwrap();

        assert_eq!(registry.armed().as_slice(), &[second]);
    }

    #[test]
    fn test_arm_rejects_empty_set() {
        let mut registry = AlarmRegistry::new();

        for mode in [SleepMode::Light, SleepMode::Deep] {
            assert_eq!(registry.arm(&[], mode, &AnyCombination), Err(InvalidAlarm::Empty));
        }
        assert!(registry.armed().is_empty());
    }

    #[test]
    fn test_policy_rejection_keeps_previous_set() {
        let mut registry = AlarmRegistry::new();
        let timer = Alarm::after(Duration::from_secs(1));
        registry.arm(&[timer], SleepMode::Deep, &NoDeepPins).unwrap();

        let result = registry.arm(&[Alarm::on_edge(5, Edge::Falling)], SleepMode::Deep, &NoDeepPins);

        assert_eq!(
            result,
            Err(InvalidAlarm::UnsupportedPin {
                pin: 5,
                mode: SleepMode::Deep
            })
        );
        assert_eq!(registry.armed().as_slice(), &[timer]);
    }

    #[test]
    fn test_take_armed_clears() {
        let mut registry = AlarmRegistry::new();
        let timer = Alarm::after(Duration::from_millis(10));
        registry.arm(&[timer], SleepMode::Light, &AnyCombination).unwrap();

        let taken = registry.take_armed();

        assert_eq!(taken.as_slice(), &[timer]);
        assert!(registry.armed().is_empty());
    }

    #[test]
    fn test_last_wake_is_overwritten() {
        let mut registry = AlarmRegistry::new();
        assert_eq!(registry.last_wake(), None);

        registry.set_last_wake(Alarm::after(Duration::from_millis(10)));
        registry.set_last_wake(Alarm::on_edge(1, Edge::Rising));

        assert_eq!(registry.last_wake(), Some(&Alarm::on_edge(1, Edge::Rising)));
    }
}
