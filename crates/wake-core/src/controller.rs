//! Sleep controller
//!
//! Owns the alarm registry and the reset reason tracker and drives the
//! power state machine:
//!
//! ```text
//! Running -> LightSleeping -> Running        (resumes in place)
//! Running -> DeepSleeping  -> Restarting     (program starts over)
//! ```
//!
//! Light sleep is an `await` on the platform's [`SleepHardware`]. Deep sleep
//! never returns to the caller: [`SleepController::sleep_deep`] hands back a
//! [`DeepSleep`] token carrying the state to retain, and the platform consumes
//! it to power down. The next boot passes that state back in through
//! [`BootRecord`].

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use log::{debug, info, warn};

use crate::alarm::{Alarm, AlarmSet, WakeCause};
use crate::config::{ErrorSignal, SleepConfig};
use crate::error::{HardwareError, WakeError};
use crate::registry::{AlarmPolicy, AlarmRegistry, SleepMode};
use crate::reset::{ResetReason, ResetReasonTracker};
use crate::retained::RetainedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Running,
    LightSleeping,
    DeepSleeping,
    /// Booting, possibly after a deep sleep
    Restarting,
}

/// Platform side of light sleep.
///
/// The [`AlarmPolicy`] supertrait describes which alarm combinations the
/// chip can wake from.
pub trait SleepHardware: AlarmPolicy {
    /// Enter light sleep until one of `alarms` fires or something else wakes
    /// the chip, and report what woke it.
    fn sleep_light(
        &mut self,
        alarms: &AlarmSet,
    ) -> impl Future<Output = Result<WakeCause, HardwareError>>;
}

/// What the platform knows right after reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootRecord {
    pub reason: ResetReason,
    pub wake_cause: WakeCause,
    /// State written before the last deep sleep, if it survived
    pub retained: Option<RetainedState>,
}

impl BootRecord {
    pub const fn power_on() -> Self {
        Self {
            reason: ResetReason::PowerOn,
            wake_cause: WakeCause::Undefined,
            retained: None,
        }
    }
}

/// Result of a light sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    /// One of the armed alarms fired
    Alarm(Alarm),
    /// The sleep ended for a reason other than an armed alarm
    Interrupted(WakeCause),
}

impl WakeOutcome {
    pub const fn alarm(&self) -> Option<&Alarm> {
        match self {
            Self::Alarm(alarm) => Some(alarm),
            Self::Interrupted(_) => None,
        }
    }
}

/// Permission to power down into deep sleep.
///
/// Carries the state the platform has to retain across the sleep.
#[must_use = "the chip only powers down once the platform consumes this token"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepSleep {
    retained: RetainedState,
}

impl DeepSleep {
    /// Alarms the chip should wake from
    pub fn alarms(&self) -> &AlarmSet {
        self.retained.armed()
    }

    pub fn retained(&self) -> &RetainedState {
        &self.retained
    }

    pub fn into_retained(self) -> RetainedState {
        self.retained
    }
}

/// How the hosted program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramExit {
    /// Returned normally
    Clean,
    /// Exited with an explicit code
    ExitCode(i32),
    /// Uncaught error
    Error,
}

impl ProgramExit {
    /// Clean return or exit code 0
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean | Self::ExitCode(0))
    }
}

/// What the platform must do after the hosted program ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitAction {
    /// Power down with the registered deep sleep alarms
    DeepSleep(DeepSleep),
    /// Flash the error pattern forever
    SignalError(ErrorSignal),
    /// Stay awake and idle
    Halt,
}

/// Owns all wake/alarm state for one boot cycle.
pub struct SleepController<H> {
    hardware: H,
    config: SleepConfig,
    state: PowerState,
    registry: AlarmRegistry,
    reset: ResetReasonTracker,
    /// Registered for the automatic deep sleep on exit. Independent of the
    /// set armed for an explicit sleep.
    deep_sleep_alarms: AlarmSet,
}

/// Controller shared between tasks.
pub type SharedController<H> = AsyncMutex<CriticalSectionRawMutex, SleepController<H>>;

impl<H: SleepHardware> SleepController<H> {
    /// Start a boot cycle.
    ///
    /// Records the reset reason and, after a deep sleep wake, works out which
    /// retained alarm fired.
    pub fn boot(hardware: H, config: SleepConfig, record: BootRecord) -> Self {
        let mut controller = Self {
            hardware,
            config,
            state: PowerState::Restarting,
            registry: AlarmRegistry::new(),
            reset: ResetReasonTracker::new(),
            deep_sleep_alarms: AlarmSet::new(),
        };

        if let Err(e) = controller.reset.set_reason(record.reason) {
            warn!("Reset reason not recorded: {}", e);
        }

        if record.reason == ResetReason::AlarmWake {
            let armed = record
                .retained
                .map(RetainedState::into_armed)
                .unwrap_or_default();
            debug!(
                "Resolving {:?} against {} retained alarm(s)",
                record.wake_cause,
                armed.len()
            );
            match armed.resolve(record.wake_cause) {
                Some(alarm) => {
                    info!("Woke from deep sleep: {}", alarm);
                    controller.registry.set_last_wake(alarm);
                }
                None => warn!(
                    "Woke from deep sleep ({:?}) without a matching retained alarm",
                    record.wake_cause
                ),
            }
        }

        controller.state = PowerState::Running;
        info!("Boot complete, reset reason: {}", controller.reset.get_reason());
        controller
    }

    /// Light sleep until one of `alarms` fires.
    ///
    /// Any peripheral activity may end the sleep early, in which case
    /// [`WakeOutcome::Interrupted`] is returned and the last wake alarm is
    /// left untouched.
    pub async fn sleep_light(&mut self, alarms: &[Alarm]) -> Result<WakeOutcome, WakeError> {
        self.ensure_running()?;
        self.registry
            .arm(alarms, SleepMode::Light, &self.hardware)
            .inspect_err(|e| warn!("Light sleep rejected: {}", e))?;

        let armed = self.registry.take_armed();
        info!("Entering light sleep with {} alarm(s)", armed.len());
        self.state = PowerState::LightSleeping;
        let cause = self.hardware.sleep_light(&armed).await;
        self.state = PowerState::Running;
        let cause = cause?;

        match armed.resolve(cause) {
            Some(alarm) => {
                info!("Woke from light sleep: {}", alarm);
                self.registry.set_last_wake(alarm);
                Ok(WakeOutcome::Alarm(alarm))
            }
            None => {
                warn!("Light sleep interrupted: {:?}", cause);
                Ok(WakeOutcome::Interrupted(cause))
            }
        }
    }

    /// Register the alarms for the automatic deep sleep when the program
    /// exits. Replaces any previous registration; an empty list clears it.
    pub fn set_deep_sleep_alarms(&mut self, alarms: &[Alarm]) -> Result<(), WakeError> {
        self.ensure_running()?;
        let set = AlarmSet::from_alarms(alarms)?;
        if !set.is_empty() {
            self.hardware.check(SleepMode::Deep, &set)?;
        }
        debug!("Registered {} deep sleep alarm(s)", set.len());
        self.deep_sleep_alarms = set;
        Ok(())
    }

    /// Arm `alarms` and prepare to power down.
    ///
    /// On success the controller is in [`PowerState::DeepSleeping`] and
    /// refuses any further request.
    pub fn sleep_deep(&mut self, alarms: &[Alarm]) -> Result<DeepSleep, WakeError> {
        self.ensure_running()?;
        self.registry
            .arm(alarms, SleepMode::Deep, &self.hardware)
            .inspect_err(|e| warn!("Deep sleep rejected: {}", e))?;
        let armed = self.registry.take_armed();
        Ok(self.power_down(armed))
    }

    /// Decide what happens after the hosted program ended.
    ///
    /// A clean exit enters deep sleep with the registered deep sleep alarms,
    /// even when none are registered. Any other exit suppresses deep sleep.
    pub fn finish(&mut self, exit: ProgramExit) -> Result<ExitAction, WakeError> {
        self.ensure_running()?;

        if !exit.is_clean() {
            warn!("Program ended abnormally ({:?}), signalling error", exit);
            return Ok(ExitAction::SignalError(self.config.error_signal));
        }

        if !self.config.deep_sleep_on_exit {
            info!("Program finished, staying awake");
            return Ok(ExitAction::Halt);
        }

        let armed = core::mem::take(&mut self.deep_sleep_alarms);
        if armed.is_empty() {
            warn!("No deep sleep alarms registered, only a reset will wake the chip");
        }
        Ok(ExitAction::DeepSleep(self.power_down(armed)))
    }

    fn power_down(&mut self, armed: AlarmSet) -> DeepSleep {
        info!("Entering deep sleep with {} alarm(s)", armed.len());
        self.state = PowerState::DeepSleeping;
        self.deep_sleep_alarms.clear();
        DeepSleep {
            retained: RetainedState::new(armed),
        }
    }

    fn ensure_running(&self) -> Result<(), WakeError> {
        match self.state {
            PowerState::DeepSleeping => Err(WakeError::ShuttingDown),
            _ => Ok(()),
        }
    }
}

impl<H> SleepController<H> {
    /// The most recent alarm to wake the chip from light or deep sleep.
    pub fn wake_alarm(&self) -> Option<&Alarm> {
        self.registry.last_wake()
    }

    pub fn reset_reason(&self) -> ResetReason {
        self.reset.get_reason()
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn registry(&self) -> &AlarmRegistry {
        &self.registry
    }

    pub fn deep_sleep_alarms(&self) -> &AlarmSet {
        &self.deep_sleep_alarms
    }

    pub fn config(&self) -> &SleepConfig {
        &self.config
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embassy_time::Duration;
    use heapless::Vec;

    use super::*;
    use crate::alarm::{Edge, PinAlarm};
    use crate::error::InvalidAlarm;

    /// Highest pin the scripted chip can wake from in deep sleep.
    const MAX_DEEP_PIN: u8 = 21;

    /// Fake chip that answers each light sleep with the next scripted cause.
    #[derive(Default)]
    struct ScriptedHardware {
        causes: Vec<Result<WakeCause, HardwareError>, 8>,
        next: usize,
        slept_with: Vec<AlarmSet, 8>,
    }

    impl ScriptedHardware {
        fn with_causes(causes: &[Result<WakeCause, HardwareError>]) -> Self {
            Self {
                causes: Vec::from_slice(causes).unwrap(),
                ..Self::default()
            }
        }
    }

    impl AlarmPolicy for ScriptedHardware {
        fn check(&self, mode: SleepMode, alarms: &AlarmSet) -> Result<(), InvalidAlarm> {
            match mode {
                SleepMode::Light => Ok(()),
                SleepMode::Deep => match alarms.pin_alarms().find(|a| a.pin() > MAX_DEEP_PIN) {
                    Some(alarm) => Err(InvalidAlarm::UnsupportedPin {
                        pin: alarm.pin(),
                        mode,
                    }),
                    None => Ok(()),
                },
            }
        }
    }

    impl SleepHardware for ScriptedHardware {
        async fn sleep_light(&mut self, alarms: &AlarmSet) -> Result<WakeCause, HardwareError> {
            self.slept_with.push(alarms.clone()).unwrap();
            let cause = self.causes[self.next];
            self.next += 1;
            cause
        }
    }

    fn booted(causes: &[Result<WakeCause, HardwareError>]) -> SleepController<ScriptedHardware> {
        SleepController::boot(
            ScriptedHardware::with_causes(causes),
            SleepConfig::default(),
            BootRecord::power_on(),
        )
    }

    /// Simulate the power cycle the platform performs with a deep sleep token.
    fn reboot_after(sleep: DeepSleep, cause: WakeCause) -> SleepController<ScriptedHardware> {
        let slot = sleep.retained().encode().unwrap();
        let record = BootRecord {
            reason: ResetReason::AlarmWake,
            wake_cause: cause,
            retained: RetainedState::decode(&slot),
        };
        SleepController::boot(ScriptedHardware::default(), SleepConfig::default(), record)
    }

    #[test]
    fn test_power_on_boot() {
        let controller = booted(&[]);

        assert_eq!(controller.state(), PowerState::Running);
        assert_eq!(controller.reset_reason(), ResetReason::PowerOn);
        assert_eq!(controller.wake_alarm(), None);
    }

    #[test]
    fn test_light_sleep_on_duration_alarm() {
        let mut controller = booted(&[Ok(WakeCause::Timer)]);
        let alarm = Alarm::after(Duration::from_millis(10));

        let outcome = block_on(controller.sleep_light(&[alarm])).unwrap();

        assert_eq!(outcome, WakeOutcome::Alarm(alarm));
        let fired = outcome.alarm().and_then(Alarm::as_duration).unwrap();
        assert_eq!(fired.millis(), 10);
        assert_eq!(controller.wake_alarm(), Some(&alarm));
        assert_eq!(controller.state(), PowerState::Running);
        // Resumed in place, no restart
        assert_eq!(controller.reset_reason(), ResetReason::PowerOn);
    }

    #[test]
    fn test_light_sleep_without_alarms_always_fails() {
        let mut controller = booted(&[]);

        for _ in 0..3 {
            let result = block_on(controller.sleep_light(&[]));
            assert_eq!(result, Err(WakeError::InvalidAlarm(InvalidAlarm::Empty)));
        }
        assert!(controller.hardware().slept_with.is_empty());
        assert_eq!(controller.state(), PowerState::Running);
    }

    #[test]
    fn test_light_sleep_interrupted_by_peripheral() {
        let mut controller = booted(&[Ok(WakeCause::Timer), Ok(WakeCause::Peripheral)]);
        let first = Alarm::after(Duration::from_millis(5));
        block_on(controller.sleep_light(&[first])).unwrap();

        let outcome = block_on(controller.sleep_light(&[Alarm::on_edge(4, Edge::Rising)])).unwrap();

        assert_eq!(outcome, WakeOutcome::Interrupted(WakeCause::Peripheral));
        assert_eq!(outcome.alarm(), None);
        assert_eq!(controller.wake_alarm(), Some(&first));
    }

    #[test]
    fn test_light_sleep_returns_member_of_armed_set() {
        let alarms = [
            Alarm::after(Duration::from_secs(2)),
            Alarm::on_edge(6, Edge::Falling),
            Alarm::after(Duration::from_millis(40)),
        ];
        let mut controller = booted(&[
            Ok(WakeCause::Timer),
            Ok(WakeCause::Pin { pin: Some(6) }),
            Ok(WakeCause::Pin { pin: Some(9) }),
        ]);

        for _ in 0..3 {
            match block_on(controller.sleep_light(&alarms)).unwrap() {
                WakeOutcome::Alarm(alarm) => assert!(alarms.contains(&alarm)),
                WakeOutcome::Interrupted(cause) => {
                    assert_eq!(cause, WakeCause::Pin { pin: Some(9) })
                }
            }
        }
        assert_eq!(controller.wake_alarm(), Some(&Alarm::on_edge(6, Edge::Falling)));
    }

    #[test]
    fn test_light_sleep_consumes_armed_set() {
        let mut controller = booted(&[Ok(WakeCause::Timer), Ok(WakeCause::Timer)]);
        let slow = Alarm::after(Duration::from_secs(1));
        let fast = Alarm::after(Duration::from_millis(1));

        block_on(controller.sleep_light(&[slow, fast])).unwrap();
        assert!(controller.registry().armed().is_empty());

        let outcome = block_on(controller.sleep_light(&[slow])).unwrap();

        // The second request is not merged with the first one
        assert_eq!(outcome, WakeOutcome::Alarm(slow));
        assert_eq!(controller.hardware().slept_with[1].as_slice(), &[slow]);
    }

    #[test]
    fn test_light_sleep_hardware_failure() {
        let mut controller = booted(&[Err(HardwareError::SleepRejected)]);
        let alarm = Alarm::after(Duration::from_millis(10));

        let result = block_on(controller.sleep_light(&[alarm]));

        assert_eq!(result, Err(WakeError::Hardware(HardwareError::SleepRejected)));
        assert_eq!(controller.state(), PowerState::Running);
        assert_eq!(controller.wake_alarm(), None);
    }

    #[test]
    fn test_restart_on_pin_alarm() {
        let mut controller = booted(&[]);
        let alarm = Alarm::on_edge(12, Edge::Rising);

        let sleep = controller.sleep_deep(&[alarm]).unwrap();
        assert_eq!(controller.state(), PowerState::DeepSleeping);
        assert_eq!(sleep.alarms().as_slice(), &[alarm]);

        let rebooted = reboot_after(sleep, WakeCause::Pin { pin: Some(12) });

        assert_eq!(rebooted.reset_reason(), ResetReason::AlarmWake);
        let woke = rebooted.wake_alarm().and_then(Alarm::as_pin).unwrap();
        assert_eq!(*woke, PinAlarm::rising(12));
        assert_eq!(rebooted.state(), PowerState::Running);
    }

    #[test]
    fn test_restart_on_timer_picks_shortest() {
        let mut controller = booted(&[]);
        let alarms = [
            Alarm::after(Duration::from_secs(60)),
            Alarm::after(Duration::from_secs(10)),
        ];

        let sleep = controller.sleep_deep(&alarms).unwrap();
        let rebooted = reboot_after(sleep, WakeCause::Timer);

        assert_eq!(rebooted.wake_alarm(), Some(&alarms[1]));
    }

    #[test]
    fn test_alarm_wake_without_retained_state() {
        let record = BootRecord {
            reason: ResetReason::AlarmWake,
            wake_cause: WakeCause::Timer,
            retained: None,
        };

        let controller =
            SleepController::boot(ScriptedHardware::default(), SleepConfig::default(), record);

        assert_eq!(controller.reset_reason(), ResetReason::AlarmWake);
        assert_eq!(controller.wake_alarm(), None);
    }

    #[test]
    fn test_deep_sleep_without_alarms_fails() {
        let mut controller = booted(&[]);

        let result = controller.sleep_deep(&[]);

        assert_eq!(result, Err(WakeError::InvalidAlarm(InvalidAlarm::Empty)));
        assert_eq!(controller.state(), PowerState::Running);
    }

    #[test]
    fn test_deep_sleep_policy_rejection() {
        let mut controller = booted(&[]);

        let result = controller.sleep_deep(&[Alarm::on_edge(40, Edge::Falling)]);

        assert_eq!(
            result,
            Err(WakeError::InvalidAlarm(InvalidAlarm::UnsupportedPin {
                pin: 40,
                mode: SleepMode::Deep
            }))
        );
        assert!(controller.registry().armed().is_empty());
        // The same pin is fine for light sleep
        let light = AlarmSet::from_alarms(&[Alarm::on_edge(40, Edge::Falling)]).unwrap();
        assert_eq!(controller.hardware().check(SleepMode::Light, &light), Ok(()));
    }

    #[test]
    fn test_requests_refused_after_deep_sleep() {
        let mut controller = booted(&[Ok(WakeCause::Timer)]);
        let alarm = Alarm::after(Duration::from_secs(1));
        let _sleep = controller.sleep_deep(&[alarm]).unwrap();

        assert_eq!(
            block_on(controller.sleep_light(&[alarm])),
            Err(WakeError::ShuttingDown)
        );
        assert_eq!(controller.sleep_deep(&[alarm]), Err(WakeError::ShuttingDown));
        assert_eq!(
            controller.set_deep_sleep_alarms(&[alarm]),
            Err(WakeError::ShuttingDown)
        );
        assert_eq!(controller.finish(ProgramExit::Clean), Err(WakeError::ShuttingDown));
    }

    #[test]
    fn test_clean_exit_without_alarms_enters_deep_sleep() {
        let mut controller = booted(&[]);

        let action = controller.finish(ProgramExit::Clean).unwrap();

        match action {
            ExitAction::DeepSleep(sleep) => assert!(sleep.alarms().is_empty()),
            other => panic!("expected deep sleep, got {:?}", other),
        }
        assert_eq!(controller.state(), PowerState::DeepSleeping);
    }

    #[test]
    fn test_clean_exit_uses_registered_alarms() {
        let mut controller = booted(&[Ok(WakeCause::Timer)]);
        let deep = Alarm::on_edge(0, Edge::Falling);
        let light = Alarm::after(Duration::from_millis(20));
        controller.set_deep_sleep_alarms(&[deep]).unwrap();

        // Light sleep arming does not touch the deep sleep registration
        block_on(controller.sleep_light(&[light])).unwrap();
        assert_eq!(controller.deep_sleep_alarms().as_slice(), &[deep]);

        let action = controller.finish(ProgramExit::ExitCode(0)).unwrap();

        let sleep = match action {
            ExitAction::DeepSleep(sleep) => sleep,
            other => panic!("expected deep sleep, got {:?}", other),
        };
        assert_eq!(sleep.alarms().as_slice(), &[deep]);

        let rebooted = reboot_after(sleep, WakeCause::Pin { pin: None });
        assert_eq!(rebooted.wake_alarm(), Some(&deep));
    }

    #[test]
    fn test_registration_is_replaced_and_can_be_cleared() {
        let mut controller = booted(&[]);
        let first = Alarm::after(Duration::from_secs(1));
        let second = Alarm::after(Duration::from_secs(2));

        controller.set_deep_sleep_alarms(&[first]).unwrap();
        controller.set_deep_sleep_alarms(&[second]).unwrap();
        assert_eq!(controller.deep_sleep_alarms().as_slice(), &[second]);

        controller.set_deep_sleep_alarms(&[]).unwrap();
        assert!(controller.deep_sleep_alarms().is_empty());
    }

    #[test]
    fn test_abnormal_exit_signals_error() {
        for exit in [ProgramExit::Error, ProgramExit::ExitCode(1), ProgramExit::ExitCode(-2)] {
            let mut controller = booted(&[]);
            controller
                .set_deep_sleep_alarms(&[Alarm::after(Duration::from_secs(5))])
                .unwrap();

            let action = controller.finish(exit).unwrap();

            assert_eq!(action, ExitAction::SignalError(ErrorSignal::default()));
            assert_eq!(controller.state(), PowerState::Running);
        }
    }

    #[test]
    fn test_clean_exit_with_deep_sleep_disabled() {
        let config = SleepConfig {
            deep_sleep_on_exit: false,
            ..SleepConfig::default()
        };
        let mut controller =
            SleepController::boot(ScriptedHardware::default(), config, BootRecord::power_on());

        assert_eq!(controller.finish(ProgramExit::Clean), Ok(ExitAction::Halt));
    }

    #[test]
    fn test_shared_controller() {
        let shared: SharedController<ScriptedHardware> =
            AsyncMutex::new(booted(&[Ok(WakeCause::Timer)]));
        let alarm = Alarm::after(Duration::from_millis(10));

        block_on(async {
            let mut controller = shared.lock().await;
            controller.sleep_light(&[alarm]).await.unwrap();
        });

        let controller = block_on(shared.lock());
        assert_eq!(controller.wake_alarm(), Some(&alarm));
    }
}
