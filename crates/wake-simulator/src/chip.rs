//! Simulated chip: scripted wake events and RTC memory that survives reboots

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use wake_core::{
    AlarmPolicy, AlarmSet, BootRecord, DeepSleep, HardwareError, InvalidAlarm, RETAINED_STATE_LEN,
    ResetReason, RetainedState, SleepConfig, SleepController, SleepHardware, SleepMode, WakeCause,
};

/// Highest GPIO that can wake the simulated chip from deep sleep
/// (mirrors the RTC GPIO range of an ESP32-S3).
const MAX_RTC_PIN: u8 = 21;

/// Something that happens while the chip sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// The shortest armed duration elapses
    TimerExpires,
    /// Edge on a GPIO
    PinEdge(u8),
    /// UART, radio or other unrelated activity
    Peripheral,
    /// Reset button pressed
    ExternalReset,
}

/// Events still to happen, shared between the board and the chip of each boot.
pub type EventScript = Rc<RefCell<VecDeque<SimEvent>>>;

/// Set when the reset button is pressed while the program is running.
pub type ResetLine = Rc<Cell<bool>>;

pub struct SimulatedChip {
    events: EventScript,
    reset: ResetLine,
}

impl SimulatedChip {
    pub fn new(events: EventScript, reset: ResetLine) -> Self {
        Self { events, reset }
    }
}

impl AlarmPolicy for SimulatedChip {
    fn check(&self, mode: SleepMode, alarms: &AlarmSet) -> Result<(), InvalidAlarm> {
        if mode == SleepMode::Light {
            return Ok(());
        }
        match alarms.pin_alarms().find(|alarm| alarm.pin() > MAX_RTC_PIN) {
            Some(alarm) => Err(InvalidAlarm::UnsupportedPin {
                pin: alarm.pin(),
                mode,
            }),
            None => Ok(()),
        }
    }
}

impl SleepHardware for SimulatedChip {
    async fn sleep_light(&mut self, alarms: &AlarmSet) -> Result<WakeCause, HardwareError> {
        let Some(event) = self.events.borrow_mut().pop_front() else {
            warn!("Nothing scheduled to end the light sleep");
            return Err(HardwareError::SleepRejected);
        };
        debug!("Light sleep ended by {:?}", event);

        let cause = match event {
            SimEvent::TimerExpires => {
                if let Some(alarm) = alarms.earliest_duration() {
                    thread::sleep(Duration::from_millis(alarm.millis()));
                }
                WakeCause::Timer
            }
            SimEvent::PinEdge(pin) => WakeCause::Pin { pin: Some(pin) },
            SimEvent::Peripheral => WakeCause::Peripheral,
            SimEvent::ExternalReset => {
                // The program never resumes; the board reboots it
                self.reset.set(true);
                return Err(HardwareError::SleepRejected);
            }
        };
        Ok(cause)
    }
}

/// The board around the chip: power cycles it and keeps its RTC memory.
pub struct Board {
    events: EventScript,
    reset: ResetLine,
    rtc_memory: [u8; RETAINED_STATE_LEN],
    next_reason: ResetReason,
    next_cause: WakeCause,
    boots: u32,
}

impl Board {
    pub fn new(events: &[SimEvent]) -> Self {
        Self {
            events: Rc::new(RefCell::new(events.iter().copied().collect())),
            reset: Rc::new(Cell::new(false)),
            rtc_memory: RetainedState::cleared(),
            next_reason: ResetReason::PowerOn,
            next_cause: WakeCause::Undefined,
            boots: 0,
        }
    }

    pub fn boots(&self) -> u32 {
        self.boots
    }

    /// Start the next boot cycle, consuming the RTC memory.
    pub fn boot(&mut self, config: SleepConfig) -> SleepController<SimulatedChip> {
        self.boots += 1;
        info!("---- boot #{} ----", self.boots);

        let bytes = std::mem::replace(&mut self.rtc_memory, RetainedState::cleared());
        let record = BootRecord {
            reason: self.next_reason,
            wake_cause: self.next_cause,
            retained: RetainedState::decode(&bytes),
        };
        let chip = SimulatedChip::new(self.events.clone(), self.reset.clone());
        SleepController::boot(chip, config, record)
    }

    /// Whether the reset button was pressed during the last boot. If so the
    /// next boot starts from an external reset.
    pub fn take_reset(&mut self) -> bool {
        if !self.reset.replace(false) {
            return false;
        }
        info!("Reset pressed, board restarts");
        self.next_reason = ResetReason::ExternalPin;
        self.next_cause = WakeCause::Undefined;
        true
    }

    /// Power down with the token's alarms until an event wakes the chip.
    ///
    /// Events that cannot wake a deep sleeping chip are skipped.
    pub fn power_down(&mut self, sleep: DeepSleep) {
        match sleep.retained().encode() {
            Ok(bytes) => self.rtc_memory = bytes,
            Err(e) => warn!("Retained state lost: {}", e),
        }

        let alarms = sleep.alarms();
        loop {
            let event = self.events.borrow_mut().pop_front();
            let wake = match event {
                Some(SimEvent::TimerExpires) => alarms.earliest_duration().map(|alarm| {
                    thread::sleep(Duration::from_millis(alarm.millis()));
                    (ResetReason::AlarmWake, WakeCause::Timer)
                }),
                Some(SimEvent::PinEdge(pin)) => alarms
                    .pin_alarm(pin)
                    .map(|_| (ResetReason::AlarmWake, WakeCause::Pin { pin: Some(pin) })),
                Some(SimEvent::Peripheral) => None,
                Some(SimEvent::ExternalReset) | None => {
                    Some((ResetReason::ExternalPin, WakeCause::Undefined))
                }
            };

            match wake {
                Some((reason, cause)) => {
                    debug!("Deep sleep ended by {:?}", event);
                    self.next_reason = reason;
                    self.next_cause = cause;
                    return;
                }
                None => debug!("{:?} does not wake a deep sleeping chip", event),
            }
        }
    }
}
