//! ESP32-S3 sleep hardware
//!
//! Both sleep levels go through the RTC controller: a [`TimerWakeupSource`]
//! for the earliest duration alarm and an [`RtcioWakeupSource`] for pin
//! alarms. RTC IO wakeups are level triggered, so an edge alarm is armed on
//! the level the pin settles at after that edge.

use core::time::Duration;

use esp_hal::gpio::{Input, InputConfig, Pull, RtcPin};
use esp_hal::peripherals::{GPIO0, GPIO14};
use esp_hal::rtc_cntl::Rtc;
use esp_hal::rtc_cntl::sleep::{RtcioWakeupSource, TimerWakeupSource, WakeSource, WakeupLevel};
use heapless::Vec;
use log::{debug, error, info};
use wake_core::{
    AlarmPolicy, AlarmSet, DeepSleep, Edge, HardwareError, InvalidAlarm, SleepHardware, SleepMode,
    WakeCause,
};

use crate::retained_memory;

/// GPIO0, wired to the BOOT button
pub const BOOT_BUTTON_PIN: u8 = 0;
/// GPIO14, free header pin
pub const AUX_WAKE_PIN: u8 = 14;

const WAKE_PINS: [u8; 2] = [BOOT_BUTTON_PIN, AUX_WAKE_PIN];

/// RTC-capable pins usable as wake sources.
pub struct WakePins<'d> {
    pub boot_button: GPIO0<'d>,
    pub aux: GPIO14<'d>,
}

impl WakePins<'_> {
    /// First armed pin alarm whose pin currently sits at its wake level.
    pub fn triggered(&mut self, alarms: &AlarmSet) -> Option<u8> {
        alarms.pin_alarms().find_map(|alarm| {
            let high = self.is_high(alarm.pin())?;
            (high == alarm.edge().active_high()).then_some(alarm.pin())
        })
    }

    fn is_high(&mut self, pin: u8) -> Option<bool> {
        let config = InputConfig::default().with_pull(Pull::None);
        match pin {
            BOOT_BUTTON_PIN => Some(Input::new(self.boot_button.reborrow(), config).is_high()),
            AUX_WAKE_PIN => Some(Input::new(self.aux.reborrow(), config).is_high()),
            _ => None,
        }
    }

    /// RTC IO wake sources for the armed pin alarms.
    ///
    /// Fails with the first pin that has no free RTC pin behind it.
    fn rtc_pins<'a>(
        &'a mut self,
        alarms: &AlarmSet,
    ) -> Result<Vec<(&'a mut dyn RtcPin, WakeupLevel), 2>, HardwareError> {
        let Self { boot_button, aux } = self;
        let mut boot_button: Option<&'a mut dyn RtcPin> = Some(boot_button);
        let mut aux: Option<&'a mut dyn RtcPin> = Some(aux);

        let mut pins: Vec<(&'a mut dyn RtcPin, WakeupLevel), 2> = Vec::new();
        for alarm in alarms.pin_alarms() {
            let rtc_pin = match alarm.pin() {
                BOOT_BUTTON_PIN => boot_button.take(),
                AUX_WAKE_PIN => aux.take(),
                _ => None,
            }
            .ok_or(HardwareError::WakeSource(alarm.pin()))?;
            pins.push((rtc_pin, wakeup_level(alarm.edge())))
                .map_err(|_| HardwareError::WakeSource(alarm.pin()))?;
        }
        Ok(pins)
    }
}

const fn wakeup_level(edge: Edge) -> WakeupLevel {
    if edge.active_high() {
        WakeupLevel::High
    } else {
        WakeupLevel::Low
    }
}

fn timer_source(alarms: &AlarmSet) -> Option<TimerWakeupSource> {
    alarms
        .earliest_duration()
        .map(|alarm| TimerWakeupSource::new(Duration::from_millis(alarm.millis())))
}

fn wake_sources<'s>(
    timer: Option<&'s TimerWakeupSource>,
    rtcio: Option<&'s RtcioWakeupSource<'_, '_>>,
) -> Vec<&'s dyn WakeSource, 2> {
    let mut sources: Vec<&'s dyn WakeSource, 2> = Vec::new();
    if let Some(timer) = timer {
        sources.push(timer).ok();
    }
    if let Some(rtcio) = rtcio {
        sources.push(rtcio).ok();
    }
    sources
}

/// Sleep hardware backed by the ESP32-S3 RTC controller.
pub struct EspSleep<'d> {
    rtc: Rtc<'d>,
    pins: WakePins<'d>,
}

impl<'d> EspSleep<'d> {
    pub fn new(rtc: Rtc<'d>, pins: WakePins<'d>) -> Self {
        Self { rtc, pins }
    }

    /// Retain the token's state and power down. Never returns; the chip
    /// restarts from reset when an alarm fires.
    pub fn enter_deep_sleep(&mut self, sleep: DeepSleep) -> ! {
        if let Err(e) = retained_memory::store(sleep.retained()) {
            error!("Retained state not stored, wake alarm will be unknown: {}", e);
        }

        let alarms = sleep.alarms();
        let timer = timer_source(alarms);
        let mut rtc_pins = self.pins.rtc_pins(alarms).unwrap_or_else(|e| {
            error!("Pin wake sources dropped: {}", e);
            Vec::new()
        });
        let rtcio = (!rtc_pins.is_empty()).then(|| RtcioWakeupSource::new(&mut rtc_pins));
        let sources = wake_sources(timer.as_ref(), rtcio.as_ref());

        info!("Powering down with {} wake source(s)", sources.len());
        self.rtc.sleep_deep(&sources)
    }
}

impl AlarmPolicy for EspSleep<'_> {
    fn check(&self, mode: SleepMode, alarms: &AlarmSet) -> Result<(), InvalidAlarm> {
        for alarm in alarms.pin_alarms() {
            let pin = alarm.pin();
            if !WAKE_PINS.contains(&pin) {
                return Err(InvalidAlarm::UnsupportedPin { pin, mode });
            }
            // Level triggered wakeups cannot wait for both edges of one pin
            if alarms.pin_alarms().filter(|other| other.pin() == pin).count() > 1 {
                return Err(InvalidAlarm::ConflictingEdges { pin });
            }
        }
        Ok(())
    }
}

impl SleepHardware for EspSleep<'_> {
    async fn sleep_light(&mut self, alarms: &AlarmSet) -> Result<WakeCause, HardwareError> {
        let timer = timer_source(alarms);
        let fell_asleep = self.rtc.time_since_power_up().as_micros();
        {
            let mut rtc_pins = self.pins.rtc_pins(alarms)?;
            let rtcio = (!rtc_pins.is_empty()).then(|| RtcioWakeupSource::new(&mut rtc_pins));
            let sources = wake_sources(timer.as_ref(), rtcio.as_ref());
            debug!("Light sleep with {} wake source(s)", sources.len());
            self.rtc.sleep_light(&sources);
        }
        let woke = self.rtc.time_since_power_up().as_micros();

        // The wakeup cause register is only valid after a deep sleep reset, so
        // light sleep wakes are told apart by pin levels and time asleep.
        let slept = embassy_time::Duration::from_micros(woke.saturating_sub(fell_asleep));
        let cause = alarms.light_wake_cause(self.pins.triggered(alarms), slept);
        debug!("Slept {} ms, wake cause {:?}", slept.as_millis(), cause);
        Ok(cause)
    }
}
