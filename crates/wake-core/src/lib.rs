//! Hardware-independent core library for wake alarms and sleep control
//!
//! This crate holds the platform-agnostic part of the power management
//! subsystem: alarm values, the alarm registry, the reset reason tracker,
//! the sleep controller state machine and the codec for the state that
//! survives deep sleep.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3)
//! and desktop hosts (for the simulator and tests).

#![no_std]

pub mod alarm;
pub mod config;
pub mod controller;
pub mod error;
pub mod registry;
pub mod reset;
pub mod retained;

pub use alarm::{Alarm, AlarmKind, AlarmSet, DurationAlarm, Edge, MAX_ALARMS, PinAlarm, WakeCause};
pub use config::{ErrorSignal, SleepConfig};
pub use controller::{
    BootRecord, DeepSleep, ExitAction, PowerState, ProgramExit, SharedController, SleepController,
    SleepHardware, WakeOutcome,
};
pub use error::{HardwareError, InvalidAlarm, RetainedStateError, WakeError};
pub use registry::{AlarmPolicy, AlarmRegistry, AnyCombination, SleepMode};
pub use reset::{ResetReason, ResetReasonTracker};
pub use retained::{RETAINED_STATE_LEN, RetainedState};
