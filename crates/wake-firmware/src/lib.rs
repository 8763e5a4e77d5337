//! ESP32-S3 firmware-specific modules for the wake-alarm sleep controller
//!
//! This crate contains the hardware-specific code that cannot compile on
//! desktop targets: RTC sleep and wake source setup, reset reason decoding,
//! RTC memory for state retained across deep sleep, and the status LED.

#![no_std]

pub mod boot;
pub mod hardware;
pub mod program;
pub mod retained_memory;
pub mod status_led;
