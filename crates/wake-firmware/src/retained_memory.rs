//! RTC fast memory slot that survives deep sleep

use esp_hal::ram;
use log::debug;
use wake_core::{RETAINED_STATE_LEN, RetainedState, RetainedStateError};

/// Not initialised at startup, so it keeps whatever the last run wrote.
#[ram(unstable(rtc_fast, persistent))]
static mut RETAINED_SLOT: [u8; RETAINED_STATE_LEN] = [0; RETAINED_STATE_LEN];

/// Write `state` into the slot.
pub fn store(state: &RetainedState) -> Result<(), RetainedStateError> {
    let bytes = state.encode()?;
    critical_section::with(|_| {
        // SAFETY: the slot is only touched inside critical sections
        unsafe { (&raw mut RETAINED_SLOT).write(bytes) };
    });
    debug!("Stored {} retained alarm(s)", state.armed().len());
    Ok(())
}

/// Read the slot and clear it, so a later reset cannot see stale alarms.
pub fn take() -> Option<RetainedState> {
    let bytes = critical_section::with(|_| {
        // SAFETY: the slot is only touched inside critical sections
        unsafe { (&raw mut RETAINED_SLOT).replace(RetainedState::cleared()) }
    });
    RetainedState::decode(&bytes)
}
