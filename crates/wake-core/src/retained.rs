//! State that survives deep sleep
//!
//! Deep sleep powers down RAM, so the armed alarms are written into a small
//! slot of always-on memory (RTC memory on the ESP32) before powering down
//! and read back on the next boot to work out which alarm fired.
//!
//! Encoding is postcard, prefixed with a magic value so that the random
//! contents of that memory after a power-on are not mistaken for state.

use serde::{Deserialize, Serialize};

use crate::alarm::AlarmSet;
use crate::error::RetainedStateError;

/// Size of the retained memory slot in bytes
pub const RETAINED_STATE_LEN: usize = 128;

const RETAINED_MAGIC: u32 = 0x5741_4b45;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedState {
    magic: u32,
    armed: AlarmSet,
}

impl RetainedState {
    pub fn new(armed: AlarmSet) -> Self {
        Self {
            magic: RETAINED_MAGIC,
            armed,
        }
    }

    /// Alarms armed when the chip went into deep sleep
    pub fn armed(&self) -> &AlarmSet {
        &self.armed
    }

    pub fn into_armed(self) -> AlarmSet {
        self.armed
    }

    pub fn encode(&self) -> Result<[u8; RETAINED_STATE_LEN], RetainedStateError> {
        let mut bytes = [0u8; RETAINED_STATE_LEN];
        postcard::to_slice(self, &mut bytes)
            .map_err(|_| RetainedStateError::TooLarge(RETAINED_STATE_LEN))?;
        Ok(bytes)
    }

    /// Decode a retained slot. Returns `None` for anything that was not
    /// written by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match postcard::take_from_bytes::<Self>(bytes) {
            Ok((state, _)) if state.magic == RETAINED_MAGIC => Some(state),
            _ => None,
        }
    }

    /// Slot contents that decode to nothing.
    pub const fn cleared() -> [u8; RETAINED_STATE_LEN] {
        [0; RETAINED_STATE_LEN]
    }
}
