//! Pin alarms

use core::fmt;

use serde::{Deserialize, Serialize};

/// Signal edge a pin alarm waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edge {
    /// Low to high transition
    Rising,
    /// High to low transition
    Falling,
}

impl Edge {
    /// Level the pin sits at once the edge has happened.
    ///
    /// Level-triggered wake hardware is programmed with this value.
    pub const fn active_high(self) -> bool {
        matches!(self, Self::Rising)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Wakes the chip on a digital edge on a GPIO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAlarm {
    pin: u8,
    edge: Edge,
}

impl PinAlarm {
    pub const fn new(pin: u8, edge: Edge) -> Self {
        Self { pin, edge }
    }

    pub const fn rising(pin: u8) -> Self {
        Self::new(pin, Edge::Rising)
    }

    pub const fn falling(pin: u8) -> Self {
        Self::new(pin, Edge::Falling)
    }

    /// GPIO number
    pub const fn pin(&self) -> u8 {
        self.pin
    }

    pub const fn edge(&self) -> Edge {
        self.edge
    }
}
