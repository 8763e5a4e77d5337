//! Alarm values and alarm sets
//!
//! An [`Alarm`] describes one condition that can end a sleep. Alarms are
//! plain values: two alarms with the same parameters are the same alarm.
//! The [`time`] and [`pin`] modules hold the concrete alarm kinds.

pub mod pin;
pub mod time;

use core::fmt;

use embassy_time::Duration;
use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::InvalidAlarm;

pub use pin::{Edge, PinAlarm};
pub use time::DurationAlarm;

/// Maximum number of alarms that can be armed for a single sleep
pub const MAX_ALARMS: usize = 8;

/// Tag identifying the kind of an [`Alarm`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    Duration,
    PinEdge,
}

impl AlarmKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Duration => "duration",
            Self::PinEdge => "pin edge",
        }
    }
}

/// A single wake condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alarm {
    /// Elapsed wall-clock time
    Duration(DurationAlarm),
    /// Digital edge on a pin
    PinEdge(PinAlarm),
}

impl Alarm {
    /// Alarm that fires once `duration` has elapsed.
    pub const fn after(duration: Duration) -> Self {
        Self::Duration(DurationAlarm::new(duration))
    }

    /// Alarm that fires on `edge` of GPIO `pin`.
    pub const fn on_edge(pin: u8, edge: Edge) -> Self {
        Self::PinEdge(PinAlarm::new(pin, edge))
    }

    pub const fn kind(&self) -> AlarmKind {
        match self {
            Self::Duration(_) => AlarmKind::Duration,
            Self::PinEdge(_) => AlarmKind::PinEdge,
        }
    }

    pub const fn as_duration(&self) -> Option<&DurationAlarm> {
        match self {
            Self::Duration(alarm) => Some(alarm),
            Self::PinEdge(_) => None,
        }
    }

    pub const fn as_pin(&self) -> Option<&PinAlarm> {
        match self {
            Self::PinEdge(alarm) => Some(alarm),
            Self::Duration(_) => None,
        }
    }
}

impl From<DurationAlarm> for Alarm {
    fn from(value: DurationAlarm) -> Self {
        Self::Duration(value)
    }
}

impl From<PinAlarm> for Alarm {
    fn from(value: PinAlarm) -> Self {
        Self::PinEdge(value)
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration(alarm) => write!(f, "after {} ms", alarm.millis()),
            Self::PinEdge(alarm) => write!(f, "{} edge on pin {}", alarm.edge(), alarm.pin()),
        }
    }
}

/// What the hardware reports as the cause of a wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    /// The sleep timer expired
    Timer,
    /// A wake pin changed level. `None` when the hardware cannot tell which one.
    Pin { pin: Option<u8> },
    /// Unrelated peripheral activity (UART, radio, touch, ...)
    Peripheral,
    /// Not a wake from sleep
    Undefined,
}

/// Set of alarms with value identity.
///
/// Inserting an alarm equal to one already present keeps a single copy.
/// Deserialization goes through [`AlarmSet::from_alarms`] as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<Alarm, MAX_ALARMS>",
    into = "Vec<Alarm, MAX_ALARMS>"
)]
pub struct AlarmSet {
    alarms: Vec<Alarm, MAX_ALARMS>,
}

impl AlarmSet {
    pub const fn new() -> Self {
        Self { alarms: Vec::new() }
    }

    /// Build a set from a list of alarms, dropping duplicates.
    pub fn from_alarms(alarms: &[Alarm]) -> Result<Self, InvalidAlarm> {
        let mut set = Self::new();
        for alarm in alarms {
            set.insert(*alarm)?;
        }
        Ok(set)
    }

    /// Add an alarm. Returns `false` if an equal alarm was already present.
    pub fn insert(&mut self, alarm: Alarm) -> Result<bool, InvalidAlarm> {
        if self.contains(&alarm) {
            return Ok(false);
        }
        self.alarms
            .push(alarm)
            .map_err(|_| InvalidAlarm::TooMany { max: MAX_ALARMS })?;
        Ok(true)
    }

    pub fn contains(&self, alarm: &Alarm) -> bool {
        self.alarms.contains(alarm)
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn clear(&mut self) {
        self.alarms.clear();
    }

    pub fn as_slice(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Alarm> {
        self.alarms.iter()
    }

    /// Shortest armed duration.
    ///
    /// A chip has a single sleep timer, so this is the value it gets
    /// programmed with when several duration alarms are armed.
    pub fn earliest_duration(&self) -> Option<DurationAlarm> {
        self.iter().filter_map(Alarm::as_duration).copied().min()
    }

    pub fn pin_alarms(&self) -> impl Iterator<Item = &PinAlarm> {
        self.iter().filter_map(Alarm::as_pin)
    }

    /// Pin alarm armed on `pin`, if any.
    pub fn pin_alarm(&self, pin: u8) -> Option<&PinAlarm> {
        self.pin_alarms().find(|alarm| alarm.pin() == pin)
    }

    /// Map a hardware wake cause to the armed alarm that fired.
    ///
    /// Returns `None` when the wake was not caused by any armed alarm.
    pub fn resolve(&self, cause: WakeCause) -> Option<Alarm> {
        match cause {
            WakeCause::Timer => self.earliest_duration().map(Alarm::Duration),
            WakeCause::Pin { pin: Some(pin) } => self.pin_alarm(pin).copied().map(Alarm::PinEdge),
            WakeCause::Pin { pin: None } => self.pin_alarms().next().copied().map(Alarm::PinEdge),
            WakeCause::Peripheral | WakeCause::Undefined => None,
        }
    }

    /// Wake cause of a light sleep on hardware that cannot report one.
    ///
    /// `triggered_pin` is an armed pin still sitting at its wake level and
    /// `slept` the time spent asleep. The timer only counts once the
    /// earliest duration has fully elapsed; a pin pulse that is already
    /// over is reported as an unknown pin.
    pub fn light_wake_cause(&self, triggered_pin: Option<u8>, slept: Duration) -> WakeCause {
        if let Some(pin) = triggered_pin {
            return WakeCause::Pin { pin: Some(pin) };
        }
        match self.earliest_duration() {
            Some(alarm) if slept >= alarm.duration() => WakeCause::Timer,
            _ if self.pin_alarms().next().is_some() => WakeCause::Pin { pin: None },
            _ => WakeCause::Peripheral,
        }
    }
}

impl TryFrom<Vec<Alarm, MAX_ALARMS>> for AlarmSet {
    type Error = InvalidAlarm;

    fn try_from(alarms: Vec<Alarm, MAX_ALARMS>) -> Result<Self, Self::Error> {
        Self::from_alarms(&alarms)
    }
}

impl From<AlarmSet> for Vec<Alarm, MAX_ALARMS> {
    fn from(set: AlarmSet) -> Self {
        set.alarms
    }
}

impl<'a> IntoIterator for &'a AlarmSet {
    type Item = &'a Alarm;
    type IntoIter = core::slice::Iter<'a, Alarm>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
