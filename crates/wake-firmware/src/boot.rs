//! Boot-time reset reason and wake cause decoding

use esp_hal::rtc_cntl::{SleepSource, SocResetReason, reset_reason, wakeup_cause};
use esp_hal::system::Cpu;
use log::info;
use wake_core::{BootRecord, ResetReason, WakeCause};

use crate::hardware::WakePins;
use crate::retained_memory;

/// Collect everything the controller needs to start the boot cycle.
///
/// Must run before the wake pins are handed to anything else, while they
/// still sit at the level that woke the chip.
pub fn read_boot_record(pins: &mut WakePins<'_>) -> BootRecord {
    let retained = retained_memory::take();
    let reason = reset_reason(Cpu::ProCpu).map_or(ResetReason::Unknown, classify_reset);
    let source = wakeup_cause();

    let wake_cause = match source {
        SleepSource::Timer => WakeCause::Timer,
        SleepSource::Ext0 | SleepSource::Ext1 | SleepSource::Gpio => WakeCause::Pin {
            pin: retained
                .as_ref()
                .and_then(|state| pins.triggered(state.armed())),
        },
        SleepSource::Undefined => WakeCause::Undefined,
        _ => WakeCause::Peripheral,
    };

    info!(
        "Reset reason {}, wake source {:?}, retained state {}",
        reason,
        source,
        if retained.is_some() { "present" } else { "absent" }
    );

    BootRecord {
        reason,
        wake_cause,
        retained,
    }
}

fn classify_reset(reason: SocResetReason) -> ResetReason {
    match reason {
        SocResetReason::ChipPowerOn => ResetReason::PowerOn,
        SocResetReason::CoreDeepSleep => ResetReason::AlarmWake,
        SocResetReason::CoreSw | SocResetReason::Cpu0Sw => ResetReason::Software,
        SocResetReason::CoreMwdt0
        | SocResetReason::CoreMwdt1
        | SocResetReason::CoreRtcWdt
        | SocResetReason::Cpu0Mwdt0
        | SocResetReason::Cpu0Mwdt1
        | SocResetReason::Cpu0RtcWdt
        | SocResetReason::SysRtcWdt
        | SocResetReason::SysSuperWdt => ResetReason::Watchdog,
        SocResetReason::SysBrownOut => ResetReason::Brownout,
        _ => ResetReason::Unknown,
    }
}
