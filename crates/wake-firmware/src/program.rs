//! The program hosted by the firmware
//!
//! Reports why it started, light sleeps once, registers its deep sleep
//! alarms and returns. The controller then powers down until one of those
//! alarms fires and the program starts over.

use embassy_time::Duration;
use log::{error, info};
use wake_core::{Alarm, Edge, ProgramExit, SharedController, WakeOutcome};

use crate::hardware::{BOOT_BUTTON_PIN, EspSleep};

mod timings {
    include!(concat!(env!("OUT_DIR"), "/sleep_timings.rs"));
}

pub async fn run(controller: &SharedController<EspSleep<'static>>) -> ProgramExit {
    let mut controller = controller.lock().await;

    info!("Started after {}", controller.reset_reason());
    match controller.wake_alarm() {
        Some(alarm) => info!("Woken by {}", alarm),
        None => info!("No wake alarm"),
    }

    let button = Alarm::on_edge(BOOT_BUTTON_PIN, Edge::Falling);
    let nap = Alarm::after(Duration::from_millis(timings::LIGHT_SLEEP_MS));
    match controller.sleep_light(&[nap, button]).await {
        Ok(WakeOutcome::Alarm(alarm)) => info!("Light sleep ended by {}", alarm),
        Ok(WakeOutcome::Interrupted(cause)) => info!("Light sleep interrupted: {:?}", cause),
        Err(e) => {
            error!("Light sleep failed: {}", e);
            return ProgramExit::Error;
        }
    }

    let rest = Alarm::after(Duration::from_secs(timings::DEEP_SLEEP_SECS));
    if let Err(e) = controller.set_deep_sleep_alarms(&[rest, button]) {
        error!("Deep sleep alarms rejected: {}", e);
        return ProgramExit::Error;
    }

    ProgramExit::Clean
}
