//! Error signalling on the status LED

use embassy_time::Timer;
use esp_hal::gpio::Output;
use log::warn;
use wake_core::ErrorSignal;

/// Flash `signal` on `led` forever.
pub async fn signal_error(led: &mut Output<'_>, signal: ErrorSignal) -> ! {
    warn!(
        "Signalling error: {} flash(es) every {} ms",
        signal.flashes,
        signal.period_ms()
    );
    loop {
        for _ in 0..signal.flashes {
            led.set_high();
            Timer::after_millis(u64::from(signal.on_ms)).await;
            led.set_low();
            Timer::after_millis(u64::from(signal.off_ms)).await;
        }
        Timer::after_millis(u64::from(signal.pause_ms)).await;
    }
}
