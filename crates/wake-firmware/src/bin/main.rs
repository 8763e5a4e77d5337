#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use embassy_executor::Spawner;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rtc_cntl::Rtc;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info};
use static_cell::StaticCell;
use wake_core::{ExitAction, SharedController, SleepConfig, SleepController};
use wake_firmware::hardware::{EspSleep, WakePins};
use wake_firmware::{boot, program, status_led};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Read the wake pins before anything else reconfigures them
    let mut pins = WakePins {
        boot_button: peripherals.GPIO0,
        aux: peripherals.GPIO14,
    };
    let record = boot::read_boot_record(&mut pins);
    let hardware = EspSleep::new(Rtc::new(peripherals.LPWR), pins);

    static CONTROLLER: StaticCell<SharedController<EspSleep<'static>>> = StaticCell::new();
    let controller = CONTROLLER.init(AsyncMutex::new(SleepController::boot(
        hardware,
        SleepConfig::default(),
        record,
    )));

    let exit = program::run(controller).await;
    info!("Program exited: {:?}", exit);

    let mut controller = controller.lock().await;
    match controller.finish(exit) {
        Ok(ExitAction::DeepSleep(sleep)) => controller.hardware_mut().enter_deep_sleep(sleep),
        Ok(ExitAction::SignalError(signal)) => {
            let mut led = Output::new(peripherals.GPIO21, Level::Low, OutputConfig::default());
            status_led::signal_error(&mut led, signal).await
        }
        Ok(ExitAction::Halt) => loop {
            Timer::after(Duration::from_secs(60)).await;
        },
        Err(e) => {
            error!("Could not finish program: {}", e);
            loop {
                Timer::after(Duration::from_secs(60)).await;
            }
        }
    }
}
