//! Desktop simulator for the wake-alarm sleep controller.
//!
//! Runs small programs against [`SleepController`] on a simulated chip whose
//! sleeps end by scripted events. Deep sleep power cycles the simulated board:
//! the program starts over and the retained state round-trips through a
//! byte array standing in for RTC memory.
//!
//! # Scenarios
//!
//! | Name          | What it shows                                         |
//! |---------------|-------------------------------------------------------|
//! | `light-timer` | light sleep ended by a duration alarm                 |
//! | `interrupted` | light sleep ended by unrelated peripheral activity    |
//! | `deep-pin`    | explicit deep sleep, woken by a pin edge              |
//! | `clean-exit`  | deep sleep on clean exit with registered alarms       |
//! | `error-exit`  | error exit, status LED pattern                        |
//! | `reset`       | reset button pressed during light sleep               |
//! | `all`         | every scenario above (default)                        |
//!
//! Set `RUST_LOG=debug` to see controller internals.

mod chip;

use std::process::ExitCode;

use embassy_futures::block_on;
use embassy_time::Duration;
use log::{error, info, warn};

use wake_core::{
    Alarm, DeepSleep, Edge, ErrorSignal, ExitAction, ProgramExit, ResetReason, SleepConfig,
    SleepController, WakeOutcome,
};

use chip::{Board, SimEvent, SimulatedChip};

/// Button wired to GPIO12 on the simulated board
const BUTTON_PIN: u8 = 12;

/// How a program run ends.
enum ProgramEnd {
    Exited(ProgramExit),
    /// Called `sleep_deep` itself
    Restart(DeepSleep),
}

type Program = fn(&mut SleepController<SimulatedChip>) -> ProgramEnd;

struct Scenario {
    name: &'static str,
    events: &'static [SimEvent],
    program: Program,
    deep_sleep_on_exit: bool,
    /// Stop after this many boots instead of sleeping again
    max_boots: u32,
}

static SCENARIOS: [Scenario; 6] = [
    Scenario {
        name: "light-timer",
        events: &[SimEvent::TimerExpires],
        program: light_timer,
        deep_sleep_on_exit: false,
        max_boots: 1,
    },
    Scenario {
        name: "interrupted",
        events: &[SimEvent::Peripheral, SimEvent::PinEdge(BUTTON_PIN)],
        program: interrupted,
        deep_sleep_on_exit: false,
        max_boots: 1,
    },
    Scenario {
        name: "deep-pin",
        // The unrelated edge on GPIO3 must not wake the chip
        events: &[SimEvent::PinEdge(3), SimEvent::PinEdge(BUTTON_PIN)],
        program: deep_pin,
        deep_sleep_on_exit: true,
        max_boots: 2,
    },
    Scenario {
        name: "clean-exit",
        events: &[SimEvent::Peripheral, SimEvent::TimerExpires],
        program: clean_exit,
        deep_sleep_on_exit: true,
        max_boots: 2,
    },
    Scenario {
        name: "error-exit",
        events: &[],
        program: error_exit,
        deep_sleep_on_exit: true,
        max_boots: 1,
    },
    Scenario {
        name: "reset",
        events: &[SimEvent::ExternalReset],
        program: reset_button,
        deep_sleep_on_exit: false,
        max_boots: 2,
    },
];

fn light_timer(controller: &mut SleepController<SimulatedChip>) -> ProgramEnd {
    let nap = Alarm::after(Duration::from_millis(20));
    match block_on(controller.sleep_light(&[nap])) {
        Ok(WakeOutcome::Alarm(alarm)) => info!("Woke from light sleep on {}", alarm),
        Ok(WakeOutcome::Interrupted(cause)) => warn!("Light sleep interrupted by {:?}", cause),
        Err(e) => {
            error!("Light sleep failed: {}", e);
            return ProgramEnd::Exited(ProgramExit::Error);
        }
    }
    ProgramEnd::Exited(ProgramExit::Clean)
}

/// Sleeps on the button until it is actually pressed.
fn interrupted(controller: &mut SleepController<SimulatedChip>) -> ProgramEnd {
    let button = Alarm::on_edge(BUTTON_PIN, Edge::Falling);
    loop {
        match block_on(controller.sleep_light(&[button])) {
            Ok(WakeOutcome::Alarm(alarm)) => {
                info!("Button pressed ({})", alarm);
                return ProgramEnd::Exited(ProgramExit::Clean);
            }
            Ok(WakeOutcome::Interrupted(cause)) => {
                info!("Spurious wake ({:?}), going back to sleep", cause);
            }
            Err(e) => {
                error!("Light sleep failed: {}", e);
                return ProgramEnd::Exited(ProgramExit::Error);
            }
        }
    }
}

fn deep_pin(controller: &mut SleepController<SimulatedChip>) -> ProgramEnd {
    if controller.reset_reason() == ResetReason::AlarmWake {
        match controller.wake_alarm() {
            Some(alarm) => info!("Restarted by {}", alarm),
            None => warn!("Woken from deep sleep but no alarm matched"),
        }
        return ProgramEnd::Exited(ProgramExit::Clean);
    }

    info!("First boot, waiting for the button in deep sleep");
    match controller.sleep_deep(&[Alarm::on_edge(BUTTON_PIN, Edge::Rising)]) {
        Ok(sleep) => ProgramEnd::Restart(sleep),
        Err(e) => {
            error!("Deep sleep failed: {}", e);
            ProgramEnd::Exited(ProgramExit::Error)
        }
    }
}

fn clean_exit(controller: &mut SleepController<SimulatedChip>) -> ProgramEnd {
    info!(
        "Reset reason: {}, wake alarm: {:?}",
        controller.reset_reason(),
        controller.wake_alarm()
    );
    if controller.reset_reason() == ResetReason::AlarmWake {
        return ProgramEnd::Exited(ProgramExit::ExitCode(0));
    }

    let alarms = [
        Alarm::after(Duration::from_millis(50)),
        Alarm::on_edge(BUTTON_PIN, Edge::Falling),
    ];
    if let Err(e) = controller.set_deep_sleep_alarms(&alarms) {
        error!("Could not register deep sleep alarms: {}", e);
        return ProgramEnd::Exited(ProgramExit::Error);
    }
    ProgramEnd::Exited(ProgramExit::Clean)
}

fn error_exit(controller: &mut SleepController<SimulatedChip>) -> ProgramEnd {
    // GPIO40 is not an RTC GPIO
    let rejected = controller.set_deep_sleep_alarms(&[Alarm::on_edge(40, Edge::Rising)]);
    match rejected {
        Ok(()) => ProgramEnd::Exited(ProgramExit::Clean),
        Err(e) => {
            error!("Could not register deep sleep alarms: {}", e);
            ProgramEnd::Exited(ProgramExit::ExitCode(2))
        }
    }
}

fn reset_button(controller: &mut SleepController<SimulatedChip>) -> ProgramEnd {
    if controller.reset_reason() == ResetReason::ExternalPin {
        info!("Restarted by the reset button");
        return ProgramEnd::Exited(ProgramExit::Clean);
    }

    let button = Alarm::on_edge(BUTTON_PIN, Edge::Falling);
    match block_on(controller.sleep_light(&[button])) {
        Ok(outcome) => {
            warn!("Light sleep ended without a reset: {:?}", outcome);
            ProgramEnd::Exited(ProgramExit::Clean)
        }
        Err(e) => {
            error!("Light sleep failed: {}", e);
            ProgramEnd::Exited(ProgramExit::Error)
        }
    }
}

/// Print one period of the status LED pattern.
fn show_error_signal(signal: ErrorSignal) {
    let mut pattern = String::new();
    for _ in 0..signal.flashes {
        pattern.push_str("* ");
    }
    info!(
        "Status LED: {}(on {} ms, off {} ms, pause {} ms, repeating every {} ms)",
        pattern,
        signal.on_ms,
        signal.off_ms,
        signal.pause_ms,
        signal.period_ms()
    );
}

/// Boot the board repeatedly until the program stops restarting it.
fn run(scenario: &Scenario) -> bool {
    info!("==== scenario {} ====", scenario.name);
    let config = SleepConfig {
        deep_sleep_on_exit: scenario.deep_sleep_on_exit,
        ..SleepConfig::default()
    };
    let mut board = Board::new(scenario.events);

    loop {
        let mut controller = board.boot(config);
        let end = (scenario.program)(&mut controller);
        if board.take_reset() {
            if board.boots() >= scenario.max_boots {
                info!("Boot limit reached, simulation ends here");
                return true;
            }
            continue;
        }

        let sleep = match end {
            ProgramEnd::Restart(sleep) => sleep,
            ProgramEnd::Exited(exit) => match controller.finish(exit) {
                Ok(ExitAction::DeepSleep(sleep)) => sleep,
                Ok(ExitAction::SignalError(signal)) => {
                    show_error_signal(signal);
                    return true;
                }
                Ok(ExitAction::Halt) => {
                    info!("Program finished, board stays awake");
                    return true;
                }
                Err(e) => {
                    error!("Finishing the program failed: {}", e);
                    return false;
                }
            },
        };

        if board.boots() >= scenario.max_boots {
            info!(
                "Entering deep sleep with {} alarm(s), simulation ends here",
                sleep.alarms().len()
            );
            return true;
        }
        board.power_down(sleep);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let wanted = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());
    let selected: Vec<&Scenario> = SCENARIOS
        .iter()
        .filter(|scenario| wanted == "all" || scenario.name == wanted)
        .collect();

    if selected.is_empty() {
        error!("Unknown scenario {:?}", wanted);
        let names: Vec<&str> = SCENARIOS.iter().map(|scenario| scenario.name).collect();
        info!("Available: {}, all", names.join(", "));
        return ExitCode::FAILURE;
    }

    let mut ok = true;
    for scenario in selected {
        ok &= run(scenario);
    }
    info!("Simulator exiting");

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
