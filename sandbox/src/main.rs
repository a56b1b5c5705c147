// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Pulse Sandbox
// Drives a simulated app loop: input polling, a simulation step and a frame
// counter that ends the run after a fixed number of frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_control::{ControllerConfig, ControllerState, ProcessController};
use pulse_core::{ControlState, Ordinal, Privilege, Process, SystemClock};

/// Pulse sandbox: a capped frame loop with a few cooperating processes.
#[derive(Parser, Debug)]
#[command(name = "sandbox", version, about)]
struct Cli {
    /// Path to a controller config JSON file.
    #[arg(long)]
    config: Option<String>,

    /// Frames to run before the budget process asks for a stop.
    #[arg(long, default_value_t = 180)]
    frames: u64,

    /// Frame cap in frames per second, overriding the config file (0 = uncapped).
    #[arg(long)]
    frame_cap: Option<u32>,

    /// Seconds before the watchdog closes the window.
    #[arg(long, default_value_t = 30)]
    watchdog_secs: u64,
}

/// Stands in for a window: once the close flag is raised it asks to kill the loop.
struct WindowEvents {
    close_requested: Arc<AtomicBool>,
}

impl Process for WindowEvents {
    fn on_loop(&mut self) {}

    fn control_state(&self) -> ControlState {
        if self.close_requested.load(Ordering::Relaxed) {
            ControlState::RequestKill
        } else {
            ControlState::Ready
        }
    }
}

#[derive(Default)]
struct Simulation {
    position: f64,
    velocity: f64,
}

impl Process for Simulation {
    fn on_start(&mut self) {
        self.velocity = 1.5;
        log::info!("Simulation started");
    }

    fn on_loop(&mut self) {
        self.position += self.velocity / 60.0;
        // Burn a little CPU so the metrics have something to show.
        let mut acc = 0u64;
        for i in 0..20_000u64 {
            acc = acc.wrapping_add(i * i);
        }
        std::hint::black_box(acc);
    }

    fn on_stop(&mut self) {
        log::info!("Simulation stopped at position {:.3}", self.position);
    }
}

/// Counts frames and asks for a graceful stop after `limit`.
struct FrameBudget {
    frames: u64,
    limit: u64,
}

impl Process for FrameBudget {
    fn on_loop(&mut self) {
        self.frames += 1;
    }

    fn control_state(&self) -> ControlState {
        if self.frames >= self.limit {
            ControlState::RequestStop
        } else {
            ControlState::Ready
        }
    }
}

/// Frames a run publishes: one start frame, `loop_frames`, one stop frame.
fn published_frames(loop_frames: u64) -> usize {
    loop_frames as usize + 2
}

fn load_config(cli: &Cli) -> Result<ControllerConfig> {
    let mut config = match &cli.config {
        Some(path) => ControllerConfig::from_file(path)
            .with_context(|| format!("failed to load controller config from '{path}'"))?,
        None => ControllerConfig {
            frame_cap: 60,
            summary_interval_secs: 1.0,
            ..Default::default()
        },
    };
    if let Some(frame_cap) = cli.frame_cap {
        config.frame_cap = frame_cap;
    }
    Ok(config)
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let mut controller = ProcessController::with_config(Arc::new(SystemClock), config);

    let close_requested = Arc::new(AtomicBool::new(false));
    let window = Arc::new(Mutex::new(WindowEvents {
        close_requested: close_requested.clone(),
    }));
    let simulation = Arc::new(Mutex::new(Simulation::default()));
    let budget = Arc::new(Mutex::new(FrameBudget {
        frames: 0,
        limit: cli.frames,
    }));

    controller.add_process(&window, Privilege::High, Ordinal::Early, Some("window"));
    let simulation_id =
        controller.add_process(&simulation, Privilege::None, Ordinal::Main, Some("simulation"));
    controller.add_process(&budget, Privilege::Low, Ordinal::Late, None);

    // Loop frames plus the start and stop frames.
    let frames = controller.subscribe_metrics(published_frames(cli.frames));
    let watchdog = {
        let handle = controller.handle();
        let timeout = Duration::from_secs(cli.watchdog_secs);
        // Closes the "window" if the loop overruns its budget by a wide margin.
        thread::spawn(move || {
            thread::sleep(timeout);
            if !handle.state().is_terminal() {
                close_requested.store(true, Ordering::Relaxed);
            }
        })
    };

    let state = controller.run()?;
    match state {
        ControllerState::Stopped => log::info!("Sandbox finished cleanly"),
        other => log::warn!("Sandbox ended in state {:?}", other),
    }

    let received = frames.try_iter().count();
    let average = controller.metrics();
    log::info!(
        "{} frames published; windowed average {:.1} fps, simulation {:.3} ms",
        received,
        average.frame_rate(),
        average.process_time(simulation_id).as_secs_f64() * 1000.0
    );
    println!("{}", average.to_json()?);

    // The watchdog only matters while the loop runs; let it die with the process.
    drop(watchdog);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::ManualClock;

    #[test]
    fn test_metrics_channel_holds_every_published_frame() {
        let mut controller = ProcessController::new(Arc::new(ManualClock::new()));
        let budget = Arc::new(Mutex::new(FrameBudget {
            frames: 0,
            limit: 5,
        }));
        controller.add_process(&budget, Privilege::Low, Ordinal::Late, None);
        let frames = controller.subscribe_metrics(published_frames(5));

        assert_eq!(controller.run().unwrap(), ControllerState::Stopped);
        assert_eq!(frames.try_iter().count(), 7);
    }
}
