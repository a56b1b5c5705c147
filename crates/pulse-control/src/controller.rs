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

//! The frame loop.
//!
//! [`ProcessController::run`] drives one start frame, loop frames until a
//! stop is requested or the schedule empties, then one stop frame. Each frame
//! walks the schedule in order and interprets what every process reports:
//!
//! | Reported state | Privilege | Effect |
//! |---|---|---|
//! | `RequestKill` | `High` | controller `Killed`, rest of the frame skipped |
//! | `RequestKill` / `RequestStop` | `Low` or more | controller `Stopping`, frame finishes |
//! | `RemoveSelf` | any | removed from the schedule |
//! | anything else | any | nothing |
//!
//! In loop frames a process reporting `SkipThisFrame` or above is not run,
//! but its state is still interpreted. Start and stop frames run every live
//! process.

use crate::config::ControllerConfig;
use crate::error::{ControlError, ControlResult};
use crate::instance::{lock_unit, Phase, ProcessInstance};
use crate::schedule::ProcessSchedule;
use crate::state::{ControlHandle, ControllerState};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use pulse_core::{
    frequency_to_period, Clock, ControlState, Ordinal, Privilege, Process, ProcessHandle,
    ProcessId,
};
use pulse_telemetry::{FrameMetrics, MetricsRecorder};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

/// Drives registered processes frame by frame on the calling thread.
pub struct ProcessController {
    clock: Arc<dyn Clock>,
    config: ControllerConfig,
    schedule: ProcessSchedule,
    recorder: MetricsRecorder,
    handle: ControlHandle,
    next_id: u64,
    has_run: bool,
    subscribers: Vec<Sender<FrameMetrics>>,
    last_summary: Option<Instant>,
}

impl ProcessController {
    /// Creates a controller with the default configuration.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(clock, ControllerConfig::default())
    }

    /// Creates a controller from an explicit configuration.
    pub fn with_config(clock: Arc<dyn Clock>, config: ControllerConfig) -> Self {
        Self {
            clock,
            recorder: MetricsRecorder::new(config.metrics_window),
            config,
            schedule: ProcessSchedule::new(),
            handle: ControlHandle::new(),
            next_id: 0,
            has_run: false,
            subscribers: Vec::new(),
            last_summary: None,
        }
    }

    #[inline]
    fn target(&self) -> &str {
        &self.config.log_target
    }

    /// Registers a process. The controller keeps only a weak reference; the
    /// caller must hold on to `unit` for as long as it should be scheduled.
    pub fn add_process<P: Process + 'static>(
        &mut self,
        unit: &Arc<Mutex<P>>,
        privilege: Privilege,
        ordinal: Ordinal,
        name: Option<&str>,
    ) -> ProcessId {
        let handle: ProcessHandle = unit.clone();
        self.insert(Arc::downgrade(&handle), privilege, ordinal, name)
    }

    /// Registers a process from a weak reference.
    ///
    /// Returns `None` and schedules nothing if the reference is already empty.
    pub fn add_weak(
        &mut self,
        unit: Weak<Mutex<dyn Process>>,
        privilege: Privilege,
        ordinal: Ordinal,
        name: Option<&str>,
    ) -> Option<ProcessId> {
        if unit.strong_count() == 0 {
            log::warn!(target: self.target(), "Ignoring registration of an empty process handle");
            return None;
        }
        Some(self.insert(unit, privilege, ordinal, name))
    }

    fn insert(
        &mut self,
        unit: Weak<Mutex<dyn Process>>,
        privilege: Privilege,
        ordinal: Ordinal,
        name: Option<&str>,
    ) -> ProcessId {
        self.next_id += 1;
        let id = ProcessId(self.next_id);
        let instance = ProcessInstance::new(
            id,
            unit,
            privilege,
            ordinal,
            name,
            &self.config.default_name_prefix,
        );
        log::debug!(
            target: self.target(),
            "Registered '{}' {} ({:?}, {:?})",
            instance.name(),
            id,
            ordinal,
            privilege
        );
        if !self.schedule.add(instance) {
            log::warn!(target: self.target(), "{} was dropped before it could be scheduled", id);
        }
        id
    }

    /// Unschedules a process. Returns false if it was not scheduled.
    pub fn remove_process(&mut self, id: ProcessId) -> bool {
        match self.schedule.remove(id) {
            Some(instance) => {
                log::debug!(target: self.target(), "Removed '{}' {}", instance.name(), id);
                true
            }
            None => false,
        }
    }

    /// Caps the loop to `frames_per_second`. `0` removes the cap.
    pub fn set_frame_cap(&mut self, frames_per_second: u32) {
        self.config.frame_cap = frames_per_second;
    }

    /// The configured frame cap, `0` if uncapped.
    pub fn frame_cap(&self) -> u32 {
        self.config.frame_cap
    }

    /// Resizes the metrics averaging window. `0` is ignored.
    pub fn set_metrics_window(&mut self, frames: usize) {
        self.recorder.set_buffer_size(frames);
        self.config.metrics_window = self.recorder.buffer_size();
    }

    /// The current controller state.
    pub fn state(&self) -> ControllerState {
        self.handle.state()
    }

    /// A handle that can stop or kill this controller from another thread.
    pub fn handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    /// Requests a graceful stop: the current frame finishes, then the stop
    /// phase runs. Repeated calls have no further effect.
    pub fn stop(&self) {
        if self.handle.stop() {
            log::info!(target: self.target(), "Stop requested");
        }
    }

    /// Kills the controller. The stop phase will not run.
    pub fn kill(&self) {
        self.handle.kill();
        log::info!(target: self.target(), "Kill requested");
    }

    /// The average over the metrics window.
    pub fn metrics(&self) -> FrameMetrics {
        self.recorder.current_metrics()
    }

    /// The last completed frame, unaveraged.
    pub fn latest_frame(&self) -> Option<&FrameMetrics> {
        self.recorder.latest()
    }

    /// Number of scheduled processes.
    pub fn process_count(&self) -> usize {
        self.schedule.len()
    }

    /// Name of a scheduled process.
    pub fn process_name(&self, id: ProcessId) -> Option<&str> {
        self.schedule.get(id).map(ProcessInstance::name)
    }

    /// Read access to the schedule.
    pub fn schedule(&self) -> &ProcessSchedule {
        &self.schedule
    }

    /// Returns a channel receiving a copy of every completed frame.
    ///
    /// Frames are dropped for this subscriber while its buffer is full.
    pub fn subscribe_metrics(&mut self, capacity: usize) -> Receiver<FrameMetrics> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        self.subscribers.push(tx);
        rx
    }

    /// Runs the controller to completion on the calling thread.
    ///
    /// Returns the final state: `Stopped` after a clean shutdown, `Killed`
    /// after a forced one. A controller runs at most once; later calls return
    /// [`ControlError::AlreadyRun`] and change nothing. Panics raised inside
    /// process hooks are not caught.
    pub fn run(&mut self) -> ControlResult<ControllerState> {
        if self.has_run {
            let state = self.state();
            log::warn!(target: self.target(), "run() called again in state {:?}", state);
            return Err(ControlError::AlreadyRun(state));
        }
        self.has_run = true;

        if self.state() == ControllerState::Killed {
            log::info!(target: self.target(), "Killed before start; nothing to run");
            return Ok(ControllerState::Killed);
        }

        self.handle.advance(ControllerState::Starting);
        log::info!(
            target: self.target(),
            "Starting {} processes (frame cap: {})",
            self.schedule.len(),
            self.config.frame_cap
        );
        self.run_frame(Phase::Start);
        if self.state() == ControllerState::Killed {
            log::info!(target: self.target(), "Killed during start phase");
            return Ok(ControllerState::Killed);
        }

        self.handle.advance(ControllerState::Running);
        while !self.schedule.is_empty() && self.state() < ControllerState::Stopping {
            self.run_frame(Phase::Loop);
        }
        if self.state() == ControllerState::Killed {
            log::info!(
                target: self.target(),
                "Killed after {} frames; skipping stop phase",
                self.recorder.frames_recorded()
            );
            return Ok(ControllerState::Killed);
        }

        self.handle.advance(ControllerState::Stopping);
        log::info!(target: self.target(), "Stopping {} processes", self.schedule.len());
        self.run_frame(Phase::Stop);
        self.handle.advance(ControllerState::Stopped);

        let state = self.state();
        log::info!(
            target: self.target(),
            "Controller finished in state {:?} after {} frames",
            state,
            self.recorder.frames_recorded()
        );
        Ok(state)
    }

    /// Runs one frame: `phase` on every eligible process, then metrics and the
    /// frame-cap wait.
    fn run_frame(&mut self, phase: Phase) {
        let frame_start = self.clock.now();
        self.recorder.record_frame_start(frame_start);

        self.schedule.begin();
        while let Some(instance) = self.schedule.current() {
            let id = instance.id();
            let privilege = instance.privilege();
            let Some(unit) = instance.upgrade() else {
                log::debug!(
                    target: self.target(),
                    "'{}' {} was dropped by its owner; removing",
                    instance.name(),
                    id
                );
                self.schedule.remove(id);
                continue;
            };

            let held_back = phase.is_gated()
                && lock_unit(&unit).control_state() >= ControlState::SkipThisFrame;
            let should_run = !held_back && self.state() < ControllerState::Stopped;
            if should_run {
                let started = self.clock.now();
                phase.invoke(&mut *lock_unit(&unit));
                let elapsed = self.clock.now().saturating_duration_since(started);
                self.recorder.record_process_time(id, elapsed);
            }

            let reported = lock_unit(&unit).control_state();
            match reported {
                ControlState::RequestKill if privilege.may_kill() => {
                    log::info!(target: self.target(), "{} requested kill", id);
                    self.handle.kill();
                    break;
                }
                ControlState::RequestKill | ControlState::RequestStop if privilege.may_stop() => {
                    if self.handle.stop() {
                        log::info!(target: self.target(), "{} requested stop", id);
                    }
                }
                ControlState::RemoveSelf => {
                    log::debug!(target: self.target(), "{} removed itself", id);
                    // The cursor has already moved on to the successor.
                    self.schedule.remove(id);
                    continue;
                }
                ControlState::RequestKill | ControlState::RequestStop => {
                    log::trace!(
                        target: self.target(),
                        "{} lacks privilege for {:?} ({:?})",
                        id,
                        reported,
                        privilege
                    );
                }
                ControlState::Ready | ControlState::SkipThisFrame => {}
            }
            self.schedule.next();
        }

        self.recorder.record_work_end(self.clock.now());
        let period = frequency_to_period(self.config.frame_cap);
        if !period.is_zero() && self.state() != ControllerState::Killed {
            self.clock.wait_until_elapsed(period, frame_start);
        }
        let frame_end = self.clock.now();
        self.recorder.record_frame_end(frame_end);
        self.recorder.push_completed_frame();

        self.publish_latest();
        self.maybe_log_summary(frame_end);
    }

    fn publish_latest(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let Some(frame) = self.recorder.latest() else {
            return;
        };
        self.subscribers.retain(|tx| match tx.try_send(frame.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    fn maybe_log_summary(&mut self, now: Instant) {
        let interval = match Duration::try_from_secs_f64(self.config.summary_interval_secs) {
            Ok(interval) if !interval.is_zero() => interval,
            _ => return,
        };
        let Some(last) = self.last_summary else {
            self.last_summary = Some(now);
            return;
        };
        if now.saturating_duration_since(last) < interval {
            return;
        }
        self.last_summary = Some(now);

        let average = self.recorder.current_metrics();
        log::info!(
            target: self.target(),
            "Frames: {:.1} fps ({:.1} uncapped), work {:.3} ms, peak frame {:.3} ms, {} processes",
            average.frame_rate(),
            average.uncapped_frame_rate(),
            average.work_time.as_secs_f64() * 1000.0,
            self.recorder.peak_frame_time().as_secs_f64() * 1000.0,
            self.schedule.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::ManualClock;

    struct Counter {
        loops: u32,
    }

    impl Process for Counter {
        fn on_loop(&mut self) {
            self.loops += 1;
        }
    }

    fn controller() -> ProcessController {
        ProcessController::new(Arc::new(ManualClock::new()))
    }

    #[test]
    fn test_ids_are_monotonic_and_names_defaulted() {
        let mut ctl = controller();
        let a = Arc::new(Mutex::new(Counter { loops: 0 }));
        let b = Arc::new(Mutex::new(Counter { loops: 0 }));

        let id_a = ctl.add_process(&a, Privilege::None, Ordinal::Main, None);
        let id_b = ctl.add_process(&b, Privilege::None, Ordinal::Main, Some("render"));
        assert!(id_b > id_a);
        assert_eq!(ctl.process_name(id_a), Some("process_1"));
        assert_eq!(ctl.process_name(id_b), Some("render"));

        assert!(ctl.remove_process(id_a));
        let c = Arc::new(Mutex::new(Counter { loops: 0 }));
        let id_c = ctl.add_process(&c, Privilege::None, Ordinal::Main, None);
        assert!(id_c > id_b);
    }

    #[test]
    fn test_add_weak_ignores_empty_handle() {
        let mut ctl = controller();
        let unit: ProcessHandle = Arc::new(Mutex::new(Counter { loops: 0 }));
        let weak = Arc::downgrade(&unit);
        drop(unit);

        assert!(ctl
            .add_weak(weak, Privilege::None, Ordinal::Main, None)
            .is_none());
        assert_eq!(ctl.process_count(), 0);
    }

    #[test]
    fn test_frame_cap_accessors() {
        let mut ctl = controller();
        assert_eq!(ctl.frame_cap(), 0);
        ctl.set_frame_cap(60);
        assert_eq!(ctl.frame_cap(), 60);
    }

    #[test]
    fn test_empty_controller_stops_cleanly() {
        let mut ctl = controller();
        assert_eq!(ctl.run().unwrap(), ControllerState::Stopped);
        assert!(matches!(
            ctl.run(),
            Err(ControlError::AlreadyRun(ControllerState::Stopped))
        ));
    }
}
