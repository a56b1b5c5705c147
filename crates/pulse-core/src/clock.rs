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

//! Time sources for the frame loop.
//!
//! The controller never calls [`Instant::now`] directly. It goes through a
//! [`Clock`] so tests can swap in a [`ManualClock`] and drive time by hand.

use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A monotonic time source with a blocking wait primitive.
pub trait Clock: Send + Sync {
    /// Returns the current monotonic timestamp.
    fn now(&self) -> Instant;

    /// Blocks until at least `minimum` has elapsed since `since`.
    ///
    /// Returns immediately if that point has already passed. This is the only
    /// blocking call in the scheduler and it cannot be interrupted.
    fn wait_until_elapsed(&self, minimum: Duration, since: Instant);
}

/// The wall clock, backed by [`Instant`] and [`thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wait_until_elapsed(&self, minimum: Duration, since: Instant) {
        if let Some(remaining) = minimum.checked_sub(since.elapsed()) {
            if !remaining.is_zero() {
                log::trace!("Frame cap: sleeping for {remaining:?}");
                thread::sleep(remaining);
            }
        }
    }
}

#[derive(Debug, Default)]
struct ManualState {
    offset: Duration,
    waited: Duration,
}

/// A virtual clock that only moves when told to.
///
/// Waiting on a `ManualClock` never blocks: the clock jumps forward to the
/// end of the wait and records how much time was "slept".
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    auto_advance: Duration,
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// Creates a clock frozen at an arbitrary origin.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            auto_advance: Duration::ZERO,
            state: Mutex::new(ManualState::default()),
        }
    }

    /// Makes every call to [`Clock::now`] move time forward by `step`
    /// after reading it.
    /// ## Arguments
    /// * `step` - The amount of virtual time each `now()` consumes.
    /// ## Returns
    /// The clock, for chaining.
    pub fn with_auto_advance(mut self, step: Duration) -> Self {
        self.auto_advance = step;
        self
    }

    /// Moves virtual time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.offset += delta;
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .offset
    }

    /// Total virtual time spent inside [`Clock::wait_until_elapsed`].
    pub fn total_waited(&self) -> Duration {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .waited
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.base + state.offset;
        state.offset += self.auto_advance;
        now
    }

    fn wait_until_elapsed(&self, minimum: Duration, since: Instant) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let target = (since + minimum).saturating_duration_since(self.base);
        if target > state.offset {
            let gap = target - state.offset;
            state.waited += gap;
            state.offset = target;
        }
    }
}

/// Converts a frequency in Hz to the period of one cycle.
///
/// A frequency of zero maps to a zero period ("uncapped").
#[inline]
pub fn frequency_to_period(hz: u32) -> Duration {
    if hz == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(NANOS_PER_SEC / u64::from(hz))
}

/// Converts a cycle period to a frequency in Hz.
///
/// A zero period maps to zero rather than infinity.
#[inline]
pub fn period_to_frequency(period: Duration) -> f64 {
    let nanos = period.as_nanos();
    if nanos == 0 {
        return 0.0;
    }
    NANOS_PER_SEC as f64 / nanos as f64
}
