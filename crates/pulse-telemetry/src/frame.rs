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

//! The timing record captured for a single frame.

use pulse_core::{period_to_frequency, ProcessId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Add, AddAssign, Div, Sub, SubAssign};
use std::time::Duration;

/// Timings for one frame, or an aggregate of several frames.
///
/// The recorder keeps a running sum of these and divides it by the number of
/// buffered frames to get an average, which is why the type supports `+`,
/// `-` and `/`. Process ids missing on either side count as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMetrics {
    /// Id of the frame, or of the newest frame in an aggregate.
    pub frame_id: u64,
    /// Wall time from frame start to frame end, frame-cap wait included.
    pub frame_time: Duration,
    /// Wall time spent running processes, frame-cap wait excluded.
    pub work_time: Duration,
    /// Time spent inside each process hook this frame.
    pub process_times: HashMap<ProcessId, Duration>,
}

impl FrameMetrics {
    /// Frames per second implied by `frame_time`. Zero if no time was recorded.
    #[inline]
    pub fn frame_rate(&self) -> f64 {
        period_to_frequency(self.frame_time)
    }

    /// Frames per second the work alone would allow, ignoring the frame cap.
    #[inline]
    pub fn uncapped_frame_rate(&self) -> f64 {
        period_to_frequency(self.work_time)
    }

    /// Time recorded for a process, zero if it has no entry.
    pub fn process_time(&self, id: ProcessId) -> Duration {
        self.process_times.get(&id).copied().unwrap_or_default()
    }

    /// Serializes the record to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl AddAssign<&FrameMetrics> for FrameMetrics {
    fn add_assign(&mut self, rhs: &FrameMetrics) {
        self.frame_id = self.frame_id.max(rhs.frame_id);
        self.frame_time += rhs.frame_time;
        self.work_time += rhs.work_time;
        for (id, time) in &rhs.process_times {
            *self.process_times.entry(*id).or_default() += *time;
        }
    }
}

impl SubAssign<&FrameMetrics> for FrameMetrics {
    /// Subtracts field by field, saturating at zero. Process entries that
    /// reach zero are dropped since a missing entry already reads as zero.
    fn sub_assign(&mut self, rhs: &FrameMetrics) {
        self.frame_id = self.frame_id.max(rhs.frame_id);
        self.frame_time = self.frame_time.saturating_sub(rhs.frame_time);
        self.work_time = self.work_time.saturating_sub(rhs.work_time);
        for (id, time) in &rhs.process_times {
            if let Some(entry) = self.process_times.get_mut(id) {
                *entry = entry.saturating_sub(*time);
                if entry.is_zero() {
                    self.process_times.remove(id);
                }
            }
        }
    }
}

impl AddAssign for FrameMetrics {
    #[inline]
    fn add_assign(&mut self, rhs: FrameMetrics) {
        *self += &rhs;
    }
}

impl SubAssign for FrameMetrics {
    #[inline]
    fn sub_assign(&mut self, rhs: FrameMetrics) {
        *self -= &rhs;
    }
}

impl Add for FrameMetrics {
    type Output = Self;
    #[inline]
    fn add(mut self, rhs: Self) -> Self::Output {
        self += &rhs;
        self
    }
}

impl Sub for FrameMetrics {
    type Output = Self;
    #[inline]
    fn sub(mut self, rhs: Self) -> Self::Output {
        self -= &rhs;
        self
    }
}

impl Div<u32> for FrameMetrics {
    type Output = Self;
    /// Divides every duration by `divisor`. The frame id is an identifier and
    /// is left as is. Dividing by zero yields an all-zero record.
    fn div(mut self, divisor: u32) -> Self::Output {
        if divisor == 0 {
            return FrameMetrics {
                frame_id: self.frame_id,
                ..Default::default()
            };
        }
        self.frame_time /= divisor;
        self.work_time /= divisor;
        for time in self.process_times.values_mut() {
            *time /= divisor;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame(id: u64, frame_ms: u64, work_ms: u64, procs: &[(u64, u64)]) -> FrameMetrics {
        FrameMetrics {
            frame_id: id,
            frame_time: Duration::from_millis(frame_ms),
            work_time: Duration::from_millis(work_ms),
            process_times: procs
                .iter()
                .map(|(p, ms)| (ProcessId(*p), Duration::from_millis(*ms)))
                .collect(),
        }
    }

    #[test]
    fn test_add_merges_process_times() {
        let sum = frame(1, 10, 4, &[(1, 2), (2, 2)]) + frame(2, 20, 6, &[(2, 3), (3, 1)]);

        assert_eq!(sum.frame_id, 2);
        assert_eq!(sum.frame_time, Duration::from_millis(30));
        assert_eq!(sum.work_time, Duration::from_millis(10));
        assert_eq!(sum.process_time(ProcessId(1)), Duration::from_millis(2));
        assert_eq!(sum.process_time(ProcessId(2)), Duration::from_millis(5));
        assert_eq!(sum.process_time(ProcessId(3)), Duration::from_millis(1));
    }

    #[test]
    fn test_sub_undoes_add_and_keeps_newest_id() {
        let a = frame(1, 10, 4, &[(1, 2)]);
        let b = frame(2, 20, 6, &[(1, 3), (2, 1)]);
        let diff = (a.clone() + b.clone()) - a;

        assert_eq!(diff.frame_id, 2);
        assert_eq!(diff.frame_time, b.frame_time);
        assert_eq!(diff.work_time, b.work_time);
        assert_eq!(diff.process_times, b.process_times);
    }

    #[test]
    fn test_sub_saturates_and_prunes_zero_entries() {
        let diff = frame(3, 5, 5, &[(1, 1)]) - frame(1, 10, 10, &[(1, 4), (9, 2)]);

        assert_eq!(diff.frame_id, 3);
        assert_eq!(diff.frame_time, Duration::ZERO);
        assert_eq!(diff.work_time, Duration::ZERO);
        assert!(diff.process_times.is_empty());
    }

    #[test]
    fn test_div_averages_every_duration() {
        let avg = frame(4, 30, 12, &[(1, 6)]) / 3;

        assert_eq!(avg.frame_id, 4);
        assert_eq!(avg.frame_time, Duration::from_millis(10));
        assert_eq!(avg.work_time, Duration::from_millis(4));
        assert_eq!(avg.process_time(ProcessId(1)), Duration::from_millis(2));
    }

    #[test]
    fn test_div_by_zero_is_empty() {
        let avg = frame(4, 30, 12, &[(1, 6)]) / 0;
        assert_eq!(avg.frame_time, Duration::ZERO);
        assert!(avg.process_times.is_empty());
    }

    #[test]
    fn test_frame_rates() {
        let f = frame(1, 10, 4, &[]);
        assert_relative_eq!(f.frame_rate(), 100.0);
        assert_relative_eq!(f.uncapped_frame_rate(), 250.0);

        let empty = FrameMetrics::default();
        assert_eq!(empty.frame_rate(), 0.0);
        assert_eq!(empty.uncapped_frame_rate(), 0.0);
    }

    #[test]
    fn test_json_export() {
        let json = frame(1, 10, 4, &[(2, 3)]).to_json().unwrap();
        let back: FrameMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.process_time(ProcessId(2)), Duration::from_millis(3));
    }
}
