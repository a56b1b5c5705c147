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

//! Sliding-window averaging of frame timings.

use crate::frame::FrameMetrics;
use pulse_core::ProcessId;
use std::collections::VecDeque;
use std::mem;
use std::time::{Duration, Instant};

/// Number of frames averaged when no window size is configured (one second at 60Hz).
pub const DEFAULT_BUFFER_SIZE: usize = 60;

/// Collects per-frame timings and serves their average over the last
/// `buffer_size` frames.
///
/// A running sum is kept alongside the buffer, so pushing a frame costs
/// O(process count) and reading the average costs a single division,
/// independent of the window size.
#[derive(Debug)]
pub struct MetricsRecorder {
    buffer: VecDeque<FrameMetrics>,
    buffer_size: usize,
    sum: FrameMetrics,
    staging: FrameMetrics,
    frame_start: Option<Instant>,
    frames_recorded: u64,
}

impl MetricsRecorder {
    /// Creates a recorder averaging over `buffer_size` frames.
    /// A size of zero falls back to [`DEFAULT_BUFFER_SIZE`].
    pub fn new(buffer_size: usize) -> Self {
        let buffer_size = if buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        Self {
            buffer: VecDeque::with_capacity(buffer_size),
            buffer_size,
            sum: FrameMetrics::default(),
            staging: FrameMetrics::default(),
            frame_start: None,
            frames_recorded: 0,
        }
    }

    /// Opens a new staging record for the frame starting at `at`.
    pub fn record_frame_start(&mut self, at: Instant) {
        self.staging = FrameMetrics {
            frame_id: self.frames_recorded + 1,
            ..Default::default()
        };
        self.frame_start = Some(at);
    }

    /// Adds the time a process spent in its hook to the staging record.
    pub fn record_process_time(&mut self, id: ProcessId, elapsed: Duration) {
        *self.staging.process_times.entry(id).or_default() += elapsed;
    }

    /// Marks the end of the work part of the frame.
    pub fn record_work_end(&mut self, at: Instant) {
        self.staging.work_time = self.since_frame_start(at);
    }

    /// Marks the end of the frame, frame-cap wait included.
    pub fn record_frame_end(&mut self, at: Instant) {
        self.staging.frame_time = self.since_frame_start(at);
    }

    fn since_frame_start(&self, at: Instant) -> Duration {
        self.frame_start
            .map(|start| at.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Moves the staging record into the window.
    ///
    /// When the window is full the oldest frame is evicted and subtracted
    /// from the running sum before the new frame is added.
    pub fn push_completed_frame(&mut self) {
        let frame = mem::take(&mut self.staging);
        self.frame_start = None;
        self.frames_recorded += 1;

        while self.buffer.len() >= self.buffer_size {
            self.evict_oldest();
        }
        self.sum += &frame;
        log::trace!(
            "Frame {} recorded: frame={:?} work={:?}",
            frame.frame_id,
            frame.frame_time,
            frame.work_time
        );
        self.buffer.push_back(frame);
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.buffer.pop_front() {
            self.sum -= &oldest;
        }
        if self.buffer.is_empty() {
            // Nothing left to average; reset so saturation never leaves residue.
            self.sum = FrameMetrics::default();
        }
    }

    /// Returns the average over the frames currently in the window.
    ///
    /// Divides by the number of buffered frames, not by the window size, so
    /// the average is right while the window is still filling. An empty
    /// recorder yields an all-zero record.
    pub fn current_metrics(&self) -> FrameMetrics {
        if self.buffer.is_empty() {
            return FrameMetrics::default();
        }
        let count = u32::try_from(self.buffer.len()).unwrap_or(u32::MAX);
        self.sum.clone() / count
    }

    /// The most recently pushed frame, unaveraged.
    pub fn latest(&self) -> Option<&FrameMetrics> {
        self.buffer.back()
    }

    /// The longest frame currently in the window.
    pub fn peak_frame_time(&self) -> Duration {
        self.buffer
            .iter()
            .map(|f| f.frame_time)
            .max()
            .unwrap_or_default()
    }

    /// Resizes the averaging window. Zero is ignored.
    ///
    /// Shrinking evicts the oldest frames right away so the running sum always
    /// matches the buffer contents.
    pub fn set_buffer_size(&mut self, buffer_size: usize) {
        if buffer_size == 0 {
            return;
        }
        self.buffer_size = buffer_size;
        while self.buffer.len() > self.buffer_size {
            self.evict_oldest();
        }
    }

    /// The configured window size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of frames currently in the window.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no frame has been pushed since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Total frames pushed over the recorder's lifetime.
    pub fn frames_recorded(&self) -> u64 {
        self.frames_recorded
    }

    /// Drops every buffered frame. The lifetime frame counter is kept.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.sum = FrameMetrics::default();
        self.staging = FrameMetrics::default();
        self.frame_start = None;
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_frame(recorder: &mut MetricsRecorder, frame_ms: u64, work_ms: u64) {
        let start = Instant::now();
        recorder.record_frame_start(start);
        recorder.record_work_end(start + Duration::from_millis(work_ms));
        recorder.record_frame_end(start + Duration::from_millis(frame_ms));
        recorder.push_completed_frame();
    }

    #[test]
    fn test_empty_recorder_reports_zero() {
        let recorder = MetricsRecorder::new(4);
        assert_eq!(recorder.current_metrics(), FrameMetrics::default());
        assert!(recorder.latest().is_none());
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_window_keeps_most_recent_frames() {
        let mut recorder = MetricsRecorder::new(2);
        push_frame(&mut recorder, 10, 1);
        push_frame(&mut recorder, 20, 2);
        push_frame(&mut recorder, 30, 3);

        let avg = recorder.current_metrics();
        assert_eq!(avg.frame_time, Duration::from_millis(25));
        assert_eq!(avg.work_time, Duration::from_micros(2500));
        assert_eq!(avg.frame_id, 3);
        assert_eq!(recorder.len(), 2);
        assert_eq!(recorder.frames_recorded(), 3);
    }

    #[test]
    fn test_average_while_window_fills() {
        let mut recorder = MetricsRecorder::new(10);
        push_frame(&mut recorder, 10, 5);
        push_frame(&mut recorder, 30, 5);

        assert_eq!(
            recorder.current_metrics().frame_time,
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_process_times_are_averaged_per_id() {
        let mut recorder = MetricsRecorder::new(2);
        for ms in [4, 8, 12] {
            let start = Instant::now();
            recorder.record_frame_start(start);
            recorder.record_process_time(ProcessId(1), Duration::from_millis(ms));
            recorder.record_work_end(start);
            recorder.record_frame_end(start);
            recorder.push_completed_frame();
        }

        let avg = recorder.current_metrics();
        assert_eq!(avg.process_time(ProcessId(1)), Duration::from_millis(10));
        assert_eq!(
            recorder.latest().map(|f| f.process_time(ProcessId(1))),
            Some(Duration::from_millis(12))
        );
    }

    #[test]
    fn test_frame_ids_increase_from_one() {
        let mut recorder = MetricsRecorder::new(3);
        push_frame(&mut recorder, 1, 1);
        assert_eq!(recorder.latest().map(|f| f.frame_id), Some(1));
        push_frame(&mut recorder, 1, 1);
        assert_eq!(recorder.latest().map(|f| f.frame_id), Some(2));
    }

    #[test]
    fn test_shrinking_window_trims_sum() {
        let mut recorder = MetricsRecorder::new(4);
        for ms in [10, 20, 30, 40] {
            push_frame(&mut recorder, ms, 0);
        }
        recorder.set_buffer_size(2);

        assert_eq!(recorder.len(), 2);
        assert_eq!(
            recorder.current_metrics().frame_time,
            Duration::from_millis(35)
        );
    }

    #[test]
    fn test_zero_buffer_size_is_ignored() {
        let mut recorder = MetricsRecorder::new(3);
        recorder.set_buffer_size(0);
        assert_eq!(recorder.buffer_size(), 3);
        assert_eq!(MetricsRecorder::new(0).buffer_size(), DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_peak_frame_time() {
        let mut recorder = MetricsRecorder::new(3);
        for ms in [5, 50, 7] {
            push_frame(&mut recorder, ms, 0);
        }
        assert_eq!(recorder.peak_frame_time(), Duration::from_millis(50));
    }

    #[test]
    fn test_clear_resets_window() {
        let mut recorder = MetricsRecorder::new(3);
        push_frame(&mut recorder, 10, 5);
        recorder.clear();

        assert!(recorder.is_empty());
        assert_eq!(recorder.current_metrics(), FrameMetrics::default());
        assert_eq!(recorder.frames_recorded(), 1);
    }
}
