use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pulse_core::ProcessId;
use pulse_telemetry::MetricsRecorder;
use std::time::{Duration, Instant};

fn push_frames(recorder: &mut MetricsRecorder, processes: u64) {
    let start = Instant::now();
    recorder.record_frame_start(start);
    for id in 0..processes {
        recorder.record_process_time(ProcessId(id), Duration::from_micros(id + 1));
    }
    recorder.record_work_end(start + Duration::from_millis(2));
    recorder.record_frame_end(start + Duration::from_millis(16));
    recorder.push_completed_frame();
}

fn bench_recorder(c: &mut Criterion) {
    let mut group = c.benchmark_group("Metrics Recorder");

    for window in [60usize, 600] {
        let mut recorder = MetricsRecorder::new(window);
        // Fill the window so every measured push also evicts.
        for _ in 0..window {
            push_frames(&mut recorder, 32);
        }

        group.bench_function(format!("Push (window {window}, 32 processes)"), |b| {
            b.iter(|| push_frames(&mut recorder, 32));
        });

        group.bench_function(format!("Average (window {window})"), |b| {
            b.iter(|| black_box(recorder.current_metrics()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_recorder);
criterion_main!(benches);
