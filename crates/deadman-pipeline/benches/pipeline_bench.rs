// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Pipeline Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the full per-event `process` cost,
//! including fingerprint folding and telemetry collection.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use deadman_pipeline::{NoopAdapter, Pipeline};
use deadman_types::{AgentEvent, Clock, KernelConfig, ManualClock};

fn make_pipeline(clock: Arc<ManualClock>) -> Pipeline {
    let adapter = Box::new(NoopAdapter::new(clock.clone() as Arc<dyn Clock>));
    Pipeline::new(KernelConfig::default(), clock, adapter).unwrap()
}

fn bench_process_single_event(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(0));
    let mut pipeline = make_pipeline(Arc::clone(&clock));
    // Zero tokens and tool calls keep every iteration on the allowed
    // path; the budget window never fills mid-benchmark.
    let event = AgentEvent::new(0, 0, 0, 40, 256).with_output_hash("h");
    c.bench_function("pipeline_process_event", |b| {
        b.iter(|| pipeline.process(black_box(&event)).unwrap())
    });
}

fn bench_run_100_events(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(0));
    let events: Vec<AgentEvent> = (0..100u64)
        .map(|i| AgentEvent::new(i * 1_000, 500, 1, 40, 256).with_output_hash(format!("h{i}")))
        .collect();
    c.bench_function("pipeline_run_100_events", |b| {
        b.iter(|| {
            let mut pipeline = make_pipeline(Arc::clone(&clock));
            pipeline.run(black_box(&events)).unwrap()
        })
    });
}

criterion_group!(benches, bench_process_single_event, bench_run_100_events);
criterion_main!(benches);
