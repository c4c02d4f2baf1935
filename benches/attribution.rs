use clinscribe::attribution::{AttributionEngine, DiarizedInterval, TranscriptSegment};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

const CLINICIAN_LINES: &[&str] = &[
    "How long have you had the pain?",
    "I recommend we start ibuprofen, 400 milligrams twice a day.",
    "Let me check your blood pressure.",
    "You should come back if the symptoms get worse.",
];

const PATIENT_LINES: &[&str] = &[
    "It started about a week ago.",
    "I'm worried it's something serious.",
    "My back hurts when I sit for too long.",
    "Should I be taking anything else?",
];

/// A consultation of `turns` alternating two-second turns.
fn consultation(turns: usize) -> (Vec<DiarizedInterval>, Vec<TranscriptSegment>) {
    let mut intervals = Vec::with_capacity(turns);
    let mut segments = Vec::with_capacity(turns);
    for i in 0..turns {
        let start = i as f64 * 2.0;
        let (speaker, lines) = if i % 2 == 0 {
            ("SPEAKER_00", CLINICIAN_LINES)
        } else {
            ("SPEAKER_01", PATIENT_LINES)
        };
        intervals.push(DiarizedInterval::new(start, start + 2.0, speaker));
        segments.push(TranscriptSegment::new(
            start + 0.1,
            start + 1.9,
            lines[(i / 2) % lines.len()],
        ));
    }
    (intervals, segments)
}

fn criterion_benchmark(c: &mut Criterion) {
    let engine = AttributionEngine::default();

    let mut group = c.benchmark_group("resolve_labels");
    for turns in [20, 200, 2000] {
        let (intervals, segments) = consultation(turns);
        group.bench_with_input(
            BenchmarkId::from_parameter(turns),
            &(intervals, segments),
            |b, (intervals, segments)| {
                b.iter(|| engine.resolve_labels(black_box(intervals), black_box(segments), None, None))
            },
        );
    }
    group.finish();

    let (_, segments) = consultation(200);
    c.bench_function("resolve_labels_without_diarization", |b| {
        b.iter(|| engine.resolve_labels(&[], black_box(&segments), None, None))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
