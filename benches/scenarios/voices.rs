//! Benchmarks for rendering held and churning voices through the graph.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_synth::synth::{Synth, SynthConfig};

use crate::BLOCK_SIZES;

const CHORD: &[&str] = &["C3", "G3", "C4", "Eb4", "G4", "Bb4", "D5", "F5"];

fn dry_synth() -> Synth {
    let mut synth = Synth::new(SynthConfig::default()).expect("default config is valid");
    synth.ensure_audio().expect("graph builds");
    synth
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // === SINGLE VOICE ===
        // Two detuned saws → filter with envelope → amp envelope
        let mut single = dry_synth();
        single.note_on("A2");
        group.bench_with_input(BenchmarkId::new("single", size), &size, |b, _| {
            b.iter(|| single.render(black_box(&mut buffer)))
        });

        // === EIGHT-VOICE CHORD ===
        let mut chord = dry_synth();
        for key in CHORD {
            chord.note_on(key);
        }
        group.bench_with_input(BenchmarkId::new("chord_8", size), &size, |b, _| {
            b.iter(|| chord.render(black_box(&mut buffer)))
        });

        // === NOTE CHURN ===
        // Retrigger every block: voice build, release scheduling and cleanup
        let mut churn = dry_synth();
        let mut step = 0usize;
        group.bench_with_input(BenchmarkId::new("churn", size), &size, |b, _| {
            b.iter(|| {
                let key = CHORD[step % CHORD.len()];
                churn.stop_voice(CHORD[(step + CHORD.len() - 1) % CHORD.len()]);
                churn.note_on(key);
                churn.render(black_box(&mut buffer));
                step += 1;
            })
        });
    }

    group.finish();
}
