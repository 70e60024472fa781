//! Benchmarks for the stock effects chain.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_synth::synth::{ParamTarget, Synth, SynthConfig};

use crate::BLOCK_SIZES;

pub fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/chain");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Every effect at its default mix, four voices held
        let mut stock = Synth::with_default_effects(SynthConfig::default())
            .expect("default config is valid");
        for key in ["C3", "E3", "G3", "B3"] {
            stock.note_on(key);
        }
        group.bench_with_input(BenchmarkId::new("stock", size), &size, |b, _| {
            b.iter(|| stock.render(black_box(&mut buffer)))
        });

        // Every wet path fully engaged
        let mut wet = Synth::with_default_effects(SynthConfig::default())
            .expect("default config is valid");
        for id in ["distortion", "chorus", "flanger", "phaser", "tremolo", "delay", "reverb"] {
            wet.set_param(ParamTarget::Effect(id.into()), "mix", 1.0)
                .expect("every stock effect has a mix");
        }
        for key in ["C3", "E3", "G3", "B3"] {
            wet.note_on(key);
        }
        group.bench_with_input(BenchmarkId::new("all_wet", size), &size, |b, _| {
            b.iter(|| wet.render(black_box(&mut buffer)))
        });
    }

    group.finish();
}
