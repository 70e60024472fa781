//! saavy - plays a short phrase through the default output device
//!
//! Run with: RUST_LOG=debug cargo run

use std::{thread, time::Duration};

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use saavy_synth::{
    io::parse_note,
    synth::{ParamTarget, Synth, SynthConfig},
    MAX_BLOCK_SIZE,
};

/// (note, beats held)
const PHRASE: &[(&str, f32)] = &[
    ("C4", 1.0),
    ("Eb4", 1.0),
    ("G4", 0.5),
    ("F4", 0.5),
    ("Eb4", 1.0),
    ("C4", 2.0),
];
const BPM: f32 = 110.0;

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    env_logger::init();

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;

    println!("=== saavy ===");
    println!("Sample rate: {} Hz", sample_rate);
    println!("Channels: {}", channels);
    println!();

    let mut synth = Synth::with_default_effects(SynthConfig {
        sample_rate,
        ..SynthConfig::default()
    })?;
    synth.set_param(ParamTarget::Effect("chorus".into()), "mix", 0.4)?;
    synth.set_param(ParamTarget::Effect("reverb".into()), "mix", 0.3)?;
    synth.ensure_audio().wrap_err("failed to build the audio graph")?;
    let mut handle = synth.handle(256);

    // The synth moves onto the audio thread; the handle stays here.
    let mut render_buf = vec![0.0f32; MAX_BLOCK_SIZE];
    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _| {
            let total_frames = data.len() / channels;
            let mut frames_written = 0;

            while frames_written < total_frames {
                let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                let block = &mut render_buf[..frames];
                synth.render(block);

                // Copy to output (mono to all channels)
                let out_off = frames_written * channels;
                for (i, &s) in block.iter().enumerate() {
                    for ch in 0..channels {
                        data[out_off + i * channels + ch] = s;
                    }
                }
                frames_written += frames;
            }
        },
        |err| eprintln!("Audio error: {}", err),
        None,
    )?;
    stream.play()?;

    let beat = Duration::from_secs_f32(60.0 / BPM);
    for &(name, beats) in PHRASE {
        let note = parse_note(name).ok_or_else(|| eyre!("bad note `{name}`"))?;
        println!("  {name}");
        handle.note_on(note, 100);
        thread::sleep(beat.mul_f32(beats * 0.9));
        handle.note_off(note);
        thread::sleep(beat.mul_f32(beats * 0.1));
    }

    handle.all_notes_off();
    // Let the release and reverb tails ring out.
    thread::sleep(Duration::from_secs(3));
    Ok(())
}
