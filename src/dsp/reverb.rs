//! Reverb - Procedural Impulse Responses
//!
//! A convolution reverb multiplies every input sample by an entire recorded
//! (or generated) room response and sums the overlapping results. Instead of
//! shipping recorded rooms we synthesize the response:
//!
//! ```text
//! amplitude
//!   1.0 ┤▌▖
//!       │▐▙▖
//!       │▐██▙▖▖
//!       │▐█████▙▄▖▖▖
//!   0.0 └──────────────────▶ time
//!        0            duration
//! ```
//!
//! White noise shaped by an exponential decay envelope:
//!
//! ```text
//! h[n] = noise[n] · exp(-decay · t),   t = n / sample_rate
//! ```
//!
//! - **Duration**: length of the buffer (tail length) in seconds
//! - **Decay**: how quickly the envelope falls; larger = shorter, drier tail
//!
//! The final few milliseconds fade linearly to zero so a short buffer does
//! not end in an audible click, and the whole response is normalized to unit
//! energy so the wet level stays comparable across settings.

/// Longest tail accepted, in seconds.
pub const MAX_IMPULSE_SECONDS: f32 = 10.0;
const END_FADE_SECONDS: f32 = 0.005;

/// Generate a decaying-noise impulse response.
///
/// The same `seed` always yields the same buffer.
pub fn impulse_response(sample_rate: f32, duration: f32, decay: f32, seed: u64) -> Vec<f32> {
    let duration = duration.clamp(0.01, MAX_IMPULSE_SECONDS);
    let decay = decay.max(0.0);
    let len = ((duration * sample_rate) as usize).max(1);
    let fade_len = ((END_FADE_SECONDS * sample_rate) as usize).clamp(1, len);

    let mut rng = fastrand::Rng::with_seed(seed);
    let mut impulse: Vec<f32> = (0..len)
        .map(|n| {
            let t = n as f32 / sample_rate;
            let envelope = (-decay * t).exp();
            let remaining = len - n;
            let fade = if remaining < fade_len {
                remaining as f32 / fade_len as f32
            } else {
                1.0
            };
            (rng.f32() * 2.0 - 1.0) * envelope * fade
        })
        .collect();

    let energy: f32 = impulse.iter().map(|x| x * x).sum();
    if energy > f32::EPSILON {
        let norm = energy.sqrt().recip();
        for sample in &mut impulse {
            *sample *= norm;
        }
    }

    impulse
}
