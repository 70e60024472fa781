/*
Voice Management
================

A voice is everything one sounding note owns: its oscillator layers, its
filter and its amplitude gain. Voices live in the shared graph and are
addressed by an opaque key chosen by the caller ("C4", a MIDI number, a
touch id...).

Lifecycle
---------

    ┌──────┐  create_voice  ┌────────┐  stop_voice  ┌───────────┐  tail done  ┌──────┐
    │ Idle │ ─────────────► │ Active │ ───────────► │ Releasing │ ──────────► │ Gone │
    └──────┘                └────────┘              └───────────┘             └──────┘

A key leaves the active set the instant its release starts, so the same key
can be played again while the old tail is still ringing. Releasing voices
sit in a separate list with the time their tail ends; `collect_finished`
frees their nodes once the clock passes that time. Nothing waits on the
audio thread.

Rules
-----

  - At most one active voice per key. Playing a key that is already active
    releases the old voice first (through its envelope, no click).
  - Monophonic mode releases every active voice before the new one starts.
  - At `max_voices`, the oldest active voice is released to make room.
  - At most `max_voices` tails ring at once. Past that the oldest tail is
    cut and freed on the spot, so retrigger churn cannot grow the graph.
  - Stopping a key that is not active does nothing.

Headroom
--------

Voices are summed before the effect chain. Peak amplitude per voice is
velocity × VOICE_HEADROOM, so four full-velocity voices reach unity.
*/

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::{debug, warn};

use crate::{
    graph::{Graph, NodeId, ParamKind},
    synth::{
        envelope::{EnvelopeConfig, EnvelopeScheduler},
        filter::{FilterInstance, FilterStage},
        oscillator::{free_oscillators, OscillatorBank, OscillatorInstance},
    },
    Error, Result,
};

/// Peak gain of a full-velocity voice.
pub const VOICE_HEADROOM: f32 = 0.25;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceMode {
    #[default]
    Poly,
    Mono,
}

impl std::str::FromStr for VoiceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "poly" | "polyphonic" => Ok(VoiceMode::Poly),
            "mono" | "monophonic" => Ok(VoiceMode::Mono),
            other => Err(Error::invalid_value("mode", format!("unknown voice mode `{other}`"))),
        }
    }
}

/// LFO tap nodes that new voices subscribe to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoiceModulation {
    pub filter: Vec<NodeId>,
    pub pitch: Vec<NodeId>,
}

#[derive(Debug)]
pub struct Voice {
    key: String,
    frequency: f32,
    velocity: f32,
    oscillators: Vec<OscillatorInstance>,
    filter: FilterInstance,
    gain: NodeId,
    started_at: f64,
    serial: u64,
}

impl Voice {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn oscillators(&self) -> &[OscillatorInstance] {
        &self.oscillators
    }

    pub fn filter(&self) -> &FilterInstance {
        &self.filter
    }

    pub fn gain(&self) -> NodeId {
        self.gain
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    fn free(&self, graph: &mut Graph) {
        free_oscillators(graph, &self.oscillators);
        let _ = graph.remove(self.filter.node);
        let _ = graph.remove(self.gain);
    }
}

struct Releasing {
    voice: Voice,
    free_at: f64,
}

pub struct VoiceManager {
    mode: VoiceMode,
    max_voices: usize,
    envelope: EnvelopeScheduler,
    oscillators: OscillatorBank,
    filter: FilterStage,
    modulation: VoiceModulation,
    active: HashMap<String, Voice>,
    releasing: Vec<Releasing>,
    next_serial: u64,
}

impl VoiceManager {
    pub fn new(envelope: EnvelopeConfig, oscillators: OscillatorBank, filter: FilterStage) -> Self {
        Self {
            mode: VoiceMode::Poly,
            max_voices: 16,
            envelope: EnvelopeScheduler::new(envelope),
            oscillators,
            filter,
            modulation: VoiceModulation::default(),
            active: HashMap::new(),
            releasing: Vec::new(),
            next_serial: 0,
        }
    }

    pub fn mode(&self) -> VoiceMode {
        self.mode
    }

    /// Switching to mono does not cut voices already sounding; the next
    /// note-on does.
    pub fn set_mode(&mut self, mode: VoiceMode) {
        self.mode = mode;
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    pub fn set_max_voices(&mut self, max_voices: usize) {
        self.max_voices = max_voices.max(1);
    }

    pub fn envelope(&self) -> &EnvelopeScheduler {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut EnvelopeScheduler {
        &mut self.envelope
    }

    pub fn oscillator_bank(&self) -> &OscillatorBank {
        &self.oscillators
    }

    pub fn oscillator_bank_mut(&mut self) -> &mut OscillatorBank {
        &mut self.oscillators
    }

    pub fn filter_stage(&self) -> &FilterStage {
        &self.filter
    }

    pub fn filter_stage_mut(&mut self) -> &mut FilterStage {
        &mut self.filter
    }

    pub fn modulation(&self) -> &VoiceModulation {
        &self.modulation
    }

    /// LFO taps for voices created from now on.
    pub fn set_modulation(&mut self, modulation: VoiceModulation) {
        self.modulation = modulation;
    }

    pub fn create_voice(
        &mut self,
        graph: &mut Graph,
        key: &str,
        frequency: f32,
        velocity: f32,
        destination: NodeId,
    ) -> Result<()> {
        if !graph.contains(destination) {
            return Err(Error::UnknownNode(destination));
        }
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(Error::invalid_value("frequency", format!("{frequency} Hz")));
        }

        let now = graph.current_time();

        if self.mode == VoiceMode::Mono {
            self.stop_all_voices(graph, now);
        } else if self.active.contains_key(key) {
            debug!("retriggering voice `{key}`");
            self.stop_voice(graph, key, now);
        }

        while self.active.len() >= self.max_voices {
            let Some(oldest) = self
                .active
                .values()
                .min_by_key(|voice| voice.serial)
                .map(|voice| voice.key.clone())
            else {
                break;
            };
            warn!("voice limit {} reached, stealing `{oldest}`", self.max_voices);
            self.stop_voice(graph, &oldest, now);
        }

        let voice = self.build_voice(graph, key, frequency, velocity, destination, now)?;
        debug!("voice `{key}` on at {frequency:.2} Hz");
        self.active.insert(key.to_string(), voice);
        Ok(())
    }

    fn build_voice(
        &mut self,
        graph: &mut Graph,
        key: &str,
        frequency: f32,
        velocity: f32,
        destination: NodeId,
        now: f64,
    ) -> Result<Voice> {
        let filter = self.filter.create_filter(graph, &self.modulation.filter)?;
        let oscillators = match self.oscillators.create_oscillators(
            graph,
            frequency,
            filter.node,
            &self.modulation.pitch,
        ) {
            Ok(oscillators) => oscillators,
            Err(err) => {
                let _ = graph.remove(filter.node);
                return Err(err);
            }
        };
        let gain = graph.add_gain(0.0);

        let voice = Voice {
            key: key.to_string(),
            frequency,
            velocity,
            oscillators,
            filter,
            gain,
            started_at: now,
            serial: self.next_serial,
        };
        self.next_serial += 1;

        let peak = velocity.clamp(0.0, 1.0) * VOICE_HEADROOM;
        let wired = graph
            .connect(voice.filter.node, gain)
            .and_then(|_| graph.connect(gain, destination))
            .and_then(|_| {
                self.envelope
                    .apply_envelope(graph, gain.param(ParamKind::Gain), now, 0.0, peak)
            })
            .and_then(|_| self.filter.apply_envelope(graph, &voice.filter, now))
            .and_then(|_| self.oscillators.start_oscillators(graph, &voice.oscillators));

        match wired {
            Ok(()) => Ok(voice),
            Err(err) => {
                voice.free(graph);
                Err(err)
            }
        }
    }

    /// Release `key` from `time`. Absent keys are ignored.
    pub fn stop_voice(&mut self, graph: &mut Graph, key: &str, time: f64) {
        let Some(voice) = self.active.remove(key) else {
            return;
        };

        let free_at = match self.schedule_release(graph, &voice, time) {
            Ok(free_at) => free_at,
            Err(err) => {
                warn!("release of `{key}` failed, freeing now: {err}");
                time
            }
        };
        debug!("voice `{key}` releasing until {free_at:.3}s");
        self.releasing.push(Releasing { voice, free_at });
        self.trim_releasing(graph);
    }

    /// Hard-free the oldest tails beyond `max_voices`.
    fn trim_releasing(&mut self, graph: &mut Graph) {
        let excess = self.releasing.len().saturating_sub(self.max_voices);
        for cut in self.releasing.drain(..excess) {
            debug!("cutting release tail of `{}`", cut.voice.key);
            cut.voice.free(graph);
        }
    }

    fn schedule_release(&self, graph: &mut Graph, voice: &Voice, time: f64) -> Result<f64> {
        let amp = self
            .envelope
            .apply_release(graph, voice.gain.param(ParamKind::Gain), time, 0.0)?;
        let cutoff = self.filter.apply_release(graph, &voice.filter, time)?;
        let tail = amp.max(cutoff);

        self.oscillators
            .stop_oscillators(graph, &voice.oscillators, Some(time + tail))?;
        Ok(time + tail)
    }

    pub fn stop_all_voices(&mut self, graph: &mut Graph, time: f64) {
        let keys: Vec<String> = self.active.keys().cloned().collect();
        for key in keys {
            self.stop_voice(graph, &key, time);
        }
    }

    /// Free every voice immediately, active or releasing. Panic button.
    pub fn clear_all_voices(&mut self, graph: &mut Graph) {
        for (_, voice) in self.active.drain() {
            voice.free(graph);
        }
        for releasing in self.releasing.drain(..) {
            releasing.voice.free(graph);
        }
    }

    /// Free releasing voices whose tails have ended. Returns how many.
    pub fn collect_finished(&mut self, graph: &mut Graph) -> usize {
        let now = graph.current_time();
        let before = self.releasing.len();
        self.releasing.retain(|releasing| {
            if releasing.free_at <= now {
                releasing.voice.free(graph);
                false
            } else {
                true
            }
        });
        before - self.releasing.len()
    }

    pub fn voice_count(&self) -> usize {
        self.active.len()
    }

    pub fn releasing_count(&self) -> usize {
        self.releasing.len()
    }

    pub fn has_voice(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    pub fn voice(&self, key: &str) -> Option<&Voice> {
        self.active.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.active.keys().map(String::as_str)
    }

    /// When the release tail of a voice that has left the active set ends.
    pub fn release_deadline(&self, key: &str) -> Option<f64> {
        self.releasing
            .iter()
            .rev()
            .find(|releasing| releasing.voice.key == key)
            .map(|releasing| releasing.free_at)
    }
}

impl Default for VoiceManager {
    fn default() -> Self {
        Self::new(
            EnvelopeConfig::default(),
            OscillatorBank::default(),
            FilterStage::default(),
        )
    }
}
