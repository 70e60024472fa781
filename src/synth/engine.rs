/*
Synth Facade
============

`Synth` owns the graph and everything wired into it:

    voices ─► [effects chain] ─► [master gain] ─► destination
      ▲
      └── LFO taps (filter cutoff, pitch)

Nothing is built until audio is first needed. `ensure_audio` creates the
master gain, wires the effects chain against it, starts the LFOs and hands
their taps to the voice manager. It runs at most once; if it fails the synth
stays silent and every later call reports the failure.

Notes
-----

Keys are opaque strings. `note_on` resolves them through the key map (note
names, MIDI numbers or explicit bindings); `play_frequency` takes the
frequency directly. Note events never fail: unresolvable keys and voice
errors are logged and dropped.

Threading
---------

The synth itself is single-threaded. Another thread can drive it through a
`SynthHandle` (a lock-free queue); queued messages are applied at the top
of each `render` call.
*/

#[cfg(feature = "rtrb")]
use rtrb::{Consumer, RingBuffer};

use log::{info, warn};

#[cfg(feature = "rtrb")]
use crate::synth::message::SynthHandle;
use crate::{
    effects::{default_effects, Effect, EffectMetadata, EffectsManager},
    graph::{Graph, NodeId, ParamKind},
    io::converter::midi_note_to_freq,
    synth::{
        config::{ParamTarget, ParamValue, SynthConfig},
        filter::FilterStage,
        keymap::KeyMap,
        lfo::{LfoBank, LfoConfig, ModulationRouting},
        message::{MessageReceiver, SynthMessage},
        oscillator::OscillatorBank,
        voice::VoiceManager,
    },
    Error, Result,
};

/// Velocity used by `note_on`, which carries no velocity of its own.
pub const DEFAULT_VELOCITY: f32 = 0.8;
const MAX_MASTER_GAIN: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudioState {
    Idle,
    Ready { master: NodeId, chain_input: NodeId },
    Failed,
}

/// Latest analyser data from the spectrum tap.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSnapshot {
    /// Oldest sample first.
    pub time_domain: Vec<f32>,
    /// dB per bin, DC to Nyquist.
    pub frequency: Vec<f32>,
}

pub struct Synth {
    graph: Graph,
    voices: VoiceManager,
    effects: EffectsManager,
    lfos: LfoBank,
    /// LFO settings until the bank is built.
    lfo_configs: Vec<LfoConfig>,
    routing: ModulationRouting,
    keymap: KeyMap,
    master_gain: f32,
    audio: AudioState,
    #[cfg(feature = "rtrb")]
    rx: Option<Consumer<SynthMessage>>,
}

impl Synth {
    /// A synth with an empty effects chain.
    pub fn new(config: SynthConfig) -> Result<Self> {
        if !(config.sample_rate.is_finite() && config.sample_rate > 0.0) {
            return Err(Error::Configuration(format!(
                "sample rate must be positive, got {}",
                config.sample_rate
            )));
        }
        for (i, lfo) in config.lfos.iter().enumerate() {
            if config.lfos[..i].iter().any(|other| other.id == lfo.id) {
                return Err(Error::Configuration(format!("duplicate lfo id `{}`", lfo.id)));
            }
        }

        let bank = OscillatorBank::new(config.oscillators)?;
        let filter = FilterStage::new(config.filter, config.filter_envelope);
        let mut voices = VoiceManager::new(config.envelope, bank, filter);
        voices.set_mode(config.mode);
        voices.set_max_voices(config.max_voices);

        Ok(Self {
            graph: Graph::new(config.sample_rate),
            voices,
            effects: EffectsManager::new(),
            lfos: LfoBank::new(),
            lfo_configs: config.lfos,
            routing: config.routing,
            keymap: KeyMap::new(),
            master_gain: config.master_gain.clamp(0.0, MAX_MASTER_GAIN),
            audio: AudioState::Idle,
            #[cfg(feature = "rtrb")]
            rx: None,
        })
    }

    /// A synth with the stock effects chain registered.
    pub fn with_default_effects(config: SynthConfig) -> Result<Self> {
        let mut synth = Self::new(config)?;
        for (unit, metadata) in default_effects() {
            synth.register_effect(unit, metadata)?;
        }
        Ok(synth)
    }

    /// Add an effect to the chain. Only possible before audio is built.
    pub fn register_effect(&mut self, unit: impl Into<Effect>, metadata: EffectMetadata) -> Result<()> {
        self.effects.register(unit, metadata)
    }

    /// Build the audio graph if it has not been built yet.
    pub fn ensure_audio(&mut self) -> Result<()> {
        match self.audio {
            AudioState::Ready { .. } => return Ok(()),
            AudioState::Failed => {
                return Err(Error::Configuration(
                    "audio setup failed earlier; the synth cannot play".into(),
                ))
            }
            AudioState::Idle => {}
        }

        match self.build_audio() {
            Ok(state) => {
                info!(
                    "audio ready: {} effects, {} lfos, {} Hz",
                    self.effects.len(),
                    self.lfos.len(),
                    self.graph.sample_rate()
                );
                self.audio = state;
                Ok(())
            }
            Err(err) => {
                self.audio = AudioState::Failed;
                Err(err)
            }
        }
    }

    fn build_audio(&mut self) -> Result<AudioState> {
        let destination = self.graph.destination();
        let master = self.graph.add_gain(self.master_gain);
        self.graph.connect(master, destination)?;

        let chain_input = match self.effects.initialize(&mut self.graph, master) {
            Ok(input) => input,
            Err(err) => {
                if let Err(remove_err) = self.graph.remove(master) {
                    warn!("master gain not removed: {remove_err}");
                }
                return Err(err);
            }
        };

        for config in std::mem::take(&mut self.lfo_configs) {
            self.lfos.add(&mut self.graph, config)?;
        }
        self.voices.set_modulation(self.lfos.modulation(&self.routing));

        Ok(AudioState::Ready {
            master,
            chain_input,
        })
    }

    pub fn is_audio_ready(&self) -> bool {
        matches!(self.audio, AudioState::Ready { .. })
    }

    /// Start a voice for `key`, resolving its pitch through the key map.
    pub fn note_on(&mut self, key: &str) {
        match self.keymap.frequency(key) {
            Some(frequency) => self.play_frequency(key, frequency, DEFAULT_VELOCITY),
            None => warn!("no pitch for key `{key}`, ignoring"),
        }
    }

    /// Start a voice for `key` at `frequency`. Replaces a voice already
    /// active under the same key.
    pub fn play_frequency(&mut self, key: &str, frequency: f32, velocity: f32) {
        if let Err(err) = self.ensure_audio() {
            warn!("cannot play `{key}`: {err}");
            return;
        }
        let AudioState::Ready { chain_input, .. } = self.audio else {
            return;
        };
        if let Err(err) =
            self.voices
                .create_voice(&mut self.graph, key, frequency, velocity, chain_input)
        {
            warn!("voice `{key}` not started: {err}");
        }
    }

    /// Release `key` now. Unknown keys are ignored.
    pub fn stop_voice(&mut self, key: &str) {
        let now = self.graph.current_time();
        self.voices.stop_voice(&mut self.graph, key, now);
    }

    pub fn stop_all_voices(&mut self) {
        let now = self.graph.current_time();
        self.voices.stop_all_voices(&mut self.graph, now);
    }

    /// Cut every voice immediately, skipping release tails.
    pub fn panic(&mut self) {
        self.voices.clear_all_voices(&mut self.graph);
    }

    pub fn voice_count(&self) -> usize {
        self.voices.voice_count()
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    /// Apply queued messages, render `out`, then free voices whose tails
    /// have ended.
    pub fn render(&mut self, out: &mut [f32]) {
        #[cfg(feature = "rtrb")]
        if let Some(mut rx) = self.rx.take() {
            self.process_messages(&mut rx);
            self.rx = Some(rx);
        }

        self.graph.render(out);
        self.voices.collect_finished(&mut self.graph);
    }

    /// Apply every message `rx` holds. Returns how many were handled.
    pub fn process_messages<R: MessageReceiver>(&mut self, rx: &mut R) -> usize {
        let mut handled = 0;
        while let Some(message) = rx.pop() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    fn handle_message(&mut self, message: SynthMessage) {
        match message {
            // MIDI convention: note-on at velocity zero is a note-off.
            SynthMessage::NoteOn { note, velocity: 0 } | SynthMessage::NoteOff { note } => {
                self.stop_voice(&SynthMessage::note_key(note));
            }
            SynthMessage::NoteOn { note, velocity } => {
                let key = SynthMessage::note_key(note);
                self.play_frequency(&key, midi_note_to_freq(note), velocity as f32 / 127.0);
            }
            SynthMessage::PlayFrequency {
                id,
                frequency,
                velocity,
            } => self.play_frequency(&SynthMessage::frequency_key(id), frequency, velocity),
            SynthMessage::StopFrequency { id } => {
                self.stop_voice(&SynthMessage::frequency_key(id));
            }
            SynthMessage::AllNotesOff => self.stop_all_voices(),
            SynthMessage::Panic => self.panic(),
        }
    }

    /// A queue for driving this synth from another thread. Replaces any
    /// earlier handle's queue.
    #[cfg(feature = "rtrb")]
    pub fn handle(&mut self, capacity: usize) -> SynthHandle {
        let (tx, rx) = RingBuffer::new(capacity.max(1));
        self.rx = Some(rx);
        SynthHandle::new(tx)
    }

    /// Route a named update to one part of the synth.
    ///
    /// Voice-shaping settings (envelopes, filter, oscillators) apply to
    /// notes started afterwards. LFO, effect and master updates reach the
    /// running graph immediately.
    pub fn set_param(
        &mut self,
        target: ParamTarget,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<()> {
        let value = value.into();
        match target {
            ParamTarget::Envelope => self.voices.envelope_mut().set(name, value.as_number(name)?),
            ParamTarget::FilterEnvelope => self
                .voices
                .filter_stage_mut()
                .envelope_mut()
                .set(name, value.as_number(name)?),
            ParamTarget::Filter => self.voices.filter_stage_mut().set(name, &value),
            ParamTarget::Oscillator(index) => {
                self.voices.oscillator_bank_mut().set(index, name, &value)
            }
            ParamTarget::Lfo(id) => self.set_lfo_param(&id, name, &value),
            ParamTarget::Effect(id) => self.effects.set_param(&mut self.graph, &id, name, &value),
            ParamTarget::Master => match name {
                "gain" | "volume" => {
                    self.master_gain = value.as_number(name)?.clamp(0.0, MAX_MASTER_GAIN);
                    if let AudioState::Ready { master, .. } = self.audio {
                        self.graph
                            .set_param(master.param(ParamKind::Gain), self.master_gain)?;
                    }
                    Ok(())
                }
                _ => Err(Error::unknown_param("master", name)),
            },
            ParamTarget::Voice => match name {
                "mode" => {
                    self.voices.set_mode(value.parse(name)?);
                    Ok(())
                }
                "max_voices" | "polyphony" => {
                    let count = value.as_number(name)?;
                    if count < 1.0 {
                        return Err(Error::invalid_value(name, "at least one voice is required"));
                    }
                    self.voices.set_max_voices(count.round() as usize);
                    Ok(())
                }
                _ => Err(Error::unknown_param("voice", name)),
            },
        }
    }

    fn set_lfo_param(&mut self, id: &str, name: &str, value: &ParamValue) -> Result<()> {
        let unknown = || Error::Configuration(format!("no lfo with id `{id}`"));
        if self.is_audio_ready() {
            self.lfos
                .get_mut(id)
                .ok_or_else(unknown)?
                .set_param(&mut self.graph, name, value)
        } else {
            self.lfo_configs
                .iter_mut()
                .find(|config| config.id == id)
                .ok_or_else(unknown)?
                .set(name, value)
        }
    }

    /// Snapshot of the current settings.
    pub fn config(&self) -> SynthConfig {
        let stage = self.voices.filter_stage();
        SynthConfig {
            sample_rate: self.graph.sample_rate(),
            max_voices: self.voices.max_voices(),
            mode: self.voices.mode(),
            envelope: self.voices.envelope().config(),
            filter_envelope: stage.envelope().config(),
            filter: stage.config(),
            oscillators: self.voices.oscillator_bank().configs().to_vec(),
            lfos: if self.is_audio_ready() {
                self.lfos.configs()
            } else {
                self.lfo_configs.clone()
            },
            routing: self.routing.clone(),
            master_gain: self.master_gain,
        }
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.graph.current_time()
    }

    pub fn sample_rate(&self) -> f32 {
        self.graph.sample_rate()
    }

    pub fn effects(&self) -> &EffectsManager {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectsManager {
        &mut self.effects
    }

    /// Empty until audio is built.
    pub fn lfos(&self) -> &LfoBank {
        &self.lfos
    }

    /// Data from the first spectrum tap in the chain, once audio is built.
    pub fn spectrum(&mut self) -> Option<SpectrumSnapshot> {
        let tap = self
            .effects
            .effects()
            .iter()
            .find_map(|registration| registration.unit.as_spectrum())?;
        let time_domain = tap.time_domain_data(&self.graph).ok()?;
        let frequency = tap.frequency_data(&mut self.graph).ok()?;
        Some(SpectrumSnapshot {
            time_domain,
            frequency,
        })
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    pub fn keymap_mut(&mut self) -> &mut KeyMap {
        &mut self.keymap
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        effects::{delay::Delay, EffectCategory, EffectConfig, EffectUnit},
        synth::voice::VoiceMode,
    };
    use std::collections::VecDeque;

    fn quiet_config() -> SynthConfig {
        SynthConfig {
            sample_rate: 8_000.0,
            ..SynthConfig::default()
        }
    }

    #[test]
    fn audio_is_built_lazily_once() {
        let mut synth = Synth::with_default_effects(quiet_config()).unwrap();
        assert!(!synth.is_audio_ready());
        assert!(synth.lfos().is_empty());

        synth.ensure_audio().unwrap();
        let nodes = synth.graph().node_count();
        synth.ensure_audio().unwrap();
        assert_eq!(synth.graph().node_count(), nodes);
        assert!(synth.is_audio_ready());
        assert_eq!(synth.lfos().len(), 1);
        assert!(synth.effects().is_finalized());
    }

    #[test]
    fn note_on_resolves_keys() {
        let mut synth = Synth::new(quiet_config()).unwrap();
        synth.note_on("A4");
        synth.note_on("not a note");
        assert_eq!(synth.voice_count(), 1);
        let voice = synth.voices().voice("A4").unwrap();
        assert!((voice.frequency() - 440.0).abs() < 1e-3);
        assert_eq!(voice.velocity(), DEFAULT_VELOCITY);
    }

    #[test]
    fn released_voices_are_collected_after_tail() {
        let mut synth = Synth::new(quiet_config()).unwrap();
        synth.play_frequency("k", 220.0, 1.0);
        let mut block = vec![0.0; 256];
        synth.render(&mut block);
        assert!(block.iter().any(|s| s.abs() > 0.0));

        synth.stop_voice("k");
        assert_eq!(synth.voice_count(), 0);
        assert_eq!(synth.voices().releasing_count(), 1);

        // Longest default release is the filter's 0.4 s.
        let mut tail = vec![0.0; 8_000];
        synth.render(&mut tail);
        assert_eq!(synth.voices().releasing_count(), 0);
    }

    #[test]
    fn messages_drive_voices() {
        let mut synth = Synth::new(quiet_config()).unwrap();
        let mut queue: VecDeque<SynthMessage> = VecDeque::new();
        queue.push_back(SynthMessage::NoteOn { note: 60, velocity: 100 });
        queue.push_back(SynthMessage::PlayFrequency {
            id: 7,
            frequency: 330.0,
            velocity: 0.5,
        });
        assert_eq!(synth.process_messages(&mut queue), 2);
        assert!(synth.voices().has_voice("60"));
        assert!(synth.voices().has_voice("freq:7"));

        queue.push_back(SynthMessage::NoteOn { note: 60, velocity: 0 });
        queue.push_back(SynthMessage::StopFrequency { id: 7 });
        synth.process_messages(&mut queue);
        assert_eq!(synth.voice_count(), 0);

        queue.push_back(SynthMessage::NoteOn { note: 64, velocity: 90 });
        queue.push_back(SynthMessage::Panic);
        synth.process_messages(&mut queue);
        assert_eq!(synth.voice_count(), 0);
        assert_eq!(synth.voices().releasing_count(), 0);
    }

    #[cfg(feature = "rtrb")]
    #[test]
    fn handle_messages_apply_on_render() {
        let mut synth = Synth::new(quiet_config()).unwrap();
        let mut handle = synth.handle(8);
        handle.note_on(69, 127);
        assert_eq!(synth.voice_count(), 0);

        let mut block = vec![0.0; 64];
        synth.render(&mut block);
        assert!(synth.voices().has_voice("69"));
    }

    #[test]
    fn params_route_to_targets() {
        let mut synth = Synth::with_default_effects(quiet_config()).unwrap();
        synth.set_param(ParamTarget::Envelope, "attack", 0.5).unwrap();
        synth.set_param(ParamTarget::Filter, "type", "highpass").unwrap();
        synth.set_param(ParamTarget::Oscillator(1), "waveform", "square").unwrap();
        synth.set_param(ParamTarget::Lfo("lfo1".into()), "rate", 3.0).unwrap();
        synth.set_param(ParamTarget::Voice, "mode", "mono").unwrap();
        synth.set_param(ParamTarget::Master, "gain", 0.5).unwrap();
        synth.set_param(ParamTarget::Effect("delay".into()), "mix", 0.6).unwrap();

        let config = synth.config();
        assert_eq!(config.envelope.attack, 0.5);
        assert_eq!(config.filter.filter_type, crate::dsp::filter::FilterType::HighPass);
        assert_eq!(config.oscillators[1].waveform, crate::dsp::oscillator::Waveform::Square);
        assert_eq!(config.lfos[0].rate, 3.0);
        assert_eq!(config.mode, VoiceMode::Mono);
        assert_eq!(config.master_gain, 0.5);
        match synth.effects().effect("delay").unwrap().config() {
            EffectConfig::Delay(delay) => assert_eq!(delay.mix, 0.6),
            other => panic!("unexpected config {other:?}"),
        }

        assert!(synth.set_param(ParamTarget::Lfo("lfo9".into()), "rate", 1.0).is_err());
        assert!(matches!(
            synth.set_param(ParamTarget::Master, "pan", 0.0),
            Err(Error::UnknownParameter { .. })
        ));
    }

    #[test]
    fn lfo_updates_reach_graph_after_build() {
        let mut synth = Synth::new(quiet_config()).unwrap();
        synth.ensure_audio().unwrap();
        synth.set_param(ParamTarget::Lfo("lfo1".into()), "filter_depth", 123.0).unwrap();

        let tap = synth.lfos().get("lfo1").unwrap().filter_tap();
        assert_eq!(
            synth.graph().param_value(tap.param(ParamKind::Gain)).unwrap(),
            123.0
        );
    }

    #[test]
    fn registration_closes_once_audio_is_built() {
        let mut synth = Synth::new(quiet_config()).unwrap();
        synth.ensure_audio().unwrap();
        let late = synth.register_effect(
            Delay::default(),
            EffectMetadata::new("delay", "Delay", 1, EffectCategory::Time),
        );
        assert!(matches!(late, Err(Error::Configuration(_))));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut config = quiet_config();
        config.sample_rate = 0.0;
        assert!(Synth::new(config).is_err());

        let mut config = quiet_config();
        config.lfos.push(LfoConfig::new("lfo1"));
        assert!(Synth::new(config).is_err());
    }

    #[test]
    fn spectrum_reads_the_tap() {
        let mut synth = Synth::with_default_effects(quiet_config()).unwrap();
        assert!(synth.spectrum().is_none());

        synth.play_frequency("k", 440.0, 1.0);
        let mut block = vec![0.0; 2048];
        synth.render(&mut block);

        let snapshot = synth.spectrum().unwrap();
        assert_eq!(snapshot.time_domain.len(), 2048);
        assert_eq!(snapshot.frequency.len(), 1024);
        assert!(snapshot.time_domain.iter().any(|s| s.abs() > 0.0));
    }
}
