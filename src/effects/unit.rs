/*
Effect Units
============

Every effect is a small private subgraph with one input node and one output
node. The chain only ever sees those two ports:

    initialize(graph, destination) ──► EffectPorts { input, output }

The unit builds its nodes, but does not connect its output anywhere; the
effects manager wires output → destination itself so the chain order stays
in one place.

Dry/Wet
-------

Time and modulation effects blend the untouched signal with the processed
one:

              ┌──► [dry: 1 - mix] ───────────────┐
    [input] ──┤                                  ├──► [output]
              └──► (effect primitive) ► [wet: mix]┘

mix = 0.0 is a clean bypass, 1.0 is fully processed.

Parameters
----------

Units accept named updates at any time. Before `initialize` only the config
changes; afterwards the new value is written to the live nodes straight
away. Out-of-range values are clamped, both in `new` and in `set_param`, so
the config returned by `config()` always matches what the nodes hold.
*/

use log::warn;

use crate::{
    dsp::{dynamics::CompressorSettings, oscillator::Waveform},
    effects::{
        chorus::{Chorus, ChorusConfig},
        compressor::Compressor,
        delay::{Delay, DelayConfig},
        distortion::{Distortion, DistortionConfig},
        flanger::{Flanger, FlangerConfig},
        phaser::{Phaser, PhaserConfig},
        reverb::{Reverb, ReverbConfig},
        spectrum::{SpectrumConfig, SpectrumTap},
        tremolo::{Tremolo, TremoloConfig},
    },
    graph::{Graph, NodeId, ParamKind},
    synth::config::ParamValue,
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectPorts {
    pub input: NodeId,
    pub output: NodeId,
}

/// Snapshot of any unit's settings.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectConfig {
    Chorus(ChorusConfig),
    Flanger(FlangerConfig),
    Phaser(PhaserConfig),
    Tremolo(TremoloConfig),
    Delay(DelayConfig),
    Reverb(ReverbConfig),
    Distortion(DistortionConfig),
    Compressor(CompressorSettings),
    Spectrum(SpectrumConfig),
}

pub trait EffectUnit {
    /// Build the unit's nodes. Fails if called twice.
    fn initialize(&mut self, graph: &mut Graph, destination: NodeId) -> Result<EffectPorts>;

    fn input(&self) -> Option<NodeId>;

    fn output(&self) -> Option<NodeId>;

    fn is_initialized(&self) -> bool {
        self.input().is_some() && self.output().is_some()
    }

    fn config(&self) -> EffectConfig;

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()>;

    /// Remove every node the unit built and return to the uninitialized
    /// state. Does nothing before `initialize`.
    fn teardown(&mut self, graph: &mut Graph);
}

/// The closed set of effects the synth ships with.
pub enum Effect {
    Chorus(Chorus),
    Phaser(Phaser),
    Flanger(Flanger),
    Tremolo(Tremolo),
    Delay(Delay),
    Reverb(Reverb),
    Distortion(Distortion),
    Compressor(Compressor),
    SpectrumTap(SpectrumTap),
}

macro_rules! dispatch {
    ($self:expr, $unit:ident => $body:expr) => {
        match $self {
            Effect::Chorus($unit) => $body,
            Effect::Phaser($unit) => $body,
            Effect::Flanger($unit) => $body,
            Effect::Tremolo($unit) => $body,
            Effect::Delay($unit) => $body,
            Effect::Reverb($unit) => $body,
            Effect::Distortion($unit) => $body,
            Effect::Compressor($unit) => $body,
            Effect::SpectrumTap($unit) => $body,
        }
    };
}

impl Effect {
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Chorus(_) => "chorus",
            Effect::Phaser(_) => "phaser",
            Effect::Flanger(_) => "flanger",
            Effect::Tremolo(_) => "tremolo",
            Effect::Delay(_) => "delay",
            Effect::Reverb(_) => "reverb",
            Effect::Distortion(_) => "distortion",
            Effect::Compressor(_) => "compressor",
            Effect::SpectrumTap(_) => "spectrum",
        }
    }

    pub fn as_spectrum(&self) -> Option<&SpectrumTap> {
        match self {
            Effect::SpectrumTap(tap) => Some(tap),
            _ => None,
        }
    }
}

impl EffectUnit for Effect {
    fn initialize(&mut self, graph: &mut Graph, destination: NodeId) -> Result<EffectPorts> {
        dispatch!(self, unit => unit.initialize(graph, destination))
    }

    fn input(&self) -> Option<NodeId> {
        dispatch!(self, unit => unit.input())
    }

    fn output(&self) -> Option<NodeId> {
        dispatch!(self, unit => unit.output())
    }

    fn is_initialized(&self) -> bool {
        dispatch!(self, unit => unit.is_initialized())
    }

    fn config(&self) -> EffectConfig {
        dispatch!(self, unit => unit.config())
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        dispatch!(self, unit => unit.set_param(graph, name, value))
    }

    fn teardown(&mut self, graph: &mut Graph) {
        dispatch!(self, unit => unit.teardown(graph))
    }
}

macro_rules! impl_from_unit {
    ($($variant:ident($unit:ty)),* $(,)?) => {
        $(
            impl From<$unit> for Effect {
                fn from(unit: $unit) -> Self {
                    Effect::$variant(unit)
                }
            }
        )*
    };
}

impl_from_unit!(
    Chorus(Chorus),
    Phaser(Phaser),
    Flanger(Flanger),
    Tremolo(Tremolo),
    Delay(Delay),
    Reverb(Reverb),
    Distortion(Distortion),
    Compressor(Compressor),
    SpectrumTap(SpectrumTap),
);

pub(crate) fn already_initialized(kind: &str) -> Error {
    Error::Configuration(format!("{kind} is already initialized"))
}

/// Mix coefficient from a named value, clamped to 0.0..=1.0.
pub(crate) fn mix_value(value: &ParamValue) -> Result<f32> {
    Ok(value.as_number("mix")?.clamp(0.0, 1.0))
}

pub(crate) fn remove_nodes(graph: &mut Graph, nodes: impl IntoIterator<Item = NodeId>) {
    for node in nodes {
        if let Err(err) = graph.remove(node) {
            warn!("effect node {node:?} not removed: {err}");
        }
    }
}

/// Fastest sweep a modulated effect accepts, Hz.
pub(crate) const MAX_RATE: f32 = 20.0;

/// `value.clamp(min, max)`, with NaN pinned to `min`.
pub(crate) fn bounded(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

/// Input splitter plus the dry and wet gains summing into one output.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DryWet {
    pub input: NodeId,
    pub dry: NodeId,
    pub wet: NodeId,
    pub output: NodeId,
}

impl DryWet {
    pub fn build(graph: &mut Graph, mix: f32) -> Result<Self> {
        let mix = mix.clamp(0.0, 1.0);
        let input = graph.add_gain(1.0);
        let dry = graph.add_gain(1.0 - mix);
        let wet = graph.add_gain(mix);
        let output = graph.add_gain(1.0);

        graph.connect(input, dry)?;
        graph.connect(dry, output)?;
        graph.connect(wet, output)?;

        Ok(Self {
            input,
            dry,
            wet,
            output,
        })
    }

    pub fn set_mix(&self, graph: &mut Graph, mix: f32) -> Result<()> {
        let mix = mix.clamp(0.0, 1.0);
        graph.set_param(self.dry.param(ParamKind::Gain), 1.0 - mix)?;
        graph.set_param(self.wet.param(ParamKind::Gain), mix)
    }

    pub fn nodes(&self) -> [NodeId; 4] {
        [self.input, self.dry, self.wet, self.output]
    }

    pub fn ports(&self) -> EffectPorts {
        EffectPorts {
            input: self.input,
            output: self.output,
        }
    }
}

/// A running LFO scaled by a depth gain, for modulating one or more params.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Modulator {
    pub oscillator: NodeId,
    pub depth: NodeId,
}

impl Modulator {
    /// `phase` is the starting offset in cycles.
    pub fn build(
        graph: &mut Graph,
        waveform: Waveform,
        rate: f32,
        depth: f32,
        phase: f32,
    ) -> Result<Self> {
        let oscillator = graph.add_oscillator(waveform, rate);
        let depth_gain = graph.add_gain(depth);
        graph.set_phase(oscillator, phase)?;
        graph.connect(oscillator, depth_gain)?;
        let now = graph.current_time();
        graph.start(oscillator, now)?;

        Ok(Self {
            oscillator,
            depth: depth_gain,
        })
    }

    pub fn modulate(&self, graph: &mut Graph, target: NodeId, kind: ParamKind) -> Result<()> {
        graph.connect_param(self.depth, target.param(kind))
    }

    pub fn set_rate(&self, graph: &mut Graph, rate: f32) -> Result<()> {
        graph.set_param(self.oscillator.param(ParamKind::Frequency), rate)
    }

    pub fn set_depth(&self, graph: &mut Graph, depth: f32) -> Result<()> {
        graph.set_param(self.depth.param(ParamKind::Gain), depth)
    }

    pub fn nodes(&self) -> [NodeId; 2] {
        [self.oscillator, self.depth]
    }
}
