/*
LFO (Low Frequency Oscillator)
==============================

An LFO is an ordinary oscillator running below the audio range (typically
0.1 to 20 Hz). Its output is never heard directly; it is added onto other
parameters to make them move.

Structure
---------

Each LFO is one generator feeding two always-on gain taps:

                 ┌──► [filter tap: depth Hz] ──► voice filter cutoffs
    [oscillator] ┤
                 └──► [pitch tap: depth Hz]  ──► voice oscillator frequencies

The generator outputs -1.0..1.0, so a filter depth of 500 swings every
subscribed cutoff by ±500 Hz around wherever its envelope has put it. A depth
of zero silences that tap without disconnecting anything.

The generator is started once when the LFO is built and never stopped; all
voices subscribed to it share the same phase.

Several LFOs can coexist, each with its own id. Voices pick which ones to
listen to through a `ModulationRouting`.

Rate Guidelines
---------------

  0.1 - 1 Hz    Slow sweeps, evolving pads
  1 - 5 Hz      Vibrato, tremolo, wah
  5 - 20 Hz     Fast wobble, trills
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use log::warn;

use crate::{
    dsp::oscillator::Waveform,
    graph::{Graph, NodeId, ParamKind},
    synth::{config::ParamValue, voice::VoiceModulation},
    Error, Result,
};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LfoConfig {
    pub id: String,
    /// Hz.
    pub rate: f32,
    pub waveform: Waveform,
    /// Cutoff swing in Hz.
    pub filter_depth: f32,
    /// Frequency swing in Hz.
    pub pitch_depth: f32,
}

impl LfoConfig {
    /// Sine at 5 Hz with both taps at zero depth.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rate: 5.0,
            waveform: Waveform::Sine,
            filter_depth: 0.0,
            pitch_depth: 0.0,
        }
    }

    /// Named update of the plain config, without touching any graph.
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "rate" => self.rate = value.as_number(name)?.max(0.0),
            "waveform" => self.waveform = value.parse(name)?,
            "filter_depth" => self.filter_depth = value.as_number(name)?,
            "pitch_depth" => self.pitch_depth = value.as_number(name)?,
            _ => return Err(Error::unknown_param(format!("lfo `{}`", self.id), name)),
        }
        Ok(())
    }
}

/// Which LFOs (by id) each part of a voice listens to.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModulationRouting {
    pub filter: Vec<String>,
    pub pitch: Vec<String>,
}

pub struct Lfo {
    config: LfoConfig,
    oscillator: NodeId,
    filter_tap: NodeId,
    pitch_tap: NodeId,
}

impl Lfo {
    /// Build the generator and both taps, and start the generator now.
    pub fn build(graph: &mut Graph, config: LfoConfig) -> Result<Self> {
        let oscillator = graph.add_oscillator(config.waveform, config.rate.max(0.0));
        let filter_tap = graph.add_gain(config.filter_depth);
        let pitch_tap = graph.add_gain(config.pitch_depth);

        graph.connect(oscillator, filter_tap)?;
        graph.connect(oscillator, pitch_tap)?;
        graph.start(oscillator, graph.current_time())?;

        Ok(Self {
            config,
            oscillator,
            filter_tap,
            pitch_tap,
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &LfoConfig {
        &self.config
    }

    pub fn oscillator(&self) -> NodeId {
        self.oscillator
    }

    pub fn filter_tap(&self) -> NodeId {
        self.filter_tap
    }

    pub fn pitch_tap(&self) -> NodeId {
        self.pitch_tap
    }

    pub fn set_rate(&mut self, graph: &mut Graph, rate: f32) -> Result<()> {
        let rate = rate.max(0.0);
        graph.set_param(self.oscillator.param(ParamKind::Frequency), rate)?;
        self.config.rate = rate;
        Ok(())
    }

    pub fn set_waveform(&mut self, graph: &mut Graph, waveform: Waveform) -> Result<()> {
        graph.set_waveform(self.oscillator, waveform)?;
        self.config.waveform = waveform;
        Ok(())
    }

    pub fn set_filter_depth(&mut self, graph: &mut Graph, depth: f32) -> Result<()> {
        graph.set_param(self.filter_tap.param(ParamKind::Gain), depth)?;
        self.config.filter_depth = depth;
        Ok(())
    }

    pub fn set_pitch_depth(&mut self, graph: &mut Graph, depth: f32) -> Result<()> {
        graph.set_param(self.pitch_tap.param(ParamKind::Gain), depth)?;
        self.config.pitch_depth = depth;
        Ok(())
    }

    pub fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "rate" => self.set_rate(graph, value.as_number(name)?),
            "waveform" => self.set_waveform(graph, value.parse(name)?),
            "filter_depth" => self.set_filter_depth(graph, value.as_number(name)?),
            "pitch_depth" => self.set_pitch_depth(graph, value.as_number(name)?),
            _ => Err(Error::unknown_param(format!("lfo `{}`", self.config.id), name)),
        }
    }
}

#[derive(Default)]
pub struct LfoBank {
    lfos: Vec<Lfo>,
}

impl LfoBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and add an LFO. Ids must be unique within the bank.
    pub fn add(&mut self, graph: &mut Graph, config: LfoConfig) -> Result<()> {
        if self.get(&config.id).is_some() {
            return Err(Error::Configuration(format!(
                "lfo `{}` already exists",
                config.id
            )));
        }
        let lfo = Lfo::build(graph, config)?;
        self.lfos.push(lfo);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Lfo> {
        self.lfos.iter().find(|lfo| lfo.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Lfo> {
        self.lfos.iter_mut().find(|lfo| lfo.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lfo> {
        self.lfos.iter()
    }

    pub fn len(&self) -> usize {
        self.lfos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lfos.is_empty()
    }

    pub fn configs(&self) -> Vec<LfoConfig> {
        self.lfos.iter().map(|lfo| lfo.config.clone()).collect()
    }

    /// Resolve routing ids to tap nodes. Unknown ids are skipped.
    pub fn modulation(&self, routing: &ModulationRouting) -> VoiceModulation {
        let resolve = |ids: &[String], tap: fn(&Lfo) -> NodeId| -> Vec<NodeId> {
            ids.iter()
                .filter_map(|id| match self.get(id) {
                    Some(lfo) => Some(tap(lfo)),
                    None => {
                        warn!("modulation routing names unknown lfo `{id}`");
                        None
                    }
                })
                .collect()
        };

        VoiceModulation {
            filter: resolve(&routing.filter, Lfo::filter_tap),
            pitch: resolve(&routing.pitch, Lfo::pitch_tap),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lfo_builds_running_generator_and_taps() {
        let mut graph = Graph::new(48_000.0);
        let mut config = LfoConfig::new("wobble");
        config.filter_depth = 300.0;
        let lfo = Lfo::build(&mut graph, config).unwrap();

        assert!(graph.is_connected(lfo.oscillator(), lfo.filter_tap()));
        assert!(graph.is_connected(lfo.oscillator(), lfo.pitch_tap()));
        assert_eq!(
            graph.param_value(lfo.filter_tap().param(ParamKind::Gain)).unwrap(),
            300.0
        );

        graph.advance(0.05);
        let out = graph.output(lfo.filter_tap()).unwrap();
        assert!(out.iter().any(|&s| s.abs() > 1.0));
        assert!(!graph.is_finished(lfo.oscillator()).unwrap());
    }

    #[test]
    fn live_updates_write_through() {
        let mut graph = Graph::new(48_000.0);
        let mut lfo = Lfo::build(&mut graph, LfoConfig::new("a")).unwrap();

        lfo.set_param(&mut graph, "rate", &ParamValue::from(2.0)).unwrap();
        lfo.set_param(&mut graph, "waveform", &ParamValue::from("triangle")).unwrap();
        lfo.set_param(&mut graph, "pitch_depth", &ParamValue::from(12.0)).unwrap();

        assert_eq!(lfo.config().rate, 2.0);
        assert_eq!(
            graph.param_value(lfo.oscillator().param(ParamKind::Frequency)).unwrap(),
            2.0
        );
        assert_eq!(graph.waveform(lfo.oscillator()).unwrap(), Waveform::Triangle);
        assert_eq!(
            graph.param_value(lfo.pitch_tap().param(ParamKind::Gain)).unwrap(),
            12.0
        );
        assert!(lfo.set_param(&mut graph, "phase", &ParamValue::from(0.0)).is_err());
    }

    #[test]
    fn bank_rejects_duplicate_ids() {
        let mut graph = Graph::new(48_000.0);
        let mut bank = LfoBank::new();
        bank.add(&mut graph, LfoConfig::new("a")).unwrap();
        bank.add(&mut graph, LfoConfig::new("b")).unwrap();

        assert!(matches!(
            bank.add(&mut graph, LfoConfig::new("a")),
            Err(Error::Configuration(_))
        ));
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn routing_resolves_subsets() {
        let mut graph = Graph::new(48_000.0);
        let mut bank = LfoBank::new();
        bank.add(&mut graph, LfoConfig::new("a")).unwrap();
        bank.add(&mut graph, LfoConfig::new("b")).unwrap();

        let routing = ModulationRouting {
            filter: vec!["b".into(), "missing".into()],
            pitch: vec!["a".into(), "b".into()],
        };
        let taps = bank.modulation(&routing);

        assert_eq!(taps.filter, vec![bank.get("b").unwrap().filter_tap()]);
        assert_eq!(taps.pitch.len(), 2);
        assert_eq!(taps.pitch[0], bank.get("a").unwrap().pitch_tap());
    }
}
