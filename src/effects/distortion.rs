//! Waveshaping distortion.
//!
//! The wet path is a single shaper node holding a transfer curve built from
//! `mode` and `drive`. Changing either rebuilds the curve.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::distortion::{make_curve, DistortionMode, CURVE_LENGTH},
    effects::unit::{
        already_initialized, bounded, mix_value, remove_nodes, DryWet, EffectConfig, EffectPorts,
        EffectUnit,
    },
    graph::{Graph, NodeId},
    synth::config::ParamValue,
    Error, Result,
};

const MAX_DRIVE: f32 = 100.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistortionConfig {
    /// 1.0 is clean; higher pushes harder into the curve.
    pub drive: f32,
    pub mode: DistortionMode,
    pub mix: f32,
}

impl DistortionConfig {
    pub fn clamped(self) -> Self {
        Self {
            drive: bounded(self.drive, 1.0, MAX_DRIVE),
            mix: bounded(self.mix, 0.0, 1.0),
            ..self
        }
    }
}

impl Default for DistortionConfig {
    fn default() -> Self {
        Self {
            drive: 4.0,
            mode: DistortionMode::Soft,
            mix: 0.0,
        }
    }
}

struct DistortionNodes {
    dry_wet: DryWet,
    shaper: NodeId,
}

pub struct Distortion {
    config: DistortionConfig,
    nodes: Option<DistortionNodes>,
}

impl Distortion {
    pub fn new(config: DistortionConfig) -> Self {
        Self {
            config: config.clamped(),
            nodes: None,
        }
    }

    pub fn settings(&self) -> &DistortionConfig {
        &self.config
    }

    fn curve(&self) -> Vec<f32> {
        make_curve(self.config.mode, self.config.drive, CURVE_LENGTH)
    }

    fn apply(&self, graph: &mut Graph) -> Result<()> {
        let Some(nodes) = &self.nodes else {
            return Ok(());
        };
        nodes.dry_wet.set_mix(graph, self.config.mix)?;
        graph.set_curve(nodes.shaper, self.curve())
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new(DistortionConfig::default())
    }
}

impl EffectUnit for Distortion {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.nodes.is_some() {
            return Err(already_initialized("distortion"));
        }
        let dry_wet = DryWet::build(graph, self.config.mix)?;
        let shaper = graph.add_shaper(self.curve());
        graph.connect(dry_wet.input, shaper)?;
        graph.connect(shaper, dry_wet.wet)?;

        let ports = dry_wet.ports();
        self.nodes = Some(DistortionNodes { dry_wet, shaper });
        Ok(ports)
    }

    fn input(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.dry_wet.input)
    }

    fn output(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.dry_wet.output)
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::Distortion(self.config)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "drive" | "amount" => self.config.drive = value.as_number(name)?,
            "mode" | "type" => self.config.mode = value.parse(name)?,
            "mix" => self.config.mix = mix_value(value)?,
            _ => return Err(Error::unknown_param("distortion", name)),
        }
        self.config = self.config.clamped();
        self.apply(graph)
    }

    fn teardown(&mut self, graph: &mut Graph) {
        if let Some(nodes) = self.nodes.take() {
            remove_nodes(graph, nodes.dry_wet.nodes());
            remove_nodes(graph, [nodes.shaper]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaper_holds_current_curve() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut distortion = Distortion::default();
        distortion.initialize(&mut graph, dest).unwrap();

        let shaper = distortion.nodes.as_ref().unwrap().shaper;
        assert_eq!(graph.curve(shaper).unwrap().len(), CURVE_LENGTH);
        assert_eq!(graph.curve(shaper).unwrap(), distortion.curve().as_slice());

        distortion.set_param(&mut graph, "mode", &ParamValue::from("hard")).unwrap();
        distortion.set_param(&mut graph, "drive", &ParamValue::from(10.0)).unwrap();
        let expected = make_curve(DistortionMode::Hard, 10.0, CURVE_LENGTH);
        assert_eq!(graph.curve(shaper).unwrap(), expected.as_slice());
    }

    #[test]
    fn zero_mix_is_clean() {
        let mut graph = Graph::new(48_000.0);
        let dest = graph.destination();
        let mut distortion = Distortion::default();
        let ports = distortion.initialize(&mut graph, dest).unwrap();
        graph.connect(ports.output, dest).unwrap();

        let osc = graph.add_oscillator(crate::dsp::oscillator::Waveform::Sine, 100.0);
        graph.start(osc, 0.0).unwrap();
        graph.connect(osc, ports.input).unwrap();

        let mut out = vec![0.0; 128];
        graph.render(&mut out);
        let reference = graph.output(osc).unwrap().to_vec();
        for (a, b) in out.iter().zip(&reference) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
