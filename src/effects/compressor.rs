//! Compressor effect: a single dynamics node, no dry/wet blend.

use crate::{
    dsp::dynamics::CompressorSettings,
    effects::unit::{
        already_initialized, bounded, remove_nodes, EffectConfig, EffectPorts, EffectUnit,
    },
    graph::{Graph, NodeId, ParamKind},
    synth::config::ParamValue,
    Error, Result,
};

fn clamp_settings(s: CompressorSettings) -> CompressorSettings {
    CompressorSettings {
        threshold_db: bounded(s.threshold_db, -100.0, 0.0),
        knee_db: bounded(s.knee_db, 0.0, 40.0),
        ratio: bounded(s.ratio, 1.0, 20.0),
        attack: bounded(s.attack, 0.0, 1.0),
        release: bounded(s.release, 0.0, 1.0),
    }
}

pub struct Compressor {
    settings: CompressorSettings,
    node: Option<NodeId>,
}

impl Compressor {
    pub fn new(settings: CompressorSettings) -> Self {
        Self {
            settings: clamp_settings(settings),
            node: None,
        }
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Gain reduction applied during the last rendered quantum, in dB.
    pub fn reduction(&self, graph: &Graph) -> Result<f32> {
        match self.node {
            Some(node) => graph.reduction(node),
            None => Ok(0.0),
        }
    }

    fn apply(&self, graph: &mut Graph) -> Result<()> {
        let Some(node) = self.node else {
            return Ok(());
        };
        let s = &self.settings;
        graph.set_param(node.param(ParamKind::Threshold), s.threshold_db)?;
        graph.set_param(node.param(ParamKind::Knee), s.knee_db)?;
        graph.set_param(node.param(ParamKind::Ratio), s.ratio)?;
        graph.set_param(node.param(ParamKind::Attack), s.attack)?;
        graph.set_param(node.param(ParamKind::Release), s.release)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressorSettings::default())
    }
}

impl EffectUnit for Compressor {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.node.is_some() {
            return Err(already_initialized("compressor"));
        }
        let node = graph.add_compressor(self.settings);
        self.node = Some(node);
        Ok(EffectPorts {
            input: node,
            output: node,
        })
    }

    fn input(&self) -> Option<NodeId> {
        self.node
    }

    fn output(&self) -> Option<NodeId> {
        self.node
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::Compressor(self.settings)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        let s = &mut self.settings;
        match name {
            "threshold" => s.threshold_db = value.as_number(name)?,
            "knee" => s.knee_db = value.as_number(name)?,
            "ratio" => s.ratio = value.as_number(name)?,
            "attack" => s.attack = value.as_number(name)?,
            "release" => s.release = value.as_number(name)?,
            _ => return Err(Error::unknown_param("compressor", name)),
        }
        self.settings = clamp_settings(self.settings);
        self.apply(graph)
    }

    fn teardown(&mut self, graph: &mut Graph) {
        remove_nodes(graph, self.node.take());
    }
}
