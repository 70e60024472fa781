//! Feedback delay (echo).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    effects::unit::{
        already_initialized, bounded, mix_value, remove_nodes, DryWet, EffectConfig, EffectPorts,
        EffectUnit,
    },
    graph::{Graph, NodeId, ParamKind},
    synth::config::ParamValue,
    Error, Result,
};

/// Longest echo the line can hold, seconds.
pub const MAX_DELAY_TIME: f32 = 2.0;
const MAX_FEEDBACK: f32 = 0.95;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayConfig {
    /// Seconds.
    pub time: f32,
    pub feedback: f32,
    pub mix: f32,
}

impl DelayConfig {
    /// Pull every field into its usable range.
    pub fn clamped(self) -> Self {
        Self {
            time: bounded(self.time, 0.0, MAX_DELAY_TIME),
            feedback: bounded(self.feedback, 0.0, MAX_FEEDBACK),
            mix: bounded(self.mix, 0.0, 1.0),
        }
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            time: 0.3,
            feedback: 0.4,
            mix: 0.2,
        }
    }
}

struct DelayNodes {
    dry_wet: DryWet,
    line: NodeId,
}

pub struct Delay {
    config: DelayConfig,
    nodes: Option<DelayNodes>,
}

impl Delay {
    pub fn new(config: DelayConfig) -> Self {
        Self {
            config: config.clamped(),
            nodes: None,
        }
    }

    pub fn settings(&self) -> &DelayConfig {
        &self.config
    }

    fn apply(&self, graph: &mut Graph) -> Result<()> {
        let Some(nodes) = &self.nodes else {
            return Ok(());
        };
        nodes.dry_wet.set_mix(graph, self.config.mix)?;
        graph.set_param(nodes.line.param(ParamKind::DelayTime), self.config.time)?;
        graph.set_param(nodes.line.param(ParamKind::Feedback), self.config.feedback)
    }
}

impl Default for Delay {
    fn default() -> Self {
        Self::new(DelayConfig::default())
    }
}

impl EffectUnit for Delay {
    fn initialize(&mut self, graph: &mut Graph, _destination: NodeId) -> Result<EffectPorts> {
        if self.nodes.is_some() {
            return Err(already_initialized("delay"));
        }
        let config = self.config;
        let dry_wet = DryWet::build(graph, config.mix)?;
        let line = graph.add_delay(MAX_DELAY_TIME, config.time, config.feedback);
        graph.connect(dry_wet.input, line)?;
        graph.connect(line, dry_wet.wet)?;

        let ports = dry_wet.ports();
        self.nodes = Some(DelayNodes { dry_wet, line });
        Ok(ports)
    }

    fn input(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.dry_wet.input)
    }

    fn output(&self) -> Option<NodeId> {
        self.nodes.as_ref().map(|n| n.dry_wet.output)
    }

    fn config(&self) -> EffectConfig {
        EffectConfig::Delay(self.config)
    }

    fn set_param(&mut self, graph: &mut Graph, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "time" => self.config.time = value.as_number(name)?,
            "feedback" => self.config.feedback = value.as_number(name)?,
            "mix" => self.config.mix = mix_value(value)?,
            _ => return Err(Error::unknown_param("delay", name)),
        }
        self.config = self.config.clamped();
        self.apply(graph)
    }

    fn teardown(&mut self, graph: &mut Graph) {
        if let Some(nodes) = self.nodes.take() {
            remove_nodes(graph, nodes.dry_wet.nodes());
            remove_nodes(graph, [nodes.line]);
        }
    }
}
