//! Per-voice filter stage.
//!
//! One resonant filter per voice, with its own ADSR sweeping the cutoff:
//!
//! ```text
//!   cutoff
//!   base + amount ┐   ╱╲
//!                 │  ╱  ╲______
//!   base + amt·S  │ ╱          ╲
//!   base          └╱────────────╲───▶ time
//! ```
//!
//! Negative amounts sweep downward. LFO taps connect into the cutoff
//! parameter and ride on top of the envelope.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::filter::FilterType,
    graph::{Graph, NodeId, ParamKind},
    synth::{
        config::ParamValue,
        envelope::{EnvelopeConfig, EnvelopeScheduler},
    },
    Error, Result,
};

pub const MIN_CUTOFF: f32 = 20.0;
pub const MAX_CUTOFF: f32 = 20_000.0;

#[inline]
fn clamp_cutoff(hz: f32) -> f32 {
    hz.clamp(MIN_CUTOFF, MAX_CUTOFF)
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    pub filter_type: FilterType,
    /// Base cutoff in Hz.
    pub cutoff: f32,
    /// Q.
    pub resonance: f32,
    /// Envelope sweep in Hz above (or below) the base cutoff.
    pub env_amount: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            filter_type: FilterType::LowPass,
            cutoff: 2_000.0,
            resonance: 1.0,
            env_amount: 0.0,
        }
    }
}

/// Filter node of one voice, with the values it was built from.
#[derive(Debug, Clone)]
pub struct FilterInstance {
    pub node: NodeId,
    pub base_cutoff: f32,
    pub resonance: f32,
    pub env_amount: f32,
    pub modulation: Vec<NodeId>,
}

pub struct FilterStage {
    config: FilterConfig,
    envelope: EnvelopeScheduler,
}

impl FilterStage {
    pub fn new(config: FilterConfig, envelope: EnvelopeConfig) -> Self {
        Self {
            config,
            envelope: EnvelopeScheduler::new(envelope),
        }
    }

    pub fn config(&self) -> FilterConfig {
        self.config
    }

    pub fn set_config(&mut self, config: FilterConfig) {
        self.config = config;
    }

    pub fn envelope(&self) -> &EnvelopeScheduler {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut EnvelopeScheduler {
        &mut self.envelope
    }

    /// Named update. Applies to voices created afterwards.
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "type" | "filter_type" => self.config.filter_type = value.parse(name)?,
            "cutoff" | "frequency" => self.config.cutoff = value.as_number(name)?,
            "resonance" | "q" => self.config.resonance = value.as_number(name)?.max(0.0),
            "env_amount" | "amount" => self.config.env_amount = value.as_number(name)?,
            _ => return Err(Error::unknown_param("filter", name)),
        }
        Ok(())
    }

    /// Build a filter from the live config. Each `filter_mods` node is added
    /// onto the cutoff.
    pub fn create_filter(&self, graph: &mut Graph, filter_mods: &[NodeId]) -> Result<FilterInstance> {
        let cutoff = clamp_cutoff(self.config.cutoff);
        let node = graph.add_filter(self.config.filter_type, cutoff, self.config.resonance);

        for &source in filter_mods {
            if let Err(err) = graph.connect_param(source, node.param(ParamKind::Frequency)) {
                let _ = graph.remove(node);
                return Err(err);
            }
        }

        Ok(FilterInstance {
            node,
            base_cutoff: cutoff,
            resonance: self.config.resonance,
            env_amount: self.config.env_amount,
            modulation: filter_mods.to_vec(),
        })
    }

    pub fn apply_envelope(&self, graph: &mut Graph, instance: &FilterInstance, time: f64) -> Result<()> {
        let base = instance.base_cutoff;
        let amount = instance.env_amount;
        let sustain = self.envelope.config().sustain;

        self.envelope.apply_shape(
            graph,
            instance.node.param(ParamKind::Frequency),
            time,
            base,
            clamp_cutoff(base + amount),
            clamp_cutoff(base + amount * sustain),
        )
    }

    /// Sweep back to the base cutoff. Returns the release duration.
    pub fn apply_release(&self, graph: &mut Graph, instance: &FilterInstance, time: f64) -> Result<f64> {
        self.envelope.apply_release(
            graph,
            instance.node.param(ParamKind::Frequency),
            time,
            instance.base_cutoff,
        )
    }
}

impl Default for FilterStage {
    fn default() -> Self {
        Self::new(FilterConfig::default(), EnvelopeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(amount: f32) -> FilterStage {
        FilterStage::new(
            FilterConfig {
                filter_type: FilterType::LowPass,
                cutoff: 1_000.0,
                resonance: 2.0,
                env_amount: amount,
            },
            EnvelopeConfig::new(0.1, 0.1, 0.5, 0.2),
        )
    }

    #[test]
    fn filter_uses_live_config() {
        let mut graph = Graph::new(48_000.0);
        let stage = stage(0.0);
        let instance = stage.create_filter(&mut graph, &[]).unwrap();

        let cutoff = graph.param_value(instance.node.param(ParamKind::Frequency)).unwrap();
        let q = graph.param_value(instance.node.param(ParamKind::Q)).unwrap();
        assert_eq!(cutoff, 1_000.0);
        assert_eq!(q, 2.0);
        assert_eq!(graph.filter_type(instance.node).unwrap(), FilterType::LowPass);
    }

    #[test]
    fn envelope_sweeps_cutoff() {
        let mut graph = Graph::new(48_000.0);
        let stage = stage(3_000.0);
        let instance = stage.create_filter(&mut graph, &[]).unwrap();
        stage.apply_envelope(&mut graph, &instance, 0.0).unwrap();

        let param = instance.node.param(ParamKind::Frequency);
        let at = |t: f64| graph.value_at(param, t).unwrap();
        assert!((at(0.0) - 1_000.0).abs() < 1.0);
        assert!((at(0.1) - 4_000.0).abs() < 1.0);
        assert!((at(0.5) - 2_500.0).abs() < 1.0);
    }

    #[test]
    fn release_returns_to_base() {
        let mut graph = Graph::new(48_000.0);
        let stage = stage(3_000.0);
        let instance = stage.create_filter(&mut graph, &[]).unwrap();
        stage.apply_envelope(&mut graph, &instance, 0.0).unwrap();

        let release = stage.apply_release(&mut graph, &instance, 1.0).unwrap();
        assert_eq!(release, 0.2_f32 as f64);

        let param = instance.node.param(ParamKind::Frequency);
        assert!((graph.value_at(param, 1.0).unwrap() - 2_500.0).abs() < 1.0);
        assert!((graph.value_at(param, 2.0).unwrap() - 1_000.0).abs() < 1e-3);
    }

    #[test]
    fn sweep_is_clamped_to_audible_range() {
        let mut graph = Graph::new(48_000.0);
        let stage = stage(50_000.0);
        let instance = stage.create_filter(&mut graph, &[]).unwrap();
        stage.apply_envelope(&mut graph, &instance, 0.0).unwrap();

        let peak = graph
            .value_at(instance.node.param(ParamKind::Frequency), 0.1)
            .unwrap();
        assert!(peak <= MAX_CUTOFF);
    }

    #[test]
    fn modulation_connects_into_cutoff() {
        let mut graph = Graph::new(48_000.0);
        let lfo = graph.add_gain(100.0);
        let instance = stage(0.0).create_filter(&mut graph, &[lfo]).unwrap();

        assert!(graph.is_param_connected(lfo, instance.node.param(ParamKind::Frequency)));
    }

    #[test]
    fn named_updates() {
        let mut stage = FilterStage::default();
        stage.set("type", &ParamValue::from("highpass")).unwrap();
        stage.set("cutoff", &ParamValue::from(500.0)).unwrap();

        assert_eq!(stage.config().filter_type, FilterType::HighPass);
        assert_eq!(stage.config().cutoff, 500.0);
        assert!(stage.set("drive", &ParamValue::from(1.0)).is_err());
    }
}
